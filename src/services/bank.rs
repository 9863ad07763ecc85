//! # 문제 은행 파싱 서비스
//!
//! owner가 업로드한 CSV 원문을 `QuestionBank`로 변환합니다.
//!
//! ## CSV 형식 (열 = 문항)
//! ```text
//! 0행: 문항 텍스트
//! 1행: 이미지 파일 참조 (비어 있으면 없음)
//! 2행~: 선택지 — 백틱(`)으로 시작하면 정답
//! ```
//!
//! 예: 2문항 CSV
//! ```text
//! 수도는?,가장 큰 행성은?
//! ,jupiter.png
//! 부산,`목성
//! `서울,토성
//! ```
//!
//! 파싱이 실패하면 `MalformedBank`로 중단되며, 부분 은행은 만들어지지 않습니다.

use crate::error::AppError;
use crate::models::{Question, QuestionBank, QuestionOpt};
use uuid::Uuid;

/// 정답 선택지를 표시하는 마커. 표시 텍스트에서는 제거됩니다.
const CORRECT_MARKER: char = '`';

/// CSV 원문을 행렬(행의 벡터)로 쪼갭니다.
///
/// 따옴표(")로 감싼 필드 안의 쉼표는 구분자로 취급하지 않습니다.
/// 빈 줄도 행으로 유지합니다 — 이미지 행이 통째로 비어 있는 경우가
/// 흔하고, 행 번호가 의미를 가지므로 건너뛰면 안 됩니다.
/// 행마다 열 개수가 달라도 허용됩니다 (문항마다 선택지 개수가 다르므로).
fn split_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let mut row = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        for ch in line.chars() {
            match ch {
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => {
                    row.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            }
        }
        row.push(current);
        rows.push(row);
    }
    rows
}

/// 행렬에서 (row, col) 셀을 꺼냅니다. 행이 짧아 셀이 없으면 빈 문자열.
fn cell(rows: &[Vec<String>], row: usize, col: usize) -> &str {
    rows.get(row)
        .and_then(|r| r.get(col))
        .map(|s| s.as_str())
        .unwrap_or("")
}

/// CSV 원문을 파싱해 불변 `QuestionBank`를 만듭니다.
///
/// # 에러 (`MalformedBank`)
/// - 행이 3개 미만 (문항 텍스트 + 이미지 행 + 선택지 최소 1행)
/// - 어떤 문항의 선택지가 전부 비어 있음
/// - 어떤 문항에 정답 표시(백틱)가 하나도 없음
///
/// 문항 텍스트가 빈 열은 조용히 건너뜁니다.
/// 전부 건너뛰어 문항이 0개가 되면 그것도 에러입니다.
pub fn parse_bank(name: &str, csv: &str) -> Result<QuestionBank, AppError> {
    let rows = split_csv(csv);
    if rows.len() < 3 {
        return Err(AppError::MalformedBank(format!(
            "expected at least 3 rows (text, image, options), got {}",
            rows.len()
        )));
    }

    let num_columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut questions = Vec::new();

    for col in 0..num_columns {
        let text = cell(&rows, 0, col).trim();
        if text.is_empty() {
            continue; // 문항 텍스트가 없는 열은 건너뜁니다
        }

        let image = cell(&rows, 1, col).trim();
        let image_ref = if image.is_empty() {
            None
        } else {
            Some(image.to_string())
        };

        // 2행 이하의 비어 있지 않은 셀이 선택지입니다.
        let mut options = Vec::new();
        for row in 2..rows.len() {
            let raw = cell(&rows, row, col).trim();
            if raw.is_empty() {
                continue;
            }
            // 백틱 마커를 떼어내고 정답 플래그로 옮깁니다.
            let (opt_text, correct) = match raw.strip_prefix(CORRECT_MARKER) {
                Some(rest) => (rest.trim(), true),
                None => (raw, false),
            };
            options.push(QuestionOpt {
                text: opt_text.to_string(),
                correct,
            });
        }

        if options.is_empty() {
            return Err(AppError::MalformedBank(format!(
                "question \"{}\" has no options",
                text
            )));
        }
        if !options.iter().any(|o| o.correct) {
            return Err(AppError::MalformedBank(format!(
                "question \"{}\" has no option marked correct",
                text
            )));
        }

        questions.push(Question {
            id: Uuid::now_v7().to_string(),
            text: text.to_string(),
            image_ref,
            options,
        });
    }

    if questions.is_empty() {
        return Err(AppError::MalformedBank(
            "no questions found in the source".to_string(),
        ));
    }

    Ok(QuestionBank {
        quiz_id: Uuid::now_v7().to_string(),
        name: name.to_string(),
        questions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Capital of Korea?,Largest planet?
,jupiter.png
Busan,`Jupiter
`Seoul,Saturn
Incheon,";

    #[test]
    fn parses_columns_into_questions() {
        let bank = parse_bank("geo", SAMPLE).unwrap();
        assert_eq!(bank.name, "geo");
        assert_eq!(bank.questions.len(), 2);

        let q1 = &bank.questions[0];
        assert_eq!(q1.text, "Capital of Korea?");
        assert_eq!(q1.image_ref, None);
        assert_eq!(q1.options.len(), 3);
        assert!(q1.options[1].correct);
        // 백틱은 표시 텍스트에서 제거됩니다
        assert_eq!(q1.options[1].text, "Seoul");
        assert!(!q1.is_multi_select());

        let q2 = &bank.questions[1];
        assert_eq!(q2.image_ref.as_deref(), Some("jupiter.png"));
        assert_eq!(q2.options.len(), 2);
        assert!(q2.options[0].correct);
    }

    #[test]
    fn quoted_commas_stay_inside_fields() {
        let csv = "\"One, two, or three?\"\n\n`\"One, actually\"\nTwo";
        let bank = parse_bank("t", csv).unwrap();
        assert_eq!(bank.questions[0].text, "One, two, or three?");
        assert_eq!(bank.questions[0].options[0].text, "One, actually");
    }

    #[test]
    fn fewer_than_three_rows_is_malformed() {
        let err = parse_bank("t", "Only?,Two?\nrows,here").unwrap_err();
        assert!(matches!(err, AppError::MalformedBank(_)));
    }

    #[test]
    fn question_without_correct_option_is_malformed() {
        let err = parse_bank("t", "Q?\n\nA\nB").unwrap_err();
        assert!(matches!(err, AppError::MalformedBank(_)));
    }

    #[test]
    fn question_without_options_is_malformed() {
        // 두 번째 열은 문항 텍스트만 있고 선택지 행이 전부 비어 있습니다
        let err = parse_bank("t", "Q1?,Q2?\n,\n`A,\nB,").unwrap_err();
        assert!(matches!(err, AppError::MalformedBank(_)));
    }

    #[test]
    fn empty_text_columns_are_skipped() {
        let csv = "Q1?,,Q3?\n,,\n`A,x,`C\nB,y,D";
        let bank = parse_bank("t", csv).unwrap();
        assert_eq!(bank.questions.len(), 2);
        assert_eq!(bank.questions[1].text, "Q3?");
    }

    #[test]
    fn multi_select_detection() {
        let csv = "Pick two\n\n`A\n`B\nC";
        let bank = parse_bank("t", csv).unwrap();
        assert!(bank.questions[0].is_multi_select());
        assert_eq!(bank.questions[0].point_value(), 2);
    }
}
