//! # 채점 엔진 (Scoring Engine)
//!
//! 순수 함수로만 이루어진 채점 로직입니다.
//! client의 개인 점수와 owner의 정답률 분석이 같은 함수를 공유합니다.
//!
//! ## 채점 규칙
//! 선택 집합이 정답 집합과 **정확히 같을 때만** 그 문항을 맞힌 것입니다.
//! 다중 선택 문항에서 정답 일부만 고르거나, 오답을 하나라도 끼워 넣으면
//! 부분 점수 없이 문항 전체가 오답입니다.
//!
//! 문항 배점 = 정답 선택지 개수. 전체 퍼센트는
//! `round(100 * 획득 점수 / 만점)`이고, 합격 기준(기본 90)과 비교합니다.

use crate::models::{AnswerRecord, ClientScoreSummary, Question};
use std::collections::BTreeSet;

/// 문항 하나의 채점 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    /// 선택 집합 == 정답 집합
    pub correct: bool,
    /// 맞혔으면 문항 배점, 틀렸으면 0
    pub points_earned: u32,
}

/// 문항 하나를 채점합니다.
///
/// 선택지는 텍스트로 식별합니다. 표시 순서가 어떻게 셔플되었든
/// `Question`의 correct 플래그가 정규 정체성을 담고 있으므로
/// 집합 비교만으로 충분합니다.
pub fn score(question: &Question, selected: &[String]) -> Score {
    let selected_set: BTreeSet<&str> = selected.iter().map(|s| s.as_str()).collect();
    let correct = selected_set == question.correct_set();
    Score {
        correct,
        points_earned: if correct { question.point_value() } else { 0 },
    }
}

/// client 한 명의 최종 점수 요약을 계산합니다.
///
/// `questions`는 세션에 고정된 표시 순서이고,
/// `answers`는 그 client의 답안 기록입니다 (문항당 최신 1건).
/// 답하지 않은 문항은 빈 선택으로 취급되어 오답 처리됩니다.
pub fn summarize(
    questions: &[Question],
    answers: &[AnswerRecord],
    client_name: &str,
    pass_percentage: u8,
) -> ClientScoreSummary {
    let mut per_question_correct = Vec::with_capacity(questions.len());
    let mut points_earned = 0u32;
    let mut points_possible = 0u32;

    for question in questions {
        let selected = answers
            .iter()
            .find(|a| a.question_id == question.id && a.client_name == client_name)
            .map(|a| a.selected.as_slice())
            .unwrap_or(&[]);

        let result = score(question, selected);
        per_question_correct.push(result.correct);
        points_earned += result.points_earned;
        points_possible += question.point_value();
    }

    // 만점 0은 은행 불변식상 생기지 않지만, 생겨도 0%로 수렴합니다
    let percentage = if points_possible > 0 {
        (100.0 * points_earned as f64 / points_possible as f64).round() as u32
    } else {
        0
    };

    ClientScoreSummary {
        client_name: client_name.to_string(),
        per_question_correct,
        points_earned,
        points_possible,
        percentage,
        passed: percentage >= pass_percentage as u32,
    }
}
