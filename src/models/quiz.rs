//! # 문제 은행(Question Bank) 모델 정의
//!
//! 하나의 퀴즈를 구성하는 문항과 선택지 구조체들입니다.
//! 은행은 CSV 파싱(services/bank.rs)으로 한 번 만들어진 뒤 불변입니다.
//!
//! ## 정규 순서 vs 표시 순서
//! - 정규(canonical) 순서: 은행에 저장된 원래 순서. 채점의 기준.
//! - 표시(display) 순서: 세션마다 셔플되어 고정된 순서. 렌더링의 기준.
//! 선택지는 `correct` 플래그를 몸에 지닌 채 통째로 셔플되므로,
//! 어떤 순서로 보여주든 정답 판정에는 영향이 없습니다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 문항의 선택지 하나
///
/// `correct`는 은행이 만들어진 순간 확정되며 이후 변하지 않습니다.
/// CSV 원본에서 백틱(`)으로 시작하던 선택지가 correct = true가 되고,
/// 백틱 자체는 파싱 단계에서 제거되어 표시 텍스트에는 남지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOpt {
    /// 선택지 텍스트 (백틱 마커 제거 후)
    pub text: String,
    /// 정답 여부
    pub correct: bool,
}

/// 문항 하나 — 은행 CSV의 한 열(column)에 대응합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// 셔플과 무관하게 유지되는 문항 고유 식별자 (UUIDv7)
    pub id: String,
    /// 문항 텍스트 (CSV의 0행)
    pub text: String,
    /// 첨부 이미지 참조 — CSV의 1행. 비어 있으면 None
    pub image_ref: Option<String>,
    /// 선택지 목록 (CSV의 2행 이하). 최소 1개, 정답 최소 1개 보장.
    pub options: Vec<QuestionOpt>,
}

impl Question {
    /// 정답이 2개 이상이면 다중 선택(checkbox), 아니면 단일 선택(radio).
    /// 클라이언트 렌더링의 입력 컨트롤 종류를 결정합니다.
    pub fn is_multi_select(&self) -> bool {
        self.options.iter().filter(|o| o.correct).count() > 1
    }

    /// 정답 선택지 텍스트의 집합.
    ///
    /// BTreeSet을 쓰는 이유: 채점이 "선택 집합 == 정답 집합"의
    /// 집합 동등성 비교이므로, 순서 없는 정렬된 집합이 딱 맞습니다.
    pub fn correct_set(&self) -> BTreeSet<&str> {
        self.options
            .iter()
            .filter(|o| o.correct)
            .map(|o| o.text.as_str())
            .collect()
    }

    /// 이 문항의 배점 = 정답 선택지 개수.
    /// 전체 만점은 모든 문항의 배점 합입니다.
    pub fn point_value(&self) -> u32 {
        self.options.iter().filter(|o| o.correct).count() as u32
    }
}

/// 문제 은행 — 파싱이 끝난 하나의 퀴즈 전체
///
/// 생성 이후 불변이며, 세션이 시작될 때 셔플된 사본이
/// 세션 문서에 내장(embed)됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    /// 퀴즈 고유 식별자
    pub quiz_id: String,
    /// 퀴즈 이름 (owner가 업로드 시 지정)
    pub name: String,
    /// 정규 순서의 문항 목록
    pub questions: Vec<Question>,
}

/// 퀴즈 업로드 요청 — `POST /api/v1/quizzes`의 요청 본문
#[derive(Debug, Deserialize)]
pub struct UploadQuizRequest {
    /// 퀴즈 이름
    pub name: String,
    /// CSV 원문 (열 = 문항, 0행 = 텍스트, 1행 = 이미지, 2행~ = 선택지)
    pub csv: String,
}

/// 퀴즈 목록 항목 — `GET /api/v1/quizzes` 응답에 사용
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QuizSummary {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub question_count: i64,
}
