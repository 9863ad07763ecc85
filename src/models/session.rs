//! # 라이브 세션 모델 정의
//!
//! 하나의 퀴즈가 client들에게 진행되는 "세션"과 그 부속 데이터 구조체들입니다.
//!
//! ## 세션 흐름
//! 1. owner가 은행을 고르고 셔플 → `Session` 생성 (`is_active = true`)
//! 2. client들이 활성 세션을 찾아 참여, 문항마다 `AnswerRecord` 업서트
//! 3. owner는 `AggregateStats`로 실시간 집계를 관찰
//! 4. owner가 세션 종료 → `is_active = false`, `ended_at` 기록
//!
//! 핵심 불변식: **활성 세션은 시스템 전체에 최대 1개** —
//! client가 "그" 퀴즈를 찾는 근거이므로 스토어가 원자적으로 강제합니다.

use crate::models::Question;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 라이브 세션 — DB의 `sessions` 테이블 한 행에 대응합니다.
///
/// 셔플된 문항(표시 순서)이 세션에 그대로 내장됩니다.
/// client는 자기 쪽에서 다시 셔플하지 않고 이 순서를 그대로 렌더링해야
/// owner와 client의 집계 화면이 서로 맞아떨어집니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// 세션 고유 식별자 (UUIDv7)
    pub id: String,
    /// 이 세션이 진행하는 퀴즈의 ID
    pub quiz_id: String,
    /// 퀴즈 이름 (client 화면 표시용으로 비정규화)
    pub quiz_name: String,
    /// 이 세션에서 고정된 표시 순서의 문항들 (선택지 순서 포함)
    pub questions: Vec<Question>,
    /// 활성 여부 — client는 이 플래그로 참여 가능한 세션을 찾습니다
    pub is_active: bool,
    /// 세션 시작 시각 (RFC 3339 형식)
    pub started_at: String,
    /// 세션 종료 시각 — None이면 아직 진행 중
    pub ended_at: Option<String>,
}

/// client 한 명의 문항 하나에 대한 답안 기록
///
/// (session_id, question_id, client_name) 조합마다 논리적으로 한 건.
/// 같은 조합으로 다시 제출하면 이전 기록을 **덮어씁니다**(last-write-wins).
/// 답안은 문항 단위로 실시간 제출됩니다 — 이것이 owner의 라이브 집계를
/// 가능하게 하는 의도된 설계입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub session_id: String,
    pub question_id: String,
    pub client_name: String,
    /// 선택한 선택지 텍스트들 (다중 선택이면 여러 개)
    pub selected: Vec<String>,
    /// 제출 시각 (RFC 3339)
    pub submitted_at: String,
}

/// 문항 하나의 실시간 응답 분포
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuestionStats {
    /// 이 문항에 답한 client 수 (기록 단위, 선택지 단위가 아님)
    pub total_responses: u32,
    /// 선택지 텍스트 → 선택 횟수.
    /// BTreeMap이라 JSON 직렬화 순서가 결정적입니다 (테스트/화면 안정성).
    pub option_counts: BTreeMap<String, u32>,
}

/// 세션 전체의 실시간 집계 — 저장되지 않는 파생(read-side) 데이터
///
/// 현재 답안 기록 전체로부터 순수하게 재계산됩니다.
/// 같은 답안 집합이면 언제 계산해도 같은 결과 (멱등).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    /// 문항 ID → 응답 분포
    pub per_question: BTreeMap<String, QuestionStats>,
    /// 지금까지 답을 낸 client 이름들
    pub participants: BTreeSet<String>,
}

/// client의 최종 점수 요약 — finalize 시점에 한 번 계산되어 저장됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientScoreSummary {
    pub client_name: String,
    /// 표시 순서 기준, 문항별 정답 여부
    pub per_question_correct: Vec<bool>,
    /// 획득 점수 (정확히 맞힌 문항의 배점 합)
    pub points_earned: u32,
    /// 만점 (모든 문항의 정답 선택지 개수 합)
    pub points_possible: u32,
    /// round(100 * points_earned / points_possible)
    pub percentage: u32,
    /// percentage >= 합격 기준이면 true
    pub passed: bool,
}

// ── 요청/응답 타입 ──

/// 세션 미리보기 요청 — `POST /api/v1/sessions/preview`
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    /// 진행할 퀴즈의 ID
    pub quiz_id: String,
}

/// 세션 종료 요청 — `POST /api/v1/sessions/:id/end`
#[derive(Debug, Deserialize)]
pub struct EndSessionRequest {
    /// 답안 기록을 함께 삭제할지 여부.
    /// 생략하면 서버 설정(PURGE_ON_END)의 기본값을 따릅니다.
    /// 삭제는 되돌릴 수 없으므로 owner가 종료 시점에 명시적으로 선택합니다.
    pub purge_answers: Option<bool>,
}

/// 답안 제출 요청 — `POST /api/v1/sessions/:id/answers`
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub client_name: String,
    pub question_id: String,
    /// 현재 선택된 선택지 텍스트 전체 (토글할 때마다 전체 집합을 다시 보냄)
    pub selected: Vec<String>,
}

/// 최종 제출 요청 — `POST /api/v1/sessions/:id/submit`
#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    pub client_name: String,
}

/// client에게 보여주는 문항 — 정답 플래그를 제거한 뷰
///
/// `Session.questions`는 채점을 위해 correct 플래그를 포함하므로
/// 그대로 내보낼 수 없습니다. 이 뷰가 공개 가능한 부분만 담습니다.
#[derive(Debug, Clone, Serialize)]
pub struct ClientQuestion {
    pub id: String,
    pub text: String,
    pub image_ref: Option<String>,
    /// 표시 순서의 선택지 텍스트들
    pub options: Vec<String>,
    /// true면 checkbox, false면 radio로 렌더링
    pub multi_select: bool,
}

/// 활성 세션 조회 응답 — `GET /api/v1/sessions/active`
#[derive(Debug, Serialize)]
pub struct ActiveSessionView {
    pub session_id: String,
    pub quiz_id: String,
    pub quiz_name: String,
    pub started_at: String,
    pub questions: Vec<ClientQuestion>,
}

impl ActiveSessionView {
    /// 세션에서 정답 정보를 걷어낸 client용 뷰를 만듭니다.
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            quiz_id: session.quiz_id.clone(),
            quiz_name: session.quiz_name.clone(),
            started_at: session.started_at.clone(),
            questions: session
                .questions
                .iter()
                .map(|q| ClientQuestion {
                    id: q.id.clone(),
                    text: q.text.clone(),
                    image_ref: q.image_ref.clone(),
                    options: q.options.iter().map(|o| o.text.clone()).collect(),
                    multi_select: q.is_multi_select(),
                })
                .collect(),
        }
    }
}
