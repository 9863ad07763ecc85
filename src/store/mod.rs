//! # 세션 스토어 추상화 계층
//!
//! 핵심 로직(세션 상태 기계, 집계)이 의존하는 영속화/알림 인터페이스입니다.
//! 구체 백엔드는 이 계약만 지키면 무엇이든 됩니다 — 문서 DB, 관계형 DB,
//! 파일 + 워처 모두 가능합니다. 이 크레이트는 SQLite 구현(`SqliteStore`)을
//! 제공합니다.
//!
//! ## 계약 요약
//! - `create_session`: 활성 세션이 이미 있으면 **원자적으로** `SessionConflict`
//!   (read-then-write 검사가 아니라 스토어 수준의 조건부 쓰기여야 합니다)
//! - `submit_answer`: (세션, 문항, client) 키 업서트 — last-write-wins
//! - `subscribe`: 답안 변경 알림. 알림 채널이 끊겨도 소비자는 폴링으로
//!   강등해야 하며, 조용히 멈춰 있으면 안 됩니다
//! - `delete_quiz`: 퀴즈 → 세션 → 답안 연쇄 삭제. 부분 실패는
//!   `CascadeDeleteIncomplete`로 보고 (조용한 성공 처리 금지)
//!
//! ## 순서 보장
//! 한 client가 한 문항에 대해 보낸 `submit_answer`들은 제출 순서대로
//! 관찰되어야 합니다. client가 서로 다른 경우의 순서는 보장하지 않습니다
//! (기록 단위 last-write-wins라 애초에 순서 무관).

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::AppError;
use crate::models::{
    AnswerRecord, ClientScoreSummary, Question, QuestionBank, QuizSummary, Session,
};
use std::future::Future;
use tokio::sync::broadcast;

/// 답안 변경 알림 피드 — `subscribe()`가 돌려주는 구독 핸들
///
/// 내부적으로 broadcast 채널의 수신측을 들고 있습니다.
/// 핸들을 drop하면 구독이 해제되어 이후 알림은 수신되지 않습니다.
pub struct AnswerFeed {
    session_id: String,
    rx: broadcast::Receiver<String>,
}

impl AnswerFeed {
    pub fn new(session_id: String, rx: broadcast::Receiver<String>) -> Self {
        Self { session_id, rx }
    }

    /// 이 세션의 답안이 변경될 때까지 기다립니다.
    ///
    /// - `true`: 변경이 있었음 (밀려서 일부를 놓친 경우도 포함 — 어차피
    ///   소비자는 전체 스냅숏을 다시 읽으므로 "다시 읽어라"로 충분합니다)
    /// - `false`: 채널이 닫힘 — 더 이상 알림은 오지 않으니 소비자는
    ///   폴링만으로 계속 진행해야 합니다
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.rx.recv().await {
                Ok(id) if id == self.session_id => return true,
                Ok(_) => continue, // 다른 세션의 변경은 무시
                Err(broadcast::error::RecvError::Lagged(_)) => return true,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }
}

/// 세션 스토어 인터페이스
///
/// 모든 연산은 비동기이며 이벤트 루프를 블로킹하지 않습니다.
/// 상태 기계들(`SessionManager`, `ClientSession`)은 이 트레이트에 대해
/// 제네릭으로 작성되어 있어 백엔드를 통째로 갈아끼울 수 있습니다.
///
/// 반환 타입을 `impl Future + Send`로 명시한 이유: 집계 워처가
/// `tokio::spawn`으로 분리된 태스크에서 스토어를 호출하므로,
/// 제네릭 호출 지점에서도 Future의 Send가 보장되어야 합니다.
pub trait SessionStore: Clone + Send + Sync + 'static {
    // ── 퀴즈(문제 은행) CRUD ──

    /// 파싱된 은행을 영속화합니다.
    fn save_quiz(&self, bank: &QuestionBank) -> impl Future<Output = Result<(), AppError>> + Send;

    /// 은행을 정규 순서 그대로 다시 읽습니다. 없으면 `NotFound`.
    fn get_quiz(&self, quiz_id: &str)
        -> impl Future<Output = Result<QuestionBank, AppError>> + Send;

    /// 업로드된 퀴즈 목록 (최신순).
    fn list_quizzes(&self) -> impl Future<Output = Result<Vec<QuizSummary>, AppError>> + Send;

    /// 퀴즈와 이를 참조하는 모든 세션/답안을 연쇄 삭제합니다.
    /// 부분 실패는 `CascadeDeleteIncomplete`로 보고해야 합니다.
    fn delete_quiz(&self, quiz_id: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    // ── 세션 수명주기 ──

    /// 표시 순서를 내장한 새 활성 세션을 만듭니다.
    /// 활성 세션이 이미 있으면 `SessionConflict` — 이 검사는 원자적이어야 합니다.
    fn create_session(
        &self,
        bank: &QuestionBank,
        display_questions: Vec<Question>,
    ) -> impl Future<Output = Result<Session, AppError>> + Send;

    /// 유일한 활성 세션을 반환합니다. 없으면 None.
    fn active_session(&self) -> impl Future<Output = Result<Option<Session>, AppError>> + Send;

    /// id로 세션을 조회합니다 (활성 여부 무관).
    fn get_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<Session>, AppError>> + Send;

    /// 세션을 종료합니다 (`is_active = false`, `ended_at` 기록).
    /// `purge_answers`가 true면 이 세션의 답안 기록을 함께 삭제합니다(비가역).
    /// 세션이 없으면 조용히 넘어가지 않고 `NotFound`로 실패합니다.
    fn end_session(
        &self,
        session_id: &str,
        purge_answers: bool,
    ) -> impl Future<Output = Result<Session, AppError>> + Send;

    // ── 답안 ──

    /// (세션, 문항, client) 키로 답안을 업서트합니다. last-write-wins.
    fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        client_name: &str,
        selected: &[String],
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// 세션의 현재 답안 기록 전체 스냅숏.
    fn answers_for_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<AnswerRecord>, AppError>> + Send;

    /// 답안 변경 알림을 구독합니다. 반환된 피드를 drop하면 구독 해제입니다.
    fn subscribe(&self, session_id: &str) -> AnswerFeed;

    // ── 최종 제출 ──

    /// client의 최종 점수 요약을 기록합니다.
    /// 같은 (세션, client)로 이미 기록이 있으면 `AlreadySubmitted`.
    fn record_submission(
        &self,
        session_id: &str,
        summary: &ClientScoreSummary,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// 기록된 최종 제출을 조회합니다. 없으면 None.
    fn get_submission(
        &self,
        session_id: &str,
        client_name: &str,
    ) -> impl Future<Output = Result<Option<ClientScoreSummary>, AppError>> + Send;
}
