//! # ClientSession — client 쪽 세션 상태 기계
//!
//! ## 상태 전이
//! ```text
//! AwaitingSession ──join()──> Answering ──finalize()──> Submitted
//!        ▲                        │
//!        └── 세션이 사라지면 복귀 ──┘
//! ```
//!
//! 규칙:
//! - Answering에 들어갈 때 세션에 내장된 표시 순서를 **동결**합니다.
//!   client가 다시 셔플하지 않아야 owner와 client의 집계가 맞습니다.
//! - 답안은 선택이 바뀔 때마다 문항 단위로 즉시 업서트됩니다 (라이브 집계용).
//! - finalize 이후의 모든 제출 시도는 `AlreadySubmitted`로 거부됩니다.
//! - Answering 도중 세션이 사라지면(owner가 종료) AwaitingSession으로
//!   돌아가며, 이미 문항 단위로 제출된 것 외의 진행 상태는 버립니다.

use crate::error::AppError;
use crate::models::{ClientScoreSummary, Session};
use crate::services::scoring;
use crate::store::SessionStore;

enum ClientState {
    /// 활성 세션을 기다리는 중
    AwaitingSession,
    /// 참여 중 — 세션의 표시 순서가 동결되어 있음
    Answering { session: Session },
    /// 최종 제출 완료 — 이 세션에 대해서는 더 이상 아무것도 못 바꿈
    Submitted {
        session_id: String,
        summary: ClientScoreSummary,
    },
}

/// client 쪽 세션 상태 기계 — client 한 명(이름 기준)의 상태를 소유합니다.
pub struct ClientSession<S: SessionStore> {
    store: S,
    client_name: String,
    pass_percentage: u8,
    state: ClientState,
}

impl<S: SessionStore> ClientSession<S> {
    pub fn new(store: S, client_name: String, pass_percentage: u8) -> Self {
        Self {
            store,
            client_name,
            pass_percentage,
            state: ClientState::AwaitingSession,
        }
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// 활성 세션을 찾아 참여합니다.
    ///
    /// - AwaitingSession: 활성 세션이 있으면 그 표시 순서를 동결하고
    ///   Answering으로 전이, 없으면 None (호출자가 다시 폴링)
    /// - Answering: 이미 동결한 세션을 그대로 반환 (재조회로 순서가
    ///   바뀌는 일은 없어야 합니다)
    /// - Submitted: `AlreadySubmitted`
    pub async fn join(&mut self) -> Result<Option<&Session>, AppError> {
        match &self.state {
            ClientState::Submitted { .. } => return Err(AppError::AlreadySubmitted),
            ClientState::Answering { .. } => {}
            ClientState::AwaitingSession => {
                if let Some(session) = self.store.active_session().await? {
                    tracing::debug!(
                        "client {} joined session {}",
                        self.client_name,
                        session.id
                    );
                    self.state = ClientState::Answering { session };
                }
            }
        }
        match &self.state {
            ClientState::Answering { session } => Ok(Some(session)),
            _ => Ok(None),
        }
    }

    /// 문항 하나의 현재 선택을 제출(업서트)합니다.
    ///
    /// 같은 문항을 다시 토글하면 그냥 다시 업서트될 뿐입니다.
    /// 세션이 그 사이 종료되었으면 AwaitingSession으로 복귀하고
    /// `NotFound`를 돌려줍니다.
    pub async fn answer(
        &mut self,
        question_id: &str,
        selected: &[String],
    ) -> Result<(), AppError> {
        let session_id = match &self.state {
            ClientState::Submitted { .. } => return Err(AppError::AlreadySubmitted),
            ClientState::AwaitingSession => return Err(AppError::NotFound),
            ClientState::Answering { session } => {
                if !session.questions.iter().any(|q| q.id == question_id) {
                    return Err(AppError::BadRequest(format!(
                        "question {} is not part of this session",
                        question_id
                    )));
                }
                session.id.clone()
            }
        };

        // 동결해 둔 세션이 여전히 활성인지 확인합니다.
        // owner가 끝냈다면 진행 상태를 버리고 대기로 돌아갑니다.
        let still_active = self
            .store
            .get_session(&session_id)
            .await?
            .map(|s| s.is_active)
            .unwrap_or(false);
        if !still_active {
            tracing::debug!(
                "session {} ended while client {} was answering",
                session_id,
                self.client_name
            );
            self.state = ClientState::AwaitingSession;
            return Err(AppError::NotFound);
        }

        self.store
            .submit_answer(&session_id, question_id, &self.client_name, selected)
            .await
    }

    /// 최종 제출 — 동결된 문항들과 저장된 답안으로 점수 요약을 계산하고
    /// 기록한 뒤 Submitted로 전이합니다.
    ///
    /// 채점은 정규 정체성(선택지에 붙은 correct 플래그)을 기준으로 하므로
    /// 표시 순서가 어떻게 셔플되었든 결과는 같습니다.
    pub async fn finalize(&mut self) -> Result<ClientScoreSummary, AppError> {
        let session = match &self.state {
            ClientState::Submitted { .. } => return Err(AppError::AlreadySubmitted),
            ClientState::AwaitingSession => return Err(AppError::NotFound),
            ClientState::Answering { session } => session.clone(),
        };

        let answers = self.store.answers_for_session(&session.id).await?;
        let mine: Vec<_> = answers
            .into_iter()
            .filter(|a| a.client_name == self.client_name)
            .collect();

        let summary = scoring::summarize(
            &session.questions,
            &mine,
            &self.client_name,
            self.pass_percentage,
        );

        // 스토어의 기본 키가 재제출을 막으므로, 동시 finalize 경합도
        // 여기서 AlreadySubmitted로 정리됩니다.
        self.store.record_submission(&session.id, &summary).await?;

        tracing::info!(
            "client {} finalized session {}: {}% ({})",
            self.client_name,
            session.id,
            summary.percentage,
            if summary.passed { "pass" } else { "fail" }
        );

        self.state = ClientState::Submitted {
            session_id: session.id,
            summary: summary.clone(),
        };
        Ok(summary)
    }

    /// 제출된 점수 요약 (Submitted 상태에서만 Some).
    pub fn summary(&self) -> Option<&ClientScoreSummary> {
        match &self.state {
            ClientState::Submitted { summary, .. } => Some(summary),
            _ => None,
        }
    }

    /// 이 기계가 현재 참여(또는 제출)하고 있는 세션 id.
    pub fn session_id(&self) -> Option<&str> {
        match &self.state {
            ClientState::Answering { session } => Some(&session.id),
            ClientState::Submitted { session_id, .. } => Some(session_id),
            ClientState::AwaitingSession => None,
        }
    }

    pub fn state_name(&self) -> &'static str {
        match &self.state {
            ClientState::AwaitingSession => "awaiting_session",
            ClientState::Answering { .. } => "answering",
            ClientState::Submitted { .. } => "submitted",
        }
    }
}
