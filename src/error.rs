//! # 에러 처리 모듈
//!
//! 애플리케이션에서 발생할 수 있는 모든 에러 타입을 정의합니다.
//! Rust에서는 예외(exception) 대신 `Result<T, E>` 타입으로 에러를 처리합니다.
//!
//! 이 모듈의 핵심:
//! - `AppError` 열거형(enum): 파싱/세션/스토어 에러를 하나의 타입으로 통합
//! - `IntoResponse` 구현: 에러를 HTTP 응답으로 자동 변환
//!
//! ## 전파 정책
//! - 파싱/검증 에러(`MalformedBank`)는 해당 연산에서 종결 — 재시도 없음
//! - 읽기 경로의 스토어 장애는 폴링으로 강등 (집계 워처가 담당)
//! - 쓰기 경로의 스토어 장애는 호출자에게 그대로 노출 — 조용한 유실 금지

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 애플리케이션에서 발생할 수 있는 모든 에러 종류
///
/// 각 에러 variant는 적절한 HTTP 상태 코드와 메시지로 변환됩니다.
/// 핸들러에서 `Result<T, AppError>`를 반환하면,
/// Axum이 자동으로 `IntoResponse`를 호출하여 HTTP 응답으로 변환합니다.
#[derive(Debug, Error)]
pub enum AppError {
    /// 요청한 리소스를 찾을 수 없음 (HTTP 404)
    /// 활성 세션이 없을 때, 퀴즈/세션 id가 존재하지 않을 때 사용됩니다.
    #[error("Resource not found")]
    NotFound,

    /// 잘못된 요청 (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 문제 은행(CSV) 파싱 실패 (HTTP 422)
    /// 행이 3개 미만이거나, 선택지가 하나도 없는 문항이 있거나,
    /// 정답 표시(백틱)가 없는 문항이 있으면 발생합니다.
    /// 부분적으로 파싱된 은행은 절대 만들어지지 않습니다.
    #[error("Malformed question bank: {0}")]
    MalformedBank(String),

    /// 이미 활성 세션이 있는데 새 세션을 시작하려 함 (HTTP 409)
    /// "활성 세션은 최대 1개" 불변식은 스토어의 원자적 조건부 쓰기로
    /// 강제되며, 이 에러는 그 충돌을 그대로 전파한 것입니다.
    #[error("An active session already exists")]
    SessionConflict,

    /// 최종 제출(finalize) 이후의 재제출 시도 (HTTP 409)
    #[error("Answers already submitted for this session")]
    AlreadySubmitted,

    /// 스토어/전송 계층 장애 (HTTP 503)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// 다단계 삭제(퀴즈 → 세션 → 답안)가 중간에 실패 (HTTP 500)
    /// 어느 단계에서 멈췄는지 식별할 수 있도록 stage를 함께 기록합니다.
    /// 조용히 성공으로 처리하는 것은 허용되지 않습니다.
    #[error("Cascade delete of quiz {quiz_id} failed at stage `{stage}`: {source}")]
    CascadeDeleteIncomplete {
        quiz_id: String,
        stage: &'static str,
        source: sqlx::Error,
    },

    /// 서버 내부 오류 (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// 데이터베이스 쿼리 오류 (HTTP 500)
    /// sqlx 호출에 `?` 연산자를 쓰면 아래 From 구현을 거쳐 이 variant
    /// 또는 `StoreUnavailable`이 됩니다.
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// 인증 실패 (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<sqlx::Error> for AppError {
    /// sqlx 에러를 성격에 따라 나눕니다.
    ///
    /// 연결/풀 수준의 장애는 쿼리가 틀린 것이 아니라 스토어 자체에
    /// 닿지 못한 것이므로 `StoreUnavailable`(503)로 분류합니다.
    /// 나머지(쿼리, 디코딩 등)는 `Database`(500)입니다.
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::StoreUnavailable(err.to_string())
            }
            _ => AppError::Database(err),
        }
    }
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 각 에러 종류에 따라 적절한 HTTP 상태 코드와 JSON 에러 메시지를 생성합니다.
    /// 내부 에러(Database, Internal, CascadeDeleteIncomplete)는 실제 에러
    /// 내용을 로그에만 기록하고, 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),

            AppError::BadRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone())
            }
            AppError::MalformedBank(ref msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "malformed_bank",
                format!("Malformed question bank: {}", msg),
            ),
            AppError::SessionConflict => {
                (StatusCode::CONFLICT, "session_conflict", self.to_string())
            }
            AppError::AlreadySubmitted => {
                (StatusCode::CONFLICT, "already_submitted", self.to_string())
            }
            AppError::StoreUnavailable(ref msg) => {
                tracing::error!("Store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "The session store is temporarily unavailable".to_string(),
                )
            }
            AppError::CascadeDeleteIncomplete {
                ref quiz_id,
                stage,
                ref source,
            } => {
                // 부분 삭제는 치명적 에러로 보고합니다.
                // 무엇이 지워졌고 무엇이 남았는지 로그에서 식별 가능해야 합니다.
                tracing::error!(
                    "Cascade delete of quiz {} failed at stage `{}`: {}",
                    quiz_id,
                    stage,
                    source
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "cascade_delete_incomplete",
                    format!("Delete of quiz {} failed at stage `{}`", quiz_id, stage),
                )
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Unauthorized(ref msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
        };

        // 결과: { "error": { "code": "session_conflict", "message": "..." } }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_level_failures_become_store_unavailable() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::StoreUnavailable(_)));

        let err: AppError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }

    #[test]
    fn query_level_failures_stay_database_errors() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::Database(_)));
    }
}
