//! # 퀴즈(문제 은행) 라우트 핸들러
//!
//! owner가 CSV 은행을 올리고 관리하는 HTTP 핸들러들입니다.
//!
//! ## 엔드포인트
//! - `POST   /api/v1/quizzes`     → CSV 업로드 + 파싱 + 저장 (owner)
//! - `GET    /api/v1/quizzes`     → 퀴즈 목록 조회 (owner)
//! - `GET    /api/v1/quizzes/{id}` → 은행 전체 조회, 정답 포함 (owner)
//! - `DELETE /api/v1/quizzes/{id}` → 퀴즈 + 세션 + 답안 연쇄 삭제 (owner)
//!
//! ## Axum 핸들러 패턴
//! 핸들러는 Extractor를 매개변수로 받습니다:
//! - `State(state)`: 앱 전역 상태 (스토어, 설정, 상태 기계들)
//! - `OwnerAuth`: X-Owner-Name 헤더를 허용 리스트와 대조하는 커스텀 Extractor
//! - `Json(req)`: 요청 본문을 구조체로 파싱
//!
//! 반환 타입이 `Result<T, AppError>`이면 Axum이 자동으로:
//! - `Ok(T)` → HTTP 응답 (IntoResponse)
//! - `Err(AppError)` → 에러 JSON 응답

use crate::{
    config::Config,
    error::AppError,
    middleware::auth::OwnerAuth,
    models::*,
    services,
    session::{ClientSession, SessionManager},
    store::{SessionStore, SqliteStore},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// `SqlitePool`과 마찬가지로 `SqliteStore`도 내부적으로 공유되므로
/// clone 비용은 참조 카운트 증가뿐입니다.
#[derive(Clone)]
pub struct AppState {
    /// 세션 스토어 (SQLite 구현)
    pub store: SqliteStore,
    /// 환경변수에서 읽은 서버 설정
    pub config: Config,
    /// owner 쪽 세션 상태 기계 — 배포 인스턴스당 정확히 하나
    pub manager: Arc<Mutex<SessionManager<SqliteStore>>>,
    /// client 이름 → client 쪽 상태 기계.
    /// 세션이 끝나면 비워집니다 (다음 세션은 새 기계로 시작).
    pub clients: Arc<Mutex<HashMap<String, ClientSession<SqliteStore>>>>,
}

/// `POST /quizzes` — CSV를 파싱해 새 문제 은행을 저장합니다.
///
/// 파싱은 전부-아니면-전무입니다: 은행 어딘가가 잘못되어 있으면
/// 422(`malformed_bank`)로 실패하고 아무것도 저장되지 않습니다.
pub async fn upload_quiz(
    State(state): State<AppState>,
    auth: OwnerAuth,
    Json(req): Json<UploadQuizRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("quiz name is required".to_string()));
    }

    let bank = services::bank::parse_bank(name, &req.csv)?;
    state.store.save_quiz(&bank).await?;

    tracing::info!(
        "Quiz \"{}\" ({} questions) uploaded by {}",
        bank.name,
        bank.questions.len(),
        auth.owner_name
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": bank.quiz_id,
            "name": bank.name,
            "question_count": bank.questions.len(),
        })),
    ))
}

/// `GET /quizzes` — 업로드된 퀴즈 목록을 조회합니다 (최신순).
pub async fn list_quizzes(
    State(state): State<AppState>,
    _auth: OwnerAuth,
) -> Result<Json<Value>, AppError> {
    let quizzes = state.store.list_quizzes().await?;
    Ok(Json(json!({ "quizzes": quizzes })))
}

/// `GET /quizzes/{id}` — 은행 전체를 정답 플래그 포함으로 조회합니다.
///
/// 정답이 그대로 내려가므로 owner 전용입니다. client에게 보여줄
/// 형태는 `GET /sessions/active`의 정답 제거 뷰를 사용합니다.
pub async fn get_quiz(
    State(state): State<AppState>,
    _auth: OwnerAuth,
    Path(id): Path<String>,
) -> Result<Json<QuestionBank>, AppError> {
    let bank = state.store.get_quiz(&id).await?;
    Ok(Json(bank))
}

/// `DELETE /quizzes/{id}` — 퀴즈와 이를 참조하는 세션/답안을 연쇄 삭제합니다.
///
/// 진행 중인 세션이 이 퀴즈를 쓰고 있으면 먼저 끝내야 합니다 (409).
/// 부분 삭제 실패는 스토어가 `cascade_delete_incomplete`로 보고합니다.
pub async fn delete_quiz(
    State(state): State<AppState>,
    auth: OwnerAuth,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    {
        let manager = state.manager.lock().await;
        if let Some(session) = manager.active_session() {
            if session.quiz_id == id {
                return Err(AppError::SessionConflict);
            }
        }
    }

    state.store.delete_quiz(&id).await?;
    tracing::info!("Quiz {} deleted by {}", id, auth.owner_name);
    Ok(StatusCode::NO_CONTENT)
}
