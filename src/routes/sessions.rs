//! # 라이브 세션 라우트 핸들러
//!
//! 세션 수명주기와 client 참여/답안/최종 제출을 처리하는 핸들러들입니다.
//!
//! ## 엔드포인트
//! - `POST /api/v1/sessions/preview`       → 은행 셔플 + 미리보기 (owner)
//! - `POST /api/v1/sessions`               → 라이브 세션 시작 (owner)
//! - `GET  /api/v1/sessions/active`        → 활성 세션 조회, 정답 제거 뷰 (client)
//! - `GET  /api/v1/sessions/stats`         → 실시간 답안 집계 (owner)
//! - `POST /api/v1/sessions/{id}/end`      → 세션 종료 (owner)
//! - `POST /api/v1/sessions/{id}/answers`  → 문항 단위 답안 업서트 (client)
//! - `POST /api/v1/sessions/{id}/submit`   → 최종 제출 + 채점 (client)
//!
//! client 쪽은 요청에 실려 온 `client_name`으로 상태 기계를 찾거나 만들어
//! 위임합니다. 기계가 상태 전이 규칙(AwaitingSession → Answering →
//! Submitted)을 전부 강제하므로 핸들러 자체는 얇습니다.

use crate::{
    error::AppError,
    middleware::auth::OwnerAuth,
    models::*,
    routes::quizzes::AppState,
    session::ClientSession,
    store::{SessionStore, SqliteStore},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// `POST /sessions/preview` — 은행을 셔플해 미리보기 상태로 들어갑니다.
///
/// 응답의 문항 순서가 그대로 세션에 고정됩니다. 마음에 안 들면
/// 다시 preview를 호출해 새로 셔플할 수 있습니다 (Active 중에는 409).
/// 정답 플래그가 포함되므로 owner 전용입니다.
pub async fn preview_session(
    State(state): State<AppState>,
    _auth: OwnerAuth,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<Value>, AppError> {
    let bank = state.store.get_quiz(&req.quiz_id).await?;
    let quiz_name = bank.name.clone();

    let mut manager = state.manager.lock().await;
    let display = manager.preview(bank)?;

    Ok(Json(json!({
        "quiz_id": req.quiz_id,
        "quiz_name": quiz_name,
        "questions": display,
    })))
}

/// `POST /sessions` — 미리보기 중인 은행으로 라이브 세션을 시작합니다.
///
/// 활성 세션이 이미 있으면 409. 이 충돌 검사는 스토어의 원자적
/// 조건부 쓰기가 수행하므로 동시에 두 owner가 눌러도 하나만 이깁니다.
pub async fn start_session(
    State(state): State<AppState>,
    _auth: OwnerAuth,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let mut manager = state.manager.lock().await;
    let session = manager.start().await?;

    // 이전 세션의 client 기계가 남아 있으면 비웁니다.
    state.clients.lock().await.clear();

    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Deserialize)]
pub struct ActiveQuery {
    /// 지정하면 이 이름의 client 상태 기계로 세션에 참여(join)합니다.
    /// 생략하면 기계 없이 현재 활성 세션만 조회합니다.
    pub client_name: Option<String>,
}

/// `GET /sessions/active` — 유일한 활성 세션을 정답 제거 뷰로 돌려줍니다.
///
/// 활성 세션이 없으면 404 — client는 이 응답을 받으면 대기 화면을
/// 유지하고 폴링을 계속합니다.
pub async fn active_session(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<ActiveSessionView>, AppError> {
    if let Some(client_name) = normalized_name(query.client_name.as_deref()) {
        let mut clients = state.clients.lock().await;
        let machine = client_machine(&state, &mut clients, &client_name).await?;
        match machine.join().await {
            Ok(Some(session)) => return Ok(Json(ActiveSessionView::from_session(session))),
            Ok(None) => return Err(AppError::NotFound),
            // 최종 제출한 client도 조회 자체는 할 수 있어야 합니다.
            // 기계는 Submitted를 유지한 채, 아래의 순수 조회로 내려갑니다.
            Err(AppError::AlreadySubmitted) => {}
            Err(e) => return Err(e),
        }
    }

    let session = state.store.active_session().await?.ok_or(AppError::NotFound)?;
    Ok(Json(ActiveSessionView::from_session(&session)))
}

/// `GET /sessions/stats` — 활성 세션의 실시간 답안 집계 (owner).
///
/// 집계 워처가 유지하는 최신 스냅숏을 그대로 돌려줍니다.
/// 집계는 항상 선택지 **텍스트** 기준이므로 client마다 표시 순서가
/// 달라도 같은 선택지는 같은 항목으로 합산됩니다.
pub async fn session_stats(
    State(state): State<AppState>,
    _auth: OwnerAuth,
) -> Result<Json<Value>, AppError> {
    let mut manager = state.manager.lock().await;
    if manager.active_session().is_none() {
        manager.resume().await?;
    }
    let stats = manager.aggregates()?;
    let session = manager.active_session().ok_or(AppError::NotFound)?;

    Ok(Json(json!({
        "session_id": session.id,
        "quiz_name": session.quiz_name,
        "stats": stats,
    })))
}

/// `POST /sessions/{id}/end` — 진행 중인 세션을 끝냅니다 (owner).
///
/// `purge_answers`를 생략하면 서버 설정(PURGE_ON_END)의 기본값을
/// 따릅니다. 삭제는 비가역입니다.
pub async fn end_session(
    State(state): State<AppState>,
    auth: OwnerAuth,
    Path(id): Path<String>,
    Json(req): Json<EndSessionRequest>,
) -> Result<Json<Session>, AppError> {
    let mut manager = state.manager.lock().await;
    // 기계가 이 세션을 놓친 상태라면(재시작 등) 스토어에서 입양을 시도합니다.
    // 그래야 살아 있는 세션이 끝낼 수 없는 세션이 되지 않습니다.
    if !matches!(manager.active_session(), Some(s) if s.id == id) {
        manager.resume().await?;
    }
    match manager.active_session() {
        Some(session) if session.id == id => {}
        _ => return Err(AppError::NotFound),
    }

    let purge = req.purge_answers.unwrap_or(state.config.purge_on_end);
    let ended = manager.end(purge).await?;

    // 끝난 세션의 client 기계들은 폐기합니다.
    state.clients.lock().await.clear();

    tracing::info!("Session {} ended by {}", ended.id, auth.owner_name);
    Ok(Json(ended))
}

/// `POST /sessions/{id}/answers` — 문항 하나의 현재 선택을 업서트합니다.
///
/// client가 선택지를 토글할 때마다 호출됩니다 (last-write-wins).
/// 최종 제출 이후에는 409(`already_submitted`).
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<StatusCode, AppError> {
    let client_name = normalized_name(Some(&req.client_name))
        .ok_or_else(|| AppError::BadRequest("client_name is required".to_string()))?;

    let mut clients = state.clients.lock().await;
    let machine = client_machine(&state, &mut clients, &client_name).await?;
    machine.join().await?;
    if machine.session_id() != Some(id.as_str()) {
        return Err(AppError::NotFound);
    }

    machine.answer(&req.question_id, &req.selected).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /sessions/{id}/submit` — 최종 제출. 채점 결과 요약을 돌려줍니다.
///
/// 한 client는 세션당 한 번만 최종 제출할 수 있습니다.
/// 같은 요청을 다시 보내면 409(`already_submitted`)입니다.
pub async fn finalize_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<FinalizeRequest>,
) -> Result<Json<ClientScoreSummary>, AppError> {
    let client_name = normalized_name(Some(&req.client_name))
        .ok_or_else(|| AppError::BadRequest("client_name is required".to_string()))?;

    let mut clients = state.clients.lock().await;
    let machine = client_machine(&state, &mut clients, &client_name).await?;
    machine.join().await?;
    if machine.session_id() != Some(id.as_str()) {
        return Err(AppError::NotFound);
    }

    let summary = machine.finalize().await?;
    Ok(Json(summary))
}

fn normalized_name(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// client 이름으로 상태 기계를 찾거나 만듭니다.
///
/// 이미 있는 기계가 **다른** 세션에 묶여 있으면(이전 세션의 잔재)
/// 새 기계로 교체합니다. 같은 세션에 묶인 기계는 Submitted 상태라도
/// 그대로 유지합니다 — 그래야 재제출이 `AlreadySubmitted`로 막힙니다.
async fn client_machine<'a>(
    state: &AppState,
    clients: &'a mut HashMap<String, ClientSession<SqliteStore>>,
    client_name: &str,
) -> Result<&'a mut ClientSession<SqliteStore>, AppError> {
    let stale = match clients.get(client_name) {
        Some(machine) => match machine.session_id() {
            Some(bound) => {
                let still_active = state
                    .store
                    .get_session(bound)
                    .await?
                    .map(|s| s.is_active)
                    .unwrap_or(false);
                !still_active
            }
            None => false,
        },
        None => false,
    };

    if stale || !clients.contains_key(client_name) {
        clients.insert(
            client_name.to_string(),
            ClientSession::new(
                state.store.clone(),
                client_name.to_string(),
                state.config.pass_percentage,
            ),
        );
    }

    // 바로 위에서 반드시 삽입되었으므로 실패하지 않습니다.
    clients
        .get_mut(client_name)
        .ok_or_else(|| AppError::Internal("client machine lookup failed".to_string()))
}
