//! # Quizindo — 브라우저 퀴즈 세션 서버
//!
//! CSV로 작성한 문제 은행을 올려 두고, owner가 라이브 세션을 열면
//! client들이 참여해 문항 단위로 답을 제출하는 시스템의 백엔드입니다.
//! owner는 답안이 들어오는 대로 실시간 집계를 봅니다.
//!
//! 핵심 설계:
//! - 활성 세션은 시스템 전체에 **최대 1개** (스토어가 원자적으로 강제)
//! - 세션 시작 시 문항/선택지 순서를 셔플해 세션에 **고정** — 모든
//!   client가 같은 순서를 봅니다
//! - 채점은 선택 집합과 정답 집합의 **정확한 일치** 기준 (부분 점수 없음)
//!
//! 라이브러리 + 바이너리로 나뉘어 있어 통합 테스트가 실제 라우터를
//! 그대로 띄울 수 있습니다. 바이너리(main.rs)는 설정을 읽고 라우터를
//! 서빙하는 얇은 껍데기입니다.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod store;

use axum::{
    routing::{get, post},
    Router,
};
use routes::quizzes::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// 전체 애플리케이션 라우터를 만듭니다.
///
/// `/api/v1` 아래에 모든 엔드포인트를 중첩하고 CORS와 요청 로깅
/// 미들웨어를 얹습니다. 테스트와 main이 같은 라우터를 공유합니다.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        // 문제 은행 CRUD (owner)
        .route(
            "/quizzes",
            get(routes::list_quizzes).post(routes::upload_quiz),
        )
        .route(
            "/quizzes/{id}",
            get(routes::get_quiz).delete(routes::delete_quiz),
        )
        // 세션 수명주기 (owner)
        .route("/sessions/preview", post(routes::preview_session))
        .route("/sessions", post(routes::start_session))
        .route("/sessions/stats", get(routes::session_stats))
        .route("/sessions/{id}/end", post(routes::end_session))
        // client 참여/답안/최종 제출
        .route("/sessions/active", get(routes::active_session))
        .route("/sessions/{id}/answers", post(routes::submit_answer))
        .route("/sessions/{id}/submit", post(routes::finalize_session))
        // 헬스체크
        .route("/health", get(routes::health_check))
        .with_state(state);

    // 개발 환경 기준 CORS. 프로덕션에서는 출처를 좁혀야 합니다.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
