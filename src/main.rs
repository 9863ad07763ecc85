//! # Quizindo 웹 서버 진입점
//!
//! 이 파일은 Quizindo 애플리케이션의 **시작점(entry point)**입니다.
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. SQLite 데이터베이스 연결 풀 생성
//! 4. 데이터베이스 마이그레이션 실행
//! 5. 공유 상태(AppState) 조립 — 스토어, 세션 상태 기계
//! 6. API 라우터 설정 및 HTTP 서버 시작

use anyhow::Result;
use quizindo::config::Config;
use quizindo::routes::quizzes::AppState;
use quizindo::session::SessionManager;
use quizindo::store::SqliteStore;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // RUST_LOG 환경변수로 로그 레벨을 제어합니다.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizindo=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting Quizindo server on {}:{}", config.host, config.port);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = SqliteStore::new(pool);
    let mut manager = SessionManager::new(
        store.clone(),
        Duration::from_millis(config.answer_poll_interval_ms),
    );
    // 이전 실행이 남긴 활성 세션이 있으면 이 기계가 이어받습니다.
    manager.resume().await?;

    let state = AppState {
        store,
        config: config.clone(),
        manager: Arc::new(Mutex::new(manager)),
        clients: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = quizindo::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
