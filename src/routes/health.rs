//! # 헬스체크(Health Check) 핸들러
//!
//! 서버 생존 확인용 엔드포인트입니다.
//!
//! ## 엔드포인트
//! - `GET /api/v1/health` → `{ "status": "ok" }`
//!
//! 리버스 프록시나 컨테이너 헬스체크가 이 경로를 주기적으로 때립니다.

use axum::Json;
use serde_json::{json, Value};

/// `GET /health` — 서버 상태를 확인합니다.
///
/// Extractor도 Result도 없는 가장 단순한 핸들러 형태입니다.
/// 프로세스가 떠 있기만 하면 항상 200을 돌려줍니다.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok"
    }))
}
