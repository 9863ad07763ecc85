//! HTTP 레벨 통합 테스트
//!
//! 실제 라우터를 임의 포트에 띄우고 reqwest로 때려서, 인증 헤더 검사와
//! owner/client의 전체 퀴즈 흐름이 HTTP 계약대로 동작하는지 확인합니다.

mod common;

use common::{memory_store, GEO_CSV};
use quizindo::config::Config;
use quizindo::routes::quizzes::AppState;
use quizindo::session::SessionManager;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const OWNER_HEADER: &str = "X-Owner-Name";

struct TestApp {
    base: String,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base, path)
    }
}

/// 라우터를 127.0.0.1의 임의 포트에 띄우고 주소를 돌려줍니다.
async fn spawn_app() -> TestApp {
    let store = memory_store().await;
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        owner_names: vec!["owner".to_string()],
        pass_percentage: 90,
        answer_poll_interval_ms: 50,
        purge_on_end: false,
        host: "127.0.0.1".to_string(),
        port: 0,
    };

    let manager = SessionManager::new(store.clone(), Duration::from_millis(50));
    let state = AppState {
        store,
        config,
        manager: Arc::new(Mutex::new(manager)),
        clients: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = quizindo::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve test app");
    });

    TestApp {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;
    let res = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn owner_endpoints_require_the_allow_list() {
    let app = spawn_app().await;

    // 헤더 없음 → 401
    let res = app.client.get(app.url("/quizzes")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // 허용 리스트에 없는 이름 → 403
    let res = app
        .client
        .get(app.url("/quizzes"))
        .header(OWNER_HEADER, "mallory")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_owner");

    // 대소문자만 다른 이름은 owner로 인정됩니다
    let res = app
        .client
        .get(app.url("/quizzes"))
        .header(OWNER_HEADER, "OWNER")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_csv_is_unprocessable() {
    let app = spawn_app().await;
    let res = app
        .client
        .post(app.url("/quizzes"))
        .header(OWNER_HEADER, "owner")
        .json(&json!({ "name": "broken", "csv": "Q?\n\nA\nB" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "malformed_bank");
}

#[tokio::test]
async fn no_active_session_is_not_found() {
    let app = spawn_app().await;
    let res = app
        .client
        .get(app.url("/sessions/active"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_quiz_flow_over_http() {
    let app = spawn_app().await;

    // 1. owner가 CSV 은행을 업로드합니다
    let res = app
        .client
        .post(app.url("/quizzes"))
        .header(OWNER_HEADER, "owner")
        .json(&json!({ "name": "geography", "csv": GEO_CSV }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let uploaded: Value = res.json().await.unwrap();
    let quiz_id = uploaded["id"].as_str().unwrap().to_string();
    assert_eq!(uploaded["question_count"], 2);

    // 정답 대조용으로 은행 전체(정답 플래그 포함)를 받아둡니다
    let res = app
        .client
        .get(app.url(&format!("/quizzes/{}", quiz_id)))
        .header(OWNER_HEADER, "owner")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bank: Value = res.json().await.unwrap();
    let mut correct_by_id: HashMap<String, Vec<String>> = HashMap::new();
    for question in bank["questions"].as_array().unwrap() {
        let id = question["id"].as_str().unwrap().to_string();
        let correct = question["options"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|o| o["correct"] == true)
            .map(|o| o["text"].as_str().unwrap().to_string())
            .collect();
        correct_by_id.insert(id, correct);
    }

    // 2. 미리보기 후 세션 시작
    let res = app
        .client
        .post(app.url("/sessions/preview"))
        .header(OWNER_HEADER, "owner")
        .json(&json!({ "quiz_id": quiz_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .client
        .post(app.url("/sessions"))
        .header(OWNER_HEADER, "owner")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let session: Value = res.json().await.unwrap();
    let session_id = session["id"].as_str().unwrap().to_string();

    // 3. client가 활성 세션을 조회합니다 — 정답 플래그가 없어야 합니다
    let res = app
        .client
        .get(app.url("/sessions/active?client_name=alice"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let view: Value = res.json().await.unwrap();
    assert_eq!(view["session_id"].as_str().unwrap(), session_id);
    let questions = view["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    for question in questions {
        assert!(question.get("correct").is_none());
        for option in question["options"].as_array().unwrap() {
            // 선택지는 순수 텍스트입니다 (객체가 아님)
            assert!(option.is_string());
            assert!(!option.as_str().unwrap().starts_with('`'));
        }
    }

    // 4. alice가 전 문항 정답을 제출합니다
    for question in questions {
        let qid = question["id"].as_str().unwrap();
        let res = app
            .client
            .post(app.url(&format!("/sessions/{}/answers", session_id)))
            .json(&json!({
                "client_name": "alice",
                "question_id": qid,
                "selected": correct_by_id[qid],
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    // 5. owner의 실시간 집계에 alice가 보입니다
    tokio::time::sleep(Duration::from_millis(300)).await;
    let res = app
        .client
        .get(app.url("/sessions/stats"))
        .header(OWNER_HEADER, "owner")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let stats: Value = res.json().await.unwrap();
    assert_eq!(stats["session_id"].as_str().unwrap(), session_id);
    assert!(stats["stats"]["participants"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "alice"));

    // 6. 최종 제출 — 만점, 재제출은 409
    let res = app
        .client
        .post(app.url(&format!("/sessions/{}/submit", session_id)))
        .json(&json!({ "client_name": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: Value = res.json().await.unwrap();
    assert_eq!(summary["percentage"], 100);
    assert_eq!(summary["passed"], true);

    let res = app
        .client
        .post(app.url(&format!("/sessions/{}/submit", session_id)))
        .json(&json!({ "client_name": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "already_submitted");

    // 최종 제출한 client도 활성 세션 조회(읽기)는 여전히 됩니다
    let res = app
        .client
        .get(app.url("/sessions/active?client_name=alice"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let view: Value = res.json().await.unwrap();
    assert_eq!(view["session_id"].as_str().unwrap(), session_id);

    // 7. owner가 세션을 끝내면 활성 세션 조회는 404가 됩니다
    let res = app
        .client
        .post(app.url(&format!("/sessions/{}/end", session_id)))
        .header(OWNER_HEADER, "owner")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ended: Value = res.json().await.unwrap();
    assert_eq!(ended["is_active"], false);

    let res = app
        .client
        .get(app.url("/sessions/active"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn starting_twice_conflicts() {
    let app = spawn_app().await;

    let res = app
        .client
        .post(app.url("/quizzes"))
        .header(OWNER_HEADER, "owner")
        .json(&json!({ "name": "geography", "csv": GEO_CSV }))
        .send()
        .await
        .unwrap();
    let quiz_id = res.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    app.client
        .post(app.url("/sessions/preview"))
        .header(OWNER_HEADER, "owner")
        .json(&json!({ "quiz_id": quiz_id }))
        .send()
        .await
        .unwrap();
    app.client
        .post(app.url("/sessions"))
        .header(OWNER_HEADER, "owner")
        .send()
        .await
        .unwrap();

    // 진행 중에는 새 미리보기도, 새 시작도 409입니다
    let res = app
        .client
        .post(app.url("/sessions/preview"))
        .header(OWNER_HEADER, "owner")
        .json(&json!({ "quiz_id": quiz_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .client
        .post(app.url("/sessions"))
        .header(OWNER_HEADER, "owner")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}
