//! SQLite 스토어의 계약 검증 테스트
//!
//! `SessionStore` 트레이트 문서가 약속하는 동작들을 실제 SQLite 구현이
//! 지키는지 확인합니다. 특히 DB 수준에서 원자적으로 강제되어야 하는
//! 불변식(활성 세션 1개, 재제출 거부)을 집중적으로 봅니다.

mod common;

use common::{geo_bank, memory_store};
use quizindo::error::AppError;
use quizindo::models::ClientScoreSummary;
use quizindo::store::SessionStore;

#[tokio::test]
async fn quiz_round_trips_in_canonical_order() {
    let store = memory_store().await;
    let bank = geo_bank();
    store.save_quiz(&bank).await.unwrap();

    let loaded = store.get_quiz(&bank.quiz_id).await.unwrap();
    assert_eq!(loaded.name, "geography");
    assert_eq!(loaded.questions, bank.questions);

    let listed = store.list_quizzes().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].question_count, 2);
}

#[tokio::test]
async fn second_active_session_is_rejected_atomically() {
    let store = memory_store().await;
    let bank = geo_bank();
    store.save_quiz(&bank).await.unwrap();

    // 두 생성을 동시에 경쟁시킵니다 — 사전 조회가 아니라 INSERT 자체가
    // 충돌을 판정하므로, 어느 쪽이 이기든 정확히 하나만 이겨야 합니다
    let (a, b) = tokio::join!(
        store.create_session(&bank, bank.questions.clone()),
        store.create_session(&bank, bank.questions.clone()),
    );
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(AppError::SessionConflict)))
            .count(),
        1
    );

    // 활성 세션 조회는 경쟁의 승자를 돌려줍니다
    let winner = results.into_iter().find_map(|r| r.ok()).unwrap();
    assert!(winner.is_active);
    let active = store.active_session().await.unwrap().unwrap();
    assert_eq!(active.id, winner.id);

    // 승자를 끝내면 다시 시작할 수 있습니다
    store.end_session(&winner.id, false).await.unwrap();
    store
        .create_session(&bank, bank.questions.clone())
        .await
        .unwrap();
}

#[tokio::test]
async fn answer_upsert_keeps_only_the_last_write() {
    let store = memory_store().await;
    let bank = geo_bank();
    store.save_quiz(&bank).await.unwrap();
    let session = store
        .create_session(&bank, bank.questions.clone())
        .await
        .unwrap();
    let q1 = &session.questions[0].id;

    store
        .submit_answer(&session.id, q1, "alice", &["Busan".to_string()])
        .await
        .unwrap();
    store
        .submit_answer(&session.id, q1, "alice", &["Seoul".to_string()])
        .await
        .unwrap();

    let answers = store.answers_for_session(&session.id).await.unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].selected, vec!["Seoul".to_string()]);
}

#[tokio::test]
async fn subscription_fires_on_answer_change() {
    let store = memory_store().await;
    let bank = geo_bank();
    store.save_quiz(&bank).await.unwrap();
    let session = store
        .create_session(&bank, bank.questions.clone())
        .await
        .unwrap();

    let mut feed = store.subscribe(&session.id);
    store
        .submit_answer(
            &session.id,
            &session.questions[0].id,
            "alice",
            &["Seoul".to_string()],
        )
        .await
        .unwrap();

    assert!(feed.changed().await);
}

#[tokio::test]
async fn ending_a_missing_session_fails_loudly() {
    let store = memory_store().await;
    let err = store.end_session("no-such-session", false).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn end_without_purge_keeps_answer_records() {
    let store = memory_store().await;
    let bank = geo_bank();
    store.save_quiz(&bank).await.unwrap();
    let session = store
        .create_session(&bank, bank.questions.clone())
        .await
        .unwrap();
    store
        .submit_answer(
            &session.id,
            &session.questions[0].id,
            "alice",
            &["Seoul".to_string()],
        )
        .await
        .unwrap();

    let ended = store.end_session(&session.id, false).await.unwrap();
    assert!(!ended.is_active);
    assert!(ended.ended_at.is_some());

    // 기본 정책: 사후 분석을 위해 답안은 남습니다
    let answers = store.answers_for_session(&session.id).await.unwrap();
    assert_eq!(answers.len(), 1);
}

#[tokio::test]
async fn end_with_purge_discards_answer_records() {
    let store = memory_store().await;
    let bank = geo_bank();
    store.save_quiz(&bank).await.unwrap();
    let session = store
        .create_session(&bank, bank.questions.clone())
        .await
        .unwrap();
    store
        .submit_answer(
            &session.id,
            &session.questions[0].id,
            "alice",
            &["Seoul".to_string()],
        )
        .await
        .unwrap();

    store.end_session(&session.id, true).await.unwrap();

    let answers = store.answers_for_session(&session.id).await.unwrap();
    assert!(answers.is_empty());
}

#[tokio::test]
async fn duplicate_submission_is_rejected() {
    let store = memory_store().await;
    let bank = geo_bank();
    store.save_quiz(&bank).await.unwrap();
    let session = store
        .create_session(&bank, bank.questions.clone())
        .await
        .unwrap();

    let summary = ClientScoreSummary {
        client_name: "alice".to_string(),
        per_question_correct: vec![true, true],
        points_earned: 3,
        points_possible: 3,
        percentage: 100,
        passed: true,
    };

    store.record_submission(&session.id, &summary).await.unwrap();
    let err = store
        .record_submission(&session.id, &summary)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadySubmitted));

    let stored = store
        .get_submission(&session.id, "alice")
        .await
        .unwrap()
        .expect("submission recorded");
    assert_eq!(stored.percentage, 100);
    assert!(stored.passed);
}

#[tokio::test]
async fn delete_quiz_cascades_to_sessions_and_answers() {
    let store = memory_store().await;
    let bank = geo_bank();
    store.save_quiz(&bank).await.unwrap();
    let session = store
        .create_session(&bank, bank.questions.clone())
        .await
        .unwrap();
    store
        .submit_answer(
            &session.id,
            &session.questions[0].id,
            "alice",
            &["Seoul".to_string()],
        )
        .await
        .unwrap();
    store.end_session(&session.id, false).await.unwrap();

    store.delete_quiz(&bank.quiz_id).await.unwrap();

    assert!(matches!(
        store.get_quiz(&bank.quiz_id).await.unwrap_err(),
        AppError::NotFound
    ));
    assert!(store.get_session(&session.id).await.unwrap().is_none());
    assert!(store
        .answers_for_session(&session.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn deleting_a_missing_quiz_is_not_found() {
    let store = memory_store().await;
    let err = store.delete_quiz("no-such-quiz").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}
