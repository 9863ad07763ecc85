//! # SQLite 세션 스토어 구현
//!
//! `SessionStore` 계약의 SQLite(sqlx) 구현입니다.
//!
//! ## 설계 메모
//! - "활성 세션 최대 1개" 불변식은 `one_active_session` 부분 유니크
//!   인덱스가 강제합니다. 두 owner가 동시에 시작해도 한쪽의 INSERT는
//!   DB에서 유니크 위반으로 실패하고, 그것이 `SessionConflict`가 됩니다.
//! - 세션의 표시 순서와 답안 선택지는 JSON 컬럼으로 저장합니다.
//!   세션 조회 한 번이면 고정된 문항 순서 전체가 따라오는 구조입니다.
//! - 답안 업서트 성공 시 broadcast 채널로 세션 id를 쏘아 구독자를 깨웁니다.
//!   채널은 최선-노력(best-effort) 알림일 뿐이고, 구독자는 폴링을
//!   병행하므로 수신자가 없거나 밀려도 문제가 되지 않습니다.

use crate::error::AppError;
use crate::models::{
    AnswerRecord, ClientScoreSummary, Question, QuestionBank, QuizSummary, Session,
};
use crate::store::{AnswerFeed, SessionStore};
use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

/// 답안 변경 알림 채널의 버퍼 크기.
/// 넘치면 수신자가 Lagged를 받지만, 소비자는 어차피 전체 스냅숏을 다시 읽습니다.
const NOTIFY_BUFFER: usize = 64;

/// SQLite 기반 세션 스토어
///
/// `SqlitePool`은 내부적으로 Arc를 사용하므로 clone해도 같은 풀을 가리키고,
/// broadcast 송신측도 clone 가능하므로 스토어 전체가 값싸게 복제됩니다.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    notify: broadcast::Sender<String>,
}

// ── DB 행 ↔ 모델 변환용 내부 구조체 ──

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    quiz_id: String,
    quiz_name: String,
    display_json: String,
    is_active: bool,
    started_at: String,
    ended_at: Option<String>,
}

impl SessionRow {
    /// display_json을 파싱해 모델로 변환합니다.
    /// 저장 시 우리가 직접 직렬화한 값이므로 파싱 실패는 내부 오류입니다.
    fn into_session(self) -> Result<Session, AppError> {
        let questions: Vec<Question> = serde_json::from_str(&self.display_json)
            .map_err(|e| AppError::Internal(format!("corrupt display_json: {}", e)))?;
        Ok(Session {
            id: self.id,
            quiz_id: self.quiz_id,
            quiz_name: self.quiz_name,
            questions,
            is_active: self.is_active,
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    session_id: String,
    question_id: String,
    client_name: String,
    selected_json: String,
    submitted_at: String,
}

impl AnswerRow {
    fn into_record(self) -> Result<AnswerRecord, AppError> {
        let selected: Vec<String> = serde_json::from_str(&self.selected_json)
            .map_err(|e| AppError::Internal(format!("corrupt selected_json: {}", e)))?;
        Ok(AnswerRecord {
            session_id: self.session_id,
            question_id: self.question_id,
            client_name: self.client_name,
            selected,
            submitted_at: self.submitted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    client_name: String,
    points_earned: i64,
    points_possible: i64,
    percentage: i64,
    passed: bool,
    correctness_json: String,
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: String,
    text: String,
    image_ref: Option<String>,
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    text: String,
    correct: bool,
}

/// sqlx 에러가 유니크 제약 위반인지 확인합니다.
/// `create_session`과 `record_submission`이 충돌 판정에 사용합니다.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_BUFFER);
        Self { pool, notify }
    }
}

impl SessionStore for SqliteStore {
    /// 은행 전체(퀴즈 + 문항 + 선택지)를 한 트랜잭션으로 저장합니다.
    async fn save_quiz(&self, bank: &QuestionBank) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO quizzes (id, name, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&bank.quiz_id)
        .bind(&bank.name)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, question) in bank.questions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO questions (id, quiz_id, position, text, image_ref)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&question.id)
            .bind(&bank.quiz_id)
            .bind(position as i64)
            .bind(&question.text)
            .bind(&question.image_ref)
            .execute(&mut *tx)
            .await?;

            for (opt_position, option) in question.options.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO options (question_id, position, text, correct)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(&question.id)
                .bind(opt_position as i64)
                .bind(&option.text)
                .bind(option.correct)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// 은행을 정규 순서(position)대로 복원합니다.
    async fn get_quiz(&self, quiz_id: &str) -> Result<QuestionBank, AppError> {
        let name: Option<String> =
            sqlx::query_scalar(r#"SELECT name FROM quizzes WHERE id = ?"#)
                .bind(quiz_id)
                .fetch_optional(&self.pool)
                .await?;
        let name = name.ok_or(AppError::NotFound)?;

        let question_rows: Vec<QuestionRow> = sqlx::query_as(
            r#"
            SELECT id, text, image_ref FROM questions
            WHERE quiz_id = ?
            ORDER BY position
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let mut questions = Vec::with_capacity(question_rows.len());
        for row in question_rows {
            let options: Vec<OptionRow> = sqlx::query_as(
                r#"
                SELECT text, correct FROM options
                WHERE question_id = ?
                ORDER BY position
                "#,
            )
            .bind(&row.id)
            .fetch_all(&self.pool)
            .await?;

            questions.push(Question {
                id: row.id,
                text: row.text,
                image_ref: row.image_ref,
                options: options
                    .into_iter()
                    .map(|o| crate::models::QuestionOpt {
                        text: o.text,
                        correct: o.correct,
                    })
                    .collect(),
            });
        }

        Ok(QuestionBank {
            quiz_id: quiz_id.to_string(),
            name,
            questions,
        })
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, AppError> {
        let summaries: Vec<QuizSummary> = sqlx::query_as(
            r#"
            SELECT q.id, q.name, q.created_at, COUNT(qs.id) AS question_count
            FROM quizzes q
            LEFT JOIN questions qs ON qs.quiz_id = q.id
            GROUP BY q.id
            ORDER BY q.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(summaries)
    }

    /// 퀴즈 연쇄 삭제: 답안 → 제출 → 세션 → 선택지 → 문항 → 퀴즈 순서.
    ///
    /// 전체가 한 트랜잭션이므로 커밋 전 실패는 롤백됩니다. 그래도 어느
    /// 단계에서 실패했는지는 `CascadeDeleteIncomplete`로 보고해 운영자가
    /// 원인을 추적할 수 있게 합니다.
    async fn delete_quiz(&self, quiz_id: &str) -> Result<(), AppError> {
        let exists: Option<String> =
            sqlx::query_scalar(r#"SELECT id FROM quizzes WHERE id = ?"#)
                .bind(quiz_id)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Err(AppError::NotFound);
        }

        let cascade = |stage: &'static str| {
            let quiz_id = quiz_id.to_string();
            move |source: sqlx::Error| AppError::CascadeDeleteIncomplete {
                quiz_id,
                stage,
                source,
            }
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM answers
            WHERE session_id IN (SELECT id FROM sessions WHERE quiz_id = ?)
            "#,
        )
        .bind(quiz_id)
        .execute(&mut *tx)
        .await
        .map_err(cascade("answers"))?;

        sqlx::query(
            r#"
            DELETE FROM submissions
            WHERE session_id IN (SELECT id FROM sessions WHERE quiz_id = ?)
            "#,
        )
        .bind(quiz_id)
        .execute(&mut *tx)
        .await
        .map_err(cascade("submissions"))?;

        sqlx::query(r#"DELETE FROM sessions WHERE quiz_id = ?"#)
            .bind(quiz_id)
            .execute(&mut *tx)
            .await
            .map_err(cascade("sessions"))?;

        sqlx::query(
            r#"
            DELETE FROM options
            WHERE question_id IN (SELECT id FROM questions WHERE quiz_id = ?)
            "#,
        )
        .bind(quiz_id)
        .execute(&mut *tx)
        .await
        .map_err(cascade("options"))?;

        sqlx::query(r#"DELETE FROM questions WHERE quiz_id = ?"#)
            .bind(quiz_id)
            .execute(&mut *tx)
            .await
            .map_err(cascade("questions"))?;

        sqlx::query(r#"DELETE FROM quizzes WHERE id = ?"#)
            .bind(quiz_id)
            .execute(&mut *tx)
            .await
            .map_err(cascade("quiz"))?;

        tx.commit().await.map_err(cascade("commit"))?;
        Ok(())
    }

    /// 새 활성 세션을 만듭니다.
    ///
    /// 활성 세션이 이미 있으면 `one_active_session` 인덱스가 INSERT를
    /// 거부하므로, 검사와 쓰기가 한 번의 원자적 연산으로 끝납니다.
    async fn create_session(
        &self,
        bank: &QuestionBank,
        display_questions: Vec<Question>,
    ) -> Result<Session, AppError> {
        let session = Session {
            id: Uuid::now_v7().to_string(),
            quiz_id: bank.quiz_id.clone(),
            quiz_name: bank.name.clone(),
            questions: display_questions,
            is_active: true,
            started_at: Utc::now().to_rfc3339(),
            ended_at: None,
        };

        let display_json = serde_json::to_string(&session.questions)
            .map_err(|e| AppError::Internal(format!("serialize display order: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO sessions (id, quiz_id, quiz_name, display_json, is_active, started_at)
            VALUES (?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.quiz_id)
        .bind(&session.quiz_name)
        .bind(&display_json)
        .bind(&session.started_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(session),
            Err(ref e) if is_unique_violation(e) => Err(AppError::SessionConflict),
            Err(e) => Err(e.into()),
        }
    }

    async fn active_session(&self) -> Result<Option<Session>, AppError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, quiz_id, quiz_name, display_json, is_active, started_at, ended_at
            FROM sessions
            WHERE is_active = 1
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::into_session).transpose()
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, quiz_id, quiz_name, display_json, is_active, started_at, ended_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::into_session).transpose()
    }

    /// 세션을 종료합니다. 없는 세션이면 `NotFound`로 **소리 내어** 실패합니다.
    async fn end_session(&self, session_id: &str, purge_answers: bool) -> Result<Session, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE sessions SET is_active = 0, ended_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        if purge_answers {
            // 비가역 삭제 — owner가 종료 시점에 명시적으로 선택한 경우만
            sqlx::query(r#"DELETE FROM answers WHERE session_id = ?"#)
                .bind(session_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(r#"DELETE FROM submissions WHERE session_id = ?"#)
                .bind(session_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get_session(session_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// 답안 업서트. 같은 (세션, 문항, client) 키의 이전 기록을 덮어씁니다.
    async fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        client_name: &str,
        selected: &[String],
    ) -> Result<(), AppError> {
        let selected_json = serde_json::to_string(selected)
            .map_err(|e| AppError::Internal(format!("serialize selection: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO answers (session_id, question_id, client_name, selected_json, submitted_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (session_id, question_id, client_name)
            DO UPDATE SET selected_json = excluded.selected_json,
                          submitted_at = excluded.submitted_at
            "#,
        )
        .bind(session_id)
        .bind(question_id)
        .bind(client_name)
        .bind(&selected_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        // 구독자 깨우기 — 수신자가 없어도(send Err) 정상입니다
        let _ = self.notify.send(session_id.to_string());
        Ok(())
    }

    async fn answers_for_session(&self, session_id: &str) -> Result<Vec<AnswerRecord>, AppError> {
        let rows: Vec<AnswerRow> = sqlx::query_as(
            r#"
            SELECT session_id, question_id, client_name, selected_json, submitted_at
            FROM answers
            WHERE session_id = ?
            ORDER BY submitted_at
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AnswerRow::into_record).collect()
    }

    fn subscribe(&self, session_id: &str) -> AnswerFeed {
        AnswerFeed::new(session_id.to_string(), self.notify.subscribe())
    }

    /// 최종 제출 기록. (세션, client) 기본 키가 재제출을 막습니다.
    async fn record_submission(
        &self,
        session_id: &str,
        summary: &ClientScoreSummary,
    ) -> Result<(), AppError> {
        let correctness_json = serde_json::to_string(&summary.per_question_correct)
            .map_err(|e| AppError::Internal(format!("serialize correctness: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO submissions
                (session_id, client_name, points_earned, points_possible,
                 percentage, passed, correctness_json, submitted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(&summary.client_name)
        .bind(summary.points_earned as i64)
        .bind(summary.points_possible as i64)
        .bind(summary.percentage as i64)
        .bind(summary.passed)
        .bind(&correctness_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(ref e) if is_unique_violation(e) => Err(AppError::AlreadySubmitted),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_submission(
        &self,
        session_id: &str,
        client_name: &str,
    ) -> Result<Option<ClientScoreSummary>, AppError> {
        let row: Option<SubmissionRow> = sqlx::query_as(
            r#"
            SELECT client_name, points_earned, points_possible, percentage, passed, correctness_json
            FROM submissions
            WHERE session_id = ? AND client_name = ?
            "#,
        )
        .bind(session_id)
        .bind(client_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let per_question_correct: Vec<bool> = serde_json::from_str(&r.correctness_json)
                .map_err(|e| AppError::Internal(format!("corrupt correctness_json: {}", e)))?;
            Ok(ClientScoreSummary {
                client_name: r.client_name,
                per_question_correct,
                points_earned: r.points_earned as u32,
                points_possible: r.points_possible as u32,
                percentage: r.percentage as u32,
                passed: r.passed,
            })
        })
        .transpose()
    }
}
