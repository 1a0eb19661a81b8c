use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::exam_attempt::{Answer, AttemptStatus, ExamAttempt};
use crate::models::outbox_event::OutboxEvent;
use crate::store::{AttemptStore, CreateOutcome, OutboxStore};

#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>> {
        let rows = sqlx::query(
            r#"SELECT question_id, answer, is_correct, marks_obtained
               FROM attempt_answers
               WHERE attempt_id = $1
               ORDER BY position ASC"#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(answer_from_row).collect()
    }

    async fn hydrate(&self, rows: Vec<PgRow>) -> Result<Vec<ExamAttempt>> {
        let mut attempts = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut attempt = attempt_from_row(row)?;
            attempt.answers = self.load_answers(attempt.id).await?;
            attempts.push(attempt);
        }
        Ok(attempts)
    }
}

fn answer_from_row(row: &PgRow) -> Result<Answer> {
    Ok(Answer {
        question_id: row.try_get("question_id").map_err(Error::Database)?,
        answer: row.try_get("answer").map_err(Error::Database)?,
        is_correct: row.try_get("is_correct").map_err(Error::Database)?,
        marks_obtained: row.try_get("marks_obtained").map_err(Error::Database)?,
    })
}

fn attempt_from_row(row: &PgRow) -> Result<ExamAttempt> {
    let status: String = row.try_get("status").map_err(Error::Database)?;
    let status: AttemptStatus = status
        .parse()
        .map_err(|e: String| Error::Internal(format!("corrupt attempt row: {}", e)))?;

    Ok(ExamAttempt {
        id: row.try_get("id").map_err(Error::Database)?,
        exam_id: row.try_get("exam_id").map_err(Error::Database)?,
        student_id: row.try_get("student_id").map_err(Error::Database)?,
        answers: Vec::new(),
        status,
        started_at: row.try_get("started_at").map_err(Error::Database)?,
        submitted_at: row.try_get("submitted_at").map_err(Error::Database)?,
        total_marks_obtained: row.try_get("total_marks_obtained").map_err(Error::Database)?,
        percentage: row.try_get("percentage").map_err(Error::Database)?,
        is_passed: row.try_get("is_passed").map_err(Error::Database)?,
        evaluated_by: row.try_get("evaluated_by").map_err(Error::Database)?,
        evaluated_at: row.try_get("evaluated_at").map_err(Error::Database)?,
        feedback: row.try_get("feedback").map_err(Error::Database)?,
    })
}

const ATTEMPT_COLUMNS: &str = "id, exam_id, student_id, status, started_at, submitted_at, \
     total_marks_obtained, percentage, is_passed, evaluated_by, evaluated_at, feedback";

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn create_attempt(&self, attempt: ExamAttempt) -> Result<CreateOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"INSERT INTO exam_attempts
                   (id, exam_id, student_id, status, started_at, total_marks_obtained)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (exam_id, student_id) DO NOTHING"#,
        )
        .bind(attempt.id)
        .bind(attempt.exam_id)
        .bind(attempt.student_id)
        .bind(attempt.status.as_str())
        .bind(attempt.started_at)
        .bind(attempt.total_marks_obtained)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            let existing = self
                .attempt_for_student(attempt.exam_id, attempt.student_id)
                .await?
                .ok_or_else(|| {
                    Error::Internal("attempt missing after uniqueness conflict".to_string())
                })?;
            return Ok(CreateOutcome::Duplicate(existing));
        }

        for (position, answer) in attempt.answers.iter().enumerate() {
            sqlx::query(
                r#"INSERT INTO attempt_answers
                       (attempt_id, question_id, position, answer, is_correct, marks_obtained)
                   VALUES ($1, $2, $3, $4, $5, $6)"#,
            )
            .bind(attempt.id)
            .bind(answer.question_id)
            .bind(position as i32)
            .bind(answer.answer.clone())
            .bind(answer.is_correct)
            .bind(answer.marks_obtained)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(CreateOutcome::Created(attempt))
    }

    async fn attempt_by_id(&self, attempt_id: Uuid) -> Result<Option<ExamAttempt>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM exam_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut attempt = attempt_from_row(&row)?;
                attempt.answers = self.load_answers(attempt.id).await?;
                Ok(Some(attempt))
            }
            None => Ok(None),
        }
    }

    async fn attempt_for_student(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<ExamAttempt>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM exam_attempts WHERE exam_id = $1 AND student_id = $2",
            ATTEMPT_COLUMNS
        ))
        .bind(exam_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut attempt = attempt_from_row(&row)?;
                attempt.answers = self.load_answers(attempt.id).await?;
                Ok(Some(attempt))
            }
            None => Ok(None),
        }
    }

    async fn attempts_for_exam(&self, exam_id: Uuid) -> Result<Vec<ExamAttempt>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM exam_attempts WHERE exam_id = $1 \
             ORDER BY submitted_at DESC NULLS LAST, started_at DESC",
            ATTEMPT_COLUMNS
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn attempts_for_student(&self, student_id: Uuid) -> Result<Vec<ExamAttempt>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM exam_attempts WHERE student_id = $1 ORDER BY started_at DESC",
            ATTEMPT_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn save_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        payload: JsonValue,
    ) -> Result<bool> {
        // Single-row conditional write: overlapping auto-saves for
        // different questions touch different rows.
        let result = sqlx::query(
            r#"UPDATE attempt_answers aa
               SET answer = $3, updated_at = NOW()
               FROM exam_attempts a
               WHERE aa.attempt_id = a.id
                 AND a.id = $1
                 AND aa.question_id = $2
                 AND a.status = 'in-progress'"#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_attempt(
        &self,
        attempt: &ExamAttempt,
        expected: Option<AttemptStatus>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let header = sqlx::query(
            r#"UPDATE exam_attempts
               SET status = $2, submitted_at = $3, total_marks_obtained = $4,
                   percentage = $5, is_passed = $6, evaluated_by = $7,
                   evaluated_at = $8, feedback = $9, updated_at = NOW()
               WHERE id = $1 AND ($10::text IS NULL OR status = $10)"#,
        )
        .bind(attempt.id)
        .bind(attempt.status.as_str())
        .bind(attempt.submitted_at)
        .bind(attempt.total_marks_obtained)
        .bind(attempt.percentage)
        .bind(attempt.is_passed)
        .bind(attempt.evaluated_by)
        .bind(attempt.evaluated_at)
        .bind(attempt.feedback.clone())
        .bind(expected.map(|s| s.as_str().to_string()))
        .execute(&mut *tx)
        .await?;

        if header.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for answer in &attempt.answers {
            sqlx::query(
                r#"UPDATE attempt_answers
                   SET answer = $3, is_correct = $4, marks_obtained = $5, updated_at = NOW()
                   WHERE attempt_id = $1 AND question_id = $2"#,
            )
            .bind(attempt.id)
            .bind(answer.question_id)
            .bind(answer.answer.clone())
            .bind(answer.is_correct)
            .bind(answer.marks_obtained)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn in_progress_attempts(&self) -> Result<Vec<ExamAttempt>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM exam_attempts WHERE status = 'in-progress'",
            ATTEMPT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }
}

#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn append(&self, event_type: &str, payload: &JsonValue) -> Result<OutboxEvent> {
        let event = sqlx::query_as::<_, OutboxEvent>(
            r#"INSERT INTO outbox_events (event_type, payload, status)
               VALUES ($1, $2, 'pending')
               RETURNING id, event_type, payload, status, attempts, max_attempts,
                         http_status, response_body, next_retry_at, created_at, updated_at"#,
        )
        .bind(event_type)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    async fn next_pending(&self) -> Result<Option<OutboxEvent>> {
        let event = sqlx::query_as::<_, OutboxEvent>(
            r#"SELECT id, event_type, payload, status, attempts, max_attempts,
                      http_status, response_body, next_retry_at, created_at, updated_at
               FROM outbox_events
               WHERE status = 'pending'
                 AND (next_retry_at IS NULL OR next_retry_at <= NOW())
               ORDER BY created_at ASC
               FOR UPDATE SKIP LOCKED
               LIMIT 1"#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn record_delivery(
        &self,
        event_id: Uuid,
        http_status: Option<i32>,
        response_body: &str,
        success: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE outbox_events
               SET http_status = $2, response_body = $3,
                   status = CASE WHEN $4 THEN 'success' ELSE 'failed' END,
                   attempts = attempts + 1, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(event_id)
        .bind(http_status)
        .bind(response_body)
        .bind(success)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn schedule_retry(&self, event_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"UPDATE outbox_events
               SET status = 'pending',
                   next_retry_at = NOW() + make_interval(secs =>
                       LEAST(3600, 30 * power(2::float, GREATEST(0, attempts - 1))::int)),
                   updated_at = NOW()
               WHERE id = $1 AND status = 'failed' AND attempts < max_attempts"#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
