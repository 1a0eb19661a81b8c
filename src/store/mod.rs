use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::exam::Exam;
use crate::models::exam_attempt::{AttemptStatus, ExamAttempt};
use crate::models::outbox_event::OutboxEvent;
use crate::models::question::Question;

pub mod memory;
pub mod postgres;

/// Outcome of the atomic check-and-create on (exam, student). Exactly one
/// of two concurrent starts observes `Created`; the other gets the
/// winner's attempt back.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(ExamAttempt),
    Duplicate(ExamAttempt),
}

#[async_trait]
pub trait ExamLookup: Send + Sync {
    async fn exam_by_id(&self, exam_id: Uuid) -> Result<Option<Exam>>;
}

#[async_trait]
pub trait QuestionLookup: Send + Sync {
    async fn questions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Question>>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Atomic check-and-create keyed on (exam_id, student_id). Never a
    /// read-then-write race: the uniqueness decision happens in the store.
    async fn create_attempt(&self, attempt: ExamAttempt) -> Result<CreateOutcome>;

    async fn attempt_by_id(&self, attempt_id: Uuid) -> Result<Option<ExamAttempt>>;

    async fn attempt_for_student(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<ExamAttempt>>;

    async fn attempts_for_exam(&self, exam_id: Uuid) -> Result<Vec<ExamAttempt>>;

    async fn attempts_for_student(&self, student_id: Uuid) -> Result<Vec<ExamAttempt>>;

    /// Targeted last-write-wins update of one answer's payload. Applies
    /// only while the attempt is still in progress and only to an answer
    /// slot materialized at start time; returns whether a row was touched.
    async fn save_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        payload: JsonValue,
    ) -> Result<bool>;

    /// Writes the whole attempt (header and answers). When `expected` is
    /// set the write only applies if the stored status still matches,
    /// which serializes submit against concurrent submits and saves.
    /// Returns whether the write applied.
    async fn update_attempt(
        &self,
        attempt: &ExamAttempt,
        expected: Option<AttemptStatus>,
    ) -> Result<bool>;

    async fn in_progress_attempts(&self) -> Result<Vec<ExamAttempt>>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn append(&self, event_type: &str, payload: &JsonValue) -> Result<OutboxEvent>;

    /// Next deliverable event, if any. The Postgres implementation claims
    /// it with `FOR UPDATE SKIP LOCKED` so parallel workers never double
    /// deliver.
    async fn next_pending(&self) -> Result<Option<OutboxEvent>>;

    async fn record_delivery(
        &self,
        event_id: Uuid,
        http_status: Option<i32>,
        response_body: &str,
        success: bool,
    ) -> Result<()>;

    /// Re-arms a failed event for another delivery attempt with capped
    /// exponential backoff, as long as attempts remain.
    async fn schedule_retry(&self, event_id: Uuid) -> Result<()>;
}
