//! In-memory store implementations with the same conditional-update
//! semantics as the Postgres stores. They back the test suite, which runs
//! the full attempt lifecycle without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::models::exam::Exam;
use crate::models::exam_attempt::{AttemptStatus, ExamAttempt};
use crate::models::outbox_event::OutboxEvent;
use crate::models::question::Question;
use crate::store::{AttemptStore, CreateOutcome, ExamLookup, OutboxStore, QuestionLookup};

#[derive(Default)]
struct AttemptState {
    attempts: HashMap<Uuid, ExamAttempt>,
    by_exam_student: HashMap<(Uuid, Uuid), Uuid>,
}

#[derive(Default)]
pub struct MemoryAttemptStore {
    state: RwLock<AttemptState>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn create_attempt(&self, attempt: ExamAttempt) -> Result<CreateOutcome> {
        // One write lock covers check and insert, so the uniqueness
        // decision is atomic just like the database constraint.
        let mut state = self.state.write().await;
        let key = (attempt.exam_id, attempt.student_id);

        if let Some(existing_id) = state.by_exam_student.get(&key) {
            let existing = state.attempts[existing_id].clone();
            return Ok(CreateOutcome::Duplicate(existing));
        }

        state.by_exam_student.insert(key, attempt.id);
        state.attempts.insert(attempt.id, attempt.clone());
        Ok(CreateOutcome::Created(attempt))
    }

    async fn attempt_by_id(&self, attempt_id: Uuid) -> Result<Option<ExamAttempt>> {
        Ok(self.state.read().await.attempts.get(&attempt_id).cloned())
    }

    async fn attempt_for_student(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<ExamAttempt>> {
        let state = self.state.read().await;
        Ok(state
            .by_exam_student
            .get(&(exam_id, student_id))
            .and_then(|id| state.attempts.get(id))
            .cloned())
    }

    async fn attempts_for_exam(&self, exam_id: Uuid) -> Result<Vec<ExamAttempt>> {
        let state = self.state.read().await;
        let mut attempts: Vec<ExamAttempt> = state
            .attempts
            .values()
            .filter(|a| a.exam_id == exam_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(attempts)
    }

    async fn attempts_for_student(&self, student_id: Uuid) -> Result<Vec<ExamAttempt>> {
        let state = self.state.read().await;
        let mut attempts: Vec<ExamAttempt> = state
            .attempts
            .values()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(attempts)
    }

    async fn save_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        payload: JsonValue,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(attempt) = state.attempts.get_mut(&attempt_id) else {
            return Ok(false);
        };
        if attempt.status != AttemptStatus::InProgress {
            return Ok(false);
        }
        match attempt
            .answers
            .iter_mut()
            .find(|a| a.question_id == question_id)
        {
            Some(answer) => {
                answer.answer = Some(payload);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_attempt(
        &self,
        attempt: &ExamAttempt,
        expected: Option<AttemptStatus>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(current) = state.attempts.get_mut(&attempt.id) else {
            return Ok(false);
        };
        if let Some(expected) = expected {
            if current.status != expected {
                return Ok(false);
            }
        }
        *current = attempt.clone();
        Ok(true)
    }

    async fn in_progress_attempts(&self) -> Result<Vec<ExamAttempt>> {
        let state = self.state.read().await;
        Ok(state
            .attempts
            .values()
            .filter(|a| a.status == AttemptStatus::InProgress)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryExamStore {
    exams: RwLock<HashMap<Uuid, Exam>>,
}

impl MemoryExamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, exam: Exam) {
        self.exams.write().await.insert(exam.id, exam);
    }
}

#[async_trait]
impl ExamLookup for MemoryExamStore {
    async fn exam_by_id(&self, exam_id: Uuid) -> Result<Option<Exam>> {
        Ok(self.exams.read().await.get(&exam_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryQuestionStore {
    questions: RwLock<HashMap<Uuid, Question>>,
}

impl MemoryQuestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, question: Question) {
        self.questions.write().await.insert(question.id, question);
    }
}

#[async_trait]
impl QuestionLookup for MemoryQuestionStore {
    async fn questions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Question>> {
        let questions = self.questions.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| questions.get(id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryOutboxStore {
    events: RwLock<Vec<OutboxEvent>>,
}

impl MemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<OutboxEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn append(&self, event_type: &str, payload: &JsonValue) -> Result<OutboxEvent> {
        let now = Utc::now();
        let event = OutboxEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            payload: payload.clone(),
            status: "pending".to_string(),
            attempts: 0,
            max_attempts: 3,
            http_status: None,
            response_body: None,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
        };
        self.events.write().await.push(event.clone());
        Ok(event)
    }

    async fn next_pending(&self) -> Result<Option<OutboxEvent>> {
        let now = Utc::now();
        Ok(self
            .events
            .read()
            .await
            .iter()
            .find(|e| e.status == "pending" && e.next_retry_at.map_or(true, |at| at <= now))
            .cloned())
    }

    async fn record_delivery(
        &self,
        event_id: Uuid,
        http_status: Option<i32>,
        response_body: &str,
        success: bool,
    ) -> Result<()> {
        let mut events = self.events.write().await;
        if let Some(event) = events.iter_mut().find(|e| e.id == event_id) {
            event.http_status = http_status;
            event.response_body = Some(response_body.to_string());
            event.status = if success { "success" } else { "failed" }.to_string();
            event.attempts += 1;
            event.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn schedule_retry(&self, event_id: Uuid) -> Result<()> {
        let mut events = self.events.write().await;
        if let Some(event) = events
            .iter_mut()
            .find(|e| e.id == event_id && e.status == "failed" && e.attempts < e.max_attempts)
        {
            let backoff = 30i64 * 2i64.pow(event.attempts.saturating_sub(1).max(0) as u32);
            event.status = "pending".to_string();
            event.next_retry_at = Some(Utc::now() + chrono::Duration::seconds(backoff.min(3600)));
            event.updated_at = Utc::now();
        }
        Ok(())
    }
}
