use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::exam_attempt::{AttemptStatus, ExamAttempt};
use crate::models::question::Question;
use crate::services::grading;
use crate::services::notification_service::Notifier;
use crate::store::{AttemptStore, CreateOutcome, ExamLookup, QuestionLookup};
use crate::utils::{shuffle, time};

/// Orchestrates the attempt state machine: in-progress → submitted →
/// evaluated, with abandoned as the cleanup terminal. Owns every write to
/// an attempt; exams and questions are read-only collaborators.
#[derive(Clone)]
pub struct AttemptService {
    attempts: Arc<dyn AttemptStore>,
    exams: Arc<dyn ExamLookup>,
    questions: Arc<dyn QuestionLookup>,
    notifier: Arc<dyn Notifier>,
}

impl AttemptService {
    pub fn new(
        attempts: Arc<dyn AttemptStore>,
        exams: Arc<dyn ExamLookup>,
        questions: Arc<dyn QuestionLookup>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            attempts,
            exams,
            questions,
            notifier,
        }
    }

    /// Creates the one attempt a student gets for an exam. Materializes
    /// one blank answer per exam question, in exam order or a fresh
    /// permutation of it when the exam randomizes.
    pub async fn start(&self, exam_id: Uuid, student_id: Uuid) -> Result<ExamAttempt> {
        let exam = self
            .exams
            .exam_by_id(exam_id)
            .await?
            .ok_or_else(|| Error::NotFound("Exam not found".to_string()))?;

        if !exam.is_published {
            return Err(Error::ExamNotPublished);
        }
        let now = time::now();
        if now < exam.start_time {
            return Err(Error::ExamNotStarted);
        }
        if now > exam.end_time {
            return Err(Error::ExamEnded);
        }

        let mut order = exam.questions.clone();
        if exam.randomize_questions {
            order = shuffle::shuffled(&order, &mut rand::thread_rng());
        }

        let attempt = ExamAttempt::new(exam_id, student_id, order);
        match self.attempts.create_attempt(attempt).await? {
            CreateOutcome::Created(attempt) => Ok(attempt),
            CreateOutcome::Duplicate(existing) => Err(Error::DuplicateAttempt(Box::new(existing))),
        }
    }

    /// Auto-save: last write wins, per question. A question id that is
    /// not part of the attempt is silently ignored. The store re-checks
    /// the status on write, so a save racing a submit cannot land after
    /// grading.
    pub async fn save_answer(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
        question_id: Uuid,
        payload: JsonValue,
    ) -> Result<()> {
        let attempt = self.owned_attempt(attempt_id, student_id).await?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(Error::InvalidState("Exam is not in progress".to_string()));
        }

        let _ = self
            .attempts
            .save_answer(attempt_id, question_id, payload)
            .await?;
        Ok(())
    }

    /// Grades every objective answer, then either parks the attempt at
    /// `submitted` pending manual evaluation or, when nothing needs a
    /// human, finalizes it at `evaluated` and emits the result event.
    pub async fn submit(&self, attempt_id: Uuid, student_id: Uuid) -> Result<ExamAttempt> {
        let attempt = self.owned_attempt(attempt_id, student_id).await?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(Error::InvalidState("Exam already submitted".to_string()));
        }

        let exam = self
            .exams
            .exam_by_id(attempt.exam_id)
            .await?
            .ok_or_else(|| Error::NotFound("Exam not found".to_string()))?;
        let questions = self.question_map(&attempt).await?;

        let graded = grading::grade_objective(&attempt.answers, &questions, exam.negative_marking);

        let mut updated = attempt;
        updated.answers = graded.answers;
        updated.submitted_at = Some(time::now());
        updated.total_marks_obtained = graded.total;
        updated.status = AttemptStatus::Submitted;

        if graded.fully_graded {
            let (percentage, is_passed) = grading::outcome(graded.total, &exam);
            updated.status = AttemptStatus::Evaluated;
            updated.percentage = Some(percentage);
            updated.is_passed = Some(is_passed);
        }

        // Conditional on still being in progress: of two racing submits
        // exactly one grades and transitions.
        let applied = self
            .attempts
            .update_attempt(&updated, Some(AttemptStatus::InProgress))
            .await?;
        if !applied {
            return Err(Error::InvalidState("Exam already submitted".to_string()));
        }

        if updated.status == AttemptStatus::Evaluated {
            if let Err(e) = self
                .notifier
                .result_available(updated.student_id, updated.exam_id)
                .await
            {
                warn!(error = ?e, attempt_id = %updated.id, "failed to emit result notification");
            }
        }

        Ok(updated)
    }

    /// Manual evaluation. Re-runnable by design: scores overwrite the
    /// named answers, the total is recomputed over the whole sheet (so
    /// auto-graded marks persist through a partial score list), and a
    /// later call with different scores deterministically replaces the
    /// outcome.
    pub async fn evaluate(
        &self,
        attempt_id: Uuid,
        evaluator_id: Uuid,
        scores: &[(Uuid, f64)],
        feedback: Option<String>,
    ) -> Result<ExamAttempt> {
        let attempt = self
            .attempts
            .attempt_by_id(attempt_id)
            .await?
            .ok_or_else(|| Error::NotFound("Exam attempt not found".to_string()))?;
        let exam = self
            .exams
            .exam_by_id(attempt.exam_id)
            .await?
            .ok_or_else(|| Error::NotFound("Exam not found".to_string()))?;

        let mut updated = attempt;
        grading::apply_manual_scores(&mut updated.answers, scores);
        let total = grading::total_marks(&updated.answers);
        let (percentage, is_passed) = grading::outcome(total, &exam);

        updated.total_marks_obtained = total;
        updated.percentage = Some(percentage);
        updated.is_passed = Some(is_passed);
        updated.status = AttemptStatus::Evaluated;
        updated.evaluated_by = Some(evaluator_id);
        updated.evaluated_at = Some(time::now());
        updated.feedback = feedback;

        let applied = self.attempts.update_attempt(&updated, None).await?;
        if !applied {
            return Err(Error::NotFound("Exam attempt not found".to_string()));
        }

        if let Err(e) = self
            .notifier
            .evaluation_complete(updated.student_id, updated.exam_id, total, exam.total_marks)
            .await
        {
            warn!(error = ?e, attempt_id = %updated.id, "failed to emit evaluation notification");
        }

        Ok(updated)
    }

    pub async fn my_attempt(&self, exam_id: Uuid, student_id: Uuid) -> Result<ExamAttempt> {
        self.attempts
            .attempt_for_student(exam_id, student_id)
            .await?
            .ok_or_else(|| Error::NotFound("No attempt found for this exam".to_string()))
    }

    pub async fn my_attempts(&self, student_id: Uuid) -> Result<Vec<ExamAttempt>> {
        self.attempts.attempts_for_student(student_id).await
    }

    pub async fn attempt_by_id(&self, attempt_id: Uuid) -> Result<ExamAttempt> {
        self.attempts
            .attempt_by_id(attempt_id)
            .await?
            .ok_or_else(|| Error::NotFound("Exam attempt not found".to_string()))
    }

    pub async fn attempts_for_exam(&self, exam_id: Uuid) -> Result<Vec<ExamAttempt>> {
        self.attempts.attempts_for_exam(exam_id).await
    }

    /// The external timeout/cleanup process: in-progress attempts whose
    /// exam ended at least `grace` ago move to the abandoned terminal.
    /// The grace period keeps the sweep from stomping a submit racing the
    /// deadline; the conditional update keeps it from touching anything
    /// that transitioned meanwhile.
    pub async fn abandon_overdue(&self, grace: chrono::Duration) -> Result<u64> {
        let now = time::now();
        let mut swept = 0;

        for attempt in self.attempts.in_progress_attempts().await? {
            let Some(exam) = self.exams.exam_by_id(attempt.exam_id).await? else {
                continue;
            };
            if exam.end_time + grace > now {
                continue;
            }

            let mut abandoned = attempt;
            abandoned.status = AttemptStatus::Abandoned;
            if self
                .attempts
                .update_attempt(&abandoned, Some(AttemptStatus::InProgress))
                .await?
            {
                swept += 1;
            }
        }

        Ok(swept)
    }

    async fn owned_attempt(&self, attempt_id: Uuid, student_id: Uuid) -> Result<ExamAttempt> {
        let attempt = self
            .attempts
            .attempt_by_id(attempt_id)
            .await?
            .ok_or_else(|| Error::NotFound("Exam attempt not found".to_string()))?;
        if attempt.student_id != student_id {
            return Err(Error::Forbidden(
                "Attempt belongs to another student".to_string(),
            ));
        }
        Ok(attempt)
    }

    async fn question_map(&self, attempt: &ExamAttempt) -> Result<HashMap<Uuid, Question>> {
        let ids: Vec<Uuid> = attempt.answers.iter().map(|a| a.question_id).collect();
        let questions = self.questions.questions_by_ids(&ids).await?;
        Ok(questions.into_iter().map(|q| (q.id, q)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::{Exam, NegativeMarking};
    use crate::models::question::{Difficulty, QuestionOption, QuestionType};
    use crate::services::notification_service::MockNotifier;
    use crate::store::memory::{MemoryAttemptStore, MemoryExamStore, MemoryQuestionStore};
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn true_false(points: f64) -> Question {
        Question {
            id: Uuid::new_v4(),
            question_text: "the sky is blue".to_string(),
            question_type: QuestionType::TrueFalse,
            options: vec![
                QuestionOption {
                    text: "true".to_string(),
                    is_correct: true,
                },
                QuestionOption {
                    text: "false".to_string(),
                    is_correct: false,
                },
            ],
            points,
            difficulty: Difficulty::Easy,
            topic: "basics".to_string(),
            subject: "science".to_string(),
            explanation: None,
            code_template: None,
            test_cases: Vec::new(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn open_exam(questions: &[&Question], student: Uuid) -> Exam {
        Exam {
            id: Uuid::new_v4(),
            title: "quiz".to_string(),
            description: None,
            subject: "science".to_string(),
            duration_minutes: 30,
            total_marks: questions.iter().map(|q| q.points).sum(),
            passing_marks: 0.0,
            start_time: Utc::now() - Duration::hours(1),
            end_time: Utc::now() + Duration::hours(1),
            instructions: None,
            questions: questions.iter().map(|q| q.id).collect(),
            randomize_questions: false,
            allowed_students: vec![student],
            department: None,
            semester: None,
            is_published: true,
            negative_marking: NegativeMarking::default(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn service_with(
        exam: Exam,
        questions: Vec<Question>,
        notifier: MockNotifier,
    ) -> AttemptService {
        let exams = MemoryExamStore::new();
        exams.insert(exam).await;
        let question_store = MemoryQuestionStore::new();
        for q in questions {
            question_store.insert(q).await;
        }
        AttemptService::new(
            Arc::new(MemoryAttemptStore::new()),
            Arc::new(exams),
            Arc::new(question_store),
            Arc::new(notifier),
        )
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_submit() {
        let student = Uuid::new_v4();
        let q = true_false(2.0);
        let exam = open_exam(&[&q], student);
        let exam_id = exam.id;

        let mut notifier = MockNotifier::new();
        notifier
            .expect_result_available()
            .times(1)
            .returning(|_, _| Err(Error::Internal("webhook sink down".to_string())));

        let service = service_with(exam, vec![q.clone()], notifier).await;
        let attempt = service.start(exam_id, student).await.unwrap();
        service
            .save_answer(attempt.id, student, q.id, json!("true"))
            .await
            .unwrap();

        let submitted = service.submit(attempt.id, student).await.unwrap();
        assert_eq!(submitted.status, AttemptStatus::Evaluated);
        assert_eq!(submitted.total_marks_obtained, 2.0);
    }

    #[tokio::test]
    async fn evaluation_event_carries_score_and_total() {
        let student = Uuid::new_v4();
        let q = true_false(4.0);
        let exam = open_exam(&[&q], student);
        let exam_id = exam.id;

        let mut notifier = MockNotifier::new();
        notifier
            .expect_result_available()
            .returning(|_, _| Ok(()));
        notifier
            .expect_evaluation_complete()
            .withf(move |_, _, score, total| *score == 4.0 && *total == 4.0)
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let service = service_with(exam, vec![q.clone()], notifier).await;
        let attempt = service.start(exam_id, student).await.unwrap();
        service
            .save_answer(attempt.id, student, q.id, json!("true"))
            .await
            .unwrap();
        service.submit(attempt.id, student).await.unwrap();

        service
            .evaluate(attempt.id, Uuid::new_v4(), &[], None)
            .await
            .unwrap();
    }
}
