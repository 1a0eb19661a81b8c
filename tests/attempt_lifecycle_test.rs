use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use exam_portal_backend::error::Error;
use exam_portal_backend::models::exam::{Exam, NegativeMarking};
use exam_portal_backend::models::exam_attempt::AttemptStatus;
use exam_portal_backend::models::question::{
    Difficulty, Question, QuestionOption, QuestionType, TestCase,
};
use exam_portal_backend::services::attempt_service::AttemptService;
use exam_portal_backend::services::notification_service::{
    NotificationService, EVALUATION_COMPLETE, RESULT_AVAILABLE,
};
use exam_portal_backend::store::memory::{
    MemoryAttemptStore, MemoryExamStore, MemoryOutboxStore, MemoryQuestionStore,
};

fn question(question_type: QuestionType, points: f64) -> Question {
    let options = match question_type {
        QuestionType::MultipleChoice => vec![
            QuestionOption {
                text: "2".to_string(),
                is_correct: false,
            },
            QuestionOption {
                text: "4".to_string(),
                is_correct: true,
            },
            QuestionOption {
                text: "5".to_string(),
                is_correct: false,
            },
        ],
        QuestionType::TrueFalse => vec![
            QuestionOption {
                text: "true".to_string(),
                is_correct: true,
            },
            QuestionOption {
                text: "false".to_string(),
                is_correct: false,
            },
        ],
        _ => Vec::new(),
    };
    let test_cases = match question_type {
        QuestionType::Coding => vec![TestCase {
            input: "3 4".to_string(),
            expected_output: "7".to_string(),
            is_hidden: false,
        }],
        _ => Vec::new(),
    };

    Question {
        id: Uuid::new_v4(),
        question_text: "what is 2 + 2".to_string(),
        question_type,
        options,
        points,
        difficulty: Difficulty::Easy,
        topic: "arithmetic".to_string(),
        subject: "math".to_string(),
        explanation: None,
        code_template: None,
        test_cases,
        created_by: Uuid::new_v4(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

struct ExamBuilder<'a> {
    questions: &'a [&'a Question],
    student: Uuid,
    passing_marks: f64,
    negative_marking: NegativeMarking,
    randomize: bool,
}

impl<'a> ExamBuilder<'a> {
    fn new(questions: &'a [&'a Question], student: Uuid) -> Self {
        Self {
            questions,
            student,
            passing_marks: 0.0,
            negative_marking: NegativeMarking::default(),
            randomize: false,
        }
    }

    fn build(self) -> Exam {
        Exam {
            id: Uuid::new_v4(),
            title: "Midterm".to_string(),
            description: None,
            subject: "math".to_string(),
            duration_minutes: 60,
            total_marks: self.questions.iter().map(|q| q.points).sum(),
            passing_marks: self.passing_marks,
            start_time: Utc::now() - Duration::hours(1),
            end_time: Utc::now() + Duration::hours(1),
            instructions: None,
            questions: self.questions.iter().map(|q| q.id).collect(),
            randomize_questions: self.randomize,
            allowed_students: vec![self.student],
            department: None,
            semester: None,
            is_published: true,
            negative_marking: self.negative_marking,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

struct Harness {
    service: AttemptService,
    exams: Arc<MemoryExamStore>,
    outbox: Arc<MemoryOutboxStore>,
}

async fn harness(exam: Exam, questions: &[&Question]) -> Harness {
    let exams = Arc::new(MemoryExamStore::new());
    exams.insert(exam).await;

    let question_store = Arc::new(MemoryQuestionStore::new());
    for q in questions {
        question_store.insert((*q).clone()).await;
    }

    let outbox = Arc::new(MemoryOutboxStore::new());
    let notifier = NotificationService::new(outbox.clone(), "http://localhost/webhook".to_string());

    let service = AttemptService::new(
        Arc::new(MemoryAttemptStore::new()),
        exams.clone(),
        question_store,
        Arc::new(notifier),
    );

    Harness {
        service,
        exams,
        outbox,
    }
}

#[tokio::test]
async fn start_materializes_one_blank_answer_per_question() {
    let student = Uuid::new_v4();
    let q1 = question(QuestionType::MultipleChoice, 5.0);
    let q2 = question(QuestionType::Descriptive, 10.0);
    let exam = ExamBuilder::new(&[&q1, &q2], student).build();
    let exam_id = exam.id;
    let h = harness(exam, &[&q1, &q2]).await;

    let attempt = h.service.start(exam_id, student).await.unwrap();

    assert_eq!(attempt.status, AttemptStatus::InProgress);
    assert_eq!(attempt.answers.len(), 2);
    assert_eq!(attempt.answers[0].question_id, q1.id);
    assert_eq!(attempt.answers[1].question_id, q2.id);
    for answer in &attempt.answers {
        assert!(answer.answer.is_none());
        assert!(!answer.is_correct);
        assert_eq!(answer.marks_obtained, 0.0);
    }
}

#[tokio::test]
async fn second_start_returns_the_existing_attempt() {
    let student = Uuid::new_v4();
    let q = question(QuestionType::TrueFalse, 1.0);
    let exam = ExamBuilder::new(&[&q], student).build();
    let exam_id = exam.id;
    let h = harness(exam, &[&q]).await;

    let first = h.service.start(exam_id, student).await.unwrap();
    let err = h.service.start(exam_id, student).await.unwrap_err();

    match err {
        Error::DuplicateAttempt(existing) => assert_eq!(existing.id, first.id),
        other => panic!("expected DuplicateAttempt, got {:?}", other),
    }
}

#[tokio::test]
async fn concurrent_starts_create_exactly_one_attempt() {
    let student = Uuid::new_v4();
    let q = question(QuestionType::TrueFalse, 1.0);
    let exam = ExamBuilder::new(&[&q], student).build();
    let exam_id = exam.id;
    let h = harness(exam, &[&q]).await;

    let (a, b) = tokio::join!(
        h.service.start(exam_id, student),
        h.service.start(exam_id, student)
    );

    let created = [&a, &b].iter().filter(|r| r.is_ok()).count();
    let duplicates = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(Error::DuplicateAttempt(_))))
        .count();
    assert_eq!(created, 1);
    assert_eq!(duplicates, 1);

    assert!(h.service.my_attempt(exam_id, student).await.is_ok());
}

#[tokio::test]
async fn schedule_and_publication_gate_start() {
    let student = Uuid::new_v4();
    let q = question(QuestionType::TrueFalse, 1.0);

    let mut unpublished = ExamBuilder::new(&[&q], student).build();
    unpublished.is_published = false;
    let exam_id = unpublished.id;
    let h = harness(unpublished.clone(), &[&q]).await;

    assert!(matches!(
        h.service.start(exam_id, student).await.unwrap_err(),
        Error::ExamNotPublished
    ));

    let mut not_started = unpublished.clone();
    not_started.is_published = true;
    not_started.start_time = Utc::now() + Duration::hours(1);
    not_started.end_time = Utc::now() + Duration::hours(2);
    h.exams.insert(not_started).await;
    assert!(matches!(
        h.service.start(exam_id, student).await.unwrap_err(),
        Error::ExamNotStarted
    ));

    let mut ended = unpublished;
    ended.is_published = true;
    ended.start_time = Utc::now() - Duration::hours(2);
    ended.end_time = Utc::now() - Duration::hours(1);
    h.exams.insert(ended).await;
    assert!(matches!(
        h.service.start(exam_id, student).await.unwrap_err(),
        Error::ExamEnded
    ));

    assert!(matches!(
        h.service.start(Uuid::new_v4(), student).await.unwrap_err(),
        Error::NotFound(_)
    ));

    // None of the rejected starts left an attempt behind.
    assert!(matches!(
        h.service.my_attempt(exam_id, student).await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn save_answer_is_last_write_wins_and_isolated() {
    let student = Uuid::new_v4();
    let q1 = question(QuestionType::MultipleChoice, 5.0);
    let q2 = question(QuestionType::MultipleChoice, 5.0);
    let exam = ExamBuilder::new(&[&q1, &q2], student).build();
    let exam_id = exam.id;
    let h = harness(exam, &[&q1, &q2]).await;

    let attempt = h.service.start(exam_id, student).await.unwrap();
    h.service
        .save_answer(attempt.id, student, q1.id, json!("2"))
        .await
        .unwrap();
    h.service
        .save_answer(attempt.id, student, q2.id, json!("5"))
        .await
        .unwrap();
    h.service
        .save_answer(attempt.id, student, q1.id, json!("4"))
        .await
        .unwrap();

    let saved = h.service.my_attempt(exam_id, student).await.unwrap();
    assert_eq!(saved.answer_for(q1.id).unwrap().answer, Some(json!("4")));
    assert_eq!(saved.answer_for(q2.id).unwrap().answer, Some(json!("5")));
}

#[tokio::test]
async fn save_answer_ignores_unknown_questions_and_checks_ownership() {
    let student = Uuid::new_v4();
    let q = question(QuestionType::TrueFalse, 1.0);
    let exam = ExamBuilder::new(&[&q], student).build();
    let exam_id = exam.id;
    let h = harness(exam, &[&q]).await;

    let attempt = h.service.start(exam_id, student).await.unwrap();

    // A question id outside the attempt is a tolerated no-op.
    h.service
        .save_answer(attempt.id, student, Uuid::new_v4(), json!("true"))
        .await
        .unwrap();
    let unchanged = h.service.my_attempt(exam_id, student).await.unwrap();
    assert!(unchanged.answers[0].answer.is_none());

    let intruder = Uuid::new_v4();
    assert!(matches!(
        h.service
            .save_answer(attempt.id, intruder, q.id, json!("true"))
            .await
            .unwrap_err(),
        Error::Forbidden(_)
    ));

    assert!(matches!(
        h.service
            .save_answer(Uuid::new_v4(), student, q.id, json!("true"))
            .await
            .unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn submit_grades_objective_answers_with_negative_marking() {
    let student = Uuid::new_v4();
    let right = question(QuestionType::MultipleChoice, 5.0);
    let wrong = question(QuestionType::MultipleChoice, 5.0);
    let blank = question(QuestionType::MultipleChoice, 5.0);
    let builder_questions = [&right, &wrong, &blank];
    let mut builder = ExamBuilder::new(&builder_questions, student);
    builder.negative_marking = NegativeMarking {
        enabled: true,
        marks_per_wrong: 1.0,
    };
    let exam = builder.build();
    let exam_id = exam.id;
    let h = harness(exam, &[&right, &wrong, &blank]).await;

    let attempt = h.service.start(exam_id, student).await.unwrap();
    h.service
        .save_answer(attempt.id, student, right.id, json!("4"))
        .await
        .unwrap();
    h.service
        .save_answer(attempt.id, student, wrong.id, json!("2"))
        .await
        .unwrap();
    // third question intentionally left unanswered

    let submitted = h.service.submit(attempt.id, student).await.unwrap();

    let graded = |id| submitted.answer_for(id).unwrap();
    assert!(graded(right.id).is_correct);
    assert_eq!(graded(right.id).marks_obtained, 5.0);
    assert!(!graded(wrong.id).is_correct);
    assert_eq!(graded(wrong.id).marks_obtained, -1.0);
    // a null answer fails the comparison and takes the penalty too
    assert!(!graded(blank.id).is_correct);
    assert_eq!(graded(blank.id).marks_obtained, -1.0);

    assert_eq!(submitted.total_marks_obtained, 3.0);
    assert!(submitted.submitted_at.is_some());
}

#[tokio::test]
async fn all_objective_exam_finalizes_on_submit() {
    let student = Uuid::new_v4();
    let q1 = question(QuestionType::MultipleChoice, 5.0);
    let q2 = question(QuestionType::TrueFalse, 5.0);
    let builder_questions = [&q1, &q2];
    let mut builder = ExamBuilder::new(&builder_questions, student);
    builder.passing_marks = 5.0;
    let exam = builder.build();
    let exam_id = exam.id;
    let h = harness(exam, &[&q1, &q2]).await;

    let attempt = h.service.start(exam_id, student).await.unwrap();
    h.service
        .save_answer(attempt.id, student, q1.id, json!("4"))
        .await
        .unwrap();

    let submitted = h.service.submit(attempt.id, student).await.unwrap();
    assert_eq!(submitted.status, AttemptStatus::Evaluated);
    assert_eq!(submitted.percentage, Some(50.0));
    assert_eq!(submitted.is_passed, Some(true));

    let events = h.outbox.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, RESULT_AVAILABLE);
}

#[tokio::test]
async fn subjective_questions_park_the_attempt_at_submitted() {
    let student = Uuid::new_v4();
    let objective = question(QuestionType::MultipleChoice, 5.0);
    let essay = question(QuestionType::Descriptive, 10.0);
    let exam = ExamBuilder::new(&[&objective, &essay], student).build();
    let exam_id = exam.id;
    let h = harness(exam, &[&objective, &essay]).await;

    let attempt = h.service.start(exam_id, student).await.unwrap();
    h.service
        .save_answer(attempt.id, student, objective.id, json!("4"))
        .await
        .unwrap();

    let submitted = h.service.submit(attempt.id, student).await.unwrap();
    assert_eq!(submitted.status, AttemptStatus::Submitted);
    assert!(submitted.percentage.is_none());
    assert!(submitted.is_passed.is_none());
    assert!(h.outbox.events().await.is_empty());

    // the state machine only moves forward
    assert!(matches!(
        h.service.submit(attempt.id, student).await.unwrap_err(),
        Error::InvalidState(_)
    ));
    assert!(matches!(
        h.service
            .save_answer(attempt.id, student, objective.id, json!("2"))
            .await
            .unwrap_err(),
        Error::InvalidState(_)
    ));
}

#[tokio::test]
async fn evaluate_folds_manual_scores_over_auto_graded_marks() {
    let student = Uuid::new_v4();
    let objective = question(QuestionType::MultipleChoice, 5.0);
    let essay = question(QuestionType::Descriptive, 10.0);
    let builder_questions = [&objective, &essay];
    let mut builder = ExamBuilder::new(&builder_questions, student);
    builder.passing_marks = 10.0;
    let exam = builder.build();
    let exam_id = exam.id;
    let total_marks = 15.0;
    let h = harness(exam, &[&objective, &essay]).await;

    let attempt = h.service.start(exam_id, student).await.unwrap();
    h.service
        .save_answer(attempt.id, student, objective.id, json!("4"))
        .await
        .unwrap();
    h.service.submit(attempt.id, student).await.unwrap();

    let evaluator = Uuid::new_v4();
    let evaluated = h
        .service
        .evaluate(
            attempt.id,
            evaluator,
            &[(essay.id, 8.0), (Uuid::new_v4(), 99.0)],
            Some("good work".to_string()),
        )
        .await
        .unwrap();

    // 5 auto-graded + 8 manual; the unknown question id was ignored
    assert_eq!(evaluated.total_marks_obtained, 13.0);
    assert_eq!(evaluated.status, AttemptStatus::Evaluated);
    assert_eq!(evaluated.percentage, Some(13.0 / total_marks * 100.0));
    assert_eq!(evaluated.is_passed, Some(true));
    assert_eq!(evaluated.evaluated_by, Some(evaluator));
    assert_eq!(evaluated.feedback.as_deref(), Some("good work"));

    let events = h.outbox.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EVALUATION_COMPLETE);
    assert_eq!(events[0].payload["score"], json!(13.0));
    assert_eq!(events[0].payload["total"], json!(total_marks));
}

#[tokio::test]
async fn re_evaluation_overwrites_the_outcome_deterministically() {
    let student = Uuid::new_v4();
    let essay = question(QuestionType::Descriptive, 10.0);
    let builder_questions = [&essay];
    let mut builder = ExamBuilder::new(&builder_questions, student);
    builder.passing_marks = 6.0;
    let exam = builder.build();
    let exam_id = exam.id;
    let h = harness(exam, &[&essay]).await;

    let attempt = h.service.start(exam_id, student).await.unwrap();
    h.service.submit(attempt.id, student).await.unwrap();

    let evaluator = Uuid::new_v4();
    let first = h
        .service
        .evaluate(attempt.id, evaluator, &[(essay.id, 4.0)], None)
        .await
        .unwrap();
    assert_eq!(first.total_marks_obtained, 4.0);
    assert_eq!(first.is_passed, Some(false));

    let second = h
        .service
        .evaluate(
            attempt.id,
            evaluator,
            &[(essay.id, 7.0)],
            Some("revised".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(second.total_marks_obtained, 7.0);
    assert_eq!(second.percentage, Some(70.0));
    assert_eq!(second.is_passed, Some(true));
    assert_eq!(second.feedback.as_deref(), Some("revised"));
}

#[tokio::test]
async fn passing_boundary_is_inclusive() {
    let student = Uuid::new_v4();
    let essay = question(QuestionType::Descriptive, 100.0);
    let builder_questions = [&essay];
    let mut builder = ExamBuilder::new(&builder_questions, student);
    builder.passing_marks = 40.0;
    let exam = builder.build();
    let exam_id = exam.id;
    let h = harness(exam, &[&essay]).await;

    let attempt = h.service.start(exam_id, student).await.unwrap();
    h.service.submit(attempt.id, student).await.unwrap();

    let evaluated = h
        .service
        .evaluate(attempt.id, Uuid::new_v4(), &[(essay.id, 40.0)], None)
        .await
        .unwrap();
    assert_eq!(evaluated.total_marks_obtained, 40.0);
    assert_eq!(evaluated.is_passed, Some(true));
}

#[tokio::test]
async fn randomized_attempts_hold_a_permutation_of_the_exam_questions() {
    let student = Uuid::new_v4();
    let questions: Vec<Question> = (0..8)
        .map(|_| question(QuestionType::MultipleChoice, 1.0))
        .collect();
    let refs: Vec<&Question> = questions.iter().collect();
    let mut builder = ExamBuilder::new(&refs, student);
    builder.randomize = true;
    let exam = builder.build();
    let exam_id = exam.id;
    let exam_question_ids: HashSet<Uuid> = exam.questions.iter().copied().collect();
    let h = harness(exam, &refs).await;

    let attempt = h.service.start(exam_id, student).await.unwrap();
    let attempt_question_ids: HashSet<Uuid> =
        attempt.answers.iter().map(|a| a.question_id).collect();

    assert_eq!(attempt.answers.len(), questions.len());
    assert_eq!(attempt_question_ids, exam_question_ids);
}

#[tokio::test]
async fn abandon_sweep_only_touches_overdue_in_progress_attempts() {
    let student = Uuid::new_v4();
    let other_student = Uuid::new_v4();
    let q = question(QuestionType::TrueFalse, 1.0);
    let mut exam = ExamBuilder::new(&[&q], student).build();
    exam.allowed_students.push(other_student);
    let exam_id = exam.id;
    let h = harness(exam.clone(), &[&q]).await;

    let in_progress = h.service.start(exam_id, student).await.unwrap();
    let finished = h.service.start(exam_id, other_student).await.unwrap();
    h.service
        .save_answer(finished.id, other_student, q.id, json!("true"))
        .await
        .unwrap();
    h.service.submit(finished.id, other_student).await.unwrap();

    // nothing is overdue yet
    assert_eq!(
        h.service
            .abandon_overdue(chrono::Duration::minutes(5))
            .await
            .unwrap(),
        0
    );

    exam.end_time = Utc::now() - Duration::hours(1);
    h.exams.insert(exam).await;

    assert_eq!(
        h.service
            .abandon_overdue(chrono::Duration::minutes(5))
            .await
            .unwrap(),
        1
    );

    let abandoned = h.service.my_attempt(exam_id, student).await.unwrap();
    assert_eq!(abandoned.status, AttemptStatus::Abandoned);
    assert!(abandoned.status.is_terminal());
    let untouched = h
        .service
        .my_attempt(exam_id, other_student)
        .await
        .unwrap();
    assert_eq!(untouched.status, AttemptStatus::Evaluated);

    // terminal means terminal: no further writes
    assert!(matches!(
        h.service
            .save_answer(in_progress.id, student, q.id, json!("true"))
            .await
            .unwrap_err(),
        Error::InvalidState(_)
    ));
    assert!(matches!(
        h.service.submit(in_progress.id, student).await.unwrap_err(),
        Error::InvalidState(_)
    ));
}
