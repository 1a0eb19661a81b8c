use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Evaluated,
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in-progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Evaluated => "evaluated",
            AttemptStatus::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Evaluated | AttemptStatus::Abandoned)
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-progress" => Ok(AttemptStatus::InProgress),
            "submitted" => Ok(AttemptStatus::Submitted),
            "evaluated" => Ok(AttemptStatus::Evaluated),
            "abandoned" => Ok(AttemptStatus::Abandoned),
            other => Err(format!("unknown attempt status: {}", other)),
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One slot of the attempt's answer sheet. Created at start time with a
/// null payload and never added to or removed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: Uuid,
    pub answer: Option<JsonValue>,
    pub is_correct: bool,
    pub marks_obtained: f64,
}

impl Answer {
    pub fn blank(question_id: Uuid) -> Self {
        Self {
            question_id,
            answer: None,
            is_correct: false,
            marks_obtained: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamAttempt {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Uuid,
    /// Fixed length for the life of the attempt; order established at
    /// start time.
    pub answers: Vec<Answer>,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub total_marks_obtained: f64,
    pub percentage: Option<f64>,
    pub is_passed: Option<bool>,
    pub evaluated_by: Option<Uuid>,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
}

impl ExamAttempt {
    pub fn new(exam_id: Uuid, student_id: Uuid, question_order: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            exam_id,
            student_id,
            answers: question_order.into_iter().map(Answer::blank).collect(),
            status: AttemptStatus::InProgress,
            started_at: Utc::now(),
            submitted_at: None,
            total_marks_obtained: 0.0,
            percentage: None,
            is_passed: None,
            evaluated_by: None,
            evaluated_at: None,
            feedback: None,
        }
    }

    pub fn answer_for(&self, question_id: Uuid) -> Option<&Answer> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }
}
