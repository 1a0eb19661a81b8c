use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::exam_attempt::ExamAttempt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAnswerRequest {
    pub question_id: Uuid,
    pub answer: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAnswerResponse {
    pub saved: bool,
    pub question_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerScore {
    pub question_id: Uuid,
    pub marks_obtained: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateAttemptRequest {
    #[serde(default)]
    pub answers: Vec<AnswerScore>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResponse {
    pub message: String,
    pub attempt: ExamAttempt,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptListResponse {
    pub count: usize,
    pub attempts: Vec<ExamAttempt>,
}
