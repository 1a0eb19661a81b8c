use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::{Difficulty, QuestionOption, QuestionType, TestCase};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionPayload {
    #[validate(length(min = 1))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default = "default_points")]
    pub points: f64,
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    #[validate(length(min = 1))]
    pub topic: String,
    #[validate(length(min = 1))]
    pub subject: String,
    pub explanation: Option<String>,
    pub code_template: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

fn default_points() -> f64 {
    1.0
}

fn default_difficulty() -> Difficulty {
    Difficulty::Medium
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateQuestionPayload {
    #[validate(length(min = 1))]
    pub question_text: Option<String>,
    pub question_type: Option<QuestionType>,
    pub options: Option<Vec<QuestionOption>>,
    pub points: Option<f64>,
    pub difficulty: Option<Difficulty>,
    pub topic: Option<String>,
    pub subject: Option<String>,
    pub explanation: Option<String>,
    pub code_template: Option<String>,
    pub test_cases: Option<Vec<TestCase>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionFilter {
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
}
