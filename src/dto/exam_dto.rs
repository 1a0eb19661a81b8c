use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::exam::NegativeMarking;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateExamPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub subject: String,
    #[validate(range(min = 1))]
    pub duration_minutes: i32,
    #[validate(range(min = 0.0))]
    pub total_marks: f64,
    #[validate(range(min = 0.0))]
    pub passing_marks: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub instructions: Option<String>,
    #[serde(default)]
    pub questions: Vec<Uuid>,
    #[serde(default = "default_randomize")]
    pub randomize_questions: bool,
    #[serde(default)]
    pub allowed_students: Vec<Uuid>,
    pub department: Option<String>,
    pub semester: Option<i32>,
    #[serde(default)]
    pub negative_marking: NegativeMarking,
}

fn default_randomize() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateExamPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    #[validate(range(min = 1))]
    pub duration_minutes: Option<i32>,
    pub total_marks: Option<f64>,
    pub passing_marks: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
    pub questions: Option<Vec<Uuid>>,
    pub randomize_questions: Option<bool>,
    pub allowed_students: Option<Vec<Uuid>>,
    pub department: Option<String>,
    pub semester: Option<i32>,
    pub negative_marking: Option<NegativeMarking>,
}
