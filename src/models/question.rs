use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    Descriptive,
    Coding,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::TrueFalse => "true-false",
            QuestionType::Descriptive => "descriptive",
            QuestionType::Coding => "coding",
        }
    }

    /// Objective questions are graded automatically at submission time;
    /// everything else waits for manual evaluation.
    pub fn is_objective(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }
}

impl std::str::FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple-choice" => Ok(QuestionType::MultipleChoice),
            "true-false" => Ok(QuestionType::TrueFalse),
            "descriptive" => Ok(QuestionType::Descriptive),
            "coding" => Ok(QuestionType::Coding),
            other => Err(format!("unknown question type: {}", other)),
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub is_hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    /// Ordered; only meaningful for multiple-choice and true-false.
    pub options: Vec<QuestionOption>,
    pub points: f64,
    pub difficulty: Difficulty,
    pub topic: String,
    pub subject: String,
    pub explanation: Option<String>,
    pub code_template: Option<String>,
    pub test_cases: Vec<TestCase>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    /// Text of the option flagged correct, if any. Auto-grading compares
    /// the stored answer payload against this by exact value.
    pub fn correct_option_text(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|opt| opt.is_correct)
            .map(|opt| opt.text.as_str())
    }
}

impl<'r> FromRow<'r, PgRow> for Question {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let question_type: String = row.try_get("question_type")?;
        let question_type = question_type
            .parse()
            .map_err(|e: String| super::decode_err("question_type", e))?;
        let difficulty: String = row.try_get("difficulty")?;
        let difficulty = difficulty
            .parse()
            .map_err(|e: String| super::decode_err("difficulty", e))?;
        let options: JsonValue = row.try_get("options")?;
        let options =
            serde_json::from_value(options).map_err(|e| super::decode_err("options", e))?;
        let test_cases: JsonValue = row.try_get("test_cases")?;
        let test_cases =
            serde_json::from_value(test_cases).map_err(|e| super::decode_err("test_cases", e))?;

        Ok(Self {
            id: row.try_get("id")?,
            question_text: row.try_get("question_text")?,
            question_type,
            options,
            points: row.try_get("points")?,
            difficulty,
            topic: row.try_get("topic")?,
            subject: row.try_get("subject")?,
            explanation: row.try_get("explanation")?,
            code_template: row.try_get("code_template")?,
            test_cases,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
