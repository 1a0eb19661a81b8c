use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NegativeMarking {
    pub enabled: bool,
    pub marks_per_wrong: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub duration_minutes: i32,
    pub total_marks: f64,
    pub passing_marks: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub instructions: Option<String>,
    /// Ordered question references; attempt answers are materialized in
    /// this order (or a permutation of it).
    pub questions: Vec<Uuid>,
    pub randomize_questions: bool,
    pub allowed_students: Vec<Uuid>,
    pub department: Option<String>,
    pub semester: Option<i32>,
    pub is_published: bool,
    pub negative_marking: NegativeMarking,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exam {
    /// Access rule: explicit allow-list membership, or department plus
    /// semester match.
    pub fn admits(&self, student_id: Uuid, department: Option<&str>, semester: Option<i32>) -> bool {
        if self.allowed_students.contains(&student_id) {
            return true;
        }
        match (&self.department, self.semester) {
            (Some(dept), Some(sem)) => department == Some(dept.as_str()) && semester == Some(sem),
            _ => false,
        }
    }
}

impl<'r> FromRow<'r, PgRow> for Exam {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            subject: row.try_get("subject")?,
            duration_minutes: row.try_get("duration_minutes")?,
            total_marks: row.try_get("total_marks")?,
            passing_marks: row.try_get("passing_marks")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            instructions: row.try_get("instructions")?,
            questions: row.try_get("questions")?,
            randomize_questions: row.try_get("randomize_questions")?,
            allowed_students: row.try_get("allowed_students")?,
            department: row.try_get("department")?,
            semester: row.try_get("semester")?,
            is_published: row.try_get("is_published")?,
            negative_marking: NegativeMarking {
                enabled: row.try_get("negative_marking_enabled")?,
                marks_per_wrong: row.try_get("negative_marks_per_wrong")?,
            },
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
