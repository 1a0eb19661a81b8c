use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::exam_dto::{CreateExamPayload, UpdateExamPayload};
use crate::error::{Error, Result};
use crate::models::exam::Exam;
use crate::store::ExamLookup;

#[derive(Clone)]
pub struct ExamService {
    pool: PgPool,
}

impl ExamService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_exam(&self, payload: CreateExamPayload, created_by: Uuid) -> Result<Exam> {
        if payload.start_time >= payload.end_time {
            return Err(Error::BadRequest(
                "start_time must be before end_time".to_string(),
            ));
        }

        let exam = sqlx::query_as::<_, Exam>(
            r#"INSERT INTO exams (
                   title, description, subject, duration_minutes, total_marks,
                   passing_marks, start_time, end_time, instructions, questions,
                   randomize_questions, allowed_students, department, semester,
                   negative_marking_enabled, negative_marks_per_wrong, created_by
               )
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
               RETURNING *"#,
        )
        .bind(payload.title)
        .bind(payload.description)
        .bind(payload.subject)
        .bind(payload.duration_minutes)
        .bind(payload.total_marks)
        .bind(payload.passing_marks)
        .bind(payload.start_time)
        .bind(payload.end_time)
        .bind(payload.instructions)
        .bind(payload.questions)
        .bind(payload.randomize_questions)
        .bind(payload.allowed_students)
        .bind(payload.department)
        .bind(payload.semester)
        .bind(payload.negative_marking.enabled)
        .bind(payload.negative_marking.marks_per_wrong)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(exam)
    }

    pub async fn get_exam(&self, exam_id: Uuid) -> Result<Exam> {
        let exam = sqlx::query_as::<_, Exam>(r#"SELECT * FROM exams WHERE id = $1"#)
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Exam not found".to_string()))?;
        Ok(exam)
    }

    pub async fn update_exam(&self, exam_id: Uuid, payload: UpdateExamPayload) -> Result<Exam> {
        let exam = sqlx::query_as::<_, Exam>(
            r#"UPDATE exams
               SET
                   title = COALESCE($1, title),
                   description = COALESCE($2, description),
                   subject = COALESCE($3, subject),
                   duration_minutes = COALESCE($4, duration_minutes),
                   total_marks = COALESCE($5, total_marks),
                   passing_marks = COALESCE($6, passing_marks),
                   start_time = COALESCE($7, start_time),
                   end_time = COALESCE($8, end_time),
                   instructions = COALESCE($9, instructions),
                   questions = COALESCE($10::uuid[], questions),
                   randomize_questions = COALESCE($11, randomize_questions),
                   allowed_students = COALESCE($12::uuid[], allowed_students),
                   department = COALESCE($13, department),
                   semester = COALESCE($14, semester),
                   negative_marking_enabled = COALESCE($15, negative_marking_enabled),
                   negative_marks_per_wrong = COALESCE($16, negative_marks_per_wrong),
                   updated_at = NOW()
               WHERE id = $17
               RETURNING *"#,
        )
        .bind(payload.title)
        .bind(payload.description)
        .bind(payload.subject)
        .bind(payload.duration_minutes)
        .bind(payload.total_marks)
        .bind(payload.passing_marks)
        .bind(payload.start_time)
        .bind(payload.end_time)
        .bind(payload.instructions)
        .bind(payload.questions)
        .bind(payload.randomize_questions)
        .bind(payload.allowed_students)
        .bind(payload.department)
        .bind(payload.semester)
        .bind(payload.negative_marking.map(|n| n.enabled))
        .bind(payload.negative_marking.map(|n| n.marks_per_wrong))
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Exam not found".to_string()))?;

        Ok(exam)
    }

    pub async fn delete_exam(&self, exam_id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM exams WHERE id = $1"#)
            .bind(exam_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn toggle_publish(&self, exam_id: Uuid) -> Result<Exam> {
        let exam = sqlx::query_as::<_, Exam>(
            r#"UPDATE exams
               SET is_published = NOT is_published, updated_at = NOW()
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Exam not found".to_string()))?;
        Ok(exam)
    }

    /// Published exams the student's access rule admits, newest first.
    pub async fn list_for_student(
        &self,
        student_id: Uuid,
        department: Option<&str>,
        semester: Option<i32>,
    ) -> Result<Vec<Exam>> {
        let exams = sqlx::query_as::<_, Exam>(
            r#"SELECT * FROM exams
               WHERE is_published = TRUE
                 AND ($1 = ANY(allowed_students)
                      OR (department = $2 AND semester = $3))
               ORDER BY start_time DESC"#,
        )
        .bind(student_id)
        .bind(department)
        .bind(semester)
        .fetch_all(&self.pool)
        .await?;
        Ok(exams)
    }

    pub async fn list_created_by(&self, faculty_id: Uuid) -> Result<Vec<Exam>> {
        let exams = sqlx::query_as::<_, Exam>(
            r#"SELECT * FROM exams WHERE created_by = $1 ORDER BY start_time DESC"#,
        )
        .bind(faculty_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(exams)
    }

    pub async fn list_all(&self) -> Result<Vec<Exam>> {
        let exams =
            sqlx::query_as::<_, Exam>(r#"SELECT * FROM exams ORDER BY start_time DESC"#)
                .fetch_all(&self.pool)
                .await?;
        Ok(exams)
    }

    pub async fn upcoming_for_student(
        &self,
        student_id: Uuid,
        department: Option<&str>,
        semester: Option<i32>,
    ) -> Result<Vec<Exam>> {
        let exams = sqlx::query_as::<_, Exam>(
            r#"SELECT * FROM exams
               WHERE is_published = TRUE
                 AND start_time > NOW()
                 AND ($1 = ANY(allowed_students)
                      OR (department = $2 AND semester = $3))
               ORDER BY start_time ASC
               LIMIT 10"#,
        )
        .bind(student_id)
        .bind(department)
        .bind(semester)
        .fetch_all(&self.pool)
        .await?;
        Ok(exams)
    }
}

#[async_trait]
impl ExamLookup for ExamService {
    async fn exam_by_id(&self, exam_id: Uuid) -> Result<Option<Exam>> {
        let exam = sqlx::query_as::<_, Exam>(r#"SELECT * FROM exams WHERE id = $1"#)
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(exam)
    }
}
