use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::question_dto::{CreateQuestionPayload, QuestionFilter, UpdateQuestionPayload};
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::store::QuestionLookup;

#[derive(Debug, serde::Serialize)]
pub struct PaginatedQuestions {
    #[serde(rename = "items")]
    pub questions: Vec<Question>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_question(
        &self,
        payload: CreateQuestionPayload,
        created_by: Uuid,
    ) -> Result<Question> {
        if payload.points <= 0.0 {
            return Err(Error::BadRequest("points must be positive".to_string()));
        }

        let options = serde_json::to_value(&payload.options)?;
        let test_cases = serde_json::to_value(&payload.test_cases)?;

        let question = sqlx::query_as::<_, Question>(
            r#"INSERT INTO questions (
                   question_text, question_type, options, points, difficulty,
                   topic, subject, explanation, code_template, test_cases, created_by
               )
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING *"#,
        )
        .bind(payload.question_text)
        .bind(payload.question_type.as_str())
        .bind(options)
        .bind(payload.points)
        .bind(payload.difficulty.as_str())
        .bind(payload.topic)
        .bind(payload.subject)
        .bind(payload.explanation)
        .bind(payload.code_template)
        .bind(test_cases)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(question)
    }

    pub async fn get_question(&self, question_id: Uuid) -> Result<Question> {
        let question = sqlx::query_as::<_, Question>(r#"SELECT * FROM questions WHERE id = $1"#)
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;
        Ok(question)
    }

    pub async fn update_question(
        &self,
        question_id: Uuid,
        payload: UpdateQuestionPayload,
    ) -> Result<Question> {
        if matches!(payload.points, Some(p) if p <= 0.0) {
            return Err(Error::BadRequest("points must be positive".to_string()));
        }

        let options = payload
            .options
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let test_cases = payload
            .test_cases
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let question = sqlx::query_as::<_, Question>(
            r#"UPDATE questions
               SET
                   question_text = COALESCE($1, question_text),
                   question_type = COALESCE($2, question_type),
                   options = COALESCE($3, options),
                   points = COALESCE($4, points),
                   difficulty = COALESCE($5, difficulty),
                   topic = COALESCE($6, topic),
                   subject = COALESCE($7, subject),
                   explanation = COALESCE($8, explanation),
                   code_template = COALESCE($9, code_template),
                   test_cases = COALESCE($10, test_cases),
                   updated_at = NOW()
               WHERE id = $11
               RETURNING *"#,
        )
        .bind(payload.question_text)
        .bind(payload.question_type.map(|t| t.as_str().to_string()))
        .bind(options)
        .bind(payload.points)
        .bind(payload.difficulty.map(|d| d.as_str().to_string()))
        .bind(payload.topic)
        .bind(payload.subject)
        .bind(payload.explanation)
        .bind(payload.code_template)
        .bind(test_cases)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;

        Ok(question)
    }

    pub async fn delete_question(&self, question_id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM questions WHERE id = $1"#)
            .bind(question_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_questions(
        &self,
        page: i64,
        per_page: i64,
        filter: QuestionFilter,
    ) -> Result<PaginatedQuestions> {
        let offset = (page - 1) * per_page;
        let question_type = filter.question_type.map(|t| t.as_str().to_string());
        let difficulty = filter.difficulty.map(|d| d.as_str().to_string());

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM questions
               WHERE ($1::text IS NULL OR subject = $1)
                 AND ($2::text IS NULL OR topic = $2)
                 AND ($3::text IS NULL OR difficulty = $3)
                 AND ($4::text IS NULL OR question_type = $4)"#,
        )
        .bind(filter.subject.clone())
        .bind(filter.topic.clone())
        .bind(difficulty.clone())
        .bind(question_type.clone())
        .fetch_one(&self.pool)
        .await?;

        let questions = sqlx::query_as::<_, Question>(
            r#"SELECT * FROM questions
               WHERE ($1::text IS NULL OR subject = $1)
                 AND ($2::text IS NULL OR topic = $2)
                 AND ($3::text IS NULL OR difficulty = $3)
                 AND ($4::text IS NULL OR question_type = $4)
               ORDER BY created_at DESC
               LIMIT $5 OFFSET $6"#,
        )
        .bind(filter.subject)
        .bind(filter.topic)
        .bind(difficulty)
        .bind(question_type)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total_pages = if per_page > 0 {
            ((total as f64) / (per_page as f64)).ceil() as i64
        } else {
            1
        };

        Ok(PaginatedQuestions {
            questions,
            total,
            page,
            per_page,
            total_pages,
        })
    }
}

#[async_trait]
impl QuestionLookup for QuestionService {
    async fn questions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Question>> {
        let questions =
            sqlx::query_as::<_, Question>(r#"SELECT * FROM questions WHERE id = ANY($1)"#)
                .bind(ids.to_vec())
                .fetch_all(&self.pool)
                .await?;
        Ok(questions)
    }
}
