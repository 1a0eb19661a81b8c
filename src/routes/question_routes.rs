use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::question_dto::{CreateQuestionPayload, QuestionFilter, UpdateQuestionPayload};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::models::question::{Difficulty, QuestionType};
use crate::services::access_policy::Caller;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
}

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<Response> {
    payload.validate()?;
    let caller = Caller::try_from(&claims)?;

    let question = state
        .question_service
        .create_question(payload, caller.id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Question created successfully", "question": question })),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionListQuery>,
) -> Result<Response> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let filter = QuestionFilter {
        subject: query.subject,
        topic: query.topic,
        difficulty: query.difficulty,
        question_type: query.question_type,
    };

    let result = state
        .question_service
        .list_questions(page, limit, filter)
        .await?;
    Ok(Json(result).into_response())
}

#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
) -> Result<Response> {
    let question = state.question_service.get_question(question_id).await?;
    Ok(Json(json!({ "question": question })).into_response())
}

#[axum::debug_handler]
pub async fn update_question(
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
    Json(payload): Json<UpdateQuestionPayload>,
) -> Result<Response> {
    payload.validate()?;
    let question = state
        .question_service
        .update_question(question_id, payload)
        .await?;
    Ok(Json(json!({ "message": "Question updated successfully", "question": question }))
        .into_response())
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
) -> Result<Response> {
    state.question_service.delete_question(question_id).await?;
    Ok(Json(json!({ "message": "Question deleted successfully" })).into_response())
}
