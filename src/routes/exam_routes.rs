use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::exam_dto::{CreateExamPayload, UpdateExamPayload};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::services::access_policy::{AccessPolicy, Caller, Role};
use crate::AppState;

#[axum::debug_handler]
pub async fn create_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamPayload>,
) -> Result<Response> {
    payload.validate()?;
    let caller = Caller::try_from(&claims)?;
    if !AccessPolicy::can_evaluate(&caller) {
        return Err(Error::Forbidden(
            "Only faculty or admin may create exams".to_string(),
        ));
    }

    let exam = state.exam_service.create_exam(payload, caller.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Exam created successfully", "exam": exam })),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn list_exams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    let exams = match caller.role {
        Role::Student => {
            state
                .exam_service
                .list_for_student(caller.id, caller.department.as_deref(), caller.semester)
                .await?
        }
        Role::Faculty => state.exam_service.list_created_by(caller.id).await?,
        Role::Admin => state.exam_service.list_all().await?,
    };

    Ok(Json(json!({ "count": exams.len(), "exams": exams })).into_response())
}

#[axum::debug_handler]
pub async fn get_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    let exam = state.exam_service.get_exam(exam_id).await?;
    if !AccessPolicy::can_view_exam(&caller, &exam) {
        return Err(Error::Forbidden(
            "You are not allowed to access this exam".to_string(),
        ));
    }

    Ok(Json(json!({ "exam": exam })).into_response())
}

#[axum::debug_handler]
pub async fn update_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    Json(payload): Json<UpdateExamPayload>,
) -> Result<Response> {
    payload.validate()?;
    let caller = Caller::try_from(&claims)?;
    let exam = state.exam_service.get_exam(exam_id).await?;
    if !AccessPolicy::can_manage_exam(&caller, &exam) {
        return Err(Error::Forbidden(
            "Not authorized to update this exam".to_string(),
        ));
    }

    let exam = state.exam_service.update_exam(exam_id, payload).await?;
    Ok(Json(json!({ "message": "Exam updated successfully", "exam": exam })).into_response())
}

#[axum::debug_handler]
pub async fn delete_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    let exam = state.exam_service.get_exam(exam_id).await?;
    if !AccessPolicy::can_manage_exam(&caller, &exam) {
        return Err(Error::Forbidden(
            "Not authorized to delete this exam".to_string(),
        ));
    }

    state.exam_service.delete_exam(exam_id).await?;
    Ok(Json(json!({ "message": "Exam deleted successfully" })).into_response())
}

#[axum::debug_handler]
pub async fn toggle_publish(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    let exam = state.exam_service.get_exam(exam_id).await?;
    if !AccessPolicy::can_manage_exam(&caller, &exam) {
        return Err(Error::Forbidden(
            "Not authorized to publish this exam".to_string(),
        ));
    }

    let exam = state.exam_service.toggle_publish(exam_id).await?;
    let verb = if exam.is_published {
        "published"
    } else {
        "unpublished"
    };
    Ok(Json(json!({
        "message": format!("Exam {} successfully", verb),
        "exam": exam,
    }))
    .into_response())
}

#[axum::debug_handler]
pub async fn upcoming_exams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    let exams = state
        .exam_service
        .upcoming_for_student(caller.id, caller.department.as_deref(), caller.semester)
        .await?;

    Ok(Json(json!({ "count": exams.len(), "exams": exams })).into_response())
}
