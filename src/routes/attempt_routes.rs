use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::dto::attempt_dto::{
    AttemptListResponse, AttemptResponse, EvaluateAttemptRequest, SaveAnswerRequest,
    SaveAnswerResponse,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::services::access_policy::{AccessPolicy, Caller};
use crate::AppState;

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    let exam = state.exam_service.get_exam(exam_id).await?;
    if !AccessPolicy::can_start(&caller, &exam) {
        return Err(Error::Forbidden(
            "You are not allowed to take this exam".to_string(),
        ));
    }

    let attempt = state.attempt_service.start(exam_id, caller.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(AttemptResponse {
            message: "Exam started successfully".to_string(),
            attempt,
        }),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    state
        .attempt_service
        .save_answer(attempt_id, caller.id, req.question_id, req.answer)
        .await?;

    Ok(Json(SaveAnswerResponse {
        saved: true,
        question_id: req.question_id,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    let attempt = state.attempt_service.submit(attempt_id, caller.id).await?;

    Ok(Json(AttemptResponse {
        message: "Exam submitted successfully".to_string(),
        attempt,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn evaluate_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<EvaluateAttemptRequest>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    if !AccessPolicy::can_evaluate(&caller) {
        return Err(Error::Forbidden("Evaluator role required".to_string()));
    }

    let scores: Vec<(Uuid, f64)> = req
        .answers
        .iter()
        .map(|s| (s.question_id, s.marks_obtained))
        .collect();
    let attempt = state
        .attempt_service
        .evaluate(attempt_id, caller.id, &scores, req.feedback)
        .await?;

    Ok(Json(AttemptResponse {
        message: "Exam evaluated successfully".to_string(),
        attempt,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    let attempt = state.attempt_service.attempt_by_id(attempt_id).await?;
    if !AccessPolicy::can_view_attempt(&caller, &attempt) {
        return Err(Error::Forbidden(
            "You are not allowed to view this attempt".to_string(),
        ));
    }

    Ok(Json(attempt).into_response())
}

#[axum::debug_handler]
pub async fn my_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    let attempt = state.attempt_service.my_attempt(exam_id, caller.id).await?;
    Ok(Json(attempt).into_response())
}

#[axum::debug_handler]
pub async fn my_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    let attempts = state.attempt_service.my_attempts(caller.id).await?;
    Ok(Json(AttemptListResponse {
        count: attempts.len(),
        attempts,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn exam_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Response> {
    let caller = Caller::try_from(&claims)?;
    if !AccessPolicy::can_evaluate(&caller) {
        return Err(Error::Forbidden("Evaluator role required".to_string()));
    }

    let attempts = state.attempt_service.attempts_for_exam(exam_id).await?;
    Ok(Json(AttemptListResponse {
        count: attempts.len(),
        attempts,
    })
    .into_response())
}
