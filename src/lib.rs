pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::{
    attempt_service::AttemptService, exam_service::ExamService,
    notification_service::NotificationService, question_service::QuestionService,
};
use crate::store::postgres::{PgAttemptStore, PgOutboxStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub exam_service: ExamService,
    pub question_service: QuestionService,
    pub attempt_service: AttemptService,
    pub notification_service: NotificationService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();

        let exam_service = ExamService::new(pool.clone());
        let question_service = QuestionService::new(pool.clone());
        let notification_service = NotificationService::new(
            Arc::new(PgOutboxStore::new(pool.clone())),
            config.notification_webhook_url.clone(),
        );
        let attempt_service = AttemptService::new(
            Arc::new(PgAttemptStore::new(pool.clone())),
            Arc::new(exam_service.clone()),
            Arc::new(question_service.clone()),
            Arc::new(notification_service.clone()),
        );

        Self {
            pool,
            exam_service,
            question_service,
            attempt_service,
            notification_service,
        }
    }
}
