use axum::{
    routing::{get, post, put},
    Router,
};
use exam_portal_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware, routes, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    {
        let notif = app_state.notification_service.clone();
        tokio::spawn(async move {
            loop {
                match notif.run_once().await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::time::sleep(Duration::from_millis(1000)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Outbox worker error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    {
        let attempts = app_state.attempt_service.clone();
        let grace = chrono::Duration::minutes(config.abandon_grace_minutes);
        tokio::spawn(async move {
            loop {
                match attempts.abandon_overdue(grace).await {
                    Ok(0) => {}
                    Ok(n) => info!(count = n, "Abandoned overdue attempts"),
                    Err(e) => tracing::error!("Abandon sweep error: {:?}", e),
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });
    }

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let exam_api = Router::new()
        .route(
            "/api/exams",
            get(routes::exam_routes::list_exams).post(routes::exam_routes::create_exam),
        )
        .route(
            "/api/exams/upcoming",
            get(routes::exam_routes::upcoming_exams),
        )
        .route(
            "/api/exams/:id",
            get(routes::exam_routes::get_exam)
                .patch(routes::exam_routes::update_exam)
                .delete(routes::exam_routes::delete_exam),
        )
        .route(
            "/api/exams/:id/publish",
            axum::routing::patch(routes::exam_routes::toggle_publish),
        );

    let attempt_api = Router::new()
        .route(
            "/api/exam-attempts/start/:exam_id",
            post(routes::attempt_routes::start_attempt),
        )
        .route(
            "/api/exam-attempts/:id/answer",
            axum::routing::patch(routes::attempt_routes::save_answer),
        )
        .route(
            "/api/exam-attempts/:id/submit",
            post(routes::attempt_routes::submit_attempt),
        )
        .route(
            "/api/exam-attempts/:id/evaluate",
            put(routes::attempt_routes::evaluate_attempt),
        )
        .route(
            "/api/exam-attempts/my-attempts",
            get(routes::attempt_routes::my_attempts),
        )
        .route(
            "/api/exam-attempts/my/:exam_id",
            get(routes::attempt_routes::my_attempt),
        )
        .route(
            "/api/exam-attempts/:id",
            get(routes::attempt_routes::get_attempt),
        )
        .route(
            "/api/exam-attempts/exam/:exam_id",
            get(routes::attempt_routes::exam_attempts),
        );

    let authed_api = exam_api
        .merge(attempt_api)
        .layer(axum::middleware::from_fn(middleware::auth::require_auth));

    let question_api = Router::new()
        .route(
            "/api/questions",
            get(routes::question_routes::list_questions)
                .post(routes::question_routes::create_question),
        )
        .route(
            "/api/questions/:id",
            get(routes::question_routes::get_question)
                .put(routes::question_routes::update_question)
                .delete(routes::question_routes::delete_question),
        )
        .layer(axum::middleware::from_fn(
            middleware::auth::require_faculty_or_admin,
        ));

    let app = base_routes
        .merge(authed_api)
        .merge(question_api)
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::new_rps_state(config.api_rps),
            middleware::rate_limit::rps_middleware,
        ))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
