use crate::handlers::v1::quiz;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::routing::{get, post};
use axum::{middleware, Router};

pub fn quiz_routes() -> Router<AppState> {
    Router::new()
        .route("/batch", get(quiz::get_batch))
        .route("/batch/new", post(quiz::create_new_batch))
        .route("/batch/{batch_id}/results", get(quiz::get_batch_results))
        .route("/question", get(quiz::get_question))
        .route("/answer", post(quiz::submit_answer))
        .route("/check-partner-response", get(quiz::check_partner_response))
        .route("/score", get(quiz::get_score))
        .route("/status", get(quiz::get_status))
        .layer(middleware::from_fn(auth_middleware))
}
