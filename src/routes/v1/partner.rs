use crate::handlers::v1::partner;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::routing::{get, post};
use axum::{middleware, Router};

pub fn partner_routes() -> Router<AppState> {
    // Protected routes that require authentication
    Router::new()
        .route("/invite", post(partner::invite_partner))
        .route("/accept", post(partner::accept_partner))
        .route("/reject", post(partner::reject_partner))
        .route("/status", get(partner::partner_status))
        .layer(middleware::from_fn(auth_middleware))
}
