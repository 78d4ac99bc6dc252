use crate::app_state::AppState;
use crate::handlers::hello::{health, hello};
use axum::{routing::get, Router};

pub fn index_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(hello))
        .route("/health", get(health))
}
