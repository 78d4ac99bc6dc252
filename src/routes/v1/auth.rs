use crate::app_state::AppState;
use crate::handlers::v1::auth;
use axum::{routing::post, Router};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register)) // /api/v1/auth/register
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}
