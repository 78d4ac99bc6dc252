use crate::handlers::v1::settings;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::routing::{get, put};
use axum::{middleware, Router};

pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(settings::get_profile))
        .route(
            "/email-notifications",
            put(settings::update_email_notifications),
        )
        .layer(middleware::from_fn(auth_middleware))
}
