use crate::handlers::v1::messages;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::routing::{get, post};
use axum::{middleware, Router};

pub fn messages_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(messages::list_messages))
        .route("/send", post(messages::send_message))
        .route("/schedule", post(messages::schedule_message))
        .route("/scheduled", get(messages::list_scheduled_messages))
        .route(
            "/scheduled/{message_id}/cancel",
            post(messages::cancel_scheduled_message),
        )
        .layer(middleware::from_fn(auth_middleware))
}
