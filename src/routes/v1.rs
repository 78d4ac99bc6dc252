pub mod auth;
pub mod messages;
pub mod partner;
pub mod quiz;
pub mod settings;
use crate::app_state::AppState;
use axum::Router;

pub fn v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::auth_routes())
        .nest("/partner", partner::partner_routes())
        .nest("/messages", messages::messages_routes())
        .nest("/settings", settings::settings_routes())
        .nest("/quiz", quiz::quiz_routes())
}
