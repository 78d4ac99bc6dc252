use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use tower_sessions::Session;

use super::load_user;
use crate::app_state::AppState;
use crate::error::AppResult;
use crate::middlewares::auth::current_user_id;

pub async fn get_profile(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user = load_user(&state, current_user_id(&session).await?).await?;
    Ok(Json(serde_json::json!({ "user": user })))
}

#[derive(Deserialize)]
pub struct EmailNotifications {
    enabled: bool,
}

pub async fn update_email_notifications(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<EmailNotifications>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&session).await?;
    let changed = state
        .users
        .set_email_notifications(user_id, payload.enabled)
        .await?;

    let message = if changed {
        "Email notification preferences updated successfully"
    } else {
        "No changes made"
    };
    Ok(Json(serde_json::json!({
        "message": message,
        "email_notifications": payload.enabled,
    })))
}
