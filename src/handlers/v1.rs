use anyhow::anyhow;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::users::User;

pub mod auth;
pub mod messages;
pub mod partner;
pub mod quiz;
pub mod settings;

/// Flattens validator output into `field: message` pairs.
pub(crate) fn validation_error(e: ValidationErrors) -> AppError {
    let mut error_messages = String::new();
    for (field, errors) in e.field_errors() {
        for error in errors {
            error_messages.push_str(&format!(
                "{}: {} ",
                field,
                error
                    .message
                    .as_ref()
                    .map_or("invalid value", |m| m.as_ref())
            ));
        }
    }
    AppError::BadRequest(anyhow!(error_messages.trim().to_string()))
}

pub(crate) async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    state
        .users
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow!("User not found")))
}

/// The user together with their connected partner's id, or 400.
pub(crate) async fn load_couple(state: &AppState, user_id: Uuid) -> AppResult<(User, Uuid)> {
    let user = load_user(state, user_id).await?;
    match user.connected_partner() {
        Some(partner_id) => Ok((user, partner_id)),
        None => Err(AppError::BadRequest(anyhow!("No partner connected"))),
    }
}

/// Best-effort partner mail; failures are logged only.
pub(crate) async fn notify_partner(state: &AppState, receiver: &User, sender_name: &str, content: &str) {
    if !receiver.email_notifications {
        return;
    }
    if let Err(e) = state
        .notifier
        .send_partner_message(&receiver.email, sender_name, content)
        .await
    {
        tracing::warn!(to = %receiver.email, error = %e, "error sending email notification");
    }
}
