use std::borrow::Cow;

use anyhow::anyhow;
use axum::http::StatusCode;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{load_user, notify_partner, validation_error};
use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::middlewares::auth::current_user_id;
use crate::models::messages::{parse_scheduled_time, Message, ScheduledMessage};
use crate::models::users::User;

#[derive(Deserialize, Validate)]
pub struct SendMessage {
    #[validate(
        length(min = 1, message = "Message content cannot be empty"),
        custom(function = "content_within_limit")
    )]
    content: String,

    #[serde(rename = "receiverId", alias = "receiver_id")]
    receiver_id: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct ScheduleMessage {
    #[validate(
        length(min = 1, message = "Message content cannot be empty"),
        custom(function = "content_within_limit")
    )]
    content: String,

    #[serde(rename = "receiverId", alias = "receiver_id")]
    receiver_id: Option<String>,

    #[serde(rename = "scheduledTime", alias = "scheduled_time")]
    scheduled_time: String,
}

const MAX_CONTENT_CHARS: usize = 5000;

fn content_within_limit(content: &str) -> Result<(), ValidationError> {
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ValidationError::new("content_too_long").with_message(Cow::Owned(format!(
            "Message content cannot exceed {} characters",
            MAX_CONTENT_CHARS
        ))));
    }
    Ok(())
}

pub async fn list_messages(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&session).await?;
    let messages = state.messages.list_messages_for_user(user_id).await?;
    Ok(Json(serde_json::json!({ "messages": messages })))
}

pub async fn send_message(
    State(state): State<AppState>,
    session: Session,
    Json(mut payload): Json<SendMessage>,
) -> AppResult<impl IntoResponse> {
    payload.content = payload.content.trim().to_string();
    payload.validate().map_err(validation_error)?;

    let sender = load_user(&state, current_user_id(&session).await?).await?;
    let receiver = resolve_receiver(&state, &sender, payload.receiver_id.as_deref()).await?;

    let message = Message::new(sender.id, receiver.id, payload.content, Utc::now());
    state.messages.insert_message(message.clone()).await?;

    notify_partner(&state, &receiver, &sender.name, &message.content).await;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Message sent successfully",
            "data": message,
        })),
    ))
}

pub async fn schedule_message(
    State(state): State<AppState>,
    session: Session,
    Json(mut payload): Json<ScheduleMessage>,
) -> AppResult<impl IntoResponse> {
    payload.content = payload.content.trim().to_string();
    payload.validate().map_err(validation_error)?;

    let scheduled_time = parse_scheduled_time(&payload.scheduled_time)
        .map_err(|e| AppError::BadRequest(anyhow!("Invalid date format: {}", e)))?;

    let sender = load_user(&state, current_user_id(&session).await?).await?;
    let receiver = resolve_receiver(&state, &sender, payload.receiver_id.as_deref()).await?;

    let scheduled = ScheduledMessage::new(
        sender.id,
        receiver.id,
        payload.content,
        scheduled_time,
        Utc::now(),
    );
    state
        .scheduled_messages
        .insert_scheduled_message(scheduled.clone())
        .await?;
    tracing::info!(id = %scheduled.id, scheduled_time = %scheduled.scheduled_time, "scheduled message");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Message scheduled successfully",
            "data": scheduled,
        })),
    ))
}

pub async fn list_scheduled_messages(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&session).await?;
    let scheduled_messages = state
        .scheduled_messages
        .list_pending_for_sender(user_id)
        .await?;
    Ok(Json(serde_json::json!({
        "scheduled_messages": scheduled_messages
    })))
}

pub async fn cancel_scheduled_message(
    State(state): State<AppState>,
    session: Session,
    Path(message_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&session).await?;
    let message_id = Uuid::parse_str(message_id.trim())
        .map_err(|_| AppError::BadRequest(anyhow!("Invalid message ID format")))?;

    let cancelled = state
        .scheduled_messages
        .cancel_scheduled_message(message_id, user_id)
        .await?;
    if !cancelled {
        return Err(AppError::NotFound(anyhow!(
            "No pending message found with that ID"
        )));
    }

    Ok(Json(serde_json::json!({
        "message": "Scheduled message cancelled successfully"
    })))
}

/// An explicit receiver, or the sender's connected partner.
async fn resolve_receiver(
    state: &AppState,
    sender: &User,
    receiver_id: Option<&str>,
) -> AppResult<User> {
    let receiver_id = match receiver_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(raw) => Uuid::parse_str(raw)
            .map_err(|_| AppError::BadRequest(anyhow!("Invalid receiver ID format")))?,
        None => sender.connected_partner().ok_or_else(|| {
            AppError::BadRequest(anyhow!("No partner connected and no receiver specified"))
        })?,
    };

    state
        .users
        .find_user_by_id(receiver_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow!("Receiver not found")))
}
