use anyhow::anyhow;
use axum::http::StatusCode;
use axum::{extract::State, response::IntoResponse, Json};
use bcrypt::{hash, verify};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use validator::Validate;

use super::validation_error;
use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::sessions::{UserSession, USER_SESSION_KEY};
use crate::models::users::{PartnerLink, PartnerStatus, User};

#[derive(Deserialize, Validate)]
pub struct Register {
    #[validate(length(min = 1, max = 255, message = "Name is required and cannot be empty"))]
    name: String,

    #[validate(email(message = "Invalid email format"))]
    email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,

    #[validate(email(message = "Invalid partner email format"))]
    partner_email: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<Register>,
) -> AppResult<impl IntoResponse> {
    payload.name = payload.name.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();
    payload.partner_email = payload
        .partner_email
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty());

    payload.validate().map_err(validation_error)?;

    if state.users.find_user_by_email(&payload.email).await?.is_some() {
        return Err(AppError::BadRequest(anyhow!("Email already registered")));
    }

    let password_hash = hash(payload.password.as_bytes(), state.bcrypt_cost)
        .map_err(|_| AppError::InternalServerError(anyhow!("Error processing registration")))?;

    let user = User::new(payload.name, payload.email, password_hash, Utc::now());
    state.users.insert_user(user.clone()).await?;
    tracing::info!(user_id = %user.id, "registered user");

    if let Some(partner_email) = payload.partner_email.filter(|email| *email != user.email) {
        match state.users.find_user_by_email(&partner_email).await? {
            Some(partner) if partner.connected_partner().is_none() => {
                state
                    .users
                    .set_partner_link(user.id, PartnerLink::with_user(partner.id, PartnerStatus::PendingSent))
                    .await?;
                state
                    .users
                    .set_partner_link(partner.id, PartnerLink::with_user(user.id, PartnerStatus::PendingReceived))
                    .await?;
            }
            Some(_) => {}
            None => {
                state
                    .users
                    .set_partner_link(user.id, PartnerLink::invited(partner_email.clone()))
                    .await?;
                if let Err(e) = state.notifier.send_invitation(&partner_email, &user.name).await {
                    tracing::warn!(to = %partner_email, error = %e, "error sending invitation email");
                }
            }
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "User registered successfully",
            "id": user.id,
        })),
    ))
}

#[derive(Deserialize)]
pub struct Login {
    email: String,
    password: String,
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<Login>,
) -> AppResult<impl IntoResponse> {
    let invalid = || AppError::Unauthorized(anyhow!("Invalid email or password"));

    let email = payload.email.trim().to_lowercase();
    let user = state
        .users
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    let password_ok = verify(payload.password.as_bytes(), &user.password_hash)
        .map_err(|_| AppError::InternalServerError(anyhow!("Error verifying password")))?;
    if !password_ok {
        return Err(invalid());
    }

    session
        .insert(USER_SESSION_KEY, UserSession { user_id: user.id })
        .await
        .map_err(|e| AppError::InternalServerError(anyhow!("Failed to create session: {}", e)))?;

    Ok(Json(serde_json::json!({
        "message": "Login successful",
        "user": user,
    })))
}

pub async fn logout(session: Session) -> AppResult<impl IntoResponse> {
    session
        .flush()
        .await
        .map_err(|e| AppError::InternalServerError(anyhow!("Failed to end session: {}", e)))?;

    Ok(Json(serde_json::json!({"message": "Logged out"})))
}
