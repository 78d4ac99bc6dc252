use anyhow::anyhow;
use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use tower_sessions::Session;
use validator::Validate;

use super::{load_user, notify_partner, validation_error};
use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::middlewares::auth::current_user_id;
use crate::models::users::{PartnerLink, PartnerStatus, User};

#[derive(Deserialize, Validate)]
pub struct InvitePartner {
    #[validate(email(message = "Invalid partner email format"))]
    partner_email: String,
}

pub async fn invite_partner(
    State(state): State<AppState>,
    session: Session,
    Json(mut payload): Json<InvitePartner>,
) -> AppResult<impl IntoResponse> {
    payload.partner_email = payload.partner_email.trim().to_lowercase();
    payload.validate().map_err(validation_error)?;

    let user = load_user(&state, current_user_id(&session).await?).await?;

    if payload.partner_email == user.email {
        return Err(AppError::BadRequest(anyhow!("You cannot invite yourself")));
    }
    if user.connected_partner().is_some() {
        return Err(AppError::BadRequest(anyhow!(
            "You are already connected with a partner"
        )));
    }

    let partner = state.users.find_user_by_email(&payload.partner_email).await?;
    if let Some(partner) = &partner {
        if partner.connected_partner().is_some_and(|id| id != user.id) {
            return Err(AppError::BadRequest(anyhow!(
                "This user is already connected with another partner"
            )));
        }
    }

    release_previous_partner(&state, &user, partner.as_ref().map(|p| p.id)).await?;

    match partner {
        Some(partner) => {
            state
                .users
                .set_partner_link(user.id, PartnerLink::with_user(partner.id, PartnerStatus::PendingSent))
                .await?;
            state
                .users
                .set_partner_link(partner.id, PartnerLink::with_user(user.id, PartnerStatus::PendingReceived))
                .await?;

            let content = format!(
                "{} would like to connect with you on Together. Log in to accept the invitation.",
                user.name
            );
            notify_partner(&state, &partner, &user.name, &content).await;
        }
        None => {
            state
                .users
                .set_partner_link(user.id, PartnerLink::invited(payload.partner_email.clone()))
                .await?;
            if let Err(e) = state
                .notifier
                .send_invitation(&payload.partner_email, &user.name)
                .await
            {
                tracing::warn!(to = %payload.partner_email, error = %e, "error sending invitation email");
            }
        }
    }

    Ok(Json(serde_json::json!({
        "message": "Partnership invitation sent successfully"
    })))
}

pub async fn accept_partner(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user = load_user(&state, current_user_id(&session).await?).await?;
    let no_invitation = || AppError::NotFound(anyhow!("No pending partnership invitation found"));

    let partner_id = match (user.partner_id, user.partner_status) {
        (Some(partner_id), Some(PartnerStatus::PendingReceived)) => partner_id,
        _ => return Err(no_invitation()),
    };

    let partner = state
        .users
        .find_user_by_id(partner_id)
        .await?
        .filter(|partner| {
            partner.partner_id == Some(user.id)
                && partner.partner_status == Some(PartnerStatus::PendingSent)
        });
    let Some(partner) = partner else {
        // the inviter moved on; drop the stale invitation
        state.users.clear_partner_link(user.id).await?;
        return Err(no_invitation());
    };

    state
        .users
        .set_partner_link(user.id, PartnerLink::with_user(partner.id, PartnerStatus::Connected))
        .await?;
    state
        .users
        .set_partner_link(partner.id, PartnerLink::with_user(user.id, PartnerStatus::Connected))
        .await?;
    tracing::info!(user_id = %user.id, partner_id = %partner.id, "partners connected");

    let content = format!(
        "{} has accepted your partnership invitation. You are now connected!",
        user.name
    );
    notify_partner(&state, &partner, &user.name, &content).await;

    Ok(Json(serde_json::json!({
        "message": "Partnership accepted successfully"
    })))
}

pub async fn reject_partner(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user = load_user(&state, current_user_id(&session).await?).await?;

    if user.partner_id.is_none() && user.partner_status.is_none() {
        return Err(AppError::NotFound(anyhow!("No partnership data found")));
    }

    state.users.clear_partner_link(user.id).await?;
    if let Some(partner) = linked_back(&state, &user).await? {
        state.users.clear_partner_link(partner.id).await?;
        notify_partner(
            &state,
            &partner,
            &user.name,
            "Your partnership invitation has been declined.",
        )
        .await;
    }

    Ok(Json(serde_json::json!({"message": "Partnership removed"})))
}

pub async fn partner_status(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user = load_user(&state, current_user_id(&session).await?).await?;

    let partner = match user.partner_id {
        Some(partner_id) => state.users.find_user_by_id(partner_id).await?,
        None => None,
    };

    Ok(Json(serde_json::json!({
        "has_partner": user.partner_id.is_some(),
        "status": user.partner_status.map_or("none", |status| status.as_str()),
        "partner_email": user.partner_email,
        "partner": partner.map(|partner| serde_json::json!({
            "id": partner.id,
            "name": partner.name,
            "email": partner.email,
        })),
    })))
}

/// The user's linked partner, if that partner still links back.
async fn linked_back(state: &AppState, user: &User) -> AppResult<Option<User>> {
    let Some(partner_id) = user.partner_id else {
        return Ok(None);
    };
    Ok(state
        .users
        .find_user_by_id(partner_id)
        .await?
        .filter(|partner| partner.partner_id == Some(user.id)))
}

// A new invitation replaces a pending one; the old invitee stops seeing it.
async fn release_previous_partner(
    state: &AppState,
    user: &User,
    next_partner: Option<uuid::Uuid>,
) -> AppResult<()> {
    if user.partner_id.is_none() || user.partner_id == next_partner {
        return Ok(());
    }
    if let Some(previous) = linked_back(state, user).await? {
        state.users.clear_partner_link(previous.id).await?;
    }
    Ok(())
}
