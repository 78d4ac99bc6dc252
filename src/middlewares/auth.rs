use anyhow::anyhow;
use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::sessions::{UserSession, USER_SESSION_KEY};

pub async fn auth_middleware(
    session: Session,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    match session.get::<UserSession>(USER_SESSION_KEY).await {
        Ok(Some(_user_session)) => Ok(next.run(req).await),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string())),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// The id of the logged-in user, or 401.
pub async fn current_user_id(session: &Session) -> AppResult<Uuid> {
    let user_session = session
        .get::<UserSession>(USER_SESSION_KEY)
        .await
        .map_err(|_| AppError::Unauthorized(anyhow!("Cannot find user session")))?;

    match user_session {
        Some(user_session) => Ok(user_session.user_id),
        None => Err(AppError::Unauthorized(anyhow!("User not authenticated"))),
    }
}
