use anyhow::anyhow;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::users::{PartnerLink, User};

pub async fn insert_user(conn: &mut PgConnection, user: &User) -> AppResult<()> {
    let insert_user_result = sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, email_notifications, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.email_notifications)
    .bind(user.created_at)
    .execute(conn)
    .await;

    if let Err(e) = insert_user_result {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() && db_err.constraint() == Some("users_email_key") {
                return Err(AppError::BadRequest(anyhow!("Email already registered")));
            }
        }
        return Err(AppError::InternalServerError(anyhow!(
            "Failed to create user account: {}",
            e
        )));
    }

    Ok(())
}

pub async fn find_user_by_id(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::InternalServerError(anyhow!("Failed to fetch user: {}", e)))
}

pub async fn find_user_by_email(conn: &mut PgConnection, email: &str) -> AppResult<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
        .bind(email)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::InternalServerError(anyhow!("Failed to fetch user: {}", e)))
}

pub async fn update_partner_link(
    conn: &mut PgConnection,
    user_id: Uuid,
    link: &PartnerLink,
) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE users SET partner_id = $1, partner_email = $2, partner_status = $3 WHERE id = $4",
    )
    .bind(link.partner_id)
    .bind(&link.partner_email)
    .bind(link.status)
    .bind(user_id)
    .execute(conn)
    .await
    .map_err(|e| AppError::InternalServerError(anyhow!("Failed to update partner: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(anyhow!("User not found")));
    }
    Ok(())
}

pub async fn clear_partner_link(conn: &mut PgConnection, user_id: Uuid) -> AppResult<()> {
    sqlx::query(
        "UPDATE users SET partner_id = NULL, partner_email = NULL, partner_status = NULL WHERE id = $1",
    )
    .bind(user_id)
    .execute(conn)
    .await
    .map_err(|e| AppError::InternalServerError(anyhow!("Failed to remove partner: {}", e)))?;

    Ok(())
}

pub async fn update_email_notifications(
    conn: &mut PgConnection,
    user_id: Uuid,
    enabled: bool,
) -> AppResult<bool> {
    let exists = find_user_by_id(&mut *conn, user_id).await?.is_some();
    if !exists {
        return Err(AppError::NotFound(anyhow!("User not found")));
    }

    let result = sqlx::query(
        "UPDATE users SET email_notifications = $1 WHERE id = $2 AND email_notifications <> $1",
    )
    .bind(enabled)
    .bind(user_id)
    .execute(conn)
    .await
    .map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to update notification settings: {}", e))
    })?;

    Ok(result.rows_affected() > 0)
}
