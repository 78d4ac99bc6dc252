use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::messages::{Message, ScheduledMessage, ScheduledMessageStatus};

pub async fn insert_message(conn: &mut PgConnection, message: &Message) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO messages (id, content, sender_id, receiver_id, created_at, is_read, scheduled_from) VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(message.id)
    .bind(&message.content)
    .bind(message.sender_id)
    .bind(message.receiver_id)
    .bind(message.created_at)
    .bind(message.is_read)
    .bind(message.scheduled_from)
    .execute(conn)
    .await
    .map_err(|e| AppError::InternalServerError(anyhow!("Failed to insert message: {}", e)))?;

    Ok(())
}

pub async fn get_messages_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Vec<Message>> {
    sqlx::query_as::<_, Message>(
        "SELECT * FROM messages WHERE sender_id = $1 OR receiver_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
    .map_err(|e| AppError::InternalServerError(anyhow!("Failed to fetch messages: {}", e)))
}

pub async fn insert_scheduled_message(
    conn: &mut PgConnection,
    scheduled: &ScheduledMessage,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO scheduled_messages (id, content, sender_id, receiver_id, scheduled_time, created_at, status) VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(scheduled.id)
    .bind(&scheduled.content)
    .bind(scheduled.sender_id)
    .bind(scheduled.receiver_id)
    .bind(scheduled.scheduled_time)
    .bind(scheduled.created_at)
    .bind(scheduled.status)
    .execute(conn)
    .await
    .map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to schedule message: {}", e))
    })?;

    Ok(())
}

pub async fn get_scheduled_message(
    conn: &mut PgConnection,
    id: Uuid,
) -> AppResult<Option<ScheduledMessage>> {
    sqlx::query_as::<_, ScheduledMessage>("SELECT * FROM scheduled_messages WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            AppError::InternalServerError(anyhow!("Failed to fetch scheduled message: {}", e))
        })
}

pub async fn get_pending_for_sender(
    conn: &mut PgConnection,
    sender_id: Uuid,
) -> AppResult<Vec<ScheduledMessage>> {
    sqlx::query_as::<_, ScheduledMessage>(
        "SELECT * FROM scheduled_messages WHERE sender_id = $1 AND status = $2 ORDER BY scheduled_time ASC",
    )
    .bind(sender_id)
    .bind(ScheduledMessageStatus::Pending)
    .fetch_all(conn)
    .await
    .map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to fetch scheduled messages: {}", e))
    })
}

pub async fn get_due_scheduled_messages(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> AppResult<Vec<ScheduledMessage>> {
    sqlx::query_as::<_, ScheduledMessage>(
        "SELECT * FROM scheduled_messages WHERE scheduled_time <= $1 AND status = $2 ORDER BY scheduled_time ASC",
    )
    .bind(now)
    .bind(ScheduledMessageStatus::Pending)
    .fetch_all(conn)
    .await
    .map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to fetch due scheduled messages: {}", e))
    })
}

/// Conditional status move; `false` when the row was not in `from`.
pub async fn transition_scheduled_status(
    conn: &mut PgConnection,
    id: Uuid,
    from: ScheduledMessageStatus,
    to: ScheduledMessageStatus,
) -> AppResult<bool> {
    let result = sqlx::query("UPDATE scheduled_messages SET status = $1 WHERE id = $2 AND status = $3")
        .bind(to)
        .bind(id)
        .bind(from)
        .execute(conn)
        .await
        .map_err(|e| {
            AppError::InternalServerError(anyhow!("Failed to update scheduled message: {}", e))
        })?;

    Ok(result.rows_affected() == 1)
}

pub async fn mark_scheduled_sent(
    conn: &mut PgConnection,
    id: Uuid,
    sent_at: DateTime<Utc>,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE scheduled_messages SET status = $1, sent_at = $2 WHERE id = $3 AND status = $4",
    )
    .bind(ScheduledMessageStatus::Sent)
    .bind(sent_at)
    .bind(id)
    .bind(ScheduledMessageStatus::Sending)
    .execute(conn)
    .await
    .map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to mark scheduled message sent: {}", e))
    })?;

    Ok(result.rows_affected() == 1)
}

pub async fn mark_scheduled_failed(
    conn: &mut PgConnection,
    id: Uuid,
    error: &str,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE scheduled_messages SET status = $1, error = $2 WHERE id = $3 AND status IN ($4, $5)",
    )
    .bind(ScheduledMessageStatus::Failed)
    .bind(error)
    .bind(id)
    .bind(ScheduledMessageStatus::Pending)
    .bind(ScheduledMessageStatus::Sending)
    .execute(conn)
    .await
    .map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to mark scheduled message failed: {}", e))
    })?;

    Ok(())
}

pub async fn cancel_scheduled_message(
    conn: &mut PgConnection,
    id: Uuid,
    sender_id: Uuid,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE scheduled_messages SET status = $1 WHERE id = $2 AND sender_id = $3 AND status = $4",
    )
    .bind(ScheduledMessageStatus::Cancelled)
    .bind(id)
    .bind(sender_id)
    .bind(ScheduledMessageStatus::Pending)
    .execute(conn)
    .await
    .map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to cancel scheduled message: {}", e))
    })?;

    Ok(result.rows_affected() == 1)
}
