use std::collections::HashSet;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::{MessageStore, QuizStore, ScheduledMessageStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::messages::{Message, ScheduledMessage, ScheduledMessageStatus};
use crate::models::quiz::{PairKey, QuizBatch, QuizResponse, ScoredQuestion};
use crate::models::users::{PartnerLink, User};
use crate::queries::{messages, quiz, users};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn acquire(&self) -> AppResult<PoolConnection<Postgres>> {
        self.pool.acquire().await.map_err(|e| {
            AppError::ServiceUnavailable(anyhow!(
                "Failed to acquire database connection: {}",
                e
            ))
        })
    }
}

impl UserStore for PgStore {
    fn insert_user(&self, user: User) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            users::insert_user(&mut conn, &user).await
        })
    }

    fn find_user_by_id(&self, user_id: Uuid) -> BoxFuture<'_, AppResult<Option<User>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            users::find_user_by_id(&mut conn, user_id).await
        })
    }

    fn find_user_by_email(&self, email: &str) -> BoxFuture<'_, AppResult<Option<User>>> {
        let email = email.to_string();
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            users::find_user_by_email(&mut conn, &email).await
        })
    }

    fn set_partner_link(&self, user_id: Uuid, link: PartnerLink) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            users::update_partner_link(&mut conn, user_id, &link).await
        })
    }

    fn clear_partner_link(&self, user_id: Uuid) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            users::clear_partner_link(&mut conn, user_id).await
        })
    }

    fn set_email_notifications(
        &self,
        user_id: Uuid,
        enabled: bool,
    ) -> BoxFuture<'_, AppResult<bool>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            users::update_email_notifications(&mut conn, user_id, enabled).await
        })
    }
}

impl MessageStore for PgStore {
    fn insert_message(&self, message: Message) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            messages::insert_message(&mut conn, &message).await
        })
    }

    fn list_messages_for_user(&self, user_id: Uuid) -> BoxFuture<'_, AppResult<Vec<Message>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            messages::get_messages_for_user(&mut conn, user_id).await
        })
    }
}

impl ScheduledMessageStore for PgStore {
    fn insert_scheduled_message(
        &self,
        scheduled: ScheduledMessage,
    ) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            messages::insert_scheduled_message(&mut conn, &scheduled).await
        })
    }

    fn find_scheduled_message(
        &self,
        id: Uuid,
    ) -> BoxFuture<'_, AppResult<Option<ScheduledMessage>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            messages::get_scheduled_message(&mut conn, id).await
        })
    }

    fn list_pending_for_sender(
        &self,
        sender_id: Uuid,
    ) -> BoxFuture<'_, AppResult<Vec<ScheduledMessage>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            messages::get_pending_for_sender(&mut conn, sender_id).await
        })
    }

    fn list_due_scheduled_messages(
        &self,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<Vec<ScheduledMessage>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            messages::get_due_scheduled_messages(&mut conn, now).await
        })
    }

    fn claim_scheduled_message(&self, id: Uuid) -> BoxFuture<'_, AppResult<bool>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            messages::transition_scheduled_status(
                &mut conn,
                id,
                ScheduledMessageStatus::Pending,
                ScheduledMessageStatus::Sending,
            )
            .await
        })
    }

    fn deliver_scheduled_message(
        &self,
        id: Uuid,
        message: Message,
        sent_at: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(|e| {
                AppError::InternalServerError(anyhow!("Failed to start transaction: {}", e))
            })?;

            messages::insert_message(&mut tx, &message).await?;
            let marked = messages::mark_scheduled_sent(&mut tx, id, sent_at).await?;
            if !marked {
                // dropping the transaction rolls the insert back
                return Err(AppError::InternalServerError(anyhow!(
                    "Scheduled message {} is not claimed for delivery",
                    id
                )));
            }

            tx.commit().await.map_err(|e| {
                AppError::InternalServerError(anyhow!("Failed to commit transaction: {}", e))
            })?;
            Ok(())
        })
    }

    fn mark_scheduled_message_failed(
        &self,
        id: Uuid,
        error: String,
    ) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            messages::mark_scheduled_failed(&mut conn, id, &error).await
        })
    }

    fn cancel_scheduled_message(
        &self,
        id: Uuid,
        sender_id: Uuid,
    ) -> BoxFuture<'_, AppResult<bool>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            messages::cancel_scheduled_message(&mut conn, id, sender_id).await
        })
    }
}

impl QuizStore for PgStore {
    fn find_active_batch(
        &self,
        pair: PairKey,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<Option<QuizBatch>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::get_active_batch(&mut conn, pair, now).await
        })
    }

    fn find_open_batch(&self, pair: PairKey) -> BoxFuture<'_, AppResult<Option<QuizBatch>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::get_open_batch(&mut conn, pair).await
        })
    }

    fn find_batch(&self, batch_id: Uuid) -> BoxFuture<'_, AppResult<Option<QuizBatch>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::get_batch(&mut conn, batch_id).await
        })
    }

    fn find_latest_batch_with_question(
        &self,
        pair: PairKey,
        question_id: i32,
    ) -> BoxFuture<'_, AppResult<Option<QuizBatch>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::get_latest_batch_with_question(&mut conn, pair, question_id).await
        })
    }

    fn insert_batch(&self, batch: QuizBatch) -> BoxFuture<'_, AppResult<bool>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::insert_batch(&mut conn, &batch).await
        })
    }

    fn advance_batch(
        &self,
        batch_id: Uuid,
        expected_index: i32,
    ) -> BoxFuture<'_, AppResult<Option<QuizBatch>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::advance_batch(&mut conn, batch_id, expected_index).await
        })
    }

    fn mark_batch_completed(&self, batch_id: Uuid) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::complete_batch(&mut conn, batch_id).await
        })
    }

    fn complete_open_batches(&self, pair: PairKey) -> BoxFuture<'_, AppResult<u64>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::complete_open_batches(&mut conn, pair).await
        })
    }

    fn complete_expired_batches(
        &self,
        pair: PairKey,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<u64>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::complete_expired_batches(&mut conn, pair, now).await
        })
    }

    fn insert_response(&self, response: QuizResponse) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::insert_response(&mut conn, &response).await
        })
    }

    fn find_response(
        &self,
        batch_id: Uuid,
        user_id: Uuid,
        question_id: i32,
    ) -> BoxFuture<'_, AppResult<Option<QuizResponse>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::get_response(&mut conn, batch_id, user_id, question_id).await
        })
    }

    fn list_responses(
        &self,
        user_id: Uuid,
        batch_id: Option<Uuid>,
    ) -> BoxFuture<'_, AppResult<Vec<QuizResponse>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::get_responses(&mut conn, user_id, batch_id).await
        })
    }

    fn delete_response(
        &self,
        batch_id: Uuid,
        user_id: Uuid,
        question_id: i32,
    ) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::delete_response(&mut conn, batch_id, user_id, question_id).await
        })
    }

    fn score_question(
        &self,
        batch_id: Uuid,
        question_id: i32,
        pair: PairKey,
        delta: i32,
    ) -> BoxFuture<'_, AppResult<Option<ScoredQuestion>>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(|e| {
                AppError::InternalServerError(anyhow!("Failed to start transaction: {}", e))
            })?;

            // scorers of one batch queue up on its row
            let batch = quiz::lock_batch(&mut tx, batch_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow!("Batch not found")))?;
            if !quiz::insert_scoring_marker(&mut tx, batch_id, question_id).await? {
                return Ok(None);
            }

            let score = quiz::add_to_score(&mut tx, pair, delta).await?;
            let batch = if batch.completed {
                batch
            } else {
                let scored: HashSet<i32> = quiz::get_scored_question_ids(&mut tx, batch_id)
                    .await?
                    .into_iter()
                    .collect();
                let index = batch.settled_index(&scored);
                let completed = index as usize >= batch.total_questions();
                quiz::set_batch_cursor(&mut tx, batch_id, index, completed).await?
            };

            tx.commit().await.map_err(|e| {
                AppError::InternalServerError(anyhow!("Failed to commit transaction: {}", e))
            })?;
            Ok(Some(ScoredQuestion { score, batch }))
        })
    }

    fn get_score(&self, pair: PairKey) -> BoxFuture<'_, AppResult<Option<i32>>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            quiz::get_score(&mut conn, pair).await
        })
    }
}
