//! The document store as a set of ports.
//!
//! Most methods are single-document operations; the conditional ones
//! (`claim_scheduled_message`, `cancel_scheduled_message`, `advance_batch`,
//! `insert_batch`) are atomic in each adapter and are what the worker and
//! the quiz engine rely on instead of locks. The two multi-document writes,
//! `deliver_scheduled_message` and `score_question`, are all or nothing.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::messages::{Message, ScheduledMessage};
use crate::models::quiz::{PairKey, QuizBatch, QuizResponse, ScoredQuestion};
use crate::models::users::{PartnerLink, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub trait UserStore: Send + Sync {
    fn insert_user(&self, user: User) -> BoxFuture<'_, AppResult<()>>;
    fn find_user_by_id(&self, user_id: Uuid) -> BoxFuture<'_, AppResult<Option<User>>>;
    fn find_user_by_email(&self, email: &str) -> BoxFuture<'_, AppResult<Option<User>>>;
    fn set_partner_link(&self, user_id: Uuid, link: PartnerLink) -> BoxFuture<'_, AppResult<()>>;
    fn clear_partner_link(&self, user_id: Uuid) -> BoxFuture<'_, AppResult<()>>;
    /// Returns whether the stored value changed.
    fn set_email_notifications(
        &self,
        user_id: Uuid,
        enabled: bool,
    ) -> BoxFuture<'_, AppResult<bool>>;
}

pub trait MessageStore: Send + Sync {
    fn insert_message(&self, message: Message) -> BoxFuture<'_, AppResult<()>>;
    /// Messages the user sent or received, newest first.
    fn list_messages_for_user(&self, user_id: Uuid) -> BoxFuture<'_, AppResult<Vec<Message>>>;
}

pub trait ScheduledMessageStore: Send + Sync {
    fn insert_scheduled_message(&self, scheduled: ScheduledMessage)
        -> BoxFuture<'_, AppResult<()>>;
    fn find_scheduled_message(
        &self,
        id: Uuid,
    ) -> BoxFuture<'_, AppResult<Option<ScheduledMessage>>>;
    /// Pending messages of one sender, soonest first.
    fn list_pending_for_sender(
        &self,
        sender_id: Uuid,
    ) -> BoxFuture<'_, AppResult<Vec<ScheduledMessage>>>;
    /// Pending messages with `scheduled_time <= now`, soonest first.
    fn list_due_scheduled_messages(
        &self,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<Vec<ScheduledMessage>>>;
    /// pending -> sending. `false` when the record is no longer pending.
    fn claim_scheduled_message(&self, id: Uuid) -> BoxFuture<'_, AppResult<bool>>;
    /// Inserts the live message and moves sending -> sent in one step.
    fn deliver_scheduled_message(
        &self,
        id: Uuid,
        message: Message,
        sent_at: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<()>>;
    fn mark_scheduled_message_failed(
        &self,
        id: Uuid,
        error: String,
    ) -> BoxFuture<'_, AppResult<()>>;
    /// pending -> cancelled for the given sender. `false` when nothing matched.
    fn cancel_scheduled_message(
        &self,
        id: Uuid,
        sender_id: Uuid,
    ) -> BoxFuture<'_, AppResult<bool>>;
}

pub trait QuizStore: Send + Sync {
    /// The open batch of the pair that has not expired yet.
    fn find_active_batch(
        &self,
        pair: PairKey,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<Option<QuizBatch>>>;
    /// The open batch of the pair, expired or not.
    fn find_open_batch(&self, pair: PairKey) -> BoxFuture<'_, AppResult<Option<QuizBatch>>>;
    fn find_batch(&self, batch_id: Uuid) -> BoxFuture<'_, AppResult<Option<QuizBatch>>>;
    /// Most recent batch of the pair whose question list contains `question_id`.
    fn find_latest_batch_with_question(
        &self,
        pair: PairKey,
        question_id: i32,
    ) -> BoxFuture<'_, AppResult<Option<QuizBatch>>>;
    /// `false` when the pair already has an open batch.
    fn insert_batch(&self, batch: QuizBatch) -> BoxFuture<'_, AppResult<bool>>;
    /// Compare-and-swap on `current_index`: moves `expected -> expected + 1`
    /// and sets `completed` when the end is reached. `None` if the batch
    /// was not at `expected` (or is already completed).
    fn advance_batch(
        &self,
        batch_id: Uuid,
        expected_index: i32,
    ) -> BoxFuture<'_, AppResult<Option<QuizBatch>>>;
    fn mark_batch_completed(&self, batch_id: Uuid) -> BoxFuture<'_, AppResult<()>>;
    /// Completes every open batch of the pair; returns how many changed.
    fn complete_open_batches(&self, pair: PairKey) -> BoxFuture<'_, AppResult<u64>>;
    /// Completes open batches of the pair that expired at or before `now`.
    fn complete_expired_batches(
        &self,
        pair: PairKey,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<u64>>;
    /// Fails with `BadRequest` when the user already answered the question in this batch.
    fn insert_response(&self, response: QuizResponse) -> BoxFuture<'_, AppResult<()>>;
    fn find_response(
        &self,
        batch_id: Uuid,
        user_id: Uuid,
        question_id: i32,
    ) -> BoxFuture<'_, AppResult<Option<QuizResponse>>>;
    fn list_responses(
        &self,
        user_id: Uuid,
        batch_id: Option<Uuid>,
    ) -> BoxFuture<'_, AppResult<Vec<QuizResponse>>>;
    /// Withdraws a user's answer to a question of the batch.
    fn delete_response(
        &self,
        batch_id: Uuid,
        user_id: Uuid,
        question_id: i32,
    ) -> BoxFuture<'_, AppResult<()>>;
    /// Scores a question of the batch exactly once, all or nothing: records
    /// the scored marker, adds `delta` to the pair score (created if needed,
    /// floored at 0) and settles the cursor past every scored question ahead
    /// of it, completing the batch at the end. `None` when the question was
    /// already scored; on error nothing is kept.
    fn score_question(
        &self,
        batch_id: Uuid,
        question_id: i32,
        pair: PairKey,
        delta: i32,
    ) -> BoxFuture<'_, AppResult<Option<ScoredQuestion>>>;
    fn get_score(&self, pair: PairKey) -> BoxFuture<'_, AppResult<Option<i32>>>;
}
