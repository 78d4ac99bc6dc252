use std::collections::HashSet;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use uuid::Uuid;

use super::{MessageStore, QuizStore, ScheduledMessageStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::messages::{Message, ScheduledMessage, ScheduledMessageStatus};
use crate::models::quiz::{PairKey, QuizBatch, QuizResponse, ScoredQuestion};
use crate::models::users::{PartnerLink, User};

type ResponseKey = (Uuid, Uuid, i32);

/// In-process store backed by `DashMap`s. Each map entry is guarded by its
/// shard lock, which gives the same single-document atomicity the
/// Postgres adapter gets from conditional `UPDATE`s.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<DashMap<Uuid, User>>,
    messages: Arc<DashMap<Uuid, Message>>,
    scheduled: Arc<DashMap<Uuid, ScheduledMessage>>,
    batches: Arc<DashMap<Uuid, QuizBatch>>,
    // pair -> id of its single open batch
    open_batches: Arc<DashMap<PairKey, Uuid>>,
    responses: Arc<DashMap<ResponseKey, QuizResponse>>,
    scored: Arc<DashMap<(Uuid, i32), DateTime<Utc>>>,
    scores: Arc<DashMap<PairKey, i32>>,
    // serializes score_question, which touches three maps
    scoring: Arc<Mutex<()>>,
    #[cfg(test)]
    scoring_fault: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn close_batch(&self, batch_id: Uuid) -> bool {
        let pair = match self.batches.get_mut(&batch_id) {
            Some(mut batch) if !batch.completed => {
                batch.completed = true;
                QuizBatch::pair(&batch)
            }
            _ => return false,
        };
        self.open_batches
            .remove_if(&pair, |_, open_id| *open_id == batch_id);
        true
    }

    fn open_batch_of(&self, pair: PairKey) -> Option<QuizBatch> {
        let batch_id = *self.open_batches.get(&pair)?;
        self.batches.get(&batch_id).map(|batch| batch.clone())
    }

    /// Makes the next `score_question` fail after its marker is written.
    #[cfg(test)]
    pub(crate) fn fail_next_scoring(&self) {
        self.scoring_fault.store(true, Ordering::SeqCst);
    }

    // Score and cursor half of score_question; the caller holds `scoring`.
    fn apply_scoring(&self, batch_id: Uuid, pair: PairKey, delta: i32) -> AppResult<ScoredQuestion> {
        #[cfg(test)]
        if self.scoring_fault.swap(false, Ordering::SeqCst) {
            return Err(AppError::InternalServerError(anyhow!(
                "Failed to update quiz score: store unavailable"
            )));
        }

        let scored: HashSet<i32> = self
            .scored
            .iter()
            .filter(|marker| marker.key().0 == batch_id)
            .map(|marker| marker.key().1)
            .collect();

        let batch = {
            let mut batch = self
                .batches
                .get_mut(&batch_id)
                .ok_or_else(|| AppError::NotFound(anyhow!("Batch not found")))?;
            if !batch.completed {
                let settled = batch.settled_index(&scored);
                batch.current_index = settled;
                batch.completed = batch.is_exhausted();
            }
            QuizBatch::clone(&batch)
        };
        if batch.completed {
            self.open_batches
                .remove_if(&batch.pair(), |_, open_id| *open_id == batch_id);
        }

        let score = {
            let mut score = self.scores.entry(pair).or_insert(0);
            *score = (*score + delta).max(0);
            *score
        };
        Ok(ScoredQuestion { score, batch })
    }
}

impl UserStore for MemoryStore {
    fn insert_user(&self, user: User) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let email_taken = self
                .users
                .iter()
                .any(|existing| existing.email.eq_ignore_ascii_case(&user.email));
            if email_taken {
                return Err(AppError::BadRequest(anyhow!("Email already registered")));
            }
            self.users.insert(user.id, user);
            Ok(())
        })
    }

    fn find_user_by_id(&self, user_id: Uuid) -> BoxFuture<'_, AppResult<Option<User>>> {
        Box::pin(async move { Ok(self.users.get(&user_id).map(|user| user.clone())) })
    }

    fn find_user_by_email(&self, email: &str) -> BoxFuture<'_, AppResult<Option<User>>> {
        let email = email.to_string();
        Box::pin(async move {
            Ok(self
                .users
                .iter()
                .find(|user| user.email.eq_ignore_ascii_case(&email))
                .map(|user| user.clone()))
        })
    }

    fn set_partner_link(&self, user_id: Uuid, link: PartnerLink) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut user = self
                .users
                .get_mut(&user_id)
                .ok_or_else(|| AppError::NotFound(anyhow!("User not found")))?;
            user.partner_id = link.partner_id;
            user.partner_email = link.partner_email;
            user.partner_status = Some(link.status);
            Ok(())
        })
    }

    fn clear_partner_link(&self, user_id: Uuid) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            if let Some(mut user) = self.users.get_mut(&user_id) {
                user.partner_id = None;
                user.partner_email = None;
                user.partner_status = None;
            }
            Ok(())
        })
    }

    fn set_email_notifications(
        &self,
        user_id: Uuid,
        enabled: bool,
    ) -> BoxFuture<'_, AppResult<bool>> {
        Box::pin(async move {
            let mut user = self
                .users
                .get_mut(&user_id)
                .ok_or_else(|| AppError::NotFound(anyhow!("User not found")))?;
            let changed = user.email_notifications != enabled;
            user.email_notifications = enabled;
            Ok(changed)
        })
    }
}

impl MessageStore for MemoryStore {
    fn insert_message(&self, message: Message) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            self.messages.insert(message.id, message);
            Ok(())
        })
    }

    fn list_messages_for_user(&self, user_id: Uuid) -> BoxFuture<'_, AppResult<Vec<Message>>> {
        Box::pin(async move {
            let mut messages: Vec<Message> = self
                .messages
                .iter()
                .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
                .map(|m| m.clone())
                .collect();
            messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(messages)
        })
    }
}

impl ScheduledMessageStore for MemoryStore {
    fn insert_scheduled_message(
        &self,
        scheduled: ScheduledMessage,
    ) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            self.scheduled.insert(scheduled.id, scheduled);
            Ok(())
        })
    }

    fn find_scheduled_message(
        &self,
        id: Uuid,
    ) -> BoxFuture<'_, AppResult<Option<ScheduledMessage>>> {
        Box::pin(async move { Ok(self.scheduled.get(&id).map(|s| s.clone())) })
    }

    fn list_pending_for_sender(
        &self,
        sender_id: Uuid,
    ) -> BoxFuture<'_, AppResult<Vec<ScheduledMessage>>> {
        Box::pin(async move {
            let mut pending: Vec<ScheduledMessage> = self
                .scheduled
                .iter()
                .filter(|s| s.sender_id == sender_id && s.status == ScheduledMessageStatus::Pending)
                .map(|s| s.clone())
                .collect();
            pending.sort_by_key(|s| s.scheduled_time);
            Ok(pending)
        })
    }

    fn list_due_scheduled_messages(
        &self,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<Vec<ScheduledMessage>>> {
        Box::pin(async move {
            let mut due: Vec<ScheduledMessage> = self
                .scheduled
                .iter()
                .filter(|s| s.is_due(now))
                .map(|s| s.clone())
                .collect();
            due.sort_by_key(|s| s.scheduled_time);
            Ok(due)
        })
    }

    fn claim_scheduled_message(&self, id: Uuid) -> BoxFuture<'_, AppResult<bool>> {
        Box::pin(async move {
            match self.scheduled.get_mut(&id) {
                Some(mut scheduled) if scheduled.status == ScheduledMessageStatus::Pending => {
                    scheduled.status = ScheduledMessageStatus::Sending;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn deliver_scheduled_message(
        &self,
        id: Uuid,
        message: Message,
        sent_at: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let mut scheduled = self.scheduled.get_mut(&id).ok_or_else(|| {
                AppError::NotFound(anyhow!("Scheduled message {} not found", id))
            })?;
            if scheduled.status != ScheduledMessageStatus::Sending {
                return Err(AppError::InternalServerError(anyhow!(
                    "Scheduled message {} is not claimed for delivery",
                    id
                )));
            }
            let already_delivered = self
                .messages
                .iter()
                .any(|m| m.scheduled_from == Some(id));
            if already_delivered {
                return Err(AppError::InternalServerError(anyhow!(
                    "Scheduled message {} was already delivered",
                    id
                )));
            }
            self.messages.insert(message.id, message);
            scheduled.status = ScheduledMessageStatus::Sent;
            scheduled.sent_at = Some(sent_at);
            Ok(())
        })
    }

    fn mark_scheduled_message_failed(
        &self,
        id: Uuid,
        error: String,
    ) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            if let Some(mut scheduled) = self.scheduled.get_mut(&id) {
                if !scheduled.status.is_terminal() {
                    scheduled.status = ScheduledMessageStatus::Failed;
                    scheduled.error = Some(error);
                }
            }
            Ok(())
        })
    }

    fn cancel_scheduled_message(
        &self,
        id: Uuid,
        sender_id: Uuid,
    ) -> BoxFuture<'_, AppResult<bool>> {
        Box::pin(async move {
            match self.scheduled.get_mut(&id) {
                Some(mut scheduled)
                    if scheduled.sender_id == sender_id
                        && scheduled.status == ScheduledMessageStatus::Pending =>
                {
                    scheduled.status = ScheduledMessageStatus::Cancelled;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }
}

impl QuizStore for MemoryStore {
    fn find_active_batch(
        &self,
        pair: PairKey,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<Option<QuizBatch>>> {
        Box::pin(async move { Ok(self.open_batch_of(pair).filter(|b| b.is_active(now))) })
    }

    fn find_open_batch(&self, pair: PairKey) -> BoxFuture<'_, AppResult<Option<QuizBatch>>> {
        Box::pin(async move { Ok(self.open_batch_of(pair)) })
    }

    fn find_batch(&self, batch_id: Uuid) -> BoxFuture<'_, AppResult<Option<QuizBatch>>> {
        Box::pin(async move { Ok(self.batches.get(&batch_id).map(|b| b.clone())) })
    }

    fn find_latest_batch_with_question(
        &self,
        pair: PairKey,
        question_id: i32,
    ) -> BoxFuture<'_, AppResult<Option<QuizBatch>>> {
        Box::pin(async move {
            Ok(self
                .batches
                .iter()
                .filter(|b| b.value().pair() == pair && b.position_of(question_id).is_some())
                .max_by_key(|b| b.created_at)
                .map(|b| b.clone()))
        })
    }

    fn insert_batch(&self, batch: QuizBatch) -> BoxFuture<'_, AppResult<bool>> {
        Box::pin(async move {
            if batch.completed {
                self.batches.insert(batch.id, batch);
                return Ok(true);
            }
            match self.open_batches.entry(batch.pair()) {
                Entry::Occupied(_) => Ok(false),
                Entry::Vacant(slot) => {
                    slot.insert(batch.id);
                    self.batches.insert(batch.id, batch);
                    Ok(true)
                }
            }
        })
    }

    fn advance_batch(
        &self,
        batch_id: Uuid,
        expected_index: i32,
    ) -> BoxFuture<'_, AppResult<Option<QuizBatch>>> {
        Box::pin(async move {
            let advanced = match self.batches.get_mut(&batch_id) {
                Some(mut batch) if !batch.completed && batch.current_index == expected_index => {
                    batch.current_index += 1;
                    if batch.is_exhausted() {
                        batch.completed = true;
                    }
                    batch.clone()
                }
                _ => return Ok(None),
            };
            if advanced.completed {
                self.open_batches
                    .remove_if(&advanced.pair(), |_, open_id| *open_id == batch_id);
            }
            Ok(Some(advanced))
        })
    }

    fn mark_batch_completed(&self, batch_id: Uuid) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            self.close_batch(batch_id);
            Ok(())
        })
    }

    fn complete_open_batches(&self, pair: PairKey) -> BoxFuture<'_, AppResult<u64>> {
        Box::pin(async move {
            let open_id = self.open_batches.get(&pair).map(|id| *id);
            Ok(match open_id {
                Some(batch_id) if self.close_batch(batch_id) => 1,
                _ => 0,
            })
        })
    }

    fn complete_expired_batches(
        &self,
        pair: PairKey,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, AppResult<u64>> {
        Box::pin(async move {
            let expired = self
                .open_batch_of(pair)
                .filter(|b| b.expires_at <= now)
                .map(|b| b.id);
            Ok(match expired {
                Some(batch_id) if self.close_batch(batch_id) => 1,
                _ => 0,
            })
        })
    }

    fn insert_response(&self, response: QuizResponse) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            let key = (response.batch_id, response.user_id, response.question_id);
            match self.responses.entry(key) {
                Entry::Occupied(_) => Err(AppError::BadRequest(anyhow!(
                    "Question already answered"
                ))),
                Entry::Vacant(slot) => {
                    slot.insert(response);
                    Ok(())
                }
            }
        })
    }

    fn find_response(
        &self,
        batch_id: Uuid,
        user_id: Uuid,
        question_id: i32,
    ) -> BoxFuture<'_, AppResult<Option<QuizResponse>>> {
        Box::pin(async move {
            Ok(self
                .responses
                .get(&(batch_id, user_id, question_id))
                .map(|r| r.clone()))
        })
    }

    fn list_responses(
        &self,
        user_id: Uuid,
        batch_id: Option<Uuid>,
    ) -> BoxFuture<'_, AppResult<Vec<QuizResponse>>> {
        Box::pin(async move {
            let mut responses: Vec<QuizResponse> = self
                .responses
                .iter()
                .filter(|r| r.user_id == user_id)
                .filter(|r| batch_id.map_or(true, |id| r.batch_id == id))
                .map(|r| r.clone())
                .collect();
            responses.sort_by_key(|r| r.created_at);
            Ok(responses)
        })
    }

    fn delete_response(
        &self,
        batch_id: Uuid,
        user_id: Uuid,
        question_id: i32,
    ) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            self.responses.remove(&(batch_id, user_id, question_id));
            Ok(())
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
            let _scoring = self
                .scoring
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            match self.scored.entry((batch_id, question_id)) {
                Entry::Occupied(_) => return Ok(None),
                Entry::Vacant(slot) => {
                    slot.insert(Utc::now());
                }
            }

            match self.apply_scoring(batch_id, pair, delta) {
                Ok(scored) => Ok(Some(scored)),
                Err(e) => {
                    self.scored.remove(&(batch_id, question_id));
                    Err(e)
                }
            }
        })
    }

    fn get_score(&self, pair: PairKey) -> BoxFuture<'_, AppResult<Option<i32>>> {
        Box::pin(async move { Ok(self.scores.get(&pair).map(|score| *score)) })
    }
}
