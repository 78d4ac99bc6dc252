//! Quiz compatibility engine.
//!
//! A couple works through a shared batch of five "would you rather"
//! questions. Each partner answers independently; once both answers for a
//! question are in, the pair score moves by +5 on a match or -2 on a
//! mismatch (never below zero) and the batch cursor moves on.
//!
//! All coordination goes through the conditional store operations:
//! `insert_batch` keeps one open batch per pair, `score_question` scores a
//! question exactly once and settles the cursor past every scored question
//! ahead of it, and `advance_batch` moves the cursor by compare-and-swap
//! when a partner skips over what they already answered.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::quiz::{PairKey, QuizBatch, QuizQuestion, QuizResponse, ScoredQuestion};
use crate::store::QuizStore;

pub mod questions;

pub const BATCH_SIZE: usize = 5;
pub const BATCH_TTL_DAYS: i64 = 7;
pub const MATCH_DELTA: i32 = 5;
pub const MISMATCH_DELTA: i32 = -2;

// Attempts at creating a batch when another request races us to it.
const CREATE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub enum CurrentQuestion {
    Question {
        question: QuizQuestion,
        /// 1-based position inside the batch.
        position: usize,
        total: usize,
    },
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub message: String,
    pub waiting_for_partner: bool,
    pub delta: i32,
    pub is_match: bool,
    pub new_score: Option<i32>,
    pub batch_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartnerCheck {
    pub has_answered: bool,
    #[serde(flatten)]
    pub result: Option<PartnerResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartnerResult {
    pub is_match: bool,
    pub delta: i32,
    pub new_score: Option<i32>,
    pub batch_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreSummary {
    pub score: i32,
    pub total_answered: usize,
    pub matches: usize,
    pub match_percent: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchInfo {
    pub id: Uuid,
    pub progress: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizStatus {
    pub current_score: i32,
    pub has_active_batch: bool,
    pub pending_questions: usize,
    pub batch_info: Option<BatchInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question: String,
    pub your_answer: String,
    pub partner_answer: String,
    #[serde(rename = "match")]
    pub is_match: bool,
}

pub fn score_delta(is_match: bool) -> i32 {
    if is_match {
        MATCH_DELTA
    } else {
        MISMATCH_DELTA
    }
}

#[derive(Clone)]
pub struct QuizEngine {
    store: Arc<dyn QuizStore>,
}

impl QuizEngine {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    /// Returns the pair's active batch, creating one when there is none.
    /// An open batch that has expired is closed first.
    pub async fn get_or_create_batch(
        &self,
        user_id: Uuid,
        partner_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<QuizBatch> {
        let pair = PairKey::new(user_id, partner_id);

        for _ in 0..CREATE_ATTEMPTS {
            if let Some(batch) = self.store.find_active_batch(pair, now).await? {
                return Ok(batch);
            }

            let expired = self.store.complete_expired_batches(pair, now).await?;
            if expired > 0 {
                tracing::info!(user1 = %pair.user1_id, user2 = %pair.user2_id, "closed expired quiz batch");
            }

            let batch = QuizBatch::new(
                pair,
                questions::sample_questions(BATCH_SIZE),
                now,
                Duration::days(BATCH_TTL_DAYS),
            );
            if self.store.insert_batch(batch.clone()).await? {
                tracing::info!(batch_id = %batch.id, "created quiz batch");
                return Ok(batch);
            }
        }

        Err(AppError::InternalServerError(anyhow!(
            "Could not create a question batch"
        )))
    }

    /// Closes every open batch of the pair and starts a fresh one.
    pub async fn start_new_batch(
        &self,
        user_id: Uuid,
        partner_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<QuizBatch> {
        let pair = PairKey::new(user_id, partner_id);
        let closed = self.store.complete_open_batches(pair).await?;
        tracing::debug!(closed, "superseded open quiz batches");
        self.get_or_create_batch(user_id, partner_id, now).await
    }

    /// The question at the batch cursor, moving the cursor past questions
    /// the requesting user has already answered.
    pub async fn current_question(
        &self,
        user_id: Uuid,
        partner_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<CurrentQuestion> {
        let mut batch = self.get_or_create_batch(user_id, partner_id, now).await?;

        // every pass either returns or moves the cursor forward
        for _ in 0..=batch.total_questions() {
            if batch.is_exhausted() {
                if !batch.completed {
                    self.store.mark_batch_completed(batch.id).await?;
                }
                return Ok(CurrentQuestion::Completed);
            }
            if batch.completed {
                return Ok(CurrentQuestion::Completed);
            }

            let question = match batch.current_question() {
                Some(question) => question.clone(),
                None => return Ok(CurrentQuestion::Completed),
            };

            let answered = self
                .store
                .find_response(batch.id, user_id, question.id)
                .await?
                .is_some();
            if !answered {
                return Ok(CurrentQuestion::Question {
                    question,
                    position: batch.current_index as usize + 1,
                    total: batch.total_questions(),
                });
            }

            batch = match self.store.advance_batch(batch.id, batch.current_index).await? {
                Some(advanced) => advanced,
                None => self.reload(batch.id).await?,
            };
        }

        Err(AppError::InternalServerError(anyhow!(
            "Question cursor did not settle for batch {}",
            batch.id
        )))
    }

    pub async fn submit_answer(
        &self,
        user_id: Uuid,
        partner_id: Uuid,
        question_id: i32,
        answer: String,
        now: DateTime<Utc>,
    ) -> AppResult<AnswerOutcome> {
        let pair = PairKey::new(user_id, partner_id);
        let batch = self
            .store
            .find_active_batch(pair, now)
            .await?
            .ok_or_else(|| AppError::BadRequest(anyhow!("No active question batch")))?;

        if batch.position_of(question_id).is_none() {
            return Err(AppError::BadRequest(anyhow!(
                "Question is not part of the current batch"
            )));
        }

        let response = QuizResponse::new(user_id, batch.id, question_id, answer, now);
        let answer = response.answer.clone();
        self.store.insert_response(response).await?;

        let partner_response = self
            .store
            .find_response(batch.id, partner_id, question_id)
            .await?;
        let Some(partner_response) = partner_response else {
            return Ok(AnswerOutcome {
                message: "Answer submitted".to_string(),
                waiting_for_partner: true,
                delta: 0,
                is_match: false,
                new_score: None,
                batch_complete: false,
            });
        };

        let is_match = partner_response.answer == answer;
        let delta = score_delta(is_match);

        let scored = match self
            .store
            .score_question(batch.id, question_id, pair, delta)
            .await
        {
            Ok(scored) => scored,
            Err(e) => {
                // nothing was scored, so the answer is withdrawn and can be sent again
                if let Err(undo) = self
                    .store
                    .delete_response(batch.id, user_id, question_id)
                    .await
                {
                    tracing::error!(batch_id = %batch.id, question_id, error = %undo, "could not withdraw unscored answer");
                }
                return Err(e);
            }
        };

        let Some(ScoredQuestion {
            score: new_score,
            batch,
        }) = scored
        else {
            // both answers landed together and the other request scored it
            let current = self.reload(batch.id).await?;
            return Ok(AnswerOutcome {
                message: "Answer submitted".to_string(),
                waiting_for_partner: false,
                delta,
                is_match,
                new_score: self.store.get_score(pair).await?,
                batch_complete: current.is_finished(),
            });
        };

        tracing::info!(
            batch_id = %batch.id,
            question_id,
            is_match,
            new_score,
            "scored quiz question"
        );

        Ok(AnswerOutcome {
            message: "Answer submitted".to_string(),
            waiting_for_partner: false,
            delta,
            is_match,
            new_score: Some(new_score),
            batch_complete: batch.is_finished(),
        })
    }

    /// Read-only: reports the outcome of a question once both partners
    /// have answered it in the pair's latest batch containing it.
    pub async fn check_partner_response(
        &self,
        user_id: Uuid,
        partner_id: Uuid,
        question_id: i32,
    ) -> AppResult<PartnerCheck> {
        let pair = PairKey::new(user_id, partner_id);
        let not_yet = PartnerCheck {
            has_answered: false,
            result: None,
        };

        let Some(batch) = self
            .store
            .find_latest_batch_with_question(pair, question_id)
            .await?
        else {
            return Ok(not_yet);
        };

        let Some(partner_response) = self
            .store
            .find_response(batch.id, partner_id, question_id)
            .await?
        else {
            return Ok(not_yet);
        };
        let Some(own_response) = self
            .store
            .find_response(batch.id, user_id, question_id)
            .await?
        else {
            return Ok(not_yet);
        };

        let is_match = partner_response.answer == own_response.answer;
        Ok(PartnerCheck {
            has_answered: true,
            result: Some(PartnerResult {
                is_match,
                delta: score_delta(is_match),
                new_score: self.store.get_score(pair).await?,
                batch_complete: batch.is_finished(),
            }),
        })
    }

    pub async fn score_summary(&self, user_id: Uuid, partner_id: Uuid) -> AppResult<ScoreSummary> {
        let pair = PairKey::new(user_id, partner_id);
        let score = self.store.get_score(pair).await?.unwrap_or(0);
        let responses = self.store.list_responses(user_id, None).await?;

        let mut compared = 0usize;
        let mut matches = 0usize;
        for response in &responses {
            let partner_response = self
                .store
                .find_response(response.batch_id, partner_id, response.question_id)
                .await?;
            if let Some(partner_response) = partner_response {
                compared += 1;
                if partner_response.answer == response.answer {
                    matches += 1;
                }
            }
        }

        Ok(ScoreSummary {
            score,
            total_answered: responses.len(),
            matches,
            match_percent: match_percent(matches, compared),
        })
    }

    pub async fn status(&self, user_id: Uuid, partner_id: Uuid) -> AppResult<QuizStatus> {
        let pair = PairKey::new(user_id, partner_id);
        let batch = self.store.find_open_batch(pair).await?;
        let current_score = self.store.get_score(pair).await?.unwrap_or(0);

        let own: std::collections::HashSet<(Uuid, i32)> = self
            .store
            .list_responses(user_id, None)
            .await?
            .into_iter()
            .map(|r| (r.batch_id, r.question_id))
            .collect();
        let pending_questions = self
            .store
            .list_responses(partner_id, None)
            .await?
            .into_iter()
            .filter(|r| !own.contains(&(r.batch_id, r.question_id)))
            .count();

        Ok(QuizStatus {
            current_score,
            has_active_batch: batch.is_some(),
            pending_questions,
            batch_info: batch.map(|batch| BatchInfo {
                id: batch.id,
                progress: batch.progress(),
                completed: batch.completed,
            }),
        })
    }

    /// Questions of a batch that both partners answered, in batch order.
    pub async fn batch_results(
        &self,
        user_id: Uuid,
        partner_id: Uuid,
        batch_id: Uuid,
    ) -> AppResult<Vec<QuestionResult>> {
        let batch = self
            .store
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Batch not found")))?;
        if batch.pair() != PairKey::new(user_id, partner_id) {
            return Err(AppError::Forbidden(anyhow!(
                "Batch does not belong to this couple"
            )));
        }

        let own = self.store.list_responses(user_id, Some(batch_id)).await?;
        let theirs = self.store.list_responses(partner_id, Some(batch_id)).await?;

        Ok(batch
            .questions
            .iter()
            .filter_map(|question| {
                let your_answer = own.iter().find(|r| r.question_id == question.id)?;
                let partner_answer = theirs.iter().find(|r| r.question_id == question.id)?;
                Some(QuestionResult {
                    question: question.text.clone(),
                    your_answer: your_answer.answer.clone(),
                    partner_answer: partner_answer.answer.clone(),
                    is_match: your_answer.answer == partner_answer.answer,
                })
            })
            .collect())
    }

    async fn reload(&self, batch_id: Uuid) -> AppResult<QuizBatch> {
        self.store
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Batch not found")))
    }
}

fn match_percent(matches: usize, compared: usize) -> u32 {
    if compared == 0 {
        return 0;
    }
    (matches as f64 / compared as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct Couple {
        engine: QuizEngine,
        store: Arc<MemoryStore>,
        alice: Uuid,
        bob: Uuid,
    }

    fn couple() -> Couple {
        let store = Arc::new(MemoryStore::new());
        Couple {
            engine: QuizEngine::new(store.clone()),
            store,
            alice: Uuid::new_v4(),
            bob: Uuid::new_v4(),
        }
    }

    async fn seed_batch(c: &Couple, ids: &[i32], current_index: i32) -> QuizBatch {
        let mut batch = QuizBatch::new(
            PairKey::new(c.alice, c.bob),
            ids.iter()
                .map(|&id| questions::question_by_id(id).expect("question"))
                .collect(),
            Utc::now(),
            Duration::days(BATCH_TTL_DAYS),
        );
        batch.current_index = current_index;
        assert!(c.store.insert_batch(batch.clone()).await.expect("insert"));
        batch
    }

    #[tokio::test]
    async fn batch_is_shared_by_both_partners() {
        let c = couple();
        let now = Utc::now();
        let from_alice = c.engine.get_or_create_batch(c.alice, c.bob, now).await.unwrap();
        let from_bob = c.engine.get_or_create_batch(c.bob, c.alice, now).await.unwrap();
        assert_eq!(from_alice.id, from_bob.id);
        assert_eq!(from_alice.total_questions(), BATCH_SIZE);
        assert_eq!(from_alice.current_index, 0);
        assert!(!from_alice.completed);
    }

    #[tokio::test]
    async fn expired_batch_is_replaced() {
        let c = couple();
        let now = Utc::now();
        let first = c.engine.get_or_create_batch(c.alice, c.bob, now).await.unwrap();
        let later = now + Duration::days(BATCH_TTL_DAYS + 1);
        let second = c.engine.get_or_create_batch(c.bob, c.alice, later).await.unwrap();
        assert_ne!(first.id, second.id);
        let old = c.store.find_batch(first.id).await.unwrap().unwrap();
        assert!(old.completed);
    }

    #[tokio::test]
    async fn new_batch_supersedes_the_open_one() {
        let c = couple();
        let now = Utc::now();
        let first = c.engine.get_or_create_batch(c.alice, c.bob, now).await.unwrap();
        let second = c.engine.start_new_batch(c.bob, c.alice, now).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(c.store.find_batch(first.id).await.unwrap().unwrap().completed);
        let open = c
            .store
            .find_open_batch(PairKey::new(c.alice, c.bob))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(open.id, second.id);
    }

    #[tokio::test]
    async fn first_answer_waits_for_partner_without_scoring() {
        let c = couple();
        seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;

        let outcome = c
            .engine
            .submit_answer(c.alice, c.bob, 1, "A".into(), Utc::now())
            .await
            .unwrap();
        assert!(outcome.waiting_for_partner);
        assert_eq!(outcome.delta, 0);
        assert_eq!(outcome.new_score, None);
        assert!(!outcome.batch_complete);
        assert_eq!(c.store.get_score(PairKey::new(c.alice, c.bob)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn matching_answers_score_five() {
        let c = couple();
        let batch = seed_batch(&c, &[3, 1, 2, 4, 5], 0).await;

        c.engine
            .submit_answer(c.alice, c.bob, 3, "Cat".into(), Utc::now())
            .await
            .unwrap();
        let outcome = c
            .engine
            .submit_answer(c.bob, c.alice, 3, "Cat".into(), Utc::now())
            .await
            .unwrap();
        assert!(outcome.is_match);
        assert!(!outcome.waiting_for_partner);
        assert_eq!(outcome.delta, 5);
        assert_eq!(outcome.new_score, Some(5));

        let batch = c.store.find_batch(batch.id).await.unwrap().unwrap();
        assert_eq!(batch.current_index, 1);
    }

    #[tokio::test]
    async fn mismatch_never_drops_score_below_zero() {
        let c = couple();
        seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;

        c.engine
            .submit_answer(c.alice, c.bob, 1, "Cat".into(), Utc::now())
            .await
            .unwrap();
        let outcome = c
            .engine
            .submit_answer(c.bob, c.alice, 1, "Dog".into(), Utc::now())
            .await
            .unwrap();
        assert!(!outcome.is_match);
        assert_eq!(outcome.delta, -2);
        assert_eq!(outcome.new_score, Some(0));

        c.engine
            .submit_answer(c.alice, c.bob, 2, "Tea".into(), Utc::now())
            .await
            .unwrap();
        let outcome = c
            .engine
            .submit_answer(c.bob, c.alice, 2, "Tea".into(), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.new_score, Some(5));

        c.engine
            .submit_answer(c.alice, c.bob, 3, "Sweet".into(), Utc::now())
            .await
            .unwrap();
        let outcome = c
            .engine
            .submit_answer(c.bob, c.alice, 3, "Savory".into(), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.new_score, Some(3));
    }

    #[tokio::test]
    async fn fifth_scored_answer_completes_the_batch() {
        let c = couple();
        let batch = seed_batch(&c, &[1, 2, 3, 4, 5], 4).await;

        c.engine
            .submit_answer(c.bob, c.alice, 5, "Beach".into(), Utc::now())
            .await
            .unwrap();
        let outcome = c
            .engine
            .submit_answer(c.alice, c.bob, 5, "Beach".into(), Utc::now())
            .await
            .unwrap();
        assert!(outcome.batch_complete);

        let batch = c.store.find_batch(batch.id).await.unwrap().unwrap();
        assert!(batch.completed);
        assert_eq!(batch.current_index, 5);
    }

    #[tokio::test]
    async fn answering_all_five_together_completes_the_batch() {
        let c = couple();
        let batch = c
            .engine
            .get_or_create_batch(c.alice, c.bob, Utc::now())
            .await
            .unwrap();

        for question in &batch.questions {
            let answer = question.options[0].clone();
            c.engine
                .submit_answer(c.alice, c.bob, question.id, answer.clone(), Utc::now())
                .await
                .unwrap();
            c.engine
                .submit_answer(c.bob, c.alice, question.id, answer, Utc::now())
                .await
                .unwrap();
        }

        let stored = c.store.find_batch(batch.id).await.unwrap().unwrap();
        assert!(stored.completed);
        assert_eq!(stored.current_index, 5);
        let score = c.engine.score_summary(c.alice, c.bob).await.unwrap();
        assert_eq!(score.score, 25);
        assert_eq!(score.matches, 5);
        assert_eq!(score.match_percent, 100);
    }

    #[tokio::test]
    async fn answering_out_of_order_still_completes_the_batch() {
        let c = couple();
        let batch = seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;

        let mut last = None;
        for id in (1..=5).rev() {
            c.engine
                .submit_answer(c.alice, c.bob, id, "Same".into(), Utc::now())
                .await
                .unwrap();
            let outcome = c
                .engine
                .submit_answer(c.bob, c.alice, id, "Same".into(), Utc::now())
                .await
                .unwrap();
            assert!(outcome.is_match);
            if id > 1 {
                assert!(!outcome.batch_complete);
                let stored = c.store.find_batch(batch.id).await.unwrap().unwrap();
                assert_eq!(stored.current_index, 0);
            }
            last = Some(outcome);
        }

        let last = last.expect("five answers");
        assert!(last.batch_complete);
        assert_eq!(last.new_score, Some(25));
        let stored = c.store.find_batch(batch.id).await.unwrap().unwrap();
        assert!(stored.completed);
        assert_eq!(stored.current_index, 5);
    }

    #[tokio::test]
    async fn scored_gap_is_crossed_once_the_cursor_question_scores() {
        let c = couple();
        let batch = seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;

        for id in [2, 3, 1] {
            c.engine
                .submit_answer(c.alice, c.bob, id, "A".into(), Utc::now())
                .await
                .unwrap();
            c.engine
                .submit_answer(c.bob, c.alice, id, "B".into(), Utc::now())
                .await
                .unwrap();
        }

        let stored = c.store.find_batch(batch.id).await.unwrap().unwrap();
        assert_eq!(stored.current_index, 3);
        assert!(!stored.completed);
    }

    #[tokio::test]
    async fn failed_scoring_keeps_nothing_and_can_be_retried() {
        let c = couple();
        let batch = seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;
        let pair = PairKey::new(c.alice, c.bob);

        c.engine
            .submit_answer(c.alice, c.bob, 1, "Cat".into(), Utc::now())
            .await
            .unwrap();
        c.store.fail_next_scoring();
        let err = c
            .engine
            .submit_answer(c.bob, c.alice, 1, "Cat".into(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InternalServerError(_)));

        assert_eq!(c.store.get_score(pair).await.unwrap(), None);
        let stored = c.store.find_batch(batch.id).await.unwrap().unwrap();
        assert_eq!(stored.current_index, 0);
        assert!(c.store.find_response(batch.id, c.bob, 1).await.unwrap().is_none());

        let outcome = c
            .engine
            .submit_answer(c.bob, c.alice, 1, "Cat".into(), Utc::now())
            .await
            .unwrap();
        assert!(outcome.is_match);
        assert_eq!(outcome.new_score, Some(5));
        let stored = c.store.find_batch(batch.id).await.unwrap().unwrap();
        assert_eq!(stored.current_index, 1);
    }

    #[tokio::test]
    async fn duplicate_answer_is_rejected() {
        let c = couple();
        seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;
        c.engine
            .submit_answer(c.alice, c.bob, 1, "Cat".into(), Utc::now())
            .await
            .unwrap();
        let err = c
            .engine
            .submit_answer(c.alice, c.bob, 1, "Dog".into(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn answer_for_question_outside_batch_is_rejected() {
        let c = couple();
        seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;
        let err = c
            .engine
            .submit_answer(c.alice, c.bob, 40, "Rain".into(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn answer_without_batch_is_rejected() {
        let c = couple();
        let err = c
            .engine
            .submit_answer(c.alice, c.bob, 1, "Cat".into(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn current_question_skips_what_the_user_already_answered() {
        let c = couple();
        let batch = seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;

        match c.engine.current_question(c.alice, c.bob, Utc::now()).await.unwrap() {
            CurrentQuestion::Question { question, position, total } => {
                assert_eq!(question.id, 1);
                assert_eq!(position, 1);
                assert_eq!(total, 5);
            }
            CurrentQuestion::Completed => panic!("batch should not be complete"),
        }

        c.engine
            .submit_answer(c.alice, c.bob, 1, "Cat".into(), Utc::now())
            .await
            .unwrap();
        match c.engine.current_question(c.alice, c.bob, Utc::now()).await.unwrap() {
            CurrentQuestion::Question { question, position, .. } => {
                assert_eq!(question.id, 2);
                assert_eq!(position, 2);
            }
            CurrentQuestion::Completed => panic!("batch should not be complete"),
        }
        let stored = c.store.find_batch(batch.id).await.unwrap().unwrap();
        assert_eq!(stored.current_index, 1);
    }

    #[tokio::test]
    async fn skipping_over_answered_tail_completes_batch() {
        let c = couple();
        let batch = seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;
        for id in 1..=5 {
            c.engine
                .submit_answer(c.alice, c.bob, id, "X".into(), Utc::now())
                .await
                .unwrap();
        }

        let current = c.engine.current_question(c.alice, c.bob, Utc::now()).await.unwrap();
        assert!(matches!(current, CurrentQuestion::Completed));
        let stored = c.store.find_batch(batch.id).await.unwrap().unwrap();
        assert!(stored.completed);
        assert_eq!(stored.current_index, 5);
    }

    #[tokio::test]
    async fn scoring_a_question_twice_is_impossible() {
        let c = couple();
        let batch = seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;
        let pair = PairKey::new(c.alice, c.bob);

        // both answers are stored before either side scores
        c.store
            .insert_response(QuizResponse::new(c.alice, batch.id, 1, "Cat".into(), Utc::now()))
            .await
            .unwrap();
        let scored = c
            .store
            .score_question(batch.id, 1, pair, MATCH_DELTA)
            .await
            .unwrap()
            .expect("first scorer wins");
        assert_eq!(scored.score, 5);
        assert!(c
            .store
            .score_question(batch.id, 1, pair, MATCH_DELTA)
            .await
            .unwrap()
            .is_none());

        let outcome = c
            .engine
            .submit_answer(c.bob, c.alice, 1, "Cat".into(), Utc::now())
            .await
            .unwrap();
        assert!(outcome.is_match);
        assert_eq!(outcome.new_score, Some(5));
        let stored = c.store.find_batch(batch.id).await.unwrap().unwrap();
        assert_eq!(stored.current_index, 1);
    }

    #[tokio::test]
    async fn partner_check_is_read_only() {
        let c = couple();
        seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;

        let check = c.engine.check_partner_response(c.alice, c.bob, 1).await.unwrap();
        assert!(!check.has_answered);

        c.engine
            .submit_answer(c.alice, c.bob, 1, "Cat".into(), Utc::now())
            .await
            .unwrap();
        c.engine
            .submit_answer(c.bob, c.alice, 1, "Dog".into(), Utc::now())
            .await
            .unwrap();

        let pair = PairKey::new(c.alice, c.bob);
        let before = c.store.get_score(pair).await.unwrap();
        let check = c.engine.check_partner_response(c.alice, c.bob, 1).await.unwrap();
        assert!(check.has_answered);
        let result = check.result.expect("result");
        assert!(!result.is_match);
        assert_eq!(result.delta, -2);
        assert_eq!(result.new_score, before);
        assert!(!result.batch_complete);
        assert_eq!(c.store.get_score(pair).await.unwrap(), before);
    }

    #[tokio::test]
    async fn status_counts_questions_waiting_on_the_user() {
        let c = couple();
        let batch = seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;
        c.engine
            .submit_answer(c.bob, c.alice, 1, "Cat".into(), Utc::now())
            .await
            .unwrap();
        c.engine
            .submit_answer(c.bob, c.alice, 2, "Tea".into(), Utc::now())
            .await
            .unwrap();

        let status = c.engine.status(c.alice, c.bob).await.unwrap();
        assert!(status.has_active_batch);
        assert_eq!(status.pending_questions, 2);
        assert_eq!(status.current_score, 0);
        let info = status.batch_info.expect("batch info");
        assert_eq!(info.id, batch.id);
        assert_eq!(info.progress, "0/5");
    }

    #[tokio::test]
    async fn results_list_questions_answered_by_both() {
        let c = couple();
        let batch = seed_batch(&c, &[1, 2, 3, 4, 5], 0).await;
        c.engine
            .submit_answer(c.alice, c.bob, 2, "Tea".into(), Utc::now())
            .await
            .unwrap();
        c.engine
            .submit_answer(c.bob, c.alice, 2, "Coffee".into(), Utc::now())
            .await
            .unwrap();
        c.engine
            .submit_answer(c.alice, c.bob, 3, "Sweet".into(), Utc::now())
            .await
            .unwrap();

        let results = c.engine.batch_results(c.alice, c.bob, batch.id).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].your_answer, "Tea");
        assert_eq!(results[0].partner_answer, "Coffee");
        assert!(!results[0].is_match);

        let stranger = Uuid::new_v4();
        let err = c
            .engine
            .batch_results(c.alice, stranger, batch.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = c
            .engine
            .batch_results(c.alice, c.bob, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn match_percent_rounds() {
        assert_eq!(match_percent(0, 0), 0);
        assert_eq!(match_percent(2, 3), 67);
        assert_eq!(match_percent(1, 3), 33);
        assert_eq!(match_percent(3, 3), 100);
    }
}
