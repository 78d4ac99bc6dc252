use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Two user ids in ascending order, so both partners address the same
/// batch and score documents whichever of them is making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub user1_id: Uuid,
    pub user2_id: Uuid,
}

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        Self {
            user1_id: std::cmp::min(a, b),
            user2_id: std::cmp::max(a, b),
        }
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    pub fn partner_of(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.user1_id {
            Some(self.user2_id)
        } else if user_id == self.user2_id {
            Some(self.user1_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i32,
    pub text: String,
    pub options: Vec<String>,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuizBatch {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    #[sqlx(json)]
    pub questions: Vec<QuizQuestion>,
    pub current_index: i32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl QuizBatch {
    pub fn new(
        pair: PairKey,
        questions: Vec<QuizQuestion>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user1_id: pair.user1_id,
            user2_id: pair.user2_id,
            questions,
            current_index: 0,
            completed: false,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(self.user1_id, self.user2_id)
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        usize::try_from(self.current_index)
            .ok()
            .and_then(|index| self.questions.get(index))
    }

    pub fn position_of(&self, question_id: i32) -> Option<usize> {
        self.questions.iter().position(|q| q.id == question_id)
    }

    pub fn question(&self, question_id: i32) -> Option<&QuizQuestion> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index as usize >= self.questions.len()
    }

    pub fn is_finished(&self) -> bool {
        self.completed || self.is_exhausted()
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.expires_at > now
    }

    pub fn progress(&self) -> String {
        format!("{}/{}", self.current_index, self.questions.len())
    }

    /// The cursor moved past every scored question directly ahead of it.
    /// Never moves backwards.
    pub fn settled_index(&self, scored: &HashSet<i32>) -> i32 {
        let start = usize::try_from(self.current_index).unwrap_or(0);
        let ahead = self
            .questions
            .iter()
            .skip(start)
            .take_while(|q| scored.contains(&q.id))
            .count();
        self.current_index + ahead as i32
    }
}

/// Result of scoring one question: the new pair score and the batch
/// with its cursor settled.
#[derive(Debug, Clone)]
pub struct ScoredQuestion {
    pub score: i32,
    pub batch: QuizBatch,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuizResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question_id: i32,
    pub answer: String,
    pub batch_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl QuizResponse {
    pub fn new(
        user_id: Uuid,
        batch_id: Uuid,
        question_id: i32,
        answer: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            question_id,
            answer,
            batch_id,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuizScore {
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub score: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: i32) -> QuizQuestion {
        QuizQuestion {
            id,
            text: format!("Question {}", id),
            options: vec!["A".into(), "B".into()],
            tag: "test".into(),
        }
    }

    #[test]
    fn pair_key_is_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        let pair = PairKey::new(a, b);
        assert!(pair.user1_id < pair.user2_id);
        assert_eq!(pair.partner_of(a), Some(b));
        assert_eq!(pair.partner_of(b), Some(a));
        assert_eq!(pair.partner_of(Uuid::new_v4()), None);
    }

    #[test]
    fn pair_key_order_matches_string_order() {
        let a = Uuid::parse_str("f0000000-0000-0000-0000-000000000000").unwrap();
        let b = Uuid::parse_str("0a000000-0000-0000-0000-000000000000").unwrap();
        let pair = PairKey::new(a, b);
        let mut as_strings = [a.to_string(), b.to_string()];
        as_strings.sort();
        assert_eq!(pair.user1_id.to_string(), as_strings[0]);
        assert_eq!(pair.user2_id.to_string(), as_strings[1]);
    }

    #[test]
    fn batch_tracks_position_and_exhaustion() {
        let pair = PairKey::new(Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        let mut batch = QuizBatch::new(
            pair,
            vec![question(7), question(3)],
            now,
            chrono::Duration::days(7),
        );
        assert_eq!(batch.current_question().map(|q| q.id), Some(7));
        assert_eq!(batch.position_of(3), Some(1));
        assert_eq!(batch.position_of(99), None);
        assert!(batch.is_active(now));
        assert!(!batch.is_active(now + chrono::Duration::days(8)));

        batch.current_index = 2;
        assert!(batch.current_question().is_none());
        assert!(batch.is_exhausted());
        assert!(batch.is_finished());
        assert_eq!(batch.progress(), "2/2");
    }

    #[test]
    fn cursor_settles_past_scored_questions_ahead_only() {
        let pair = PairKey::new(Uuid::new_v4(), Uuid::new_v4());
        let mut batch = QuizBatch::new(
            pair,
            vec![question(1), question(2), question(3), question(4)],
            Utc::now(),
            chrono::Duration::days(7),
        );

        // a gap at the cursor holds it in place
        let scored: HashSet<i32> = [2, 3].into_iter().collect();
        assert_eq!(batch.settled_index(&scored), 0);

        let scored: HashSet<i32> = [1, 2, 4].into_iter().collect();
        assert_eq!(batch.settled_index(&scored), 2);

        batch.current_index = 3;
        let scored: HashSet<i32> = [4].into_iter().collect();
        assert_eq!(batch.settled_index(&scored), 4);
        assert_eq!(batch.settled_index(&HashSet::new()), 3);
    }
}
