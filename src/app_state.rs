use std::sync::Arc;

use crate::quiz::QuizEngine;
use crate::store::{MessageStore, QuizStore, ScheduledMessageStore, UserStore};
use crate::utils::email::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub messages: Arc<dyn MessageStore>,
    pub scheduled_messages: Arc<dyn ScheduledMessageStore>,
    pub quiz: QuizEngine,
    pub notifier: Arc<dyn Notifier>,
    pub bcrypt_cost: u32,
}

impl AppState {
    /// Wires every port to the same store.
    pub fn new<S>(store: Arc<S>, notifier: Arc<dyn Notifier>, bcrypt_cost: u32) -> Self
    where
        S: UserStore + MessageStore + ScheduledMessageStore + QuizStore + 'static,
    {
        Self {
            users: store.clone(),
            messages: store.clone(),
            scheduled_messages: store.clone(),
            quiz: QuizEngine::new(store),
            notifier,
            bcrypt_cost,
        }
    }
}
