use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{StoreError, SubscriberStore};
use crate::domain::subscriber::{Subscriber, SubscriberChange};
use crate::domain::verification_token::VerificationToken;

/// Process-local store, used for development and by the test suite.
#[derive(Default)]
pub struct InMemorySubscriberStore {
    subscribers: RwLock<HashMap<String, Subscriber>>,
}

impl InMemorySubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, email: &str) -> Option<Subscriber> {
        self.subscribers.read().get(email).cloned()
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

#[async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn find(&self, email: &str) -> Result<Option<Subscriber>, StoreError> {
        Ok(self.get(email))
    }

    async fn insert(&self, subscriber: &Subscriber) -> Result<bool, StoreError> {
        let mut subscribers = self.subscribers.write();
        let email = subscriber.email.as_ref();

        if subscribers.contains_key(email) {
            return Ok(false);
        }

        subscribers.insert(email.to_owned(), subscriber.clone());

        Ok(true)
    }

    async fn update(
        &self,
        email: &str,
        expected_token: &VerificationToken,
        change: SubscriberChange,
    ) -> Result<bool, StoreError> {
        let mut subscribers = self.subscribers.write();

        match subscribers.get_mut(email) {
            Some(subscriber) if subscriber.accepts_change_from(expected_token) => {
                subscriber.apply(change);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
