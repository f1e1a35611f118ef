use async_trait::async_trait;

use crate::domain::subscriber::{Subscriber, SubscriberChange};
use crate::domain::verification_token::VerificationToken;

mod memory;
mod postgres;

pub use memory::InMemorySubscriberStore;
pub use postgres::PostgresSubscriberStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Failed to execute a subscriber store query.")]
    Database(#[from] sqlx::Error),
    #[error("Stored subscriber is malformed: {0}")]
    Malformed(String),
}

/// Persistence for subscribers, keyed by their email address.
///
/// Writes are conditional so that two requests racing on the same email cannot both
/// succeed: callers learn about a lost race through the returned `bool` and re-read.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    async fn find(&self, email: &str) -> Result<Option<Subscriber>, StoreError>;

    /// Returns `false` when a subscriber with the same email already exists.
    async fn insert(&self, subscriber: &Subscriber) -> Result<bool, StoreError>;

    /// Applies `change` only if the subscriber is still unverified and holds
    /// `expected_token`. Returns `false` when that guard fails.
    async fn update(
        &self,
        email: &str,
        expected_token: &VerificationToken,
        change: SubscriberChange,
    ) -> Result<bool, StoreError>;
}
