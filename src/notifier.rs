use async_trait::async_trait;

use crate::domain::subscriber_email::SubscriberEmail;

#[derive(thiserror::Error, Debug)]
pub enum NotifierError {
    #[error("Failed to deliver the verification email.")]
    Transport(#[from] reqwest::Error),
}

/// Delivers verification links. Templating is left to the provider behind it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification(
        &self,
        recipient: &SubscriberEmail,
        template: &str,
        verification_link: &str,
    ) -> Result<(), NotifierError>;
}
