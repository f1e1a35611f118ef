use crate::notifier::NotifierError;
use crate::store::StoreError;

/// Failures of the collaborators a handler depends on.
#[derive(thiserror::Error)]
pub enum DependencyError {
    #[error("Failed to reach the subscriber store.")]
    Store(#[from] StoreError),
    #[error("Failed to send the verification email.")]
    Notifier(#[from] NotifierError),
    #[error("Timed out waiting for the subscriber store or the email provider.")]
    Timeout(#[from] tokio::time::error::Elapsed),
    #[error("Subscriber kept changing while it was being updated.")]
    Contention,
}

impl DependencyError {
    /// Short label that is safe to hand back to a caller.
    pub fn kind(&self) -> &'static str {
        match self {
            DependencyError::Store(_) => "store",
            DependencyError::Notifier(_) => "notifier",
            DependencyError::Timeout(_) => "timeout",
            DependencyError::Contention => "contention",
        }
    }
}

impl std::fmt::Debug for DependencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}", e)?;

    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }

    Ok(())
}
