use thiserror::Error;

use tailor_core::DomainError;

use crate::config::ConfigError;
use crate::notify::NotifyError;

pub type BackofficeResult<T> = Result<T, BackofficeError>;

/// Failure of a back-office operation. Nothing is applied when one is returned.
#[derive(Debug, Error)]
pub enum BackofficeError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A domain event could not be serialized into the journal.
    #[error("journal serialization failed: {0}")]
    Journal(#[from] serde_json::Error),

    #[error("back-office state lock poisoned")]
    LockPoisoned,
}

impl BackofficeError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            BackofficeError::Domain(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_insufficient_stock(&self) -> bool {
        self.domain().is_some_and(DomainError::is_insufficient_stock)
    }
}
