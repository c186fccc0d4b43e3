use std::time::Duration;

/// Failure reported by a [`Notifier`](crate::Notifier).
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Network, auth, or relay-side trouble. Worth retrying.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// The relay refused the message outright (bad address, policy).
    #[error("recipient rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    /// The task store could not be read. The whole cycle is skipped.
    #[error("task store unavailable: {0}")]
    DataAccess(String),

    #[error(transparent)]
    Delivery(#[from] NotifyError),

    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

impl ReminderError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Delivery(NotifyError::Transient(_)) | Self::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReminderError>;
