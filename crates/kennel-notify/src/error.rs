use kennel_auth::AuthFailure;
use kennel_core::{NotificationId, PrincipalId, StoreError};
use thiserror::Error;

/// Every way a notification operation can fail.
///
/// The `Display` output is what callers see in the `message` field, so store
/// failures render generically; the underlying cause is only logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error("no notifications found for user {0}")]
    NoNotifications(PrincipalId),

    #[error("notification {0} not found")]
    NotificationNotFound(NotificationId),

    #[error("invalid notification: {0}")]
    InvalidInput(String),

    #[error("notification storage is unavailable")]
    Store(#[from] StoreError),
}

/// Coarse error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthFailure,
    NotFound,
    InvalidInput,
    StoreFailure,
}

impl NotifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NotifyError::Auth(_) => ErrorKind::AuthFailure,
            NotifyError::NoNotifications(_) | NotifyError::NotificationNotFound(_) => {
                ErrorKind::NotFound
            }
            NotifyError::InvalidInput(_) => ErrorKind::InvalidInput,
            NotifyError::Store(_) => ErrorKind::StoreFailure,
        }
    }
}

pub type NotifyResult<T> = Result<T, NotifyError>;
