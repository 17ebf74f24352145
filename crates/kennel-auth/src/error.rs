use kennel_core::PrincipalId;
use thiserror::Error;

/// Outcome of a failed authorization gate check.
///
/// Credential problems of every kind collapse into
/// `InvalidOrMissingCredential`; the message never says which check failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("authentication failed")]
    InvalidOrMissingCredential,

    #[error("user {0} not found")]
    PrincipalNotFound(PrincipalId),

    #[error("authentication temporarily unavailable")]
    Unavailable,
}

pub type AuthResult<T> = Result<T, AuthFailure>;

/// Why a credential was rejected. Internal detail only: logged at debug
/// level, never returned to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential missing")]
    Missing,

    #[error("credential malformed")]
    Malformed,

    #[error("signature mismatch")]
    BadSignature,

    #[error("credential expired")]
    Expired,

    #[error("credential has no subject")]
    EmptySubject,

    #[error("internal error")]
    Internal,
}

impl From<CredentialError> for AuthFailure {
    fn from(_: CredentialError) -> Self {
        AuthFailure::InvalidOrMissingCredential
    }
}
