use thiserror::Error;

/// Error type for the Kennel server binary, aggregating failures from the
/// library crates it wires together.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("storage error: {0}")]
    Store(#[from] kennel_core::StoreError),

    #[error("credential error: {0}")]
    Credential(#[from] kennel_auth::CredentialError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
