use async_trait::async_trait;
use kennel_core::{Credential, PrincipalId};

use crate::error::CredentialError;

/// Validates bearer credentials and extracts the caller's identity.
///
/// Split in two so the gate can run the checks in a fixed order: `verify`
/// must succeed before `decode` is consulted.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Structural validity, signature and expiry.
    async fn verify(&self, credential: &Credential) -> Result<(), CredentialError>;

    /// The principal id the credential was issued to.
    async fn decode(&self, credential: &Credential) -> Result<PrincipalId, CredentialError>;
}
