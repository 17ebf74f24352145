//! The authorization gate wrapped around every protected operation.

use std::future::Future;
use std::sync::Arc;

use kennel_core::{IdentityResolver, PrincipalId, RequestContext};

use crate::error::{AuthFailure, AuthResult, CredentialError};
use crate::verifier::CredentialVerifier;

/// Composes the credential verifier and the identity resolver into a single
/// fail-closed precondition.
///
/// Cheap to clone; both collaborators are shared.
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn CredentialVerifier>,
    resolver: Arc<dyn IdentityResolver>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { verifier, resolver }
    }

    /// Run verify → decode → resolve, in that order, and return the verified
    /// principal id.
    ///
    /// Has no side effects. Any failure means the caller must not touch
    /// protected state.
    pub async fn authorize(&self, ctx: &RequestContext) -> AuthResult<PrincipalId> {
        let credential = ctx.credential.as_ref().ok_or_else(|| {
            tracing::debug!(reason = %CredentialError::Missing, "credential rejected");
            AuthFailure::InvalidOrMissingCredential
        })?;

        self.verifier.verify(credential).await.map_err(|e| {
            tracing::debug!(reason = %e, "credential rejected");
            AuthFailure::from(e)
        })?;

        let principal = self.verifier.decode(credential).await.map_err(|e| {
            tracing::debug!(reason = %e, "credential rejected");
            AuthFailure::from(e)
        })?;

        match self.resolver.exists(&principal).await {
            Ok(true) => Ok(principal),
            Ok(false) => {
                tracing::info!(principal = %principal, "credential names an unknown principal");
                Err(AuthFailure::PrincipalNotFound(principal))
            }
            Err(e) => {
                tracing::error!(principal = %principal, error = %e, "identity lookup failed");
                Err(AuthFailure::Unavailable)
            }
        }
    }

    /// Wrap a protected handler body.
    ///
    /// `handler` only runs once the gate has passed and receives the verified
    /// principal. On failure the gate's outcome is converted into the
    /// handler's response type and returned immediately.
    pub async fn guard<F, Fut, R>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        handler: F,
    ) -> R
    where
        F: FnOnce(PrincipalId) -> Fut,
        Fut: Future<Output = R>,
        R: From<AuthFailure>,
    {
        match self.authorize(ctx).await {
            Ok(principal) => handler(principal).await,
            Err(failure) => {
                tracing::debug!(operation, failure = %failure, "protected operation refused");
                R::from(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{HmacCredentialVerifier, TokenKey};
    use async_trait::async_trait;
    use kennel_core::{StoreError, StoreResult};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Directory {
        known: Mutex<HashSet<String>>,
        lookups: AtomicUsize,
    }

    impl Directory {
        fn with(ids: &[&str]) -> Self {
            Self {
                known: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityResolver for Directory {
        async fn exists(&self, principal: &PrincipalId) -> StoreResult<bool> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.known.lock().unwrap().contains(principal.as_str()))
        }
    }

    struct BrokenDirectory;

    #[async_trait]
    impl IdentityResolver for BrokenDirectory {
        async fn exists(&self, _principal: &PrincipalId) -> StoreResult<bool> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    fn verifier() -> Arc<HmacCredentialVerifier> {
        Arc::new(HmacCredentialVerifier::new(TokenKey::new([0x07; 32]), 600))
    }

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Ran(PrincipalId),
        Refused(AuthFailure),
    }

    impl From<AuthFailure> for Outcome {
        fn from(f: AuthFailure) -> Self {
            Outcome::Refused(f)
        }
    }

    #[tokio::test]
    async fn test_authorize_success() {
        let v = verifier();
        let gate = AuthGate::new(v.clone(), Arc::new(Directory::with(&["u1"])));
        let token = v.issue(&PrincipalId::new("u1")).unwrap();
        let principal = gate
            .authorize(&RequestContext::with_credential(token))
            .await
            .unwrap();
        assert_eq!(principal.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_missing_credential_skips_lookup() {
        let dir = Arc::new(Directory::with(&["u1"]));
        let gate = AuthGate::new(verifier(), dir.clone());
        let result = gate.authorize(&RequestContext::anonymous()).await;
        assert_eq!(result, Err(AuthFailure::InvalidOrMissingCredential));
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_and_forged_credentials_fail_identically() {
        let v = verifier();
        let dir = Arc::new(Directory::with(&["u1"]));
        let gate = AuthGate::new(v.clone(), dir.clone());

        let expired = v
            .issue_until(&PrincipalId::new("u1"), chrono::Utc::now().timestamp() - 1)
            .unwrap();
        let forged = HmacCredentialVerifier::new(TokenKey::new([0x08; 32]), 600)
            .issue(&PrincipalId::new("u1"))
            .unwrap();
        let empty_subject = v.issue(&PrincipalId::new("")).unwrap();

        for cred in [expired, forged, empty_subject] {
            let result = gate.authorize(&RequestContext::with_credential(cred)).await;
            assert_eq!(result, Err(AuthFailure::InvalidOrMissingCredential));
        }
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_principal_fails() {
        let v = verifier();
        let gate = AuthGate::new(v.clone(), Arc::new(Directory::with(&["u1"])));
        let token = v.issue(&PrincipalId::new("ghost")).unwrap();
        let result = gate.authorize(&RequestContext::with_credential(token)).await;
        assert_eq!(
            result,
            Err(AuthFailure::PrincipalNotFound(PrincipalId::new("ghost")))
        );
    }

    #[tokio::test]
    async fn test_removed_principal_fails_with_valid_token() {
        let v = verifier();
        let dir = Arc::new(Directory::with(&["u1"]));
        let gate = AuthGate::new(v.clone(), dir.clone());
        let token = v.issue(&PrincipalId::new("u1")).unwrap();
        let ctx = RequestContext::with_credential(token);

        assert!(gate.authorize(&ctx).await.is_ok());
        dir.known.lock().unwrap().remove("u1");
        assert_eq!(
            gate.authorize(&ctx).await,
            Err(AuthFailure::PrincipalNotFound(PrincipalId::new("u1")))
        );
    }

    #[tokio::test]
    async fn test_resolver_error_fails_closed() {
        let v = verifier();
        let gate = AuthGate::new(v.clone(), Arc::new(BrokenDirectory));
        let token = v.issue(&PrincipalId::new("u1")).unwrap();
        let result = gate.authorize(&RequestContext::with_credential(token)).await;
        assert_eq!(result, Err(AuthFailure::Unavailable));
    }

    #[tokio::test]
    async fn test_guard_runs_handler_on_success() {
        let v = verifier();
        let gate = AuthGate::new(v.clone(), Arc::new(Directory::with(&["u1"])));
        let ctx = RequestContext::with_credential(v.issue(&PrincipalId::new("u1")).unwrap());
        let outcome = gate
            .guard(&ctx, "test", |p| async move { Outcome::Ran(p) })
            .await;
        assert_eq!(outcome, Outcome::Ran(PrincipalId::new("u1")));
    }

    #[tokio::test]
    async fn test_guard_short_circuits() {
        let gate = AuthGate::new(verifier(), Arc::new(Directory::with(&["u1"])));
        let ran = AtomicUsize::new(0);
        let outcome = gate
            .guard(&RequestContext::anonymous(), "test", |p| {
                ran.fetch_add(1, Ordering::SeqCst);
                async move { Outcome::Ran(p) }
            })
            .await;
        assert_eq!(
            outcome,
            Outcome::Refused(AuthFailure::InvalidOrMissingCredential)
        );
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
