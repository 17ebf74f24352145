//! Kennel server library
//!
//! Wires the notification service together from configuration: signing key,
//! persistence backend, principal directory, broker, and authorization gate.
//! The binary and the HTTP layer both work against the [`Kennel`] handle
//! returned by [`initialize`].

pub mod config;
pub mod error;
pub mod http;
pub mod rpc;

pub use config::{
    AuthConfig, NotificationsConfig, RootConfig, ServerConfig, StorageBackendKind, StorageConfig,
    SubscriptionsConfig,
};
pub use error::{RootError, RootResult};
pub use rpc::{handle_request, rpc_codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse};

use std::sync::Arc;

use kennel_auth::{AuthGate, HmacCredentialVerifier, TokenKey};
use kennel_core::{Credential, IdentityResolver, NotificationStore, PrincipalId};
use kennel_notify::{NotificationBroker, NotificationService, ServiceOptions};
use kennel_store::{InMemoryNotificationStore, InMemoryPrincipalDirectory, SqliteStore};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Principal directory handle
// ---------------------------------------------------------------------------

/// The registry of known principals for the configured backend.
#[derive(Clone)]
pub enum PrincipalDirectory {
    Memory(Arc<InMemoryPrincipalDirectory>),
    Sqlite(Arc<SqliteStore>),
}

impl PrincipalDirectory {
    /// Register a principal. Returns false if it was already known.
    pub fn add(&self, id: &PrincipalId) -> RootResult<bool> {
        let added = match self {
            Self::Memory(dir) => dir.insert(id.clone())?,
            Self::Sqlite(store) => store.add_principal(id)?,
        };
        Ok(added)
    }

    /// Forget a principal. Tokens naming it stop passing the gate.
    pub fn remove(&self, id: &PrincipalId) -> RootResult<bool> {
        let removed = match self {
            Self::Memory(dir) => dir.remove(id)?,
            Self::Sqlite(store) => store.remove_principal(id)?,
        };
        Ok(removed)
    }

    pub async fn contains(&self, id: &PrincipalId) -> RootResult<bool> {
        Ok(self.resolver().exists(id).await?)
    }

    fn resolver(&self) -> Arc<dyn IdentityResolver> {
        match self {
            Self::Memory(dir) => dir.clone() as Arc<dyn IdentityResolver>,
            Self::Sqlite(store) => store.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Kennel
// ---------------------------------------------------------------------------

/// An initialized server: configuration plus every live collaborator.
pub struct Kennel {
    pub config: RootConfig,
    pub service: NotificationService,
    verifier: Arc<HmacCredentialVerifier>,
    directory: PrincipalDirectory,
    ephemeral_key: bool,
}

impl Kennel {
    pub fn directory(&self) -> &PrincipalDirectory {
        &self.directory
    }

    /// Whether the signing key was generated at startup rather than configured.
    pub fn has_ephemeral_key(&self) -> bool {
        self.ephemeral_key
    }

    /// Issue a bearer token for `principal` with the configured lifetime.
    pub fn issue_token(&self, principal: &PrincipalId) -> RootResult<Credential> {
        Ok(self.verifier.issue(principal)?)
    }

    /// Issue a bearer token for `principal` valid for `ttl_secs` seconds.
    pub fn issue_token_for(&self, principal: &PrincipalId, ttl_secs: u64) -> RootResult<Credential> {
        let ttl = i64::try_from(ttl_secs)
            .map_err(|_| RootError::Config(format!("token lifetime too large: {}", ttl_secs)))?;
        let expires_at = chrono::Utc::now().timestamp().saturating_add(ttl);
        Ok(self.verifier.issue_until(principal, expires_at)?)
    }

    pub fn backend(&self) -> StorageBackendKind {
        self.config.storage.backend
    }
}

/// Build a [`Kennel`] from configuration.
///
/// Opens the configured backend, registers the configured principals, and
/// creates the single broker shared by publishers and subscribers.
pub fn initialize(config: RootConfig) -> RootResult<Kennel> {
    config.validate()?;

    info!(
        backend = ?config.storage.backend,
        principals = config.storage.principals.len(),
        "initializing kennel"
    );

    let (key, ephemeral_key) = match config.auth.token_key()? {
        Some(key) => (key, false),
        None => {
            warn!("auth.token_secret not set; using an ephemeral signing key");
            (TokenKey::generate(), true)
        }
    };
    let verifier = Arc::new(HmacCredentialVerifier::new(key, config.auth.token_ttl_secs));

    let (store, directory): (Arc<dyn NotificationStore>, PrincipalDirectory) =
        match config.storage.backend {
            StorageBackendKind::Memory => {
                let store: Arc<dyn NotificationStore> = Arc::new(InMemoryNotificationStore::new());
                let directory = Arc::new(InMemoryPrincipalDirectory::new());
                (store, PrincipalDirectory::Memory(directory))
            }
            StorageBackendKind::Sqlite => {
                if let Some(parent) = config.storage.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            RootError::Internal(format!(
                                "failed to create storage directory {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }
                let sqlite = Arc::new(SqliteStore::open(&config.storage.path)?);
                info!(path = %config.storage.path.display(), "sqlite storage opened");
                let store: Arc<dyn NotificationStore> = sqlite.clone();
                (store, PrincipalDirectory::Sqlite(sqlite))
            }
        };

    for principal in &config.storage.principals {
        directory.add(&PrincipalId::new(principal.trim()))?;
    }

    let broker = Arc::new(NotificationBroker::new());
    let gate = AuthGate::new(verifier.clone(), directory.resolver());
    let options = ServiceOptions {
        empty_list_is_not_found: config.notifications.empty_list_is_not_found,
        strict_delete: config.notifications.strict_delete,
    };
    let service = NotificationService::new(gate, store, broker, options);

    info!("kennel initialized");

    Ok(Kennel {
        config,
        service,
        verifier,
        directory,
        ephemeral_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kennel_core::{NotificationInput, RequestContext};

    fn memory_config() -> RootConfig {
        let mut config = RootConfig::default();
        config.auth.token_secret = Some("11".repeat(32));
        config.storage.principals = vec!["u1".into(), "u2".into()];
        config
    }

    #[test]
    fn test_initialize_memory_backend() {
        let kennel = initialize(memory_config()).unwrap();
        assert_eq!(kennel.backend(), StorageBackendKind::Memory);
        assert!(!kennel.has_ephemeral_key());
        assert!(kennel.service.options().empty_list_is_not_found);
    }

    #[test]
    fn test_initialize_without_secret_uses_ephemeral_key() {
        let mut config = memory_config();
        config.auth.token_secret = None;
        let kennel = initialize(config).unwrap();
        assert!(kennel.has_ephemeral_key());
    }

    #[test]
    fn test_initialize_rejects_invalid_config() {
        let mut config = memory_config();
        config.auth.token_ttl_secs = 0;
        assert!(matches!(initialize(config), Err(RootError::Config(_))));
    }

    #[test]
    fn test_options_follow_config() {
        let mut config = memory_config();
        config.notifications.empty_list_is_not_found = false;
        config.notifications.strict_delete = true;
        let kennel = initialize(config).unwrap();
        let options = kennel.service.options();
        assert!(!options.empty_list_is_not_found);
        assert!(options.strict_delete);
    }

    #[tokio::test]
    async fn test_seeded_principals_are_registered() {
        let kennel = initialize(memory_config()).unwrap();
        assert!(kennel.directory().contains(&PrincipalId::new("u1")).await.unwrap());
        assert!(!kennel.directory().contains(&PrincipalId::new("u3")).await.unwrap());
    }

    #[tokio::test]
    async fn test_issued_token_passes_gate() {
        let kennel = initialize(memory_config()).unwrap();
        let token = kennel.issue_token(&PrincipalId::new("u1")).unwrap();
        let ctx = RequestContext::with_credential(token);

        let added = kennel
            .service
            .add_notification(
                &ctx,
                NotificationInput {
                    from_user_id: "u2".into(),
                    to_user_id: "u1".into(),
                    message: "hello".into(),
                    link: "/inbox".into(),
                },
            )
            .await;
        assert!(added.success);

        let listed = kennel.service.get_notifications(&ctx).await;
        assert!(listed.success);
        assert_eq!(listed.notifications.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_removed_principal_is_refused() {
        let kennel = initialize(memory_config()).unwrap();
        let principal = PrincipalId::new("u2");
        let token = kennel.issue_token(&principal).unwrap();

        assert!(kennel.directory().remove(&principal).unwrap());
        let resp = kennel
            .service
            .get_notifications(&RequestContext::with_credential(token))
            .await;
        assert!(!resp.success);
        assert_eq!(resp.message, "user u2 not found");
    }

    #[tokio::test]
    async fn test_custom_ttl_token_passes_gate() {
        let kennel = initialize(memory_config()).unwrap();
        let token = kennel.issue_token_for(&PrincipalId::new("u1"), 60).unwrap();
        let resp = kennel
            .service
            .get_notifications(&RequestContext::with_credential(token))
            .await;
        // Valid token, but u1 has nothing yet.
        assert!(!resp.success);
        assert_eq!(resp.message, "no notifications found for user u1");
    }

    #[tokio::test]
    async fn test_initialize_sqlite_backend_persists() {
        let dir = std::env::temp_dir().join(format!("kennel-test-init-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let mut config = memory_config();
        config.storage.backend = StorageBackendKind::Sqlite;
        config.storage.path = dir.join("nested").join("kennel.db");

        {
            let kennel = initialize(config.clone()).unwrap();
            let ctx = RequestContext::with_credential(
                kennel.issue_token(&PrincipalId::new("u2")).unwrap(),
            );
            let resp = kennel
                .service
                .add_notification(
                    &ctx,
                    NotificationInput {
                        from_user_id: "u2".into(),
                        to_user_id: "u1".into(),
                        message: "persisted".into(),
                        link: String::new(),
                    },
                )
                .await;
            assert!(resp.success);
            kennel.directory().add(&PrincipalId::new("u9")).unwrap();
        }

        let kennel = initialize(config).unwrap();
        assert!(kennel.directory().contains(&PrincipalId::new("u9")).await.unwrap());
        let ctx =
            RequestContext::with_credential(kennel.issue_token(&PrincipalId::new("u1")).unwrap());
        let resp = kennel.service.get_notifications(&ctx).await;
        assert!(resp.success);
        assert_eq!(resp.notifications.unwrap()[0].message, "persisted");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
