use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use kennel_auth::TokenKey;

use crate::error::{RootError, RootResult};

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Bearer token settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    /// Hex-encoded 32-byte signing key. When absent the server generates an
    /// ephemeral key at startup and previously issued tokens stop working.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,

    /// Lifetime of issued tokens in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_token_ttl() -> u64 {
    3600
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: default_token_ttl(),
        }
    }
}

impl AuthConfig {
    /// Parse the configured signing key, if any.
    pub fn token_key(&self) -> RootResult<Option<TokenKey>> {
        self.token_secret
            .as_deref()
            .map(|s| {
                TokenKey::from_hex(s)
                    .map_err(|e| RootError::Config(format!("auth.token_secret: {}", e)))
            })
            .transpose()
    }
}

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Process-local; everything is lost on restart.
    #[default]
    Memory,
    /// Single-file SQLite database at `storage.path`.
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,

    /// Database file for the sqlite backend.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Principal ids registered at startup.
    #[serde(default)]
    pub principals: Vec<String>,
}

fn default_db_path() -> PathBuf {
    dirs_or_default(".kennel/kennel.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            path: default_db_path(),
            principals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationsConfig {
    /// Answer an empty `getNotifications` with a not-found failure (the
    /// behaviour existing clients expect) instead of an empty success.
    #[serde(default = "default_true")]
    pub empty_list_is_not_found: bool,

    /// Answer `removeNotification` for an unknown id with not-found.
    #[serde(default)]
    pub strict_delete: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            empty_list_is_not_found: true,
            strict_delete: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionsConfig {
    /// Require a valid bearer credential to open the notification stream.
    #[serde(default)]
    pub require_credential: bool,
}

/// Top-level configuration.
///
/// Loaded from a TOML file (typically `~/.kennel/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub subscriptions: SubscriptionsConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.auth.token_ttl_secs == 0 {
            return Err(RootError::Config("auth.token_ttl_secs must be > 0".into()));
        }
        if i64::try_from(self.auth.token_ttl_secs).is_err() {
            return Err(RootError::Config(format!(
                "auth.token_ttl_secs is too large: {}",
                self.auth.token_ttl_secs
            )));
        }
        self.auth.token_key()?;
        if self.server.bind.trim().is_empty() {
            return Err(RootError::Config("server.bind must not be empty".into()));
        }
        if self.storage.backend == StorageBackendKind::Sqlite
            && self.storage.path.as_os_str().is_empty()
        {
            return Err(RootError::Config(
                "storage.path is required for the sqlite backend".into(),
            ));
        }
        if let Some(blank) = self.storage.principals.iter().find(|p| p.trim().is_empty()) {
            return Err(RootError::Config(format!(
                "storage.principals contains a blank id: {:?}",
                blank
            )));
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".kennel/config.toml")
    }
}
