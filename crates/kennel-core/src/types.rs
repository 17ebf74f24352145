use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Typed identifiers — prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(PrincipalId, "Identity of an authenticated caller.");
define_id!(NotificationId, "Store-assigned identifier of a notification.");

impl NotificationId {
    /// Generate a fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

// ---------------------------------------------------------------------------
// Credential — opaque bearer token, lifetime of one request
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// RequestContext — whatever the transport carried alongside the request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub credential: Option<Credential>,
}

impl RequestContext {
    /// A context carrying no credential.
    pub fn anonymous() -> Self {
        Self { credential: None }
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
        }
    }

    /// Build a context from a raw bearer token, treating blank tokens as absent.
    pub fn from_bearer(token: Option<&str>) -> Self {
        let credential = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Credential::new);
        Self { credential }
    }
}

// ---------------------------------------------------------------------------
// Topic — logical pub/sub channel name
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// The single topic every notification publish and subscription uses.
    pub const NOTIFICATION_ADDED: &'static str = "notification-added";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn notification_added() -> Self {
        Self::new(Self::NOTIFICATION_ADDED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Notification records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub from_user_id: PrincipalId,
    pub to_user_id: PrincipalId,
    pub message: String,
    pub link: String,
}

impl Notification {
    pub fn from_input(id: NotificationId, input: NotificationInput) -> Self {
        Self {
            id,
            from_user_id: input.from_user_id,
            to_user_id: input.to_user_id,
            message: input.message,
            link: input.link,
        }
    }

    /// Whether this record carries the same payload as `input`.
    pub fn matches_input(&self, input: &NotificationInput) -> bool {
        self.from_user_id == input.from_user_id
            && self.to_user_id == input.to_user_id
            && self.message == input.message
            && self.link == input.link
    }
}

/// Client-supplied fields of a new notification. All fields are optional on
/// the wire; a missing or `null` field reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationInput {
    #[serde(deserialize_with = "null_as_default")]
    pub from_user_id: PrincipalId,
    #[serde(deserialize_with = "null_as_default")]
    pub to_user_id: PrincipalId,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub link: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Event published on [`Topic::NOTIFICATION_ADDED`] after a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAdded {
    pub notification: Notification,
}
