use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{Notification, NotificationId, NotificationInput, PrincipalId};

// ---------------------------------------------------------------------------
// NotificationStore — external persistence for notification records
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new notification built from `input` and return the stored
    /// record, including its generated id.
    async fn create(&self, input: NotificationInput) -> StoreResult<Notification>;

    /// Notifications addressed to `recipient`, in insertion order.
    async fn list_for(&self, recipient: &PrincipalId) -> StoreResult<Vec<Notification>>;

    /// Remove a notification. Returns the removed record, or `None` when no
    /// record had that id.
    async fn delete(&self, id: &NotificationId) -> StoreResult<Option<Notification>>;
}

// ---------------------------------------------------------------------------
// IdentityResolver — confirms a principal still exists
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn exists(&self, principal: &PrincipalId) -> StoreResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both traits are used behind Arc<dyn _>.
    fn _assert_store_object_safe(_: &dyn NotificationStore) {}
    fn _assert_resolver_object_safe(_: &dyn IdentityResolver) {}
}
