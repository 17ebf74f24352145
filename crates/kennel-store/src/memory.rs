use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use kennel_core::{
    IdentityResolver, Notification, NotificationId, NotificationInput, NotificationStore,
    PrincipalId, StoreError, StoreResult,
};

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StoreError::Internal(format!("lock poisoned: {}", e)))
}

// ---------------------------------------------------------------------------
// InMemoryNotificationStore
// ---------------------------------------------------------------------------

/// Notification store backed by a `Vec` in insertion order.
///
/// A create is visible to every subsequent list as soon as it returns.
pub struct InMemoryNotificationStore {
    records: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Number of stored notifications, across all recipients.
    pub fn count(&self) -> usize {
        lock(&self.records).map(|r| r.len()).unwrap_or(0)
    }

    /// Snapshot of every stored notification (for testing/inspection).
    pub fn all(&self) -> Vec<Notification> {
        lock(&self.records).map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for InMemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, input: NotificationInput) -> StoreResult<Notification> {
        let notification = Notification::from_input(NotificationId::generate(), input);
        lock(&self.records)?.push(notification.clone());
        Ok(notification)
    }

    async fn list_for(&self, recipient: &PrincipalId) -> StoreResult<Vec<Notification>> {
        let records = lock(&self.records)?;
        Ok(records
            .iter()
            .filter(|n| &n.to_user_id == recipient)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &NotificationId) -> StoreResult<Option<Notification>> {
        let mut records = lock(&self.records)?;
        let position = records.iter().position(|n| &n.id == id);
        Ok(position.map(|idx| records.remove(idx)))
    }
}

// ---------------------------------------------------------------------------
// InMemoryPrincipalDirectory
// ---------------------------------------------------------------------------

/// Set of known principal ids.
pub struct InMemoryPrincipalDirectory {
    principals: Mutex<BTreeSet<PrincipalId>>,
}

impl InMemoryPrincipalDirectory {
    pub fn new() -> Self {
        Self {
            principals: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_principals<I, P>(ids: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PrincipalId>,
    {
        Self {
            principals: Mutex::new(ids.into_iter().map(Into::into).collect()),
        }
    }

    /// Register a principal. Returns false if it was already known.
    pub fn insert(&self, id: impl Into<PrincipalId>) -> StoreResult<bool> {
        Ok(lock(&self.principals)?.insert(id.into()))
    }

    /// Forget a principal. Returns false if it was not known.
    pub fn remove(&self, id: &PrincipalId) -> StoreResult<bool> {
        Ok(lock(&self.principals)?.remove(id))
    }

    pub fn len(&self) -> usize {
        lock(&self.principals).map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryPrincipalDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityResolver for InMemoryPrincipalDirectory {
    async fn exists(&self, principal: &PrincipalId) -> StoreResult<bool> {
        Ok(lock(&self.principals)?.contains(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(to: &str, message: &str) -> NotificationInput {
        NotificationInput {
            from_user_id: "sender".into(),
            to_user_id: to.into(),
            message: message.into(),
            link: "/visits/1".into(),
        }
    }

    #[tokio::test]
    async fn test_create_then_list_for_recipient() {
        let store = InMemoryNotificationStore::new();
        let created = store.create(input("u1", "first")).await.unwrap();
        store.create(input("u2", "other")).await.unwrap();
        store.create(input("u1", "second")).await.unwrap();

        let listed = store.list_for(&PrincipalId::new("u1")).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], created);
        assert_eq!(listed[0].message, "first");
        assert_eq!(listed[1].message, "second");
        assert_eq!(store.count(), 3);
    }

    #[tokio::test]
    async fn test_list_unknown_recipient_is_empty() {
        let store = InMemoryNotificationStore::new();
        store.create(input("u1", "hi")).await.unwrap();
        assert!(store.list_for(&PrincipalId::new("nobody")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_returns_removed_record() {
        let store = InMemoryNotificationStore::new();
        let n = store.create(input("u1", "hi")).await.unwrap();

        let removed = store.delete(&n.id).await.unwrap();
        assert_eq!(removed, Some(n.clone()));
        assert!(store.delete(&n.id).await.unwrap().is_none());
        assert!(store.list_for(&PrincipalId::new("u1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_membership() {
        let dir = InMemoryPrincipalDirectory::with_principals(["u1", "u2"]);
        assert!(dir.exists(&PrincipalId::new("u1")).await.unwrap());
        assert!(!dir.exists(&PrincipalId::new("u3")).await.unwrap());

        assert!(dir.insert("u3").unwrap());
        assert!(!dir.insert("u3").unwrap());
        assert!(dir.exists(&PrincipalId::new("u3")).await.unwrap());

        assert!(dir.remove(&PrincipalId::new("u1")).unwrap());
        assert!(!dir.exists(&PrincipalId::new("u1")).await.unwrap());
        assert_eq!(dir.len(), 2);
    }
}
