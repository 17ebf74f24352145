use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use kennel_core::{
    IdentityResolver, Notification, NotificationId, NotificationInput, NotificationStore,
    PrincipalId, StoreError, StoreResult,
};
use rusqlite::{params, Connection, OptionalExtension};

/// SQLite-backed notification store and principal directory.
///
/// One connection behind a mutex; every statement runs to completion while
/// the lock is held, so a create is visible to the next list.
///
/// Statements run inline on the async worker rather than via `spawn_blocking`:
/// each is a single indexed row operation on a local file and the lock is
/// never held across an `.await`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS notifications (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    from_user_id TEXT NOT NULL,
    to_user_id TEXT NOT NULL,
    message TEXT NOT NULL,
    link TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS notifications_recipient ON notifications (to_user_id, seq);
CREATE TABLE IF NOT EXISTS principals (
    id TEXT PRIMARY KEY NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);
";

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| StoreError::Unavailable(format!("failed to open database: {}", e)))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Internal(format!("failed to create tables: {}", e)))?;
        tracing::debug!(path = %path.as_ref().display(), "sqlite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        Self::open(":memory:")
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {}", e)))
    }

    /// Register a principal. Returns false if it was already known.
    pub fn add_principal(&self, id: &PrincipalId) -> StoreResult<bool> {
        let rows = self
            .conn()?
            .execute(
                "INSERT OR IGNORE INTO principals (id) VALUES (?1)",
                params![id.as_str()],
            )
            .map_err(query_error)?;
        Ok(rows > 0)
    }

    /// Forget a principal. Returns false if it was not known.
    pub fn remove_principal(&self, id: &PrincipalId) -> StoreResult<bool> {
        let rows = self
            .conn()?
            .execute("DELETE FROM principals WHERE id = ?1", params![id.as_str()])
            .map_err(query_error)?;
        Ok(rows > 0)
    }
}

fn query_error(e: rusqlite::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: NotificationId::new(row.get::<_, String>(0)?),
        from_user_id: PrincipalId::new(row.get::<_, String>(1)?),
        to_user_id: PrincipalId::new(row.get::<_, String>(2)?),
        message: row.get(3)?,
        link: row.get(4)?,
    })
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn create(&self, input: NotificationInput) -> StoreResult<Notification> {
        let notification = Notification::from_input(NotificationId::generate(), input);
        self.conn()?
            .execute(
                "INSERT INTO notifications (id, from_user_id, to_user_id, message, link)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    notification.id.as_str(),
                    notification.from_user_id.as_str(),
                    notification.to_user_id.as_str(),
                    notification.message,
                    notification.link,
                ],
            )
            .map_err(query_error)?;
        Ok(notification)
    }

    async fn list_for(&self, recipient: &PrincipalId) -> StoreResult<Vec<Notification>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, from_user_id, to_user_id, message, link
                 FROM notifications WHERE to_user_id = ?1 ORDER BY seq",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![recipient.as_str()], row_to_notification)
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn delete(&self, id: &NotificationId) -> StoreResult<Option<Notification>> {
        let conn = self.conn()?;
        let existing = conn
            .query_row(
                "SELECT id, from_user_id, to_user_id, message, link
                 FROM notifications WHERE id = ?1",
                params![id.as_str()],
                row_to_notification,
            )
            .optional()
            .map_err(query_error)?;
        if existing.is_some() {
            conn.execute("DELETE FROM notifications WHERE id = ?1", params![id.as_str()])
                .map_err(query_error)?;
        }
        Ok(existing)
    }
}

#[async_trait]
impl IdentityResolver for SqliteStore {
    async fn exists(&self, principal: &PrincipalId) -> StoreResult<bool> {
        let found: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT 1 FROM principals WHERE id = ?1",
                params![principal.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error)?;
        Ok(found.is_some())
    }
}
