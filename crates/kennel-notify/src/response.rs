//! `{success, message, <payload>}` result objects.
//!
//! Every operation answers with one of these, on success and on failure
//! alike; callers branch on `success`.

use kennel_auth::AuthFailure;
use kennel_core::{Notification, NotificationId, PrincipalId};
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

/// Response of `getNotifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub success: bool,
    pub message: String,
    pub notifications: Option<Vec<Notification>>,
}

impl NotificationsResponse {
    pub fn found(principal: &PrincipalId, notifications: Vec<Notification>) -> Self {
        let message = if notifications.is_empty() {
            format!("No notifications for user {}", principal)
        } else {
            format!(
                "Found {} notification(s) for user {}",
                notifications.len(),
                principal
            )
        };
        Self {
            success: true,
            message,
            notifications: Some(notifications),
        }
    }

    pub fn failure(error: &NotifyError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            notifications: None,
        }
    }
}

impl From<NotifyError> for NotificationsResponse {
    fn from(error: NotifyError) -> Self {
        Self::failure(&error)
    }
}

impl From<AuthFailure> for NotificationsResponse {
    fn from(failure: AuthFailure) -> Self {
        Self::failure(&NotifyError::Auth(failure))
    }
}

/// Response of `addNotification` and `removeNotification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub success: bool,
    pub message: String,
    pub notification: Option<Notification>,
}

impl NotificationResponse {
    pub fn added(notification: Notification) -> Self {
        Self {
            success: true,
            message: format!("Notification {} added", notification.id),
            notification: Some(notification),
        }
    }

    /// Acknowledge a delete. `removed` is the deleted record when the store
    /// still had it.
    pub fn deleted(id: &NotificationId, removed: Option<Notification>) -> Self {
        Self {
            success: true,
            message: format!("Notification {} deleted", id),
            notification: removed,
        }
    }

    pub fn failure(error: &NotifyError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            notification: None,
        }
    }
}

impl From<NotifyError> for NotificationResponse {
    fn from(error: NotifyError) -> Self {
        Self::failure(&error)
    }
}

impl From<AuthFailure> for NotificationResponse {
    fn from(failure: AuthFailure) -> Self {
        Self::failure(&NotifyError::Auth(failure))
    }
}
