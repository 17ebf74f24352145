//! Protected notification operations.
//!
//! Each operation goes through `AuthGate::guard` first and performs no work
//! when the gate refuses. Domain failures come back as typed responses; store
//! faults are logged with the operation and principal and answered with a
//! generic failure.

use std::sync::Arc;

use kennel_auth::{AuthFailure, AuthGate};
use kennel_core::{
    NotificationAdded, NotificationId, NotificationInput, NotificationStore, PrincipalId,
    RequestContext, Topic,
};

use crate::broker::Broker;
use crate::channel::{ChannelSnapshot, Subscription, SubscriptionManager};
use crate::error::{ErrorKind, NotifyError, NotifyResult};
use crate::response::{NotificationResponse, NotificationsResponse};

pub type NotificationBroker = Broker<NotificationAdded>;

/// Behaviour switches for the operation handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Report an empty notification list as a not-found failure instead of
    /// success with an empty list.
    pub empty_list_is_not_found: bool,
    /// Report deletion of an unknown id as not-found instead of success.
    pub strict_delete: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            empty_list_is_not_found: true,
            strict_delete: false,
        }
    }
}

pub struct NotificationService {
    gate: AuthGate,
    store: Arc<dyn NotificationStore>,
    subscriptions: SubscriptionManager<NotificationAdded>,
    topic: Topic,
    options: ServiceOptions,
}

impl NotificationService {
    pub fn new(
        gate: AuthGate,
        store: Arc<dyn NotificationStore>,
        broker: Arc<NotificationBroker>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            gate,
            store,
            subscriptions: SubscriptionManager::new(broker),
            topic: Topic::notification_added(),
            options,
        }
    }

    pub fn options(&self) -> ServiceOptions {
        self.options
    }

    pub fn broker(&self) -> &Arc<NotificationBroker> {
        self.subscriptions.broker()
    }

    /// `getNotifications`: notifications addressed to the caller.
    pub async fn get_notifications(&self, ctx: &RequestContext) -> NotificationsResponse {
        const OP: &str = "getNotifications";
        self.gate
            .guard(ctx, OP, |principal| async move {
                self.list(&principal)
                    .await
                    .unwrap_or_else(|e| report(OP, &principal, e).into())
            })
            .await
    }

    /// `addNotification`: persist, then publish to live subscribers. An input
    /// with an empty `toUserId` is refused with an invalid-input failure.
    pub async fn add_notification(
        &self,
        ctx: &RequestContext,
        input: NotificationInput,
    ) -> NotificationResponse {
        const OP: &str = "addNotification";
        self.gate
            .guard(ctx, OP, |principal| async move {
                self.create(&principal, input)
                    .await
                    .unwrap_or_else(|e| report(OP, &principal, e).into())
            })
            .await
    }

    /// `removeNotification`: delete by id.
    pub async fn remove_notification(
        &self,
        ctx: &RequestContext,
        id: NotificationId,
    ) -> NotificationResponse {
        const OP: &str = "removeNotification";
        self.gate
            .guard(ctx, OP, |principal| async move {
                self.delete(&principal, id)
                    .await
                    .unwrap_or_else(|e| report(OP, &principal, e).into())
            })
            .await
    }

    /// `notificationAdded`: open a channel receiving every notification
    /// created from now on, for every recipient. Not gated.
    pub fn notification_added(&self) -> Subscription<NotificationAdded> {
        self.subscriptions.open(&self.topic)
    }

    /// Like [`notification_added`](Self::notification_added), but only after
    /// the caller passes the authorization gate. Delivery is still unfiltered.
    pub async fn notification_added_authorized(
        &self,
        ctx: &RequestContext,
    ) -> Result<Subscription<NotificationAdded>, AuthFailure> {
        let principal = self.gate.authorize(ctx).await?;
        tracing::debug!(principal = %principal, "authorized subscription");
        Ok(self.notification_added())
    }

    pub fn subscription_snapshot(&self) -> ChannelSnapshot {
        self.subscriptions.snapshot()
    }

    async fn list(&self, principal: &PrincipalId) -> NotifyResult<NotificationsResponse> {
        let notifications = self.store.list_for(principal).await?;
        if notifications.is_empty() && self.options.empty_list_is_not_found {
            return Err(NotifyError::NoNotifications(principal.clone()));
        }
        Ok(NotificationsResponse::found(principal, notifications))
    }

    /// Persist, then publish. An input without a recipient is refused as
    /// `InvalidInput` before anything is written.
    async fn create(
        &self,
        principal: &PrincipalId,
        input: NotificationInput,
    ) -> NotifyResult<NotificationResponse> {
        if input.to_user_id.as_str().trim().is_empty() {
            return Err(NotifyError::InvalidInput("toUserId is required".into()));
        }

        let notification = self.store.create(input).await?;

        let delivered = self.broker().publish(
            &self.topic,
            NotificationAdded {
                notification: notification.clone(),
            },
        );
        tracing::info!(
            principal = %principal,
            notification_id = %notification.id,
            to = %notification.to_user_id,
            delivered,
            "notification added"
        );

        Ok(NotificationResponse::added(notification))
    }

    async fn delete(
        &self,
        principal: &PrincipalId,
        id: NotificationId,
    ) -> NotifyResult<NotificationResponse> {
        let removed = self.store.delete(&id).await?;
        if removed.is_none() && self.options.strict_delete {
            return Err(NotifyError::NotificationNotFound(id));
        }
        tracing::info!(
            principal = %principal,
            notification_id = %id,
            existed = removed.is_some(),
            "notification removed"
        );
        Ok(NotificationResponse::deleted(&id, removed))
    }
}

fn report(operation: &'static str, principal: &PrincipalId, error: NotifyError) -> NotifyError {
    match (&error, error.kind()) {
        (NotifyError::Store(cause), _) => {
            tracing::error!(operation, principal = %principal, error = %cause, "store failure");
        }
        (_, ErrorKind::NotFound | ErrorKind::InvalidInput) => {
            tracing::debug!(operation, principal = %principal, error = %error, "request refused");
        }
        _ => {}
    }
    error
}
