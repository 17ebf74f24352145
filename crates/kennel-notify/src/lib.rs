//! Kennel Notification Core
//!
//! Protected notification operations plus real-time fan-out to live
//! subscribers, with no external message broker.
//!
//! Key pieces:
//! - `Broker` — topic → subscriber registry; publish never waits on consumers
//! - `SubscriptionManager` / `Subscription` — per-subscriber channel with
//!   explicit, idempotent cancellation (also on drop)
//! - `NotificationService` — list / create / delete behind the
//!   authorization gate; create publishes `NotificationAdded`
//! - typed `{success, message, ...}` responses; failures never escape as faults

pub mod broker;
pub mod channel;
pub mod error;
pub mod response;
pub mod service;

pub use broker::{Broker, SubscriptionId};
pub use channel::{ChannelSnapshot, Subscription, SubscriptionManager};
pub use error::{ErrorKind, NotifyError, NotifyResult};
pub use response::{NotificationResponse, NotificationsResponse};
pub use service::{NotificationBroker, NotificationService, ServiceOptions};
