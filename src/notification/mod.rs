//! In-app notifications

mod dispatcher;
pub mod messages;
mod model;
mod service;

pub use dispatcher::{Notifier, Outbox};
pub use model::{
    LiveNotification, NewNotification, Notification, NotificationType, NotificationView,
    SourceKind, SourceRef,
};
pub use service::NotificationService;
