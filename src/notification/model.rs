//! Notification models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};

/// Notification category shown to the recipient
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Booking,
    Provider,
    Payment,
    Chat,
    System,
}

/// Stored discriminant of a [`SourceRef`]
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "notification_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Booking,
    Application,
    System,
}

/// Entity that triggered a notification
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SourceRef {
    Booking(i64),
    Application(i64),
    System,
}

impl SourceRef {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRef::Booking(_) => SourceKind::Booking,
            SourceRef::Application(_) => SourceKind::Application,
            SourceRef::System => SourceKind::System,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            SourceRef::Booking(id) | SourceRef::Application(id) => Some(*id),
            SourceRef::System => None,
        }
    }

    /// Rebuild from stored columns; a typed kind without an id degrades to `System`
    pub fn from_parts(kind: SourceKind, id: Option<i64>) -> Self {
        match (kind, id) {
            (SourceKind::Booking, Some(id)) => SourceRef::Booking(id),
            (SourceKind::Application, Some(id)) => SourceRef::Application(id),
            _ => SourceRef::System,
        }
    }
}

/// Persisted notification row
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub sender_id: Option<i64>,
    pub source_kind: SourceKind,
    pub source_id: Option<i64>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn source(&self) -> SourceRef {
        SourceRef::from_parts(self.source_kind, self.source_id)
    }
}

/// Notification as listed to its recipient
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationView {
    pub id: i64,
    pub title: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub sender_name: String,
    pub recipient_name: Option<String>,
    pub is_read: bool,
}

/// A notification waiting to be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    /// Intended recipient; `None` routes straight to the system account
    pub recipient_id: Option<i64>,
    /// `None` means system-generated
    pub sender_id: Option<i64>,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub source: SourceRef,
}

/// Message pushed over the live channel
#[derive(Debug, Serialize, Clone)]
pub struct LiveNotification {
    pub id: i64,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub source: SourceRef,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for LiveNotification {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            title: n.title.clone(),
            kind: n.kind,
            message: n.message.clone(),
            source: n.source(),
            created_at: n.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ref_round_trips_through_columns() {
        let source = SourceRef::Booking(12);
        assert_eq!(SourceRef::from_parts(source.kind(), source.id()), source);

        let source = SourceRef::Application(3);
        assert_eq!(SourceRef::from_parts(source.kind(), source.id()), source);

        assert_eq!(SourceRef::from_parts(SourceKind::System, None), SourceRef::System);
    }

    #[test]
    fn test_source_ref_without_id_degrades_to_system() {
        assert_eq!(
            SourceRef::from_parts(SourceKind::Booking, None),
            SourceRef::System
        );
    }

    #[test]
    fn test_source_ref_serialization() {
        let json = serde_json::to_value(SourceRef::Booking(5)).unwrap();
        assert_eq!(json["kind"], "booking");
        assert_eq!(json["id"], 5);

        let json = serde_json::to_value(SourceRef::System).unwrap();
        assert_eq!(json["kind"], "system");
    }
}
