//! Notification dispatch
//!
//! Notifications raised inside a database transaction are collected in an
//! [`Outbox`] and only dispatched once the transaction has committed, so a
//! rolled-back mutation never notifies anyone. Dispatch itself never fails
//! the caller: an unresolvable recipient is rerouted to the configured system
//! account, and if that is impossible too the notification is logged and
//! dropped.

use sqlx::PgPool;

use crate::websocket::WsState;

use super::model::{LiveNotification, NewNotification, Notification};

/// Notifications pending until their transaction commits
#[derive(Debug, Default)]
#[must_use = "an outbox must be dispatched after commit"]
pub struct Outbox {
    pending: Vec<NewNotification>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: NewNotification) {
        self.pending.push(notification);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn into_inner(self) -> Vec<NewNotification> {
        self.pending
    }
}

/// Persists notifications and pushes them to live connections
#[derive(Clone)]
pub struct Notifier {
    db_pool: PgPool,
    ws_state: WsState,
    system_user_id: Option<i64>,
}

impl Notifier {
    pub fn new(db_pool: PgPool, ws_state: WsState, system_user_id: Option<i64>) -> Self {
        Self {
            db_pool,
            ws_state,
            system_user_id,
        }
    }

    /// Dispatch everything in a committed transaction's outbox
    pub async fn dispatch_all(&self, outbox: Outbox) {
        for notification in outbox.into_inner() {
            self.dispatch(notification).await;
        }
    }

    /// Persist one notification, rerouting to the system account when the
    /// intended recipient does not exist. Returns the stored row, if any.
    pub async fn dispatch(&self, notification: NewNotification) -> Option<Notification> {
        if let Some(recipient_id) = notification.recipient_id {
            match self.insert_for(recipient_id, &notification).await {
                Ok(Some(stored)) => {
                    self.push_live(&stored);
                    return Some(stored);
                }
                Ok(None) => {
                    tracing::warn!(
                        recipient_id,
                        title = %notification.title,
                        "Notification recipient does not exist, using system fallback"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        recipient_id,
                        title = %notification.title,
                        "Failed to store notification, using system fallback: {}",
                        e
                    );
                }
            }
        }

        let Some(system_user_id) = self.system_user_id else {
            tracing::warn!(
                title = %notification.title,
                "No system user configured, dropping notification"
            );
            return None;
        };

        if notification.recipient_id == Some(system_user_id) {
            tracing::error!(
                system_user_id,
                title = %notification.title,
                "System user unavailable, dropping notification"
            );
            return None;
        }

        match self.insert_for(system_user_id, &notification).await {
            Ok(Some(stored)) => {
                self.push_live(&stored);
                Some(stored)
            }
            Ok(None) => {
                tracing::error!(
                    system_user_id,
                    title = %notification.title,
                    "System user does not exist, dropping notification"
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    system_user_id,
                    title = %notification.title,
                    "Failed to store fallback notification: {}",
                    e
                );
                None
            }
        }
    }

    /// Insert only if the recipient exists; `None` means it does not
    async fn insert_for(
        &self,
        recipient_id: i64,
        n: &NewNotification,
    ) -> Result<Option<Notification>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications
                (recipient_id, sender_id, source_kind, source_id, type, title, message)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE EXISTS (SELECT 1 FROM users WHERE id = $1)
            RETURNING *
            "#,
        )
        .bind(recipient_id)
        .bind(n.sender_id)
        .bind(n.source.kind())
        .bind(n.source.id())
        .bind(n.kind)
        .bind(&n.title)
        .bind(&n.message)
        .fetch_optional(&self.db_pool)
        .await
    }

    fn push_live(&self, stored: &Notification) {
        self.ws_state
            .push(stored.recipient_id, LiveNotification::from(stored));
    }
}
