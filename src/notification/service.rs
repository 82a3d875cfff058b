//! Notification inbox queries

use sqlx::PgPool;

use super::model::NotificationView;

/// Read side of the notification inbox
#[derive(Clone)]
pub struct NotificationService {
    db_pool: PgPool,
}

impl NotificationService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// All notifications for a user, newest first
    pub async fn list_for(&self, user_id: i64) -> Result<Vec<NotificationView>, sqlx::Error> {
        sqlx::query_as::<_, NotificationView>(
            r#"
            SELECT
                n.id, n.title, n.type, n.message, n.created_at, n.is_read,
                COALESCE(s.username, 'System') AS sender_name,
                r.username AS recipient_name
            FROM notifications n
            LEFT JOIN users s ON s.id = n.sender_id
            LEFT JOIN users r ON r.id = n.recipient_id
            WHERE n.recipient_id = $1
            ORDER BY n.created_at DESC, n.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await
    }

    /// Mark one of the caller's notifications read.
    ///
    /// Returns `false` when no notification with that id belongs to the user.
    pub async fn mark_read(&self, user_id: i64, notification_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await
    }
}
