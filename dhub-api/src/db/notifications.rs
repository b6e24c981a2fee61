//! In-app notification database operations

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_common::db::models::Notification;
use dhub_common::types::NotificationType;
use dhub_common::{Error, Result};

pub async fn insert_notification(
    pool: &SqlitePool,
    user_id: Uuid,
    kind: NotificationType,
    title: &str,
    message: &str,
    related_letter_id: Option<Uuid>,
) -> Result<Notification> {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        kind: kind.as_str().to_string(),
        title: title.to_string(),
        message: message.to_string(),
        related_letter_id,
        is_read: false,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO notifications (
            id, user_id, kind, title, message, related_letter_id, is_read, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(notification.id.to_string())
    .bind(notification.user_id.to_string())
    .bind(&notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.related_letter_id.map(|id| id.to_string()))
    .bind(notification.is_read)
    .bind(notification.created_at)
    .execute(pool)
    .await?;

    Ok(notification)
}

pub async fn list_notifications(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Notification>> {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(notifications)
}

pub async fn mark_read(pool: &SqlitePool, user_id: Uuid, notification_id: Uuid) -> Result<()> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(notification_id.to_string())
            .bind(user_id.to_string())
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("notification {}", notification_id)));
    }
    Ok(())
}
