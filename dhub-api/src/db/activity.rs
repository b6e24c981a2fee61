//! Activity log database operations

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_common::db::models::ActivityEntry;
use dhub_common::Result;

pub async fn record_activity(
    pool: &SqlitePool,
    user_id: Uuid,
    activity_type: &str,
    description: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO activity_log (id, user_id, activity_type, description, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id.to_string())
    .bind(activity_type)
    .bind(description)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_activity(
    pool: &SqlitePool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<ActivityEntry>> {
    let entries = sqlx::query_as::<_, ActivityEntry>(
        "SELECT * FROM activity_log WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(user_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}
