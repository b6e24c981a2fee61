//! Credit score history database operations

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_common::db::models::ScorePoint;
use dhub_common::types::Bureau;
use dhub_common::Result;

pub async fn insert_score_point(
    pool: &SqlitePool,
    user_id: Uuid,
    bureau: Bureau,
    score: i64,
    score_model: Option<&str>,
    event: Option<&str>,
) -> Result<ScorePoint> {
    let point = ScorePoint {
        id: Uuid::new_v4(),
        user_id,
        bureau: bureau.as_str().to_string(),
        score,
        score_model: score_model.map(|s| s.to_string()),
        event: event.map(|s| s.to_string()),
        recorded_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO credit_score_history (
            id, user_id, bureau, score, score_model, event, recorded_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(point.id.to_string())
    .bind(point.user_id.to_string())
    .bind(&point.bureau)
    .bind(point.score)
    .bind(&point.score_model)
    .bind(&point.event)
    .bind(point.recorded_at)
    .execute(pool)
    .await?;

    Ok(point)
}

pub async fn score_history(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<ScorePoint>> {
    let points = sqlx::query_as::<_, ScorePoint>(
        "SELECT * FROM credit_score_history WHERE user_id = ? ORDER BY recorded_at",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(points)
}
