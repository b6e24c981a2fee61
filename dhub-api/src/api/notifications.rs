//! Notification, activity, and score history handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use dhub_common::db::models::{ActivityEntry, Notification, ScorePoint};

use crate::db::{activity, notifications, scores};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/users/:user_id/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(
        notifications::list_notifications(&state.db, user_id).await?,
    ))
}

/// POST /api/users/:user_id/notifications/:notification_id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path((user_id, notification_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    notifications::mark_read(&state.db, user_id, notification_id).await?;
    Ok(Json(json!({ "read": true })))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/users/:user_id/activity
pub async fn list_activity(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<Vec<ActivityEntry>>> {
    let limit = query.limit.clamp(1, 500);
    Ok(Json(activity::list_activity(&state.db, user_id, limit).await?))
}

/// GET /api/users/:user_id/scores
pub async fn score_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ScorePoint>>> {
    Ok(Json(scores::score_history(&state.db, user_id).await?))
}
