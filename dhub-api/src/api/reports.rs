//! Credit report handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use dhub_common::db::models::{CreditReport, NegativeAccount};
use dhub_common::types::Bureau;

use crate::db::{activity, reports, users};
use crate::error::{ApiError, ApiResult};
use crate::parser::report::parse_and_store_report;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadReportRequest {
    pub bureau: String,
    pub file_name: Option<String>,
    /// Raw report text. File storage and PDF extraction happen upstream.
    pub content: String,
}

/// POST /api/users/:user_id/reports
pub async fn upload_report(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UploadReportRequest>,
) -> ApiResult<Json<CreditReport>> {
    users::get_user(&state.db, user_id).await?;

    let bureau = Bureau::parse(&request.bureau)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown bureau '{}'", request.bureau)))?;

    if request.content.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "report content must not be empty".to_string(),
        ));
    }

    let report = reports::insert_report(
        &state.db,
        user_id,
        bureau,
        request.file_name.as_deref(),
        &request.content,
    )
    .await?;

    activity::record_activity(
        &state.db,
        user_id,
        "report_uploaded",
        &format!("Uploaded {} credit report", bureau.display_name()),
    )
    .await?;

    Ok(Json(report))
}

/// GET /api/users/:user_id/reports
pub async fn list_reports(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CreditReport>>> {
    Ok(Json(reports::list_reports(&state.db, user_id).await?))
}

/// POST /api/users/:user_id/reports/:report_id/parse
///
/// Runs LLM account extraction over the stored report text.
pub async fn parse_report(
    State(state): State<AppState>,
    Path((user_id, report_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<NegativeAccount>>> {
    let created = parse_and_store_report(&state.db, &state.llm, user_id, report_id).await?;
    Ok(Json(created))
}
