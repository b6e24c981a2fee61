//! Agency client management handlers
//!
//! Adding a client is capacity-gated against the agency's plan tier.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use dhub_common::db::models::AgencyClient;
use dhub_common::types::ClientStatus;
use dhub_common::Error;

use crate::db::{activity, agency, users};
use crate::error::{ApiError, ApiResult};
use crate::gates::capacity::{
    self, can_add_client, upgrade_recommendation, CapacityStatus, UpgradeRecommendation,
};
use crate::AppState;

/// Load the user and confirm it is an agency account.
async fn require_agency(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    let user = users::get_user(&state.db, user_id).await?;
    if !user.is_agency() {
        return Err(ApiError::BadRequest(format!(
            "user {} is not an agency account",
            user_id
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct AddClientRequest {
    pub client_name: String,
    pub client_email: Option<String>,
    pub current_address: Option<String>,
    pub current_city: Option<String>,
    pub current_state: Option<String>,
    pub current_zip: Option<String>,
}

/// POST /api/agencies/:user_id/clients
pub async fn add_client(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<AddClientRequest>,
) -> ApiResult<Json<AgencyClient>> {
    require_agency(&state, user_id).await?;

    if request.client_name.trim().is_empty() {
        return Err(ApiError::BadRequest("client name is required".to_string()));
    }

    capacity::enforce_capacity_limit(&state.db, user_id)
        .await
        .map_err(|e| match e {
            Error::LimitReached(reason) => ApiError::LimitReached(reason),
            other => ApiError::Common(other),
        })?;

    let client = agency::insert_client(
        &state.db,
        user_id,
        agency::NewClient {
            client_name: request.client_name.trim().to_string(),
            client_email: request.client_email,
            current_address: request.current_address,
            current_city: request.current_city,
            current_state: request.current_state,
            current_zip: request.current_zip,
        },
    )
    .await?;

    activity::record_activity(
        &state.db,
        user_id,
        "client_added",
        &format!("Added client {}", client.client_name),
    )
    .await?;

    Ok(Json(client))
}

/// GET /api/agencies/:user_id/clients
pub async fn list_clients(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AgencyClient>>> {
    require_agency(&state, user_id).await?;
    Ok(Json(agency::list_clients(&state.db, user_id).await?))
}

/// GET /api/agencies/:user_id/clients/:client_id
pub async fn get_client(
    State(state): State<AppState>,
    Path((user_id, client_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<AgencyClient>> {
    Ok(Json(agency::get_client(&state.db, user_id, client_id).await?))
}

/// POST /api/agencies/:user_id/clients/:client_id/archive
pub async fn archive_client(
    State(state): State<AppState>,
    Path((user_id, client_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<AgencyClient>> {
    agency::set_client_status(&state.db, user_id, client_id, ClientStatus::Archived).await?;
    Ok(Json(agency::get_client(&state.db, user_id, client_id).await?))
}

/// GET /api/agencies/:user_id/capacity
pub async fn capacity_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<CapacityStatus>> {
    require_agency(&state, user_id).await?;
    Ok(Json(can_add_client(&state.db, user_id).await))
}

/// GET /api/agencies/:user_id/upgrade-recommendation
pub async fn upgrade_recommendation_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<UpgradeRecommendation>> {
    require_agency(&state, user_id).await?;
    Ok(Json(upgrade_recommendation(&state.db, user_id).await))
}
