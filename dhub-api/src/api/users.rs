//! User and profile handlers

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use dhub_common::db::models::{User, UserProfile};
use dhub_common::types::AgencyPlanTier;

use crate::api::client_ip;
use crate::db::{profiles, users};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub name: Option<String>,
    /// "individual" (default) or "agency"
    #[serde(default)]
    pub account_type: Option<String>,
    pub agency_name: Option<String>,
    pub agency_plan_tier: Option<String>,
}

/// POST /api/users
///
/// Signup is rate-limited per IP.
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SignupRequest>,
) -> ApiResult<Json<User>> {
    let ip = client_ip(&headers);
    let decision = state.rate_limiter.check_signup(&ip);
    if !decision.allowed {
        return Err(ApiError::LimitReached(
            decision.reason.unwrap_or_else(|| "rate limited".to_string()),
        ));
    }

    if request.email.trim().is_empty() || !request.email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }

    let account_type = match request.account_type.as_deref() {
        None | Some("individual") => "individual",
        Some("agency") => "agency",
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "unknown account type '{}'",
                other
            )))
        }
    };

    let tier = match request.agency_plan_tier.as_deref() {
        Some(raw) => Some(AgencyPlanTier::parse(raw).ok_or_else(|| {
            ApiError::BadRequest(format!("unknown agency plan tier '{}'", raw))
        })?),
        None => None,
    };

    if users::get_user_by_email(&state.db, &request.email)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest(
            "an account with this email already exists".to_string(),
        ));
    }

    let user = users::create_user(
        &state.db,
        request.email.trim(),
        request.name.as_deref(),
        account_type,
        request.agency_name.as_deref(),
        tier,
    )
    .await?;

    state.rate_limiter.record_signup(&ip);
    Ok(Json(user))
}

/// GET /api/users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(users::get_user(&state.db, user_id).await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct ProfileRequest {
    pub full_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub ssn_last4: Option<String>,
    pub phone: Option<String>,
    pub current_address: Option<String>,
    pub current_city: Option<String>,
    pub current_state: Option<String>,
    pub current_zip: Option<String>,
    pub previous_address: Option<String>,
    pub previous_city: Option<String>,
    pub previous_state: Option<String>,
    pub previous_zip: Option<String>,
}

/// PUT /api/users/:user_id/profile
pub async fn upsert_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<ProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    // Ensure the user exists before writing a profile
    users::get_user(&state.db, user_id).await?;

    if let Some(last4) = &request.ssn_last4 {
        if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::BadRequest(
                "ssn_last4 must be exactly 4 digits".to_string(),
            ));
        }
    }

    let profile = profiles::upsert_profile(
        &state.db,
        user_id,
        crate::db::profiles::ProfileUpdate {
            full_name: request.full_name,
            date_of_birth: request.date_of_birth,
            ssn_last4: request.ssn_last4,
            phone: request.phone,
            current_address: request.current_address,
            current_city: request.current_city,
            current_state: request.current_state,
            current_zip: request.current_zip,
            previous_address: request.previous_address,
            previous_city: request.previous_city,
            previous_state: request.previous_state,
            previous_zip: request.previous_zip,
        },
    )
    .await?;
    Ok(Json(profile))
}

/// GET /api/users/:user_id/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    profiles::get_profile(&state.db, user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("profile for user {}", user_id)))
}
