//! Dispute letter handlers
//!
//! Letter generation runs the full gate chain: plan entitlement, per-account
//! round lock, then the rate limiter. The IP usage record is written only
//! after generation succeeds.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use dhub_common::db::models::DisputeLetter;
use dhub_common::types::{Bureau, LetterType};

use crate::api::client_ip;
use crate::db::{activity, letters, users};
use crate::error::{ApiError, ApiResult};
use crate::gates::{check_round_lock, round_lock};
use crate::generator::{self, GeneratedLetter};
use crate::parser::response::{record_bureau_response, ResponseRecord};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateLetterRequest {
    pub account_id: Uuid,
    /// Target bureau; ignored when `all_bureaus` is set.
    pub bureau: Option<String>,
    #[serde(default)]
    pub all_bureaus: bool,
    pub letter_type: Option<String>,
}

/// POST /api/users/:user_id/letters
pub async fn generate_letter(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<GenerateLetterRequest>,
) -> ApiResult<Json<Vec<GeneratedLetter>>> {
    let user = users::get_user(&state.db, user_id).await?;

    let letter_type = match request.letter_type.as_deref() {
        Some(raw) => LetterType::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown letter type '{}'", raw)))?,
        None => LetterType::Initial,
    };

    // Gate 1: plan entitlement
    if !user.plan().can_use_letter_type(letter_type) {
        return Err(ApiError::LimitReached(format!(
            "Your {} plan does not include {} letters. Upgrade to continue.",
            user.plan().as_str(),
            letter_type.as_str()
        )));
    }

    // Gate 2: per-account round lock
    let lock = check_round_lock(&state.db, user_id, request.account_id).await;
    if !lock.can_dispute {
        return Err(ApiError::LimitReached(
            lock.reason
                .unwrap_or_else(|| "this account cannot be disputed right now".to_string()),
        ));
    }
    let round = lock.round_number + 1;

    // Gate 3: rate limiter (user monthly first, then IP daily)
    let ip = client_ip(&headers);
    let decision = state
        .rate_limiter
        .check_letter_generation(&state.db, user_id, &ip)
        .await;
    if !decision.allowed {
        return Err(ApiError::LimitReached(
            decision.reason.unwrap_or_else(|| "rate limited".to_string()),
        ));
    }

    let generated = if request.all_bureaus {
        generator::generate_all_bureau_letters(
            &state.db,
            &state.llm,
            user_id,
            request.account_id,
            letter_type,
            round,
        )
        .await?
    } else {
        let bureau_raw = request
            .bureau
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("bureau is required".to_string()))?;
        let bureau = Bureau::parse(bureau_raw)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown bureau '{}'", bureau_raw)))?;
        vec![
            generator::generate_letter(
                &state.db,
                &state.llm,
                user_id,
                request.account_id,
                bureau,
                letter_type,
                round,
            )
            .await?,
        ]
    };

    // Usage is recorded only on the success path
    state.rate_limiter.record_letter_generation(&ip);

    Ok(Json(generated))
}

/// GET /api/users/:user_id/letters
pub async fn list_letters(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<DisputeLetter>>> {
    Ok(Json(letters::list_letters(&state.db, user_id).await?))
}

/// GET /api/users/:user_id/letters/:letter_id
pub async fn get_letter(
    State(state): State<AppState>,
    Path((user_id, letter_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<DisputeLetter>> {
    Ok(Json(letters::get_letter(&state.db, user_id, letter_id).await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct MailLetterRequest {
    pub tracking_number: Option<String>,
}

/// POST /api/users/:user_id/letters/:letter_id/mail
///
/// Marks the letter sent, which starts the 30-day response window and the
/// account's round lock.
pub async fn mark_mailed(
    State(state): State<AppState>,
    Path((user_id, letter_id)): Path<(Uuid, Uuid)>,
    request: Option<Json<MailLetterRequest>>,
) -> ApiResult<Json<DisputeLetter>> {
    let tracking = request.as_ref().and_then(|r| r.tracking_number.clone());
    let letter =
        letters::mark_mailed(&state.db, user_id, letter_id, tracking.as_deref()).await?;

    activity::record_activity(
        &state.db,
        user_id,
        "letter_mailed",
        &format!(
            "Mailed dispute letter to {}",
            letter.bureau().map(|b| b.display_name()).unwrap_or("bureau")
        ),
    )
    .await?;

    Ok(Json(letter))
}

#[derive(Debug, Deserialize)]
pub struct RecordResponseRequest {
    /// Raw text of the bureau's response letter.
    pub response_text: String,
}

/// POST /api/users/:user_id/letters/:letter_id/response
///
/// Parses the bureau's response and applies the outcomes.
pub async fn record_response(
    State(state): State<AppState>,
    Path((user_id, letter_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<RecordResponseRequest>,
) -> ApiResult<Json<ResponseRecord>> {
    if request.response_text.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "response text must not be empty".to_string(),
        ));
    }

    let record = record_bureau_response(
        &state.db,
        &state.llm,
        user_id,
        letter_id,
        &request.response_text,
    )
    .await?;
    Ok(Json(record))
}

/// POST /api/users/:user_id/letters/:letter_id/resolve
pub async fn resolve_letter(
    State(state): State<AppState>,
    Path((user_id, letter_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<DisputeLetter>> {
    Ok(Json(
        letters::resolve_letter(&state.db, user_id, letter_id).await?,
    ))
}

/// GET /api/users/:user_id/accounts/:account_id/round-status
pub async fn round_status(
    State(state): State<AppState>,
    Path((user_id, account_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<round_lock::RoundLockStatus>> {
    Ok(Json(check_round_lock(&state.db, user_id, account_id).await))
}

/// GET /api/users/:user_id/locked-accounts
pub async fn locked_accounts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<round_lock::LockedAccount>>> {
    Ok(Json(round_lock::locked_accounts(&state.db, user_id).await))
}
