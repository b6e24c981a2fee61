//! Negative account handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use dhub_common::db::models::NegativeAccount;

use crate::db::accounts;
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/users/:user_id/accounts
pub async fn list_accounts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<NegativeAccount>>> {
    Ok(Json(accounts::list_accounts(&state.db, user_id).await?))
}

/// GET /api/users/:user_id/accounts/:account_id
pub async fn get_account(
    State(state): State<AppState>,
    Path((user_id, account_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<NegativeAccount>> {
    Ok(Json(
        accounts::get_account(&state.db, user_id, account_id).await?,
    ))
}
