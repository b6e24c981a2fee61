//! Bearer-token authentication middleware
//!
//! Protected routes require `Authorization: Bearer <token>` matching the
//! configured API token. An empty configured token disables auth entirely
//! (development and tests).

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Empty token disables auth checking
    if state.api_token.is_empty() {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == state.api_token => Ok(next.run(request).await),
        Some(_) => {
            warn!("rejected request with invalid API token");
            Err(ApiError::Unauthorized("invalid API token".to_string()))
        }
        None => Err(ApiError::Unauthorized(
            "missing Authorization header".to_string(),
        )),
    }
}
