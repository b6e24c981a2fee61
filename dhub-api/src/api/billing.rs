//! Billing handlers: subscription lifecycle plus the Stripe webhook

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use dhub_common::pricing;
use dhub_common::types::{SubscriptionPlan, SubscriptionStatus};

use crate::db::{subscriptions, users};
use crate::error::{ApiError, ApiResult};
use crate::stripe::{self, CreatedSubscription, WebhookEvent};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// "diy" or "complete"
    pub plan: String,
}

/// POST /api/users/:user_id/billing/subscribe
pub async fn subscribe(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<SubscribeRequest>,
) -> ApiResult<Json<CreatedSubscription>> {
    let plan = SubscriptionPlan::parse(&request.plan)
        .filter(|p| *p != SubscriptionPlan::Free)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown plan '{}'", request.plan)))?;

    let user = users::get_user(&state.db, user_id).await?;

    let customer_id = match &user.stripe_customer_id {
        Some(id) => id.clone(),
        None => {
            let id = state
                .stripe
                .find_or_create_customer(&user.email, user.id)
                .await?;
            users::set_stripe_customer_id(&state.db, user.id, &id).await?;
            id
        }
    };

    let created = state.stripe.create_subscription(&customer_id, plan).await?;

    // The webhook confirms activation; recording the pending row now keeps
    // the dashboard coherent in the meantime.
    let now = chrono::Utc::now();
    subscriptions::upsert_subscription(
        &state.db,
        user.id,
        &created.subscription_id,
        plan,
        SubscriptionStatus::PastDue,
        now,
        now + chrono::Duration::days(30),
    )
    .await?;

    Ok(Json(created))
}

/// POST /api/users/:user_id/billing/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let subscription = subscriptions::get_by_user(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("subscription for user {}", user_id)))?;

    state
        .stripe
        .cancel_subscription(&subscription.stripe_subscription_id)
        .await?;

    subscriptions::set_status(
        &state.db,
        &subscription.stripe_subscription_id,
        SubscriptionStatus::Canceled,
    )
    .await?;
    users::set_subscription_plan(&state.db, user_id, SubscriptionPlan::Free).await?;

    Ok(Json(json!({ "canceled": true })))
}

#[derive(Debug, Serialize)]
pub struct BillingStatus {
    pub plan: String,
    /// Display price of the current plan ("$49.99").
    pub monthly_price: String,
    pub subscription: Option<dhub_common::db::models::Subscription>,
}

/// GET /api/users/:user_id/billing
pub async fn billing_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<BillingStatus>> {
    let user = users::get_user(&state.db, user_id).await?;
    let subscription = subscriptions::get_by_user(&state.db, user_id).await?;
    let plan = user.plan();
    Ok(Json(BillingStatus {
        plan: user.subscription_plan,
        monthly_price: pricing::format_cents(pricing::plan_monthly_cents(plan)),
        subscription,
    }))
}

/// POST /api/billing/webhook
///
/// Guarded by a shared-secret header rather than bearer auth: Stripe is the
/// caller, not our front end. Signature-scheme parity with Stripe's native
/// HMAC header is a deployment concern (terminate at a verifying proxy or
/// keep the endpoint token secret).
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<WebhookEvent>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.webhook_token.is_empty() {
        let provided = headers
            .get("x-webhook-token")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if provided != state.webhook_token {
            warn!("rejected webhook with bad token");
            return Err(ApiError::Unauthorized("invalid webhook token".to_string()));
        }
    }

    stripe::apply_webhook_event(&state.db, &event, &state.price_diy, &state.price_complete)
        .await?;
    Ok(Json(json!({ "received": true })))
}
