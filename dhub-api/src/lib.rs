//! dhub-api library - DisputeHub HTTP API service

use std::sync::Arc;

use axum::{middleware, routing::get, routing::post, Router};
use sqlx::SqlitePool;

use crate::gates::RateLimiter;
use crate::llm::LlmClient;
use crate::stripe::StripeClient;

pub mod api;
pub mod db;
pub mod error;
pub mod gates;
pub mod generator;
pub mod llm;
pub mod parser;
pub mod stripe;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// LLM client (letter generation and document parsing)
    pub llm: Arc<LlmClient>,
    /// Stripe billing client
    pub stripe: Arc<StripeClient>,
    /// Process-local rate limiter
    pub rate_limiter: Arc<RateLimiter>,
    /// Bearer token required on protected routes (empty disables auth)
    pub api_token: String,
    /// Shared secret for the billing webhook
    pub webhook_token: String,
    /// Stripe price ids, used to map webhook payloads back to plans
    pub price_diy: String,
    pub price_complete: String,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        llm: LlmClient,
        stripe: StripeClient,
        rate_limiter: RateLimiter,
        api_token: String,
        webhook_token: String,
        price_diy: String,
        price_complete: String,
    ) -> Self {
        AppState {
            db,
            llm: Arc::new(llm),
            stripe: Arc::new(stripe),
            rate_limiter: Arc::new(rate_limiter),
            api_token,
            webhook_token,
            price_diy,
            price_complete,
        }
    }
}

/// Build the application router.
///
/// `/health` and the billing webhook are public; everything else under
/// `/api` requires the bearer token.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        // Users and profiles
        .route("/api/users", post(api::users::create_user))
        .route("/api/users/:user_id", get(api::users::get_user))
        .route(
            "/api/users/:user_id/profile",
            get(api::users::get_profile).put(api::users::upsert_profile),
        )
        // Credit reports
        .route(
            "/api/users/:user_id/reports",
            post(api::reports::upload_report).get(api::reports::list_reports),
        )
        .route(
            "/api/users/:user_id/reports/:report_id/parse",
            post(api::reports::parse_report),
        )
        // Negative accounts
        .route("/api/users/:user_id/accounts", get(api::accounts::list_accounts))
        .route(
            "/api/users/:user_id/accounts/:account_id",
            get(api::accounts::get_account),
        )
        .route(
            "/api/users/:user_id/accounts/:account_id/round-status",
            get(api::letters::round_status),
        )
        .route(
            "/api/users/:user_id/locked-accounts",
            get(api::letters::locked_accounts),
        )
        // Dispute letters
        .route(
            "/api/users/:user_id/letters",
            post(api::letters::generate_letter).get(api::letters::list_letters),
        )
        .route(
            "/api/users/:user_id/letters/:letter_id",
            get(api::letters::get_letter),
        )
        .route(
            "/api/users/:user_id/letters/:letter_id/mail",
            post(api::letters::mark_mailed),
        )
        .route(
            "/api/users/:user_id/letters/:letter_id/response",
            post(api::letters::record_response),
        )
        .route(
            "/api/users/:user_id/letters/:letter_id/resolve",
            post(api::letters::resolve_letter),
        )
        // Agency clients and capacity
        .route(
            "/api/agencies/:user_id/clients",
            post(api::agency::add_client).get(api::agency::list_clients),
        )
        .route(
            "/api/agencies/:user_id/clients/:client_id",
            get(api::agency::get_client),
        )
        .route(
            "/api/agencies/:user_id/clients/:client_id/archive",
            post(api::agency::archive_client),
        )
        .route(
            "/api/agencies/:user_id/capacity",
            get(api::agency::capacity_status),
        )
        .route(
            "/api/agencies/:user_id/upgrade-recommendation",
            get(api::agency::upgrade_recommendation_status),
        )
        // Billing
        .route(
            "/api/users/:user_id/billing",
            get(api::billing::billing_status),
        )
        .route(
            "/api/users/:user_id/billing/subscribe",
            post(api::billing::subscribe),
        )
        .route(
            "/api/users/:user_id/billing/cancel",
            post(api::billing::cancel),
        )
        // Notifications, activity, scores
        .route(
            "/api/users/:user_id/notifications",
            get(api::notifications::list_notifications),
        )
        .route(
            "/api/users/:user_id/notifications/:notification_id/read",
            post(api::notifications::mark_notification_read),
        )
        .route(
            "/api/users/:user_id/activity",
            get(api::notifications::list_activity),
        )
        .route(
            "/api/users/:user_id/scores",
            get(api::notifications::score_history),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes: health check and the webhook (which has its own token)
    let public = Router::new()
        .merge(api::health_routes())
        .route("/api/billing/webhook", post(api::billing::webhook));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
