//! dhub-api - DisputeHub HTTP API service
//!
//! Request handlers over the relational store: reports, accounts, dispute
//! letters (LLM-generated), the rule gates, agency management, and billing.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::info;

use dhub_api::gates::{RateLimiter, RateLimits};
use dhub_api::llm::LlmClient;
use dhub_api::stripe::StripeClient;
use dhub_api::{build_router, AppState};
use dhub_common::db::{init_database, setting_i64};
use dhub_common::Config;

#[derive(Parser, Debug)]
#[command(name = "dhub-api", about = "DisputeHub API service")]
struct Args {
    /// Path to the config file (TOML)
    #[arg(long)]
    config: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Override the database path
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting DisputeHub API (dhub-api) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = &args.database {
        config.database_path = database.into();
    }

    let pool = init_database(&config.database_path).await?;
    info!("Database ready: {}", config.database_path.display());

    let llm = LlmClient::from_config(&config)?;
    if llm.is_enabled() {
        info!("LLM client active (model {})", config.anthropic_model);
    } else {
        info!("LLM client disabled (no ANTHROPIC_API_KEY)");
    }

    let stripe = StripeClient::from_config(&config)?;
    if stripe.is_enabled() {
        info!("Stripe billing active");
    } else {
        info!("Stripe billing disabled (no STRIPE_SECRET_KEY)");
    }

    // Rate-limit caps come from the settings table so operators can tune
    // them without a redeploy
    let limits = RateLimits {
        letters_per_user_per_month: setting_i64(&pool, "letters_per_user_per_month", 3).await,
        letters_per_ip_per_day: setting_i64(&pool, "letters_per_ip_per_day", 5).await,
        signups_per_ip_per_hour: setting_i64(&pool, "signups_per_ip_per_hour", 10).await,
    };
    let rate_limiter = RateLimiter::new(limits);

    let state = AppState::new(
        pool,
        llm,
        stripe,
        rate_limiter,
        config.api_token.clone(),
        config.webhook_token.clone(),
        config.stripe_price_diy.clone(),
        config.stripe_price_complete.clone(),
    );

    // Hourly sweep of expired rate-limit windows
    {
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                limiter.purge_expired();
            }
        });
    }

    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("dhub-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
