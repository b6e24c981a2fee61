//! dhub-notify - Deadline notification worker
//!
//! Daily pass over mailed dispute letters: reminds users ahead of the
//! bureau's 30-day response deadline and flags deadlines that passed with no
//! response. Runs at 09:00 local time, then every 24 hours.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Local, NaiveTime, Utc};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};

use dhub_common::db::{init_database, setting_i64};
use dhub_common::Config;
use dhub_notify::deadlines::run_deadline_job;
use dhub_notify::email::Mailer;

#[derive(Parser, Debug)]
#[command(name = "dhub-notify", about = "DisputeHub deadline notification worker")]
struct Args {
    /// Path to the config file (TOML)
    #[arg(long)]
    config: Option<String>,

    /// Override the database path
    #[arg(long)]
    database: Option<String>,

    /// Run one pass immediately and exit
    #[arg(long)]
    once: bool,
}

/// Sleep duration until the next 09:00 local time.
fn until_next_run() -> Duration {
    let now = Local::now();
    let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
    let mut next = now.date_naive().and_time(nine);
    if now.time() >= nine {
        next += ChronoDuration::days(1);
    }
    let wait = next - now.naive_local();
    wait.to_std().unwrap_or(Duration::from_secs(60))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting DisputeHub notifier (dhub-notify) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(database) = &args.database {
        config.database_path = database.into();
    }

    let pool = init_database(&config.database_path).await?;
    info!("Database ready: {}", config.database_path.display());

    let mailer = Mailer::from_config(&config)?;
    if mailer.is_enabled() {
        info!("Email active (from {})", config.email_from);
    } else {
        info!("Email disabled (no ZEPTOMAIL_API_KEY), writing in-app notifications only");
    }

    let days_ahead = setting_i64(&pool, "deadline_reminder_days_ahead", 5).await;

    if args.once {
        let summary = run_deadline_job(&pool, &mailer, days_ahead, Utc::now()).await?;
        info!(
            reminders = summary.reminders_sent,
            overdue = summary.overdue_sent,
            "single pass complete"
        );
        return Ok(());
    }

    loop {
        let wait = until_next_run();
        info!("next deadline pass in {} minute(s)", wait.as_secs() / 60);
        tokio::time::sleep(wait).await;

        if let Err(e) = run_deadline_job(&pool, &mailer, days_ahead, Utc::now()).await {
            error!("deadline pass failed: {}", e);
        }
    }
}
