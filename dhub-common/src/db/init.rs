//! Database initialization
//!
//! Creates the schema on first run and keeps startup idempotent: every
//! statement is `CREATE ... IF NOT EXISTS`, and default settings are inserted
//! only when missing.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_pragmas(&pool).await?;
    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Open an in-memory database with the full schema. Test helper.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    configure_pragmas(&pool).await?;
    create_schema(&pool).await?;
    init_default_settings(&pool).await?;
    Ok(pool)
}

async fn configure_pragmas(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;
    Ok(())
}

/// Create all tables and indexes.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_users_table(pool).await?;
    create_user_profiles_table(pool).await?;
    create_credit_reports_table(pool).await?;
    create_negative_accounts_table(pool).await?;
    create_dispute_letters_table(pool).await?;
    create_subscriptions_table(pool).await?;
    create_agency_clients_table(pool).await?;
    create_score_history_table(pool).await?;
    create_notifications_table(pool).await?;
    create_activity_log_table(pool).await?;
    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT,
            role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
            account_type TEXT NOT NULL DEFAULT 'individual' CHECK (account_type IN ('individual', 'agency')),
            agency_name TEXT,
            agency_plan_tier TEXT,
            subscription_plan TEXT NOT NULL DEFAULT 'free' CHECK (subscription_plan IN ('free', 'diy', 'complete')),
            stripe_customer_id TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_user_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_profiles (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            full_name TEXT,
            date_of_birth TEXT,
            ssn_last4 TEXT CHECK (ssn_last4 IS NULL OR length(ssn_last4) = 4),
            phone TEXT,
            current_address TEXT,
            current_city TEXT,
            current_state TEXT,
            current_zip TEXT,
            previous_address TEXT,
            previous_city TEXT,
            previous_state TEXT,
            previous_zip TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_credit_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credit_reports (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            bureau TEXT NOT NULL CHECK (bureau IN ('transunion', 'equifax', 'experian')),
            file_name TEXT,
            content TEXT NOT NULL,
            is_parsed INTEGER NOT NULL DEFAULT 0,
            credit_score INTEGER CHECK (credit_score IS NULL OR (credit_score >= 300 AND credit_score <= 850)),
            score_model TEXT,
            uploaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_credit_reports_user ON credit_reports(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_negative_accounts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS negative_accounts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            report_id TEXT REFERENCES credit_reports(id) ON DELETE SET NULL,
            account_name TEXT NOT NULL,
            account_number TEXT,
            account_type TEXT,
            balance_cents INTEGER,
            original_creditor TEXT,
            date_opened TEXT,
            last_activity TEXT,
            status TEXT,
            transunion_data TEXT,
            equifax_data TEXT,
            experian_data TEXT,
            has_conflicts INTEGER NOT NULL DEFAULT 0,
            conflict_details TEXT,
            outcome TEXT NOT NULL DEFAULT 'open' CHECK (outcome IN ('open', 'deleted', 'verified', 'updated', 'pending')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_negative_accounts_user ON negative_accounts(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_dispute_letters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dispute_letters (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            account_id TEXT NOT NULL REFERENCES negative_accounts(id) ON DELETE CASCADE,
            bureau TEXT NOT NULL CHECK (bureau IN ('transunion', 'equifax', 'experian')),
            letter_content TEXT NOT NULL,
            round INTEGER NOT NULL DEFAULT 1 CHECK (round >= 1),
            letter_type TEXT NOT NULL DEFAULT 'initial'
                CHECK (letter_type IN ('initial', 'followup', 'escalation', 'cfpb', 'debt_validation')),
            status TEXT NOT NULL DEFAULT 'draft'
                CHECK (status IN ('draft', 'sent', 'response_received', 'resolved')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            mailed_at TIMESTAMP,
            tracking_number TEXT,
            response_deadline TIMESTAMP,
            response_received_at TIMESTAMP,
            response_details TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_dispute_letters_user ON dispute_letters(user_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_dispute_letters_account ON dispute_letters(account_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_dispute_letters_deadline ON dispute_letters(response_deadline)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_subscriptions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            stripe_subscription_id TEXT NOT NULL UNIQUE,
            plan TEXT NOT NULL CHECK (plan IN ('diy', 'complete')),
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'past_due', 'canceled', 'expired')),
            current_period_start TIMESTAMP NOT NULL,
            current_period_end TIMESTAMP NOT NULL,
            canceled_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_agency_clients_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agency_clients (
            id TEXT PRIMARY KEY,
            agency_user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            client_name TEXT NOT NULL,
            client_email TEXT,
            current_address TEXT,
            current_city TEXT,
            current_state TEXT,
            current_zip TEXT,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'paused', 'archived')),
            letters_generated INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_agency_clients_agency ON agency_clients(agency_user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_score_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credit_score_history (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            bureau TEXT NOT NULL CHECK (bureau IN ('transunion', 'equifax', 'experian')),
            score INTEGER NOT NULL CHECK (score >= 300 AND score <= 850),
            score_model TEXT,
            event TEXT,
            recorded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_score_history_user ON credit_score_history(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_notifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            kind TEXT NOT NULL CHECK (kind IN (
                'deadline_reminder', 'deadline_overdue', 'response_received',
                'letter_generated', 'payment_confirmed', 'account_deleted'
            )),
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            related_letter_id TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_activity_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activity_log (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            activity_type TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_activity_log_user ON activity_log(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Initialize default settings.
///
/// Missing keys are created; existing values are left alone so operator
/// changes survive restarts.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Rule-gate tunables
    ensure_setting(pool, "max_dispute_rounds", "3").await?;
    ensure_setting(pool, "round_lock_days", "30").await?;
    ensure_setting(pool, "letters_per_user_per_month", "3").await?;
    ensure_setting(pool, "letters_per_ip_per_day", "5").await?;
    ensure_setting(pool, "signups_per_ip_per_hour", "10").await?;

    // Deadline notification worker
    ensure_setting(pool, "deadline_reminder_days_ahead", "5").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE handles concurrent initialization races
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;
    Ok(())
}

/// Read an integer setting, falling back to `default` when missing or
/// unparseable.
pub async fn setting_i64(pool: &SqlitePool, key: &str, default: i64) -> i64 {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
            .ok()
            .flatten();

    value
        .flatten()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
