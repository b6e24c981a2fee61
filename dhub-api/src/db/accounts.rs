//! Negative account database operations

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_common::db::models::NegativeAccount;
use dhub_common::types::AccountOutcome;
use dhub_common::{Error, Result};

/// Fields captured when an account is extracted from a report.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub account_name: String,
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    pub balance_cents: Option<i64>,
    pub original_creditor: Option<String>,
    pub date_opened: Option<String>,
    pub last_activity: Option<String>,
    pub status: Option<String>,
}

pub async fn insert_account(
    pool: &SqlitePool,
    user_id: Uuid,
    report_id: Option<Uuid>,
    new: NewAccount,
) -> Result<NegativeAccount> {
    let now = Utc::now();
    let account = NegativeAccount {
        id: Uuid::new_v4(),
        user_id,
        report_id,
        account_name: new.account_name,
        account_number: new.account_number,
        account_type: new.account_type,
        balance_cents: new.balance_cents,
        original_creditor: new.original_creditor,
        date_opened: new.date_opened,
        last_activity: new.last_activity,
        status: new.status,
        transunion_data: None,
        equifax_data: None,
        experian_data: None,
        has_conflicts: false,
        conflict_details: None,
        outcome: AccountOutcome::Open.as_str().to_string(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO negative_accounts (
            id, user_id, report_id, account_name, account_number, account_type,
            balance_cents, original_creditor, date_opened, last_activity, status,
            transunion_data, equifax_data, experian_data,
            has_conflicts, conflict_details, outcome, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(account.id.to_string())
    .bind(account.user_id.to_string())
    .bind(account.report_id.map(|id| id.to_string()))
    .bind(&account.account_name)
    .bind(&account.account_number)
    .bind(&account.account_type)
    .bind(account.balance_cents)
    .bind(&account.original_creditor)
    .bind(&account.date_opened)
    .bind(&account.last_activity)
    .bind(&account.status)
    .bind(&account.transunion_data)
    .bind(&account.equifax_data)
    .bind(&account.experian_data)
    .bind(account.has_conflicts)
    .bind(&account.conflict_details)
    .bind(&account.outcome)
    .bind(account.created_at)
    .bind(account.updated_at)
    .execute(pool)
    .await?;

    Ok(account)
}

pub async fn get_account(
    pool: &SqlitePool,
    user_id: Uuid,
    account_id: Uuid,
) -> Result<NegativeAccount> {
    sqlx::query_as::<_, NegativeAccount>(
        "SELECT * FROM negative_accounts WHERE id = ? AND user_id = ?",
    )
    .bind(account_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("account {}", account_id)))
}

pub async fn list_accounts(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<NegativeAccount>> {
    let accounts = sqlx::query_as::<_, NegativeAccount>(
        "SELECT * FROM negative_accounts WHERE user_id = ? ORDER BY created_at",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(accounts)
}

/// Update the investigation outcome for an account (bureau response flow).
pub async fn set_outcome(
    pool: &SqlitePool,
    account_id: Uuid,
    outcome: AccountOutcome,
) -> Result<()> {
    sqlx::query("UPDATE negative_accounts SET outcome = ?, updated_at = ? WHERE id = ?")
        .bind(outcome.as_str())
        .bind(Utc::now())
        .bind(account_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Store detected cross-bureau conflicts (JSON array) on an account.
pub async fn set_conflicts(
    pool: &SqlitePool,
    account_id: Uuid,
    conflict_details: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE negative_accounts SET has_conflicts = 1, conflict_details = ?, updated_at = ? WHERE id = ?",
    )
    .bind(conflict_details)
    .bind(Utc::now())
    .bind(account_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}
