//! Credit report account extraction
//!
//! Extracts negative trade-lines and the report score from uploaded report
//! text via a structured-output LLM call, then stores the accounts.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use dhub_common::db::models::NegativeAccount;
use dhub_common::types::Bureau;
use dhub_common::{Error, Result};

use crate::db::{accounts, activity, reports, scores};
use crate::llm::prompt::{build_report_parse_prompt, REPORT_PARSER_SYSTEM_PROMPT};
use crate::llm::{strip_json_fences, LlmClient};

const PARSE_MAX_TOKENS: u32 = 4096;

/// Structured output of the report parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedReport {
    #[serde(default)]
    pub credit_score: Option<i64>,
    #[serde(default)]
    pub score_model: Option<String>,
    pub accounts: Vec<ParsedReportAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedReportAccount {
    pub account_name: String,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub balance_cents: Option<i64>,
    #[serde(default)]
    pub original_creditor: Option<String>,
    #[serde(default)]
    pub date_opened: Option<String>,
    #[serde(default)]
    pub last_activity: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Parse report text into structured accounts.
pub async fn parse_report_text(
    llm: &LlmClient,
    bureau: Bureau,
    report_text: &str,
) -> Result<ParsedReport> {
    let prompt = build_report_parse_prompt(bureau, report_text);
    let raw = llm
        .complete(REPORT_PARSER_SYSTEM_PROMPT, &prompt, PARSE_MAX_TOKENS)
        .await?;

    let parsed: ParsedReport = serde_json::from_str(strip_json_fences(&raw))
        .map_err(|e| Error::External(format!("credit report parse failed: {}", e)))?;
    Ok(parsed)
}

/// Parse a stored report and persist the extracted accounts.
///
/// The bureau's raw data slot on each created account is filled so letter
/// generation can target the right bureaus later.
pub async fn parse_and_store_report(
    pool: &SqlitePool,
    llm: &LlmClient,
    user_id: Uuid,
    report_id: Uuid,
) -> Result<Vec<NegativeAccount>> {
    let report = reports::get_report(pool, user_id, report_id).await?;
    let bureau = report
        .bureau()
        .ok_or_else(|| Error::Internal(format!("report {} has invalid bureau", report_id)))?;

    let parsed = parse_report_text(llm, bureau, &report.content).await?;

    let mut created = Vec::with_capacity(parsed.accounts.len());
    for item in &parsed.accounts {
        let account = accounts::insert_account(
            pool,
            user_id,
            Some(report_id),
            accounts::NewAccount {
                account_name: item.account_name.clone(),
                account_number: item.account_number.clone(),
                account_type: item.account_type.clone(),
                balance_cents: item.balance_cents,
                original_creditor: item.original_creditor.clone(),
                date_opened: item.date_opened.clone(),
                last_activity: item.last_activity.clone(),
                status: item.status.clone(),
            },
        )
        .await?;
        set_bureau_data(pool, account.id, bureau, item).await?;
        created.push(account);
    }

    reports::mark_parsed(pool, report_id, parsed.credit_score, parsed.score_model.as_deref())
        .await?;

    if let Some(score) = parsed.credit_score {
        scores::insert_score_point(
            pool,
            user_id,
            bureau,
            score,
            parsed.score_model.as_deref(),
            Some("Report uploaded"),
        )
        .await?;
    }

    activity::record_activity(
        pool,
        user_id,
        "report_parsed",
        &format!(
            "Parsed {} report: {} negative account(s) found",
            bureau.display_name(),
            created.len()
        ),
    )
    .await?;

    info!(%user_id, %report_id, accounts = created.len(), "report parsed");
    Ok(created)
}

/// Store the bureau-specific snapshot on a freshly created account.
async fn set_bureau_data(
    pool: &SqlitePool,
    account_id: Uuid,
    bureau: Bureau,
    item: &ParsedReportAccount,
) -> Result<()> {
    let snapshot = serde_json::to_string(item)
        .map_err(|e| Error::Internal(format!("failed to serialize account snapshot: {}", e)))?;
    let column = match bureau {
        Bureau::Transunion => "transunion_data",
        Bureau::Equifax => "equifax_data",
        Bureau::Experian => "experian_data",
    };

    sqlx::query(&format!(
        "UPDATE negative_accounts SET {} = ? WHERE id = ?",
        column
    ))
    .bind(snapshot)
    .bind(account_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}
