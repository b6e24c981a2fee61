//! Bureau response letter parsing
//!
//! A structured-output LLM call extracts per-account outcomes from a bureau's
//! response letter, then the results are fuzzy-matched against the user's
//! stored accounts and applied: account outcomes update, the letter moves to
//! `response_received`, and a notification plus score-history point are
//! written.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strsim::jaro_winkler;
use tracing::{info, warn};
use uuid::Uuid;

use dhub_common::db::models::NegativeAccount;
use dhub_common::types::{AccountOutcome, Bureau, NotificationType};
use dhub_common::{Error, Result};

use crate::db::{accounts, activity, letters, notifications, scores};
use crate::llm::prompt::{build_response_parse_prompt, RESPONSE_PARSER_SYSTEM_PROMPT};
use crate::llm::{strip_json_fences, LlmClient};

const PARSE_MAX_TOKENS: u32 = 2048;

/// Minimum Jaro-Winkler similarity for a name match when neither name
/// contains the other.
const NAME_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Structured output of the response-letter parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedBureauResponse {
    pub bureau: Bureau,
    pub response_date: String,
    pub accounts: Vec<ParsedAccountOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_change: Option<ScoreChange>,
    pub summary: String,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedAccountOutcome {
    pub account_name: String,
    #[serde(default)]
    pub account_number: Option<String>,
    pub outcome: AccountOutcome,
    pub details: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreChange {
    pub before: i64,
    pub after: i64,
    pub increase: i64,
}

/// One matched account with its applied outcome.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedOutcome {
    pub account_id: Uuid,
    pub account_name: String,
    pub outcome: AccountOutcome,
    pub details: String,
}

/// Result of recording a bureau response against a letter.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    pub letter_id: Uuid,
    pub parsed: ParsedBureauResponse,
    pub accounts_matched: usize,
    pub matched: Vec<MatchedOutcome>,
}

/// Parse a bureau response letter into structured outcomes.
pub async fn parse_bureau_response(
    llm: &LlmClient,
    bureau: Bureau,
    response_text: &str,
) -> Result<ParsedBureauResponse> {
    let prompt = build_response_parse_prompt(bureau, response_text);
    let raw = llm
        .complete(RESPONSE_PARSER_SYSTEM_PROMPT, &prompt, PARSE_MAX_TOKENS)
        .await?;

    let parsed: ParsedBureauResponse = serde_json::from_str(strip_json_fences(&raw))
        .map_err(|e| Error::External(format!("bureau response parse failed: {}", e)))?;
    Ok(parsed)
}

/// Match a parsed account name against stored accounts.
///
/// Case-insensitive containment either way wins first; otherwise the best
/// Jaro-Winkler score above the threshold.
pub fn match_account<'a>(
    parsed_name: &str,
    stored: &'a [NegativeAccount],
) -> Option<&'a NegativeAccount> {
    let needle = parsed_name.to_lowercase();

    if let Some(hit) = stored.iter().find(|account| {
        let name = account.account_name.to_lowercase();
        name.contains(&needle) || needle.contains(&name)
    }) {
        return Some(hit);
    }

    stored
        .iter()
        .map(|account| {
            let score = jaro_winkler(&needle, &account.account_name.to_lowercase());
            (account, score)
        })
        .filter(|(_, score)| *score >= NAME_SIMILARITY_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(account, _)| account)
}

/// Parse a response letter and apply it: updates account outcomes, moves the
/// letter to `response_received`, records a score point, and notifies.
pub async fn record_bureau_response(
    pool: &SqlitePool,
    llm: &LlmClient,
    user_id: Uuid,
    letter_id: Uuid,
    response_text: &str,
) -> Result<ResponseRecord> {
    let letter = letters::get_letter(pool, user_id, letter_id).await?;
    let bureau = letter
        .bureau()
        .ok_or_else(|| Error::Internal(format!("letter {} has invalid bureau", letter_id)))?;

    let parsed = parse_bureau_response(llm, bureau, response_text).await?;

    let stored = accounts::list_accounts(pool, user_id).await?;
    let mut matched = Vec::new();
    for outcome in &parsed.accounts {
        let Some(account) = match_account(&outcome.account_name, &stored) else {
            warn!(
                %user_id,
                name = %outcome.account_name,
                "bureau response names an account we do not hold"
            );
            continue;
        };

        accounts::set_outcome(pool, account.id, outcome.outcome).await?;
        matched.push(MatchedOutcome {
            account_id: account.id,
            account_name: account.account_name.clone(),
            outcome: outcome.outcome,
            details: outcome.details.clone(),
        });
    }

    let details_json = serde_json::to_string(&parsed)
        .map_err(|e| Error::Internal(format!("failed to serialize response details: {}", e)))?;
    letters::record_response(pool, user_id, letter_id, &details_json).await?;

    if let Some(change) = parsed.score_change {
        scores::insert_score_point(
            pool,
            user_id,
            bureau,
            change.after,
            None,
            Some(&format!("Bureau response: {}", parsed.summary)),
        )
        .await?;
    }

    let deleted = matched
        .iter()
        .filter(|m| m.outcome == AccountOutcome::Deleted)
        .count();
    if deleted > 0 {
        notifications::insert_notification(
            pool,
            user_id,
            NotificationType::AccountDeleted,
            &format!(
                "{} account{} deleted!",
                deleted,
                if deleted == 1 { "" } else { "s" }
            ),
            &format!(
                "{} removed {} negative account{} from your report.",
                bureau.display_name(),
                deleted,
                if deleted == 1 { "" } else { "s" }
            ),
            Some(letter_id),
        )
        .await?;
    }
    notifications::insert_notification(
        pool,
        user_id,
        NotificationType::ResponseReceived,
        &format!("{} responded to your dispute", bureau.display_name()),
        &parsed.summary,
        Some(letter_id),
    )
    .await?;
    activity::record_activity(
        pool,
        user_id,
        "response_recorded",
        &format!(
            "{} response recorded: {} account(s) matched, {} deleted",
            bureau.display_name(),
            matched.len(),
            deleted
        ),
    )
    .await?;

    info!(%user_id, %letter_id, matched = matched.len(), "bureau response recorded");

    Ok(ResponseRecord {
        letter_id,
        accounts_matched: matched.len(),
        matched,
        parsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(names: &[&str]) -> Vec<NegativeAccount> {
        let now = Utc::now();
        names
            .iter()
            .map(|name| NegativeAccount {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                report_id: None,
                account_name: name.to_string(),
                account_number: None,
                account_type: None,
                balance_cents: None,
                original_creditor: None,
                date_opened: None,
                last_activity: None,
                status: None,
                transunion_data: None,
                equifax_data: None,
                experian_data: None,
                has_conflicts: false,
                conflict_details: None,
                outcome: "open".to_string(),
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    #[test]
    fn containment_match_is_case_insensitive() {
        let accounts = stored(&["Midland Funding LLC", "PNC BANK"]);
        let hit = match_account("MIDLAND FUNDING", &accounts).unwrap();
        assert_eq!(hit.account_name, "Midland Funding LLC");

        // Parsed name longer than stored name
        let hit = match_account("pnc bank n.a.", &accounts).unwrap();
        assert_eq!(hit.account_name, "PNC BANK");
    }

    #[test]
    fn fuzzy_match_catches_small_variations() {
        let accounts = stored(&["PORTFOLIO RECOVERY ASSOC"]);
        let hit = match_account("PORTFOLIO RECVERY ASSOC", &accounts);
        assert!(hit.is_some());
    }

    #[test]
    fn unrelated_names_do_not_match() {
        let accounts = stored(&["PNC BANK"]);
        assert!(match_account("CAPITAL ONE", &accounts).is_none());
    }

    #[test]
    fn parsed_response_deserializes_without_score_change() {
        let raw = r#"{
            "bureau": "equifax",
            "response_date": "03/15/2026",
            "accounts": [
                {
                    "account_name": "PNC BANK",
                    "outcome": "deleted",
                    "details": "Account removed from credit report"
                },
                {
                    "account_name": "MIDLAND FUNDING",
                    "account_number": "****5678",
                    "outcome": "verified",
                    "details": "Information verified as accurate"
                }
            ],
            "summary": "1 deleted, 1 verified",
            "next_steps": ["Send a follow-up for the verified account"]
        }"#;

        let parsed: ParsedBureauResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.bureau, Bureau::Equifax);
        assert_eq!(parsed.accounts.len(), 2);
        assert_eq!(parsed.accounts[0].outcome, AccountOutcome::Deleted);
        assert!(parsed.score_change.is_none());
    }

    #[test]
    fn parsed_response_deserializes_with_score_change() {
        let raw = r#"{
            "bureau": "transunion",
            "response_date": "03/15/2026",
            "accounts": [],
            "score_change": { "before": 582, "after": 624, "increase": 42 },
            "summary": "No accounts listed",
            "next_steps": []
        }"#;

        let parsed: ParsedBureauResponse = serde_json::from_str(raw).unwrap();
        let change = parsed.score_change.unwrap();
        assert_eq!(change.after, 624);
        assert_eq!(change.increase, 42);
    }
}
