//! Dispute letter generation
//!
//! Assembles the prompt from stored account and profile data, calls the LLM,
//! and persists the resulting draft letter.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use dhub_common::db::models::{NegativeAccount, UserProfile};
use dhub_common::types::{Bureau, LetterType};
use dhub_common::Result;

use crate::db::{accounts, activity, letters, notifications, profiles};
use crate::llm::prompt::{build_letter_prompt, ConsumerInfo, LETTER_SYSTEM_PROMPT};
use crate::llm::LlmClient;

/// Token ceiling for a full letter.
const LETTER_MAX_TOKENS: u32 = 4096;

/// Severity of a detected reporting conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Critical,
    High,
    Medium,
}

/// A cross-bureau or internal reporting conflict attached to an account.
/// Stored as JSON in `negative_accounts.conflict_details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub account_name: String,
    pub conflict_type: String,
    pub severity: ConflictSeverity,
    pub description: String,
    pub fcra_violation: String,
    /// Estimated deletion probability, 0-100.
    pub deletion_probability: i64,
    pub bureaus: Vec<Bureau>,
}

/// A generated letter plus its metadata.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedLetter {
    pub letter_id: Uuid,
    pub account_id: Uuid,
    pub account_name: String,
    pub bureau: Bureau,
    pub content: String,
    pub conflicts_used: usize,
    pub estimated_success_rate: i64,
    pub round: i64,
}

/// Estimated deletion rate from the conflicts backing a letter.
///
/// Base 40 with nothing to argue; otherwise the mean deletion probability
/// plus 5 points per critical conflict (boost capped at 15), capped at 95.
pub fn estimate_success_rate(conflicts: &[Conflict]) -> i64 {
    if conflicts.is_empty() {
        return 40;
    }

    let avg: i64 = conflicts
        .iter()
        .map(|c| c.deletion_probability)
        .sum::<i64>()
        / conflicts.len() as i64;

    let critical = conflicts
        .iter()
        .filter(|c| c.severity == ConflictSeverity::Critical)
        .count() as i64;
    let boost = (critical * 5).min(15);

    (avg + boost).min(95)
}

/// Conflicts stored on an account, deserialized from its details JSON.
/// Malformed JSON is treated as no conflicts.
pub fn account_conflicts(account: &NegativeAccount) -> Vec<Conflict> {
    account
        .conflict_details
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default()
}

fn consumer_info(profile: Option<&UserProfile>, fallback_name: &str) -> ConsumerInfo {
    match profile {
        Some(p) => ConsumerInfo {
            name: p
                .full_name
                .clone()
                .unwrap_or_else(|| fallback_name.to_string()),
            current_address: p.current_address_line(),
            previous_address: p.previous_address_line(),
            date_of_birth: p.date_of_birth.clone(),
            ssn_last4: p.ssn_last4.clone(),
        },
        None => ConsumerInfo {
            name: fallback_name.to_string(),
            ..Default::default()
        },
    }
}

/// Generate a dispute letter for one account at one bureau and persist it as
/// a draft.
///
/// Callers are responsible for running the gate chain (entitlement, round
/// lock, rate limit) first; this function only builds, calls, and stores.
pub async fn generate_letter(
    pool: &SqlitePool,
    llm: &LlmClient,
    user_id: Uuid,
    account_id: Uuid,
    bureau: Bureau,
    letter_type: LetterType,
    round: i64,
) -> Result<GeneratedLetter> {
    let account = accounts::get_account(pool, user_id, account_id).await?;

    let user = crate::db::users::get_user(pool, user_id).await?;
    let profile = profiles::get_profile(pool, user_id).await?;
    let consumer = consumer_info(
        profile.as_ref(),
        user.name.as_deref().unwrap_or("The Consumer"),
    );

    let conflicts: Vec<Conflict> = account_conflicts(&account)
        .into_iter()
        .filter(|c| c.bureaus.contains(&bureau))
        .collect();

    let selected = std::slice::from_ref(&account);
    let prompt = build_letter_prompt(bureau, &consumer, selected, &conflicts, letter_type, round);
    let content = llm
        .complete(LETTER_SYSTEM_PROMPT, &prompt, LETTER_MAX_TOKENS)
        .await?;

    let letter = letters::insert_letter(
        pool,
        user_id,
        account.id,
        bureau,
        letter_type,
        round,
        &content,
    )
    .await?;

    activity::record_activity(
        pool,
        user_id,
        "letter_generated",
        &format!(
            "Generated {} dispute letter to {} for {}",
            letter_type.as_str(),
            bureau.display_name(),
            account.account_name
        ),
    )
    .await?;

    notifications::insert_notification(
        pool,
        user_id,
        dhub_common::types::NotificationType::LetterGenerated,
        "Dispute letter ready",
        &format!(
            "Your {} dispute letter is ready to review and mail.",
            bureau.display_name()
        ),
        Some(letter.id),
    )
    .await?;

    info!(%user_id, bureau = bureau.as_str(), account = %account.account_name, "letter generated");

    Ok(GeneratedLetter {
        letter_id: letter.id,
        account_id: account.id,
        account_name: account.account_name,
        bureau,
        content,
        conflicts_used: conflicts.len(),
        estimated_success_rate: estimate_success_rate(&conflicts),
        round,
    })
}

/// Generate letters for one account at every bureau that reports it.
///
/// Bureaus with no data for the account are skipped, not errors.
pub async fn generate_all_bureau_letters(
    pool: &SqlitePool,
    llm: &LlmClient,
    user_id: Uuid,
    account_id: Uuid,
    letter_type: LetterType,
    round: i64,
) -> Result<Vec<GeneratedLetter>> {
    let account = accounts::get_account(pool, user_id, account_id).await?;
    let mut generated = Vec::new();

    for bureau in Bureau::ALL {
        if !reports_to_bureau(&account, bureau) {
            continue;
        }
        generated
            .push(generate_letter(pool, llm, user_id, account_id, bureau, letter_type, round).await?);
    }

    Ok(generated)
}

/// Whether an account carries data for the given bureau. Accounts with no
/// per-bureau data at all are disputed with every bureau.
fn reports_to_bureau(account: &NegativeAccount, bureau: Bureau) -> bool {
    let field = match bureau {
        Bureau::Transunion => &account.transunion_data,
        Bureau::Equifax => &account.equifax_data,
        Bureau::Experian => &account.experian_data,
    };
    if field.is_some() {
        return true;
    }
    account.transunion_data.is_none()
        && account.equifax_data.is_none()
        && account.experian_data.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict(severity: ConflictSeverity, probability: i64) -> Conflict {
        Conflict {
            account_name: "ACME".to_string(),
            conflict_type: "balance_discrepancy".to_string(),
            severity,
            description: "test".to_string(),
            fcra_violation: "Section 1681i".to_string(),
            deletion_probability: probability,
            bureaus: vec![Bureau::Transunion],
        }
    }

    #[test]
    fn success_rate_base_is_forty() {
        assert_eq!(estimate_success_rate(&[]), 40);
    }

    #[test]
    fn success_rate_averages_and_boosts() {
        // avg 70, one critical -> +5
        let conflicts = vec![
            conflict(ConflictSeverity::Critical, 80),
            conflict(ConflictSeverity::High, 60),
        ];
        assert_eq!(estimate_success_rate(&conflicts), 75);
    }

    #[test]
    fn success_rate_boost_caps_at_fifteen() {
        // Five criticals would be +25; capped at +15. avg 60 -> 75
        let conflicts: Vec<Conflict> = (0..5)
            .map(|_| conflict(ConflictSeverity::Critical, 60))
            .collect();
        assert_eq!(estimate_success_rate(&conflicts), 75);
    }

    #[test]
    fn success_rate_caps_at_ninety_five() {
        let conflicts = vec![
            conflict(ConflictSeverity::Critical, 95),
            conflict(ConflictSeverity::Critical, 95),
            conflict(ConflictSeverity::Critical, 95),
        ];
        assert_eq!(estimate_success_rate(&conflicts), 95);
    }

    #[test]
    fn malformed_conflict_json_is_empty() {
        let now = chrono::Utc::now();
        let account = NegativeAccount {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            report_id: None,
            account_name: "X".to_string(),
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
            has_conflicts: true,
            conflict_details: Some("{not json".to_string()),
            outcome: "open".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(account_conflicts(&account).is_empty());
    }

    #[test]
    fn bureau_membership_defaults_to_all() {
        let now = chrono::Utc::now();
        let mut account = NegativeAccount {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            report_id: None,
            account_name: "X".to_string(),
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
        };
        assert!(reports_to_bureau(&account, Bureau::Transunion));
        assert!(reports_to_bureau(&account, Bureau::Equifax));

        account.experian_data = Some("{}".to_string());
        assert!(reports_to_bureau(&account, Bureau::Experian));
        assert!(!reports_to_bureau(&account, Bureau::Transunion));
    }
}
