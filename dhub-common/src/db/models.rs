//! Database row models
//!
//! Enum-valued columns are stored as lowercase TEXT; rows keep them as
//! `String` and expose typed accessors so a bad value surfaces as `None`
//! instead of a decode failure.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{
    AccountOutcome, AgencyPlanTier, Bureau, ClientStatus, LetterStatus, LetterType,
    SubscriptionPlan, SubscriptionStatus,
};

/// A registered user (individual consumer or agency account).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
    pub account_type: String,
    pub agency_name: Option<String>,
    pub agency_plan_tier: Option<String>,
    pub subscription_plan: String,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn plan(&self) -> SubscriptionPlan {
        SubscriptionPlan::parse(&self.subscription_plan).unwrap_or(SubscriptionPlan::Free)
    }

    pub fn is_agency(&self) -> bool {
        self.account_type == "agency"
    }

    /// Plan tier for agency accounts. Unknown or missing tiers resolve to
    /// None; capacity checks default that to starter.
    pub fn tier(&self) -> Option<AgencyPlanTier> {
        self.agency_plan_tier
            .as_deref()
            .and_then(AgencyPlanTier::parse)
    }
}

/// Personal details merged into dispute letters.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub ssn_last4: Option<String>,
    pub phone: Option<String>,
    pub current_address: Option<String>,
    pub current_city: Option<String>,
    pub current_state: Option<String>,
    pub current_zip: Option<String>,
    pub previous_address: Option<String>,
    pub previous_city: Option<String>,
    pub previous_state: Option<String>,
    pub previous_zip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// "123 Main St, Springfield, IL 62701" or None if no street is on file.
    pub fn current_address_line(&self) -> Option<String> {
        format_address(
            self.current_address.as_deref(),
            self.current_city.as_deref(),
            self.current_state.as_deref(),
            self.current_zip.as_deref(),
        )
    }

    pub fn previous_address_line(&self) -> Option<String> {
        format_address(
            self.previous_address.as_deref(),
            self.previous_city.as_deref(),
            self.previous_state.as_deref(),
            self.previous_zip.as_deref(),
        )
    }
}

fn format_address(
    street: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
    zip: Option<&str>,
) -> Option<String> {
    let street = street?;
    let mut line = street.to_string();
    if let (Some(city), Some(state)) = (city, state) {
        line.push_str(&format!(", {}, {}", city, state));
        if let Some(zip) = zip {
            line.push(' ');
            line.push_str(zip);
        }
    }
    Some(line)
}

/// An uploaded credit report.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditReport {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bureau: String,
    pub file_name: Option<String>,
    pub content: String,
    pub is_parsed: bool,
    pub credit_score: Option<i64>,
    pub score_model: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl CreditReport {
    pub fn bureau(&self) -> Option<Bureau> {
        Bureau::parse(&self.bureau)
    }
}

/// A negative trade-line extracted from a credit report.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NegativeAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub report_id: Option<Uuid>,
    pub account_name: String,
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    /// Balance in cents.
    pub balance_cents: Option<i64>,
    pub original_creditor: Option<String>,
    pub date_opened: Option<String>,
    pub last_activity: Option<String>,
    pub status: Option<String>,
    pub transunion_data: Option<String>,
    pub equifax_data: Option<String>,
    pub experian_data: Option<String>,
    pub has_conflicts: bool,
    pub conflict_details: Option<String>,
    pub outcome: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NegativeAccount {
    pub fn outcome(&self) -> AccountOutcome {
        AccountOutcome::parse(&self.outcome).unwrap_or(AccountOutcome::Open)
    }
}

/// A generated dispute letter. Rows are never deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DisputeLetter {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub bureau: String,
    pub letter_content: String,
    pub round: i64,
    pub letter_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub mailed_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub response_deadline: Option<DateTime<Utc>>,
    pub response_received_at: Option<DateTime<Utc>>,
    pub response_details: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DisputeLetter {
    pub fn status(&self) -> Option<LetterStatus> {
        LetterStatus::parse(&self.status)
    }

    pub fn letter_type(&self) -> Option<LetterType> {
        LetterType::parse(&self.letter_type)
    }

    pub fn bureau(&self) -> Option<Bureau> {
        Bureau::parse(&self.bureau)
    }
}

/// A Stripe-backed subscription.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_subscription_id: String,
    pub plan: String,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn status(&self) -> Option<SubscriptionStatus> {
        SubscriptionStatus::parse(&self.status)
    }
}

/// A client record under an agency account.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AgencyClient {
    pub id: Uuid,
    pub agency_user_id: Uuid,
    pub client_name: String,
    pub client_email: Option<String>,
    pub current_address: Option<String>,
    pub current_city: Option<String>,
    pub current_state: Option<String>,
    pub current_zip: Option<String>,
    pub status: String,
    pub letters_generated: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgencyClient {
    pub fn status(&self) -> Option<ClientStatus> {
        ClientStatus::parse(&self.status)
    }
}

/// A credit score observation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScorePoint {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bureau: String,
    pub score: i64,
    pub score_model: Option<String>,
    pub event: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// An in-app notification.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub related_letter_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// An append-only activity entry.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_line_requires_street() {
        assert_eq!(format_address(None, Some("Austin"), Some("TX"), None), None);
        assert_eq!(
            format_address(Some("1 Elm St"), Some("Austin"), Some("TX"), Some("73301")),
            Some("1 Elm St, Austin, TX 73301".to_string())
        );
        assert_eq!(
            format_address(Some("1 Elm St"), None, None, None),
            Some("1 Elm St".to_string())
        );
    }
}
