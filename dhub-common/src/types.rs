//! Domain enums shared across DisputeHub services
//!
//! All enums are stored as lowercase TEXT in the database and serialized the
//! same way over the API, so each carries an `as_str`/`parse` pair alongside
//! the serde derives.

use serde::{Deserialize, Serialize};

/// One of the three major US consumer credit reporting agencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bureau {
    Transunion,
    Equifax,
    Experian,
}

impl Bureau {
    pub const ALL: [Bureau; 3] = [Bureau::Transunion, Bureau::Equifax, Bureau::Experian];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bureau::Transunion => "transunion",
            Bureau::Equifax => "equifax",
            Bureau::Experian => "experian",
        }
    }

    /// Human-facing name used in letters and emails.
    pub fn display_name(&self) -> &'static str {
        match self {
            Bureau::Transunion => "TransUnion",
            Bureau::Equifax => "Equifax",
            Bureau::Experian => "Experian",
        }
    }

    pub fn parse(s: &str) -> Option<Bureau> {
        match s.to_ascii_lowercase().as_str() {
            "transunion" => Some(Bureau::Transunion),
            "equifax" => Some(Bureau::Equifax),
            "experian" => Some(Bureau::Experian),
            _ => None,
        }
    }

    /// Consumer dispute mailing address for this bureau.
    pub fn mailing_address(&self) -> &'static str {
        match self {
            Bureau::Transunion => {
                "TransUnion LLC\nConsumer Dispute Center\nP.O. Box 2000\nChester, PA 19016-2000"
            }
            Bureau::Equifax => {
                "Equifax Information Services LLC\nP.O. Box 740256\nAtlanta, GA 30374-0256"
            }
            Bureau::Experian => "Experian\nP.O. Box 4500\nAllen, TX 75013",
        }
    }
}

/// Lifecycle of a dispute letter. Letters are never deleted; they move
/// draft -> sent -> response_received -> resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterStatus {
    Draft,
    Sent,
    ResponseReceived,
    Resolved,
}

impl LetterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterStatus::Draft => "draft",
            LetterStatus::Sent => "sent",
            LetterStatus::ResponseReceived => "response_received",
            LetterStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<LetterStatus> {
        match s {
            "draft" => Some(LetterStatus::Draft),
            "sent" => Some(LetterStatus::Sent),
            "response_received" => Some(LetterStatus::ResponseReceived),
            "resolved" => Some(LetterStatus::Resolved),
            _ => None,
        }
    }
}

/// Escalation stage of a dispute letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterType {
    Initial,
    Followup,
    Escalation,
    Cfpb,
    DebtValidation,
}

impl LetterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterType::Initial => "initial",
            LetterType::Followup => "followup",
            LetterType::Escalation => "escalation",
            LetterType::Cfpb => "cfpb",
            LetterType::DebtValidation => "debt_validation",
        }
    }

    pub fn parse(s: &str) -> Option<LetterType> {
        match s {
            "initial" => Some(LetterType::Initial),
            "followup" => Some(LetterType::Followup),
            "escalation" => Some(LetterType::Escalation),
            "cfpb" => Some(LetterType::Cfpb),
            "debt_validation" => Some(LetterType::DebtValidation),
            _ => None,
        }
    }
}

/// Consumer subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Free,
    Diy,
    Complete,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Diy => "diy",
            SubscriptionPlan::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<SubscriptionPlan> {
        match s {
            "free" => Some(SubscriptionPlan::Free),
            "diy" => Some(SubscriptionPlan::Diy),
            "complete" => Some(SubscriptionPlan::Complete),
            _ => None,
        }
    }

    /// Free accounts get preview only; paid plans can generate letters.
    pub fn can_generate_letters(&self) -> bool {
        !matches!(self, SubscriptionPlan::Free)
    }

    /// CFPB complaints and debt-validation letters require the Complete plan.
    pub fn can_use_letter_type(&self, letter_type: LetterType) -> bool {
        match letter_type {
            LetterType::Cfpb | LetterType::DebtValidation => {
                matches!(self, SubscriptionPlan::Complete)
            }
            _ => self.can_generate_letters(),
        }
    }
}

/// Billing status of a Stripe subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<SubscriptionStatus> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "canceled" => Some(SubscriptionStatus::Canceled),
            "expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }
}

/// Agency/reseller plan tier. Bounds the number of clients an agency may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgencyPlanTier {
    Starter,
    Professional,
    Enterprise,
}

impl AgencyPlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgencyPlanTier::Starter => "starter",
            AgencyPlanTier::Professional => "professional",
            AgencyPlanTier::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<AgencyPlanTier> {
        match s {
            "starter" => Some(AgencyPlanTier::Starter),
            "professional" => Some(AgencyPlanTier::Professional),
            "enterprise" => Some(AgencyPlanTier::Enterprise),
            _ => None,
        }
    }

    /// Next tier up, for upgrade recommendations. Enterprise is the top.
    pub fn next_tier(&self) -> Option<AgencyPlanTier> {
        match self {
            AgencyPlanTier::Starter => Some(AgencyPlanTier::Professional),
            AgencyPlanTier::Professional => Some(AgencyPlanTier::Enterprise),
            AgencyPlanTier::Enterprise => None,
        }
    }
}

/// Outcome of a disputed account after bureau investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountOutcome {
    Open,
    Deleted,
    Verified,
    Updated,
    Pending,
}

impl AccountOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountOutcome::Open => "open",
            AccountOutcome::Deleted => "deleted",
            AccountOutcome::Verified => "verified",
            AccountOutcome::Updated => "updated",
            AccountOutcome::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<AccountOutcome> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Some(AccountOutcome::Open),
            "deleted" => Some(AccountOutcome::Deleted),
            "verified" => Some(AccountOutcome::Verified),
            "updated" => Some(AccountOutcome::Updated),
            "pending" => Some(AccountOutcome::Pending),
            _ => None,
        }
    }
}

/// Agency client lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Active,
    Paused,
    Archived,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Paused => "paused",
            ClientStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<ClientStatus> {
        match s {
            "active" => Some(ClientStatus::Active),
            "paused" => Some(ClientStatus::Paused),
            "archived" => Some(ClientStatus::Archived),
            _ => None,
        }
    }
}

/// In-app notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DeadlineReminder,
    DeadlineOverdue,
    ResponseReceived,
    LetterGenerated,
    PaymentConfirmed,
    AccountDeleted,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::DeadlineReminder => "deadline_reminder",
            NotificationType::DeadlineOverdue => "deadline_overdue",
            NotificationType::ResponseReceived => "response_received",
            NotificationType::LetterGenerated => "letter_generated",
            NotificationType::PaymentConfirmed => "payment_confirmed",
            NotificationType::AccountDeleted => "account_deleted",
        }
    }
}
