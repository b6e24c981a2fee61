//! Agency client capacity gate
//!
//! An agency's plan tier bounds how many client records it may hold
//! (starter 50, professional 200, enterprise 500). The limit is computed
//! from the tier table at check time, never stored redundantly.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::error;
use uuid::Uuid;

use dhub_common::pricing::{agency_monthly_cents, client_limit, format_cents};
use dhub_common::types::AgencyPlanTier;
use dhub_common::{Error, Result};

use crate::db::{agency, users};

/// Utilization fraction at which an upgrade is suggested.
const UPGRADE_THRESHOLD: f64 = 0.80;

/// Capacity decision for an agency.
#[derive(Debug, Clone, Serialize)]
pub struct CapacityStatus {
    pub allowed: bool,
    pub current_clients: i64,
    pub limit: i64,
    pub tier: AgencyPlanTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Upgrade suggestion based on utilization.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeRecommendation {
    pub should_upgrade: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_tier: Option<AgencyPlanTier>,
    /// Display price of the suggested tier ("$997").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_tier_price: Option<String>,
    pub utilization_percent: i64,
}

/// Resolve an optional tier to its limit. Unknown or missing defaults to
/// starter.
pub fn resolve_tier(tier: Option<AgencyPlanTier>) -> AgencyPlanTier {
    tier.unwrap_or(AgencyPlanTier::Starter)
}

/// Pure capacity decision from already-loaded state.
pub fn evaluate(tier: Option<AgencyPlanTier>, current_clients: i64) -> CapacityStatus {
    let tier = resolve_tier(tier);
    let limit = client_limit(tier);
    let allowed = current_clients < limit;
    CapacityStatus {
        allowed,
        current_clients,
        limit,
        tier,
        reason: (!allowed).then(|| {
            format!(
                "Client limit reached ({} of {}). Upgrade your plan to add more clients.",
                current_clients, limit
            )
        }),
    }
}

/// Pure upgrade recommendation from already-loaded state.
pub fn evaluate_upgrade(tier: Option<AgencyPlanTier>, current_clients: i64) -> UpgradeRecommendation {
    let tier = resolve_tier(tier);
    let limit = client_limit(tier);
    let utilization = current_clients as f64 / limit as f64;
    let utilization_percent = (utilization * 100.0).round() as i64;

    if utilization >= UPGRADE_THRESHOLD {
        if let Some(next) = tier.next_tier() {
            return UpgradeRecommendation {
                should_upgrade: true,
                suggested_tier: Some(next),
                suggested_tier_price: Some(format_cents(agency_monthly_cents(next))),
                utilization_percent,
            };
        }
    }

    UpgradeRecommendation {
        should_upgrade: false,
        suggested_tier: None,
        suggested_tier_price: None,
        utilization_percent,
    }
}

/// Can this agency add one more client?
///
/// Fail-open: an unexpected lookup error logs and returns an allowed status
/// with zeroed counts rather than blocking the caller.
pub async fn can_add_client(pool: &SqlitePool, agency_user_id: Uuid) -> CapacityStatus {
    let tier = match users::get_user(pool, agency_user_id).await {
        Ok(user) => user.tier(),
        Err(Error::NotFound(_)) => None,
        Err(e) => {
            error!(%agency_user_id, "capacity user lookup failed, failing open: {}", e);
            return fail_open_status();
        }
    };

    let current = match agency::count_clients(pool, agency_user_id).await {
        Ok(count) => count,
        Err(e) => {
            error!(%agency_user_id, "capacity count failed, failing open: {}", e);
            return fail_open_status();
        }
    };

    evaluate(tier, current)
}

fn fail_open_status() -> CapacityStatus {
    CapacityStatus {
        allowed: true,
        current_clients: 0,
        limit: 0,
        tier: AgencyPlanTier::Starter,
        reason: None,
    }
}

/// Convenience wrapper that turns a denial into an error.
pub async fn enforce_capacity_limit(pool: &SqlitePool, agency_user_id: Uuid) -> Result<()> {
    let status = can_add_client(pool, agency_user_id).await;
    if !status.allowed {
        return Err(Error::LimitReached(
            status
                .reason
                .unwrap_or_else(|| "client limit reached".to_string()),
        ));
    }
    Ok(())
}

/// Upgrade recommendation for an agency's current utilization.
///
/// Fail-open: errors produce a "no recommendation" result.
pub async fn upgrade_recommendation(
    pool: &SqlitePool,
    agency_user_id: Uuid,
) -> UpgradeRecommendation {
    let tier = match users::get_user(pool, agency_user_id).await {
        Ok(user) => user.tier(),
        Err(_) => None,
    };

    let current = match agency::count_clients(pool, agency_user_id).await {
        Ok(count) => count,
        Err(e) => {
            error!(%agency_user_id, "upgrade recommendation count failed: {}", e);
            return UpgradeRecommendation {
                should_upgrade: false,
                suggested_tier: None,
                suggested_tier_price: None,
                utilization_percent: 0,
            };
        }
    };

    evaluate_upgrade(tier, current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tier_defaults_to_starter() {
        let status = evaluate(None, 0);
        assert_eq!(status.tier, AgencyPlanTier::Starter);
        assert_eq!(status.limit, 50);
        assert!(status.allowed);
    }

    #[test]
    fn starter_denies_at_fifty() {
        let status = evaluate(Some(AgencyPlanTier::Starter), 49);
        assert!(status.allowed);

        let status = evaluate(Some(AgencyPlanTier::Starter), 50);
        assert!(!status.allowed);
        assert!(status.reason.as_deref().unwrap().contains("Upgrade"));
    }

    #[test]
    fn professional_at_160_is_allowed_but_upgrade_recommended() {
        let status = evaluate(Some(AgencyPlanTier::Professional), 160);
        assert!(status.allowed);
        assert_eq!(status.limit, 200);

        // 160/200 is exactly the 80% threshold
        let rec = evaluate_upgrade(Some(AgencyPlanTier::Professional), 160);
        assert!(rec.should_upgrade);
        assert_eq!(rec.suggested_tier, Some(AgencyPlanTier::Enterprise));
        assert_eq!(rec.suggested_tier_price.as_deref(), Some("$1997"));
        assert_eq!(rec.utilization_percent, 80);
    }

    #[test]
    fn below_threshold_no_recommendation() {
        let rec = evaluate_upgrade(Some(AgencyPlanTier::Professional), 159);
        assert!(!rec.should_upgrade);
        assert!(rec.suggested_tier.is_none());
    }

    #[test]
    fn enterprise_never_recommends_an_upgrade() {
        let rec = evaluate_upgrade(Some(AgencyPlanTier::Enterprise), 499);
        assert!(!rec.should_upgrade);
        assert!(rec.suggested_tier.is_none());
        assert_eq!(rec.utilization_percent, 100);
    }

    #[test]
    fn starter_recommends_professional() {
        let rec = evaluate_upgrade(Some(AgencyPlanTier::Starter), 40);
        assert!(rec.should_upgrade);
        assert_eq!(rec.suggested_tier, Some(AgencyPlanTier::Professional));
    }

    #[tokio::test]
    async fn lookup_error_fails_open() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let status = can_add_client(&pool, uuid::Uuid::new_v4()).await;
        assert!(status.allowed);

        assert!(enforce_capacity_limit(&pool, uuid::Uuid::new_v4())
            .await
            .is_ok());
    }
}
