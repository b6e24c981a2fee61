//! Dispute round lock
//!
//! FCRA gives a bureau 30 days to investigate, so re-disputing the same
//! account inside that window wastes a round. This gate counts an account's
//! `sent` letters against the round cap and enforces the 30-day window from
//! the most recent mailing.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::error;
use uuid::Uuid;

use dhub_common::pricing::{MAX_DISPUTE_ROUNDS, ROUND_LOCK_DAYS};
use dhub_common::time::days_until_ceil;

use crate::db::letters;

/// Lock decision for one (user, account) pair.
#[derive(Debug, Clone, Serialize)]
pub struct RoundLockStatus {
    pub is_locked: bool,
    pub days_remaining: i64,
    pub unlock_date: Option<DateTime<Utc>>,
    pub round_number: i64,
    pub max_rounds: i64,
    pub can_dispute: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RoundLockStatus {
    fn unlocked(round_number: i64) -> Self {
        RoundLockStatus {
            is_locked: false,
            days_remaining: 0,
            unlock_date: None,
            round_number,
            max_rounds: MAX_DISPUTE_ROUNDS,
            can_dispute: true,
            reason: None,
        }
    }
}

/// Evaluate the lock from already-loaded state. Pure so the window boundary
/// is testable without a clock.
pub fn evaluate(
    sent_count: i64,
    last_mailed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> RoundLockStatus {
    // Round cap wins over everything, including dates
    if sent_count >= MAX_DISPUTE_ROUNDS {
        return RoundLockStatus {
            is_locked: true,
            days_remaining: 0,
            unlock_date: None,
            round_number: sent_count,
            max_rounds: MAX_DISPUTE_ROUNDS,
            can_dispute: false,
            reason: Some("maximum rounds reached".to_string()),
        };
    }

    let Some(mailed_at) = last_mailed_at else {
        // Nothing ever mailed: round 1 is open immediately
        return RoundLockStatus::unlocked(sent_count);
    };

    let unlock_date = mailed_at + Duration::days(ROUND_LOCK_DAYS);
    if now < unlock_date {
        let days_remaining = days_until_ceil(now, unlock_date);
        return RoundLockStatus {
            is_locked: true,
            days_remaining,
            unlock_date: Some(unlock_date),
            round_number: sent_count,
            max_rounds: MAX_DISPUTE_ROUNDS,
            can_dispute: false,
            reason: Some(format!(
                "locked until {}, {} day(s) remaining",
                unlock_date.format("%Y-%m-%d"),
                days_remaining
            )),
        };
    }

    let mut status = RoundLockStatus::unlocked(sent_count);
    status.unlock_date = Some(unlock_date);
    status
}

/// Load the account's letter state and evaluate the lock.
///
/// Lookup failures are swallowed: the gate logs and reports unlocked rather
/// than blocking the dispute flow on a read error.
pub async fn check_round_lock(
    pool: &SqlitePool,
    user_id: Uuid,
    account_id: Uuid,
) -> RoundLockStatus {
    let sent_count = match letters::count_sent_for_account(pool, user_id, account_id).await {
        Ok(count) => count,
        Err(e) => {
            error!(%user_id, %account_id, "round lock count failed, failing open: {}", e);
            return RoundLockStatus::unlocked(0);
        }
    };

    let last_mailed = match letters::last_mailed_for_account(pool, user_id, account_id).await {
        Ok(mailed) => mailed,
        Err(e) => {
            error!(%user_id, %account_id, "round lock lookup failed, failing open: {}", e);
            return RoundLockStatus::unlocked(sent_count);
        }
    };

    evaluate(sent_count, last_mailed, Utc::now())
}

/// Every currently locked account for a user, with its unlock countdown.
#[derive(Debug, Clone, Serialize)]
pub struct LockedAccount {
    pub account_id: Uuid,
    pub unlock_date: Option<DateTime<Utc>>,
    pub days_remaining: i64,
    pub reason: Option<String>,
}

pub async fn locked_accounts(pool: &SqlitePool, user_id: Uuid) -> Vec<LockedAccount> {
    let accounts = match crate::db::accounts::list_accounts(pool, user_id).await {
        Ok(accounts) => accounts,
        Err(e) => {
            error!(%user_id, "locked accounts listing failed: {}", e);
            return Vec::new();
        }
    };

    let mut locked = Vec::new();
    for account in accounts {
        let status = check_round_lock(pool, user_id, account.id).await;
        if status.is_locked {
            locked.push(LockedAccount {
                account_id: account.id,
                unlock_date: status.unlock_date,
                days_remaining: status.days_remaining,
                reason: status.reason,
            });
        }
    }
    locked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn no_letters_is_never_locked() {
        let status = evaluate(0, None, t0());
        assert!(!status.is_locked);
        assert!(status.can_dispute);
        assert_eq!(status.round_number, 0);
        assert_eq!(status.days_remaining, 0);
        assert!(status.unlock_date.is_none());
        assert!(status.reason.is_none());
    }

    #[test]
    fn max_rounds_blocks_regardless_of_dates() {
        // Even with a mailing far in the past, 3 sent letters is terminal
        let long_ago = t0() - Duration::days(365);
        let status = evaluate(3, Some(long_ago), t0());
        assert!(status.is_locked);
        assert!(!status.can_dispute);
        assert_eq!(status.reason.as_deref(), Some("maximum rounds reached"));
        assert!(status.unlock_date.is_none());

        // And with a fresh mailing too
        let status = evaluate(3, Some(t0()), t0());
        assert!(!status.can_dispute);

        // Counts above the cap behave the same
        let status = evaluate(7, None, t0());
        assert!(!status.can_dispute);
    }

    #[test]
    fn locked_for_entire_window() {
        let mailed = t0();
        for hours in [0i64, 1, 24, 24 * 15, 24 * 29, 24 * 30 - 1] {
            let now = mailed + Duration::hours(hours);
            let status = evaluate(1, Some(mailed), now);
            assert!(status.is_locked, "should be locked {} hours in", hours);
            assert!(!status.can_dispute);
            assert_eq!(status.unlock_date, Some(mailed + Duration::days(30)));
        }
    }

    #[test]
    fn unlocks_at_exactly_thirty_days() {
        let mailed = t0();
        let boundary = mailed + Duration::days(30);

        let status = evaluate(1, Some(mailed), boundary - Duration::seconds(1));
        assert!(status.is_locked);
        assert_eq!(status.days_remaining, 1);

        let status = evaluate(1, Some(mailed), boundary);
        assert!(!status.is_locked);
        assert!(status.can_dispute);
        assert_eq!(status.days_remaining, 0);
    }

    #[test]
    fn days_remaining_counts_down() {
        let mailed = t0();

        let status = evaluate(1, Some(mailed), mailed);
        assert_eq!(status.days_remaining, 30);

        let status = evaluate(1, Some(mailed), mailed + Duration::days(29));
        assert_eq!(status.days_remaining, 1);

        // Partial days round up
        let status = evaluate(1, Some(mailed), mailed + Duration::days(12) + Duration::hours(1));
        assert_eq!(status.days_remaining, 18);
    }

    #[test]
    fn round_number_tracks_sent_count() {
        let status = evaluate(2, Some(t0() - Duration::days(45)), t0());
        assert_eq!(status.round_number, 2);
        assert!(status.can_dispute);
        // Window already elapsed, so the computed unlock date is in the past
        assert!(status.unlock_date.is_some());
    }

    #[tokio::test]
    async fn db_lookup_error_fails_open() {
        // A pool with no schema makes every query fail
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let status = check_round_lock(&pool, Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(!status.is_locked);
        assert!(status.can_dispute);
    }
}
