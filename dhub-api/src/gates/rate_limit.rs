//! Rate limiting for letter generation and signups
//!
//! Two kinds of caps: the per-user monthly cap is derived from persisted
//! letter rows (inserting the letter is the recording step), while per-IP
//! caps live in an in-process map. The map does not survive restarts and is
//! not shared across server instances; acceptable behind a single process.
//! A shared keyed counter with expiry is the drop-in replacement for a
//! multi-instance deployment.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::error;
use uuid::Uuid;

use dhub_common::time::{end_of_day, month_start};

use crate::db::letters;

/// Cap configuration. Defaults match the seeded settings.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub letters_per_user_per_month: i64,
    pub letters_per_ip_per_day: i64,
    pub signups_per_ip_per_hour: i64,
}

impl Default for RateLimits {
    fn default() -> Self {
        RateLimits {
            letters_per_user_per_month: 3,
            letters_per_ip_per_day: 5,
            signups_per_ip_per_hour: 10,
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Letters the user may still generate this month, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
}

impl RateLimitDecision {
    fn allowed(remaining: Option<i64>) -> Self {
        RateLimitDecision {
            allowed: true,
            reason: None,
            remaining,
        }
    }

    fn denied(reason: String, remaining: Option<i64>) -> Self {
        RateLimitDecision {
            allowed: false,
            reason: Some(reason),
            remaining,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IpWindow {
    count: i64,
    reset_at: DateTime<Utc>,
}

/// Process-local rate limiter.
pub struct RateLimiter {
    limits: RateLimits,
    letter_ips: Mutex<HashMap<String, IpWindow>>,
    signup_ips: Mutex<HashMap<String, IpWindow>>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        RateLimiter {
            limits,
            letter_ips: Mutex::new(HashMap::new()),
            signup_ips: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a user may generate another dispute letter.
    ///
    /// Order matters: the monthly user cap is checked first (its denial
    /// message upsells), then the IP daily cap. First failing check wins.
    /// DB lookup failures log and fail open.
    pub async fn check_letter_generation(
        &self,
        pool: &SqlitePool,
        user_id: Uuid,
        ip: &str,
    ) -> RateLimitDecision {
        self.check_letter_generation_at(pool, user_id, ip, Utc::now())
            .await
    }

    pub async fn check_letter_generation_at(
        &self,
        pool: &SqlitePool,
        user_id: Uuid,
        ip: &str,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let monthly_cap = self.limits.letters_per_user_per_month;

        let monthly_count =
            match letters::count_created_since(pool, user_id, month_start(now)).await {
                Ok(count) => count,
                Err(e) => {
                    error!(%user_id, "rate limit lookup failed, failing open: {}", e);
                    return RateLimitDecision::allowed(None);
                }
            };

        if monthly_count >= monthly_cap {
            return RateLimitDecision::denied(
                format!(
                    "You've reached your limit of {} dispute letters this month. \
                     Upgrade for unlimited disputes.",
                    monthly_cap
                ),
                Some(0),
            );
        }

        let ip_count = window_count(&self.letter_ips, ip, now);
        if ip_count >= self.limits.letters_per_ip_per_day {
            return RateLimitDecision::denied(
                "Too many requests from this location. Please try again tomorrow.".to_string(),
                Some(monthly_cap - monthly_count),
            );
        }

        RateLimitDecision::allowed(Some(monthly_cap - monthly_count - 1))
    }

    /// Record a successful letter generation against the caller's IP.
    ///
    /// The per-user month count needs no recording here: it is derived from
    /// the letter row the caller just inserted. Check-then-record is not
    /// atomic; the race is accepted.
    pub fn record_letter_generation(&self, ip: &str) {
        self.record_letter_generation_at(ip, Utc::now());
    }

    pub fn record_letter_generation_at(&self, ip: &str, now: DateTime<Utc>) {
        bump_window(&self.letter_ips, ip, now, end_of_day(now));
    }

    /// Check whether an IP may create another account.
    pub fn check_signup(&self, ip: &str) -> RateLimitDecision {
        self.check_signup_at(ip, Utc::now())
    }

    pub fn check_signup_at(&self, ip: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let count = window_count(&self.signup_ips, ip, now);
        if count >= self.limits.signups_per_ip_per_hour {
            return RateLimitDecision::denied(
                "Too many account creation attempts. Please try again later.".to_string(),
                None,
            );
        }
        RateLimitDecision::allowed(None)
    }

    pub fn record_signup(&self, ip: &str) {
        self.record_signup_at(ip, Utc::now());
    }

    pub fn record_signup_at(&self, ip: &str, now: DateTime<Utc>) {
        bump_window(&self.signup_ips, ip, now, now + Duration::hours(1));
    }

    /// Drop expired windows. Called periodically from a background task.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        for map in [&self.letter_ips, &self.signup_ips] {
            if let Ok(mut guard) = map.lock() {
                guard.retain(|_, window| window.reset_at > now);
            }
        }
    }

    /// Live window counts for the admin dashboard.
    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            active_letter_ips: self.letter_ips.lock().map(|m| m.len()).unwrap_or(0),
            active_signup_ips: self.signup_ips.lock().map(|m| m.len()).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStats {
    pub active_letter_ips: usize,
    pub active_signup_ips: usize,
}

/// Current count for an IP, treating an expired window as zero.
fn window_count(map: &Mutex<HashMap<String, IpWindow>>, ip: &str, now: DateTime<Utc>) -> i64 {
    let guard = match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match guard.get(ip) {
        Some(window) if window.reset_at > now => window.count,
        _ => 0,
    }
}

/// Increment an IP's window, starting a fresh one if the old expired.
fn bump_window(
    map: &Mutex<HashMap<String, IpWindow>>,
    ip: &str,
    now: DateTime<Utc>,
    reset_at: DateTime<Utc>,
) {
    let mut guard = match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match guard.get_mut(ip) {
        Some(window) if window.reset_at > now => window.count += 1,
        _ => {
            guard.insert(ip.to_string(), IpWindow { count: 1, reset_at });
        }
    }
}
