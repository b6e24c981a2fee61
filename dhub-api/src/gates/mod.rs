//! Policy gates evaluated before gated actions
//!
//! Each gate is a plain function returning a decision record. Decision
//! making is pure; the async wrappers load state and fail open on lookup
//! errors.

pub mod capacity;
pub mod rate_limit;
pub mod round_lock;

pub use capacity::{can_add_client, enforce_capacity_limit, upgrade_recommendation, CapacityStatus};
pub use rate_limit::{RateLimitDecision, RateLimiter, RateLimits};
pub use round_lock::{check_round_lock, locked_accounts, RoundLockStatus};
