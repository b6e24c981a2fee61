//! Subscription database operations

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_common::db::models::Subscription;
use dhub_common::types::{SubscriptionPlan, SubscriptionStatus};
use dhub_common::Result;

/// Insert or update the subscription row for a user (one row per user,
/// keyed by Stripe subscription id).
pub async fn upsert_subscription(
    pool: &SqlitePool,
    user_id: Uuid,
    stripe_subscription_id: &str,
    plan: SubscriptionPlan,
    status: SubscriptionStatus,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> Result<Subscription> {
    let now = Utc::now();
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO subscriptions (
            id, user_id, stripe_subscription_id, plan, status,
            current_period_start, current_period_end, canceled_at,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            stripe_subscription_id = excluded.stripe_subscription_id,
            plan = excluded.plan,
            status = excluded.status,
            current_period_start = excluded.current_period_start,
            current_period_end = excluded.current_period_end,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .bind(stripe_subscription_id)
    .bind(plan.as_str())
    .bind(status.as_str())
    .bind(period_start)
    .bind(period_end)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_by_user(pool, user_id).await?.ok_or_else(|| {
        dhub_common::Error::Internal(format!("subscription for user {} vanished after upsert", user_id))
    })
}

pub async fn get_by_user(pool: &SqlitePool, user_id: Uuid) -> Result<Option<Subscription>> {
    let sub = sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(sub)
}

pub async fn get_by_stripe_id(
    pool: &SqlitePool,
    stripe_subscription_id: &str,
) -> Result<Option<Subscription>> {
    let sub = sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE stripe_subscription_id = ?",
    )
    .bind(stripe_subscription_id)
    .fetch_optional(pool)
    .await?;
    Ok(sub)
}

pub async fn set_status(
    pool: &SqlitePool,
    stripe_subscription_id: &str,
    status: SubscriptionStatus,
) -> Result<()> {
    let now = Utc::now();
    let canceled_at = match status {
        SubscriptionStatus::Canceled => Some(now),
        _ => None,
    };

    sqlx::query(
        r#"
        UPDATE subscriptions
        SET status = ?, canceled_at = COALESCE(?, canceled_at), updated_at = ?
        WHERE stripe_subscription_id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(canceled_at)
    .bind(now)
    .bind(stripe_subscription_id)
    .execute(pool)
    .await?;
    Ok(())
}
