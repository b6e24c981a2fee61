//! User database operations

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_common::db::models::User;
use dhub_common::types::{AgencyPlanTier, SubscriptionPlan};
use dhub_common::{Error, Result};

/// Insert a new user. `agency_name`/`tier` are only meaningful when
/// `account_type` is `agency`.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    name: Option<&str>,
    account_type: &str,
    agency_name: Option<&str>,
    agency_plan_tier: Option<AgencyPlanTier>,
) -> Result<User> {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: name.map(|s| s.to_string()),
        role: "user".to_string(),
        account_type: account_type.to_string(),
        agency_name: agency_name.map(|s| s.to_string()),
        agency_plan_tier: agency_plan_tier.map(|t| t.as_str().to_string()),
        subscription_plan: SubscriptionPlan::Free.as_str().to_string(),
        stripe_customer_id: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO users (
            id, email, name, role, account_type, agency_name, agency_plan_tier,
            subscription_plan, stripe_customer_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.role)
    .bind(&user.account_type)
    .bind(&user.agency_name)
    .bind(&user.agency_plan_tier)
    .bind(&user.subscription_plan)
    .bind(&user.stripe_customer_id)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await?;

    Ok(user)
}

pub async fn get_user(pool: &SqlitePool, user_id: Uuid) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Set the consumer subscription plan (billing webhook and admin paths).
pub async fn set_subscription_plan(
    pool: &SqlitePool,
    user_id: Uuid,
    plan: SubscriptionPlan,
) -> Result<()> {
    sqlx::query("UPDATE users SET subscription_plan = ?, updated_at = ? WHERE id = ?")
        .bind(plan.as_str())
        .bind(Utc::now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_stripe_customer_id(
    pool: &SqlitePool,
    user_id: Uuid,
    customer_id: &str,
) -> Result<()> {
    sqlx::query("UPDATE users SET stripe_customer_id = ?, updated_at = ? WHERE id = ?")
        .bind(customer_id)
        .bind(Utc::now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_agency_plan_tier(
    pool: &SqlitePool,
    user_id: Uuid,
    tier: AgencyPlanTier,
) -> Result<()> {
    sqlx::query("UPDATE users SET agency_plan_tier = ?, updated_at = ? WHERE id = ?")
        .bind(tier.as_str())
        .bind(Utc::now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
