//! User profile database operations

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_common::db::models::UserProfile;
use dhub_common::Result;

/// Fields accepted on profile upsert. Everything optional; letters degrade to
/// placeholders for whatever is missing.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
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
}

pub async fn get_profile(pool: &SqlitePool, user_id: Uuid) -> Result<Option<UserProfile>> {
    let profile =
        sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_optional(pool)
            .await?;
    Ok(profile)
}

/// Insert or replace the profile for a user (one row per user).
pub async fn upsert_profile(
    pool: &SqlitePool,
    user_id: Uuid,
    update: ProfileUpdate,
) -> Result<UserProfile> {
    let now = Utc::now();
    let existing = get_profile(pool, user_id).await?;
    let (id, created_at) = match &existing {
        Some(p) => (p.id, p.created_at),
        None => (Uuid::new_v4(), now),
    };

    let profile = UserProfile {
        id,
        user_id,
        full_name: update.full_name,
        date_of_birth: update.date_of_birth,
        ssn_last4: update.ssn_last4,
        phone: update.phone,
        current_address: update.current_address,
        current_city: update.current_city,
        current_state: update.current_state,
        current_zip: update.current_zip,
        previous_address: update.previous_address,
        previous_city: update.previous_city,
        previous_state: update.previous_state,
        previous_zip: update.previous_zip,
        created_at,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO user_profiles (
            id, user_id, full_name, date_of_birth, ssn_last4, phone,
            current_address, current_city, current_state, current_zip,
            previous_address, previous_city, previous_state, previous_zip,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            full_name = excluded.full_name,
            date_of_birth = excluded.date_of_birth,
            ssn_last4 = excluded.ssn_last4,
            phone = excluded.phone,
            current_address = excluded.current_address,
            current_city = excluded.current_city,
            current_state = excluded.current_state,
            current_zip = excluded.current_zip,
            previous_address = excluded.previous_address,
            previous_city = excluded.previous_city,
            previous_state = excluded.previous_state,
            previous_zip = excluded.previous_zip,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(profile.id.to_string())
    .bind(profile.user_id.to_string())
    .bind(&profile.full_name)
    .bind(&profile.date_of_birth)
    .bind(&profile.ssn_last4)
    .bind(&profile.phone)
    .bind(&profile.current_address)
    .bind(&profile.current_city)
    .bind(&profile.current_state)
    .bind(&profile.current_zip)
    .bind(&profile.previous_address)
    .bind(&profile.previous_city)
    .bind(&profile.previous_state)
    .bind(&profile.previous_zip)
    .bind(profile.created_at)
    .bind(profile.updated_at)
    .execute(pool)
    .await?;

    Ok(profile)
}
