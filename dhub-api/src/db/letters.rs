//! Dispute letter database operations
//!
//! Letters are append-only: status transitions update rows, nothing deletes
//! them. The round-lock gate reads its counts from here.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_common::db::models::DisputeLetter;
use dhub_common::pricing::ROUND_LOCK_DAYS;
use dhub_common::types::{Bureau, LetterStatus, LetterType};
use dhub_common::{Error, Result};

pub async fn insert_letter(
    pool: &SqlitePool,
    user_id: Uuid,
    account_id: Uuid,
    bureau: Bureau,
    letter_type: LetterType,
    round: i64,
    content: &str,
) -> Result<DisputeLetter> {
    let now = Utc::now();
    let letter = DisputeLetter {
        id: Uuid::new_v4(),
        user_id,
        account_id,
        bureau: bureau.as_str().to_string(),
        letter_content: content.to_string(),
        round,
        letter_type: letter_type.as_str().to_string(),
        status: LetterStatus::Draft.as_str().to_string(),
        created_at: now,
        mailed_at: None,
        tracking_number: None,
        response_deadline: None,
        response_received_at: None,
        response_details: None,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO dispute_letters (
            id, user_id, account_id, bureau, letter_content, round, letter_type,
            status, created_at, mailed_at, tracking_number, response_deadline,
            response_received_at, response_details, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(letter.id.to_string())
    .bind(letter.user_id.to_string())
    .bind(letter.account_id.to_string())
    .bind(&letter.bureau)
    .bind(&letter.letter_content)
    .bind(letter.round)
    .bind(&letter.letter_type)
    .bind(&letter.status)
    .bind(letter.created_at)
    .bind(letter.mailed_at)
    .bind(&letter.tracking_number)
    .bind(letter.response_deadline)
    .bind(letter.response_received_at)
    .bind(&letter.response_details)
    .bind(letter.updated_at)
    .execute(pool)
    .await?;

    Ok(letter)
}

pub async fn get_letter(pool: &SqlitePool, user_id: Uuid, letter_id: Uuid) -> Result<DisputeLetter> {
    sqlx::query_as::<_, DisputeLetter>(
        "SELECT * FROM dispute_letters WHERE id = ? AND user_id = ?",
    )
    .bind(letter_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("dispute letter {}", letter_id)))
}

pub async fn list_letters(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<DisputeLetter>> {
    let letters = sqlx::query_as::<_, DisputeLetter>(
        "SELECT * FROM dispute_letters WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(letters)
}

/// Number of letters in `sent` status for one account. Feeds the round cap.
pub async fn count_sent_for_account(
    pool: &SqlitePool,
    user_id: Uuid,
    account_id: Uuid,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM dispute_letters WHERE user_id = ? AND account_id = ? AND status = 'sent'",
    )
    .bind(user_id.to_string())
    .bind(account_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Most recent `mailed_at` across an account's letters, if any was ever
/// mailed. Feeds the 30-day lock window.
pub async fn last_mailed_for_account(
    pool: &SqlitePool,
    user_id: Uuid,
    account_id: Uuid,
) -> Result<Option<DateTime<Utc>>> {
    let mailed: Option<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        SELECT mailed_at FROM dispute_letters
        WHERE user_id = ? AND account_id = ? AND mailed_at IS NOT NULL
        ORDER BY mailed_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id.to_string())
    .bind(account_id.to_string())
    .fetch_optional(pool)
    .await?
    .flatten();
    Ok(mailed)
}

/// Letters created by a user since `since`. Feeds the monthly rate cap.
pub async fn count_created_since(
    pool: &SqlitePool,
    user_id: Uuid,
    since: DateTime<Utc>,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM dispute_letters WHERE user_id = ? AND created_at >= ?",
    )
    .bind(user_id.to_string())
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Mark a letter mailed: status -> sent, stamps mailed_at, and sets the
/// bureau's 30-day response deadline.
pub async fn mark_mailed(
    pool: &SqlitePool,
    user_id: Uuid,
    letter_id: Uuid,
    tracking_number: Option<&str>,
) -> Result<DisputeLetter> {
    let letter = get_letter(pool, user_id, letter_id).await?;
    if letter.status() != Some(LetterStatus::Draft) {
        return Err(Error::InvalidInput(format!(
            "letter {} is {}, only draft letters can be mailed",
            letter_id, letter.status
        )));
    }

    let mailed_at = Utc::now();
    let deadline = mailed_at + Duration::days(ROUND_LOCK_DAYS);

    sqlx::query(
        r#"
        UPDATE dispute_letters
        SET status = 'sent', mailed_at = ?, response_deadline = ?,
            tracking_number = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(mailed_at)
    .bind(deadline)
    .bind(tracking_number)
    .bind(mailed_at)
    .bind(letter_id.to_string())
    .execute(pool)
    .await?;

    get_letter(pool, user_id, letter_id).await
}

/// Record a bureau response: status -> response_received, stores the parsed
/// details JSON.
pub async fn record_response(
    pool: &SqlitePool,
    user_id: Uuid,
    letter_id: Uuid,
    details_json: &str,
) -> Result<DisputeLetter> {
    let letter = get_letter(pool, user_id, letter_id).await?;
    if letter.status() != Some(LetterStatus::Sent) {
        return Err(Error::InvalidInput(format!(
            "letter {} is {}, only sent letters can receive responses",
            letter_id, letter.status
        )));
    }

    let now = Utc::now();
    sqlx::query(
        r#"
        UPDATE dispute_letters
        SET status = 'response_received', response_received_at = ?,
            response_details = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(now)
    .bind(details_json)
    .bind(now)
    .bind(letter_id.to_string())
    .execute(pool)
    .await?;

    get_letter(pool, user_id, letter_id).await
}

/// Close out a letter once its dispute cycle is finished.
pub async fn resolve_letter(
    pool: &SqlitePool,
    user_id: Uuid,
    letter_id: Uuid,
) -> Result<DisputeLetter> {
    let letter = get_letter(pool, user_id, letter_id).await?;
    if letter.status() != Some(LetterStatus::ResponseReceived) {
        return Err(Error::InvalidInput(format!(
            "letter {} is {}, only letters with a response can be resolved",
            letter_id, letter.status
        )));
    }

    sqlx::query("UPDATE dispute_letters SET status = 'resolved', updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(letter_id.to_string())
        .execute(pool)
        .await?;

    get_letter(pool, user_id, letter_id).await
}
