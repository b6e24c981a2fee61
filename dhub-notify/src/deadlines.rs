//! Deadline scanning and notification
//!
//! Finds `sent` letters whose 30-day response deadline is approaching or has
//! passed without a response, emails the user, and writes the matching
//! in-app notification. The notifications table doubles as the dedup record
//! so a daily pass never re-notifies the same letter.

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{error, info};
use uuid::Uuid;

use dhub_common::time::days_until_ceil;
use dhub_common::types::NotificationType;
use dhub_common::Result;

use crate::email::Mailer;
use crate::templates;

/// A letter whose deadline warrants a notification.
#[derive(Debug, Clone, FromRow)]
pub struct DeadlineHit {
    pub letter_id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: Option<String>,
    pub bureau: String,
    pub response_deadline: DateTime<Utc>,
}

/// Counts from one notification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub reminders_sent: usize,
    pub overdue_sent: usize,
}

/// Letters with a deadline inside `[now, now + days_ahead]` that still await
/// a response.
pub async fn find_approaching_deadlines(
    pool: &SqlitePool,
    days_ahead: i64,
    now: DateTime<Utc>,
) -> Result<Vec<DeadlineHit>> {
    let until = now + Duration::days(days_ahead);
    let hits = sqlx::query_as::<_, DeadlineHit>(
        r#"
        SELECT l.id AS letter_id, l.user_id AS user_id, u.email AS user_email,
               u.name AS user_name, l.bureau AS bureau,
               l.response_deadline AS response_deadline
        FROM dispute_letters l
        JOIN users u ON u.id = l.user_id
        WHERE l.status = 'sent'
          AND l.response_deadline IS NOT NULL
          AND l.response_deadline >= ?
          AND l.response_deadline <= ?
        ORDER BY l.response_deadline
        "#,
    )
    .bind(now)
    .bind(until)
    .fetch_all(pool)
    .await?;
    Ok(hits)
}

/// Letters whose deadline has passed with no recorded response.
pub async fn find_overdue_deadlines(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<DeadlineHit>> {
    let hits = sqlx::query_as::<_, DeadlineHit>(
        r#"
        SELECT l.id AS letter_id, l.user_id AS user_id, u.email AS user_email,
               u.name AS user_name, l.bureau AS bureau,
               l.response_deadline AS response_deadline
        FROM dispute_letters l
        JOIN users u ON u.id = l.user_id
        WHERE l.status = 'sent'
          AND l.response_deadline IS NOT NULL
          AND l.response_deadline < ?
        ORDER BY l.response_deadline
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(hits)
}

async fn already_notified(
    pool: &SqlitePool,
    letter_id: Uuid,
    kind: NotificationType,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM notifications WHERE related_letter_id = ? AND kind = ?)",
    )
    .bind(letter_id.to_string())
    .bind(kind.as_str())
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

async fn write_notification(
    pool: &SqlitePool,
    hit: &DeadlineHit,
    kind: NotificationType,
    title: &str,
    message: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (
            id, user_id, kind, title, message, related_letter_id, is_read, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(hit.user_id.to_string())
    .bind(kind.as_str())
    .bind(title)
    .bind(message)
    .bind(hit.letter_id.to_string())
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

fn display_bureau(raw: &str) -> &str {
    match raw {
        "transunion" => "TransUnion",
        "equifax" => "Equifax",
        "experian" => "Experian",
        other => other,
    }
}

/// One full notification pass. Send failures for individual letters are
/// logged and skipped so one bad address cannot stall the rest.
pub async fn run_deadline_job(
    pool: &SqlitePool,
    mailer: &Mailer,
    days_ahead: i64,
    now: DateTime<Utc>,
) -> Result<JobSummary> {
    let mut summary = JobSummary::default();

    for hit in find_approaching_deadlines(pool, days_ahead, now).await? {
        if already_notified(pool, hit.letter_id, NotificationType::DeadlineReminder).await? {
            continue;
        }

        let name = hit.user_name.as_deref().unwrap_or("there");
        let bureau = display_bureau(&hit.bureau);
        let days = days_until_ceil(now, hit.response_deadline);
        let (subject, body) = templates::deadline_reminder(name, bureau, hit.response_deadline, days);

        if let Err(e) = mailer
            .send(&hit.user_email, hit.user_name.as_deref(), &subject, &body)
            .await
        {
            error!(letter = %hit.letter_id, "reminder email failed: {}", e);
            continue;
        }

        write_notification(
            pool,
            &hit,
            NotificationType::DeadlineReminder,
            &subject,
            &format!(
                "{} must respond by {}.",
                bureau,
                hit.response_deadline.format("%B %-d, %Y")
            ),
        )
        .await?;
        summary.reminders_sent += 1;
    }

    for hit in find_overdue_deadlines(pool, now).await? {
        if already_notified(pool, hit.letter_id, NotificationType::DeadlineOverdue).await? {
            continue;
        }

        let name = hit.user_name.as_deref().unwrap_or("there");
        let bureau = display_bureau(&hit.bureau);
        let (subject, body) = templates::deadline_overdue(name, bureau, hit.response_deadline);

        if let Err(e) = mailer
            .send(&hit.user_email, hit.user_name.as_deref(), &subject, &body)
            .await
        {
            error!(letter = %hit.letter_id, "overdue email failed: {}", e);
            continue;
        }

        write_notification(
            pool,
            &hit,
            NotificationType::DeadlineOverdue,
            &subject,
            &format!(
                "{}'s deadline was {} and no response is on file. Consider escalating.",
                bureau,
                hit.response_deadline.format("%B %-d, %Y")
            ),
        )
        .await?;
        summary.overdue_sent += 1;
    }

    info!(
        reminders = summary.reminders_sent,
        overdue = summary.overdue_sent,
        "deadline pass complete"
    );
    Ok(summary)
}
