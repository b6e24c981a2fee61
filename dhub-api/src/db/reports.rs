//! Credit report database operations

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_common::db::models::CreditReport;
use dhub_common::types::Bureau;
use dhub_common::{Error, Result};

pub async fn insert_report(
    pool: &SqlitePool,
    user_id: Uuid,
    bureau: Bureau,
    file_name: Option<&str>,
    content: &str,
) -> Result<CreditReport> {
    let report = CreditReport {
        id: Uuid::new_v4(),
        user_id,
        bureau: bureau.as_str().to_string(),
        file_name: file_name.map(|s| s.to_string()),
        content: content.to_string(),
        is_parsed: false,
        credit_score: None,
        score_model: None,
        uploaded_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO credit_reports (
            id, user_id, bureau, file_name, content, is_parsed,
            credit_score, score_model, uploaded_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.id.to_string())
    .bind(report.user_id.to_string())
    .bind(&report.bureau)
    .bind(&report.file_name)
    .bind(&report.content)
    .bind(report.is_parsed)
    .bind(report.credit_score)
    .bind(&report.score_model)
    .bind(report.uploaded_at)
    .execute(pool)
    .await?;

    Ok(report)
}

pub async fn get_report(pool: &SqlitePool, user_id: Uuid, report_id: Uuid) -> Result<CreditReport> {
    sqlx::query_as::<_, CreditReport>("SELECT * FROM credit_reports WHERE id = ? AND user_id = ?")
        .bind(report_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("credit report {}", report_id)))
}

pub async fn list_reports(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<CreditReport>> {
    let reports = sqlx::query_as::<_, CreditReport>(
        "SELECT * FROM credit_reports WHERE user_id = ? ORDER BY uploaded_at DESC",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(reports)
}

/// Record that a report has been parsed, along with any extracted score.
pub async fn mark_parsed(
    pool: &SqlitePool,
    report_id: Uuid,
    credit_score: Option<i64>,
    score_model: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE credit_reports SET is_parsed = 1, credit_score = ?, score_model = ? WHERE id = ?",
    )
    .bind(credit_score)
    .bind(score_model)
    .bind(report_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}
