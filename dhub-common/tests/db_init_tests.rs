//! Database initialization tests

use dhub_common::db::{init_database, init_memory_database, setting_i64};

#[tokio::test]
async fn memory_database_has_all_tables() {
    let pool = init_memory_database().await.expect("init should succeed");

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in [
        "activity_log",
        "agency_clients",
        "credit_reports",
        "credit_score_history",
        "dispute_letters",
        "negative_accounts",
        "notifications",
        "settings",
        "subscriptions",
        "user_profiles",
        "users",
    ] {
        assert!(
            tables.iter().any(|t| t == expected),
            "missing table {expected}, got {tables:?}"
        );
    }
}

#[tokio::test]
async fn default_settings_are_seeded() {
    let pool = init_memory_database().await.unwrap();

    assert_eq!(setting_i64(&pool, "max_dispute_rounds", 0).await, 3);
    assert_eq!(setting_i64(&pool, "round_lock_days", 0).await, 30);
    assert_eq!(setting_i64(&pool, "letters_per_user_per_month", 0).await, 3);
    assert_eq!(setting_i64(&pool, "letters_per_ip_per_day", 0).await, 5);
    assert_eq!(setting_i64(&pool, "signups_per_ip_per_hour", 0).await, 10);
}

#[tokio::test]
async fn missing_setting_falls_back_to_default() {
    let pool = init_memory_database().await.unwrap();
    assert_eq!(setting_i64(&pool, "no_such_key", 42).await, 42);
}

#[tokio::test]
async fn operator_overrides_survive_reinit() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("UPDATE settings SET value = '5' WHERE key = 'max_dispute_rounds'")
        .execute(&pool)
        .await
        .unwrap();

    // Re-running schema creation must not clobber the override
    dhub_common::db::create_schema(&pool).await.unwrap();
    assert_eq!(setting_i64(&pool, "max_dispute_rounds", 0).await, 5);
}

#[tokio::test]
async fn file_database_initializes_and_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("dhub.db");

    let pool = init_database(&db_path).await.expect("first init");
    drop(pool);

    // Second open over the same file is idempotent
    let pool = init_database(&db_path).await.expect("reopen");
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
