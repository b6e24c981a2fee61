//! Gate behavior against a real store
//!
//! The pure decision logic is unit-tested next to each gate; these tests
//! drive the async wrappers through the database layer, including the
//! letter lifecycle transitions the round lock depends on.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_api::db::{accounts, agency, letters, users};
use dhub_api::gates::{capacity, check_round_lock, round_lock};
use dhub_common::db::init_memory_database;
use dhub_common::types::{AgencyPlanTier, Bureau, LetterType};

async fn seed_user(pool: &SqlitePool) -> Uuid {
    users::create_user(pool, "gate@example.com", Some("Gate Tester"), "individual", None, None)
        .await
        .unwrap()
        .id
}

async fn seed_account(pool: &SqlitePool, user_id: Uuid) -> Uuid {
    accounts::insert_account(
        pool,
        user_id,
        None,
        accounts::NewAccount {
            account_name: "MIDLAND FUNDING".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id
}

async fn mail_letter(pool: &SqlitePool, user_id: Uuid, account_id: Uuid) -> Uuid {
    let letter = letters::insert_letter(
        pool,
        user_id,
        account_id,
        Bureau::Transunion,
        LetterType::Initial,
        1,
        "letter body",
    )
    .await
    .unwrap();
    letters::mark_mailed(pool, user_id, letter.id, None)
        .await
        .unwrap();
    letter.id
}

/// Backdate a letter's mailing so the 30-day window math can be exercised
/// without a clock.
async fn backdate_mailed(pool: &SqlitePool, letter_id: Uuid, days_ago: i64) {
    let mailed_at = Utc::now() - Duration::days(days_ago);
    sqlx::query("UPDATE dispute_letters SET mailed_at = ? WHERE id = ?")
        .bind(mailed_at)
        .bind(letter_id.to_string())
        .execute(pool)
        .await
        .unwrap();
}

// =============================================================================
// Round lock
// =============================================================================

#[tokio::test]
async fn fresh_account_is_unlocked_at_round_zero() {
    let pool = init_memory_database().await.unwrap();
    let user_id = seed_user(&pool).await;
    let account_id = seed_account(&pool, user_id).await;

    let status = check_round_lock(&pool, user_id, account_id).await;
    assert!(!status.is_locked);
    assert!(status.can_dispute);
    assert_eq!(status.round_number, 0);
    assert_eq!(status.max_rounds, 3);
}

#[tokio::test]
async fn mailing_a_letter_locks_the_account_for_thirty_days() {
    let pool = init_memory_database().await.unwrap();
    let user_id = seed_user(&pool).await;
    let account_id = seed_account(&pool, user_id).await;

    mail_letter(&pool, user_id, account_id).await;

    let status = check_round_lock(&pool, user_id, account_id).await;
    assert!(status.is_locked);
    assert!(!status.can_dispute);
    assert_eq!(status.round_number, 1);
    assert_eq!(status.days_remaining, 30);
    assert!(status.unlock_date.is_some());
}

#[tokio::test]
async fn lock_expires_after_the_window() {
    let pool = init_memory_database().await.unwrap();
    let user_id = seed_user(&pool).await;
    let account_id = seed_account(&pool, user_id).await;

    let letter_id = mail_letter(&pool, user_id, account_id).await;
    backdate_mailed(&pool, letter_id, 31).await;

    let status = check_round_lock(&pool, user_id, account_id).await;
    assert!(!status.is_locked);
    assert!(status.can_dispute);
    assert_eq!(status.round_number, 1);
}

#[tokio::test]
async fn three_sent_letters_exhaust_the_rounds() {
    let pool = init_memory_database().await.unwrap();
    let user_id = seed_user(&pool).await;
    let account_id = seed_account(&pool, user_id).await;

    for _ in 0..3 {
        let letter_id = mail_letter(&pool, user_id, account_id).await;
        // Age each mailing well past the window: only the cap should block
        backdate_mailed(&pool, letter_id, 120).await;
    }

    let status = check_round_lock(&pool, user_id, account_id).await;
    assert!(status.is_locked);
    assert!(!status.can_dispute);
    assert_eq!(status.round_number, 3);
    assert_eq!(status.reason.as_deref(), Some("maximum rounds reached"));
    assert!(status.unlock_date.is_none());
}

#[tokio::test]
async fn locks_are_per_account() {
    let pool = init_memory_database().await.unwrap();
    let user_id = seed_user(&pool).await;
    let locked_account = seed_account(&pool, user_id).await;
    let other_account = accounts::insert_account(
        &pool,
        user_id,
        None,
        accounts::NewAccount {
            account_name: "PORTFOLIO RECOVERY".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id;

    mail_letter(&pool, user_id, locked_account).await;

    assert!(check_round_lock(&pool, user_id, locked_account).await.is_locked);
    assert!(!check_round_lock(&pool, user_id, other_account).await.is_locked);

    let locked = round_lock::locked_accounts(&pool, user_id).await;
    assert_eq!(locked.len(), 1);
    assert_eq!(locked[0].account_id, locked_account);
}

#[tokio::test]
async fn recording_a_response_frees_the_round_slot() {
    let pool = init_memory_database().await.unwrap();
    let user_id = seed_user(&pool).await;
    let account_id = seed_account(&pool, user_id).await;

    let letter_id = mail_letter(&pool, user_id, account_id).await;
    backdate_mailed(&pool, letter_id, 31).await;

    // The letter leaves `sent` when its response is recorded, so it no
    // longer counts against the cap
    letters::record_response(&pool, user_id, letter_id, "{}")
        .await
        .unwrap();

    let status = check_round_lock(&pool, user_id, account_id).await;
    assert_eq!(status.round_number, 0);
    assert!(status.can_dispute);
}

// =============================================================================
// Letter lifecycle invariants the gates rely on
// =============================================================================

#[tokio::test]
async fn mailing_sets_a_thirty_day_deadline() {
    let pool = init_memory_database().await.unwrap();
    let user_id = seed_user(&pool).await;
    let account_id = seed_account(&pool, user_id).await;

    let letter = letters::insert_letter(
        &pool,
        user_id,
        account_id,
        Bureau::Equifax,
        LetterType::Initial,
        1,
        "body",
    )
    .await
    .unwrap();
    assert_eq!(letter.status, "draft");

    let mailed = letters::mark_mailed(&pool, user_id, letter.id, Some("tracking-1"))
        .await
        .unwrap();
    assert_eq!(mailed.status, "sent");
    let mailed_at = mailed.mailed_at.unwrap();
    let deadline = mailed.response_deadline.unwrap();
    assert_eq!(deadline - mailed_at, Duration::days(30));

    // Only draft letters can be mailed
    assert!(letters::mark_mailed(&pool, user_id, letter.id, None)
        .await
        .is_err());

    // Only sent letters can take a response; only responded can resolve
    let responded = letters::record_response(&pool, user_id, letter.id, "{}")
        .await
        .unwrap();
    assert_eq!(responded.status, "response_received");
    assert!(responded.response_received_at.is_some());

    let resolved = letters::resolve_letter(&pool, user_id, letter.id)
        .await
        .unwrap();
    assert_eq!(resolved.status, "resolved");

    assert!(letters::record_response(&pool, user_id, letter.id, "{}")
        .await
        .is_err());
}

// =============================================================================
// Agency capacity against the store
// =============================================================================

#[tokio::test]
async fn capacity_counts_real_clients() {
    let pool = init_memory_database().await.unwrap();
    let agency_id = users::create_user(
        &pool,
        "agency@example.com",
        None,
        "agency",
        Some("Fix My Credit LLC"),
        Some(AgencyPlanTier::Professional),
    )
    .await
    .unwrap()
    .id;

    for i in 0..160 {
        agency::insert_client(
            &pool,
            agency_id,
            agency::NewClient {
                client_name: format!("Client {}", i),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let status = capacity::can_add_client(&pool, agency_id).await;
    assert!(status.allowed);
    assert_eq!(status.current_clients, 160);
    assert_eq!(status.limit, 200);

    let rec = capacity::upgrade_recommendation(&pool, agency_id).await;
    assert!(rec.should_upgrade);
    assert_eq!(rec.suggested_tier, Some(AgencyPlanTier::Enterprise));
    assert_eq!(rec.utilization_percent, 80);
}

#[tokio::test]
async fn missing_tier_defaults_to_starter_limit() {
    let pool = init_memory_database().await.unwrap();
    let agency_id = users::create_user(
        &pool,
        "untier@example.com",
        None,
        "agency",
        Some("No Tier LLC"),
        None,
    )
    .await
    .unwrap()
    .id;

    let status = capacity::can_add_client(&pool, agency_id).await;
    assert_eq!(status.limit, 50);
    assert_eq!(status.tier, AgencyPlanTier::Starter);
}

#[tokio::test]
async fn enforce_returns_limit_reached_at_cap() {
    let pool = init_memory_database().await.unwrap();
    let agency_id = users::create_user(
        &pool,
        "full@example.com",
        None,
        "agency",
        Some("Full LLC"),
        Some(AgencyPlanTier::Starter),
    )
    .await
    .unwrap()
    .id;

    for i in 0..50 {
        agency::insert_client(
            &pool,
            agency_id,
            agency::NewClient {
                client_name: format!("Client {}", i),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let err = capacity::enforce_capacity_limit(&pool, agency_id)
        .await
        .unwrap_err();
    assert!(matches!(err, dhub_common::Error::LimitReached(_)));

    // Archiving does not free a slot; the row still exists
    let clients = agency::list_clients(&pool, agency_id).await.unwrap();
    agency::set_client_status(
        &pool,
        agency_id,
        clients[0].id,
        dhub_common::types::ClientStatus::Archived,
    )
    .await
    .unwrap();
    assert!(capacity::enforce_capacity_limit(&pool, agency_id)
        .await
        .is_err());
}
