//! Integration tests for dhub-api endpoints
//!
//! Runs the real router over an in-memory database with auth disabled
//! (empty token) and external clients (LLM, Stripe) in their disabled
//! variants, so everything up to the external call is exercised.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use dhub_api::gates::{RateLimiter, RateLimits};
use dhub_api::llm::LlmClient;
use dhub_api::stripe::StripeClient;
use dhub_api::{build_router, AppState};
use dhub_common::db::init_memory_database;

async fn setup_state() -> (AppState, SqlitePool) {
    let pool = init_memory_database().await.expect("schema init");
    let state = AppState::new(
        pool.clone(),
        LlmClient::Disabled,
        StripeClient::Disabled,
        RateLimiter::new(RateLimits::default()),
        String::new(), // auth disabled
        String::new(), // webhook token unset
        "price_diy_test".to_string(),
        "price_complete_test".to_string(),
    );
    (state, pool)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

async fn signup(app: &axum::Router, email: &str) -> Value {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users",
            json!({ "email": email, "name": "Test User" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

// =============================================================================
// Health and auth
// =============================================================================

#[tokio::test]
async fn health_endpoint_no_auth_required() {
    let (state, _pool) = setup_state().await;
    let app = build_router(state);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "dhub-api");
}

#[tokio::test]
async fn protected_routes_require_token_when_configured() {
    let pool = init_memory_database().await.unwrap();
    let state = AppState::new(
        pool,
        LlmClient::Disabled,
        StripeClient::Disabled,
        RateLimiter::new(RateLimits::default()),
        "secret-token".to_string(),
        String::new(),
        String::new(),
        String::new(),
    );
    let app = build_router(state);

    // No header
    let response = app
        .clone()
        .oneshot(get(&format!("/api/users/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong token
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/users/{}", Uuid::new_v4()))
        .header("authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Correct token reaches the handler (404: user does not exist)
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/users/{}", Uuid::new_v4()))
        .header("authorization", "Bearer secret-token")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Health stays public
}

// =============================================================================
// Users and profiles
// =============================================================================

#[tokio::test]
async fn signup_and_fetch_user() {
    let (state, _pool) = setup_state().await;
    let app = build_router(state);

    let user = signup(&app, "jordan@example.com").await;
    assert_eq!(user["email"], "jordan@example.com");
    assert_eq!(user["subscription_plan"], "free");

    let response = app
        .oneshot(get(&format!("/api/users/{}", user["id"].as_str().unwrap())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let (state, _pool) = setup_state().await;
    let app = build_router(state);

    signup(&app, "dupe@example.com").await;
    let response = app
        .oneshot(post_json("/api/users", json!({ "email": "dupe@example.com" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signup_rate_limited_per_ip() {
    let (state, _pool) = setup_state().await;
    let app = build_router(state);

    // Cap is 10/hour per IP
    for i in 0..10 {
        let request = Request::builder()
            .method("POST")
            .uri("/api/users")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.77")
            .body(Body::from(
                json!({ "email": format!("u{}@example.com", i) }).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "signup {} should pass", i);
    }

    let request = Request::builder()
        .method("POST")
        .uri("/api/users")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.77")
        .body(Body::from(json!({ "email": "u11@example.com" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn profile_roundtrip_and_validation() {
    let (state, _pool) = setup_state().await;
    let app = build_router(state);
    let user = signup(&app, "profile@example.com").await;
    let user_id = user["id"].as_str().unwrap();

    // Bad SSN
    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/api/users/{}/profile", user_id),
            json!({ "ssn_last4": "12a4" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Valid upsert
    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/api/users/{}/profile", user_id),
            json!({
                "full_name": "Jordan Avery",
                "ssn_last4": "1234",
                "current_address": "1 Elm St",
                "current_city": "Austin",
                "current_state": "TX",
                "current_zip": "73301"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/users/{}/profile", user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let profile = body_json(response).await;
    assert_eq!(profile["full_name"], "Jordan Avery");
}

// =============================================================================
// Reports and accounts
// =============================================================================

#[tokio::test]
async fn report_upload_and_listing() {
    let (state, _pool) = setup_state().await;
    let app = build_router(state);
    let user = signup(&app, "reports@example.com").await;
    let user_id = user["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/reports", user_id),
            json!({
                "bureau": "equifax",
                "file_name": "report.txt",
                "content": "MIDLAND FUNDING ... CHARGE OFF ..."
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["bureau"], "equifax");
    assert_eq!(report["is_parsed"], false);

    // Unknown bureau rejected
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/reports", user_id),
            json!({ "bureau": "innovis", "content": "..." }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/users/{}/reports", user_id)))
        .await
        .unwrap();
    let reports = body_json(response).await;
    assert_eq!(reports.as_array().unwrap().len(), 1);

    // Parsing needs the LLM, which is disabled here
    let response = app
        .oneshot(post_json(
            &format!(
                "/api/users/{}/reports/{}/parse",
                user_id,
                report["id"].as_str().unwrap()
            ),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// =============================================================================
// Letter generation gate chain
// =============================================================================

async fn seed_paid_user_with_account(
    app: &axum::Router,
    pool: &SqlitePool,
    email: &str,
) -> (String, String) {
    let user = signup(app, email).await;
    let user_id = user["id"].as_str().unwrap().to_string();

    sqlx::query("UPDATE users SET subscription_plan = 'diy' WHERE id = ?")
        .bind(&user_id)
        .execute(pool)
        .await
        .unwrap();

    let account = dhub_api::db::accounts::insert_account(
        pool,
        Uuid::parse_str(&user_id).unwrap(),
        None,
        dhub_api::db::accounts::NewAccount {
            account_name: "MIDLAND FUNDING".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    (user_id, account.id.to_string())
}

#[tokio::test]
async fn free_plan_cannot_generate_letters() {
    let (state, pool) = setup_state().await;
    let app = build_router(state);
    let user = signup(&app, "free@example.com").await;
    let user_id = user["id"].as_str().unwrap();

    let account = dhub_api::db::accounts::insert_account(
        &pool,
        Uuid::parse_str(user_id).unwrap(),
        None,
        dhub_api::db::accounts::NewAccount {
            account_name: "PNC BANK".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/api/users/{}/letters", user_id),
            json!({ "account_id": account.id, "bureau": "transunion" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Upgrade"));
}

#[tokio::test]
async fn paid_plan_passes_gates_but_stops_at_disabled_llm() {
    let (state, pool) = setup_state().await;
    let app = build_router(state);
    let (user_id, account_id) =
        seed_paid_user_with_account(&app, &pool, "paid@example.com").await;

    // All three gates pass; the disabled LLM is the first failure point
    let response = app
        .oneshot(post_json(
            &format!("/api/users/{}/letters", user_id),
            json!({ "account_id": account_id, "bureau": "transunion" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn cfpb_letters_require_complete_plan() {
    let (state, pool) = setup_state().await;
    let app = build_router(state);
    let (user_id, account_id) =
        seed_paid_user_with_account(&app, &pool, "diy-cfpb@example.com").await;

    let response = app
        .oneshot(post_json(
            &format!("/api/users/{}/letters", user_id),
            json!({ "account_id": account_id, "bureau": "transunion", "letter_type": "cfpb" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn round_lock_blocks_relitigating_a_fresh_dispute() {
    let (state, pool) = setup_state().await;
    let app = build_router(state);
    let (user_id, account_id) =
        seed_paid_user_with_account(&app, &pool, "locked@example.com").await;
    let uid = Uuid::parse_str(&user_id).unwrap();
    let aid = Uuid::parse_str(&account_id).unwrap();

    // Mail a letter on this account: the round lock engages for 30 days
    let letter = dhub_api::db::letters::insert_letter(
        &pool,
        uid,
        aid,
        dhub_common::types::Bureau::Transunion,
        dhub_common::types::LetterType::Initial,
        1,
        "letter body",
    )
    .await
    .unwrap();
    dhub_api::db::letters::mark_mailed(&pool, uid, letter.id, None)
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/letters", user_id),
            json!({ "account_id": account_id, "bureau": "equifax" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert!(body["error"]["message"].as_str().unwrap().contains("locked"));

    // The round-status endpoint reports the same lock
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/users/{}/accounts/{}/round-status",
            user_id, account_id
        )))
        .await
        .unwrap();
    let status = body_json(response).await;
    assert_eq!(status["is_locked"], true);
    assert_eq!(status["can_dispute"], false);
    assert_eq!(status["round_number"], 1);
    assert_eq!(status["max_rounds"], 3);
    assert_eq!(status["days_remaining"], 30);

    // And the account shows up in the locked list
    let response = app
        .oneshot(get(&format!("/api/users/{}/locked-accounts", user_id)))
        .await
        .unwrap();
    let locked = body_json(response).await;
    assert_eq!(locked.as_array().unwrap().len(), 1);
    assert_eq!(locked[0]["account_id"], account_id);
}

#[tokio::test]
async fn letter_mail_and_resolve_lifecycle() {
    let (state, pool) = setup_state().await;
    let app = build_router(state);
    let (user_id, account_id) =
        seed_paid_user_with_account(&app, &pool, "lifecycle@example.com").await;
    let uid = Uuid::parse_str(&user_id).unwrap();
    let aid = Uuid::parse_str(&account_id).unwrap();

    let letter = dhub_api::db::letters::insert_letter(
        &pool,
        uid,
        aid,
        dhub_common::types::Bureau::Experian,
        dhub_common::types::LetterType::Initial,
        1,
        "letter body",
    )
    .await
    .unwrap();

    // Mail it over the API
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/letters/{}/mail", user_id, letter.id),
            json!({ "tracking_number": "9400 1000 0000 0000 0000 00" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mailed = body_json(response).await;
    assert_eq!(mailed["status"], "sent");
    assert!(mailed["response_deadline"].is_string());

    // Mailing twice is invalid
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/letters/{}/mail", user_id, letter.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Resolving before a response is invalid
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/letters/{}/resolve", user_id, letter.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Recording a response needs the LLM (disabled here)
    let response = app
        .oneshot(post_json(
            &format!("/api/users/{}/letters/{}/response", user_id, letter.id),
            json!({ "response_text": "We have completed our investigation..." }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// =============================================================================
// Agency capacity
// =============================================================================

async fn signup_agency(app: &axum::Router, email: &str, tier: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users",
            json!({
                "email": email,
                "account_type": "agency",
                "agency_name": "Fix My Credit LLC",
                "agency_plan_tier": tier
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user = body_json(response).await;
    user["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn agency_add_client_and_capacity() {
    let (state, pool) = setup_state().await;
    let app = build_router(state);
    let agency_id = signup_agency(&app, "agency@example.com", "starter").await;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/agencies/{}/clients", agency_id),
            json!({ "client_name": "First Client" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Fill to the starter cap of 50
    let uid = Uuid::parse_str(&agency_id).unwrap();
    for i in 1..50 {
        dhub_api::db::agency::insert_client(
            &pool,
            uid,
            dhub_api::db::agency::NewClient {
                client_name: format!("Client {}", i),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let response = app
        .clone()
        .oneshot(get(&format!("/api/agencies/{}/capacity", agency_id)))
        .await
        .unwrap();
    let capacity = body_json(response).await;
    assert_eq!(capacity["current_clients"], 50);
    assert_eq!(capacity["limit"], 50);
    assert_eq!(capacity["allowed"], false);

    // Client 51 is denied
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/agencies/{}/clients", agency_id),
            json!({ "client_name": "One Too Many" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // At 100% utilization, starter recommends professional
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/agencies/{}/upgrade-recommendation",
            agency_id
        )))
        .await
        .unwrap();
    let rec = body_json(response).await;
    assert_eq!(rec["should_upgrade"], true);
    assert_eq!(rec["suggested_tier"], "professional");
}

#[tokio::test]
async fn individual_accounts_cannot_use_agency_routes() {
    let (state, _pool) = setup_state().await;
    let app = build_router(state);
    let user = signup(&app, "individual@example.com").await;

    let response = app
        .oneshot(post_json(
            &format!("/api/agencies/{}/clients", user["id"].as_str().unwrap()),
            json!({ "client_name": "Nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Billing webhook
// =============================================================================

#[tokio::test]
async fn webhook_updates_subscription_state() {
    let (state, pool) = setup_state().await;
    let app = build_router(state);
    let user = signup(&app, "payer@example.com").await;
    let user_id = user["id"].as_str().unwrap();

    sqlx::query("UPDATE users SET stripe_customer_id = 'cus_test' WHERE id = ?")
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

    let event = json!({
        "id": "evt_1",
        "type": "customer.subscription.created",
        "data": {
            "object": {
                "id": "sub_test",
                "customer": "cus_test",
                "status": "active",
                "current_period_start": 1_780_000_000i64,
                "current_period_end": 1_782_600_000i64,
                "items": { "data": [ { "price": { "id": "price_complete_test" } } ] }
            }
        }
    });

    let response = app
        .clone()
        .oneshot(post_json("/api/billing/webhook", event))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/users/{}/billing", user_id)))
        .await
        .unwrap();
    let billing = body_json(response).await;
    assert_eq!(billing["plan"], "complete");
    assert_eq!(billing["subscription"]["status"], "active");
}

#[tokio::test]
async fn webhook_token_is_enforced_when_configured() {
    let pool = init_memory_database().await.unwrap();
    let state = AppState::new(
        pool,
        LlmClient::Disabled,
        StripeClient::Disabled,
        RateLimiter::new(RateLimits::default()),
        String::new(),
        "hook-secret".to_string(),
        String::new(),
        String::new(),
    );
    let app = build_router(state);

    let event = json!({ "id": "evt_2", "type": "ping", "data": { "object": {} } });

    let response = app
        .clone()
        .oneshot(post_json("/api/billing/webhook", event.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/billing/webhook")
        .header("content-type", "application/json")
        .header("x-webhook-token", "hook-secret")
        .body(Body::from(event.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Notifications and activity
// =============================================================================

#[tokio::test]
async fn activity_and_notifications_flow() {
    let (state, pool) = setup_state().await;
    let app = build_router(state);
    let user = signup(&app, "feed@example.com").await;
    let user_id = user["id"].as_str().unwrap();
    let uid = Uuid::parse_str(user_id).unwrap();

    dhub_api::db::notifications::insert_notification(
        &pool,
        uid,
        dhub_common::types::NotificationType::LetterGenerated,
        "Dispute letter ready",
        "Your letter is ready.",
        None,
    )
    .await
    .unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/users/{}/notifications", user_id)))
        .await
        .unwrap();
    let notifications = body_json(response).await;
    assert_eq!(notifications.as_array().unwrap().len(), 1);
    assert_eq!(notifications[0]["is_read"], false);
    let notification_id = notifications[0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/notifications/{}/read", user_id, notification_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/users/{}/notifications", user_id)))
        .await
        .unwrap();
    let notifications = body_json(response).await;
    assert_eq!(notifications[0]["is_read"], true);
}
