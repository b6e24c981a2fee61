//! Stripe billing client and webhook event handling
//!
//! Talks to the Stripe REST API directly over `reqwest` (form-encoded, Bearer
//! auth). Only the subscription lifecycle surface the product needs: customer
//! lookup/creation, subscription create/cancel, and webhook event
//! application.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use dhub_common::types::{NotificationType, SubscriptionPlan, SubscriptionStatus};
use dhub_common::{Config, Error, Result};

use crate::db::{notifications, subscriptions, users};

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe API client, or disabled when no secret key is configured.
pub enum StripeClient {
    Active(StripeApi),
    Disabled,
}

pub struct StripeApi {
    http: Client,
    secret_key: String,
    price_diy: String,
    price_complete: String,
}

/// Result of creating a subscription: the id plus the payment-intent client
/// secret the front end needs to confirm payment.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedSubscription {
    pub subscription_id: String,
    pub customer_id: String,
    pub client_secret: Option<String>,
}

impl StripeClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.stripe_secret_key {
            Some(key) if !key.is_empty() => {
                let http = Client::builder()
                    .timeout(DEFAULT_TIMEOUT)
                    .build()
                    .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
                Ok(StripeClient::Active(StripeApi {
                    http,
                    secret_key: key.clone(),
                    price_diy: config.stripe_price_diy.clone(),
                    price_complete: config.stripe_price_complete.clone(),
                }))
            }
            _ => Ok(StripeClient::Disabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, StripeClient::Active(_))
    }

    fn api(&self) -> Result<&StripeApi> {
        match self {
            StripeClient::Active(api) => Ok(api),
            StripeClient::Disabled => Err(Error::External(
                "billing not configured (set STRIPE_SECRET_KEY)".to_string(),
            )),
        }
    }

    /// Find an existing customer by email or create one tagged with our user
    /// id.
    pub async fn find_or_create_customer(&self, email: &str, user_id: Uuid) -> Result<String> {
        let api = self.api()?;

        let existing: Value = api
            .get("/customers", &[("email", email), ("limit", "1")])
            .await?;
        if let Some(id) = existing
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|c| c.get("id"))
            .and_then(|id| id.as_str())
        {
            return Ok(id.to_string());
        }

        let user_id = user_id.to_string();
        let created: Value = api
            .post(
                "/customers",
                &[("email", email), ("metadata[user_id]", user_id.as_str())],
            )
            .await?;
        string_field(&created, "id")
    }

    /// Create a subscription on the plan's configured price.
    pub async fn create_subscription(
        &self,
        customer_id: &str,
        plan: SubscriptionPlan,
    ) -> Result<CreatedSubscription> {
        let api = self.api()?;
        let price = api.price_for_plan(plan)?;

        let created: Value = api
            .post(
                "/subscriptions",
                &[
                    ("customer", customer_id),
                    ("items[0][price]", price),
                    ("payment_behavior", "default_incomplete"),
                    ("payment_settings[save_default_payment_method]", "on_subscription"),
                    ("expand[]", "latest_invoice.payment_intent"),
                ],
            )
            .await?;

        let client_secret = created
            .pointer("/latest_invoice/payment_intent/client_secret")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(CreatedSubscription {
            subscription_id: string_field(&created, "id")?,
            customer_id: customer_id.to_string(),
            client_secret,
        })
    }

    /// Cancel a subscription immediately.
    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<()> {
        let api = self.api()?;
        let _: Value = api
            .delete(&format!("/subscriptions/{}", subscription_id))
            .await?;
        Ok(())
    }
}

impl StripeApi {
    fn price_for_plan(&self, plan: SubscriptionPlan) -> Result<&str> {
        let price = match plan {
            SubscriptionPlan::Diy => self.price_diy.as_str(),
            SubscriptionPlan::Complete => self.price_complete.as_str(),
            SubscriptionPlan::Free => {
                return Err(Error::InvalidInput(
                    "the free plan has no Stripe price".to_string(),
                ))
            }
        };
        if price.is_empty() {
            return Err(Error::Config(format!(
                "no Stripe price configured for plan {}",
                plan.as_str()
            )));
        }
        Ok(price)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}{}", STRIPE_API_URL, path))
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::External(format!("Stripe request failed: {}", e)))?;
        Self::read_json(response).await
    }

    async fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}{}", STRIPE_API_URL, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::External(format!("Stripe request failed: {}", e)))?;
        Self::read_json(response).await
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        let response = self
            .http
            .delete(format!("{}{}", STRIPE_API_URL, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| Error::External(format!("Stripe request failed: {}", e)))?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::External(format!("Stripe response parse failed: {}", e)))?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(Error::External(format!(
                "Stripe API returned {}: {}",
                status, message
            )));
        }
        Ok(body)
    }
}

fn string_field(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::External(format!("Stripe response missing '{}'", field)))
}

// ---------------------------------------------------------------------------
// Webhook events
// ---------------------------------------------------------------------------

/// The subset of a Stripe webhook event we act on.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: Value,
}

/// Subscription state pulled out of a webhook payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState {
    pub subscription_id: String,
    pub customer_id: String,
    pub status: SubscriptionStatus,
    pub plan: Option<SubscriptionPlan>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// Map a Stripe subscription status string onto ours.
fn map_status(stripe_status: &str) -> SubscriptionStatus {
    match stripe_status {
        "active" | "trialing" => SubscriptionStatus::Active,
        "past_due" | "unpaid" | "incomplete" => SubscriptionStatus::PastDue,
        "canceled" | "incomplete_expired" => SubscriptionStatus::Canceled,
        _ => SubscriptionStatus::Expired,
    }
}

/// Extract subscription state from a `customer.subscription.*` event object.
pub fn subscription_state(
    object: &Value,
    price_diy: &str,
    price_complete: &str,
) -> Result<SubscriptionState> {
    let subscription_id = string_field(object, "id")?;
    let customer_id = object
        .get("customer")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::External("subscription event missing customer".to_string()))?;

    let status = object
        .get("status")
        .and_then(|s| s.as_str())
        .map(map_status)
        .unwrap_or(SubscriptionStatus::Expired);

    let price_id = object
        .pointer("/items/data/0/price/id")
        .and_then(|p| p.as_str())
        .unwrap_or_default();
    let plan = if price_id == price_complete && !price_id.is_empty() {
        Some(SubscriptionPlan::Complete)
    } else if price_id == price_diy && !price_id.is_empty() {
        Some(SubscriptionPlan::Diy)
    } else {
        None
    };

    let period_start = unix_field(object, "current_period_start");
    let period_end = unix_field(object, "current_period_end");

    Ok(SubscriptionState {
        subscription_id,
        customer_id,
        status,
        plan,
        period_start,
        period_end,
    })
}

fn unix_field(object: &Value, field: &str) -> DateTime<Utc> {
    object
        .get(field)
        .and_then(|v| v.as_i64())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

/// Apply a webhook event to the store: upserts the subscription row and the
/// user's plan. Unknown event types are ignored.
pub async fn apply_webhook_event(
    pool: &SqlitePool,
    event: &WebhookEvent,
    price_diy: &str,
    price_complete: &str,
) -> Result<()> {
    match event.event_type.as_str() {
        "customer.subscription.created" | "customer.subscription.updated" => {
            let state = subscription_state(&event.data.object, price_diy, price_complete)?;
            let Some(user) = user_for_customer(pool, &state.customer_id).await? else {
                warn!(customer = %state.customer_id, "webhook for unknown customer");
                return Ok(());
            };
            let plan = state.plan.unwrap_or(SubscriptionPlan::Diy);

            subscriptions::upsert_subscription(
                pool,
                user.id,
                &state.subscription_id,
                plan,
                state.status,
                state.period_start,
                state.period_end,
            )
            .await?;

            let effective_plan = match state.status {
                SubscriptionStatus::Active | SubscriptionStatus::PastDue => plan,
                _ => SubscriptionPlan::Free,
            };
            users::set_subscription_plan(pool, user.id, effective_plan).await?;

            if event.event_type == "customer.subscription.created"
                && state.status == SubscriptionStatus::Active
            {
                notifications::insert_notification(
                    pool,
                    user.id,
                    NotificationType::PaymentConfirmed,
                    "Subscription active",
                    &format!("Your {} plan is now active.", plan.as_str()),
                    None,
                )
                .await?;
            }

            info!(user_id = %user.id, status = state.status.as_str(), "subscription upserted");
        }
        "customer.subscription.deleted" => {
            let state = subscription_state(&event.data.object, price_diy, price_complete)?;
            subscriptions::set_status(pool, &state.subscription_id, SubscriptionStatus::Canceled)
                .await?;
            if let Some(user) = user_for_customer(pool, &state.customer_id).await? {
                users::set_subscription_plan(pool, user.id, SubscriptionPlan::Free).await?;
                info!(user_id = %user.id, "subscription canceled via webhook");
            }
        }
        "invoice.payment_failed" => {
            let subscription_id = event
                .data
                .object
                .get("subscription")
                .and_then(|s| s.as_str())
                .unwrap_or_default();
            if !subscription_id.is_empty() {
                subscriptions::set_status(pool, subscription_id, SubscriptionStatus::PastDue)
                    .await?;
                info!(subscription = subscription_id, "payment failed, marked past_due");
            }
        }
        other => {
            info!(event_type = other, "ignoring webhook event");
        }
    }
    Ok(())
}

async fn user_for_customer(
    pool: &SqlitePool,
    customer_id: &str,
) -> Result<Option<dhub_common::db::models::User>> {
    let user = sqlx::query_as::<_, dhub_common::db::models::User>(
        "SELECT * FROM users WHERE stripe_customer_id = ?",
    )
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subscription_object(status: &str, price: &str) -> Value {
        json!({
            "id": "sub_123",
            "customer": "cus_456",
            "status": status,
            "current_period_start": 1_780_000_000,
            "current_period_end": 1_782_600_000,
            "items": { "data": [ { "price": { "id": price } } ] }
        })
    }

    #[test]
    fn subscription_state_maps_plan_and_status() {
        let object = subscription_object("active", "price_complete_1");
        let state = subscription_state(&object, "price_diy_1", "price_complete_1").unwrap();
        assert_eq!(state.subscription_id, "sub_123");
        assert_eq!(state.customer_id, "cus_456");
        assert_eq!(state.status, SubscriptionStatus::Active);
        assert_eq!(state.plan, Some(SubscriptionPlan::Complete));
    }

    #[test]
    fn unknown_price_yields_no_plan() {
        let object = subscription_object("active", "price_other");
        let state = subscription_state(&object, "price_diy_1", "price_complete_1").unwrap();
        assert_eq!(state.plan, None);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(map_status("active"), SubscriptionStatus::Active);
        assert_eq!(map_status("trialing"), SubscriptionStatus::Active);
        assert_eq!(map_status("past_due"), SubscriptionStatus::PastDue);
        assert_eq!(map_status("canceled"), SubscriptionStatus::Canceled);
        assert_eq!(map_status("weird"), SubscriptionStatus::Expired);
    }

    #[test]
    fn webhook_event_deserializes() {
        let raw = json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": { "object": subscription_object("past_due", "price_diy_1") }
        })
        .to_string();

        let event: WebhookEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(event.event_type, "customer.subscription.updated");
        let state =
            subscription_state(&event.data.object, "price_diy_1", "price_complete_1").unwrap();
        assert_eq!(state.status, SubscriptionStatus::PastDue);
        assert_eq!(state.plan, Some(SubscriptionPlan::Diy));
    }

    #[tokio::test]
    async fn webhook_applies_subscription_to_store() {
        let pool = dhub_common::db::init_memory_database().await.unwrap();
        let user = crate::db::users::create_user(
            &pool,
            "payer@example.com",
            None,
            "individual",
            None,
            None,
        )
        .await
        .unwrap();
        crate::db::users::set_stripe_customer_id(&pool, user.id, "cus_456")
            .await
            .unwrap();

        let event = WebhookEvent {
            event_type: "customer.subscription.created".to_string(),
            data: WebhookData {
                object: subscription_object("active", "price_complete_1"),
            },
        };
        apply_webhook_event(&pool, &event, "price_diy_1", "price_complete_1")
            .await
            .unwrap();

        let refreshed = crate::db::users::get_user(&pool, user.id).await.unwrap();
        assert_eq!(refreshed.subscription_plan, "complete");

        let sub = crate::db::subscriptions::get_by_user(&pool, user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.stripe_subscription_id, "sub_123");
        assert_eq!(sub.status, "active");

        // Cancellation downgrades back to free
        let event = WebhookEvent {
            event_type: "customer.subscription.deleted".to_string(),
            data: WebhookData {
                object: subscription_object("canceled", "price_complete_1"),
            },
        };
        apply_webhook_event(&pool, &event, "price_diy_1", "price_complete_1")
            .await
            .unwrap();

        let refreshed = crate::db::users::get_user(&pool, user.id).await.unwrap();
        assert_eq!(refreshed.subscription_plan, "free");
        let sub = crate::db::subscriptions::get_by_user(&pool, user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.status, "canceled");
    }
}
