//! ZeptoMail email client
//!
//! Sends transactional email through the ZeptoMail HTTP API. Degrades to a
//! disabled variant when no API key is configured; sends then log and
//! succeed as no-ops so the notification loop keeps running.

use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use dhub_common::{Config, Error, Result};

const ZEPTOMAIL_API_URL: &str = "https://api.zeptomail.com/v1.1/email";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub enum Mailer {
    Active(ZeptoMailClient),
    Disabled,
}

pub struct ZeptoMailClient {
    http: Client,
    api_key: String,
    from_address: String,
    from_name: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.zeptomail_api_key {
            Some(key) if !key.is_empty() => {
                let http = Client::builder()
                    .timeout(DEFAULT_TIMEOUT)
                    .build()
                    .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
                Ok(Mailer::Active(ZeptoMailClient {
                    http,
                    api_key: key.clone(),
                    from_address: config.email_from.clone(),
                    from_name: config.email_from_name.clone(),
                }))
            }
            _ => Ok(Mailer::Disabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Mailer::Active(_))
    }

    /// Send an HTML email. Disabled mailers log and report success so the
    /// caller still records the in-app notification.
    pub async fn send(
        &self,
        to_address: &str,
        to_name: Option<&str>,
        subject: &str,
        html_body: &str,
    ) -> Result<()> {
        match self {
            Mailer::Active(client) => client.send(to_address, to_name, subject, html_body).await,
            Mailer::Disabled => {
                warn!(to = to_address, subject, "email disabled, skipping send");
                Ok(())
            }
        }
    }
}

impl ZeptoMailClient {
    async fn send(
        &self,
        to_address: &str,
        to_name: Option<&str>,
        subject: &str,
        html_body: &str,
    ) -> Result<()> {
        let body = json!({
            "from": {
                "address": self.from_address,
                "name": self.from_name,
            },
            "to": [{
                "email_address": {
                    "address": to_address,
                    "name": to_name,
                }
            }],
            "subject": subject,
            "htmlbody": html_body,
        });

        let response = self
            .http
            .post(ZEPTOMAIL_API_URL)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Zoho-enczapikey {}", self.api_key),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("email send failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "ZeptoMail returned {}: {}",
                status, detail
            )));
        }

        info!(to = to_address, subject, "email sent");
        Ok(())
    }
}
