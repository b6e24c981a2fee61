//! Configuration loading
//!
//! Settings resolve in priority order: command-line argument (handled by the
//! service binaries via clap), environment variable, TOML config file,
//! compiled default. Secrets (API keys) are env-only and never written to the
//! config file.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable naming the config file location.
pub const CONFIG_ENV: &str = "DHUB_CONFIG";

/// Shared service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// SQLite database path.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Bind address for the API service.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the API service.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on authenticated API routes. Empty disables auth
    /// (development only).
    #[serde(default)]
    pub api_token: String,

    /// Shared secret for the billing webhook endpoint.
    #[serde(default)]
    pub webhook_token: String,

    /// Anthropic API key for letter generation and response parsing.
    /// Absent means LLM features run disabled.
    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// Model identifier for LLM calls.
    #[serde(default = "default_model")]
    pub anthropic_model: String,

    /// Stripe secret key. Absent disables billing calls.
    #[serde(default)]
    pub stripe_secret_key: Option<String>,

    /// Stripe price ids per consumer plan.
    #[serde(default)]
    pub stripe_price_diy: String,
    #[serde(default)]
    pub stripe_price_complete: String,

    /// ZeptoMail API key. Absent disables outbound email.
    #[serde(default)]
    pub zeptomail_api_key: Option<String>,

    /// From address for outbound email.
    #[serde(default = "default_from_email")]
    pub email_from: String,

    /// Display name for outbound email.
    #[serde(default = "default_from_name")]
    pub email_from_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: default_database_path(),
            host: default_host(),
            port: default_port(),
            api_token: String::new(),
            webhook_token: String::new(),
            anthropic_api_key: None,
            anthropic_model: default_model(),
            stripe_secret_key: None,
            stripe_price_diy: String::new(),
            stripe_price_complete: String::new(),
            zeptomail_api_key: None,
            email_from: default_from_email(),
            email_from_name: default_from_name(),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("dhub").join("dhub.db"))
        .unwrap_or_else(|| PathBuf::from("./dhub.db"))
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5820
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_from_email() -> String {
    "noreply@disputehub.example".to_string()
}

fn default_from_name() -> String {
    "DisputeHub".to_string()
}

impl Config {
    /// Load configuration: TOML file (if present) with environment overrides.
    ///
    /// `cli_config_path` takes priority over the `DHUB_CONFIG` env var for
    /// locating the file; a missing file is not an error (defaults apply).
    pub fn load(cli_config_path: Option<&str>) -> Result<Config> {
        let path = cli_config_path
            .map(PathBuf::from)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(default_config_file);

        let mut config = match path {
            Some(ref p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                toml::from_str::<Config>(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", p.display(), e)))?
            }
            _ => Config::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables beat file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DHUB_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DHUB_HOST") {
            self.host = v;
        }
        if let Ok(v) = std::env::var("DHUB_PORT") {
            if let Ok(port) = v.parse() {
                self.port = port;
            }
        }
        if let Ok(v) = std::env::var("DHUB_API_TOKEN") {
            self.api_token = v;
        }
        if let Ok(v) = std::env::var("DHUB_WEBHOOK_TOKEN") {
            self.webhook_token = v;
        }
        if let Ok(v) = std::env::var("ANTHROPIC_API_KEY") {
            if !v.is_empty() {
                self.anthropic_api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DHUB_ANTHROPIC_MODEL") {
            self.anthropic_model = v;
        }
        if let Ok(v) = std::env::var("STRIPE_SECRET_KEY") {
            if !v.is_empty() {
                self.stripe_secret_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("STRIPE_PRICE_DIY") {
            self.stripe_price_diy = v;
        }
        if let Ok(v) = std::env::var("STRIPE_PRICE_COMPLETE") {
            self.stripe_price_complete = v;
        }
        if let Ok(v) = std::env::var("ZEPTOMAIL_API_KEY") {
            if !v.is_empty() {
                self.zeptomail_api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DHUB_EMAIL_FROM") {
            self.email_from = v;
        }
        if let Ok(v) = std::env::var("DHUB_EMAIL_FROM_NAME") {
            self.email_from_name = v;
        }
    }
}

/// Default config file path for the platform (~/.config/dhub/config.toml).
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dhub").join("config.toml"))
}
