use anyhow::{Context, Result};
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bidding zone shown on the dashboard (Estonia)
pub const REGION: &str = "ee";

/// Estonian VAT applied to the retail rate
pub const VAT_MULTIPLIER: f64 = 1.24;

/// Start-to-start period of the refresh loop
pub const REFRESH_PERIOD: Duration = Duration::from_secs(900);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub base_url: String,
    pub http_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dashboard.elering.ee".to_string(),
            http_timeout_seconds: 15,
            user_agent: concat!("spot-price-monitor/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Config {
    /// Defaults, then `config/default.toml` if present, then `SPOT__*` env vars
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("SPOT__").split("__"))
    }

    pub fn load() -> Result<Self> {
        Self::figment()
            .extract()
            .context("invalid configuration")
    }
}
