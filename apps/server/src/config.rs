//! Application configuration.
//!
//! Read from an optional JSON file; every field has a default, so a partial
//! file (or none at all) is valid. `TELEGRAM_BOT_TOKEN` overrides the file.

use alertbot_alerts::{AnalystConfig, MonitorConfig, StorageConfig};
use alertbot_core::{DEFAULT_EQUALITY_TOLERANCE, DEFAULT_QUOTE_ASSET, DEFAULT_STARTING_BALANCE};
use alertbot_feeds::{RestConfig, DEFAULT_CACHE_TTL};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub telegram: TelegramSettings,
    pub monitor: MonitorSettings,
    pub storage: StorageSettings,
    pub binance: BinanceSettings,
    pub analyst: AnalystSettings,
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        self.override_bot_token(std::env::var(BOT_TOKEN_ENV).ok());
    }

    fn override_bot_token(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.telegram.bot_token = Some(token.trim().to_string());
        }
    }

    /// Bot token, if one is configured and non-empty.
    pub fn bot_token(&self) -> Option<&str> {
        self.telegram
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    /// Chats allowed to issue commands. Empty allows everyone.
    pub allowed_chat_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub poll_interval_secs: u64,
    /// Relative band for `=` ("reaches") conditions.
    pub equality_tolerance: Decimal,
    pub price_cache_ttl_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            equality_tolerance: DEFAULT_EQUALITY_TOLERANCE,
            price_cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

impl MonitorSettings {
    pub fn price_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.price_cache_ttl_secs)
    }
}

impl From<&MonitorSettings> for MonitorConfig {
    fn from(settings: &MonitorSettings) -> Self {
        MonitorConfig {
            poll_interval: Duration::from_secs(settings.poll_interval_secs.max(1)),
            equality_tolerance: settings.equality_tolerance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    pub starting_balance: Decimal,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            starting_balance: DEFAULT_STARTING_BALANCE,
        }
    }
}

impl From<&StorageSettings> for StorageConfig {
    fn from(settings: &StorageSettings) -> Self {
        StorageConfig {
            data_dir: settings.data_dir.clone(),
            starting_balance: settings.starting_balance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceSettings {
    pub base_url: String,
    pub quote_asset: String,
    pub request_timeout_secs: u64,
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            quote_asset: DEFAULT_QUOTE_ASSET.to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl From<&BinanceSettings> for RestConfig {
    fn from(settings: &BinanceSettings) -> Self {
        RestConfig {
            base_url: settings.base_url.clone(),
            quote_asset: settings.quote_asset.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalystSettings {
    pub history_days: usize,
    pub forecast_min_interval_secs: u64,
}

impl Default for AnalystSettings {
    fn default() -> Self {
        Self {
            history_days: 100,
            forecast_min_interval_secs: 4 * 60 * 60,
        }
    }
}

impl From<&AnalystSettings> for AnalystConfig {
    fn from(settings: &AnalystSettings) -> Self {
        AnalystConfig {
            history_days: settings.history_days,
            forecast_min_interval: Duration::from_secs(settings.forecast_min_interval_secs),
        }
    }
}
