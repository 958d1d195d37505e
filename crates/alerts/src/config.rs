//! Alert service configuration types.

use alertbot_core::{DEFAULT_EQUALITY_TOLERANCE, DEFAULT_STARTING_BALANCE};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Persisted file names inside the data directory.
pub const ALERTS_FILE: &str = "price_alerts.json";
pub const HISTORY_FILE: &str = "alert_history.json";
pub const PORTFOLIO_FILE: &str = "virtual_portfolio.json";

/// Default number of entries shown by `/alert_history`.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Alert monitor settings.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between price checks.
    pub poll_interval: Duration,
    /// Relative band for `=` conditions.
    pub equality_tolerance: Decimal,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            equality_tolerance: DEFAULT_EQUALITY_TOLERANCE,
        }
    }
}

/// Where and how state is persisted.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Cash balance of a newly created virtual portfolio.
    pub starting_balance: Decimal,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            starting_balance: DEFAULT_STARTING_BALANCE,
        }
    }
}

impl StorageConfig {
    pub fn alerts_path(&self) -> PathBuf {
        self.data_dir.join(ALERTS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }

    pub fn portfolio_path(&self) -> PathBuf {
        self.data_dir.join(PORTFOLIO_FILE)
    }
}

/// Technical analyst settings.
#[derive(Debug, Clone)]
pub struct AnalystConfig {
    /// Daily closes requested per analysis.
    pub history_days: usize,
    /// A new forecast for the same symbol is computed at most this often
    /// unless forced.
    pub forecast_min_interval: Duration,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            history_days: 100,
            forecast_min_interval: Duration::from_secs(4 * 60 * 60),
        }
    }
}
