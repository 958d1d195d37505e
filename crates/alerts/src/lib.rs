//! Price alert service.
//!
//! This crate provides:
//! - JSON-file storage for alerts, trigger history and virtual portfolios
//! - The background alert monitor
//! - Notification sinks (Telegram and log)
//! - Transport-independent command handling and the Telegram bot

pub mod analyst;
pub mod commands;
pub mod config;
pub mod monitor;
pub mod notifier;
pub mod store;
pub mod telegram;

pub use analyst::{AnalysisDepth, AnalysisError, MarketAnalyst, TechnicalAnalyst};
pub use commands::CommandHandler;
pub use config::{AnalystConfig, MonitorConfig, StorageConfig, DEFAULT_HISTORY_LIMIT};
pub use monitor::{AlertMonitor, MonitorError, StatsSnapshot, TickReport};
pub use notifier::{format_trigger_message, LogNotifier, Notifier, NotifyError};
pub use store::{AlertStore, CancelTarget, StoreError};
pub use telegram::{Command, TelegramBot, TelegramError, TelegramNotifier};
