//! Background price poller that evaluates active alerts.
//!
//! Each tick collects the union of symbols across active alerts, fetches
//! their prices once, evaluates every alert and hands satisfied ones to the
//! store's `active -> triggered` transition before notifying the owner.

use crate::config::MonitorConfig;
use crate::notifier::{format_trigger_message, Notifier};
use crate::store::AlertStore;
use alertbot_core::Symbol;
use alertbot_engine::Evaluator;
use alertbot_feeds::{FeedError, PriceSource};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Price fetch failed: {0}")]
    Fetch(#[from] FeedError),
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub alerts_checked: usize,
    pub symbols_requested: usize,
    pub prices_received: usize,
    pub triggered: usize,
}

/// Cumulative monitor counters.
#[derive(Debug)]
pub struct MonitorStats {
    ticks: AtomicU64,
    triggers: AtomicU64,
    fetch_failures: AtomicU64,
    notify_failures: AtomicU64,
    started: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub triggers: u64,
    pub fetch_failures: u64,
    pub notify_failures: u64,
    pub uptime: Duration,
}

impl MonitorStats {
    fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            triggers: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            notify_failures: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            triggers: self.triggers.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            notify_failures: self.notify_failures.load(Ordering::Relaxed),
            uptime: self.started.elapsed(),
        }
    }
}

pub struct AlertMonitor {
    store: Arc<AlertStore>,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    evaluator: Evaluator,
    config: MonitorConfig,
    stats: MonitorStats,
}

impl AlertMonitor {
    pub fn new(
        store: Arc<AlertStore>,
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            evaluator: Evaluator::new(config.equality_tolerance),
            config,
            stats: MonitorStats::new(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one evaluation pass.
    pub async fn run_tick(&self) -> Result<TickReport, MonitorError> {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.store.flush().await {
            warn!(error = %e, "Pending alert changes still not persisted");
        }

        let alerts = self.store.active_alerts().await;
        if alerts.is_empty() {
            return Ok(TickReport::default());
        }

        let symbols: Vec<Symbol> = alerts
            .iter()
            .flat_map(|a| a.condition.symbols())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let prices = match self.source.fetch_prices(&symbols).await {
            Ok(prices) => prices,
            Err(e) => {
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                return Err(e.into());
            }
        };

        let mut report = TickReport {
            alerts_checked: alerts.len(),
            symbols_requested: symbols.len(),
            prices_received: prices.len(),
            triggered: 0,
        };

        for alert in &alerts {
            if !self.evaluator.evaluate(&alert.condition, &prices) {
                continue;
            }
            // Cancelled or already triggered since the snapshot was taken.
            let Some(triggered) = self.store.mark_triggered(alert.id, &prices, Utc::now()).await
            else {
                continue;
            };

            report.triggered += 1;
            self.stats.triggers.fetch_add(1, Ordering::Relaxed);
            info!(
                alert_id = %triggered.short_id(),
                user = %triggered.user_id,
                condition = %triggered.condition,
                "🔔 Alert triggered"
            );

            let results = self.evaluator.evaluate_detailed(&triggered.condition, &prices);
            let message = format_trigger_message(&triggered, &results);
            if let Err(e) = self.notifier.notify(&triggered.user_id, &message).await {
                self.stats.notify_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    alert_id = %triggered.short_id(),
                    user = %triggered.user_id,
                    error = %e,
                    "Failed to deliver alert notification"
                );
            }
        }

        Ok(report)
    }

    /// Poll until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            "Starting alert monitor"
        );

        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.run_tick().await {
                Ok(report) if report.alerts_checked > 0 => debug!(
                    alerts = report.alerts_checked,
                    symbols = report.symbols_requested,
                    prices = report.prices_received,
                    triggered = report.triggered,
                    "Alert tick complete"
                ),
                Ok(_) => {}
                Err(MonitorError::Fetch(e)) => warn!(
                    error = %e,
                    transient = e.is_transient(),
                    "Price fetch failed, retrying next tick"
                ),
            }
        }

        info!("Alert monitor stopped");
    }
}
