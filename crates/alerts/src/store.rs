//! JSON-file store for alerts, trigger history and virtual portfolios.
//!
//! All state sits behind one async mutex, so the store is the single writer
//! of its files. Files are replaced atomically (temp file + rename); a missing
//! file loads as empty and an unreadable one is logged and loads as empty.

use crate::config::StorageConfig;
use alertbot_core::{
    AlertHistoryEntry, AlertStatus, PortfolioError, PriceAlert, PriceSnapshot, Symbol,
    Transaction, VirtualPortfolio, DEFAULT_STARTING_BALANCE,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Portfolio(#[from] PortfolioError),
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What `/cancel` should remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelTarget {
    All,
    /// Full UUID or its 8-character short form.
    Id(String),
    Symbol(Symbol),
}

impl CancelTarget {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.eq_ignore_ascii_case("all") {
            return Some(CancelTarget::All);
        }
        let is_short_id = raw.len() == 8 && raw.chars().all(|c| c.is_ascii_hexdigit());
        if is_short_id || Uuid::parse_str(raw).is_ok() {
            return Some(CancelTarget::Id(raw.to_ascii_lowercase()));
        }
        Symbol::parse(raw).map(CancelTarget::Symbol)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AlertsFile {
    #[serde(rename = "alerts", default)]
    items: Vec<PriceAlert>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(rename = "history", default)]
    items: Vec<AlertHistoryEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PortfolioFile {
    #[serde(rename = "portfolios", default)]
    items: BTreeMap<String, VirtualPortfolio>,
}

/// Files whose latest in-memory state has not reached disk yet.
#[derive(Debug, Default, Clone, Copy)]
struct Unsaved {
    alerts: bool,
    history: bool,
}

#[derive(Debug, Default)]
struct State {
    alerts: AlertsFile,
    history: HistoryFile,
    portfolios: PortfolioFile,
    unsaved: Unsaved,
}

#[derive(Debug)]
struct StorePaths {
    alerts: PathBuf,
    history: PathBuf,
    portfolios: PathBuf,
}

/// Alert, history and portfolio storage.
#[derive(Debug)]
pub struct AlertStore {
    /// `None` keeps everything in memory.
    paths: Option<StorePaths>,
    starting_balance: Decimal,
    state: Mutex<State>,
}

impl AlertStore {
    /// Open (or create) the store in `config.data_dir`.
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|e| io_error(&config.data_dir, e))?;

        let paths = StorePaths {
            alerts: config.alerts_path(),
            history: config.history_path(),
            portfolios: config.portfolio_path(),
        };
        let state = State {
            alerts: load_json(&paths.alerts).await,
            history: load_json(&paths.history).await,
            portfolios: load_json(&paths.portfolios).await,
            unsaved: Unsaved::default(),
        };

        info!(
            dir = %config.data_dir.display(),
            alerts = state.alerts.items.len(),
            active = state.alerts.items.iter().filter(|a| a.is_active()).count(),
            history = state.history.items.len(),
            portfolios = state.portfolios.items.len(),
            "Alert store loaded"
        );

        Ok(Self {
            paths: Some(paths),
            starting_balance: config.starting_balance,
            state: Mutex::new(state),
        })
    }

    /// Store without persistence.
    pub fn in_memory() -> Self {
        Self {
            paths: None,
            starting_balance: DEFAULT_STARTING_BALANCE,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_starting_balance(mut self, balance: Decimal) -> Self {
        self.starting_balance = balance;
        self
    }

    async fn save_alerts(&self, state: &State) -> Result<(), StoreError> {
        match &self.paths {
            Some(paths) => write_json(&paths.alerts, &state.alerts).await,
            None => Ok(()),
        }
    }

    async fn save_history(&self, state: &State) -> Result<(), StoreError> {
        match &self.paths {
            Some(paths) => write_json(&paths.history, &state.history).await,
            None => Ok(()),
        }
    }

    async fn save_portfolios(&self, state: &State) -> Result<(), StoreError> {
        match &self.paths {
            Some(paths) => write_json(&paths.portfolios, &state.portfolios).await,
            None => Ok(()),
        }
    }

    /// Write any file left stale by a failed trigger write.
    async fn save_unsaved(&self, state: &mut State) -> Result<(), StoreError> {
        if state.unsaved.alerts {
            self.save_alerts(state).await?;
            state.unsaved.alerts = false;
            info!("Pending alert changes persisted");
        }
        if state.unsaved.history {
            self.save_history(state).await?;
            state.unsaved.history = false;
            info!("Pending alert history persisted");
        }
        Ok(())
    }

    /// Retry writes that failed in [`AlertStore::mark_triggered`], so a
    /// trigger kept only in memory reaches disk before the next restart.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        self.save_unsaved(&mut state).await
    }

    // ------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------

    pub async fn add_alert(&self, alert: PriceAlert) -> Result<Uuid, StoreError> {
        let mut state = self.state.lock().await;
        let id = alert.id;
        let user_id = alert.user_id.clone();
        state.alerts.items.push(alert);

        if let Err(e) = self.save_alerts(&state).await {
            state.alerts.items.pop();
            return Err(e);
        }
        state.unsaved.alerts = false;
        info!(alert_id = %id, user = %user_id, "Alert added");
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Option<PriceAlert> {
        let state = self.state.lock().await;
        state.alerts.items.iter().find(|a| a.id == id).cloned()
    }

    /// Every active alert, in creation order.
    pub async fn active_alerts(&self) -> Vec<PriceAlert> {
        let state = self.state.lock().await;
        state
            .alerts
            .items
            .iter()
            .filter(|a| a.is_active())
            .cloned()
            .collect()
    }

    pub async fn active_count(&self) -> usize {
        let state = self.state.lock().await;
        state.alerts.items.iter().filter(|a| a.is_active()).count()
    }

    /// Active alerts owned by `user_id`, in creation order.
    pub async fn alerts_for_user(&self, user_id: &str) -> Vec<PriceAlert> {
        let state = self.state.lock().await;
        state
            .alerts
            .items
            .iter()
            .filter(|a| a.is_active() && a.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Cancel the user's active alerts matching `target`; returns the
    /// cancelled alerts. An id that matches nothing is retried as a symbol.
    pub async fn cancel(
        &self,
        user_id: &str,
        target: &CancelTarget,
    ) -> Result<Vec<PriceAlert>, StoreError> {
        let mut state = self.state.lock().await;

        let owned: Vec<usize> = state
            .alerts
            .items
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_active() && a.user_id == user_id)
            .map(|(i, _)| i)
            .collect();

        let alerts = &state.alerts.items;
        let by_symbol = |symbol: &Symbol| -> Vec<usize> {
            owned
                .iter()
                .copied()
                .filter(|&i| alerts[i].condition.references(symbol))
                .collect()
        };
        let selected: Vec<usize> = match target {
            CancelTarget::All => owned.clone(),
            CancelTarget::Symbol(symbol) => by_symbol(symbol),
            CancelTarget::Id(id) => {
                let by_id: Vec<usize> = owned
                    .iter()
                    .copied()
                    .filter(|&i| alerts[i].matches_id(id))
                    .collect();
                match Symbol::parse(id) {
                    Some(symbol) if by_id.is_empty() => by_symbol(&symbol),
                    _ => by_id,
                }
            }
        };

        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let backup = state.alerts.items.clone();
        let now = Utc::now();
        for &i in &selected {
            let alert = &mut state.alerts.items[i];
            alert.status = AlertStatus::Cancelled;
            alert.cancelled_at = Some(now);
        }
        let cancelled: Vec<PriceAlert> = selected
            .iter()
            .map(|&i| state.alerts.items[i].clone())
            .collect();

        if let Err(e) = self.save_alerts(&state).await {
            state.alerts.items = backup;
            return Err(e);
        }
        state.unsaved.alerts = false;
        info!(user = %user_id, count = cancelled.len(), "Alerts cancelled");
        Ok(cancelled)
    }

    /// Move an active alert to `triggered`, record the prices of its symbols
    /// and append a history entry. Returns `None` if the alert is no longer
    /// active, so a given alert is handed out at most once.
    ///
    /// Persistence failures are logged and the in-memory transition stands;
    /// the failed file is rewritten by the next [`AlertStore::flush`] or
    /// alert write.
    pub async fn mark_triggered(
        &self,
        id: Uuid,
        prices: &PriceSnapshot,
        at: DateTime<Utc>,
    ) -> Option<PriceAlert> {
        let mut state = self.state.lock().await;

        let alert = state
            .alerts
            .items
            .iter_mut()
            .find(|a| a.id == id && a.is_active())?;
        alert.status = AlertStatus::Triggered;
        alert.triggered_at = Some(at);
        alert.triggered_prices = prices.subset(alert.condition.symbols().iter());
        let triggered = alert.clone();

        state.history.items.push(AlertHistoryEntry::from_alert(
            &triggered,
            triggered.triggered_prices.clone(),
            at,
        ));

        let alerts_saved = self.save_alerts(&state).await;
        if let Err(e) = &alerts_saved {
            error!(alert_id = %id, error = %e, "Failed to persist triggered alert");
        }
        state.unsaved.alerts = alerts_saved.is_err();

        let history_saved = self.save_history(&state).await;
        if let Err(e) = &history_saved {
            error!(alert_id = %id, error = %e, "Failed to persist alert history");
        }
        state.unsaved.history = history_saved.is_err();
        debug!(alert_id = %id, "Alert marked triggered");
        Some(triggered)
    }

    /// The user's trigger history, newest first.
    pub async fn history_for_user(&self, user_id: &str, limit: usize) -> Vec<AlertHistoryEntry> {
        let state = self.state.lock().await;
        state
            .history
            .items
            .iter()
            .rev()
            .filter(|h| h.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Virtual portfolio
    // ------------------------------------------------------------------

    /// The user's portfolio, or a fresh one if they never traded.
    pub async fn portfolio(&self, user_id: &str) -> VirtualPortfolio {
        let state = self.state.lock().await;
        state
            .portfolios
            .items
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| VirtualPortfolio::new(user_id, self.starting_balance))
    }

    pub async fn buy(
        &self,
        user_id: &str,
        symbol: Symbol,
        amount_usd: Decimal,
        price: Decimal,
    ) -> Result<(Transaction, VirtualPortfolio), StoreError> {
        self.trade(user_id, |p| p.buy(symbol, amount_usd, price, Utc::now()))
            .await
    }

    pub async fn sell(
        &self,
        user_id: &str,
        symbol: Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<(Transaction, VirtualPortfolio), StoreError> {
        self.trade(user_id, |p| p.sell(symbol, quantity, price, Utc::now()))
            .await
    }

    async fn trade<F>(&self, user_id: &str, f: F) -> Result<(Transaction, VirtualPortfolio), StoreError>
    where
        F: FnOnce(&mut VirtualPortfolio) -> Result<Transaction, PortfolioError>,
    {
        let mut state = self.state.lock().await;
        if let Err(e) = self.save_unsaved(&mut state).await {
            warn!(error = %e, "Pending alert changes still not persisted");
        }

        let mut portfolio = state
            .portfolios
            .items
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| VirtualPortfolio::new(user_id, self.starting_balance));
        let tx = f(&mut portfolio)?;

        let previous = state
            .portfolios
            .items
            .insert(user_id.to_string(), portfolio.clone());
        if let Err(e) = self.save_portfolios(&state).await {
            match previous {
                Some(p) => state.portfolios.items.insert(user_id.to_string(), p),
                None => state.portfolios.items.remove(user_id),
            };
            return Err(e);
        }

        info!(
            user = %user_id,
            side = %tx.side,
            symbol = %tx.symbol,
            amount_usd = %tx.amount_usd,
            "Virtual trade executed"
        );
        Ok((tx, portfolio))
    }
}

async fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read store file, starting empty");
            return T::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable store file, starting empty");
            T::default()
        }
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| io_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertbot_core::{Expr, Operator};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn storage(dir: &tempfile::TempDir) -> StorageConfig {
        StorageConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    fn alert(user: &str, symbol: &str, threshold: Decimal) -> PriceAlert {
        PriceAlert::new(user, Expr::condition(symbol, Operator::Greater, threshold))
    }

    fn snapshot(pairs: &[(&str, Decimal)]) -> PriceSnapshot {
        pairs.iter().map(|(s, p)| (Symbol::new(s), *p)).collect()
    }

    #[test]
    fn test_cancel_target_parse() {
        assert_eq!(CancelTarget::parse("ALL"), Some(CancelTarget::All));
        assert_eq!(
            CancelTarget::parse("btc"),
            Some(CancelTarget::Symbol(Symbol::new("BTC")))
        );
        assert_eq!(
            CancelTarget::parse("1A2B3C4D"),
            Some(CancelTarget::Id("1a2b3c4d".to_string()))
        );
        assert_eq!(CancelTarget::parse("  "), None);
        assert_eq!(CancelTarget::parse("!!"), None);
    }

    #[tokio::test]
    async fn test_missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::open(&storage(&dir)).await.unwrap();
        assert!(store.active_alerts().await.is_empty());
        assert!(store.history_for_user("1", 10).await.is_empty());
        assert_eq!(store.portfolio("1").await.cash_balance, dec!(10000));
    }

    #[tokio::test]
    async fn test_unreadable_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage(&dir);
        std::fs::write(config.alerts_path(), b"{ not json").unwrap();

        let store = AlertStore::open(&config).await.unwrap();
        assert!(store.active_alerts().await.is_empty());

        // The next write replaces the broken file.
        store.add_alert(alert("1", "BTC", dec!(1))).await.unwrap();
        let reopened = AlertStore::open(&config).await.unwrap();
        assert_eq!(reopened.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_alerts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage(&dir);

        let store = AlertStore::open(&config).await.unwrap();
        let a = alert("1", "BTC", dec!(70000));
        let id = store.add_alert(a.clone()).await.unwrap();
        assert_eq!(id, a.id);

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(config.alerts_path()).unwrap()).unwrap();
        assert_eq!(json["alerts"][0]["user_id"], "1");
        assert!(!config.data_dir.join("price_alerts.json.tmp").exists());

        let reopened = AlertStore::open(&config).await.unwrap();
        assert_eq!(reopened.active_alerts().await, vec![a]);
    }

    #[tokio::test]
    async fn test_alerts_for_user_only_active_and_own() {
        let store = AlertStore::in_memory();
        let mine = alert("1", "BTC", dec!(1));
        store.add_alert(mine.clone()).await.unwrap();
        store.add_alert(alert("2", "BTC", dec!(1))).await.unwrap();
        let done = alert("1", "ETH", dec!(1));
        store.add_alert(done.clone()).await.unwrap();
        store
            .mark_triggered(done.id, &snapshot(&[("ETH", dec!(2))]), Utc::now())
            .await
            .unwrap();

        assert_eq!(store.alerts_for_user("1").await, vec![mine]);
    }

    #[tokio::test]
    async fn test_cancel_by_all_symbol_and_id() {
        let store = AlertStore::in_memory();
        let btc = alert("1", "BTC", dec!(1));
        let eth = alert("1", "ETH", dec!(1));
        let compound = PriceAlert::new(
            "1",
            Expr::and(vec![
                Expr::condition("SOL", Operator::Less, dec!(100)),
                Expr::condition("BTC", Operator::Less, dec!(50000)),
            ]),
        );
        let other_user = alert("2", "BTC", dec!(1));
        for a in [&btc, &eth, &compound, &other_user] {
            store.add_alert(a.clone()).await.unwrap();
        }

        let cancelled = store
            .cancel("1", &CancelTarget::Symbol(Symbol::new("BTC")))
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 2);
        assert!(cancelled.iter().all(|a| a.status == AlertStatus::Cancelled));
        assert!(cancelled.iter().all(|a| a.cancelled_at.is_some()));

        let cancelled = store
            .cancel("1", &CancelTarget::Id(eth.short_id()))
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, eth.id);

        assert!(store.alerts_for_user("1").await.is_empty());
        assert_eq!(store.alerts_for_user("2").await, vec![other_user.clone()]);

        assert!(store.cancel("1", &CancelTarget::All).await.unwrap().is_empty());
        assert_eq!(store.cancel("2", &CancelTarget::All).await.unwrap().len(), 1);
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_hex_like_symbol_falls_back_to_symbol() {
        let store = AlertStore::in_memory();
        store.add_alert(alert("1", "BADC0FFE", dec!(1))).await.unwrap();

        let target = CancelTarget::parse("badc0ffe").unwrap();
        assert!(matches!(target, CancelTarget::Id(_)));
        assert_eq!(store.cancel("1", &target).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_triggered_only_once() {
        let store = AlertStore::in_memory();
        let a = PriceAlert::new(
            "1",
            Expr::or(vec![
                Expr::condition("BTC", Operator::Greater, dec!(70000)),
                Expr::condition("ETH", Operator::Less, dec!(3000)),
            ]),
        );
        store.add_alert(a.clone()).await.unwrap();
        let prices = snapshot(&[("BTC", dec!(71000)), ("ETH", dec!(3100)), ("ADA", dec!(0.5))]);

        let triggered = store.mark_triggered(a.id, &prices, Utc::now()).await.unwrap();
        assert_eq!(triggered.status, AlertStatus::Triggered);
        assert_eq!(
            triggered.triggered_prices,
            snapshot(&[("BTC", dec!(71000)), ("ETH", dec!(3100))])
        );

        assert!(store.mark_triggered(a.id, &prices, Utc::now()).await.is_none());
        assert!(store.mark_triggered(Uuid::new_v4(), &prices, Utc::now()).await.is_none());

        let history = store.history_for_user("1", 10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].condition, "BTC > 70000 or ETH < 3000");
    }

    #[tokio::test]
    async fn test_cancelled_alert_never_triggers() {
        let store = AlertStore::in_memory();
        let a = alert("1", "BTC", dec!(1));
        store.add_alert(a.clone()).await.unwrap();
        store.cancel("1", &CancelTarget::All).await.unwrap();

        let prices = snapshot(&[("BTC", dec!(100))]);
        assert!(store.mark_triggered(a.id, &prices, Utc::now()).await.is_none());
        assert!(store.history_for_user("1", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_triggers_yield_one_winner() {
        let store = Arc::new(AlertStore::in_memory());
        let a = alert("1", "BTC", dec!(1));
        store.add_alert(a.clone()).await.unwrap();
        let prices = snapshot(&[("BTC", dec!(2))]);
        let id = a.id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let prices = prices.clone();
                tokio::spawn(async move { store.mark_triggered(id, &prices, Utc::now()).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.history_for_user("1", 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_trigger_write_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage(&dir);
        let store = AlertStore::open(&config).await.unwrap();
        let a = alert("1", "BTC", dec!(70000));
        store.add_alert(a.clone()).await.unwrap();

        // A directory in place of the alerts file makes the rename fail.
        std::fs::remove_file(config.alerts_path()).unwrap();
        std::fs::create_dir(config.alerts_path()).unwrap();
        std::fs::write(config.alerts_path().join("blocker"), b"x").unwrap();

        let prices = snapshot(&[("BTC", dec!(71000))]);
        assert!(store.mark_triggered(a.id, &prices, Utc::now()).await.is_some());
        assert!(store.flush().await.is_err());

        std::fs::remove_dir_all(config.alerts_path()).unwrap();
        store.flush().await.unwrap();

        let reopened = AlertStore::open(&config).await.unwrap();
        assert_eq!(reopened.active_count().await, 0);
        assert_eq!(
            reopened.get(a.id).await.unwrap().status,
            AlertStatus::Triggered
        );
        assert_eq!(reopened.history_for_user("1", 10).await.len(), 1);
        assert!(reopened
            .mark_triggered(a.id, &prices, Utc::now())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_history_newest_first_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage(&dir);
        let store = AlertStore::open(&config).await.unwrap();

        let mut ids = Vec::new();
        for i in 1..=12 {
            let a = alert("1", "BTC", Decimal::from(i));
            ids.push(a.id);
            store.add_alert(a.clone()).await.unwrap();
            store
                .mark_triggered(a.id, &snapshot(&[("BTC", dec!(100))]), Utc::now())
                .await
                .unwrap();
        }

        let history = store.history_for_user("1", 10).await;
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].alert_id, ids[11]);
        assert_eq!(history[9].alert_id, ids[2]);

        let reopened = AlertStore::open(&config).await.unwrap();
        assert_eq!(reopened.history_for_user("1", 100).await.len(), 12);
        assert_eq!(reopened.history_for_user("2", 10).await.len(), 0);
    }

    #[tokio::test]
    async fn test_trades_persist_and_failures_do_not_mutate() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage(&dir);
        let store = AlertStore::open(&config).await.unwrap();

        let (tx, portfolio) = store
            .buy("1", Symbol::new("BTC"), dec!(1000), dec!(50000))
            .await
            .unwrap();
        assert_eq!(tx.quantity, dec!(0.02));
        assert_eq!(portfolio.cash_balance, dec!(9000));

        let err = store
            .buy("1", Symbol::new("ETH"), dec!(20000), dec!(3000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Portfolio(PortfolioError::InsufficientBalance { .. })
        ));
        let err = store
            .sell("1", Symbol::new("BTC"), dec!(1), dec!(50000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Portfolio(PortfolioError::InsufficientHoldings { .. })
        ));

        let reopened = AlertStore::open(&config).await.unwrap();
        let portfolio = reopened.portfolio("1").await;
        assert_eq!(portfolio.cash_balance, dec!(9000));
        assert_eq!(portfolio.quantity(&Symbol::new("BTC")), dec!(0.02));
        assert_eq!(portfolio.transactions.len(), 1);

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(config.portfolio_path()).unwrap()).unwrap();
        assert!(json["portfolios"]["1"].is_object());
    }

    #[tokio::test]
    async fn test_custom_starting_balance() {
        let store = AlertStore::in_memory().with_starting_balance(dec!(500));
        assert_eq!(store.portfolio("9").await.cash_balance, dec!(500));
    }
}
