//! Command handling independent of the chat transport.
//!
//! Every method returns the HTML reply for one command. User mistakes and
//! upstream failures become reply text; nothing here returns an error.

use crate::analyst::{AnalysisDepth, MarketAnalyst};
use crate::config::DEFAULT_HISTORY_LIMIT;
use crate::store::{AlertStore, CancelTarget, StoreError};
use alertbot_core::{
    format_change, format_price, format_quantity, format_usd, PriceAlert, PriceSnapshot, Symbol,
    TradeSide, Transaction, VirtualPortfolio,
};
use alertbot_engine::parse_condition;
use alertbot_feeds::{FeedError, PriceSource};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use std::fmt::Write;
use std::str::FromStr;
use std::sync::Arc;
use teloxide::utils::html;
use tracing::{error, warn};

const MOON_GIFS: &[&str] = &[
    "https://media.giphy.com/media/Ogak8XuKHLs6PYcqlp/giphy.gif",
    "https://media.giphy.com/media/trN9ht5RlE3Dcwavg2/giphy.gif",
    "https://media.giphy.com/media/DnMMGxEvniha7CvASq/giphy.gif",
];

const ALERT_USAGE: &str = "<b>Create an alert:</b>\n\
    • /alert BTC 70000 - when BTC reaches $70000\n\
    • /alert ETH &gt; 3000 - when ETH rises above $3000\n\
    • /alert ADA &lt; 0.5 - when ADA drops below $0.5\n\
    • /alert BTC &gt; 70000 and ETH &lt; 3000 - compound alert";

const CANCEL_USAGE: &str = "<b>Usage:</b>\n\
    • /cancel BTC - cancel your alerts for a symbol\n\
    • /cancel 1a2b3c4d - cancel one alert by id\n\
    • /cancel all - cancel all your alerts";

const HELP: &str = "<b>🤖 Price Alert Bot</b>\n\n\
    <b>Alerts</b>\n\
    /alert SYMBOL [&gt;|&lt;|=] PRICE [and|or ...] - create a price alert\n\
    /my_alerts - list your active alerts\n\
    /cancel all|SYMBOL|ID - cancel alerts\n\
    /alert_history - recently triggered alerts\n\n\
    <b>Market</b>\n\
    /price SYMBOL - current price and 24h stats\n\
    /analyze_ai SYMBOL [short|normal|long] - technical analysis\n\
    /forecast SYMBOL [force] - price outlook\n\n\
    <b>Virtual portfolio</b>\n\
    /buy SYMBOL AMOUNT_USD - buy with virtual dollars\n\
    /sell SYMBOL QUANTITY - sell a holding\n\
    /portfolio - balance and holdings\n\n\
    /to_the_moon - 🚀";

fn error_reply(message: &str) -> String {
    format!("❌ <b>Error:</b> {}", message)
}

/// Parse `SYMBOL NUMBER` arguments of `/buy` and `/sell`.
fn parse_trade_args(args: &str) -> Result<(Symbol, Decimal), String> {
    let mut parts = args.split_whitespace();
    let (Some(raw_symbol), Some(raw_amount)) = (parts.next(), parts.next()) else {
        return Err("wrong format.".to_string());
    };
    let symbol = Symbol::parse(raw_symbol)
        .ok_or_else(|| format!("invalid symbol '{}'.", html::escape(raw_symbol)))?;
    let amount = Decimal::from_str(raw_amount.trim_start_matches('$'))
        .map_err(|_| format!("invalid amount '{}'.", html::escape(raw_amount)))?;
    if amount <= Decimal::ZERO {
        return Err("the amount must be greater than zero.".to_string());
    }
    Ok((symbol, amount))
}

pub struct CommandHandler {
    store: Arc<AlertStore>,
    source: Arc<dyn PriceSource>,
    analyst: Arc<dyn MarketAnalyst>,
    history_limit: usize,
}

impl CommandHandler {
    pub fn new(
        store: Arc<AlertStore>,
        source: Arc<dyn PriceSource>,
        analyst: Arc<dyn MarketAnalyst>,
    ) -> Self {
        Self {
            store,
            source,
            analyst,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn start(&self) -> String {
        format!(
            "👋 Welcome! I watch crypto prices and message you when your alerts fire.\n\n{}",
            HELP
        )
    }

    pub fn help(&self) -> String {
        HELP.to_string()
    }

    // ------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------

    pub async fn alert(&self, user_id: &str, args: &str) -> String {
        let args = args.trim();
        if args.is_empty() {
            let alerts = self.store.alerts_for_user(user_id).await;
            if alerts.is_empty() {
                return format!("You have no active price alerts.\n\n{}", ALERT_USAGE);
            }
            return format!("{}\n{}", list_alerts(&alerts), ALERT_USAGE);
        }

        let condition = match parse_condition(args) {
            Ok(condition) => condition,
            Err(e) => {
                return format!(
                    "{}\n\n{}",
                    error_reply(&html::escape(&e.to_string())),
                    ALERT_USAGE
                )
            }
        };

        let alert = PriceAlert::new(user_id, condition);
        let reply = format!(
            "✅ <b>Alert created</b> [{}]\n\n<b>Condition:</b> {}\n\nI'll message you when it triggers.",
            alert.short_id(),
            html::escape(&alert.condition.to_string())
        );
        match self.store.add_alert(alert).await {
            Ok(_) => reply,
            Err(e) => {
                error!(user = %user_id, error = %e, "Failed to store alert");
                error_reply("could not save the alert, please try again.")
            }
        }
    }

    pub async fn my_alerts(&self, user_id: &str) -> String {
        let alerts = self.store.alerts_for_user(user_id).await;
        if alerts.is_empty() {
            return "You have no active price alerts.\n\nCreate one with /alert SYMBOL PRICE".to_string();
        }
        format!(
            "{}\nCreate: /alert SYMBOL PRICE\nRemove: /cancel ID, /cancel SYMBOL or /cancel all",
            list_alerts(&alerts)
        )
    }

    pub async fn cancel(&self, user_id: &str, args: &str) -> String {
        let Some(target) = CancelTarget::parse(args) else {
            return format!(
                "{}\n\n{}",
                error_reply("specify a symbol, an alert id or 'all'."),
                CANCEL_USAGE
            );
        };

        let cancelled = match self.store.cancel(user_id, &target).await {
            Ok(cancelled) => cancelled,
            Err(e) => {
                error!(user = %user_id, error = %e, "Failed to cancel alerts");
                return error_reply("could not cancel alerts, please try again.");
            }
        };

        let what = match &target {
            CancelTarget::All => String::new(),
            CancelTarget::Id(id) => format!(" matching {}", html::escape(id)),
            CancelTarget::Symbol(symbol) => format!(" for {}", html::escape(symbol.as_str())),
        };
        match cancelled.len() {
            0 => format!(
                "You had no active alerts{}. See your alerts with /my_alerts",
                what
            ),
            1 => format!("✅ Cancelled 1 alert{}.", what),
            n => format!("✅ Cancelled {} alerts{}.", n, what),
        }
    }

    pub async fn alert_history(&self, user_id: &str) -> String {
        let history = self
            .store
            .history_for_user(user_id, self.history_limit)
            .await;
        if history.is_empty() {
            return "You have no triggered alerts yet.".to_string();
        }

        let mut out = String::from("<b>Triggered alerts:</b>\n\n");
        for (i, entry) in history.iter().enumerate() {
            let prices: Vec<String> = entry
                .prices
                .iter()
                .map(|(symbol, price)| format!("{} {}", symbol, format_price(*price)))
                .collect();
            let _ = writeln!(
                out,
                "{}. {}\n   Triggered: {}",
                i + 1,
                html::escape(&entry.condition),
                entry.triggered_at.format("%Y-%m-%d %H:%M UTC")
            );
            if !prices.is_empty() {
                let _ = writeln!(out, "   Prices: {}", prices.join(", "));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }

    // ------------------------------------------------------------------
    // Market data
    // ------------------------------------------------------------------

    pub async fn price(&self, args: &str) -> String {
        let Some(symbol) = Symbol::parse(args) else {
            return error_reply(
                "specify a cryptocurrency symbol.\n\n<b>Usage:</b> /price SYMBOL\n• /price BTC\n• /price ETH",
            );
        };

        let quote = match self.source.fetch_quote(&symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                if !matches!(e, FeedError::UnknownSymbol(_)) {
                    warn!(symbol = %symbol, error = %e, "Quote fetch failed");
                }
                return format!(
                    "❌ Could not get the price for {}. Check that the symbol is correct.",
                    symbol
                );
            }
        };

        format!(
            "<b>{} - Current price</b>\n\n\
             <b>Price:</b> {}\n\
             <b>24h change:</b> {}\n\
             <b>24h high:</b> {}\n\
             <b>24h low:</b> {}\n\n\
             <a href=\"{}\">View chart on TradingView</a>",
            symbol,
            format_price(quote.price),
            format_change(quote.change_24h_pct),
            format_price(quote.high_24h),
            format_price(quote.low_24h),
            symbol.chart_link()
        )
    }

    pub async fn analyze(&self, args: &str) -> String {
        let mut parts = args.split_whitespace();
        let Some(symbol) = parts.next().and_then(Symbol::parse) else {
            return error_reply(
                "specify a symbol.\n\n<b>Usage:</b> /analyze_ai SYMBOL [short|normal|long]",
            );
        };
        let depth = match parts.next() {
            None => AnalysisDepth::default(),
            Some(raw) => match AnalysisDepth::parse(raw) {
                Some(depth) => depth,
                None => return error_reply("depth must be short, normal or long."),
            },
        };

        match self.analyst.analyze(&symbol, depth).await {
            Ok(text) => text,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Analysis failed");
                format!(
                    "⚠️ Analysis for {} is unavailable right now ({}). Please try again later.",
                    symbol,
                    html::escape(&e.to_string())
                )
            }
        }
    }

    pub async fn forecast(&self, args: &str) -> String {
        let mut parts = args.split_whitespace();
        let Some(symbol) = parts.next().and_then(Symbol::parse) else {
            return error_reply("specify a symbol.\n\n<b>Usage:</b> /forecast SYMBOL [force]");
        };
        let force = parts.next().is_some_and(|p| p.eq_ignore_ascii_case("force"));

        match self.analyst.forecast(&symbol, force).await {
            Ok(text) => text,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Forecast failed");
                format!(
                    "⚠️ Forecast for {} is unavailable right now ({}). Please try again later.",
                    symbol,
                    html::escape(&e.to_string())
                )
            }
        }
    }

    pub fn to_the_moon(&self) -> String {
        let gif = MOON_GIFS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(MOON_GIFS[0]);
        format!("🚀 <b>TO THE MOON!</b> 🌕\n\n{}", gif)
    }

    // ------------------------------------------------------------------
    // Virtual portfolio
    // ------------------------------------------------------------------

    pub async fn buy(&self, user_id: &str, args: &str) -> String {
        let (symbol, amount_usd) = match parse_trade_args(args) {
            Ok(parsed) => parsed,
            Err(reason) => {
                return format!(
                    "{}\n\n<b>Usage:</b> /buy SYMBOL AMOUNT_USD\n• /buy BTC 1000 - buy $1000 of Bitcoin",
                    error_reply(&reason)
                )
            }
        };
        let price = match self.source.fetch_price(&symbol).await {
            Ok(price) => price,
            Err(_) => return format!("❌ Could not get the price for {}.", symbol),
        };

        let result = self.store.buy(user_id, symbol, amount_usd, price).await;
        self.trade_reply(user_id, result).await
    }

    pub async fn sell(&self, user_id: &str, args: &str) -> String {
        let (symbol, quantity) = match parse_trade_args(args) {
            Ok(parsed) => parsed,
            Err(reason) => {
                return format!(
                    "{}\n\n<b>Usage:</b> /sell SYMBOL QUANTITY\n• /sell BTC 0.05 - sell 0.05 Bitcoin\n\nSee your holdings with /portfolio",
                    error_reply(&reason)
                )
            }
        };
        let price = match self.source.fetch_price(&symbol).await {
            Ok(price) => price,
            Err(_) => return format!("❌ Could not get the price for {}.", symbol),
        };

        let result = self.store.sell(user_id, symbol, quantity, price).await;
        self.trade_reply(user_id, result).await
    }

    async fn trade_reply(
        &self,
        user_id: &str,
        result: Result<(Transaction, VirtualPortfolio), StoreError>,
    ) -> String {
        let (tx, portfolio) = match result {
            Ok(done) => done,
            Err(StoreError::Portfolio(e)) => return format!("❌ {}", e),
            Err(e) => {
                error!(user = %user_id, error = %e, "Failed to persist trade");
                return error_reply("the trade could not be saved, please try again.");
            }
        };

        let mut prices = self.holding_prices(&portfolio).await;
        prices.insert(tx.symbol.clone(), tx.price);
        let valuation = portfolio.valuation(&prices);

        let (title, action) = match tx.side {
            TradeSide::Buy => ("✅ Purchase complete", "Bought"),
            TradeSide::Sell => ("✅ Sale complete", "Sold"),
        };
        format!(
            "<b>{}</b>\n\n\
             {} {} {} for {} at {}\n\n\
             <b>Balance:</b> {}\n\
             <b>Holdings value:</b> {}\n\
             <b>Total value:</b> {}",
            title,
            action,
            format_quantity(tx.quantity),
            tx.symbol,
            format_usd(tx.amount_usd),
            format_price(tx.price),
            format_usd(valuation.cash_balance),
            format_usd(valuation.holdings_value),
            format_usd(valuation.total_value),
        )
    }

    pub async fn portfolio(&self, user_id: &str) -> String {
        let portfolio = self.store.portfolio(user_id).await;
        if portfolio.holdings.is_empty() {
            return format!(
                "<b>💰 Your virtual portfolio</b>\n\n<b>Balance:</b> {}\n\nNo holdings yet. Try /buy BTC 1000",
                format_usd(portfolio.cash_balance)
            );
        }

        let prices = self.holding_prices(&portfolio).await;
        let valuation = portfolio.valuation(&prices);

        let mut out = format!(
            "<b>💰 Your virtual portfolio</b>\n\n\
             <b>Balance:</b> {}\n\
             <b>Holdings value:</b> {}\n\
             <b>Total value:</b> {}\n\n\
             <b>Holdings:</b>\n",
            format_usd(valuation.cash_balance),
            format_usd(valuation.holdings_value),
            format_usd(valuation.total_value),
        );
        for h in &valuation.holdings {
            let _ = writeln!(
                out,
                "• {}: {} ({})",
                h.symbol,
                format_quantity(h.quantity),
                format_usd(h.value)
            );
        }
        for symbol in &valuation.unpriced {
            let _ = writeln!(
                out,
                "• {}: {} (price unavailable)",
                symbol,
                format_quantity(portfolio.quantity(symbol))
            );
        }
        out.trim_end().to_string()
    }

    async fn holding_prices(&self, portfolio: &VirtualPortfolio) -> PriceSnapshot {
        let held: Vec<Symbol> = portfolio.holdings.keys().cloned().collect();
        if held.is_empty() {
            return PriceSnapshot::new();
        }
        match self.source.fetch_prices(&held).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(error = %e, "Could not price portfolio holdings");
                PriceSnapshot::new()
            }
        }
    }
}

fn list_alerts(alerts: &[PriceAlert]) -> String {
    let mut out = String::from("<b>Your active price alerts:</b>\n\n");
    for (i, alert) in alerts.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. [<code>{}</code>] {}",
            i + 1,
            alert.short_id(),
            html::escape(&alert.condition.to_string())
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::AnalysisError;
    use alertbot_core::{AlertStatus, Quote};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    struct FixedPrices(PriceSnapshot);

    #[async_trait]
    impl PriceSource for FixedPrices {
        async fn fetch_prices(&self, symbols: &[Symbol]) -> Result<PriceSnapshot, FeedError> {
            Ok(self.0.subset(symbols.iter()))
        }

        async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, FeedError> {
            let price = self
                .0
                .get(symbol)
                .ok_or_else(|| FeedError::UnknownSymbol(symbol.clone()))?;
            Ok(Quote {
                symbol: symbol.clone(),
                price,
                change_24h_pct: Some(dec!(2.5)),
                high_24h: price * dec!(1.1),
                low_24h: price * dec!(0.9),
                quote_volume: dec!(1000000),
            })
        }

        async fn fetch_daily_closes(&self, symbol: &Symbol, _limit: usize) -> Result<Vec<f64>, FeedError> {
            Err(FeedError::UnknownSymbol(symbol.clone()))
        }
    }

    struct BrokenAnalyst;

    #[async_trait]
    impl MarketAnalyst for BrokenAnalyst {
        async fn analyze(&self, _symbol: &Symbol, _depth: AnalysisDepth) -> Result<String, AnalysisError> {
            Err(AnalysisError::Feed(FeedError::RateLimitExceeded))
        }

        async fn forecast(&self, symbol: &Symbol, force: bool) -> Result<String, AnalysisError> {
            Ok(format!("forecast {} force={}", symbol, force))
        }
    }

    fn handler() -> (CommandHandler, Arc<AlertStore>) {
        let store = Arc::new(AlertStore::in_memory());
        let prices: PriceSnapshot = [
            (Symbol::new("BTC"), dec!(50000)),
            (Symbol::new("ETH"), dec!(2500)),
        ]
        .into_iter()
        .collect();
        let handler = CommandHandler::new(
            store.clone(),
            Arc::new(FixedPrices(prices)),
            Arc::new(BrokenAnalyst),
        );
        (handler, store)
    }

    #[tokio::test]
    async fn test_alert_creates_and_lists() {
        let (h, store) = handler();

        let reply = h.alert("1", "btc > 70000 and eth < 3000").await;
        assert!(reply.starts_with("✅ <b>Alert created</b>"));
        assert!(reply.contains("BTC &gt; 70000 and ETH &lt; 3000"));

        let alerts = store.alerts_for_user("1").await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].user_id, "1");

        let listing = h.my_alerts("1").await;
        assert!(listing.contains(&format!("1. [<code>{}</code>]", alerts[0].short_id())));

        let bare = h.alert("1", "").await;
        assert!(bare.contains("Your active price alerts"));
        assert!(bare.contains("<b>Create an alert:</b>"));
    }

    #[tokio::test]
    async fn test_alert_parse_error_names_token() {
        let (h, store) = handler();
        let reply = h.alert("1", "BTC > abc").await;
        assert!(reply.starts_with("❌ <b>Error:</b>"));
        assert!(reply.contains("'abc'"));
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_replies() {
        let (h, store) = handler();
        h.alert("1", "BTC 70000").await;
        h.alert("1", "ETH > 3000").await;

        assert!(h.cancel("1", "").await.contains("<b>Usage:</b>"));
        assert_eq!(
            h.cancel("1", "SOL").await,
            "You had no active alerts for SOL. See your alerts with /my_alerts"
        );
        assert_eq!(h.cancel("1", "btc").await, "✅ Cancelled 1 alert for BTC.");
        assert_eq!(h.cancel("1", "all").await, "✅ Cancelled 1 alert.");
        assert_eq!(store.active_count().await, 0);
        assert!(h.my_alerts("1").await.starts_with("You have no active price alerts."));
    }

    #[tokio::test]
    async fn test_price_reply() {
        let (h, _) = handler();
        let reply = h.price("btc").await;
        assert!(reply.starts_with("<b>BTC - Current price</b>"));
        assert!(reply.contains("<b>Price:</b> $50,000.00"));
        assert!(reply.contains("📈 +2.50%"));
        assert!(reply.contains("<b>24h high:</b> $55,000.00"));
        assert!(reply.contains("tradingview.com/symbols/BTCUSD/"));

        assert!(h.price("DOGE").await.starts_with("❌ Could not get the price for DOGE"));
        assert!(h.price("").await.starts_with("❌ <b>Error:</b>"));
    }

    #[tokio::test]
    async fn test_history_reply() {
        let (h, store) = handler();
        assert_eq!(h.alert_history("1").await, "You have no triggered alerts yet.");

        h.alert("1", "BTC > 40000").await;
        let alert = store.alerts_for_user("1").await.remove(0);
        let prices: PriceSnapshot = [(Symbol::new("BTC"), dec!(50000))].into_iter().collect();
        let triggered = store
            .mark_triggered(alert.id, &prices, chrono::Utc::now())
            .await
            .unwrap();
        assert_eq!(triggered.status, AlertStatus::Triggered);

        let reply = h.alert_history("1").await;
        assert!(reply.starts_with("<b>Triggered alerts:</b>"));
        assert!(reply.contains("1. BTC &gt; 40000"));
        assert!(reply.contains("Prices: BTC $50,000.00"));
    }

    #[tokio::test]
    async fn test_buy_sell_portfolio_flow() {
        let (h, _) = handler();

        let reply = h.buy("1", "BTC 1000").await;
        assert!(reply.starts_with("<b>✅ Purchase complete</b>"), "{}", reply);
        assert!(reply.contains("Bought 0.020000 BTC for $1,000.00 at $50,000.00"));
        assert!(reply.contains("<b>Balance:</b> $9,000.00"));
        assert!(reply.contains("<b>Total value:</b> $10,000.00"));

        let reply = h.sell("1", "BTC 0.01").await;
        assert!(reply.starts_with("<b>✅ Sale complete</b>"), "{}", reply);
        assert!(reply.contains("<b>Balance:</b> $9,500.00"));

        let reply = h.portfolio("1").await;
        assert!(reply.contains("• BTC: 0.010000 ($500.00)"));
        assert!(reply.contains("<b>Total value:</b> $10,000.00"));
    }

    #[tokio::test]
    async fn test_trade_errors() {
        let (h, store) = handler();

        assert_eq!(
            h.buy("1", "BTC 20000").await,
            "❌ Insufficient balance. You have $10000.00, need $20000.00"
        );
        assert!(h.sell("1", "ETH 1").await.starts_with("❌ Insufficient ETH."));
        assert!(h.buy("1", "BTC -5").await.contains("greater than zero"));
        assert!(h.buy("1", "BTC lots").await.contains("invalid amount 'lots'"));
        assert!(h.buy("1", "BTC").await.contains("<b>Usage:</b> /buy"));
        assert_eq!(h.buy("1", "DOGE 10").await, "❌ Could not get the price for DOGE.");

        let portfolio = store.portfolio("1").await;
        assert_eq!(portfolio.cash_balance, dec!(10000));
        assert!(portfolio.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_empty_portfolio() {
        let (h, _) = handler();
        let reply = h.portfolio("1").await;
        assert!(reply.contains("<b>Balance:</b> $10,000.00"));
        assert!(reply.contains("No holdings yet."));
    }

    #[tokio::test]
    async fn test_analyst_errors_become_fallback_text() {
        let (h, _) = handler();
        let reply = h.analyze("BTC long").await;
        assert!(reply.starts_with("⚠️ Analysis for BTC is unavailable right now"));

        assert!(h.analyze("BTC deep").await.contains("depth must be"));
        assert!(h.analyze("").await.contains("/analyze_ai SYMBOL"));

        assert_eq!(h.forecast("eth force").await, "forecast ETH force=true");
        assert_eq!(h.forecast("eth").await, "forecast ETH force=false");
    }

    #[test]
    fn test_to_the_moon_picks_a_gif() {
        let (h, _) = handler();
        let reply = h.to_the_moon();
        assert!(MOON_GIFS.iter().any(|gif| reply.ends_with(gif)));
    }
}
