//! Binance public REST price fetcher.
//!
//! Uses only unauthenticated market-data endpoints:
//! `/api/v3/ticker/price`, `/api/v3/ticker/24hr` and `/api/v3/klines`.

use crate::{FeedError, PriceSource};
use alertbot_core::{PriceSnapshot, Quote, Symbol, DEFAULT_QUOTE_ASSET};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Configuration for the REST fetcher.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    /// Quote asset appended to every symbol (`BTC` -> `BTCUSDT`).
    pub quote_asset: String,
    pub request_timeout: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            quote_asset: DEFAULT_QUOTE_ASSET.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Binance REST API price fetcher.
pub struct BinanceRestFetcher {
    client: reqwest::Client,
    config: RestConfig,
}

impl BinanceRestFetcher {
    pub fn new(config: RestConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn ticker(&self, symbol: &Symbol) -> String {
        symbol.ticker(&self.config.quote_asset)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FeedError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if status.as_u16() == 429 || status.as_u16() == 418 {
            return Err(FeedError::RateLimitExceeded);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!("Binance: {} returned HTTP {}", path, status);
            return Err(FeedError::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl PriceSource for BinanceRestFetcher {
    /// Fetches ALL ticker prices in one call, then filters to the requested symbols.
    async fn fetch_prices(&self, symbols: &[Symbol]) -> Result<PriceSnapshot, FeedError> {
        if symbols.is_empty() {
            return Ok(PriceSnapshot::new());
        }

        let mut wanted: HashMap<String, Vec<Symbol>> = HashMap::new();
        for symbol in symbols {
            wanted.entry(self.ticker(symbol)).or_default().push(symbol.clone());
        }

        let json = self.get_json("/api/v3/ticker/price", &[]).await?;
        let snapshot = parse_ticker_prices(&json, &wanted)?;

        debug!(
            "Binance: fetched {}/{} prices",
            snapshot.len(),
            symbols.len()
        );
        Ok(snapshot)
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, FeedError> {
        let query = [("symbol", self.ticker(symbol))];
        let json = match self.get_json("/api/v3/ticker/24hr", &query).await {
            // Binance answers 400 for unknown symbols.
            Err(FeedError::Http { status: 400, .. }) => {
                return Err(FeedError::UnknownSymbol(symbol.clone()))
            }
            other => other?,
        };
        parse_24hr_ticker(symbol, &json)
    }

    async fn fetch_daily_closes(&self, symbol: &Symbol, limit: usize) -> Result<Vec<f64>, FeedError> {
        let query = [
            ("symbol", self.ticker(symbol)),
            ("interval", "1d".to_string()),
            ("limit", limit.clamp(1, 1000).to_string()),
        ];
        let json = match self.get_json("/api/v3/klines", &query).await {
            Err(FeedError::Http { status: 400, .. }) => {
                return Err(FeedError::UnknownSymbol(symbol.clone()))
            }
            other => other?,
        };
        parse_kline_closes(&json)
    }
}

fn decimal_field(value: &Value, field: &str) -> Result<Decimal, FeedError> {
    let raw = value[field]
        .as_str()
        .ok_or_else(|| FeedError::ParseError(format!("missing field {}", field)))?;
    Decimal::from_str(raw)
        .map(|d| d.normalize())
        .map_err(|_| FeedError::ParseError(format!("invalid {}: {}", field, raw)))
}

/// Parse `[{"symbol":"BTCUSDT","price":"67000.01"}, ...]`, keeping the
/// tickers listed in `wanted` (ticker -> symbols). Aliases such as `BTC` and
/// `BTC-USD` share one ticker and each get the price.
pub fn parse_ticker_prices(
    json: &Value,
    wanted: &HashMap<String, Vec<Symbol>>,
) -> Result<PriceSnapshot, FeedError> {
    let tickers = json
        .as_array()
        .ok_or_else(|| FeedError::ParseError("expected ticker array".to_string()))?;

    let mut snapshot = PriceSnapshot::new();
    for ticker in tickers {
        let Some((name, aliases)) = ticker["symbol"]
            .as_str()
            .and_then(|t| wanted.get_key_value(t))
        else {
            continue;
        };
        match decimal_field(ticker, "price") {
            Ok(price) if price > Decimal::ZERO => {
                for symbol in aliases {
                    snapshot.insert(symbol.clone(), price);
                }
            }
            Ok(_) => debug!("Binance: ignoring non-positive price for {}", name),
            Err(e) => debug!("Binance: {} for {}", e, name),
        }
    }
    Ok(snapshot)
}

/// Parse a `/api/v3/ticker/24hr` object.
pub fn parse_24hr_ticker(symbol: &Symbol, json: &Value) -> Result<Quote, FeedError> {
    if !json.is_object() {
        return Err(FeedError::ParseError("expected ticker object".to_string()));
    }
    Ok(Quote {
        symbol: symbol.clone(),
        price: decimal_field(json, "lastPrice")?,
        change_24h_pct: decimal_field(json, "priceChangePercent").ok(),
        high_24h: decimal_field(json, "highPrice")?,
        low_24h: decimal_field(json, "lowPrice")?,
        quote_volume: decimal_field(json, "quoteVolume").unwrap_or(Decimal::ZERO),
    })
}

/// Parse kline rows `[open_time, open, high, low, close, ...]` into closes.
pub fn parse_kline_closes(json: &Value) -> Result<Vec<f64>, FeedError> {
    let rows = json
        .as_array()
        .ok_or_else(|| FeedError::ParseError("expected kline array".to_string()))?;

    rows.iter()
        .map(|row| {
            row.get(4)
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| FeedError::ParseError(format!("invalid kline row: {}", row)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn wanted(symbols: &[&str]) -> HashMap<String, Vec<Symbol>> {
        let mut wanted: HashMap<String, Vec<Symbol>> = HashMap::new();
        for s in symbols {
            let symbol = Symbol::new(s);
            wanted
                .entry(symbol.ticker(DEFAULT_QUOTE_ASSET))
                .or_default()
                .push(symbol);
        }
        wanted
    }

    #[test]
    fn test_parse_ticker_prices_filters() {
        let json = json!([
            {"symbol": "BTCUSDT", "price": "67000.01000000"},
            {"symbol": "ETHUSDT", "price": "3000.50000000"},
            {"symbol": "ETHBTC", "price": "0.05"},
            {"symbol": "ADAUSDT", "price": "garbage"}
        ]);
        let snapshot = parse_ticker_prices(&json, &wanted(&["BTC", "ETH-USD", "ADA", "XYZ"])).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(&Symbol::new("BTC")), Some(dec!(67000.01)));
        assert_eq!(snapshot.get(&Symbol::new("ETH-USD")), Some(dec!(3000.5)));
        assert_eq!(snapshot.get(&Symbol::new("ADA")), None);
    }

    #[test]
    fn test_parse_ticker_prices_fills_every_alias() {
        let json = json!([
            {"symbol": "BTCUSDT", "price": "71000.00"},
            {"symbol": "ETHUSDT", "price": "3000.00"}
        ]);
        let wanted = wanted(&["BTC", "BTC-USD", "ETH"]);
        assert_eq!(wanted.len(), 2);

        let snapshot = parse_ticker_prices(&json, &wanted).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get(&Symbol::new("BTC")), Some(dec!(71000)));
        assert_eq!(snapshot.get(&Symbol::new("BTC-USD")), Some(dec!(71000)));
        assert_eq!(snapshot.get(&Symbol::new("ETH")), Some(dec!(3000)));
    }

    #[test]
    fn test_parse_ticker_prices_rejects_non_array() {
        let err = parse_ticker_prices(&json!({"code": -1}), &wanted(&["BTC"])).unwrap_err();
        assert!(matches!(err, FeedError::ParseError(_)));
    }

    #[test]
    fn test_parse_24hr_ticker() {
        let json = json!({
            "symbol": "BTCUSDT",
            "priceChangePercent": "-1.250",
            "lastPrice": "67000.00",
            "highPrice": "68000.00",
            "lowPrice": "66000.00",
            "quoteVolume": "123456789.12"
        });
        let quote = parse_24hr_ticker(&Symbol::new("BTC"), &json).unwrap();
        assert_eq!(quote.price, dec!(67000));
        assert_eq!(quote.change_24h_pct, Some(dec!(-1.25)));
        assert_eq!(quote.high_24h, dec!(68000));
        assert_eq!(quote.low_24h, dec!(66000));
        assert_eq!(quote.quote_volume, dec!(123456789.12));
    }

    #[test]
    fn test_parse_24hr_ticker_missing_price() {
        let json = json!({"symbol": "BTCUSDT", "highPrice": "1", "lowPrice": "1"});
        assert!(parse_24hr_ticker(&Symbol::new("BTC"), &json).is_err());
    }

    #[test]
    fn test_parse_kline_closes() {
        let json = json!([
            [1700000000000u64, "100.0", "110.0", "90.0", "105.5", "1000"],
            [1700086400000u64, "105.5", "120.0", "100.0", "118.25", "1200"]
        ]);
        assert_eq!(parse_kline_closes(&json).unwrap(), vec![105.5, 118.25]);

        let bad = json!([[1700000000000u64, "100.0"]]);
        assert!(parse_kline_closes(&bad).is_err());
    }
}
