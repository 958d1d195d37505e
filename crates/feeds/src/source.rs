//! Price source abstraction.

use crate::FeedError;
use alertbot_core::{PriceSnapshot, Quote, Symbol};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Anything that can supply live prices.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current prices for `symbols`. Symbols the source does not know are
    /// left out of the snapshot rather than failing the whole call.
    async fn fetch_prices(&self, symbols: &[Symbol]) -> Result<PriceSnapshot, FeedError>;

    /// 24h quote for a single symbol.
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, FeedError>;

    /// Daily close prices, oldest first, at most `limit` of them.
    async fn fetch_daily_closes(&self, symbol: &Symbol, limit: usize) -> Result<Vec<f64>, FeedError>;

    /// Current price of one symbol.
    async fn fetch_price(&self, symbol: &Symbol) -> Result<Decimal, FeedError> {
        let snapshot = self.fetch_prices(std::slice::from_ref(symbol)).await?;
        snapshot
            .get(symbol)
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.clone()))
    }
}
