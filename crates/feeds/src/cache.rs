//! TTL price cache in front of any [`PriceSource`].

use crate::{FeedError, PriceSource};
use alertbot_core::{PriceSnapshot, Quote, Symbol};
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: Decimal,
    fetched_at: Instant,
}

/// Serves prices younger than `ttl` from memory and fetches only the rest.
pub struct CachedPriceSource {
    inner: Arc<dyn PriceSource>,
    ttl: Duration,
    prices: DashMap<Symbol, CachedPrice>,
}

impl CachedPriceSource {
    pub fn new(inner: Arc<dyn PriceSource>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            prices: DashMap::new(),
        }
    }

    fn fresh(&self, symbol: &Symbol, now: Instant) -> Option<Decimal> {
        self.prices
            .get(symbol)
            .filter(|c| now.duration_since(c.fetched_at) < self.ttl)
            .map(|c| c.price)
    }

    fn store(&self, symbol: Symbol, price: Decimal, at: Instant) {
        self.prices.insert(symbol, CachedPrice { price, fetched_at: at });
    }

    /// Number of cached entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn clear(&self) {
        self.prices.clear();
    }
}

#[async_trait]
impl PriceSource for CachedPriceSource {
    async fn fetch_prices(&self, symbols: &[Symbol]) -> Result<PriceSnapshot, FeedError> {
        let now = Instant::now();
        let mut snapshot = PriceSnapshot::new();
        let mut missing = Vec::new();

        for symbol in symbols {
            match self.fresh(symbol, now) {
                Some(price) => snapshot.insert(symbol.clone(), price),
                None => missing.push(symbol.clone()),
            }
        }

        if !missing.is_empty() {
            debug!(
                "Price cache: {} hit(s), fetching {} symbol(s)",
                snapshot.len(),
                missing.len()
            );
            let fetched = self.inner.fetch_prices(&missing).await?;
            let at = Instant::now();
            for (symbol, price) in fetched.iter() {
                self.store(symbol.clone(), *price, at);
            }
            snapshot.extend(fetched);
        }

        Ok(snapshot)
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, FeedError> {
        let quote = self.inner.fetch_quote(symbol).await?;
        self.store(symbol.clone(), quote.price, Instant::now());
        Ok(quote)
    }

    async fn fetch_daily_closes(&self, symbol: &Symbol, limit: usize) -> Result<Vec<f64>, FeedError> {
        self.inner.fetch_daily_closes(symbol, limit).await
    }
}
