//! Ticker symbols.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quote asset appended to a base symbol when talking to an exchange.
pub const DEFAULT_QUOTE_ASSET: &str = "USDT";

/// Normalized (trimmed, upper-case) ticker symbol such as `BTC` or `BTC-USD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(CompactString);

impl Symbol {
    /// Create a symbol, normalizing case and surrounding whitespace.
    /// No validation is performed; use [`Symbol::parse`] for user input.
    pub fn new(raw: &str) -> Self {
        Self(CompactString::new(raw.trim().to_ascii_uppercase()))
    }

    /// Parse user input into a symbol.
    ///
    /// Accepts ASCII alphanumerics plus `-`, `/`, `.` and `_`, must start with
    /// an alphanumeric and contain at least one letter (so `70000` is never a
    /// symbol but `1INCH` is).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let mut chars = raw.chars();
        let first = chars.next()?;
        if !first.is_ascii_alphanumeric() {
            return None;
        }
        if !raw.chars().all(is_symbol_char) {
            return None;
        }
        if !raw.chars().any(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(Self::new(raw))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Base asset with any `-QUOTE` or `/QUOTE` suffix removed
    /// (`BTC-USD` -> `BTC`, `ETH/USDT` -> `ETH`).
    pub fn base(&self) -> &str {
        let s = self.0.as_str();
        let s = s.split('-').next().unwrap_or(s);
        s.split('/').next().unwrap_or(s)
    }

    /// Exchange ticker for this symbol against a quote asset (`BTC` -> `BTCUSDT`).
    pub fn ticker(&self, quote_asset: &str) -> String {
        format!("{}{}", self.base(), quote_asset.to_ascii_uppercase())
    }

    /// TradingView chart page for this symbol.
    pub fn chart_link(&self) -> String {
        format!("https://www.tradingview.com/symbols/{}USD/", self.base())
    }
}

/// Characters allowed inside a symbol.
pub fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '/' | '.' | '_')
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
