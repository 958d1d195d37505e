//! Price snapshots, quotes and price formatting.

use crate::Symbol;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prices observed during one poll tick, keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSnapshot(BTreeMap<Symbol, Decimal>);

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol, price: Decimal) {
        self.0.insert(symbol, price);
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Decimal> {
        self.0.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Decimal)> {
        self.0.iter()
    }

    /// Prices restricted to the given symbols (missing ones are skipped).
    pub fn subset<'a>(&self, symbols: impl IntoIterator<Item = &'a Symbol>) -> PriceSnapshot {
        symbols
            .into_iter()
            .filter_map(|s| self.get(s).map(|p| (s.clone(), p)))
            .collect()
    }

    /// Merge another snapshot in, overwriting existing symbols.
    pub fn extend(&mut self, other: PriceSnapshot) {
        self.0.extend(other.0);
    }
}

impl FromIterator<(Symbol, Decimal)> for PriceSnapshot {
    fn from_iter<I: IntoIterator<Item = (Symbol, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 24h market quote for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: Decimal,
    /// 24h change in percent, when the exchange reports it.
    pub change_24h_pct: Option<Decimal>,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub quote_volume: Decimal,
}

/// Format a price with precision based on magnitude.
pub fn format_price(price: Decimal) -> String {
    if price.is_zero() {
        return "$0".to_string();
    }
    let sign = if price.is_sign_negative() { "-" } else { "" };
    let abs_price = price.abs();
    let body = if abs_price >= Decimal::ONE_THOUSAND {
        group_thousands(abs_price)
    } else if abs_price >= Decimal::ONE {
        fixed(abs_price, 2)
    } else if abs_price >= Decimal::new(1, 2) {
        fixed(abs_price, 4)
    } else {
        fixed(abs_price, 8)
    };
    format!("{}${}", sign, body)
}

/// Format a USD amount with two decimals and thousands separators.
pub fn format_usd(amount: Decimal) -> String {
    let sign = if amount.is_sign_negative() && !amount.is_zero() { "-" } else { "" };
    format!("{}${}", sign, group_thousands(amount.abs()))
}

/// Format a quantity of an asset (six decimals, like exchange balances).
pub fn format_quantity(quantity: Decimal) -> String {
    fixed(quantity, 6)
}

fn fixed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", dp as usize, rounded)
}

fn group_thousands(value: Decimal) -> String {
    let text = fixed(value, 2);
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}.{}", grouped, frac_part)
}

/// Format a percentage change with sign and arrow.
pub fn format_change(change_pct: Option<Decimal>) -> String {
    match change_pct {
        Some(c) if c.is_zero() => "0.00%".to_string(),
        Some(c) if c.is_sign_positive() => format!("📈 +{}%", fixed(c, 2)),
        Some(c) => format!("📉 {}%", fixed(c, 2)),
        None => "N/A".to_string(),
    }
}
