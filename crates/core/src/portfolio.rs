//! Paper-trading portfolio.

use crate::{PriceSnapshot, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Cash balance of a freshly created portfolio (USD).
pub const DEFAULT_STARTING_BALANCE: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Digits kept for asset quantities derived from a USD amount.
const QUANTITY_SCALE: u32 = 12;

/// Trade rejection.
#[derive(Debug, Error, PartialEq)]
pub enum PortfolioError {
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Price for {0} must be greater than zero")]
    NonPositivePrice(Symbol),

    #[error("Insufficient balance. You have ${available:.2}, need ${required:.2}")]
    InsufficientBalance { available: Decimal, required: Decimal },

    #[error("Insufficient {symbol}. You have {available}, trying to sell {requested}")]
    InsufficientHoldings {
        symbol: Symbol,
        available: Decimal,
        requested: Decimal,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.write_str("buy"),
            TradeSide::Sell => f.write_str("sell"),
        }
    }
}

/// One executed virtual trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub side: TradeSide,
    pub symbol: Symbol,
    pub amount_usd: Decimal,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualPortfolio {
    pub user_id: String,
    pub cash_balance: Decimal,
    /// Only strictly positive quantities are kept.
    #[serde(default)]
    pub holdings: BTreeMap<Symbol, Decimal>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Holding valued at a current price.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingValue {
    pub symbol: Symbol,
    pub quantity: Decimal,
    pub price: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioValuation {
    pub cash_balance: Decimal,
    pub holdings: Vec<HoldingValue>,
    /// Holdings with no price in the snapshot; they do not count toward totals.
    pub unpriced: Vec<Symbol>,
    pub holdings_value: Decimal,
    pub total_value: Decimal,
}

impl VirtualPortfolio {
    pub fn new(user_id: impl Into<String>, starting_balance: Decimal) -> Self {
        Self {
            user_id: user_id.into(),
            cash_balance: starting_balance,
            holdings: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }

    pub fn quantity(&self, symbol: &Symbol) -> Decimal {
        self.holdings.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    /// Spend `amount_usd` of cash on `symbol` at `price`.
    pub fn buy(
        &mut self,
        symbol: Symbol,
        amount_usd: Decimal,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Transaction, PortfolioError> {
        if amount_usd <= Decimal::ZERO {
            return Err(PortfolioError::NonPositiveAmount);
        }
        if price <= Decimal::ZERO {
            return Err(PortfolioError::NonPositivePrice(symbol));
        }
        if self.cash_balance < amount_usd {
            return Err(PortfolioError::InsufficientBalance {
                available: self.cash_balance,
                required: amount_usd,
            });
        }

        let quantity = (amount_usd / price).round_dp(QUANTITY_SCALE).normalize();
        self.cash_balance -= amount_usd;
        *self.holdings.entry(symbol.clone()).or_insert(Decimal::ZERO) += quantity;

        let tx = Transaction {
            side: TradeSide::Buy,
            symbol,
            amount_usd,
            quantity,
            price,
            timestamp: at,
        };
        self.transactions.push(tx.clone());
        Ok(tx)
    }

    /// Sell `quantity` units of `symbol` at `price`.
    pub fn sell(
        &mut self,
        symbol: Symbol,
        quantity: Decimal,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Transaction, PortfolioError> {
        if quantity <= Decimal::ZERO {
            return Err(PortfolioError::NonPositiveAmount);
        }
        if price <= Decimal::ZERO {
            return Err(PortfolioError::NonPositivePrice(symbol));
        }
        let available = self.quantity(&symbol);
        if available < quantity {
            return Err(PortfolioError::InsufficientHoldings {
                symbol,
                available,
                requested: quantity,
            });
        }

        let amount_usd = quantity * price;
        self.cash_balance += amount_usd;
        let remaining = available - quantity;
        if remaining <= Decimal::ZERO {
            self.holdings.remove(&symbol);
        } else {
            self.holdings.insert(symbol.clone(), remaining);
        }

        let tx = Transaction {
            side: TradeSide::Sell,
            symbol,
            amount_usd,
            quantity,
            price,
            timestamp: at,
        };
        self.transactions.push(tx.clone());
        Ok(tx)
    }

    pub fn valuation(&self, prices: &PriceSnapshot) -> PortfolioValuation {
        let mut holdings = Vec::with_capacity(self.holdings.len());
        let mut unpriced = Vec::new();
        let mut holdings_value = Decimal::ZERO;

        for (symbol, &quantity) in &self.holdings {
            match prices.get(symbol) {
                Some(price) => {
                    let value = quantity * price;
                    holdings_value += value;
                    holdings.push(HoldingValue {
                        symbol: symbol.clone(),
                        quantity,
                        price,
                        value,
                    });
                }
                None => unpriced.push(symbol.clone()),
            }
        }

        PortfolioValuation {
            cash_balance: self.cash_balance,
            holdings,
            unpriced,
            holdings_value,
            total_value: self.cash_balance + holdings_value,
        }
    }
}
