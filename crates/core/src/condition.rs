//! Alert conditions and boolean condition trees.

use crate::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Relative tolerance for `=` ("reaches"): 0.1% of the threshold.
pub const DEFAULT_EQUALITY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Comparison operator of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    /// Price reaches the threshold, within a relative tolerance.
    #[serde(rename = "=")]
    Equal,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::Equal => "=",
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '>' => Some(Operator::Greater),
            '<' => Some(Operator::Less),
            '=' => Some(Operator::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `SYMBOL OP THRESHOLD` comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertCondition {
    pub symbol: Symbol,
    pub operator: Operator,
    pub threshold: Decimal,
}

impl AlertCondition {
    pub fn new(symbol: impl Into<Symbol>, operator: Operator, threshold: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            operator,
            threshold: threshold.normalize(),
        }
    }

    /// Check the condition against a live price.
    pub fn is_met(&self, price: Decimal, equality_tolerance: Decimal) -> bool {
        match self.operator {
            Operator::Greater => price > self.threshold,
            Operator::Less => price < self.threshold,
            Operator::Equal => {
                let band = self.threshold * equality_tolerance;
                (price - self.threshold).abs() <= band
            }
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.symbol, self.operator, self.threshold)
    }
}

/// Boolean expression over conditions.
///
/// Build compound nodes through [`Expr::and`] / [`Expr::or`]: they flatten
/// nested nodes of the same kind and collapse single operands, so that two
/// expressions that print the same are structurally equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Condition(AlertCondition),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    pub fn condition(symbol: impl Into<Symbol>, operator: Operator, threshold: Decimal) -> Self {
        Expr::Condition(AlertCondition::new(symbol, operator, threshold))
    }

    pub fn and(operands: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Expr::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        collapse(flat, Expr::And)
    }

    pub fn or(operands: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Expr::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        collapse(flat, Expr::Or)
    }

    /// All leaf conditions, left to right.
    pub fn conditions(&self) -> Vec<&AlertCondition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a AlertCondition>) {
        match self {
            Expr::Condition(c) => out.push(c),
            Expr::And(ops) | Expr::Or(ops) => {
                for op in ops {
                    op.collect_conditions(out);
                }
            }
        }
    }

    /// Distinct symbols referenced by this expression.
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        self.conditions().into_iter().map(|c| c.symbol.clone()).collect()
    }

    pub fn references(&self, symbol: &Symbol) -> bool {
        self.conditions().iter().any(|c| &c.symbol == symbol)
    }

    pub fn is_compound(&self) -> bool {
        !matches!(self, Expr::Condition(_))
    }
}

fn collapse(mut operands: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        wrap(operands)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Condition(c) => write!(f, "{}", c),
            Expr::And(ops) => {
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    // AND binds tighter than OR, so OR operands need grouping.
                    if matches!(op, Expr::Or(_)) {
                        write!(f, "({})", op)?;
                    } else {
                        write!(f, "{}", op)?;
                    }
                }
                Ok(())
            }
            Expr::Or(ops) => {
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{}", op)?;
                }
                Ok(())
            }
        }
    }
}

impl From<AlertCondition> for Expr {
    fn from(c: AlertCondition) -> Self {
        Expr::Condition(c)
    }
}
