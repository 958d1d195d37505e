//! Alert evaluator: matches condition trees against a price snapshot.

use alertbot_core::{AlertCondition, Expr, PriceSnapshot, DEFAULT_EQUALITY_TOLERANCE};
use rust_decimal::Decimal;

/// Outcome of one leaf condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionResult {
    pub condition: AlertCondition,
    /// `None` when the snapshot has no price for the symbol.
    pub price: Option<Decimal>,
    pub met: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    equality_tolerance: Decimal,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(DEFAULT_EQUALITY_TOLERANCE)
    }
}

impl Evaluator {
    pub fn new(equality_tolerance: Decimal) -> Self {
        Self {
            equality_tolerance: equality_tolerance.abs(),
        }
    }

    pub fn equality_tolerance(&self) -> Decimal {
        self.equality_tolerance
    }

    /// Evaluate with short-circuiting. A missing price makes its leaf false,
    /// and so does a compound node with no operands.
    pub fn evaluate(&self, expr: &Expr, prices: &PriceSnapshot) -> bool {
        match expr {
            Expr::Condition(c) => self.check(c, prices),
            Expr::And(ops) => !ops.is_empty() && ops.iter().all(|op| self.evaluate(op, prices)),
            Expr::Or(ops) => ops.iter().any(|op| self.evaluate(op, prices)),
        }
    }

    /// Every leaf with its observed price, left to right (no short-circuit).
    pub fn evaluate_detailed(&self, expr: &Expr, prices: &PriceSnapshot) -> Vec<ConditionResult> {
        expr.conditions()
            .into_iter()
            .map(|c| {
                let price = prices.get(&c.symbol);
                ConditionResult {
                    condition: c.clone(),
                    price,
                    met: price.is_some_and(|p| c.is_met(p, self.equality_tolerance)),
                }
            })
            .collect()
    }

    fn check(&self, condition: &AlertCondition, prices: &PriceSnapshot) -> bool {
        prices
            .get(&condition.symbol)
            .is_some_and(|p| condition.is_met(p, self.equality_tolerance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_condition;
    use alertbot_core::Symbol;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn prices(pairs: &[(&str, Decimal)]) -> PriceSnapshot {
        pairs.iter().map(|(s, p)| (Symbol::new(s), *p)).collect()
    }

    #[test]
    fn test_single_condition() {
        let eval = Evaluator::default();
        let expr = parse_condition("BTC > 70000").unwrap();
        assert!(eval.evaluate(&expr, &prices(&[("BTC", dec!(70001))])));
        assert!(!eval.evaluate(&expr, &prices(&[("BTC", dec!(69999))])));
    }

    #[test]
    fn test_missing_symbol_is_false() {
        let eval = Evaluator::default();
        let expr = parse_condition("BTC > 1 or ETH < 5000").unwrap();
        assert!(eval.evaluate(&expr, &prices(&[("ETH", dec!(3000))])));

        let expr = parse_condition("BTC > 1 and ETH < 5000").unwrap();
        assert!(!eval.evaluate(&expr, &prices(&[("ETH", dec!(3000))])));
        assert!(!eval.evaluate(&expr, &PriceSnapshot::new()));
    }

    #[test]
    fn test_empty_compound_never_matches() {
        let eval = Evaluator::default();
        let snapshot = prices(&[("BTC", dec!(70001))]);
        assert!(!eval.evaluate(&Expr::And(vec![]), &snapshot));
        assert!(!eval.evaluate(&Expr::Or(vec![]), &snapshot));

        let nested = Expr::Or(vec![Expr::And(vec![]), parse_condition("BTC > 70000").unwrap()]);
        assert!(eval.evaluate(&nested, &snapshot));
    }

    #[test]
    fn test_precedence_in_evaluation() {
        let eval = Evaluator::default();
        // BTC > 1 or (ETH > 2 and ADA > 3)
        let expr = parse_condition("BTC > 1 or ETH > 2 and ADA > 3").unwrap();
        let snapshot = prices(&[("BTC", dec!(2)), ("ETH", dec!(0)), ("ADA", dec!(0))]);
        assert!(eval.evaluate(&expr, &snapshot));

        // (BTC > 1 or ETH > 2) and ADA > 3
        let expr = parse_condition("(BTC > 1 or ETH > 2) and ADA > 3").unwrap();
        assert!(!eval.evaluate(&expr, &snapshot));
    }

    #[test]
    fn test_equality_tolerance_is_configurable() {
        let expr = parse_condition("ADA 0.5").unwrap();
        let snapshot = prices(&[("ADA", dec!(0.5004))]);
        assert!(Evaluator::default().evaluate(&expr, &snapshot));
        assert!(!Evaluator::new(dec!(0.0001)).evaluate(&expr, &snapshot));
        assert!(Evaluator::new(dec!(0.01)).evaluate(&expr, &prices(&[("ADA", dec!(0.495))])));
    }

    #[test]
    fn test_detailed_lists_every_leaf() {
        let eval = Evaluator::default();
        let expr = parse_condition("BTC > 70000 or ETH < 3000").unwrap();
        let results = eval.evaluate_detailed(&expr, &prices(&[("BTC", dec!(71000))]));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].price, Some(dec!(71000)));
        assert!(results[0].met);
        assert_eq!(results[1].condition.symbol, Symbol::new("ETH"));
        assert_eq!(results[1].price, None);
        assert!(!results[1].met);
    }
}
