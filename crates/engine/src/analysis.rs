//! Indicator snapshot and trend voting used by market analysis.

use crate::indicators::{
    bollinger, macd, rsi, sma, BollingerBand, BOLLINGER_PERIOD, BOLLINGER_STD_DEV, MACD_FAST,
    MACD_SIGNAL, MACD_SLOW, RSI_PERIOD, SMA_LONG, SMA_SHORT,
};
use std::fmt;

/// Fewest closes needed for a meaningful summary.
pub const MIN_CLOSES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => f.write_str("bullish"),
            Trend::Bearish => f.write_str("bearish"),
            Trend::Neutral => f.write_str("neutral"),
        }
    }
}

/// One indicator's vote on the trend.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendFactor {
    pub trend: Trend,
    pub weight: f64,
    pub reason: String,
}

/// Latest indicator values for a close series.
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicalSummary {
    pub last_close: f64,
    pub rsi: f64,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bollinger: Option<BollingerBand>,
    /// Change over the last 5 closes, as a fraction.
    pub change_short: f64,
    /// Change over the last 20 closes (or the short change with less data).
    pub change_medium: f64,
    pub factors: Vec<TrendFactor>,
    pub trend: Trend,
    /// Average weight of the winning factors, 0..=1.
    pub strength: f64,
}

impl TechnicalSummary {
    /// Summarize a series of closes, oldest first. Returns `None` with fewer
    /// than [`MIN_CLOSES`] points.
    pub fn from_closes(closes: &[f64]) -> Option<Self> {
        if closes.len() < MIN_CLOSES {
            return None;
        }
        let last = closes.len() - 1;
        let last_close = closes[last];

        let rsi = rsi(closes, RSI_PERIOD)[last];
        let sma_short = sma(closes, SMA_SHORT)[last];
        let sma_long = sma(closes, SMA_LONG)[last];
        let m = macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let band = bollinger(closes, BOLLINGER_PERIOD, BOLLINGER_STD_DEV)[last];

        let change_short = change_over(closes, 5).unwrap_or(0.0);
        let change_medium = change_over(closes, 20).unwrap_or(change_short);

        let mut summary = Self {
            last_close,
            rsi,
            sma_short,
            sma_long,
            macd_line: m.line[last],
            macd_signal: m.signal[last],
            macd_histogram: m.histogram[last],
            bollinger: band,
            change_short,
            change_medium,
            factors: Vec::new(),
            trend: Trend::Neutral,
            strength: 0.0,
        };
        summary.factors = summary.vote();
        let (trend, strength) = tally(&summary.factors);
        summary.trend = trend;
        summary.strength = strength;
        Some(summary)
    }

    fn vote(&self) -> Vec<TrendFactor> {
        let factor = |trend, weight, reason: String| TrendFactor {
            trend,
            weight,
            reason,
        };
        let mut factors = Vec::with_capacity(5);

        if let (Some(short), Some(long)) = (self.sma_short, self.sma_long) {
            factors.push(if short > long {
                factor(Trend::Bullish, 0.7, "short SMA above long SMA".into())
            } else if short < long {
                factor(Trend::Bearish, 0.7, "short SMA below long SMA".into())
            } else {
                factor(Trend::Neutral, 0.3, "SMAs level".into())
            });
        }

        factors.push(if self.macd_histogram > 0.0 && self.macd_line > self.macd_signal {
            factor(Trend::Bullish, 0.6, "MACD positive and rising".into())
        } else if self.macd_histogram < 0.0 && self.macd_line < self.macd_signal {
            factor(Trend::Bearish, 0.6, "MACD negative and falling".into())
        } else {
            factor(Trend::Neutral, 0.4, "MACD in transition".into())
        });

        factors.push(if self.rsi > 60.0 {
            factor(Trend::Bullish, 0.5, format!("strong RSI ({:.1})", self.rsi))
        } else if self.rsi < 40.0 {
            factor(Trend::Bearish, 0.5, format!("weak RSI ({:.1})", self.rsi))
        } else {
            factor(Trend::Neutral, 0.5, format!("neutral RSI ({:.1})", self.rsi))
        });

        factors.push(if self.change_short > 0.02 {
            factor(Trend::Bullish, 0.8, format!("recent rise of {:.1}%", self.change_short * 100.0))
        } else if self.change_short < -0.02 {
            factor(Trend::Bearish, 0.8, format!("recent drop of {:.1}%", self.change_short * 100.0))
        } else {
            factor(Trend::Neutral, 0.6, "price stable recently".into())
        });

        factors.push(if self.change_medium > 0.05 {
            factor(Trend::Bullish, 0.7, format!("{:.1}% up over 20 days", self.change_medium * 100.0))
        } else if self.change_medium < -0.05 {
            factor(Trend::Bearish, 0.7, format!("{:.1}% down over 20 days", self.change_medium * 100.0))
        } else {
            factor(Trend::Neutral, 0.5, "sideways over 20 days".into())
        });

        factors
    }

    /// Reasons of the factors that voted with the winning trend.
    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.factors
            .iter()
            .filter(move |f| f.trend == self.trend)
            .map(|f| f.reason.as_str())
    }
}

fn change_over(closes: &[f64], lookback: usize) -> Option<f64> {
    if closes.len() < lookback {
        return None;
    }
    let base = closes[closes.len() - lookback];
    let last = closes[closes.len() - 1];
    (base != 0.0).then(|| (last - base) / base)
}

/// A trend wins with a strict plurality; otherwise the market is neutral.
fn tally(factors: &[TrendFactor]) -> (Trend, f64) {
    let count = |t: Trend| factors.iter().filter(|f| f.trend == t).count();
    let (up, down, flat) = (count(Trend::Bullish), count(Trend::Bearish), count(Trend::Neutral));

    let trend = if up > down && up > flat {
        Trend::Bullish
    } else if down > up && down > flat {
        Trend::Bearish
    } else {
        Trend::Neutral
    };

    let winners: Vec<f64> = factors
        .iter()
        .filter(|f| f.trend == trend)
        .map(|f| f.weight)
        .collect();
    let strength = if winners.is_empty() {
        0.0
    } else {
        winners.iter().sum::<f64>() / winners.len() as f64
    };
    (trend, strength)
}
