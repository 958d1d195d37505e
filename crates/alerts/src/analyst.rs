//! Market analysis behind `/analyze_ai` and `/forecast`.

use crate::config::AnalystConfig;
use alertbot_core::{format_price, Symbol};
use alertbot_engine::{TechnicalSummary, Trend, MIN_CLOSES};
use alertbot_feeds::{FeedError, PriceSource};
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// Closes used for support and resistance.
const RANGE_WINDOW: usize = 20;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Market data unavailable: {0}")]
    Feed(#[from] FeedError),
    #[error("Not enough price history for {symbol} ({got} daily closes, need {})", MIN_CLOSES)]
    InsufficientData { symbol: Symbol, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisDepth {
    Short,
    #[default]
    Normal,
    Long,
}

impl AnalysisDepth {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "short" => Some(Self::Short),
            "normal" => Some(Self::Normal),
            "long" => Some(Self::Long),
            _ => None,
        }
    }
}

/// Produces human-readable (HTML) market commentary.
#[async_trait]
pub trait MarketAnalyst: Send + Sync {
    async fn analyze(&self, symbol: &Symbol, depth: AnalysisDepth) -> Result<String, AnalysisError>;

    /// Price outlook. Implementations may serve a cached forecast unless `force`.
    async fn forecast(&self, symbol: &Symbol, force: bool) -> Result<String, AnalysisError>;
}

/// Indicator-based analyst.
pub struct TechnicalAnalyst {
    source: Arc<dyn PriceSource>,
    config: AnalystConfig,
    forecasts: DashMap<Symbol, (Instant, String)>,
}

impl TechnicalAnalyst {
    pub fn new(source: Arc<dyn PriceSource>, config: AnalystConfig) -> Self {
        Self {
            source,
            config,
            forecasts: DashMap::new(),
        }
    }

    async fn closes(&self, symbol: &Symbol) -> Result<Vec<f64>, AnalysisError> {
        let closes = self
            .source
            .fetch_daily_closes(symbol, self.config.history_days)
            .await?;
        if closes.len() < MIN_CLOSES {
            return Err(AnalysisError::InsufficientData {
                symbol: symbol.clone(),
                got: closes.len(),
            });
        }
        Ok(closes)
    }

    fn summarize(symbol: &Symbol, closes: &[f64]) -> Result<TechnicalSummary, AnalysisError> {
        TechnicalSummary::from_closes(closes).ok_or_else(|| AnalysisError::InsufficientData {
            symbol: symbol.clone(),
            got: closes.len(),
        })
    }

    fn cached_forecast(&self, symbol: &Symbol) -> Option<String> {
        self.forecasts
            .get(symbol)
            .filter(|entry| entry.0.elapsed() < self.config.forecast_min_interval)
            .map(|entry| entry.1.clone())
    }
}

#[async_trait]
impl MarketAnalyst for TechnicalAnalyst {
    async fn analyze(&self, symbol: &Symbol, depth: AnalysisDepth) -> Result<String, AnalysisError> {
        let closes = self.closes(symbol).await?;
        let summary = Self::summarize(symbol, &closes)?;
        Ok(render_analysis(symbol, &summary, depth))
    }

    async fn forecast(&self, symbol: &Symbol, force: bool) -> Result<String, AnalysisError> {
        if !force {
            if let Some(cached) = self.cached_forecast(symbol) {
                debug!(symbol = %symbol, "Serving cached forecast");
                return Ok(cached);
            }
        }

        let closes = self.closes(symbol).await?;
        let summary = Self::summarize(symbol, &closes)?;
        let text = render_forecast(symbol, &summary, &closes);
        self.forecasts
            .insert(symbol.clone(), (Instant::now(), text.clone()));
        Ok(text)
    }
}

fn usd(value: f64) -> String {
    Decimal::from_f64(value)
        .map(format_price)
        .unwrap_or_else(|| format!("${:.2}", value))
}

fn pct(fraction: f64) -> String {
    format!("{:+.2}%", fraction * 100.0)
}

fn trend_icon(trend: Trend) -> &'static str {
    match trend {
        Trend::Bullish => "🟢",
        Trend::Bearish => "🔴",
        Trend::Neutral => "⚪",
    }
}

fn rsi_reading(rsi: f64) -> &'static str {
    if rsi >= 70.0 {
        "overbought"
    } else if rsi <= 30.0 {
        "oversold"
    } else {
        "neutral zone"
    }
}

fn render_analysis(symbol: &Symbol, s: &TechnicalSummary, depth: AnalysisDepth) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<b>📊 {} technical analysis</b>\n", symbol);
    let _ = writeln!(
        out,
        "<b>Trend:</b> {} {} (strength {:.0}%)",
        trend_icon(s.trend),
        s.trend,
        s.strength * 100.0
    );
    let _ = writeln!(out, "<b>Last close:</b> {}", usd(s.last_close));
    let _ = writeln!(out, "<b>RSI(14):</b> {:.1} ({})", s.rsi, rsi_reading(s.rsi));

    if depth == AnalysisDepth::Short {
        return out;
    }

    if let Some(sma) = s.sma_short {
        let _ = writeln!(out, "<b>SMA(20):</b> {}", usd(sma));
    }
    if let Some(sma) = s.sma_long {
        let _ = writeln!(out, "<b>SMA(50):</b> {}", usd(sma));
    }
    let _ = writeln!(
        out,
        "<b>MACD:</b> {:.4} / signal {:.4} / hist {:.4}",
        s.macd_line, s.macd_signal, s.macd_histogram
    );
    if let Some(band) = s.bollinger {
        let _ = writeln!(
            out,
            "<b>Bollinger(20, 2σ):</b> {} – {}",
            usd(band.lower),
            usd(band.upper)
        );
    }

    let reasons: Vec<&str> = s.reasons().collect();
    if !reasons.is_empty() {
        let _ = writeln!(out, "\n<b>Signals:</b>");
        for reason in reasons {
            let _ = writeln!(out, "• {}", reason);
        }
    }

    if depth == AnalysisDepth::Long {
        let _ = writeln!(
            out,
            "\n<b>Change:</b> 5d {} | 20d {}",
            pct(s.change_short),
            pct(s.change_medium)
        );
        let _ = writeln!(out, "\n<b>All factors:</b>");
        for f in &s.factors {
            let _ = writeln!(out, "{} {} (weight {:.1})", trend_icon(f.trend), f.reason, f.weight);
        }
    }

    let _ = write!(out, "\n<i>Indicator-based summary, not financial advice.</i>");
    out
}

fn render_forecast(symbol: &Symbol, s: &TechnicalSummary, closes: &[f64]) -> String {
    let recent = &closes[closes.len().saturating_sub(RANGE_WINDOW)..];
    let support = recent.iter().copied().fold(f64::INFINITY, f64::min);
    let resistance = recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let outlook = match s.trend {
        Trend::Bullish => "Upside bias: a test of resistance is likely if momentum holds.",
        Trend::Bearish => "Downside bias: watch for a retest of support.",
        Trend::Neutral => "Range-bound: expect trading between support and resistance.",
    };

    let mut out = String::new();
    let _ = writeln!(out, "<b>🔮 {} forecast</b>\n", symbol);
    let _ = writeln!(out, "<b>Outlook:</b> {} {}", trend_icon(s.trend), s.trend);
    let _ = writeln!(out, "<b>Confidence:</b> {:.0}%", s.strength * 100.0);
    let _ = writeln!(out, "<b>Last close:</b> {}", usd(s.last_close));
    let _ = writeln!(out, "<b>Support:</b> {}", usd(support));
    let _ = writeln!(out, "<b>Resistance:</b> {}", usd(resistance));
    if let Some(band) = s.bollinger {
        let _ = writeln!(
            out,
            "<b>Expected range:</b> {} – {}",
            usd(band.lower),
            usd(band.upper)
        );
    }
    let _ = writeln!(out, "\n{}", outlook);
    let _ = write!(out, "\n<i>Indicator-based forecast, not financial advice.</i>");
    out
}
