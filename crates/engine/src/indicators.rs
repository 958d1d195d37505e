//! Technical indicators over daily close prices.
//!
//! Series are aligned with the input: index `i` is the indicator value at
//! close `i`. Windows that are not yet full yield `None` (or the neutral RSI
//! of 50).

pub const RSI_PERIOD: usize = 14;
pub const SMA_SHORT: usize = 20;
pub const SMA_LONG: usize = 50;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD_DEV: f64 = 2.0;

/// Neutral RSI used before the first full window.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Simple moving average.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        out.push((i + 1 >= period).then(|| sum / period as f64));
    }
    out
}

/// Exponential moving average seeded with the first value
/// (`alpha = 2 / (period + 1)`).
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            Some(p) => alpha * v + (1.0 - alpha) * p,
            None => v,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Relative strength index using rolling means of gains and losses.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![RSI_NEUTRAL; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    for i in period..values.len() {
        // deltas[i - 1] is the change into close i.
        let window = &deltas[i - period..i];
        let gain: f64 = window.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
        let loss: f64 = -window.iter().filter(|d| **d < 0.0).sum::<f64>() / period as f64;

        out[i] = if loss == 0.0 {
            if gain == 0.0 {
                RSI_NEUTRAL
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        };
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal = ema(&line, signal);
    let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
    Macd {
        line,
        signal,
        histogram,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBand {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger bands around the SMA using the sample standard deviation.
pub fn bollinger(values: &[f64], period: usize, num_std: f64) -> Vec<Option<BollingerBand>> {
    let middle = sma(values, period);
    middle
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let m = (*m)?;
            if period < 2 {
                return Some(BollingerBand {
                    upper: m,
                    middle: m,
                    lower: m,
                });
            }
            let window = &values[i + 1 - period..=i];
            let var = window.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (period - 1) as f64;
            let band = var.sqrt() * num_std;
            Some(BollingerBand {
                upper: m + band,
                middle: m,
                lower: m - band,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sma() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
        assert_eq!(sma(&[1.0, 2.0], 3), vec![None, None]);
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        let out = ema(&[10.0, 20.0, 20.0], 3);
        // alpha = 0.5
        assert_eq!(out, vec![10.0, 15.0, 17.5]);
    }

    #[test]
    fn test_rsi_bounds() {
        let rising: Vec<f64> = (1..=30).map(f64::from).collect();
        let out = rsi(&rising, RSI_PERIOD);
        assert_eq!(out[RSI_PERIOD - 1], RSI_NEUTRAL);
        assert_eq!(out[29], 100.0);

        let falling: Vec<f64> = (1..=30).rev().map(f64::from).collect();
        assert_eq!(rsi(&falling, RSI_PERIOD)[29], 0.0);

        let flat = vec![5.0; 30];
        assert_eq!(rsi(&flat, RSI_PERIOD)[29], RSI_NEUTRAL);
    }

    #[test]
    fn test_rsi_mixed() {
        // Two gains of 2 and two losses of 1 over a 4-period window.
        let out = rsi(&[10.0, 12.0, 11.0, 13.0, 12.0], 4);
        // rs = (4/4) / (2/4) = 2 -> 100 - 100/3
        assert!(approx(out[4], 100.0 - 100.0 / 3.0));
    }

    #[test]
    fn test_macd_of_constant_series_is_zero() {
        let m = macd(&[100.0; 40], MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        assert!(m.line.iter().all(|v| approx(*v, 0.0)));
        assert!(m.histogram.iter().all(|v| approx(*v, 0.0)));
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let rising: Vec<f64> = (1..=60).map(f64::from).collect();
        let m = macd(&rising, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        assert!(m.line[59] > 0.0);
        assert!(m.line[59] > m.signal[59]);
    }

    #[test]
    fn test_bollinger() {
        let out = bollinger(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8, 2.0);
        assert!(out[6].is_none());
        let band = out[7].unwrap();
        assert!(approx(band.middle, 5.0));
        // sample variance = 32 / 7
        let sd = (32.0f64 / 7.0).sqrt();
        assert!(approx(band.upper, 5.0 + 2.0 * sd));
        assert!(approx(band.lower, 5.0 - 2.0 * sd));
    }
}
