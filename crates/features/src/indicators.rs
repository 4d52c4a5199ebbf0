//! Technical indicator engine.
//!
//! The pipeline talks to indicators only through [`IndicatorEngine`]. The
//! bundled [`StandardIndicators`] engine understands names such as `macd`,
//! `rsi_30`, `cci_30`, `dx_30`, `close_20_sma` and `boll_ub`.

use chrono::NaiveDate;
use statrs::statistics::Statistics;
use std::str::FromStr;
use stockfeat_core::{Bar, Error, Panel, Result};

/// OHLCV history of a single ticker, ordered by date.
#[derive(Debug, Clone, Default)]
pub struct OhlcvSeries {
    pub tic: String,
    pub dates: Vec<NaiveDate>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl OhlcvSeries {
    /// Collect the given panel rows. `rows` must already be in date order.
    pub fn from_rows(panel: &Panel, tic: &str, rows: &[usize]) -> Self {
        let bars = panel.bars();
        let pick = |f: fn(&Bar) -> f64| -> Vec<f64> {
            rows.iter().map(|&i| f(&bars[i])).collect()
        };

        Self {
            tic: tic.to_string(),
            dates: rows.iter().map(|&i| bars[i].date).collect(),
            open: pick(|b| b.open),
            high: pick(|b| b.high),
            low: pick(|b| b.low),
            close: pick(|b| b.close),
            volume: pick(|b| b.volume),
        }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Computes a named indicator over one ticker's history.
///
/// Implementations return exactly one value per observation; `None` marks
/// cells the indicator cannot produce yet (warm-up).
pub trait IndicatorEngine {
    fn compute(&self, series: &OhlcvSeries, name: &str) -> Result<Vec<Option<f64>>>;
}

const DEFAULT_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const BOLL_PERIOD: usize = 20;
const BOLL_WIDTH: f64 = 2.0;

/// Indicators understood by [`StandardIndicators`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    Macd,
    MacdSignal,
    MacdHistogram,
    Rsi(usize),
    Cci(usize),
    Dx(usize),
    Atr(usize),
    Sma(usize),
    Ema(usize),
    Boll,
    BollUpper,
    BollLower,
}

impl FromStr for IndicatorKind {
    type Err = String;

    fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = name.trim().to_ascii_lowercase();
        let parts: Vec<&str> = lowered.split('_').collect();

        let kind = match parts.as_slice() {
            ["macd"] => Some(IndicatorKind::Macd),
            ["macds"] => Some(IndicatorKind::MacdSignal),
            ["macdh"] => Some(IndicatorKind::MacdHistogram),
            ["boll"] => Some(IndicatorKind::Boll),
            ["boll", "ub"] => Some(IndicatorKind::BollUpper),
            ["boll", "lb"] => Some(IndicatorKind::BollLower),
            ["rsi"] => Some(IndicatorKind::Rsi(DEFAULT_PERIOD)),
            ["cci"] => Some(IndicatorKind::Cci(DEFAULT_PERIOD)),
            ["dx"] => Some(IndicatorKind::Dx(DEFAULT_PERIOD)),
            ["atr"] => Some(IndicatorKind::Atr(DEFAULT_PERIOD)),
            ["rsi", n] => period(n).map(IndicatorKind::Rsi),
            ["cci", n] => period(n).map(IndicatorKind::Cci),
            ["dx", n] => period(n).map(IndicatorKind::Dx),
            ["atr", n] => period(n).map(IndicatorKind::Atr),
            ["close", n, "sma"] => period(n).map(IndicatorKind::Sma),
            ["close", n, "ema"] => period(n).map(IndicatorKind::Ema),
            _ => None,
        };

        kind.ok_or_else(|| format!("unknown indicator '{}'", name))
    }
}

fn period(s: &str) -> Option<usize> {
    s.parse::<usize>().ok().filter(|&n| n > 0)
}

/// Built-in engine covering common moving-average, oscillator and
/// volatility indicators.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardIndicators;

impl StandardIndicators {
    pub fn new() -> Self {
        Self
    }
}

impl IndicatorEngine for StandardIndicators {
    fn compute(&self, series: &OhlcvSeries, name: &str) -> Result<Vec<Option<f64>>> {
        let kind: IndicatorKind = name
            .parse()
            .map_err(|reason: String| Error::indicator(name, series.tic.as_str(), reason))?;

        let values = match kind {
            IndicatorKind::Macd => macd(&series.close).0.into_iter().map(Some).collect(),
            IndicatorKind::MacdSignal => macd(&series.close).1.into_iter().map(Some).collect(),
            IndicatorKind::MacdHistogram => {
                let (line, signal) = macd(&series.close);
                line.iter().zip(&signal).map(|(l, s)| Some(l - s)).collect()
            }
            IndicatorKind::Rsi(n) => rsi(&series.close, n),
            IndicatorKind::Cci(n) => cci(series, n),
            IndicatorKind::Dx(n) => dx(series, n),
            IndicatorKind::Atr(n) => atr(series, n),
            IndicatorKind::Sma(n) => sma(&series.close, n),
            IndicatorKind::Ema(n) => ema(&series.close, n).into_iter().map(Some).collect(),
            IndicatorKind::Boll => sma(&series.close, BOLL_PERIOD),
            IndicatorKind::BollUpper => bollinger(&series.close, BOLL_WIDTH),
            IndicatorKind::BollLower => bollinger(&series.close, -BOLL_WIDTH),
        };

        Ok(values)
    }
}

/// Exponential moving average seeded with the first value.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    for &v in values {
        let next = match out.last() {
            Some(&prev) => alpha * v + (1.0 - alpha) * prev,
            None => v,
        };
        out.push(next);
    }
    out
}

/// Simple moving average; the first `period - 1` cells are missing.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().mean())
}

fn rolling(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                Some(f(&values[i + 1 - period..=i]))
            }
        })
        .collect()
}

/// MACD line and its signal line.
fn macd(close: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let fast = ema(close, MACD_FAST);
    let slow = ema(close, MACD_SLOW);
    let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&line, MACD_SIGNAL);
    (line, signal)
}

/// Middle band shifted by `width` sample standard deviations.
fn bollinger(close: &[f64], width: f64) -> Vec<Option<f64>> {
    rolling(close, BOLL_PERIOD, |w| w.iter().mean() + width * w.iter().std_dev())
}

/// Relative strength index with Wilder smoothing.
pub fn rsi(close: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; close.len()];
    if close.len() <= period {
        return out;
    }

    let changes: Vec<f64> = close.windows(2).map(|w| w[1] - w[0]).collect();
    let (mut avg_gain, mut avg_loss) = changes[..period].iter().fold((0.0, 0.0), |(g, l), &c| {
        if c > 0.0 {
            (g + c, l)
        } else {
            (g, l - c)
        }
    });
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    let n = period as f64;
    for (i, &change) in changes.iter().enumerate().skip(period) {
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        // changes[i] ends at close[i + 1]
        out[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Commodity channel index over the typical price.
pub fn cci(series: &OhlcvSeries, period: usize) -> Vec<Option<f64>> {
    let typical: Vec<f64> = (0..series.len())
        .map(|i| (series.high[i] + series.low[i] + series.close[i]) / 3.0)
        .collect();

    rolling(&typical, period, |w| {
        let mean = w.iter().mean();
        let mean_dev = w.iter().map(|v| (v - mean).abs()).mean();
        let last = w[w.len() - 1];
        if mean_dev == 0.0 {
            0.0
        } else {
            (last - mean) / (0.015 * mean_dev)
        }
    })
}

fn true_range(series: &OhlcvSeries) -> Vec<f64> {
    (0..series.len())
        .map(|i| {
            let range = series.high[i] - series.low[i];
            if i == 0 {
                range
            } else {
                let prev_close = series.close[i - 1];
                range
                    .max((series.high[i] - prev_close).abs())
                    .max((series.low[i] - prev_close).abs())
            }
        })
        .collect()
}

/// Wilder-smoothed average, first emitted at index `start + period - 1`.
fn wilder(values: &[f64], start: usize, period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let first = start + period - 1;
    if first >= values.len() {
        return out;
    }

    let n = period as f64;
    let mut avg = values[start..=first].iter().sum::<f64>() / n;
    out[first] = Some(avg);
    for i in first + 1..values.len() {
        avg = (avg * (n - 1.0) + values[i]) / n;
        out[i] = Some(avg);
    }
    out
}

/// Average true range.
pub fn atr(series: &OhlcvSeries, period: usize) -> Vec<Option<f64>> {
    wilder(&true_range(series), 0, period)
}

/// Directional movement index.
pub fn dx(series: &OhlcvSeries, period: usize) -> Vec<Option<f64>> {
    let len = series.len();
    let mut plus_dm = vec![0.0; len];
    let mut minus_dm = vec![0.0; len];
    for i in 1..len {
        let up = series.high[i] - series.high[i - 1];
        let down = series.low[i - 1] - series.low[i];
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let tr = wilder(&true_range(series), 1, period);
    let plus = wilder(&plus_dm, 1, period);
    let minus = wilder(&minus_dm, 1, period);

    (0..len)
        .map(|i| {
            let (tr, plus, minus) = (tr[i]?, plus[i]?, minus[i]?);
            if tr == 0.0 {
                return Some(0.0);
            }
            let plus_di = 100.0 * plus / tr;
            let minus_di = 100.0 * minus / tr;
            let total = plus_di + minus_di;
            if total == 0.0 {
                Some(0.0)
            } else {
                Some(100.0 * (plus_di - minus_di).abs() / total)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series_from_close(close: &[f64]) -> OhlcvSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        OhlcvSeries {
            tic: "TEST".to_string(),
            dates: (0..close.len())
                .map(|i| start + chrono::Duration::days(i as i64))
                .collect(),
            open: close.to_vec(),
            high: close.iter().map(|c| c + 1.0).collect(),
            low: close.iter().map(|c| c - 1.0).collect(),
            close: close.to_vec(),
            volume: vec![1000.0; close.len()],
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("macd".parse(), Ok(IndicatorKind::Macd));
        assert_eq!("rsi".parse(), Ok(IndicatorKind::Rsi(14)));
        assert_eq!("rsi_30".parse(), Ok(IndicatorKind::Rsi(30)));
        assert_eq!("CCI_30".parse(), Ok(IndicatorKind::Cci(30)));
        assert_eq!("close_20_sma".parse(), Ok(IndicatorKind::Sma(20)));
        assert_eq!("boll_ub".parse(), Ok(IndicatorKind::BollUpper));
        assert!("rsi_0".parse::<IndicatorKind>().is_err());
        assert!("close_x_sma".parse::<IndicatorKind>().is_err());
        assert!("vortex".parse::<IndicatorKind>().is_err());
    }

    #[test]
    fn test_unknown_indicator_error_names_ticker() {
        let series = series_from_close(&[1.0, 2.0, 3.0]);
        let err = StandardIndicators.compute(&series, "vortex").unwrap_err();
        match err {
            Error::IndicatorComputation { indicator, ticker, .. } => {
                assert_eq!(indicator, "vortex");
                assert_eq!(ticker, "TEST");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_output_length_matches_input() {
        let close: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let series = series_from_close(&close);
        let names = [
            "macd", "macds", "macdh", "rsi_14", "cci_14", "dx_14", "atr", "close_5_sma",
            "close_5_ema", "boll", "boll_ub", "boll_lb",
        ];
        for name in names {
            let values = StandardIndicators.compute(&series, name).unwrap();
            assert_eq!(values.len(), close.len(), "{name}");
        }
    }

    #[test]
    fn test_short_series_is_all_missing() {
        let series = series_from_close(&[1.0, 2.0, 3.0]);
        let values = StandardIndicators.compute(&series, "rsi_14").unwrap();
        assert!(values.iter().all(Option::is_none));
    }

    #[test]
    fn test_sma_known_values() {
        let values = sma(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(values, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        let values = ema(&[10.0, 20.0], 3);
        assert_relative_eq!(values[0], 10.0);
        assert_relative_eq!(values[1], 15.0);
    }

    #[test]
    fn test_rsi_monotonic_up() {
        let close: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let values = rsi(&close, 14);
        assert!(values[..14].iter().all(Option::is_none));
        assert_relative_eq!(values[14].unwrap(), 100.0);
        assert_relative_eq!(values[19].unwrap(), 100.0);
    }

    #[test]
    fn test_rsi_balanced_moves() {
        // Alternating +1 / -1 changes: equal average gain and loss.
        let close: Vec<f64> = (0..5).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        let values = rsi(&close, 4);
        assert_relative_eq!(values[4].unwrap(), 50.0);
    }

    #[test]
    fn test_bollinger_bands_straddle_middle() {
        let close: Vec<f64> = (0..30).map(|i| 50.0 + (i % 3) as f64).collect();
        let series = series_from_close(&close);
        let mid = StandardIndicators.compute(&series, "boll").unwrap();
        let upper = StandardIndicators.compute(&series, "boll_ub").unwrap();
        let lower = StandardIndicators.compute(&series, "boll_lb").unwrap();
        assert!(mid[18].is_none());
        let (m, u, l) = (mid[25].unwrap(), upper[25].unwrap(), lower[25].unwrap());
        assert!(u > m && m > l);
        assert_relative_eq!(u - m, m - l, epsilon = 1e-9);
    }

    #[test]
    fn test_cci_flat_is_zero() {
        let series = series_from_close(&[5.0; 10]);
        let values = cci(&series, 4);
        assert_eq!(values[2], None);
        assert_eq!(values[3], Some(0.0));
    }

    #[test]
    fn test_dx_trending_market() {
        let close: Vec<f64> = (0..20).map(|i| 100.0 + 2.0 * i as f64).collect();
        let values = dx(&series_from_close(&close), 5);
        assert!(values[4].is_none());
        // Pure up-trend: all directional movement is positive.
        assert_relative_eq!(values[5].unwrap(), 100.0);
    }

    #[test]
    fn test_atr_constant_range() {
        let series = series_from_close(&[10.0; 6]);
        let values = atr(&series, 3);
        assert_eq!(values[1], None);
        assert_relative_eq!(values[2].unwrap(), 2.0);
        assert_relative_eq!(values[5].unwrap(), 2.0);
    }
}
