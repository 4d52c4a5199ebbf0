//! Panel building from raw daily records.
//!
//! Validates incoming bars and produces a panel sorted by (date, ticker).

use chrono::NaiveDate;
use std::collections::HashSet;
use stockfeat_core::{Bar, Error, Panel, Result};
use tracing::debug;

/// Statistics about records seen by the builder.
#[derive(Debug, Clone, Default)]
pub struct IngestionStats {
    /// Records accepted into the panel.
    pub accepted: u64,
    /// Accepted records carrying at least one missing value.
    pub with_missing_values: u64,
}

/// Builder for a well-formed panel.
pub struct PanelBuilder {
    bars: Vec<Bar>,
    keys: HashSet<(String, NaiveDate)>,
    stats: IngestionStats,
}

impl PanelBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            bars: Vec::new(),
            keys: HashSet::new(),
            stats: IngestionStats::default(),
        }
    }

    /// Add one bar.
    ///
    /// Negative prices/volume are stored as NaN so that they, like other
    /// non-finite values, become missing cells for imputation. The row is
    /// always kept. A second bar for an existing (ticker, date) key is an error.
    pub fn add_bar(&mut self, mut bar: Bar) -> Result<()> {
        if self.keys.contains(&(bar.tic.clone(), bar.date)) {
            return Err(Error::data_shape(format!(
                "duplicate row for ticker '{}' on {}",
                bar.tic, bar.date
            )));
        }

        if mark_missing(&mut bar) {
            debug!(tic = %bar.tic, date = %bar.date, "bar has missing values");
            self.stats.with_missing_values += 1;
        }

        self.keys.insert((bar.tic.clone(), bar.date));
        self.stats.accepted += 1;
        self.bars.push(bar);
        Ok(())
    }

    /// Add multiple bars.
    pub fn add_bars(&mut self, bars: impl IntoIterator<Item = Bar>) -> Result<()> {
        for bar in bars {
            self.add_bar(bar)?;
        }
        Ok(())
    }

    /// Number of accepted bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether no bars have been accepted.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Ingestion statistics.
    pub fn stats(&self) -> &IngestionStats {
        &self.stats
    }

    /// Finish building. Rows come out sorted by (date, ticker).
    pub fn build(self) -> Result<Panel> {
        let mut bars = self.bars;
        bars.sort_by(|a, b| a.date.cmp(&b.date).then(a.tic.cmp(&b.tic)));
        Panel::new(bars)
    }
}

impl Default for PanelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace negative values with NaN. Returns whether any value is missing.
fn mark_missing(bar: &mut Bar) -> bool {
    let mut missing = false;
    for value in [
        &mut bar.open,
        &mut bar.high,
        &mut bar.low,
        &mut bar.close,
        &mut bar.volume,
    ] {
        if !value.is_finite() || *value < 0.0 {
            *value = f64::NAN;
            missing = true;
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bar(tic: &str, day: u32, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2022, 3, day).unwrap(),
            tic: tic.to_string(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 500.0,
        }
    }

    #[test]
    fn test_build_sorts_by_date_then_ticker() {
        let mut builder = PanelBuilder::new();
        builder
            .add_bars(vec![
                make_bar("MSFT", 2, 300.0),
                make_bar("AAPL", 2, 150.0),
                make_bar("AAPL", 1, 149.0),
                make_bar("MSFT", 1, 299.0),
            ])
            .unwrap();

        let panel = builder.build().unwrap();
        let keys: Vec<(&str, u32)> = panel
            .bars()
            .iter()
            .map(|b| (b.tic.as_str(), chrono::Datelike::day(&b.date)))
            .collect();
        assert_eq!(keys, vec![("AAPL", 1), ("MSFT", 1), ("AAPL", 2), ("MSFT", 2)]);
    }

    #[test]
    fn test_invalid_values_kept_as_missing() {
        let mut builder = PanelBuilder::new();
        builder.add_bar(make_bar("A", 1, f64::NAN)).unwrap();
        builder.add_bar(make_bar("A", 2, -5.0)).unwrap();
        let mut no_volume = make_bar("A", 3, 10.0);
        no_volume.volume = f64::NAN;
        builder.add_bar(no_volume).unwrap();
        builder.add_bar(make_bar("A", 4, 11.0)).unwrap();

        assert_eq!(builder.len(), 4);
        assert_eq!(builder.stats().accepted, 4);
        assert_eq!(builder.stats().with_missing_values, 3);

        let panel = builder.build().unwrap();
        let bars = panel.bars();
        assert!(bars[1].close.is_nan());
        assert!(bars[1].open.is_nan());
        assert_eq!(bars[2].close, 10.0);
        assert!(bars[2].volume.is_nan());
        assert_eq!(bars[3].volume, 500.0);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut builder = PanelBuilder::new();
        builder.add_bar(make_bar("A", 1, 10.0)).unwrap();
        let err = builder.add_bar(make_bar("A", 1, 11.0)).unwrap_err();
        assert!(matches!(err, Error::DataShape(_)));
    }
}
