//! Per-ticker indicator alignment.
//!
//! Each ticker's indicator is computed on that ticker's own date-ordered
//! history and then written back by (ticker, date) key, so the panel may be
//! in any row order.

use crate::indicators::{IndicatorEngine, OhlcvSeries};
use chrono::NaiveDate;
use std::collections::HashMap;
use stockfeat_core::{Error, Panel, Result};
use tracing::{debug, warn};

/// Indicator values for every panel row, plus any per-ticker failures.
#[derive(Debug)]
pub struct AlignedColumn {
    /// Indicator name.
    pub name: String,
    /// One value per panel row, in the panel's row order.
    pub values: Vec<Option<f64>>,
    /// Tickers whose computation failed; their cells are missing.
    pub failures: Vec<Error>,
}

/// Aligns per-ticker indicator output onto a multi-ticker panel.
pub struct IndicatorAligner<'a, E: ?Sized> {
    engine: &'a E,
}

impl<'a, E: IndicatorEngine + ?Sized> IndicatorAligner<'a, E> {
    /// Create an aligner over an indicator engine.
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Compute `name` for every ticker and align it to the panel's rows.
    ///
    /// Engine failures are isolated to the ticker that raised them.
    pub fn align(&self, panel: &Panel, name: &str) -> AlignedColumn {
        let mut by_key: HashMap<(&str, NaiveDate), Option<f64>> = HashMap::with_capacity(panel.len());
        let mut failures = Vec::new();

        for tic in panel.tickers() {
            let rows = panel.rows_for(tic);
            let series = OhlcvSeries::from_rows(panel, tic, &rows);

            match self.compute_checked(&series, name) {
                Ok(values) => {
                    by_key.extend(series.dates.iter().map(|&d| (tic, d)).zip(values));
                }
                Err(err) => {
                    warn!(indicator = name, tic, error = %err, "indicator computation failed");
                    failures.push(err);
                }
            }
        }

        let values = panel
            .bars()
            .iter()
            .map(|b| by_key.get(&(b.tic.as_str(), b.date)).copied().flatten())
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();

        debug!(indicator = name, rows = panel.len(), failed = failures.len(), "aligned indicator");

        AlignedColumn {
            name: name.to_string(),
            values,
            failures,
        }
    }

    fn compute_checked(&self, series: &OhlcvSeries, name: &str) -> Result<Vec<Option<f64>>> {
        let values = self.engine.compute(series, name)?;
        if values.len() != series.len() {
            return Err(Error::indicator(
                name,
                series.tic.as_str(),
                format!("engine returned {} values for {} rows", values.len(), series.len()),
            ));
        }
        Ok(values)
    }
}
