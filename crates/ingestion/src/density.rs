//! Panel density checks.
//!
//! A dense panel has an observation for every ticker on every date.

use chrono::NaiveDate;
use std::collections::HashSet;
use stockfeat_core::{Error, Panel, Result};

/// Missing (ticker, date) cells of a panel.
#[derive(Debug, Clone, Default)]
pub struct DensityReport {
    /// Distinct tickers.
    pub ticker_count: usize,
    /// Distinct dates.
    pub date_count: usize,
    /// Cells with no observation, ordered by date then ticker.
    pub missing: Vec<(String, NaiveDate)>,
}

impl DensityReport {
    /// Inspect a panel.
    pub fn of(panel: &Panel) -> Self {
        let mut tickers = panel.tickers();
        tickers.sort_unstable();
        let dates = panel.dates();

        let present: HashSet<(&str, NaiveDate)> = panel
            .bars()
            .iter()
            .map(|b| (b.tic.as_str(), b.date))
            .collect();

        let missing = dates
            .iter()
            .flat_map(|&date| tickers.iter().map(move |&tic| (tic, date)))
            .filter(|key| !present.contains(key))
            .map(|(tic, date)| (tic.to_string(), date))
            .collect();

        Self {
            ticker_count: tickers.len(),
            date_count: dates.len(),
            missing,
        }
    }

    /// Whether no cell is missing.
    pub fn is_dense(&self) -> bool {
        self.missing.is_empty()
    }

    /// Fail with a data shape error naming the first gap.
    pub fn require_dense(&self) -> Result<()> {
        match self.missing.first() {
            None => Ok(()),
            Some((tic, date)) => Err(Error::data_shape(format!(
                "panel is not dense: {} missing cell(s), first is ticker '{}' on {}",
                self.missing.len(),
                tic,
                date
            ))),
        }
    }
}
