//! Core data types for the stockfeat pipeline.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Ticker identifier.
pub type Ticker = String;

/// Name of the turbulence column in a feature table.
pub const TURBULENCE_COLUMN: &str = "turbulence";

/// A raw price/volume field of a daily bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    /// All OHLCV fields.
    pub const ALL: [PriceField; 5] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::Volume,
    ];

    /// Column name of the field.
    pub fn name(self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
        }
    }

    /// Read this field from a bar.
    #[inline]
    pub fn value(self, bar: &Bar) -> f64 {
        match self {
            PriceField::Open => bar.open,
            PriceField::High => bar.high,
            PriceField::Low => bar.low,
            PriceField::Close => bar.close,
            PriceField::Volume => bar.volume,
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One daily observation for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Trading date.
    pub date: NaiveDate,
    /// Ticker identifier.
    pub tic: Ticker,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
}

/// Long-format multi-ticker panel, one row per (ticker, date).
///
/// Row order is whatever the caller supplied; operations that need a
/// particular order look rows up by key instead of relying on position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bar>", into = "Vec<Bar>")]
pub struct Panel {
    bars: Vec<Bar>,
}

impl TryFrom<Vec<Bar>> for Panel {
    type Error = Error;

    fn try_from(bars: Vec<Bar>) -> Result<Self> {
        Panel::new(bars)
    }
}

impl From<Panel> for Vec<Bar> {
    fn from(panel: Panel) -> Self {
        panel.bars
    }
}

impl Panel {
    /// Build a panel, rejecting duplicate (ticker, date) keys.
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(bars.len());
        for bar in &bars {
            if !seen.insert((bar.tic.as_str(), bar.date)) {
                return Err(Error::data_shape(format!(
                    "duplicate row for ticker '{}' on {}",
                    bar.tic, bar.date
                )));
            }
        }
        Ok(Self { bars })
    }

    /// Rows in their current order.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the panel has no rows.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Distinct tickers in first-seen order.
    pub fn tickers(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.bars
            .iter()
            .map(|b| b.tic.as_str())
            .filter(|tic| seen.insert(*tic))
            .collect()
    }

    /// Distinct dates, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.bars.iter().map(|b| b.date).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    /// Row indices of one ticker, ordered by date.
    pub fn rows_for(&self, tic: &str) -> Vec<usize> {
        let mut rows: Vec<usize> = (0..self.bars.len())
            .filter(|&i| self.bars[i].tic == tic)
            .collect();
        rows.sort_by_key(|&i| self.bars[i].date);
        rows
    }

    /// Copy of the panel sorted by (ticker, date).
    pub fn sorted_by_ticker_date(&self) -> Panel {
        let mut bars = self.bars.clone();
        bars.sort_by(|a, b| a.tic.cmp(&b.tic).then(a.date.cmp(&b.date)));
        Panel { bars }
    }

    /// Copy of the panel sorted by (date, ticker).
    pub fn sorted_by_date_ticker(&self) -> Panel {
        let mut bars = self.bars.clone();
        bars.sort_by(|a, b| a.date.cmp(&b.date).then(a.tic.cmp(&b.tic)));
        Panel { bars }
    }
}

/// A named feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// One value per table row; `None` is a missing cell.
    pub values: Vec<Option<f64>>,
}

impl Column {
    /// Number of missing cells.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Whether every cell is missing.
    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// Enriched feature matrix keyed by (date, ticker).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<Ticker>,
    columns: Vec<Column>,
}

impl FeatureTable {
    /// Create a table with the panel's row keys and the given base fields.
    pub fn from_panel(panel: &Panel, fields: &[PriceField]) -> Self {
        let columns = fields
            .iter()
            .map(|&field| Column {
                name: field.name().to_string(),
                values: panel
                    .bars()
                    .iter()
                    .map(|b| Some(field.value(b)).filter(|v| v.is_finite()))
                    .collect(),
            })
            .collect();

        Self {
            dates: panel.bars().iter().map(|b| b.date).collect(),
            tickers: panel.bars().iter().map(|b| b.tic.clone()).collect(),
            columns,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Date of every row.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Ticker of every row.
    pub fn tickers(&self) -> &[Ticker] {
        &self.tickers
    }

    /// All columns in insertion order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Mutable access to the columns.
    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Append a column. Its length must match the table.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(Error::data_shape(format!(
                "column '{}' has {} values, table has {} rows",
                name,
                values.len(),
                self.len()
            )));
        }
        if self.column(&name).is_some() {
            return Err(Error::data_shape(format!("column '{}' already exists", name)));
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    /// Stable-sort every row by (date, ticker) ascending.
    pub fn sort_by_date_ticker(&mut self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            self.dates[a]
                .cmp(&self.dates[b])
                .then_with(|| self.tickers[a].cmp(&self.tickers[b]))
        });

        self.dates = order.iter().map(|&i| self.dates[i]).collect();
        self.tickers = order.iter().map(|&i| self.tickers[i].clone()).collect();
        for column in &mut self.columns {
            column.values = order.iter().map(|&i| column.values[i]).collect();
        }
    }
}
