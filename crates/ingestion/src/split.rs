//! Date-range splitting of a panel.

use chrono::NaiveDate;
use stockfeat_core::{Panel, Result};

/// Rows with `start <= date < end`, sorted by (date, ticker).
pub fn split_by_date(panel: &Panel, start: NaiveDate, end: NaiveDate) -> Result<Panel> {
    let bars = panel
        .sorted_by_date_ticker()
        .bars()
        .iter()
        .filter(|b| b.date >= start && b.date < end)
        .cloned()
        .collect();
    Panel::new(bars)
}
