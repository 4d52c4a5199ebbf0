//! Missing-value imputation.
//!
//! Backward-fill then forward-fill along each column in table row order.

use stockfeat_core::FeatureTable;

/// Outcome of imputing a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImputationSummary {
    /// Cells that were missing and got a value.
    pub filled_cells: usize,
    /// Columns with no value at all; left untouched.
    pub empty_columns: Vec<String>,
}

/// Fill each gap with the next valid value, then any trailing gap with the
/// last valid value. Returns the number of cells filled.
pub fn backfill_then_forward_fill(values: &mut [Option<f64>]) -> usize {
    let mut filled = 0;

    let mut next = None;
    for cell in values.iter_mut().rev() {
        if cell.is_some() {
            next = *cell;
        } else if next.is_some() {
            *cell = next;
            filled += 1;
        }
    }

    let mut last = None;
    for cell in values.iter_mut() {
        if cell.is_some() {
            last = *cell;
        } else if last.is_some() {
            *cell = last;
            filled += 1;
        }
    }

    filled
}

/// Impute every column of a table in place.
pub fn impute(table: &mut FeatureTable) -> ImputationSummary {
    let mut summary = ImputationSummary::default();
    for column in table.columns_mut() {
        if column.is_all_missing() {
            summary.empty_columns.push(column.name.clone());
            continue;
        }
        summary.filled_cells += backfill_then_forward_fill(&mut column.values);
    }
    summary
}
