//! Base field selection.
//!
//! Maps the configured feature count to the raw OHLCV fields that survive
//! into the feature table.

use crate::error::{Error, Result};
use crate::types::PriceField;

/// Ordered selection of raw price/volume fields, keyed by a count in 1..=5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    count: u8,
    fields: Vec<PriceField>,
}

impl FeatureSpec {
    /// Resolve a feature count into its field selection.
    pub fn new(feature_count: u8) -> Result<Self> {
        Ok(Self {
            count: feature_count,
            fields: select(feature_count)?,
        })
    }

    /// The configured feature count.
    pub fn count(&self) -> u8 {
        self.count
    }

    /// Selected fields in documented order.
    pub fn fields(&self) -> &[PriceField] {
        &self.fields
    }

    /// Whether every OHLCV field is selected (required for indicators).
    pub fn is_full(&self) -> bool {
        PriceField::ALL.iter().all(|f| self.fields.contains(f))
    }
}

/// Fields retained for a feature count.
pub fn select(feature_count: u8) -> Result<Vec<PriceField>> {
    use PriceField::*;

    let fields = match feature_count {
        1 => vec![Close],
        2 => vec![Close, Volume],
        3 => vec![Close, High, Low],
        4 => vec![Close, High, Low, Open],
        5 => vec![Close, High, Low, Open, Volume],
        other => {
            return Err(Error::config(format!(
                "feature count must be between 1 and 5, got {}",
                other
            )))
        }
    };
    Ok(fields)
}
