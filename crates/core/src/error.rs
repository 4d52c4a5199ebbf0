//! Error types for the stockfeat pipeline.

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage that raised a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FieldSelection,
    Indicators,
    Turbulence,
    Imputation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FieldSelection => "field selection",
            Stage::Indicators => "technical indicators",
            Stage::Turbulence => "turbulence",
            Stage::Imputation => "imputation",
        };
        f.write_str(name)
    }
}

/// Main error type for the stockfeat pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Unsupported or inconsistent configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Panel does not have the shape an operation needs (duplicates, gaps).
    #[error("Data shape error: {0}")]
    DataShape(String),

    /// The indicator engine failed for one ticker.
    #[error("Indicator '{indicator}' failed for ticker '{ticker}': {reason}")]
    IndicatorComputation {
        indicator: String,
        ticker: String,
        reason: String,
    },

    /// Covariance inversion failed.
    #[error("Numerical error on {date}: {reason}")]
    Numerical { date: NaiveDate, reason: String },

    /// A fatal error tagged with the pipeline stage that raised it.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    /// Create a data shape error.
    pub fn data_shape(msg: impl Into<String>) -> Self {
        Error::DataShape(msg.into())
    }

    /// Create an indicator computation error.
    pub fn indicator(
        indicator: impl Into<String>,
        ticker: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::IndicatorComputation {
            indicator: indicator.into(),
            ticker: ticker.into(),
            reason: reason.into(),
        }
    }

    /// Create a numerical error for a specific date.
    pub fn numerical(date: NaiveDate, reason: impl Into<String>) -> Self {
        Error::Numerical {
            date,
            reason: reason.into(),
        }
    }

    /// Tag this error with the stage it occurred in.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ Error::Stage { .. } => already,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage that raised this error, if it has been tagged.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, with any stage tags removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}
