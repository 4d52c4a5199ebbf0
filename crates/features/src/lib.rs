//! Feature computation for the stockfeat pipeline.
//!
//! This crate handles:
//! - Technical indicators per ticker
//! - Key-based indicator alignment onto the panel
//! - Turbulence index (growing-window Mahalanobis distance)
//! - Backward/forward fill imputation
//! - The end-to-end feature pipeline

pub mod aligner;
pub mod imputation;
pub mod indicators;
pub mod pipeline;
pub mod turbulence;

pub use aligner::{AlignedColumn, IndicatorAligner};
pub use imputation::{impute, ImputationSummary};
pub use indicators::{IndicatorEngine, IndicatorKind, OhlcvSeries, StandardIndicators};
pub use pipeline::{FeaturePipeline, TURBULENCE_COLUMN};
pub use turbulence::{TurbulenceIndex, TurbulencePoint, TurbulenceSeries};
