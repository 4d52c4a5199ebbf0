//! Panel ingestion and normalization for the stockfeat pipeline.
//!
//! This crate handles:
//! - Record validation and duplicate detection
//! - Panel building in (date, ticker) order
//! - Density checks
//! - Date-range splits

pub mod density;
pub mod panel_builder;
pub mod split;

pub use density::DensityReport;
pub use panel_builder::{IngestionStats, PanelBuilder};
pub use split::split_by_date;
