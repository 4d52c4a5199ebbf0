//! Core types and configuration for the stockfeat pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Panel and feature table types
//! - Base field selection
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod fields;
pub mod types;

pub use config::{Config, FieldConfig, IndicatorConfig, SingularPolicy, TurbulenceConfig};
pub use error::{Error, Result, Stage};
pub use fields::{select, FeatureSpec};
pub use types::*;
