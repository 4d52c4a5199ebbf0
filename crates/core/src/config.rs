//! Configuration structures for the stockfeat pipeline.

use crate::error::{Error, Result};
use crate::fields::FeatureSpec;
use crate::types::{PriceField, TURBULENCE_COLUMN};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration for the feature pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base field selection.
    pub features: FieldConfig,
    /// Technical indicator configuration.
    pub indicators: IndicatorConfig,
    /// Turbulence index configuration.
    pub turbulence: TurbulenceConfig,
}

impl Config {
    /// Parse a configuration from JSON. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check cross-section constraints.
    pub fn validate(&self) -> Result<()> {
        let spec = FeatureSpec::new(self.features.feature_count)?;

        if self.indicators.enabled && !spec.is_full() {
            return Err(Error::config(format!(
                "technical indicators need all five OHLCV fields, feature count is {}",
                spec.count()
            )));
        }

        if let Some(empty) = self.indicators.names.iter().find(|n| n.trim().is_empty()) {
            return Err(Error::config(format!("blank indicator name '{}'", empty)));
        }

        if self.indicators.enabled {
            let mut seen = HashSet::new();
            for name in &self.indicators.names {
                let reserved = name == TURBULENCE_COLUMN
                    || PriceField::ALL.iter().any(|f| f.name() == name.as_str());
                if reserved {
                    return Err(Error::config(format!(
                        "indicator name '{}' clashes with a built-in column",
                        name
                    )));
                }
                if !seen.insert(name.as_str()) {
                    return Err(Error::config(format!("indicator '{}' listed twice", name)));
                }
            }
        }

        if self.turbulence.warmup < 2 {
            return Err(Error::config(format!(
                "turbulence warm-up must be at least 2 dates to estimate a covariance, got {}",
                self.turbulence.warmup
            )));
        }

        Ok(())
    }
}

/// Base field selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Number of raw fields to keep (1..=5).
    pub feature_count: u8,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self { feature_count: 5 }
    }
}

/// Technical indicator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Whether to append indicator columns.
    pub enabled: bool,
    /// Indicator names, appended in this order.
    pub names: Vec<String>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            names: ["macd", "rsi_30", "cci_30", "dx_30"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// What to do when the historical covariance cannot be inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingularPolicy {
    /// Fail the turbulence computation.
    #[default]
    Abort,
    /// Substitute the Moore-Penrose pseudo-inverse.
    PseudoInverse,
}

/// Turbulence index configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurbulenceConfig {
    /// Whether to append the turbulence column.
    pub enabled: bool,
    /// Leading dates that always score 0 (one trading year by default).
    pub warmup: usize,
    /// Number of first positive scores forced to 0.
    pub suppression_count: usize,
    /// Handling of a singular covariance matrix.
    pub singular_policy: SingularPolicy,
}

impl Default for TurbulenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            warmup: 252,
            suppression_count: 2,
            singular_policy: SingularPolicy::Abort,
        }
    }
}
