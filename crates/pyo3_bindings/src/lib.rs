//! PyO3 bindings for the stockfeat feature pipeline.
//!
//! Exposes the Rust pipeline to Python:
//! - Daily bars
//! - Base field selection
//! - Feature engineering (indicators, turbulence, imputation)

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use stockfeat_core::{
    select as rust_select, Bar as RustBar, Config as RustConfig, Error as RustError,
    Panel as RustPanel,
};
use stockfeat_features::FeaturePipeline;
use stockfeat_ingestion::PanelBuilder;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn to_py_err(err: RustError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn parse_date(s: &str) -> PyResult<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| PyValueError::new_err(format!("invalid date '{}': {}", s, e)))
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// One daily observation for one ticker.
#[pyclass]
#[derive(Clone)]
pub struct Bar {
    #[pyo3(get, set)]
    pub date: String,
    #[pyo3(get, set)]
    pub tic: String,
    #[pyo3(get, set)]
    pub open: f64,
    #[pyo3(get, set)]
    pub high: f64,
    #[pyo3(get, set)]
    pub low: f64,
    #[pyo3(get, set)]
    pub close: f64,
    #[pyo3(get, set)]
    pub volume: f64,
}

#[pymethods]
impl Bar {
    #[new]
    fn new(date: String, tic: String, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Bar { date, tic, open, high, low, close, volume }
    }

    fn __repr__(&self) -> String {
        format!(
            "Bar(date={}, tic={}, open={}, high={}, low={}, close={}, volume={})",
            self.date, self.tic, self.open, self.high, self.low, self.close, self.volume
        )
    }
}

impl TryFrom<Bar> for RustBar {
    type Error = PyErr;

    fn try_from(b: Bar) -> PyResult<Self> {
        Ok(RustBar {
            date: parse_date(&b.date)?,
            tic: b.tic,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
        })
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Feature engineering over a multi-ticker daily panel.
#[pyclass]
pub struct FeatureEngineer {
    inner: FeaturePipeline,
}

impl FeatureEngineer {
    fn build_panel(bars: Vec<Bar>) -> PyResult<RustPanel> {
        let mut builder = PanelBuilder::new();
        for bar in bars {
            builder.add_bar(RustBar::try_from(bar)?).map_err(to_py_err)?;
        }
        builder.build().map_err(to_py_err)
    }
}

#[pymethods]
impl FeatureEngineer {
    #[new]
    #[pyo3(signature = (
        feature_number = 5,
        use_technical_indicator = true,
        use_turbulence = false,
        tech_indicator_list = None,
        warmup = 252
    ))]
    fn new(
        feature_number: u8,
        use_technical_indicator: bool,
        use_turbulence: bool,
        tech_indicator_list: Option<Vec<String>>,
        warmup: usize,
    ) -> PyResult<Self> {
        let mut config = RustConfig::default();
        config.features.feature_count = feature_number;
        config.indicators.enabled = use_technical_indicator;
        if let Some(names) = tech_indicator_list {
            config.indicators.names = names;
        }
        config.turbulence.enabled = use_turbulence;
        config.turbulence.warmup = warmup;

        Ok(FeatureEngineer {
            inner: FeaturePipeline::new(config).map_err(to_py_err)?,
        })
    }

    /// Create from a JSON configuration string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = RustConfig::from_json_str(json).map_err(to_py_err)?;
        Ok(FeatureEngineer {
            inner: FeaturePipeline::new(config).map_err(to_py_err)?,
        })
    }

    /// Selected base field names.
    #[getter]
    fn features(&self) -> Vec<&'static str> {
        self.inner.spec().fields().iter().map(|f| f.name()).collect()
    }

    /// Run the pipeline. Returns a dict of column name to list.
    fn preprocess_data<'py>(&self, py: Python<'py>, bars: Vec<Bar>) -> PyResult<Bound<'py, PyDict>> {
        let panel = Self::build_panel(bars)?;
        let table = self.inner.run(&panel).map_err(to_py_err)?;

        let out = PyDict::new_bound(py);
        let dates: Vec<String> = table
            .dates()
            .iter()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .collect();
        out.set_item("date", dates)?;
        out.set_item("tic", table.tickers().to_vec())?;
        for column in table.columns() {
            out.set_item(column.name.as_str(), column.values.clone())?;
        }
        Ok(out)
    }

    /// Turbulence per date as (date, value) pairs.
    fn turbulence(&self, bars: Vec<Bar>) -> PyResult<Vec<(String, f64)>> {
        let panel = Self::build_panel(bars)?;
        let series = self.inner.turbulence(&panel).map_err(to_py_err)?;
        Ok(series
            .points()
            .iter()
            .map(|p| (p.date.format(DATE_FORMAT).to_string(), p.turbulence))
            .collect())
    }
}

/// Base field names for a feature count.
#[pyfunction]
fn select_fields(feature_number: u8) -> PyResult<Vec<&'static str>> {
    let fields = rust_select(feature_number).map_err(to_py_err)?;
    Ok(fields.iter().map(|f| f.name()).collect())
}

// ============================================================================
// Module Definition
// ============================================================================

/// stockfeat - multi-ticker feature engineering in Rust.
#[pymodule]
fn stockfeat(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Bar>()?;
    m.add_class::<FeatureEngineer>()?;
    m.add_function(wrap_pyfunction!(select_fields, m)?)?;
    Ok(())
}
