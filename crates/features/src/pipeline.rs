//! Feature pipeline.
//!
//! Field selection, technical indicators, turbulence and imputation in one
//! pass over a panel.

use crate::{
    aligner::IndicatorAligner,
    imputation,
    indicators::{IndicatorEngine, StandardIndicators},
    turbulence::{TurbulenceIndex, TurbulenceSeries},
};
use stockfeat_core::{Config, FeatureSpec, FeatureTable, Panel, Result, Stage};
use tracing::{info, warn};

pub use stockfeat_core::TURBULENCE_COLUMN;

/// Feature pipeline over an indicator engine.
pub struct FeaturePipeline<E = StandardIndicators> {
    config: Config,
    spec: FeatureSpec,
    engine: E,
}

impl FeaturePipeline<StandardIndicators> {
    /// Create a pipeline using the bundled indicator engine.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_engine(config, StandardIndicators)
    }
}

impl<E: IndicatorEngine> FeaturePipeline<E> {
    /// Create a pipeline with a custom indicator engine.
    ///
    /// Fails with an invalid configuration error before any data is touched.
    pub fn with_engine(config: Config, engine: E) -> Result<Self> {
        config.validate()?;
        let spec = FeatureSpec::new(config.features.feature_count)?;
        Ok(Self { config, spec, engine })
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Selected base fields.
    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    /// Run every enabled stage over `panel`.
    ///
    /// Without turbulence, rows keep the panel's order; with turbulence they
    /// are re-sorted by (date, ticker).
    pub fn run(&self, panel: &Panel) -> Result<FeatureTable> {
        let mut table = FeatureTable::from_panel(panel, self.spec.fields());

        // validate() guarantees all five fields whenever indicators are enabled.
        if self.config.indicators.enabled {
            self.add_indicators(panel, &mut table)
                .map_err(|e| e.in_stage(Stage::Indicators))?;
            info!(
                count = self.config.indicators.names.len(),
                "added technical indicators"
            );
        }

        if self.config.turbulence.enabled {
            self.add_turbulence(panel, &mut table)
                .map_err(|e| e.in_stage(Stage::Turbulence))?;
            info!("added turbulence index");
        }

        let summary = imputation::impute(&mut table);
        if !summary.empty_columns.is_empty() {
            warn!(columns = ?summary.empty_columns, "columns have no values to impute from");
        }
        info!(
            rows = table.len(),
            filled = summary.filled_cells,
            "feature table ready"
        );

        Ok(table)
    }

    fn add_indicators(&self, panel: &Panel, table: &mut FeatureTable) -> Result<()> {
        let aligner = IndicatorAligner::new(&self.engine);
        for name in &self.config.indicators.names {
            let column = aligner.align(panel, name);
            table.push_column(column.name, column.values)?;
        }
        Ok(())
    }

    fn add_turbulence(&self, panel: &Panel, table: &mut FeatureTable) -> Result<()> {
        let series = self.turbulence(panel)?;
        let values = table.dates().iter().map(|&d| series.get(d)).collect();
        table.push_column(TURBULENCE_COLUMN, values)?;
        table.sort_by_date_ticker();
        Ok(())
    }

    /// Turbulence series for a panel, independent of the enabled flag.
    pub fn turbulence(&self, panel: &Panel) -> Result<TurbulenceSeries> {
        TurbulenceIndex::new(&self.config.turbulence).compute(panel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::OhlcvSeries;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use stockfeat_core::{Bar, Error};
    use stockfeat_ingestion::PanelBuilder;

    fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    fn make_bar(tic: &str, i: usize, close: f64) -> Bar {
        Bar {
            date: day(i),
            tic: tic.to_string(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0 + i as f64,
        }
    }

    fn close_a(i: usize) -> f64 {
        let t = i as f64;
        100.0 + 10.0 * (t * 0.1).sin() + 0.05 * t
    }

    fn close_b(i: usize) -> f64 {
        let t = i as f64;
        50.0 + 5.0 * (t * 0.37).cos() + 0.02 * t
    }

    fn panel(days: usize) -> Panel {
        let mut builder = PanelBuilder::new();
        builder
            .add_bars((0..days).flat_map(|i| [make_bar("A", i, close_a(i)), make_bar("B", i, close_b(i))]))
            .unwrap();
        builder.build().unwrap()
    }

    fn config(indicators: &[&str], turbulence: bool) -> Config {
        let mut config = Config::default();
        config.indicators.names = indicators.iter().map(|s| s.to_string()).collect();
        config.turbulence.enabled = turbulence;
        config
    }

    #[test]
    fn test_end_to_end() {
        let pipeline = FeaturePipeline::new(config(&["rsi"], true)).unwrap();
        let table = pipeline.run(&panel(300)).unwrap();

        assert_eq!(table.len(), 600);
        assert_eq!(
            table.column_names(),
            vec!["close", "high", "low", "open", "volume", "rsi", "turbulence"]
        );
        for column in table.columns() {
            assert_eq!(column.missing_count(), 0, "{}", column.name);
        }

        let dates = pipeline.turbulence(&panel(300)).unwrap();
        let first_scored = dates.points()[252].date;

        let turbulence = &table.column(TURBULENCE_COLUMN).unwrap().values;
        let mut per_date: HashMap<NaiveDate, Vec<f64>> = HashMap::new();
        for (date, value) in table.dates().iter().zip(turbulence) {
            per_date.entry(*date).or_default().push(value.unwrap());
        }
        assert_eq!(per_date.len(), 300);
        for (date, values) in &per_date {
            assert_eq!(values.len(), 2);
            assert_eq!(values[0].to_bits(), values[1].to_bits());
            if *date < first_scored {
                assert_eq!(values[0], 0.0);
            }
        }
        assert!(per_date.values().any(|v| v[0] > 0.0));
    }

    #[test]
    fn test_missing_volume_keeps_row_and_is_imputed() {
        let mut builder = PanelBuilder::new();
        builder
            .add_bars((0..30).flat_map(|i| {
                let mut a = make_bar("A", i, close_a(i));
                if i == 15 {
                    a.volume = f64::NAN;
                }
                [a, make_bar("B", i, close_b(i))]
            }))
            .unwrap();
        let panel = builder.build().unwrap();
        assert_eq!(panel.len(), 60);

        let mut config = config(&["rsi"], true);
        config.turbulence.warmup = 10;
        let table = FeaturePipeline::new(config).unwrap().run(&panel).unwrap();

        assert_eq!(table.len(), 60);
        assert_eq!(table.column("volume").unwrap().missing_count(), 0);
        assert_eq!(table.column(TURBULENCE_COLUMN).unwrap().missing_count(), 0);
    }

    #[test]
    fn test_turbulence_sorts_by_date_then_ticker() {
        let shuffled = panel(30).sorted_by_ticker_date();
        let mut config = config(&[], true);
        config.turbulence.warmup = 10;
        let table = FeaturePipeline::new(config).unwrap().run(&shuffled).unwrap();

        let keys: Vec<(NaiveDate, &str)> = table
            .dates()
            .iter()
            .zip(table.tickers())
            .map(|(d, t)| (*d, t.as_str()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_without_turbulence_row_order_kept() {
        let input = panel(40).sorted_by_ticker_date();
        let table = FeaturePipeline::new(config(&["close_5_sma"], false))
            .unwrap()
            .run(&input)
            .unwrap();

        let tickers: Vec<&str> = input.bars().iter().map(|b| b.tic.as_str()).collect();
        let table_tickers: Vec<&str> = table.tickers().iter().map(String::as_str).collect();
        assert_eq!(table_tickers, tickers);
        assert!(table.column(TURBULENCE_COLUMN).is_none());

        // First four SMA cells of ticker A are back-filled from the fifth.
        let sma = &table.column("close_5_sma").unwrap().values;
        let expected = (0..5).map(close_a).sum::<f64>() / 5.0;
        assert_relative_eq!(sma[0].unwrap(), expected, epsilon = 1e-9);
        assert_eq!(sma[0], sma[4]);
    }

    #[test]
    fn test_field_selection_only() {
        let mut config = config(&[], false);
        config.features.feature_count = 3;
        config.indicators.enabled = false;
        let table = FeaturePipeline::new(config).unwrap().run(&panel(5)).unwrap();
        assert_eq!(table.column_names(), vec!["close", "high", "low"]);
    }

    #[test]
    fn test_invalid_configuration_refused() {
        let mut bad_count = Config::default();
        bad_count.features.feature_count = 0;
        assert!(matches!(
            FeaturePipeline::new(bad_count),
            Err(Error::InvalidConfiguration(_))
        ));

        let mut partial_fields = Config::default();
        partial_fields.features.feature_count = 2;
        assert!(matches!(
            FeaturePipeline::new(partial_fields),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_failed_indicator_is_not_fatal() {
        let table = FeaturePipeline::new(config(&["rsi", "vortex"], false))
            .unwrap()
            .run(&panel(30))
            .unwrap();
        let vortex = table.column("vortex").unwrap();
        assert!(vortex.is_all_missing());
        assert_eq!(table.column("rsi").unwrap().missing_count(), 0);
    }

    #[test]
    fn test_non_dense_panel_fails_in_turbulence_stage() {
        let mut bars = panel(20).bars().to_vec();
        bars.pop();
        let ragged = Panel::new(bars).unwrap();

        let mut config = config(&["rsi"], true);
        config.turbulence.warmup = 5;
        let err = FeaturePipeline::new(config).unwrap().run(&ragged).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Turbulence));
        assert!(matches!(err.root(), Error::DataShape(_)));
    }

    #[test]
    fn test_clashing_indicator_names_refused_up_front() {
        for names in [&["rsi", "rsi"][..], &["close"][..], &["turbulence"][..]] {
            assert!(matches!(
                FeaturePipeline::new(config(names, false)),
                Err(Error::InvalidConfiguration(_))
            ));
        }
    }

    /// Constant indicator, to show the pipeline only depends on the trait.
    struct Constant;

    impl IndicatorEngine for Constant {
        fn compute(&self, series: &OhlcvSeries, _name: &str) -> Result<Vec<Option<f64>>> {
            Ok(vec![Some(7.0); series.len()])
        }
    }

    #[test]
    fn test_custom_engine() {
        let pipeline = FeaturePipeline::with_engine(config(&["seven"], false), Constant).unwrap();
        let table = pipeline.run(&panel(3)).unwrap();
        assert!(table
            .column("seven")
            .unwrap()
            .values
            .iter()
            .all(|v| *v == Some(7.0)));
    }
}
