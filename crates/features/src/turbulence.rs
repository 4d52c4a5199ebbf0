//! Turbulence index.
//!
//! Scores each date by the squared Mahalanobis distance of its cross-section
//! of closing prices from the mean and covariance of every earlier date.
//! Mean and covariance are maintained incrementally, so each date costs
//! O(d²) in the ticker count instead of a rescan of the whole history.

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use stockfeat_core::{Error, Panel, Result, SingularPolicy, TurbulenceConfig};
use tracing::debug;

/// Relative eigenvalue floor below which a covariance counts as singular.
const RCOND: f64 = 1e-12;

/// Turbulence for one date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurbulencePoint {
    /// Trading date.
    pub date: NaiveDate,
    /// Unsuppressed quadratic-form score; `None` during warm-up.
    pub raw_score: Option<f64>,
    /// Reported turbulence after warm-up and outlier suppression.
    pub turbulence: f64,
}

/// One turbulence value per distinct date, ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurbulenceSeries {
    points: Vec<TurbulencePoint>,
}

impl TurbulenceSeries {
    /// All points in date order.
    pub fn points(&self) -> &[TurbulencePoint] {
        &self.points
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Reported turbulence values in date order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.turbulence).collect()
    }

    /// Turbulence on a given date.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].turbulence)
    }
}

/// Dense date × ticker matrix of closing prices.
struct PriceMatrix {
    dates: Vec<NaiveDate>,
    /// One cross-section per date, tickers in ascending order.
    rows: Vec<DVector<f64>>,
}

impl PriceMatrix {
    /// Pivot a panel's closes. Every ticker must be present on every date.
    fn pivot(panel: &Panel) -> Result<Self> {
        let dates = panel.dates();
        let mut tickers = panel.tickers();
        tickers.sort_unstable();

        let date_idx: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();
        let tic_idx: HashMap<&str, usize> =
            tickers.iter().enumerate().map(|(i, &t)| (t, i)).collect();

        let width = tickers.len();
        let mut cells: Vec<Option<f64>> = vec![None; dates.len() * width];
        // Non-finite closes count as missing cells.
        for bar in panel.bars().iter().filter(|b| b.close.is_finite()) {
            cells[date_idx[&bar.date] * width + tic_idx[bar.tic.as_str()]] = Some(bar.close);
        }

        let rows = dates
            .iter()
            .enumerate()
            .map(|(i, date)| {
                let row = &cells[i * width..(i + 1) * width];
                row.iter()
                    .enumerate()
                    .map(|(j, cell)| {
                        cell.ok_or_else(|| {
                            Error::data_shape(format!(
                                "no close for ticker '{}' on {}; turbulence needs a dense panel",
                                tickers[j], date
                            ))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
                    .map(DVector::from_vec)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { dates, rows })
    }
}

/// Running mean and co-moment of a growing set of cross-sections.
struct GrowingMoments {
    count: usize,
    mean: DVector<f64>,
    comoment: DMatrix<f64>,
}

impl GrowingMoments {
    fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: DVector::zeros(dim),
            comoment: DMatrix::zeros(dim, dim),
        }
    }

    fn push(&mut self, x: &DVector<f64>) {
        self.count += 1;
        let delta = x - &self.mean;
        self.mean += &delta / self.count as f64;
        let delta_after = x - &self.mean;
        self.comoment += &delta * delta_after.transpose();
    }

    /// Sample covariance (n - 1 denominator). Needs at least two observations.
    fn covariance(&self) -> DMatrix<f64> {
        let cov = &self.comoment / (self.count - 1) as f64;
        (&cov + cov.transpose()) * 0.5
    }
}

/// Growing-window covariance anomaly detector.
#[derive(Debug, Clone)]
pub struct TurbulenceIndex {
    warmup: usize,
    suppression_count: usize,
    singular_policy: SingularPolicy,
}

impl Default for TurbulenceIndex {
    fn default() -> Self {
        Self::new(&TurbulenceConfig::default())
    }
}

impl TurbulenceIndex {
    /// Create from configuration.
    pub fn new(config: &TurbulenceConfig) -> Self {
        Self {
            warmup: config.warmup,
            suppression_count: config.suppression_count,
            singular_policy: config.singular_policy,
        }
    }

    /// Number of leading dates that always score 0.
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// Compute turbulence for every distinct date of the panel.
    pub fn compute(&self, panel: &Panel) -> Result<TurbulenceSeries> {
        if self.warmup < 2 {
            return Err(Error::config(format!(
                "turbulence warm-up must be at least 2, got {}",
                self.warmup
            )));
        }

        let matrix = PriceMatrix::pivot(panel)?;
        let dim = matrix.rows.first().map_or(0, |r| r.len());
        let mut moments = GrowingMoments::new(dim);
        let mut positives = 0usize;
        let mut points = Vec::with_capacity(matrix.dates.len());

        for (i, (&date, current)) in matrix.dates.iter().zip(&matrix.rows).enumerate() {
            if i < self.warmup {
                points.push(TurbulencePoint {
                    date,
                    raw_score: None,
                    turbulence: 0.0,
                });
            } else {
                let score = self.score(&moments, current, date)?;
                let turbulence = if score > 0.0 && score.is_finite() {
                    positives += 1;
                    if positives > self.suppression_count {
                        score
                    } else {
                        debug!(%date, score, positives, "suppressing early turbulence score");
                        0.0
                    }
                } else {
                    0.0
                };
                points.push(TurbulencePoint {
                    date,
                    raw_score: Some(score),
                    turbulence,
                });
            }
            moments.push(current);
        }

        Ok(TurbulenceSeries { points })
    }

    /// `(x - mean) · cov⁻¹ · (x - mean)ᵀ` against the history so far.
    fn score(&self, moments: &GrowingMoments, current: &DVector<f64>, date: NaiveDate) -> Result<f64> {
        let centered = current - &moments.mean;
        let inverse = self.invert(moments.covariance(), date)?;
        Ok(centered.dot(&(&inverse * &centered)))
    }

    fn invert(&self, cov: DMatrix<f64>, date: NaiveDate) -> Result<DMatrix<f64>> {
        let eigenvalues = cov.symmetric_eigenvalues();
        let largest = eigenvalues.max();
        let smallest = eigenvalues.min();
        let well_conditioned = largest > 0.0 && smallest > largest * RCOND;

        match self.singular_policy {
            SingularPolicy::Abort if !well_conditioned => Err(Error::numerical(
                date,
                format!(
                    "covariance is singular or ill-conditioned (eigenvalues {:e}..{:e})",
                    smallest, largest
                ),
            )),
            SingularPolicy::Abort => cov
                .try_inverse()
                .ok_or_else(|| Error::numerical(date, "covariance could not be inverted")),
            SingularPolicy::PseudoInverse if well_conditioned => match cov.clone().try_inverse() {
                Some(inverse) => Ok(inverse),
                None => pseudo_inverse(cov, largest, date),
            },
            SingularPolicy::PseudoInverse => pseudo_inverse(cov, largest, date),
        }
    }
}

fn pseudo_inverse(cov: DMatrix<f64>, largest: f64, date: NaiveDate) -> Result<DMatrix<f64>> {
    cov.pseudo_inverse(largest.max(0.0) * RCOND)
        .map_err(|e| Error::numerical(date, e))
}
