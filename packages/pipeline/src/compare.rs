//! Scoring forecasts against later-observed actuals.

use std::collections::HashSet;

use forestcast_dataset::Actuals;
use forestcast_models::{ComparisonRow, ForecastPoint};
use forestcast_stats::linalg::usize_to_f64;

/// Errors raised while scoring forecasts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompareError {
    /// The actual is zero, so the percentage error is undefined.
    #[error("actual tree cover for {region} in {year} is zero; percentage error is undefined")]
    ZeroActual {
        /// Region of the affected row.
        region: String,
        /// Year of the affected row.
        year: i32,
    },

    /// No forecast could be matched against an actual.
    #[error("no comparison rows to aggregate")]
    Empty,
}

/// Overall error figures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    /// Mean absolute error.
    pub mae: f64,
    /// Mean absolute percentage error.
    pub mape: f64,
}

/// Scores one forecast against its actual.
///
/// `APE = |Forecast - Actual| * 100 / |Actual|`.
///
/// # Errors
///
/// Returns [`CompareError::ZeroActual`] when `actual` is zero.
pub fn score(point: &ForecastPoint, actual: f64) -> Result<ComparisonRow, CompareError> {
    if actual == 0.0 {
        return Err(CompareError::ZeroActual {
            region: point.region.clone(),
            year: point.year,
        });
    }
    let ae = (point.forecast - actual).abs();
    Ok(ComparisonRow {
        region: point.region.clone(),
        year: point.year,
        actual,
        forecast: point.forecast,
        ae,
        ape: ae * 100.0 / actual.abs(),
    })
}

/// Matches forecasts with actuals.
///
/// Forecasts without an actual produce nothing. Zero actuals are returned
/// as errors alongside the scored rows.
#[must_use]
pub fn compare(
    forecasts: &[ForecastPoint],
    actuals: &Actuals,
) -> (Vec<ComparisonRow>, Vec<CompareError>) {
    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for point in forecasts {
        let Some(actual) = actuals.get(&point.region, point.year) else {
            continue;
        };
        match score(point, actual) {
            Ok(row) => rows.push(row),
            Err(e) => errors.push(e),
        }
    }
    (rows, errors)
}

/// Keeps the first row for each `(Region, Year)`.
#[must_use]
pub fn deduplicate(rows: Vec<ComparisonRow>) -> Vec<ComparisonRow> {
    let mut seen = HashSet::with_capacity(rows.len());
    let before = rows.len();
    let kept: Vec<ComparisonRow> = rows
        .into_iter()
        .filter(|row| seen.insert((row.region.clone(), row.year)))
        .collect();
    if kept.len() < before {
        log::debug!("Dropped {} duplicate comparison rows", before - kept.len());
    }
    kept
}

/// Mean AE and APE over `rows`.
///
/// # Errors
///
/// Returns [`CompareError::Empty`] when `rows` is empty.
pub fn aggregate(rows: &[ComparisonRow]) -> Result<Metrics, CompareError> {
    if rows.is_empty() {
        return Err(CompareError::Empty);
    }
    let n = usize_to_f64(rows.len());
    Ok(Metrics {
        mae: rows.iter().map(|r| r.ae).sum::<f64>() / n,
        mape: rows.iter().map(|r| r.ape).sum::<f64>() / n,
    })
}
