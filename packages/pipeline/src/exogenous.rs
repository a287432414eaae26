//! Trend extrapolation of the exogenous drivers.
//!
//! Each driver is continued along its own least-squares line over the
//! region's history. Nothing keeps the projections physically plausible:
//! a shrinking series will happily go negative.

use forestcast_models::{Driver, Observation};
use forestcast_stats::StatsError;
use forestcast_stats::trend::LinearTrend;

/// Projected driver values for the forecast horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct ExogenousProjection {
    /// One row per horizon step, values in [`Driver::EXOGENOUS`] order.
    pub rows: Vec<[f64; 4]>,
}

impl ExogenousProjection {
    /// Rows as owned vectors, the shape the target model expects.
    #[must_use]
    pub fn regressor_rows(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.to_vec()).collect()
    }
}

/// A driver whose history could not be extrapolated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot extrapolate {driver}: {source}")]
pub struct ExogenousError {
    /// The offending driver.
    pub driver: Driver,
    /// Why the trend fit failed.
    pub source: StatsError,
}

/// Extrapolates every exogenous driver `steps` years past `rows`.
///
/// `rows` must be one region's history sorted by year. Missing values are
/// skipped but keep their position in the index.
///
/// # Errors
///
/// Returns [`ExogenousError`] for the first driver with fewer than two
/// observed values.
pub fn project_drivers(
    rows: &[Observation],
    steps: usize,
) -> Result<ExogenousProjection, ExogenousError> {
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(Driver::EXOGENOUS.len());

    for driver in Driver::EXOGENOUS {
        let history: Vec<Option<f64>> = rows.iter().map(|o| o.driver(driver)).collect();
        let trend = LinearTrend::fit(&history).map_err(|source| ExogenousError { driver, source })?;
        log::trace!(
            "{driver}: slope {:.4}, intercept {:.4}",
            trend.slope,
            trend.intercept
        );
        columns.push(trend.extrapolate(steps));
    }

    let rows = (0..steps)
        .map(|h| std::array::from_fn(|d| columns[d][h]))
        .collect();

    Ok(ExogenousProjection { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<Observation> {
        (0..5)
            .map(|i| {
                let t = f64::from(i);
                let mut o = Observation::empty("NCR", 2016 + i);
                o.agriculture = Some(t.mul_add(2.0, 10.0));
                o.logging = Some(t.mul_add(-1.0, 50.0));
                o.urbanization = Some(40.0);
                o.roads_km = Some(t.mul_add(100.0, 1_000.0));
                o
            })
            .collect()
    }

    #[test]
    fn continues_each_driver_independently() {
        let projection = project_drivers(&history(), 3).unwrap();
        assert_eq!(projection.rows.len(), 3);

        let expected = [
            [20.0, 45.0, 40.0, 1_500.0],
            [22.0, 44.0, 40.0, 1_600.0],
            [24.0, 43.0, 40.0, 1_700.0],
        ];
        for (row, want) in projection.rows.iter().zip(expected) {
            for (got, want) in row.iter().zip(want) {
                assert!((got - want).abs() < 1e-9, "{row:?}");
            }
        }
    }

    #[test]
    fn missing_values_keep_their_year_slot() {
        let mut rows = history();
        rows[2].agriculture = None;
        let projection = project_drivers(&rows, 1).unwrap();
        assert!((projection.rows[0][0] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn driver_without_history_fails() {
        let mut rows = history();
        for o in &mut rows[1..] {
            o.roads_km = None;
        }
        let err = project_drivers(&rows, 2).unwrap_err();
        assert_eq!(err.driver, Driver::RoadsKm);
        assert!(matches!(err.source, StatsError::InsufficientData { .. }));
    }

    #[test]
    fn regressor_rows_match_driver_order() {
        let projection = project_drivers(&history(), 1).unwrap();
        assert_eq!(projection.regressor_rows()[0].len(), Driver::EXOGENOUS.len());
    }
}
