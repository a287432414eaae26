//! Per-region ARIMAX forecast of tree cover.

use forestcast_models::{Driver, ForecastHorizon, ForecastPoint, Observation};
use forestcast_stats::{StatsError, arimax};

use crate::exogenous::ExogenousProjection;

/// Last history year when it is not the year before the horizon.
fn history_gap(rows: &[Observation], horizon: ForecastHorizon) -> Option<i32> {
    rows.last()
        .map(|o| o.year)
        .filter(|&year| year + 1 != horizon.start_year)
}

/// Fits ARIMAX(1,1,1) on one region's tree cover with the four drivers as
/// regressors, then forecasts the horizon using the projected drivers.
///
/// `rows` must be sorted by year. Rows with a missing target or driver are
/// treated as unobserved periods.
///
/// # Errors
///
/// Returns [`StatsError::InsufficientData`] with fewer than four usable
/// rows and [`StatsError::Convergence`] if the likelihood fit fails.
pub fn forecast_target(
    region: &str,
    rows: &[Observation],
    projection: &ExogenousProjection,
    horizon: ForecastHorizon,
) -> Result<Vec<ForecastPoint>, StatsError> {
    let endog: Vec<Option<f64>> = rows.iter().map(|o| o.tree_cover).collect();
    let exog: Vec<Vec<Option<f64>>> = rows
        .iter()
        .map(|o| Driver::EXOGENOUS.iter().map(|d| o.driver(*d)).collect())
        .collect();

    if let Some(last) = history_gap(rows, horizon) {
        log::warn!(
            "[{region}] history ends in {last} but the horizon starts in {}; \
             forecast years are labelled from the horizon",
            horizon.start_year
        );
    }

    let model = arimax::fit(&endog, &exog)?;
    log::debug!(
        "[{region}] ARIMAX fit: phi={:.4} theta={:.4} sigma2={:.4} loglik={:.3} ({} iterations)",
        model.phi,
        model.theta,
        model.sigma2,
        model.log_likelihood,
        model.iterations
    );

    let values = model.forecast(&projection.regressor_rows())?;

    Ok(horizon
        .years()
        .into_iter()
        .zip(values)
        .map(|(year, forecast)| ForecastPoint {
            region: region.to_string(),
            year,
            forecast,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exogenous::project_drivers;

    fn linear_region(region: &str, years: std::ops::Range<i32>) -> Vec<Observation> {
        years
            .map(|year| {
                let t = f64::from(year - 2015);
                let mut o = Observation::empty(region, year);
                o.agriculture = Some(t.mul_add(3.0, 100.0));
                o.logging = Some(t.mul_add(-2.0, 80.0));
                o.urbanization = Some(t.mul_add(0.5, 30.0));
                o.roads_km = Some(t.mul_add(10.0, 500.0));
                o.tree_cover = Some(t.mul_add(-20.0, 5_000.0));
                o
            })
            .collect()
    }

    #[test]
    fn forecasts_every_horizon_year() {
        let rows = linear_region("CAR", 2015..2021);
        let horizon = ForecastHorizon::default();
        let projection = project_drivers(&rows, horizon.len).unwrap();
        let points = forecast_target("CAR", &rows, &projection, horizon).unwrap();

        let years: Vec<i32> = points.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2021, 2022, 2023, 2024, 2025]);
        assert!(points.iter().all(|p| p.region == "CAR" && p.forecast.is_finite()));
        // Noiseless linear history: the forecast continues the line.
        for p in &points {
            let want = f64::from(p.year - 2015).mul_add(-20.0, 5_000.0);
            assert!((p.forecast - want).abs() < 1.0, "{p:?} vs {want}");
        }
    }

    #[test]
    fn short_history_is_insufficient() {
        let rows = linear_region("CAR", 2018..2021);
        let horizon = ForecastHorizon::default();
        let projection = project_drivers(&rows, horizon.len).unwrap();
        let err = forecast_target("CAR", &rows, &projection, horizon).unwrap_err();
        assert!(matches!(err, StatsError::InsufficientData { actual: 3, .. }));
    }

    #[test]
    fn detects_history_not_adjacent_to_horizon() {
        let horizon = ForecastHorizon::default();
        assert_eq!(history_gap(&linear_region("CAR", 2015..2021), horizon), None);
        assert_eq!(
            history_gap(&linear_region("CAR", 2012..2019), horizon),
            Some(2018)
        );
        assert_eq!(history_gap(&[], horizon), None);
    }
}
