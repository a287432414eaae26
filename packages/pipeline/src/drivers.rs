//! Per-region regression of tree cover on its drivers.

use forestcast_models::{Driver, DriverEstimate, Observation};
use forestcast_stats::linalg::design_matrix;
use forestcast_stats::{StatsError, ols};

/// Fits `Tree_Cover = intercept + Σ βᵢ·driverᵢ` on one region's rows.
///
/// Rows with a missing target or driver are dropped before fitting. The
/// result has one row per [`Driver::ALL`] entry, intercept first.
///
/// # Errors
///
/// Returns [`StatsError::InsufficientData`] when fewer than six complete
/// rows remain, and [`StatsError::Singular`] when the drivers are
/// collinear.
pub fn estimate_drivers(
    region: &str,
    rows: &[Observation],
) -> Result<Vec<DriverEstimate>, StatsError> {
    let complete: Vec<&Observation> = rows.iter().filter(|o| o.is_complete()).collect();
    let required = Driver::ALL.len() + 1;
    if complete.len() < required {
        return Err(StatsError::InsufficientData {
            required,
            actual: complete.len(),
        });
    }

    let design: Vec<Vec<f64>> = complete
        .iter()
        .map(|o| {
            Driver::ALL
                .iter()
                .map(|d| o.driver(*d).unwrap_or_default())
                .collect()
        })
        .collect();
    let target: Vec<f64> = complete
        .iter()
        .map(|o| o.tree_cover.unwrap_or_default())
        .collect();

    let fit = ols::fit(&design_matrix(&design)?, &target)?;
    log::debug!(
        "[{region}] driver regression on {} rows, residual variance {:.4}",
        complete.len(),
        fit.residual_variance
    );

    Ok(Driver::ALL
        .iter()
        .zip(fit.coefficients.iter().zip(&fit.p_values))
        .map(|(driver, (coefficient, p_value))| DriverEstimate {
            region: region.to_string(),
            driver: *driver,
            coefficient: *coefficient,
            p_value: *p_value,
        })
        .collect())
}
