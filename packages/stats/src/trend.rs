//! First-degree trend lines over an evenly spaced index.

use crate::linalg::usize_to_f64;
use crate::{Result, StatsError};

/// A least-squares line `value = intercept + slope * index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrend {
    /// Change per index step.
    pub slope: f64,
    /// Value at index 0.
    pub intercept: f64,
    /// Length of the series the line was fitted on.
    pub len: usize,
}

impl LinearTrend {
    /// Fits a line to `(i, values[i])`.
    ///
    /// `None` entries are skipped but still occupy their index, so a gap
    /// in the middle of a series does not shift later points.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InsufficientData`] with fewer than two present
    /// values and [`StatsError::InvalidInput`] for non-finite values.
    pub fn fit(values: &[Option<f64>]) -> Result<Self> {
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (usize_to_f64(i), v)))
            .collect();

        if points.len() < 2 {
            return Err(StatsError::InsufficientData {
                required: 2,
                actual: points.len(),
            });
        }
        if points.iter().any(|(_, v)| !v.is_finite()) {
            return Err(StatsError::InvalidInput("non-finite value in trend series".to_string()));
        }

        let n = usize_to_f64(points.len());
        let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
            let dx = x - mean_x;
            (dx.mul_add(dx, sxx), dx.mul_add(y - mean_y, sxy))
        });

        let slope = sxy / sxx;
        Ok(Self {
            slope,
            intercept: slope.mul_add(-mean_x, mean_y),
            len: values.len(),
        })
    }

    /// Value of the line at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> f64 {
        self.slope.mul_add(usize_to_f64(index), self.intercept)
    }

    /// Continues the line for `steps` indices past the fitted series.
    #[must_use]
    pub fn extrapolate(&self, steps: usize) -> Vec<f64> {
        (self.len..self.len + steps).map(|i| self.at(i)).collect()
    }
}
