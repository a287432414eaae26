//! Ordinary least squares with classical standard errors.

use ndarray::{Array2, ArrayView1};

use crate::distribution::student_t_two_sided_p;
use crate::linalg::{invert_spd, usize_to_f64};
use crate::{Result, StatsError};

/// A fitted linear model `y = X β + ε`.
#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    /// Estimated coefficients, one per design column.
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients.
    pub std_errors: Vec<f64>,
    /// t statistics `β / se`.
    pub t_values: Vec<f64>,
    /// Two-sided p-values against `β = 0`.
    pub p_values: Vec<f64>,
    /// Unbiased residual variance `RSS / (n - k)`.
    pub residual_variance: f64,
    /// Residual degrees of freedom `n - k`.
    pub df: usize,
}

/// Fits `y` on the columns of `x` (include a column of ones for an
/// intercept).
///
/// Needs at least one residual degree of freedom. A coefficient with zero
/// standard error (perfect fit) gets p-value 0, or 1 if the coefficient is
/// itself zero.
///
/// # Errors
///
/// * [`StatsError::InvalidInput`] if shapes disagree or values are not finite
/// * [`StatsError::InsufficientData`] if `n <= k`
/// * [`StatsError::Singular`] if the design columns are collinear
pub fn fit(x: &Array2<f64>, y: &[f64]) -> Result<OlsFit> {
    let (n, k) = x.dim();

    if y.len() != n {
        return Err(StatsError::InvalidInput(format!(
            "design has {n} rows but response has {}",
            y.len()
        )));
    }
    if k == 0 {
        return Err(StatsError::InvalidInput("design has no columns".to_string()));
    }
    if y.iter().any(|v| !v.is_finite()) || x.iter().any(|v| !v.is_finite()) {
        return Err(StatsError::InvalidInput("non-finite value in regression input".to_string()));
    }
    if n <= k {
        return Err(StatsError::InsufficientData {
            required: k + 1,
            actual: n,
        });
    }

    let xtx_inv = invert_spd(&x.t().dot(x))?;
    let y = ArrayView1::from(y);
    let coefficients = xtx_inv.dot(&x.t().dot(&y));

    let residuals = &y - &x.dot(&coefficients);
    let rss = residuals.dot(&residuals);
    let df = n - k;
    let df_f = usize_to_f64(df);
    let residual_variance = rss / df_f;

    let mut std_errors = Vec::with_capacity(k);
    let mut t_values = Vec::with_capacity(k);
    let mut p_values = Vec::with_capacity(k);

    for (j, &beta) in coefficients.iter().enumerate() {
        let se = (residual_variance * xtx_inv[[j, j]]).max(0.0).sqrt();
        let (t, p) = if se > 0.0 {
            let t = beta / se;
            (t, student_t_two_sided_p(t, df_f))
        } else if beta == 0.0 {
            (0.0, 1.0)
        } else {
            (f64::INFINITY.copysign(beta), 0.0)
        };
        std_errors.push(se);
        t_values.push(t);
        p_values.push(p);
    }

    Ok(OlsFit {
        coefficients: coefficients.to_vec(),
        std_errors,
        t_values,
        p_values,
        residual_variance,
        df,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::design_matrix;

    fn design(rows: &[&[f64]]) -> Array2<f64> {
        design_matrix(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn recovers_exact_linear_relation() {
        // y = 3 + 2 x1 - 0.5 x2
        let rows: Vec<[f64; 3]> = [(1.0, 4.0), (2.0, 1.0), (3.0, 7.0), (4.0, 2.0), (5.0, 9.0), (6.0, 3.0)]
            .iter()
            .map(|&(a, b)| [1.0, a, b])
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| 3.0 + 2.0 * r[1] - 0.5 * r[2]).collect();
        let x = design(&rows.iter().map(|r| &r[..]).collect::<Vec<_>>());

        let fit = fit(&x, &y).unwrap();
        assert_eq!(fit.df, 3);
        for (got, want) in fit.coefficients.iter().zip([3.0, 2.0, -0.5]) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
        assert!(fit.p_values.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn simple_regression_matches_hand_computation() {
        // x = 1..5, y = 2, 4, 5, 4, 5: slope 0.6, intercept 2.2,
        // RSS = 2.4, s² = 0.8, se(slope) = sqrt(0.8 / 10)
        let x = design(&[&[1.0, 1.0], &[1.0, 2.0], &[1.0, 3.0], &[1.0, 4.0], &[1.0, 5.0]]);
        let y = [2.0, 4.0, 5.0, 4.0, 5.0];
        let fit = fit(&x, &y).unwrap();

        assert!((fit.coefficients[0] - 2.2).abs() < 1e-10);
        assert!((fit.coefficients[1] - 0.6).abs() < 1e-10);
        assert!((fit.residual_variance - 0.8).abs() < 1e-10);
        assert!((fit.std_errors[1] - 0.08_f64.sqrt()).abs() < 1e-10);
        let t = 0.6 / 0.08_f64.sqrt();
        assert!((fit.t_values[1] - t).abs() < 1e-9);
        assert!((fit.p_values[1] - student_t_two_sided_p(t, 3.0)).abs() < 1e-12);
    }

    #[test]
    fn perfect_fit_is_highly_significant() {
        let x = design(&[&[1.0, 1.0], &[1.0, 2.0], &[1.0, 3.0]]);
        let fit = fit(&x, &[2.0, 4.0, 6.0]).unwrap();
        assert!(fit.p_values[1] < 1e-6, "{}", fit.p_values[1]);
    }

    #[test]
    fn too_few_rows_is_insufficient_data() {
        let x = design(&[&[1.0, 1.0], &[1.0, 2.0]]);
        assert_eq!(
            fit(&x, &[1.0, 2.0]),
            Err(StatsError::InsufficientData {
                required: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn collinear_design_is_singular() {
        let x = design(&[&[1.0, 2.0], &[1.0, 2.0], &[1.0, 2.0], &[1.0, 2.0]]);
        assert!(matches!(fit(&x, &[1.0, 2.0, 3.0, 4.0]), Err(StatsError::Singular(_))));
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let x = design(&[&[1.0, 1.0], &[1.0, 2.0], &[1.0, 3.0]]);
        assert!(matches!(
            fit(&x, &[1.0, f64::NAN, 3.0]),
            Err(StatsError::InvalidInput(_))
        ));
    }
}
