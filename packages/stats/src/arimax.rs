//! Regression with ARIMA(1,1,1) errors.
//!
//! The model is
//!
//! ```text
//! y_t = x_t'β + u_t
//! (1 - φL)(1 - L) u_t = (1 + θL) ε_t,   ε_t ~ N(0, σ²)
//! ```
//!
//! with no seasonal part and no trend term. It is written in state-space
//! form with state `[u_t, w_t, θε_t]` where `w_t = Δu_t` is the ARMA(1,1)
//! component:
//!
//! ```text
//!     | 1  φ  1 |        | 1 |
//! T = | 0  φ  1 |    R = | 1 |    y_t - x_t'β = [1 0 0] α_t
//!     | 0  0  0 |        | θ |
//! ```
//!
//! Parameters are estimated by maximizing the Gaussian likelihood from the
//! Kalman filter with σ² concentrated out. The integrated level is diffuse,
//! so the filter is started exactly at the first usable observation (whose
//! likelihood contribution is dropped) with `w` and `θε` at their
//! stationary distribution.

use crate::linalg::{design_matrix, dot, ridge_least_squares, usize_to_f64};
use crate::optimize::{NelderMeadConfig, nelder_mead};
use crate::{Result, StatsError};

/// Autoregressive order.
pub const AR_ORDER: usize = 1;
/// Differencing order.
pub const DIFF_ORDER: usize = 1;
/// Moving-average order.
pub const MA_ORDER: usize = 1;
/// Fewest usable rows that can identify the model.
pub const MIN_OBSERVATIONS: usize = AR_ORDER + DIFF_ORDER + MA_ORDER + 1;

const START_RIDGE_PENALTY: f64 = 1e-8;
const SIGMA_FLOOR_RELATIVE: f64 = 1e-8;

type State = [f64; 3];
type Cov = [[f64; 3]; 3];

/// A fitted ARIMAX(1,1,1) model, ready to forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ArimaxFit {
    /// Regression coefficients, one per exogenous column.
    pub beta: Vec<f64>,
    /// Autoregressive coefficient, in `(-1, 1)`.
    pub phi: f64,
    /// Moving-average coefficient, in `(-1, 1)`.
    pub theta: f64,
    /// Innovation variance.
    pub sigma2: f64,
    /// Maximized log-likelihood.
    pub log_likelihood: f64,
    /// Observations that contributed to the likelihood.
    pub nobs: usize,
    /// Optimizer iterations used.
    pub iterations: usize,
    next_state: State,
}

/// Maps an unconstrained value into `(-1, 1)`.
fn constrain(x: f64) -> f64 {
    x / x.mul_add(x, 1.0).sqrt()
}

struct Sample<'a> {
    y: &'a [Option<f64>],
    x: &'a [Vec<Option<f64>>],
    k: usize,
}

impl Sample<'_> {
    /// Target and regressors of row `t` if all are present.
    fn usable(&self, t: usize) -> Option<(f64, Vec<f64>)> {
        let y = self.y[t]?;
        let x: Option<Vec<f64>> = self.x[t].iter().copied().collect();
        x.map(|x| (y, x))
    }

    fn len(&self) -> usize {
        self.y.len()
    }
}

struct FilterOutput {
    sum_sq: f64,
    sum_log_f: f64,
    nobs: usize,
    next_state: State,
}

fn transition(phi: f64) -> [[f64; 3]; 3] {
    [[1.0, phi, 1.0], [0.0, phi, 1.0], [0.0, 0.0, 0.0]]
}

fn mat_vec(t: &[[f64; 3]; 3], a: &State) -> State {
    let mut out = [0.0; 3];
    for (i, row) in t.iter().enumerate() {
        out[i] = dot(row, a);
    }
    out
}

/// `T P Tᵀ + R Rᵀ` with unit innovation variance.
fn predict_cov(t: &[[f64; 3]; 3], p: &Cov, theta: f64) -> Cov {
    let mut tp = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            tp[i][j] = (0..3).map(|m| t[i][m] * p[m][j]).sum();
        }
    }
    let r = [1.0, 1.0, theta];
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = (0..3).map(|m| tp[i][m] * t[j][m]).sum::<f64>() + r[i] * r[j];
        }
    }
    out
}

/// Stationary covariance of `(w, θε)` embedded with a known level.
fn initial_cov(phi: f64, theta: f64) -> Cov {
    let var_w = theta.mul_add(theta, (2.0 * phi).mul_add(theta, 1.0)) / phi.mul_add(-phi, 1.0);
    [
        [0.0, 0.0, 0.0],
        [0.0, var_w, theta],
        [0.0, theta, theta * theta],
    ]
}

fn run_filter(sample: &Sample<'_>, beta: &[f64], phi: f64, theta: f64) -> Option<FilterOutput> {
    let t_mat = transition(phi);
    let n = sample.len();
    let first = (0..n).find(|&t| sample.usable(t).is_some())?;

    let mut a: State = [0.0; 3];
    let mut p: Cov = initial_cov(phi, theta);
    let mut sum_sq = 0.0;
    let mut sum_log_f = 0.0;
    let mut nobs = 0;

    for t in first..n {
        if let Some((y, x)) = sample.usable(t) {
            let resid = y - dot(&x, beta);
            if t == first {
                a[0] = resid;
            } else {
                let f = p[0][0];
                if !(f > 0.0 && f.is_finite()) {
                    return None;
                }
                let v = resid - a[0];
                let gain = [p[0][0] / f, p[1][0] / f, p[2][0] / f];
                for i in 0..3 {
                    a[i] += gain[i] * v;
                }
                let col = [p[0][0], p[1][0], p[2][0]];
                for i in 0..3 {
                    for j in 0..3 {
                        p[i][j] -= col[i] * col[j] / f;
                    }
                }
                sum_sq += v * v / f;
                sum_log_f += f.ln();
                nobs += 1;
            }
        }

        a = mat_vec(&t_mat, &a);
        p = predict_cov(&t_mat, &p, theta);
    }

    Some(FilterOutput {
        sum_sq,
        sum_log_f,
        nobs,
        next_state: a,
    })
}

/// Concentrated log-likelihood and the σ² that attains it.
fn concentrated(out: &FilterOutput, sigma_floor: f64) -> (f64, f64) {
    let n = usize_to_f64(out.nobs);
    let sigma2 = (out.sum_sq / n).max(sigma_floor * sigma_floor);
    let ll = -0.5
        * (n * (2.0 * std::f64::consts::PI).ln() + n * sigma2.ln() + out.sum_sq / sigma2 + out.sum_log_f);
    (ll, sigma2)
}

/// Least squares of `Δy` on `Δx` over consecutive usable rows.
fn starting_beta(sample: &Sample<'_>) -> Result<Vec<f64>> {
    let mut rows = Vec::new();
    let mut rhs = Vec::new();
    for t in 1..sample.len() {
        if let (Some((y0, x0)), Some((y1, x1))) = (sample.usable(t - 1), sample.usable(t)) {
            rows.push(x1.iter().zip(&x0).map(|(a, b)| a - b).collect::<Vec<f64>>());
            rhs.push(y1 - y0);
        }
    }
    if rows.is_empty() || sample.k == 0 {
        return Ok(vec![0.0; sample.k]);
    }
    let design = design_matrix(&rows)?;
    Ok(ridge_least_squares(&design, &rhs, START_RIDGE_PENALTY)?.to_vec())
}

fn validate(endog: &[Option<f64>], exog: &[Vec<Option<f64>>]) -> Result<usize> {
    if endog.len() != exog.len() {
        return Err(StatsError::InvalidInput(format!(
            "{} target values but {} regressor rows",
            endog.len(),
            exog.len()
        )));
    }
    let k = exog.first().map_or(0, Vec::len);
    if exog.iter().any(|row| row.len() != k) {
        return Err(StatsError::InvalidInput("regressor rows have different lengths".to_string()));
    }
    let non_finite = endog.iter().flatten().any(|v| !v.is_finite())
        || exog.iter().flatten().flatten().any(|v| !v.is_finite());
    if non_finite {
        return Err(StatsError::InvalidInput("non-finite value in series".to_string()));
    }
    Ok(k)
}

/// Fits the model to `endog` with one regressor row per period.
///
/// Periods where the target or any regressor is `None` are treated as
/// unobserved: the filter predicts through them.
///
/// # Errors
///
/// * [`StatsError::InvalidInput`] on ragged or non-finite input
/// * [`StatsError::InsufficientData`] with fewer than [`MIN_OBSERVATIONS`]
///   usable periods
/// * [`StatsError::Convergence`] if the optimizer hits its iteration cap or
///   the likelihood is not finite at the optimum
pub fn fit(endog: &[Option<f64>], exog: &[Vec<Option<f64>>]) -> Result<ArimaxFit> {
    fit_with(endog, exog, &NelderMeadConfig::default())
}

/// [`fit`] with explicit optimizer settings.
///
/// # Errors
///
/// See [`fit`].
pub fn fit_with(
    endog: &[Option<f64>],
    exog: &[Vec<Option<f64>>],
    config: &NelderMeadConfig,
) -> Result<ArimaxFit> {
    let k = validate(endog, exog)?;
    let sample = Sample { y: endog, x: exog, k };

    let usable = (0..sample.len()).filter(|&t| sample.usable(t).is_some()).count();
    if usable < MIN_OBSERVATIONS {
        return Err(StatsError::InsufficientData {
            required: MIN_OBSERVATIONS,
            actual: usable,
        });
    }

    let scale = endog
        .iter()
        .flatten()
        .fold(1.0_f64, |acc, v| acc.max(v.abs()));
    let sigma_floor = SIGMA_FLOOR_RELATIVE * scale;

    let mut start = starting_beta(&sample)?;
    start.extend([0.0, 0.0]);

    let objective = |params: &[f64]| {
        let (beta, arma) = params.split_at(k);
        let phi = constrain(arma[0]);
        let theta = constrain(arma[1]);
        run_filter(&sample, beta, phi, theta)
            .map_or(f64::NAN, |out| -concentrated(&out, sigma_floor).0)
    };

    let result = nelder_mead(objective, &start, config);
    log::debug!(
        "ARIMAX optimizer finished: value={} iterations={} converged={}",
        result.value,
        result.iterations,
        result.converged
    );

    if !result.converged {
        return Err(StatsError::Convergence {
            iterations: result.iterations,
            message: if result.value.is_finite() {
                "likelihood did not stabilize within the iteration limit".to_string()
            } else {
                "likelihood is not finite".to_string()
            },
        });
    }

    let (beta, arma) = result.point.split_at(k);
    let phi = constrain(arma[0]);
    let theta = constrain(arma[1]);
    let out = run_filter(&sample, beta, phi, theta).ok_or_else(|| StatsError::Convergence {
        iterations: result.iterations,
        message: "filter diverged at the optimum".to_string(),
    })?;
    let (log_likelihood, sigma2) = concentrated(&out, sigma_floor);
    if !log_likelihood.is_finite() {
        return Err(StatsError::Convergence {
            iterations: result.iterations,
            message: "likelihood is not finite".to_string(),
        });
    }

    Ok(ArimaxFit {
        beta: beta.to_vec(),
        phi,
        theta,
        sigma2,
        log_likelihood,
        nobs: out.nobs,
        iterations: result.iterations,
        next_state: out.next_state,
    })
}

impl ArimaxFit {
    /// Point forecasts for the periods following the fitted sample, one per
    /// row of future regressors.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidInput`] if a row has the wrong number of
    /// regressors or a non-finite value.
    pub fn forecast(&self, future_exog: &[Vec<f64>]) -> Result<Vec<f64>> {
        let t_mat = transition(self.phi);
        let mut state = self.next_state;
        let mut out = Vec::with_capacity(future_exog.len());

        for (h, x) in future_exog.iter().enumerate() {
            if x.len() != self.beta.len() {
                return Err(StatsError::InvalidInput(format!(
                    "forecast step {h} has {} regressors, model has {}",
                    x.len(),
                    self.beta.len()
                )));
            }
            if x.iter().any(|v| !v.is_finite()) {
                return Err(StatsError::InvalidInput(format!(
                    "forecast step {h} has a non-finite regressor"
                )));
            }
            out.push(dot(x, &self.beta) + state[0]);
            state = mat_vec(&t_mat, &state);
        }

        Ok(out)
    }
}
