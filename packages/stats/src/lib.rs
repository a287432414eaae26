#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Numerical building blocks for the tree-cover models.
//!
//! - [`ols`]: ordinary least squares with Student-t p-values
//! - [`trend`]: first-degree trend fitting and extrapolation
//! - [`arimax`]: regression with ARIMA(1,1,1) errors, fitted by maximum
//!   likelihood through a Kalman filter
//! - [`optimize`]: the Nelder-Mead simplex minimizer used by [`arimax`]
//! - [`linalg`]: `ndarray` design matrices and Gram-matrix inversion
//! - [`distribution`]: the special functions behind the p-values
//!
//! Every fit returns [`StatsError`] instead of silently producing `NaN`
//! or unchecked estimates.

pub mod arimax;
pub mod distribution;
pub mod linalg;
pub mod ols;
pub mod optimize;
pub mod trend;

use thiserror::Error;

/// Errors that can occur while fitting a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// Not enough usable observations for the requested model.
    #[error("insufficient data: need at least {required} usable observations but got {actual}")]
    InsufficientData {
        /// Minimum number of observations needed.
        required: usize,
        /// Number of observations available.
        actual: usize,
    },

    /// The design matrix is rank-deficient.
    #[error("rank-deficient design: {0}")]
    Singular(String),

    /// The likelihood optimization did not converge.
    #[error("failed to converge after {iterations} iterations: {message}")]
    Convergence {
        /// Iterations performed.
        iterations: usize,
        /// Description of the failure.
        message: String,
    },

    /// Inputs have inconsistent shapes or non-finite values.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, StatsError>;
