//! Dense linear algebra helpers for the regression code.
//!
//! Design matrices are `ndarray` arrays; the one factorization needed, the
//! inverse of a Gram matrix, goes through `nalgebra`'s Cholesky
//! decomposition.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1};

use crate::{Result, StatsError};

/// Smallest Cholesky pivot, on the unit-diagonal scaled matrix, accepted
/// as full rank.
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Builds a design matrix from equally sized rows.
///
/// # Errors
///
/// Returns [`StatsError::InvalidInput`] if the rows are ragged.
pub fn design_matrix(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != cols) {
        return Err(StatsError::InvalidInput(
            "matrix rows have different lengths".to_string(),
        ));
    }
    let data: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), cols), data)
        .map_err(|e| StatsError::InvalidInput(e.to_string()))
}

/// Inverts a symmetric positive-definite matrix.
///
/// The matrix is first scaled to unit diagonal so that columns measured
/// in very different units (hectares next to percentages) do not trip
/// the singularity check.
///
/// # Errors
///
/// Returns [`StatsError::InvalidInput`] if the matrix is not square and
/// [`StatsError::Singular`] if it has a non-positive diagonal entry or is
/// numerically rank-deficient.
pub fn invert_spd(m: &Array2<f64>) -> Result<Array2<f64>> {
    let (n, cols) = m.dim();
    if n != cols {
        return Err(StatsError::InvalidInput("matrix is not square".to_string()));
    }

    let mut scale: Array1<f64> = Array1::zeros(n);
    for i in 0..n {
        let d = m[[i, i]];
        if d <= 0.0 || !d.is_finite() {
            return Err(StatsError::Singular(format!("column {i} has no variation")));
        }
        scale[i] = 1.0 / d.sqrt();
    }

    let scaled = DMatrix::from_fn(n, n, |i, j| m[[i, j]] * scale[i] * scale[j]);
    let cholesky = scaled.cholesky().ok_or_else(|| {
        StatsError::Singular("columns are linearly dependent".to_string())
    })?;

    let l = cholesky.l();
    if let Some(col) = (0..n).find(|&i| l[(i, i)] * l[(i, i)] < SINGULAR_TOLERANCE) {
        return Err(StatsError::Singular(format!(
            "column {col} is a linear combination of the others"
        )));
    }

    let inv = cholesky.inverse();
    Ok(Array2::from_shape_fn((n, n), |(i, j)| {
        inv[(i, j)] * scale[i] * scale[j]
    }))
}

/// Dot product of two equally long slices.
#[must_use]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    ArrayView1::from(a).dot(&ArrayView1::from(b))
}

/// Solves the ridge-regularized normal equations
/// `(AᵀA + λI) x = Aᵀb` with `λ` proportional to the mean diagonal.
///
/// Used for starting values, where an exact answer is not required but
/// collinear or constant columns must not cause a failure.
///
/// # Errors
///
/// Returns [`StatsError::InvalidInput`] on shape mismatch.
pub fn ridge_least_squares(
    a: &Array2<f64>,
    b: &[f64],
    relative_penalty: f64,
) -> Result<Array1<f64>> {
    if b.len() != a.nrows() {
        return Err(StatsError::InvalidInput(format!(
            "vector length {} does not match {} rows",
            b.len(),
            a.nrows()
        )));
    }
    let k = a.ncols();
    if k == 0 {
        return Ok(Array1::zeros(0));
    }

    let mut gram = a.t().dot(a);
    let rhs = a.t().dot(&ArrayView1::from(b));

    let mean_diag = gram.diag().sum() / usize_to_f64(k);
    let lambda = relative_penalty * mean_diag.max(f64::MIN_POSITIVE) + f64::MIN_POSITIVE;
    gram.diag_mut().mapv_inplace(|d| d + lambda);

    match invert_spd(&gram) {
        Ok(inv) => Ok(inv.dot(&rhs)),
        Err(StatsError::Singular(_)) => Ok(Array1::zeros(k)),
        Err(e) => Err(e),
    }
}

/// Converts a count to `f64`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub const fn usize_to_f64(n: usize) -> f64 {
    n as f64
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn design_matrix_keeps_row_order() {
        let m = design_matrix(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(m.dim(), (3, 2));
        assert_eq!(m.t().dot(&m), array![[35.0, 44.0], [44.0, 56.0]]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(matches!(
            design_matrix(&[vec![1.0], vec![1.0, 2.0]]),
            Err(StatsError::InvalidInput(_))
        ));
    }

    #[test]
    fn inverts_badly_scaled_spd_matrix() {
        let m = array![[4.0e8, 2.0e4], [2.0e4, 3.0]];
        let inv = invert_spd(&m).unwrap();
        let product = m.dot(&inv);
        for ((i, j), v) in product.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((v - expected).abs() < 1e-9, "({i},{j}) = {v}");
        }
    }

    #[test]
    fn detects_singular_matrix() {
        let collinear = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matches!(invert_spd(&collinear), Err(StatsError::Singular(_))));

        let zero_col = array![[1.0, 0.0], [0.0, 0.0]];
        assert!(matches!(invert_spd(&zero_col), Err(StatsError::Singular(_))));
    }

    #[test]
    fn non_square_is_invalid() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(matches!(invert_spd(&m), Err(StatsError::InvalidInput(_))));
    }

    #[test]
    fn ridge_handles_collinear_columns() {
        let a = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let x = ridge_least_squares(&a, &[2.0, 2.0, 2.0], 1e-8).unwrap();
        assert!((x[0] + x[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn dot_of_slices() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, -5.0, 6.0]), 12.0);
    }
}
