//! Linear least squares for fixed-shape performance model candidates.
//!
//! Every candidate the modeler tries is linear in its unknown coefficients:
//! the term shapes (`p^i * log2(p)^j`) are fixed, so fitting reduces to
//! solving `min ||X b - y||` for a small dense design matrix `X`. This
//! crate solves that system with a column-scaled singular value
//! decomposition and refuses, rather than guesses, when the system has no
//! unique solution.
//!
//! ```
//! use extrap_regression::{fit_least_squares, DMatrix, DVector};
//!
//! // y = 1 + 2x sampled at x = 1, 2, 3.
//! let design = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
//! let observations = DVector::from_vec(vec![3.0, 5.0, 7.0]);
//! let fit = fit_least_squares(&design, &observations).unwrap();
//! assert!((fit.coefficients[0] - 1.0).abs() < 1e-9);
//! assert!((fit.coefficients[1] - 2.0).abs() < 1e-9);
//! ```

mod error;

pub use nalgebra::{DMatrix, DVector};

#[doc(inline)]
pub use crate::error::RegressionError;
use crate::error::RegressionErrorKind;

/// Relative singular-value threshold below which a direction of the scaled
/// design matrix counts as rank-deficient.
const RANK_TOLERANCE: f64 = 1e-10;

/// Result of a least-squares solve.
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresFit {
    /// One coefficient per design-matrix column, in column order.
    pub coefficients: Vec<f64>,
    /// Sum of squared residuals `||X b - y||²`.
    pub residual_sum_of_squares: f64,
}

/// Solves the linear least-squares problem `min ||design * b - observations||`.
///
/// Columns are scaled to unit norm before decomposition so that terms of
/// very different magnitude (`p^3` next to `log2(p)`) do not distort the
/// rank decision; coefficients are unscaled before returning.
///
/// # Errors
///
/// Returns [`RegressionError`] if:
/// - The design has no columns ([`RegressionError::is_empty_system`])
/// - There are fewer rows than columns ([`RegressionError::is_underdetermined`])
/// - An entry of the design or the observations is NaN or infinite
///   ([`RegressionError::is_non_finite`])
/// - A column is zero or the columns are linearly dependent
///   ([`RegressionError::is_rank_deficient`])
pub fn fit_least_squares(
    design: &DMatrix<f64>,
    observations: &DVector<f64>,
) -> Result<LeastSquaresFit, RegressionError> {
    let (rows, columns) = design.shape();
    if columns == 0 {
        return Err(RegressionError::new(RegressionErrorKind::EmptySystem));
    }
    if rows != observations.len() {
        return Err(RegressionError::new(
            RegressionErrorKind::ShapeMismatch {
                rows,
                observations: observations.len(),
            },
        ));
    }
    if rows < columns {
        return Err(RegressionError::new(
            RegressionErrorKind::Underdetermined { rows, columns },
        ));
    }
    check_finite(design, observations)?;

    // Scale columns to unit Euclidean norm.
    let norms: Vec<f64> =
        design.column_iter().map(|column| column.norm()).collect();
    if let Some(column) = norms.iter().position(|&n| n == 0.0) {
        return Err(RegressionError::new(RegressionErrorKind::ZeroColumn {
            column,
        }));
    }
    let mut scaled = design.clone();
    for (mut column, &norm) in scaled.column_iter_mut().zip(&norms) {
        column /= norm;
    }

    let svd = scaled.svd(true, true);
    let max_sv = svd.singular_values.max();
    let threshold = max_sv * RANK_TOLERANCE;
    let rank = svd
        .singular_values
        .iter()
        .filter(|&&sv| sv > threshold)
        .count();
    if rank < columns {
        return Err(RegressionError::new(
            RegressionErrorKind::RankDeficient { rank, columns },
        ));
    }

    let scaled_solution = svd.solve(observations, threshold).map_err(|e| {
        RegressionError::new(RegressionErrorKind::Decomposition(e))
    })?;
    let coefficients: Vec<f64> = scaled_solution
        .iter()
        .zip(&norms)
        .map(|(b, norm)| b / norm)
        .collect();
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(RegressionError::new(
            RegressionErrorKind::NonFiniteSolution,
        ));
    }

    let residuals =
        design * DVector::from_column_slice(&coefficients) - observations;
    Ok(LeastSquaresFit {
        coefficients,
        residual_sum_of_squares: residuals.norm_squared(),
    })
}

fn check_finite(
    design: &DMatrix<f64>,
    observations: &DVector<f64>,
) -> Result<(), RegressionError> {
    for (row, value) in observations.iter().enumerate() {
        if !value.is_finite() {
            return Err(RegressionError::new(RegressionErrorKind::NonFinite {
                row,
                column: None,
            }));
        }
    }
    for (column, values) in design.column_iter().enumerate() {
        if let Some(row) = values.iter().position(|v| !v.is_finite()) {
            return Err(RegressionError::new(RegressionErrorKind::NonFinite {
                row,
                column: Some(column),
            }));
        }
    }
    Ok(())
}

/// Computes R² of `predicted` against `actual` around the mean of `actual`.
///
/// A constant `actual` has no variance to explain; the result is 1.0 when
/// the prediction matches it exactly and 0.0 otherwise.
#[must_use]
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    #[expect(
        clippy::cast_precision_loss,
        reason = "sample counts are far below 2^52"
    )]
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (&y, &f) in actual.iter().zip(predicted) {
        ss_res += (y - f).powi(2);
        ss_tot += (y - mean).powi(2);
    }
    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Adjusts R² for the number of fitted predictors (excluding the intercept).
///
/// Falls back to the unadjusted value when there are too few observations
/// for the correction to be defined.
#[must_use]
pub fn adjusted_r_squared(
    r_squared: f64,
    observations: usize,
    predictors: usize,
) -> f64 {
    if observations <= predictors + 1 {
        return r_squared;
    }
    #[expect(
        clippy::cast_precision_loss,
        reason = "sample counts are far below 2^52"
    )]
    let (n, k) = (observations as f64, predictors as f64);
    1.0 - (1.0 - r_squared) * (n - 1.0) / (n - k - 1.0)
}
