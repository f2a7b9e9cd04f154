//! Coefficient fitting for a fixed candidate shape.
//!
//! A candidate's term shapes are fixed, so fitting it is a linear least
//! squares solve over a design matrix whose columns are the terms evaluated
//! at each measured parameter value. Candidates whose design cannot be
//! built or solved are reported as a [`Degeneracy`] and excluded by the
//! caller; they never produce NaN coefficients.

use std::fmt;

use extrap_entities::{
    Basis, Function, FunctionShape, Hypothesis, MeasurementSequence, TermShape,
};
use extrap_regression::{DMatrix, DVector, RegressionError, fit_least_squares};

use crate::error::{ModelerError, ModelerErrorKind};
use crate::select::{cost, fit_statistics};

/// The (x, y) pairs of one sequence, projected onto one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FitData {
    xs: Vec<f64>,
    ys: Vec<f64>,
    basis: Basis,
}

impl FitData {
    /// Extracts parameter `parameter_index` and the `basis` statistic from
    /// every measurement of `sequence`, in coordinate order.
    ///
    /// # Errors
    ///
    /// Returns an error classified by [`ModelerError::is_dimension_mismatch`]
    /// if a coordinate has no component `parameter_index`.
    pub fn from_sequence(
        sequence: &MeasurementSequence,
        parameter_index: usize,
        basis: Basis,
    ) -> Result<Self, ModelerError> {
        let mut xs = Vec::with_capacity(sequence.len());
        let mut ys = Vec::with_capacity(sequence.len());
        for measurement in sequence.measurements() {
            let Some(x) = measurement.coordinate.get(parameter_index) else {
                return Err(ModelerError::new(
                    ModelerErrorKind::DimensionMismatch {
                        callpath: sequence.callpath().clone(),
                        metric: sequence.metric().clone(),
                        coordinate: measurement.coordinate.clone(),
                        parameter_index,
                    },
                ));
            };
            xs.push(x);
            ys.push(measurement.value(basis));
        }
        Ok(Self { xs, ys, basis })
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn basis(&self) -> Basis {
        self.basis
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

/// Why a candidate shape could not be fitted.
#[derive(Debug)]
pub enum Degeneracy {
    /// A logarithmic term at a non-positive parameter value.
    LogDomain { shape: TermShape, x: f64 },
    /// A term evaluated to NaN or infinity.
    NonFiniteTerm { shape: TermShape, x: f64 },
    /// There is nothing to fit against.
    NoObservations,
    /// The least-squares system has no unique finite solution.
    Regression(RegressionError),
}

impl fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degeneracy::LogDomain { shape, x } => {
                write!(f, "{shape} needs log2 of non-positive parameter {x}")
            }
            Degeneracy::NonFiniteTerm { shape, x } => {
                write!(f, "{shape} is not finite at parameter {x}")
            }
            Degeneracy::NoObservations => f.write_str("no observations"),
            Degeneracy::Regression(err) => write!(f, "{err}"),
        }
    }
}

impl From<RegressionError> for Degeneracy {
    fn from(err: RegressionError) -> Self {
        Degeneracy::Regression(err)
    }
}

/// Builds the design matrix of `shape` over the parameter values `xs`.
///
/// Column 0 is the constant (all ones) when the shape has one, followed by
/// one column per term in shape order.
pub fn design_matrix(
    shape: &FunctionShape,
    xs: &[f64],
) -> Result<DMatrix<f64>, Degeneracy> {
    let offset = usize::from(shape.constant);
    let mut design = DMatrix::zeros(xs.len(), shape.coefficient_count());
    for (row, &x) in xs.iter().enumerate() {
        if shape.constant {
            design[(row, 0)] = 1.0;
        }
        for (column, &term) in shape.terms.iter().enumerate() {
            if term.requires_log() && x <= 0.0 {
                return Err(Degeneracy::LogDomain { shape: term, x });
            }
            let value = term.evaluate(x);
            if !value.is_finite() {
                return Err(Degeneracy::NonFiniteTerm { shape: term, x });
            }
            design[(row, offset + column)] = value;
        }
    }
    Ok(design)
}

/// Fits the coefficients of `shape` to `data` and scores the result.
///
/// The constant-only shape is solved in closed form as the mean of the
/// observations (shifted by the first value, so equal observations give an
/// exact coefficient and zero cost).
///
/// # Errors
///
/// Returns a [`Degeneracy`] if the design cannot be evaluated or the
/// least-squares system has no unique finite solution.
pub fn fit_shape(
    shape: &FunctionShape,
    data: &FitData,
) -> Result<Hypothesis, Degeneracy> {
    let function = if shape.terms.is_empty() && shape.constant {
        Function::new(shifted_mean(&data.ys)?, Vec::new())
    } else {
        let design = design_matrix(shape, &data.xs)?;
        let observations = DVector::from_column_slice(&data.ys);
        let solution = fit_least_squares(&design, &observations)?;
        let mut coefficients = solution.coefficients.into_iter();
        let constant = if shape.constant {
            coefficients.next().unwrap_or_default()
        } else {
            0.0
        };
        let terms = shape
            .terms
            .iter()
            .zip(coefficients)
            .map(|(&term, coefficient)| term.with_coefficient(coefficient))
            .collect();
        Function::new(constant, terms)
    };

    let predicted: Vec<f64> =
        data.xs.iter().map(|&x| function.evaluate(x)).collect();
    let cost = cost(&data.ys, &predicted);
    let statistics =
        fit_statistics(&data.ys, &predicted, function.term_count());
    Ok(Hypothesis::from_fit(function, data.basis, cost, statistics))
}

fn shifted_mean(ys: &[f64]) -> Result<f64, Degeneracy> {
    let Some(&first) = ys.first() else {
        return Err(Degeneracy::NoObservations);
    };
    #[expect(
        clippy::cast_precision_loss,
        reason = "sample counts are far below 2^52"
    )]
    let n = ys.len() as f64;
    Ok(first + ys.iter().map(|y| y - first).sum::<f64>() / n)
}
