//! Fitted candidate functions and their error against the data.

use serde::{Deserialize, Serialize};

use crate::{Basis, Function};

/// Goodness-of-fit figures reported alongside the selection cost.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FitStatistics {
    /// Residual sum of squares.
    pub rss: f64,
    /// Sum of squared relative residuals.
    pub rrss: f64,
    /// Symmetric mean absolute percentage error, in percent.
    pub smape: f64,
    /// Adjusted coefficient of determination.
    pub adjusted_r_squared: f64,
}

/// A function fitted to one measurement sequence, with its cost.
///
/// The cost is always computed against the same sequence the coefficients
/// were fitted on; only the fitter constructs hypotheses, and nothing
/// mutates one afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    function: Function,
    basis: Basis,
    cost: f64,
    statistics: FitStatistics,
}

impl Hypothesis {
    /// Bundles a freshly fitted function with the figures computed on the
    /// same data.
    pub fn from_fit(
        function: Function,
        basis: Basis,
        cost: f64,
        statistics: FitStatistics,
    ) -> Self {
        Self {
            function,
            basis,
            cost,
            statistics,
        }
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    /// Which statistic (mean or median) the fit targeted.
    pub fn basis(&self) -> Basis {
        self.basis
    }

    /// Scale-normalized fit error; lower is better.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn statistics(&self) -> &FitStatistics {
        &self.statistics
    }

    /// Consumes the hypothesis, returning its function.
    pub fn into_function(self) -> Function {
        self.function
    }
}
