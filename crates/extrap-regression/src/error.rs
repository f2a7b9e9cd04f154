//! Error types for the extrap-regression crate.

use std::backtrace::Backtrace;
use std::fmt;

/// Error returned when a least-squares system has no unique, finite
/// solution.
///
/// Uses the canonical struct pattern: a private kind, a captured backtrace
/// and `is_xxx()` classification helpers.
#[derive(Debug)]
pub struct RegressionError {
    kind: RegressionErrorKind,
    backtrace: Backtrace,
}

/// Internal error variants. Not exposed publicly; use `is_xxx()` methods.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RegressionErrorKind {
    /// The design matrix has no columns.
    EmptySystem,
    /// Design rows and observation count differ.
    ShapeMismatch { rows: usize, observations: usize },
    /// Fewer observations than unknown coefficients.
    Underdetermined { rows: usize, columns: usize },
    /// A design entry (`column: Some`) or observation (`column: None`) is
    /// NaN or infinite.
    NonFinite { row: usize, column: Option<usize> },
    /// A design column is identically zero.
    ZeroColumn { column: usize },
    /// The columns are linearly dependent.
    RankDeficient { rank: usize, columns: usize },
    /// The decomposition could not produce a solution.
    Decomposition(&'static str),
    /// The solve produced NaN or infinite coefficients.
    NonFiniteSolution,
}

impl RegressionError {
    /// Creates an error from an error kind, capturing a backtrace.
    pub(crate) fn new(kind: RegressionErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Returns true if the design matrix had no columns.
    pub fn is_empty_system(&self) -> bool {
        matches!(self.kind, RegressionErrorKind::EmptySystem)
    }

    /// Returns true if there were fewer observations than coefficients.
    pub fn is_underdetermined(&self) -> bool {
        matches!(self.kind, RegressionErrorKind::Underdetermined { .. })
    }

    /// Returns true if an input was NaN or infinite.
    pub fn is_non_finite(&self) -> bool {
        matches!(self.kind, RegressionErrorKind::NonFinite { .. })
    }

    /// Returns true if the columns do not determine a unique solution.
    ///
    /// Covers zero columns, linear dependence, and solves that blew up
    /// numerically.
    pub fn is_rank_deficient(&self) -> bool {
        matches!(
            self.kind,
            RegressionErrorKind::ZeroColumn { .. }
                | RegressionErrorKind::RankDeficient { .. }
                | RegressionErrorKind::NonFiniteSolution
        )
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for RegressionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegressionErrorKind::EmptySystem => {
                write!(f, "design matrix has no columns")
            }
            RegressionErrorKind::ShapeMismatch { rows, observations } => {
                write!(
                    f,
                    "design has {rows} rows but {observations} observations"
                )
            }
            RegressionErrorKind::Underdetermined { rows, columns } => {
                write!(
                    f,
                    "underdetermined system: {rows} observations for \
                     {columns} coefficients"
                )
            }
            RegressionErrorKind::NonFinite {
                row,
                column: Some(column),
            } => {
                write!(f, "non-finite design entry at row {row}, column {column}")
            }
            RegressionErrorKind::NonFinite { row, column: None } => {
                write!(f, "non-finite observation at row {row}")
            }
            RegressionErrorKind::ZeroColumn { column } => {
                write!(f, "design column {column} is zero (rank deficient)")
            }
            RegressionErrorKind::RankDeficient { rank, columns } => {
                write!(f, "design matrix has rank {rank} < {columns} columns")
            }
            RegressionErrorKind::Decomposition(msg) => {
                write!(f, "decomposition failed: {msg}")
            }
            RegressionErrorKind::NonFiniteSolution => {
                write!(f, "solution has non-finite coefficients")
            }
        }
    }
}

impl fmt::Display for RegressionError {
    /// Formats the kind only; the backtrace is available separately since
    /// these errors are routinely recovered from.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for RegressionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_exclusive() {
        let err = RegressionError::new(RegressionErrorKind::Underdetermined {
            rows: 2,
            columns: 3,
        });
        assert!(err.is_underdetermined());
        assert!(!err.is_rank_deficient());
        assert!(!err.is_non_finite());
        assert!(!err.is_empty_system());
        assert!(err.to_string().contains("2 observations for 3 coefficients"));
    }

    #[test]
    fn test_backtrace_captured() {
        let err = RegressionError::new(RegressionErrorKind::NonFiniteSolution);
        // Content depends on RUST_BACKTRACE; the accessor must not panic.
        let _ = err.backtrace();
        assert!(err.is_rank_deficient());
    }
}
