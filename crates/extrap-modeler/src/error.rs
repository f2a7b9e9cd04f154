//! Error types for the extrap-modeler crate.

use std::backtrace::Backtrace;
use std::fmt;

use extrap_entities::{Callpath, Coordinate, Metric};

/// Error type for aggregation and model search.
///
/// Every variant that concerns a specific fit carries the call path and
/// metric (and the offending coordinate where there is one) so the caller
/// can decide whether to skip that fit or abort the run. Uses the canonical
/// struct pattern with backtrace capture and `is_xxx()` helper methods.
///
/// Why: the caller's skip-or-abort decision depends on the error class, not
/// on the message text.
#[derive(Debug)]
pub struct ModelerError {
    kind: ModelerErrorKind,
    backtrace: Backtrace,
}

/// Internal error variants. Not exposed publicly; use `is_xxx()` methods.
#[derive(Debug)]
pub(crate) enum ModelerErrorKind {
    /// Fewer distinct configurations than the configured minimum.
    InsufficientData {
        callpath: Callpath,
        metric: Metric,
        found: usize,
        required: usize,
    },
    /// A (call path, metric, coordinate) entry with zero repetitions.
    EmptySamples {
        callpath: Callpath,
        metric: Metric,
        coordinate: Coordinate,
    },
    /// A raw sample was NaN or infinite.
    NonFiniteSample {
        callpath: Callpath,
        metric: Metric,
        coordinate: Coordinate,
    },
    /// No candidate, or the single composite candidate, could be fitted.
    DegenerateFit {
        callpath: Callpath,
        metric: Metric,
        reason: String,
    },
    /// The weighting step needed a counter it was not given.
    MissingWeightMapping {
        callpath: Callpath,
        metric: Metric,
        reason: String,
    },
    /// The counters of the whole measurement set could not be ranked.
    UnrankableCounters(String),
    /// Ingestion reported the metric absent at a coordinate.
    MissingMetricInSource {
        callpath: Callpath,
        metric: Metric,
        coordinate: Coordinate,
    },
    /// A coordinate has no value for the modeled parameter.
    DimensionMismatch {
        callpath: Callpath,
        metric: Metric,
        coordinate: Coordinate,
        parameter_index: usize,
    },
    /// Options failed validation.
    InvalidOptions(String),
    /// The caller abandoned the run between call paths.
    Cancelled,
    /// Failed to deserialize input JSON.
    Deserialization(serde_json::Error),
    /// Failed to serialize output JSON.
    Serialization(serde_json::Error),
    /// I/O error when reading input or writing output.
    Io(std::io::Error),
}

impl ModelerError {
    /// Creates an error from an error kind, capturing a backtrace.
    pub(crate) fn new(kind: ModelerErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn insufficient_data(
        callpath: &Callpath,
        metric: &Metric,
        found: usize,
        required: usize,
    ) -> Self {
        Self::new(ModelerErrorKind::InsufficientData {
            callpath: callpath.clone(),
            metric: metric.clone(),
            found,
            required,
        })
    }

    pub(crate) fn degenerate_fit(
        callpath: &Callpath,
        metric: &Metric,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(ModelerErrorKind::DegenerateFit {
            callpath: callpath.clone(),
            metric: metric.clone(),
            reason: reason.into(),
        })
    }

    pub(crate) fn missing_weight_mapping(
        callpath: &Callpath,
        metric: &Metric,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(ModelerErrorKind::MissingWeightMapping {
            callpath: callpath.clone(),
            metric: metric.clone(),
            reason: reason.into(),
        })
    }

    pub(crate) fn unrankable_counters(reason: impl Into<String>) -> Self {
        Self::new(ModelerErrorKind::UnrankableCounters(reason.into()))
    }

    pub(crate) fn invalid_options(reason: impl Into<String>) -> Self {
        Self::new(ModelerErrorKind::InvalidOptions(reason.into()))
    }

    /// Returns true if there were too few configurations or an empty sample
    /// sequence.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self.kind,
            ModelerErrorKind::InsufficientData { .. }
                | ModelerErrorKind::EmptySamples { .. }
        )
    }

    /// Returns true if a raw sample was NaN or infinite.
    pub fn is_non_finite_sample(&self) -> bool {
        matches!(self.kind, ModelerErrorKind::NonFiniteSample { .. })
    }

    /// Returns true if fitting failed numerically.
    pub fn is_degenerate_fit(&self) -> bool {
        matches!(self.kind, ModelerErrorKind::DegenerateFit { .. })
    }

    /// Returns true if the weighting step lacked a counter mapping or could
    /// not rank the counters.
    pub fn is_missing_weight_mapping(&self) -> bool {
        matches!(
            self.kind,
            ModelerErrorKind::MissingWeightMapping { .. }
                | ModelerErrorKind::UnrankableCounters(_)
        )
    }

    /// Returns true if ingestion reported a metric absent at a coordinate.
    pub fn is_missing_metric_in_source(&self) -> bool {
        matches!(self.kind, ModelerErrorKind::MissingMetricInSource { .. })
    }

    /// Returns true if a coordinate lacked the modeled parameter.
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self.kind, ModelerErrorKind::DimensionMismatch { .. })
    }

    /// Returns true if the options failed validation.
    pub fn is_invalid_options(&self) -> bool {
        matches!(self.kind, ModelerErrorKind::InvalidOptions(_))
    }

    /// Returns true if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ModelerErrorKind::Cancelled)
    }

    /// Returns true if the input JSON could not be parsed.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ModelerErrorKind::Deserialization(_))
    }

    /// Returns true if the output JSON could not be produced.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ModelerErrorKind::Serialization(_))
    }

    /// Returns true if this error is due to I/O failure.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ModelerErrorKind::Io(_))
    }

    /// The call path this error concerns, if it concerns one.
    pub fn callpath(&self) -> Option<&Callpath> {
        match &self.kind {
            ModelerErrorKind::InsufficientData { callpath, .. }
            | ModelerErrorKind::EmptySamples { callpath, .. }
            | ModelerErrorKind::NonFiniteSample { callpath, .. }
            | ModelerErrorKind::DegenerateFit { callpath, .. }
            | ModelerErrorKind::MissingWeightMapping { callpath, .. }
            | ModelerErrorKind::MissingMetricInSource { callpath, .. }
            | ModelerErrorKind::DimensionMismatch { callpath, .. } => {
                Some(callpath)
            }
            _ => None,
        }
    }

    /// The metric this error concerns, if it concerns one.
    pub fn metric(&self) -> Option<&Metric> {
        match &self.kind {
            ModelerErrorKind::InsufficientData { metric, .. }
            | ModelerErrorKind::EmptySamples { metric, .. }
            | ModelerErrorKind::NonFiniteSample { metric, .. }
            | ModelerErrorKind::DegenerateFit { metric, .. }
            | ModelerErrorKind::MissingWeightMapping { metric, .. }
            | ModelerErrorKind::MissingMetricInSource { metric, .. }
            | ModelerErrorKind::DimensionMismatch { metric, .. } => {
                Some(metric)
            }
            _ => None,
        }
    }

    /// The offending coordinate, if the error concerns one.
    pub fn coordinate(&self) -> Option<&Coordinate> {
        match &self.kind {
            ModelerErrorKind::EmptySamples { coordinate, .. }
            | ModelerErrorKind::NonFiniteSample { coordinate, .. }
            | ModelerErrorKind::MissingMetricInSource { coordinate, .. }
            | ModelerErrorKind::DimensionMismatch { coordinate, .. } => {
                Some(coordinate)
            }
            _ => None,
        }
    }

    /// The error message without the backtrace.
    pub fn summary(&self) -> String {
        self.kind.to_string()
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for ModelerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelerErrorKind::InsufficientData {
                callpath,
                metric,
                found,
                required,
            } => write!(
                f,
                "insufficient data for {callpath} / {metric}: {found} \
                 distinct configurations, at least {required} required"
            ),
            ModelerErrorKind::EmptySamples {
                callpath,
                metric,
                coordinate,
            } => write!(
                f,
                "no samples for {callpath} / {metric} at {coordinate}"
            ),
            ModelerErrorKind::NonFiniteSample {
                callpath,
                metric,
                coordinate,
            } => write!(
                f,
                "non-finite sample for {callpath} / {metric} at {coordinate}"
            ),
            ModelerErrorKind::DegenerateFit {
                callpath,
                metric,
                reason,
            } => write!(f, "degenerate fit for {callpath} / {metric}: {reason}"),
            ModelerErrorKind::MissingWeightMapping {
                callpath,
                metric,
                reason,
            } => write!(
                f,
                "missing weight mapping for {callpath} / {metric}: {reason}"
            ),
            ModelerErrorKind::UnrankableCounters(reason) => {
                write!(f, "cannot rank hardware counters: {reason}")
            }
            ModelerErrorKind::MissingMetricInSource {
                callpath,
                metric,
                coordinate,
            } => write!(
                f,
                "metric {metric} missing in source for {callpath} at \
                 {coordinate}"
            ),
            ModelerErrorKind::DimensionMismatch {
                callpath,
                metric,
                coordinate,
                parameter_index,
            } => write!(
                f,
                "coordinate {coordinate} of {callpath} / {metric} has no \
                 parameter {parameter_index}"
            ),
            ModelerErrorKind::InvalidOptions(reason) => {
                write!(f, "invalid options: {reason}")
            }
            ModelerErrorKind::Cancelled => write!(f, "modeling cancelled"),
            ModelerErrorKind::Deserialization(err) => {
                write!(f, "failed to deserialize input: {err}")
            }
            ModelerErrorKind::Serialization(err) => {
                write!(f, "failed to serialize output: {err}")
            }
            ModelerErrorKind::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl fmt::Display for ModelerError {
    /// Formats the error with a summary and captured backtrace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;

        // Backtrace (will be empty unless RUST_BACKTRACE is set).
        write!(f, "{}", self.backtrace)
    }
}

impl std::error::Error for ModelerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ModelerErrorKind::Deserialization(err)
            | ModelerErrorKind::Serialization(err) => Some(err),
            ModelerErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ModelerError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ModelerErrorKind::Io(err))
    }
}
