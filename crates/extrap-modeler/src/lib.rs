//! Empirical performance model search.
//!
//! This crate turns repeated measurements of a program, taken at several
//! values of a scaling parameter, into closed-form models such as
//! `3.1 + 0.02 * p^(3/2)`, one per (call path, metric) pair.
//!
//! ## Pipeline
//!
//! 1. [`aggregate`] reduces raw repetitions to mean, median, min, max and
//!    standard deviation per configuration
//! 2. [`HypothesisSpace`] enumerates the fixed set of candidate shapes
//! 3. Each candidate is fitted by linear least squares ([`fit_shape`])
//! 4. The lowest-cost candidate wins, exact ties going to the simpler
//!    shape ([`select_best`])
//! 5. [`HardwareCounterModeler`] optionally replaces runtime models with
//!    composites built from the best-explaining hardware counters
//!
//! Call paths are fitted in parallel with rayon; results do not depend on
//! scheduling.
//!
//! ## Usage
//!
//! ```no_run
//! use extrap_modeler::{ModelerOptions, Strategy, run};
//!
//! let input = std::io::stdin().lock();
//! let mut output = Vec::new();
//! run(input, &mut output, &ModelerOptions::default(), Strategy::Independent)
//!     .unwrap();
//! ```

mod aggregate;
mod assemble;
mod context;
mod error;
mod fit;
mod hardware_counter;
mod hypothesis_space;
mod options;
mod progress;
mod select;
mod single_parameter;

use std::io::{Read, Write};

use extrap_entities::Model;
use serde::{Deserialize, Serialize};
use tracing::{debug_span, warn};

pub use crate::aggregate::{
    MeasurementSet, MissingMeasurement, SampleEntry, SampleSet, SequenceKey,
    aggregate, summarize,
};
pub use crate::assemble::{ModelSet, SkippedFit};
pub use crate::context::ModelingContext;
#[doc(inline)]
pub use crate::error::ModelerError;
use crate::error::ModelerErrorKind;
pub use crate::fit::{Degeneracy, FitData, design_matrix, fit_shape};
pub use crate::hardware_counter::HardwareCounterModeler;
pub use crate::hypothesis_space::{
    HypothesisSpace, LOG_EXPONENTS, POLY_EXPONENTS,
};
pub use crate::options::{
    DEFAULT_COUNTERS, DEFAULT_MAX_COUNTERS, DEFAULT_MIN_MEASUREMENT_POINTS,
    DEFAULT_REFERENCE_COUNTER, FailurePolicy, ModelerOptions,
    WeightingOptions,
};
pub use crate::progress::{LogProgress, NoProgress, Progress};
pub use crate::select::{Candidate, compare, cost, fit_statistics, select_best};
pub use crate::single_parameter::SingleParameterModeler;

/// Which modeler [`run`] applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Every (call path, metric) is modeled on its own.
    #[default]
    Independent,
    /// Runtime models are composed from hardware-counter models.
    HardwareCounters,
}

/// Everything one run produced, as written by [`run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    /// Models in (call path, metric) order.
    pub models: Vec<Model>,
    /// Fits that failed under [`FailurePolicy::Skip`].
    #[serde(default)]
    pub skipped: Vec<SkippedFit>,
    /// Entries the input reported absent; these were not modeled.
    #[serde(default)]
    pub missing: Vec<MissingMeasurement>,
}

/// Runs `strategy` over already aggregated measurements.
///
/// # Errors
///
/// Returns [`ModelerError`] as documented on
/// [`SingleParameterModeler::model`] and [`HardwareCounterModeler::model`].
pub fn model_measurements(
    measurements: &MeasurementSet,
    options: &ModelerOptions,
    strategy: Strategy,
    ctx: &ModelingContext,
    progress: &dyn Progress,
) -> Result<ModelSet, ModelerError> {
    match strategy {
        Strategy::Independent => SingleParameterModeler::new(options.clone())?
            .model(measurements, ctx, progress),
        Strategy::HardwareCounters => {
            HardwareCounterModeler::new(options.clone())?
                .model(measurements, ctx, progress)
        }
    }
}

/// Run the model search.
///
/// Reads a [`SampleSet`] as JSON from the input, aggregates it, models
/// every (call path, metric) with `strategy`, and writes a
/// [`ModelReport`] as JSON to the output.
///
/// Entries the input reports as missing are left out of the fits and
/// listed in the report.
///
/// # Errors
///
/// Returns [`ModelerError`] if:
/// - Reading from input fails ([`ModelerError::is_io`])
/// - The input is not valid JSON ([`ModelerError::is_deserialization`])
/// - Aggregation or modeling fails (see [`aggregate`] and
///   [`model_measurements`])
/// - Writing to output fails ([`ModelerError::is_io`])
/// - JSON serialization fails ([`ModelerError::is_serialization`])
///
/// Why: provides a single, stream-oriented entry point for the CLI.
pub fn run(
    mut input: impl Read,
    mut output: impl Write,
    options: &ModelerOptions,
    strategy: Strategy,
) -> Result<(), ModelerError> {
    let _span = debug_span!("run", ?strategy).entered();

    // Step 1: Read and parse input JSON.
    let mut json = String::new();
    input.read_to_string(&mut json)?;
    let samples: SampleSet = serde_json::from_str(&json).map_err(|e| {
        ModelerError::new(ModelerErrorKind::Deserialization(e))
    })?;

    // Step 2: Aggregate repetitions into measurement sequences.
    let measurements = aggregate(&samples)?;
    if !measurements.missing().is_empty() {
        warn!(
            missing = measurements.missing().len(),
            "input reports missing metrics; modeling the remaining data"
        );
    }

    // Step 3: Model every call path.
    let ctx = ModelingContext::new();
    let progress = LogProgress::new(measurements.by_callpath().len());
    let models =
        model_measurements(&measurements, options, strategy, &ctx, &progress)?;

    // Step 4: Write output JSON.
    let report = ModelReport {
        skipped: models.skipped().to_vec(),
        models: models.into_models(),
        missing: measurements.missing().to_vec(),
    };
    serde_json::to_writer_pretty(&mut output, &report)
        .map_err(|e| ModelerError::new(ModelerErrorKind::Serialization(e)))?;
    writeln!(output)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use extrap_entities::{Callpath, Coordinate, Metric};

    use super::*;

    fn linear_samples() -> SampleSet {
        let mut samples = SampleSet::default();
        for x in [4.0, 8.0, 16.0, 32.0, 64.0] {
            samples.push(
                Callpath::new("main"),
                Metric::runtime("time"),
                Coordinate::single(x),
                vec![2.5 * x, 2.5 * x],
            );
        }
        samples
    }

    #[test]
    fn test_run_roundtrip() {
        let input = serde_json::to_vec(&linear_samples()).unwrap();
        let mut output = Vec::new();
        run(
            input.as_slice(),
            &mut output,
            &ModelerOptions::default(),
            Strategy::Independent,
        )
        .unwrap();

        let report: ModelReport = serde_json::from_slice(&output).unwrap();
        assert_eq!(report.models.len(), 1);
        assert!(report.skipped.is_empty());
        let model = &report.models[0];
        assert_eq!(model.metric().name(), "time");
        assert_eq!(model.measurements().len(), 5);
        assert!(model.cost() < 1e-12);
    }

    #[test]
    fn test_run_invalid_json() {
        let mut output = Vec::new();
        let err = run(
            b"not json".as_slice(),
            &mut output,
            &ModelerOptions::default(),
            Strategy::Independent,
        )
        .unwrap_err();
        assert!(err.is_deserialization());
        assert!(output.is_empty());
    }

    /// Missing entries are reported and do not stop the run.
    #[test]
    fn test_run_reports_missing() {
        let mut samples = linear_samples();
        samples.push_missing(
            Callpath::new("main"),
            Metric::runtime("time"),
            Coordinate::single(128.0),
        );
        let input = serde_json::to_vec(&samples).unwrap();
        let mut output = Vec::new();
        run(
            input.as_slice(),
            &mut output,
            &ModelerOptions::default(),
            Strategy::Independent,
        )
        .unwrap();
        let report: ModelReport = serde_json::from_slice(&output).unwrap();
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.models.len(), 1);
    }
}
