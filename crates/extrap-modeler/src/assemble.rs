//! Model assembly and the per-call-path batch driver.
//!
//! The driver fans call paths out over rayon, collects every outcome, and
//! only then binds selected hypotheses into [`Model`]s. Identifiers are
//! assigned after collection in (call path, metric) order, so numbering
//! does not depend on which worker finished first.

use std::collections::BTreeMap;
use std::sync::Arc;

use extrap_entities::{
    Callpath, CounterWeighting, Hypothesis, MeasurementSequence, Metric, Model,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, warn};

use crate::aggregate::{MeasurementSet, SequenceKey};
use crate::context::ModelingContext;
use crate::error::ModelerError;
use crate::options::FailurePolicy;
use crate::progress::Progress;

/// A selected hypothesis waiting for an identifier.
#[derive(Debug, Clone)]
pub(crate) struct Fitted {
    pub hypothesis: Hypothesis,
    pub measurements: Arc<MeasurementSequence>,
    pub weighting: Option<CounterWeighting>,
}

impl Fitted {
    pub fn independent(
        hypothesis: Hypothesis,
        measurements: Arc<MeasurementSequence>,
    ) -> Self {
        Self {
            hypothesis,
            measurements,
            weighting: None,
        }
    }
}

/// Outcome of one (call path, metric) fit.
pub(crate) type Outcome = (SequenceKey, Result<Fitted, ModelerError>);

/// A fit that failed under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFit {
    pub callpath: Callpath,
    pub metric: Metric,
    /// Rendered error, without backtrace.
    pub reason: String,
}

/// All models of one run, keyed by (call path, metric).
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    models: BTreeMap<SequenceKey, Model>,
    skipped: Vec<SkippedFit>,
}

impl ModelSet {
    pub fn get(&self, callpath: &Callpath, metric: &Metric) -> Option<&Model> {
        self.models.get(&(callpath.clone(), metric.clone()))
    }

    /// Models in (call path, metric) order.
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    /// Fits that failed and were skipped, in (call path, metric) order.
    pub fn skipped(&self) -> &[SkippedFit] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn into_models(self) -> Vec<Model> {
        self.models.into_values().collect()
    }
}

/// Binds a fitted hypothesis to its sequence under a fresh identifier.
pub(crate) fn assemble(ctx: &ModelingContext, fitted: Fitted) -> Model {
    Model::new(
        ctx.next_id(),
        fitted.hypothesis,
        fitted.measurements,
        fitted.weighting,
    )
}

/// Runs `fit_callpath` for every call path of `measurements` in parallel
/// and assembles the results.
///
/// `fit_callpath` receives the call path's sequences in metric order and
/// returns one outcome per model it attempted. The cancellation flag is
/// checked before each call path starts.
pub(crate) fn model_callpaths<F>(
    measurements: &MeasurementSet,
    policy: FailurePolicy,
    ctx: &ModelingContext,
    progress: &dyn Progress,
    fit_callpath: F,
) -> Result<ModelSet, ModelerError>
where
    F: Fn(&Callpath, &[&Arc<MeasurementSequence>]) -> Vec<Outcome> + Sync,
{
    let groups: Vec<_> = measurements.by_callpath().into_iter().collect();
    let _span =
        debug_span!("model_callpaths", callpaths = groups.len()).entered();

    let per_callpath: Vec<Option<Vec<Outcome>>> = groups
        .par_iter()
        .map(|&(callpath, ref sequences)| {
            if ctx.is_cancelled() {
                return None;
            }
            let _span =
                debug_span!("callpath", callpath = %callpath).entered();
            let outcomes = fit_callpath(callpath, sequences.as_slice());
            debug!(models = outcomes.len(), "call path complete");
            progress.callpath_completed();
            Some(outcomes)
        })
        .collect();
    ctx.check_cancelled()?;

    // Modelers may return a call path's outcomes in any order.
    let outcomes: BTreeMap<SequenceKey, Result<Fitted, ModelerError>> =
        per_callpath.into_iter().flatten().flatten().collect();

    let mut fitted = BTreeMap::new();
    let mut skipped = Vec::new();
    for ((callpath, metric), result) in outcomes {
        match result {
            Ok(model) => {
                fitted.insert((callpath, metric), model);
            }
            Err(err) => match policy {
                FailurePolicy::Abort => return Err(err),
                FailurePolicy::Skip => {
                    warn!(
                        callpath = %callpath,
                        metric = %metric,
                        error = %err.summary(),
                        "skipping fit"
                    );
                    skipped.push(SkippedFit {
                        callpath,
                        metric,
                        reason: err.summary(),
                    });
                }
            },
        }
    }

    let models = fitted
        .into_iter()
        .map(|(key, fitted)| (key, assemble(ctx, fitted)))
        .collect();
    Ok(ModelSet { models, skipped })
}
