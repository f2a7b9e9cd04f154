//! Final models bound to a call path and metric.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Callpath, Coordinate, Function, Hypothesis, MeasurementSequence, Metric,
};

/// Identifier of a model within one modeling run.
///
/// Allocated from the run's context, never from process-global state, so
/// concurrent runs cannot interfere with each other's numbering.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ModelId(pub u64);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A counter retained for a composite runtime model, with its share of the
/// reference counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterShare {
    pub metric: Metric,
    /// `sum(counter) / sum(reference)` over the shared configurations.
    pub share: f64,
}

/// Provenance of a composite runtime model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterWeighting {
    /// Retained counters, highest share first.
    pub counters: Vec<CounterShare>,
    /// For each term of the composite function (same order), the counter
    /// whose fitted function it was copied from.
    pub term_origins: Vec<Metric>,
}

/// A selected hypothesis bound to one (call path, metric) pair.
///
/// Immutable: the hypothesis and the measurement sequence it was fitted
/// against are fixed at construction and only exposed by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    id: ModelId,
    callpath: Callpath,
    metric: Metric,
    hypothesis: Hypothesis,
    measurements: Arc<MeasurementSequence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weighting: Option<CounterWeighting>,
}

impl Model {
    /// Binds a hypothesis to the sequence it was fitted against.
    ///
    /// The call path and metric are taken from the sequence.
    pub fn new(
        id: ModelId,
        hypothesis: Hypothesis,
        measurements: Arc<MeasurementSequence>,
        weighting: Option<CounterWeighting>,
    ) -> Self {
        Self {
            id,
            callpath: measurements.callpath().clone(),
            metric: measurements.metric().clone(),
            hypothesis,
            measurements,
            weighting,
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn callpath(&self) -> &Callpath {
        &self.callpath
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub fn hypothesis(&self) -> &Hypothesis {
        &self.hypothesis
    }

    pub fn function(&self) -> &Function {
        self.hypothesis.function()
    }

    pub fn cost(&self) -> f64 {
        self.hypothesis.cost()
    }

    pub fn measurements(&self) -> &Arc<MeasurementSequence> {
        &self.measurements
    }

    /// Counter provenance, present only on composite runtime models.
    pub fn weighting(&self) -> Option<&CounterWeighting> {
        self.weighting.as_ref()
    }

    /// Predicts the metric at `coordinate` using parameter
    /// `parameter_index`, or `None` if the coordinate lacks it.
    pub fn predict(
        &self,
        coordinate: &Coordinate,
        parameter_index: usize,
    ) -> Option<f64> {
        coordinate
            .get(parameter_index)
            .map(|x| self.function().evaluate(x))
    }
}
