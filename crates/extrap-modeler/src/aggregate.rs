//! Measurement aggregation: raw repetitions to summary statistics.
//!
//! Ingestion hands the modeler one entry per (call path, metric,
//! coordinate) with the raw repetitions measured there. Aggregation reduces
//! each entry to a [`Measurement`] and groups the results into one sorted
//! [`MeasurementSequence`] per (call path, metric).
//!
//! An entry whose `samples` is `None` means the source reported the metric
//! absent at that coordinate. Such entries never become measurements (no
//! zero is fabricated); they are listed in [`MeasurementSet::missing`] and
//! the caller decides whether to continue with what remains.

use std::collections::BTreeMap;
use std::sync::Arc;

use extrap_entities::{
    Callpath, Coordinate, Measurement, MeasurementSequence, Metric,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::error::{ModelerError, ModelerErrorKind};

/// Raw repetitions measured for one (call path, metric, coordinate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub callpath: Callpath,
    pub metric: Metric,
    pub coordinate: Coordinate,
    /// Repetition values; `None` when the source lacks this metric here.
    pub samples: Option<Vec<f64>>,
}

/// The modeler's input: every raw sample entry of an experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    pub entries: Vec<SampleEntry>,
}

impl SampleSet {
    /// Adds the repetitions measured at one coordinate.
    pub fn push(
        &mut self,
        callpath: Callpath,
        metric: Metric,
        coordinate: Coordinate,
        samples: Vec<f64>,
    ) {
        self.entries.push(SampleEntry {
            callpath,
            metric,
            coordinate,
            samples: Some(samples),
        });
    }

    /// Records that the source had no value for `metric` at `coordinate`.
    pub fn push_missing(
        &mut self,
        callpath: Callpath,
        metric: Metric,
        coordinate: Coordinate,
    ) {
        self.entries.push(SampleEntry {
            callpath,
            metric,
            coordinate,
            samples: None,
        });
    }
}

/// A (call path, metric, coordinate) the source reported as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingMeasurement {
    pub callpath: Callpath,
    pub metric: Metric,
    pub coordinate: Coordinate,
}

/// Key of a measurement sequence.
pub type SequenceKey = (Callpath, Metric);

/// Aggregated measurements grouped into per-(call path, metric) sequences.
#[derive(Debug, Clone, Default)]
pub struct MeasurementSet {
    sequences: BTreeMap<SequenceKey, Arc<MeasurementSequence>>,
    missing: Vec<MissingMeasurement>,
}

impl MeasurementSet {
    /// Builds a set from already aggregated sequences.
    pub fn from_sequences(
        sequences: impl IntoIterator<Item = MeasurementSequence>,
    ) -> Self {
        let sequences = sequences
            .into_iter()
            .map(|seq| {
                let key = (seq.callpath().clone(), seq.metric().clone());
                (key, Arc::new(seq))
            })
            .collect();
        Self {
            sequences,
            missing: Vec::new(),
        }
    }

    /// Looks up the sequence for one (call path, metric).
    pub fn get(
        &self,
        callpath: &Callpath,
        metric: &Metric,
    ) -> Option<&Arc<MeasurementSequence>> {
        self.sequences.get(&(callpath.clone(), metric.clone()))
    }

    /// All sequences in (call path, metric) order.
    pub fn sequences(&self) -> impl Iterator<Item = &Arc<MeasurementSequence>> {
        self.sequences.values()
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Entries the source reported absent.
    pub fn missing(&self) -> &[MissingMeasurement] {
        &self.missing
    }

    /// Groups sequences by call path, preserving metric order within each.
    pub fn by_callpath(
        &self,
    ) -> BTreeMap<&Callpath, Vec<&Arc<MeasurementSequence>>> {
        let mut grouped: BTreeMap<&Callpath, Vec<_>> = BTreeMap::new();
        for ((callpath, _), seq) in &self.sequences {
            grouped.entry(callpath).or_default().push(seq);
        }
        grouped
    }

    /// Fails if the source reported any metric absent.
    ///
    /// # Errors
    ///
    /// Returns the first missing entry, classified by
    /// [`ModelerError::is_missing_metric_in_source`].
    pub fn require_complete(&self) -> Result<(), ModelerError> {
        match self.missing.first() {
            None => Ok(()),
            Some(missing) => Err(ModelerError::new(
                ModelerErrorKind::MissingMetricInSource {
                    callpath: missing.callpath.clone(),
                    metric: missing.metric.clone(),
                    coordinate: missing.coordinate.clone(),
                },
            )),
        }
    }
}

/// Reduces raw repetitions to summary statistics.
///
/// Returns `None` for an empty slice. The median of an even count is the
/// mean of the two middle values; `std` is the population standard
/// deviation.
pub fn summarize(coordinate: Coordinate, samples: &[f64]) -> Option<Measurement> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    #[expect(
        clippy::cast_precision_loss,
        reason = "repetition counts are far below 2^52"
    )]
    let count = n as f64;
    let mean = sorted.iter().sum::<f64>() / count;
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        f64::midpoint(sorted[n / 2 - 1], sorted[n / 2])
    };
    let variance =
        sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    Some(Measurement {
        coordinate,
        mean,
        median,
        minimum: sorted[0],
        maximum: sorted[n - 1],
        std: variance.sqrt(),
        repetitions: n,
    })
}

/// Aggregates a sample set into measurement sequences.
///
/// Entries sharing a (call path, metric, coordinate) key have their
/// repetitions concatenated before reduction, so each key yields exactly
/// one measurement.
///
/// # Errors
///
/// Returns [`ModelerError`] if:
/// - An entry has an empty sample list ([`ModelerError::is_insufficient_data`])
/// - A sample is NaN or infinite ([`ModelerError::is_non_finite_sample`])
pub fn aggregate(samples: &SampleSet) -> Result<MeasurementSet, ModelerError> {
    let _span = debug_span!("aggregate", entries = samples.entries.len())
        .entered();

    let mut grouped: BTreeMap<SequenceKey, BTreeMap<Coordinate, Vec<f64>>> =
        BTreeMap::new();
    let mut missing = Vec::new();

    for entry in &samples.entries {
        let Some(values) = &entry.samples else {
            missing.push(MissingMeasurement {
                callpath: entry.callpath.clone(),
                metric: entry.metric.clone(),
                coordinate: entry.coordinate.clone(),
            });
            continue;
        };
        // Checked per entry, before a duplicate key can fill the gap.
        if values.is_empty() {
            return Err(ModelerError::new(ModelerErrorKind::EmptySamples {
                callpath: entry.callpath.clone(),
                metric: entry.metric.clone(),
                coordinate: entry.coordinate.clone(),
            }));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ModelerError::new(ModelerErrorKind::NonFiniteSample {
                callpath: entry.callpath.clone(),
                metric: entry.metric.clone(),
                coordinate: entry.coordinate.clone(),
            }));
        }
        grouped
            .entry((entry.callpath.clone(), entry.metric.clone()))
            .or_default()
            .entry(entry.coordinate.clone())
            .or_default()
            .extend_from_slice(values);
    }

    let mut sequences = BTreeMap::new();
    for ((callpath, metric), by_coordinate) in grouped {
        let mut measurements = Vec::with_capacity(by_coordinate.len());
        for (coordinate, values) in by_coordinate {
            let Some(measurement) = summarize(coordinate.clone(), &values)
            else {
                return Err(ModelerError::new(ModelerErrorKind::EmptySamples {
                    callpath,
                    metric,
                    coordinate,
                }));
            };
            measurements.push(measurement);
        }
        let seq =
            MeasurementSequence::new(callpath.clone(), metric.clone(), measurements);
        sequences.insert((callpath, metric), Arc::new(seq));
    }

    debug!(
        sequences = sequences.len(),
        missing = missing.len(),
        "aggregation complete"
    );
    Ok(MeasurementSet { sequences, missing })
}
