//! Aggregated measurements and the sequences models are fitted against.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Callpath, Coordinate, Metric};

/// Which summary statistic a fit uses as its target value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Basis {
    #[default]
    Mean,
    Median,
}

impl Basis {
    /// Maps the `use_median` flag onto a basis.
    pub fn from_use_median(use_median: bool) -> Self {
        if use_median {
            Basis::Median
        } else {
            Basis::Mean
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Basis::Mean => "mean",
            Basis::Median => "median",
        })
    }
}

/// Summary statistics of all repetitions measured at one coordinate for one
/// (call path, metric) pair.
///
/// `std` is the population standard deviation of the repetitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub coordinate: Coordinate,
    pub mean: f64,
    pub median: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub std: f64,
    /// Number of raw samples the statistics were computed from.
    pub repetitions: usize,
}

impl Measurement {
    /// Returns the statistic selected by `basis`.
    pub fn value(&self, basis: Basis) -> f64 {
        match basis {
            Basis::Mean => self.mean,
            Basis::Median => self.median,
        }
    }
}

/// All measurements of one (call path, metric) pair, sorted by coordinate.
///
/// Built once by the aggregator and shared read-only (through `Arc`) by
/// every model fitted against it. Deserialization goes through
/// [`MeasurementSequence::new`], so stored sequences need not be sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "UnsortedSequence")]
pub struct MeasurementSequence {
    callpath: Callpath,
    metric: Metric,
    measurements: Vec<Measurement>,
}

/// Wire form of [`MeasurementSequence`] before sorting.
#[derive(Deserialize)]
struct UnsortedSequence {
    callpath: Callpath,
    metric: Metric,
    measurements: Vec<Measurement>,
}

impl From<UnsortedSequence> for MeasurementSequence {
    fn from(raw: UnsortedSequence) -> Self {
        Self::new(raw.callpath, raw.metric, raw.measurements)
    }
}

impl MeasurementSequence {
    /// Creates a sequence, sorting the measurements by coordinate.
    ///
    /// Callers are expected to supply at most one measurement per
    /// coordinate; the aggregator guarantees this.
    pub fn new(
        callpath: Callpath,
        metric: Metric,
        mut measurements: Vec<Measurement>,
    ) -> Self {
        measurements.sort_by(|a, b| a.coordinate.cmp(&b.coordinate));
        Self {
            callpath,
            metric,
            measurements,
        }
    }

    pub fn callpath(&self) -> &Callpath {
        &self.callpath
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Returns the measurement taken at `coordinate`, if any.
    pub fn get(&self, coordinate: &Coordinate) -> Option<&Measurement> {
        self.measurements
            .binary_search_by(|m| m.coordinate.cmp(coordinate))
            .ok()
            .map(|idx| &self.measurements[idx])
    }

    /// Counts distinct values of parameter `index` across the sequence.
    ///
    /// Coordinates lacking that parameter are not counted.
    pub fn distinct_parameter_values(&self, index: usize) -> usize {
        let mut values: Vec<f64> = self
            .measurements
            .iter()
            .filter_map(|m| m.coordinate.get(index))
            .collect();
        values.sort_by(f64::total_cmp);
        values.dedup_by(|a, b| a.total_cmp(b).is_eq());
        values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(x: f64, mean: f64) -> Measurement {
        Measurement {
            coordinate: Coordinate::single(x),
            mean,
            median: mean,
            minimum: mean,
            maximum: mean,
            std: 0.0,
            repetitions: 1,
        }
    }

    /// Sequences are always stored in ascending coordinate order.
    #[test]
    fn test_sequence_sorted_on_construction() {
        let seq = MeasurementSequence::new(
            Callpath::new("main"),
            Metric::runtime("time"),
            vec![measurement(16.0, 3.0), measurement(4.0, 1.0)],
        );
        let xs: Vec<f64> = seq
            .measurements()
            .iter()
            .map(|m| m.coordinate.get(0).unwrap())
            .collect();
        assert_eq!(xs, vec![4.0, 16.0]);
        assert_eq!(seq.get(&Coordinate::single(16.0)).unwrap().mean, 3.0);
        assert!(seq.get(&Coordinate::single(8.0)).is_none());
    }

    /// Deserialized sequences are re-sorted, so lookups by coordinate work
    /// on hand-written or reordered input.
    #[test]
    fn test_deserialize_sorts_measurements() {
        let seq = MeasurementSequence::new(
            Callpath::new("main"),
            Metric::runtime("time"),
            vec![
                measurement(4.0, 1.0),
                measurement(8.0, 2.0),
                measurement(16.0, 3.0),
            ],
        );
        let mut json = serde_json::to_value(&seq).unwrap();
        json["measurements"].as_array_mut().unwrap().reverse();

        let restored: MeasurementSequence =
            serde_json::from_value(json).unwrap();
        assert_eq!(restored, seq);
        assert_eq!(restored.get(&Coordinate::single(4.0)).unwrap().mean, 1.0);
        assert_eq!(restored.get(&Coordinate::single(16.0)).unwrap().mean, 3.0);
    }

    /// Distinct counting projects multi-parameter coordinates.
    #[test]
    fn test_distinct_parameter_values() {
        let mut points = Vec::new();
        for x in [4.0, 8.0] {
            for y in [10.0, 20.0, 30.0] {
                let mut m = measurement(x, 1.0);
                m.coordinate = Coordinate::new([x, y]);
                points.push(m);
            }
        }
        let seq = MeasurementSequence::new(
            Callpath::new("main"),
            Metric::runtime("time"),
            points,
        );
        assert_eq!(seq.distinct_parameter_values(0), 2);
        assert_eq!(seq.distinct_parameter_values(1), 3);
        assert_eq!(seq.distinct_parameter_values(2), 0);
    }

    #[test]
    fn test_basis_value() {
        let mut m = measurement(4.0, 2.0);
        m.median = 5.0;
        assert_eq!(m.value(Basis::Mean), 2.0);
        assert_eq!(m.value(Basis::Median), 5.0);
        assert_eq!(Basis::from_use_median(true), Basis::Median);
    }
}
