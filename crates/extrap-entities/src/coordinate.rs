//! Points in the space of scaling-parameter values.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// An ordered tuple of parameter values, one per scaling parameter.
///
/// Comparison is componentwise and lexicographic, using `f64::total_cmp`
/// so that coordinates can key ordered maps. Two coordinates are equal iff
/// every component has the same bit pattern under that ordering.
///
/// Serialized as a bare JSON array: `[64.0]` or `[4.0, 10.0]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coordinate(Vec<f64>);

impl Coordinate {
    /// Creates a coordinate from its parameter values.
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self(values.into())
    }

    /// Creates a single-parameter coordinate.
    pub fn single(value: f64) -> Self {
        Self(vec![value])
    }

    /// Number of scaling parameters.
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    /// Returns the value of parameter `index`, if the coordinate has one.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }
}

impl From<f64> for Coordinate {
    fn from(value: f64) -> Self {
        Self::single(value)
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Coordinate {}

impl PartialOrd for Coordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(&other.0) {
            match a.total_cmp(b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl Hash for Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            value.to_bits().hash(state);
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}
