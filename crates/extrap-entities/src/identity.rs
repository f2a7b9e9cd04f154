//! Named identifiers for call paths and metrics.
//!
//! Both are opaque keys to the modeler. The call tree itself belongs to the
//! ingestion side; here a call path is just its fully qualified name
//! (e.g. `main->solve->sweep`) plus free-form tags.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Free-form string tags attached at ingestion (e.g. source file, region).
pub type Tags = BTreeMap<String, String>;

/// A location in the measured program's call tree.
///
/// Equality, ordering and hashing use the name only, so two call paths read
/// from different sources with different tags still refer to the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Callpath {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    tags: Tags,
}

impl Callpath {
    /// Creates an untagged call path.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Tags::new(),
        }
    }

    /// Returns a copy of this call path with an additional tag.
    #[must_use]
    pub fn with_tag(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Returns the fully qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ingestion tags.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl PartialEq for Callpath {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Callpath {}

impl Hash for Callpath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Callpath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Callpath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Callpath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// What a metric measures, assigned once at ingestion.
///
/// The hardware-counter modeler switches on this tag to decide which
/// sequences are weighted, which are ranked and which are modeled on their
/// own. Nothing downstream inspects metric names to make that decision.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum MetricRole {
    /// Wall-clock or CPU time of the call path.
    Runtime,
    /// A hardware performance counter such as `PAPI_TOT_INS`.
    HardwareCounter,
    /// Any other measured quantity (visits, bytes sent, ...).
    #[default]
    Generic,
}

impl fmt::Display for MetricRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricRole::Runtime => "runtime",
            MetricRole::HardwareCounter => "hardware-counter",
            MetricRole::Generic => "generic",
        })
    }
}

/// A measured quantity, e.g. `time` or `PAPI_DP_OPS`.
///
/// Like [`Callpath`], identity is the name alone; the role and tags travel
/// with the metric but never split one metric into two keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    name: String,
    #[serde(default)]
    role: MetricRole,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    tags: Tags,
}

impl Metric {
    /// Creates a metric with an explicit role.
    pub fn new(name: impl Into<String>, role: MetricRole) -> Self {
        Self {
            name: name.into(),
            role,
            tags: Tags::new(),
        }
    }

    /// Creates a runtime metric.
    pub fn runtime(name: impl Into<String>) -> Self {
        Self::new(name, MetricRole::Runtime)
    }

    /// Creates a hardware-counter metric.
    pub fn counter(name: impl Into<String>) -> Self {
        Self::new(name, MetricRole::HardwareCounter)
    }

    /// Creates a metric without a special role.
    pub fn generic(name: impl Into<String>) -> Self {
        Self::new(name, MetricRole::Generic)
    }

    /// Returns a copy of this metric with an additional tag.
    #[must_use]
    pub fn with_tag(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> MetricRole {
        self.role
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl PartialEq for Metric {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Metric {}

impl Hash for Metric {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Metric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Metric {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
