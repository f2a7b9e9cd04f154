//! Modeler configuration.
//!
//! All options deserialize with defaults for missing fields, so a JSON
//! options file only needs to name what it changes.

use extrap_entities::Basis;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::ModelerError;

/// Default minimum number of distinct configurations per fit.
pub const DEFAULT_MIN_MEASUREMENT_POINTS: usize = 5;

/// Default number of counters combined into a composite runtime model.
pub const DEFAULT_MAX_COUNTERS: usize = 3;

/// Default reference counter (total instructions).
pub const DEFAULT_REFERENCE_COUNTER: &str = "PAPI_TOT_INS";

/// Counters considered for weighting unless configured otherwise.
pub const DEFAULT_COUNTERS: [&str; 11] = [
    "PAPI_TOT_INS",
    "PAPI_LST_INS",
    "PAPI_LD_INS",
    "PAPI_SR_INS",
    "PAPI_BR_INS",
    "PAPI_DP_OPS",
    "PAPI_VEC_DP",
    "PAPI_SP_OPS",
    "PAPI_VEC_SP",
    "PAPI_TLB_IM",
    "PAPI_TLB_DM",
];

/// What a batch run does when one (call path, metric) fit fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Return the first failure (in call path order) to the caller.
    #[default]
    Abort,
    /// Record the failure in the result, log it, and continue.
    Skip,
}

/// Options shared by the single-parameter and hardware-counter modelers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelerOptions {
    /// Fit against medians instead of means.
    pub use_median: bool,
    /// Minimum distinct configurations a fit requires.
    pub min_measurement_points: usize,
    /// Coordinate component the single-parameter search models.
    pub parameter_index: usize,
    /// Include `log2(p)` factors in the hypothesis space.
    pub allow_log_terms: bool,
    /// Include two-term candidates in the hypothesis space.
    pub allow_combinations: bool,
    pub failure_policy: FailurePolicy,
    pub weighting: WeightingOptions,
}

impl Default for ModelerOptions {
    fn default() -> Self {
        Self {
            use_median: false,
            min_measurement_points: DEFAULT_MIN_MEASUREMENT_POINTS,
            parameter_index: 0,
            allow_log_terms: true,
            allow_combinations: true,
            failure_policy: FailurePolicy::Abort,
            weighting: WeightingOptions::default(),
        }
    }
}

impl ModelerOptions {
    /// The statistic fits and costs use.
    pub fn basis(&self) -> Basis {
        Basis::from_use_median(self.use_median)
    }

    /// Checks option consistency.
    ///
    /// # Errors
    ///
    /// Returns an error classified by [`ModelerError::is_invalid_options`]
    /// if `min_measurement_points` or `weighting.max_counters` is zero, or
    /// the reference counter is not part of the counter list.
    pub fn validate(&self) -> Result<(), ModelerError> {
        if self.min_measurement_points == 0 {
            return Err(ModelerError::invalid_options(
                "min_measurement_points must be at least 1",
            ));
        }
        self.weighting.validate()
    }
}

/// Options for the hardware-counter weighting step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightingOptions {
    /// Counters eligible for weighting, in tie-break order.
    pub counter_list: IndexSet<String>,
    /// Counter whose total normalizes every other counter's share.
    pub reference_counter: String,
    /// How many top-ranked counters feed the composite runtime function.
    pub max_counters: usize,
}

impl Default for WeightingOptions {
    fn default() -> Self {
        Self {
            counter_list: DEFAULT_COUNTERS.iter().map(|&c| c.to_owned()).collect(),
            reference_counter: DEFAULT_REFERENCE_COUNTER.to_owned(),
            max_counters: DEFAULT_MAX_COUNTERS,
        }
    }
}

impl WeightingOptions {
    fn validate(&self) -> Result<(), ModelerError> {
        if self.max_counters == 0 {
            return Err(ModelerError::invalid_options(
                "max_counters must be at least 1",
            ));
        }
        if !self.counter_list.contains(&self.reference_counter) {
            return Err(ModelerError::invalid_options(format!(
                "reference counter {} is not in the counter list",
                self.reference_counter
            )));
        }
        Ok(())
    }

    /// Whether `name` is a configured counter.
    pub fn is_listed(&self, name: &str) -> bool {
        self.counter_list.contains(name)
    }

    /// Position of `name` in the counter list, used to break ranking ties.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.counter_list.get_index_of(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ModelerOptions::default();
        assert_eq!(options.min_measurement_points, 5);
        assert_eq!(options.basis(), Basis::Mean);
        assert_eq!(options.weighting.max_counters, 3);
        assert_eq!(options.weighting.reference_counter, "PAPI_TOT_INS");
        assert_eq!(options.weighting.position("PAPI_LST_INS"), Some(1));
        assert!(options.validate().is_ok());
    }

    /// A partial JSON file overrides only the fields it names.
    #[test]
    fn test_partial_json_uses_defaults() {
        let options: ModelerOptions = serde_json::from_str(
            r#"{"use_median": true, "weighting": {"max_counters": 2}}"#,
        )
        .unwrap();
        assert!(options.use_median);
        assert_eq!(options.basis(), Basis::Median);
        assert_eq!(options.min_measurement_points, 5);
        assert_eq!(options.weighting.max_counters, 2);
        assert_eq!(options.weighting.counter_list.len(), 11);
    }

    #[test]
    fn test_validate_rejects_zero_minimum() {
        let options = ModelerOptions {
            min_measurement_points: 0,
            ..ModelerOptions::default()
        };
        assert!(options.validate().unwrap_err().is_invalid_options());
    }

    #[test]
    fn test_validate_rejects_unlisted_reference() {
        let mut options = ModelerOptions::default();
        options.weighting.reference_counter = "PAPI_L1_DCM".to_owned();
        let err = options.validate().unwrap_err();
        assert!(err.is_invalid_options());
        assert!(err.to_string().contains("PAPI_L1_DCM"));
    }
}
