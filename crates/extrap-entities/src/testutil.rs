//! Shared proptest strategies for entity tests.

use proptest::prelude::*;

/// Strategy for generating arbitrary identifier-like names.
pub fn arb_name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,19}"
}

/// Strategy for strictly positive parameter values spanning a few decades.
pub fn arb_parameter_value() -> impl Strategy<Value = f64> {
    (1u32..=4096).prop_map(f64::from)
}
