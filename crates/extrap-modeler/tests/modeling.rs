//! Integration tests for the model search through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};

use extrap_entities::{
    Basis, Callpath, Coordinate, Exponent, Function, MeasurementSequence,
    Metric, MetricRole, TermShape,
};
use extrap_modeler::{
    FailurePolicy, HardwareCounterModeler, MeasurementSet, ModelerOptions,
    ModelingContext, NoProgress, SampleSet, SingleParameterModeler, aggregate,
};
use proptest::prelude::*;

const XS: [f64; 5] = [4.0, 8.0, 16.0, 32.0, 64.0];

/// Builds a one-metric sample set with one repetition per parameter value.
fn samples(
    callpath: &str,
    metric: Metric,
    xs: &[f64],
    ys: &[f64],
) -> SampleSet {
    let mut set = SampleSet::default();
    push(&mut set, callpath, &metric, xs, ys);
    set
}

fn push(
    set: &mut SampleSet,
    callpath: &str,
    metric: &Metric,
    xs: &[f64],
    ys: &[f64],
) {
    for (&x, &y) in xs.iter().zip(ys) {
        set.push(
            Callpath::new(callpath),
            metric.clone(),
            Coordinate::single(x),
            vec![y],
        );
    }
}

fn single() -> SingleParameterModeler {
    SingleParameterModeler::new(ModelerOptions::default()).unwrap()
}

fn only_sequence(set: &MeasurementSet) -> &MeasurementSequence {
    set.sequences().next().unwrap()
}

/// Term shapes contributing more than a millionth of the value at `x`.
///
/// Exact data is reproduced by several candidates up to rounding, so the
/// selected one may carry extra terms with negligible coefficients.
fn dominant_shapes(function: &Function, x: f64) -> Vec<TermShape> {
    let scale = function.evaluate(x).abs();
    function
        .terms
        .iter()
        .filter(|term| term.evaluate(x).abs() > 1e-6 * scale)
        .map(|term| term.shape)
        .collect()
}

/// Equal measurements select the constant function with exactly zero cost.
#[test]
fn constant_fit_is_exact() {
    let set =
        aggregate(&samples("main", Metric::runtime("time"), &XS, &[42.5; 5]))
            .unwrap();
    let best = single().find_best_hypothesis(only_sequence(&set)).unwrap();
    assert_eq!(best.function().term_count(), 0);
    assert_eq!(best.function().constant, 42.5);
    assert_eq!(best.cost(), 0.0);
}

/// Values 10..50 at p = 4..64 are exactly `-10 + 10 * log2(p)`.
#[test]
fn logarithmic_scenario_selects_log_term() {
    let ys = [10.0, 20.0, 30.0, 40.0, 50.0];
    let set = aggregate(&samples("main", Metric::runtime("time"), &XS, &ys))
        .unwrap();
    let best = single().find_best_hypothesis(only_sequence(&set)).unwrap();
    let function = best.function();
    assert!(best.cost() < 1e-6);
    assert_eq!(
        dominant_shapes(function, 64.0),
        [TermShape::logarithm(Exponent::ONE)]
    );
    for (&x, &y) in XS.iter().zip(&ys) {
        assert!((function.evaluate(x) - y).abs() < 1e-6);
    }
}

/// Proportional data selects a lone `p^1` term.
#[test]
fn linear_scenario_selects_power_one() {
    let ys: Vec<f64> = XS.iter().map(|x| 2.5 * x).collect();
    let set = aggregate(&samples("main", Metric::runtime("time"), &XS, &ys))
        .unwrap();
    let best = single().find_best_hypothesis(only_sequence(&set)).unwrap();
    let function = best.function();
    assert!(best.cost() < 1e-6);
    assert_eq!(
        dominant_shapes(function, 64.0),
        [TermShape::power(Exponent::ONE)]
    );
    for &x in &XS {
        assert!((function.evaluate(x) - 2.5 * x).abs() < 1e-6);
    }
}

/// A curvature far below the linear trend still has to pay for itself:
/// the selected cost is the smallest of all candidates, with no slack.
#[test]
fn near_tie_selects_strictly_cheapest() {
    let xs = [2.0, 4.0, 8.0, 16.0, 32.0, 64.0];
    let ys: Vec<f64> = xs.iter().map(|&x| x + 1e-9 * x * x).collect();
    let set = aggregate(&samples("main", Metric::runtime("time"), &xs, &ys))
        .unwrap();
    let seq = only_sequence(&set);
    let modeler = single();

    let cheapest = modeler
        .evaluate_candidates(seq)
        .unwrap()
        .iter()
        .map(|candidate| candidate.hypothesis.cost())
        .fold(f64::INFINITY, f64::min);
    let best = modeler.find_best_hypothesis(seq).unwrap();
    assert_eq!(best.cost().to_bits(), cheapest.to_bits());
}

#[test]
fn four_configurations_are_insufficient() {
    let set = aggregate(&samples(
        "main",
        Metric::runtime("time"),
        &XS[..4],
        &[1.0, 2.0, 3.0, 4.0],
    ))
    .unwrap();
    let ctx = ModelingContext::new();
    let err = single().model(&set, &ctx, &NoProgress).unwrap_err();
    assert!(err.is_insufficient_data());
    assert_eq!(err.callpath().unwrap().name(), "main");
}

/// Repetitions with an outlier model differently under mean and median.
#[test]
fn median_basis_ignores_outlier() {
    let mut set = SampleSet::default();
    for x in XS {
        set.push(
            Callpath::new("main"),
            Metric::runtime("time"),
            Coordinate::single(x),
            vec![3.0, 3.0, 30.0],
        );
    }
    let measurements = aggregate(&set).unwrap();
    let seq = only_sequence(&measurements);

    let median = SingleParameterModeler::new(ModelerOptions {
        use_median: true,
        ..ModelerOptions::default()
    })
    .unwrap()
    .find_best_hypothesis(seq)
    .unwrap();
    assert_eq!(median.function().constant, 3.0);
    assert_eq!(median.basis(), Basis::Median);

    let mean = single().find_best_hypothesis(seq).unwrap();
    assert_eq!(mean.function().constant, 12.0);
}

/// Identical data under different call paths and metric names yields
/// identical functions and costs.
#[test]
fn callpath_independent_determinism() {
    let ys = [3.0, 5.5, 9.0, 17.0, 31.0];
    let mut set = SampleSet::default();
    push(&mut set, "a", &Metric::generic("bytes"), &XS, &ys);
    push(&mut set, "b", &Metric::generic("time"), &XS, &ys);
    let measurements = aggregate(&set).unwrap();

    let ctx = ModelingContext::new();
    let models = single().model(&measurements, &ctx, &NoProgress).unwrap();
    let a = models
        .get(&Callpath::new("a"), &Metric::generic("bytes"))
        .unwrap();
    let b = models
        .get(&Callpath::new("b"), &Metric::generic("time"))
        .unwrap();
    assert_eq!(a.function(), b.function());
    assert_eq!(a.cost().to_bits(), b.cost().to_bits());
    assert_ne!(a.id(), b.id());
}

/// Under `Skip` a failing fit is recorded and the others still model.
#[test]
fn skip_policy_records_failures() {
    let mut set = SampleSet::default();
    let time = Metric::runtime("time");
    push(&mut set, "good", &time, &XS, &[1.0, 2.0, 3.0, 4.0, 5.0]);
    push(&mut set, "short", &time, &XS[..3], &[1.0, 2.0, 3.0]);
    let measurements = aggregate(&set).unwrap();
    let options = ModelerOptions {
        failure_policy: FailurePolicy::Skip,
        ..ModelerOptions::default()
    };

    let models = SingleParameterModeler::new(options)
        .unwrap()
        .model(&measurements, &ModelingContext::new(), &NoProgress)
        .unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models.skipped().len(), 1);
    assert_eq!(models.skipped()[0].callpath.name(), "short");
    assert!(models.skipped()[0].reason.contains("insufficient data"));
}

/// Cancelling from the progress callback abandons the run.
#[test]
fn cancellation_between_callpaths() {
    let mut set = SampleSet::default();
    for cp in ["a", "b", "c", "d"] {
        push(&mut set, cp, &Metric::runtime("time"), &XS, &[1.0; 5]);
    }
    let measurements = aggregate(&set).unwrap();
    let ctx = ModelingContext::new();
    let completed = AtomicUsize::new(0);
    let progress = || {
        completed.fetch_add(1, Ordering::Relaxed);
        ctx.cancel();
    };

    let err = single().model(&measurements, &ctx, &progress).unwrap_err();
    assert!(err.is_cancelled());
    assert!(completed.load(Ordering::Relaxed) >= 1);
}

/// Progress fires once per call path, not per metric.
#[test]
fn progress_once_per_callpath() {
    let mut set = SampleSet::default();
    for cp in ["a", "b", "c"] {
        for metric in ["bytes", "flops"] {
            let ys = [1.0, 2.0, 3.0, 4.0, 5.0];
            push(&mut set, cp, &Metric::generic(metric), &XS, &ys);
        }
    }
    let measurements = aggregate(&set).unwrap();
    let completed = AtomicUsize::new(0);
    let progress = || {
        completed.fetch_add(1, Ordering::Relaxed);
    };
    let models = single()
        .model(&measurements, &ModelingContext::new(), &progress)
        .unwrap();
    assert_eq!(models.len(), 6);
    assert_eq!(completed.load(Ordering::Relaxed), 3);
}

const COUNTER_XS: [f64; 8] = [2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0];

fn push_fn(set: &mut SampleSet, metric: Metric, f: impl Fn(f64) -> f64) {
    let ys: Vec<f64> = COUNTER_XS.iter().map(|&x| f(x)).collect();
    push(set, "main", &metric, &COUNTER_XS, &ys);
}

/// Runtime `1 + 0.1p + 0.001p^2` with counters growing as `p` and `p^2`,
/// plus an unlisted cubic counter.
fn counter_set(with_reference: bool) -> MeasurementSet {
    let mut set = SampleSet::default();
    if with_reference {
        push_fn(&mut set, Metric::counter("PAPI_TOT_INS"), |x| 500.0 * x * x);
    }
    push_fn(&mut set, Metric::counter("PAPI_DP_OPS"), |x| 100.0 * x * x);
    push_fn(&mut set, Metric::counter("PAPI_BR_INS"), |x| 10.0 * x);
    push_fn(&mut set, Metric::counter("PAPI_L2_TCM"), |x| 900.0 * x.powi(3));
    push_fn(&mut set, Metric::runtime("time"), |x| {
        1.0 + 0.1 * x + 0.001 * x * x
    });
    aggregate(&set).unwrap()
}

/// Without the reference counter no composite runtime model is emitted.
#[test]
fn missing_reference_counter_fails_weighting() {
    let measurements = counter_set(false);
    let modeler =
        HardwareCounterModeler::new(ModelerOptions::default()).unwrap();
    let err = modeler
        .model(&measurements, &ModelingContext::new(), &NoProgress)
        .unwrap_err();
    assert!(err.is_missing_weight_mapping());
    assert_eq!(err.metric().unwrap().name(), "time");

    let skip = HardwareCounterModeler::new(ModelerOptions {
        failure_policy: FailurePolicy::Skip,
        ..ModelerOptions::default()
    })
    .unwrap();
    let models = skip
        .model(&measurements, &ModelingContext::new(), &NoProgress)
        .unwrap();
    assert!(
        models
            .get(&Callpath::new("main"), &Metric::runtime("time"))
            .is_none()
    );
    assert_eq!(models.len(), 3);
    assert_eq!(models.skipped().len(), 1);
}

/// Composite terms only ever come from listed counters.
#[test]
fn composite_terms_come_from_listed_counters() {
    let measurements = counter_set(true);
    let options = ModelerOptions::default();
    let modeler = HardwareCounterModeler::new(options.clone()).unwrap();
    let models = modeler
        .model(&measurements, &ModelingContext::new(), &NoProgress)
        .unwrap();

    let time = models
        .get(&Callpath::new("main"), &Metric::runtime("time"))
        .unwrap();
    let weighting = time.weighting().unwrap();
    assert_eq!(weighting.term_origins.len(), time.function().term_count());
    let retained = weighting.counters.iter().map(|c| &c.metric);
    for origin in weighting.term_origins.iter().chain(retained) {
        assert_eq!(origin.role(), MetricRole::HardwareCounter);
        assert!(options.weighting.is_listed(origin.name()));
        assert_ne!(origin.name(), "PAPI_L2_TCM");
    }
    assert!(time.cost() < 1e-9);

    // The unlisted counter is still modeled on its own.
    assert!(
        models
            .get(&Callpath::new("main"), &Metric::counter("PAPI_L2_TCM"))
            .is_some()
    );
}

fn arb_values() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(1.0..1000.0f64, 6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// The selected hypothesis costs no more than any enumerable candidate.
    #[test]
    fn selection_is_exhaustively_optimal(ys in arb_values()) {
        let xs = [2.0, 4.0, 8.0, 16.0, 32.0, 64.0];
        let set = aggregate(&samples("main", Metric::runtime("time"), &xs, &ys))
            .unwrap();
        let seq = only_sequence(&set);
        let modeler = single();
        let best = modeler.find_best_hypothesis(seq).unwrap();
        for candidate in modeler.evaluate_candidates(seq).unwrap() {
            prop_assert!(best.cost() <= candidate.hypothesis.cost());
        }
    }

    /// Refitting the same shape to the same data is bit-identical.
    #[test]
    fn refit_is_idempotent(ys in arb_values(), index in 0usize..100) {
        let xs = [2.0, 4.0, 8.0, 16.0, 32.0, 64.0];
        let set = aggregate(&samples("main", Metric::runtime("time"), &xs, &ys))
            .unwrap();
        let seq = only_sequence(&set);
        let modeler = single();
        let shapes = modeler.hypothesis_space().shapes();
        let shape = &shapes[index * 31 % shapes.len()];
        let first = modeler.create_hypothesis(shape, seq);
        let second = modeler.create_hypothesis(shape, seq);
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert_eq!(a.summary(), b.summary()),
            _ => prop_assert!(false, "refit changed outcome"),
        }
    }
}
