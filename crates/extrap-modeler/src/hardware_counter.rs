//! Runtime models composed from hardware-counter models.
//!
//! The listed hardware counters are ranked once by their share of the
//! reference counter (total instructions by default), summed over every
//! call path. Per call path, every metric except runtime is then modeled
//! independently, and the runtime model is built from the term shapes of
//! the top-ranked counters' functions, refitted against the measured
//! runtime. The composite always carries a constant offset, so it needs
//! more configurations than any single counter fit: one per copied term
//! plus one.
//!
//! ## Failure modes
//!
//! The weighting step never substitutes a default: a missing reference
//! counter, a counter outside the configured list, or a retained counter
//! without a fitted function fails the runtime model with an error
//! classified by [`ModelerError::is_missing_weight_mapping`]. The
//! independent counter models of the same call path are unaffected.

use std::collections::BTreeMap;
use std::sync::Arc;

use extrap_entities::{
    Callpath, CompoundTerm, Coordinate, CounterShare, CounterWeighting,
    FunctionShape, Hypothesis, MeasurementSequence, Metric, MetricRole,
};
use tracing::{debug, instrument};

use crate::aggregate::MeasurementSet;
use crate::assemble::{Fitted, ModelSet, Outcome, model_callpaths};
use crate::context::ModelingContext;
use crate::error::ModelerError;
use crate::fit::fit_shape;
use crate::options::{ModelerOptions, WeightingOptions};
use crate::progress::Progress;
use crate::single_parameter::SingleParameterModeler;

/// Models call paths that carry a runtime metric and hardware counters.
#[derive(Debug, Clone)]
pub struct HardwareCounterModeler {
    single: SingleParameterModeler,
}

impl HardwareCounterModeler {
    /// Validates `options` and prepares the underlying single-parameter
    /// search.
    ///
    /// # Errors
    ///
    /// Returns an error classified by [`ModelerError::is_invalid_options`]
    /// if the options are inconsistent.
    pub fn new(options: ModelerOptions) -> Result<Self, ModelerError> {
        Ok(Self {
            single: SingleParameterModeler::new(options)?,
        })
    }

    pub fn options(&self) -> &ModelerOptions {
        self.single.options()
    }

    fn weighting(&self) -> &WeightingOptions {
        &self.single.options().weighting
    }

    /// Models every call path of `measurements`.
    ///
    /// Runtime metrics get composite models; every other metric gets an
    /// independent single-parameter model. Call paths without a runtime
    /// metric are modeled entirely independently. The counters are ranked
    /// once, over the whole measurement set, before any call path is
    /// fitted; every composite uses that one ranking.
    ///
    /// # Errors
    ///
    /// Returns the first fit or weighting error in (call path, metric)
    /// order under `Abort`, or an error classified by
    /// [`ModelerError::is_cancelled`] if `ctx` was cancelled.
    pub fn model(
        &self,
        measurements: &MeasurementSet,
        ctx: &ModelingContext,
        progress: &dyn Progress,
    ) -> Result<ModelSet, ModelerError> {
        // Rank failures only matter to call paths that have a runtime.
        let ranking = self
            .rank_counters(measurements)
            .map_err(|err| err.summary());
        model_callpaths(
            measurements,
            self.options().failure_policy,
            ctx,
            progress,
            |callpath, sequences| {
                self.fit_callpath(callpath, sequences, &ranking)
            },
        )
    }

    /// Fits one call path: counters first, then the composite runtime.
    #[instrument(level = "debug", skip(self, sequences, ranking))]
    fn fit_callpath(
        &self,
        callpath: &Callpath,
        sequences: &[&Arc<MeasurementSequence>],
        ranking: &Result<Vec<CounterShare>, String>,
    ) -> Vec<Outcome> {
        let (runtimes, others): (Vec<_>, Vec<_>) = sequences
            .iter()
            .copied()
            .partition(|seq| seq.metric().role() == MetricRole::Runtime);

        let independent: Vec<Outcome> =
            others.iter().map(|seq| self.single.fit_one(seq)).collect();
        if runtimes.is_empty() {
            return independent;
        }

        let fitted: BTreeMap<&Metric, &Hypothesis> = independent
            .iter()
            .filter_map(|((_, metric), result)| {
                result.as_ref().ok().map(|f| (metric, &f.hypothesis))
            })
            .collect();

        let mut outcomes: Vec<Outcome> = runtimes
            .iter()
            .map(|&runtime| {
                let key = (callpath.clone(), runtime.metric().clone());
                let result = self
                    .retained_counters(runtime, &others, ranking)
                    .and_then(|shares| self.compose(runtime, shares, &fitted))
                    .map(|(hypothesis, weighting)| Fitted {
                        hypothesis,
                        measurements: Arc::clone(runtime),
                        weighting: Some(weighting),
                    });
                (key, result)
            })
            .collect();
        outcomes.extend(independent);
        outcomes
    }

    /// The global ranking, provided this call path measured the reference
    /// counter.
    fn retained_counters(
        &self,
        runtime: &MeasurementSequence,
        counters: &[&Arc<MeasurementSequence>],
        ranking: &Result<Vec<CounterShare>, String>,
    ) -> Result<Vec<CounterShare>, ModelerError> {
        let missing = |reason: String| {
            ModelerError::missing_weight_mapping(
                runtime.callpath(),
                runtime.metric(),
                reason,
            )
        };
        let shares =
            ranking.as_ref().map_err(|reason| missing(reason.clone()))?;
        let reference = &self.weighting().reference_counter;
        if !counters.iter().any(|seq| seq.metric().name() == reference) {
            return Err(missing(format!(
                "reference counter {reference} was not measured for this \
                 call path"
            )));
        }
        Ok(shares.clone())
    }

    /// Ranks the listed hardware counters by their share of the reference
    /// counter and keeps the top `max_counters`.
    ///
    /// Each counter's values are first summed per coordinate across every
    /// call path of `measurements`. A counter's share is the sum of those
    /// totals divided by the sum of the reference counter's totals, both
    /// over the coordinates where both were measured. Only metrics with the
    /// hardware-counter role that appear in the counter list are ranked; the
    /// reference counter itself is not. Ties keep counter-list order.
    ///
    /// # Errors
    ///
    /// Returns an error classified by
    /// [`ModelerError::is_missing_weight_mapping`] if the reference counter
    /// was never measured, its total over the shared coordinates is not
    /// positive, or no counter is left to rank.
    pub fn rank_counters(
        &self,
        measurements: &MeasurementSet,
    ) -> Result<Vec<CounterShare>, ModelerError> {
        let weighting = self.weighting();
        let basis = self.options().basis();

        let mut totals: BTreeMap<&Metric, BTreeMap<&Coordinate, f64>> =
            BTreeMap::new();
        for sequence in measurements.sequences() {
            let metric = sequence.metric();
            if metric.role() != MetricRole::HardwareCounter
                || !weighting.is_listed(metric.name())
            {
                continue;
            }
            let per_coordinate = totals.entry(metric).or_default();
            for measurement in sequence.measurements() {
                let total =
                    per_coordinate.entry(&measurement.coordinate).or_default();
                *total += measurement.value(basis);
            }
        }

        let reference_metric = totals
            .keys()
            .copied()
            .find(|metric| metric.name() == weighting.reference_counter);
        let Some(reference) =
            reference_metric.and_then(|metric| totals.remove(metric))
        else {
            return Err(ModelerError::unrankable_counters(format!(
                "reference counter {} was not measured",
                weighting.reference_counter
            )));
        };

        let mut ranked = Vec::with_capacity(totals.len());
        for (metric, per_coordinate) in totals {
            let (total, reference_total) = per_coordinate
                .iter()
                .filter_map(|(coordinate, value)| {
                    reference.get(coordinate).map(|r| (value, r))
                })
                .fold((0.0, 0.0), |(total, reference_total), (value, r)| {
                    (total + value, reference_total + r)
                });
            if !(reference_total.is_finite() && reference_total > 0.0) {
                return Err(ModelerError::unrankable_counters(format!(
                    "reference counter {} has total {reference_total} over \
                     the configurations shared with {metric}",
                    weighting.reference_counter
                )));
            }
            ranked.push(CounterShare {
                metric: metric.clone(),
                share: total / reference_total,
            });
        }
        if ranked.is_empty() {
            return Err(ModelerError::unrankable_counters(
                "no listed hardware counter was measured",
            ));
        }

        ranked.sort_by(|a, b| {
            b.share.total_cmp(&a.share).then_with(|| {
                weighting
                    .position(a.metric.name())
                    .cmp(&weighting.position(b.metric.name()))
            })
        });
        ranked.truncate(weighting.max_counters);
        debug!(
            counters = ?ranked.iter().map(|c| c.metric.name()).collect::<Vec<_>>(),
            "ranked counters"
        );
        Ok(ranked)
    }

    /// Builds the composite runtime hypothesis from the retained counters'
    /// fitted functions.
    ///
    /// Terms are copied by value in counter order; a shape contributed by
    /// more than one counter is kept once, attributed to the first. The
    /// composite (constant plus copied shapes) is then refitted against
    /// `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelerError`] if:
    /// - A retained counter is outside the counter list or has no entry in
    ///   `fitted` ([`ModelerError::is_missing_weight_mapping`])
    /// - `runtime` has too few configurations
    ///   ([`ModelerError::is_insufficient_data`])
    /// - The composite has more coefficients than `runtime` has
    ///   configurations, or cannot be fitted to the runtime data
    ///   ([`ModelerError::is_degenerate_fit`])
    pub fn compose(
        &self,
        runtime: &MeasurementSequence,
        counters: Vec<CounterShare>,
        fitted: &BTreeMap<&Metric, &Hypothesis>,
    ) -> Result<(Hypothesis, CounterWeighting), ModelerError> {
        let mut terms: Vec<CompoundTerm> = Vec::new();
        let mut term_origins = Vec::new();
        for counter in &counters {
            if !self.weighting().is_listed(counter.metric.name()) {
                return Err(ModelerError::missing_weight_mapping(
                    runtime.callpath(),
                    runtime.metric(),
                    format!("{} is not a configured counter", counter.metric),
                ));
            }
            let Some(hypothesis) = fitted.get(&counter.metric) else {
                return Err(ModelerError::missing_weight_mapping(
                    runtime.callpath(),
                    runtime.metric(),
                    format!("counter {} has no fitted function", counter.metric),
                ));
            };
            for &term in &hypothesis.function().terms {
                if terms.iter().all(|t| t.shape != term.shape) {
                    terms.push(term);
                    term_origins.push(counter.metric.clone());
                }
            }
        }

        let shape =
            FunctionShape::new(true, terms.iter().map(|t| t.shape).collect());
        let data = self.single.fit_data(runtime)?;
        let configurations = runtime
            .distinct_parameter_values(self.options().parameter_index);
        if shape.coefficient_count() > configurations {
            return Err(ModelerError::degenerate_fit(
                runtime.callpath(),
                runtime.metric(),
                format!(
                    "composite {shape} has {} coefficients but only \
                     {configurations} configurations were measured",
                    shape.coefficient_count()
                ),
            ));
        }
        let hypothesis = fit_shape(&shape, &data).map_err(|degeneracy| {
            ModelerError::degenerate_fit(
                runtime.callpath(),
                runtime.metric(),
                format!("composite {shape}: {degeneracy}"),
            )
        })?;
        debug!(
            %shape,
            cost = hypothesis.cost(),
            "composed runtime hypothesis"
        );
        let weighting = CounterWeighting {
            counters,
            term_origins,
        };
        Ok((hypothesis, weighting))
    }
}
