//! Exhaustive single-parameter model search.

use std::sync::Arc;

use extrap_entities::{FunctionShape, Hypothesis, MeasurementSequence};
use tracing::{debug, instrument, trace};

use crate::aggregate::MeasurementSet;
use crate::assemble::{Fitted, ModelSet, Outcome, model_callpaths};
use crate::context::ModelingContext;
use crate::error::ModelerError;
use crate::fit::{FitData, fit_shape};
use crate::hypothesis_space::HypothesisSpace;
use crate::options::ModelerOptions;
use crate::progress::Progress;
use crate::select::{Candidate, select_best};

/// Fits every shape of the hypothesis space to a sequence and keeps the
/// cheapest.
///
/// Construct once per option set; the hypothesis space is enumerated in
/// `new` and shared by every search.
#[derive(Debug, Clone)]
pub struct SingleParameterModeler {
    options: ModelerOptions,
    space: HypothesisSpace,
}

impl SingleParameterModeler {
    /// Validates `options` and enumerates the hypothesis space.
    ///
    /// # Errors
    ///
    /// Returns an error classified by [`ModelerError::is_invalid_options`]
    /// if the options are inconsistent.
    pub fn new(options: ModelerOptions) -> Result<Self, ModelerError> {
        options.validate()?;
        let space = HypothesisSpace::single_parameter(&options);
        debug!(candidates = space.len(), "enumerated hypothesis space");
        Ok(Self { options, space })
    }

    pub fn options(&self) -> &ModelerOptions {
        &self.options
    }

    pub fn hypothesis_space(&self) -> &HypothesisSpace {
        &self.space
    }

    /// Projects `sequence` onto the modeled parameter and checks that it
    /// has enough distinct configurations to fit.
    ///
    /// # Errors
    ///
    /// Returns [`ModelerError`] if:
    /// - A coordinate lacks the modeled parameter
    ///   ([`ModelerError::is_dimension_mismatch`])
    /// - Fewer than `min_measurement_points` distinct parameter values were
    ///   measured ([`ModelerError::is_insufficient_data`])
    pub fn fit_data(
        &self,
        sequence: &MeasurementSequence,
    ) -> Result<FitData, ModelerError> {
        let data = FitData::from_sequence(
            sequence,
            self.options.parameter_index,
            self.options.basis(),
        )?;
        let found =
            sequence.distinct_parameter_values(self.options.parameter_index);
        if found < self.options.min_measurement_points {
            return Err(ModelerError::insufficient_data(
                sequence.callpath(),
                sequence.metric(),
                found,
                self.options.min_measurement_points,
            ));
        }
        Ok(data)
    }

    /// Fits one candidate shape to `sequence`.
    ///
    /// # Errors
    ///
    /// Besides the [`fit_data`](Self::fit_data) errors, returns an error
    /// classified by [`ModelerError::is_degenerate_fit`] if the shape
    /// cannot be fitted to this data.
    pub fn create_hypothesis(
        &self,
        shape: &FunctionShape,
        sequence: &MeasurementSequence,
    ) -> Result<Hypothesis, ModelerError> {
        let data = self.fit_data(sequence)?;
        fit_shape(shape, &data).map_err(|degeneracy| {
            ModelerError::degenerate_fit(
                sequence.callpath(),
                sequence.metric(),
                format!("{shape}: {degeneracy}"),
            )
        })
    }

    /// Fits every shape of the hypothesis space, in enumeration order.
    ///
    /// Degenerate candidates are left out; the result may be empty.
    ///
    /// # Errors
    ///
    /// Returns the [`fit_data`](Self::fit_data) errors.
    pub fn evaluate_candidates(
        &self,
        sequence: &MeasurementSequence,
    ) -> Result<Vec<Candidate>, ModelerError> {
        let data = self.fit_data(sequence)?;
        let mut candidates = Vec::with_capacity(self.space.len());
        for shape in self.space.shapes() {
            match fit_shape(shape, &data) {
                Ok(hypothesis) => candidates.push(Candidate {
                    shape: shape.clone(),
                    hypothesis,
                }),
                Err(degeneracy) => {
                    trace!(%shape, reason = %degeneracy, "candidate rejected");
                }
            }
        }
        Ok(candidates)
    }

    /// Searches the hypothesis space for the lowest-cost fit of `sequence`.
    ///
    /// # Errors
    ///
    /// Besides the [`fit_data`](Self::fit_data) errors, returns an error
    /// classified by [`ModelerError::is_degenerate_fit`] if every candidate
    /// was rejected.
    #[instrument(
        level = "debug",
        skip_all,
        fields(callpath = %sequence.callpath(), metric = %sequence.metric())
    )]
    pub fn find_best_hypothesis(
        &self,
        sequence: &MeasurementSequence,
    ) -> Result<Hypothesis, ModelerError> {
        let candidates = self.evaluate_candidates(sequence)?;
        let evaluated = candidates.len();
        let Some(best) = select_best(candidates) else {
            return Err(ModelerError::degenerate_fit(
                sequence.callpath(),
                sequence.metric(),
                "every candidate function was rejected",
            ));
        };
        debug!(
            evaluated,
            shape = %best.shape,
            cost = best.hypothesis.cost(),
            terms = best.shape.terms.len(),
            "selected hypothesis"
        );
        Ok(best.hypothesis)
    }

    /// Models every (call path, metric) sequence of `measurements`
    /// independently.
    ///
    /// Call paths are fitted in parallel; each completion is reported to
    /// `progress`. Failures follow the configured
    /// [`FailurePolicy`](crate::FailurePolicy).
    ///
    /// # Errors
    ///
    /// Returns the first fit error in (call path, metric) order under
    /// `Abort`, or an error classified by [`ModelerError::is_cancelled`] if
    /// `ctx` was cancelled.
    pub fn model(
        &self,
        measurements: &MeasurementSet,
        ctx: &ModelingContext,
        progress: &dyn Progress,
    ) -> Result<ModelSet, ModelerError> {
        model_callpaths(
            measurements,
            self.options.failure_policy,
            ctx,
            progress,
            |_, sequences| self.fit_independently(sequences),
        )
    }

    pub(crate) fn fit_one(
        &self,
        sequence: &Arc<MeasurementSequence>,
    ) -> Outcome {
        let key = (sequence.callpath().clone(), sequence.metric().clone());
        let result = self.find_best_hypothesis(sequence).map(|hypothesis| {
            Fitted::independent(hypothesis, Arc::clone(sequence))
        });
        (key, result)
    }

    fn fit_independently(
        &self,
        sequences: &[&Arc<MeasurementSequence>],
    ) -> Vec<Outcome> {
        sequences.iter().map(|seq| self.fit_one(seq)).collect()
    }
}

#[cfg(test)]
mod tests {
    use extrap_entities::{
        Callpath, Coordinate, Exponent, Function, Measurement, Metric,
        TermShape,
    };

    use super::*;

    fn sequence(xs: &[f64], ys: &[f64]) -> MeasurementSequence {
        let measurements = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| Measurement {
                coordinate: Coordinate::single(x),
                mean: y,
                median: y,
                minimum: y,
                maximum: y,
                std: 0.0,
                repetitions: 1,
            })
            .collect();
        MeasurementSequence::new(
            Callpath::new("main"),
            Metric::runtime("time"),
            measurements,
        )
    }

    fn modeler() -> SingleParameterModeler {
        SingleParameterModeler::new(ModelerOptions::default()).unwrap()
    }

    const XS: [f64; 5] = [4.0, 8.0, 16.0, 32.0, 64.0];

    /// Term shapes contributing more than a millionth of the value at `x`.
    ///
    /// Noise-free data is reproduced almost exactly by several candidates,
    /// and the cheapest may carry terms with rounding-level coefficients.
    fn dominant_shapes(function: &Function, x: f64) -> Vec<TermShape> {
        let scale = function.evaluate(x).abs();
        function
            .terms
            .iter()
            .filter(|term| term.evaluate(x).abs() > 1e-6 * scale)
            .map(|term| term.shape)
            .collect()
    }

    #[test]
    fn test_constant_selected_for_equal_values() {
        let seq = sequence(&XS, &[7.3; 5]);
        let best = modeler().find_best_hypothesis(&seq).unwrap();
        assert_eq!(best.function().term_count(), 0);
        assert_eq!(best.function().constant, 7.3);
        assert_eq!(best.cost(), 0.0);
    }

    #[test]
    fn test_quadratic_selected() {
        let ys: Vec<f64> = XS.iter().map(|x| 3.0 + 0.5 * x * x).collect();
        let best = modeler().find_best_hypothesis(&sequence(&XS, &ys)).unwrap();
        assert_eq!(
            dominant_shapes(best.function(), 64.0),
            [TermShape::power(Exponent::integer(2))]
        );
        assert!(best.cost() < 1e-12);
    }

    #[test]
    fn test_four_points_insufficient() {
        let seq = sequence(&XS[..4], &[1.0, 2.0, 3.0, 4.0]);
        let err = modeler().find_best_hypothesis(&seq).unwrap_err();
        assert!(err.is_insufficient_data());
        assert_eq!(err.metric().unwrap().name(), "time");
    }

    /// Log candidates are rejected at p = 0 while power candidates survive.
    #[test]
    fn test_zero_parameter_excludes_log_candidates() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys: Vec<f64> = xs.iter().map(|x| 1.0 + 2.0 * x).collect();
        let m = modeler();
        let candidates = m.evaluate_candidates(&sequence(&xs, &ys)).unwrap();
        assert!(candidates.len() < m.hypothesis_space().len());
        assert!(candidates.iter().all(|c| !c.shape.requires_log()));
        let best = m.find_best_hypothesis(&sequence(&xs, &ys)).unwrap();
        assert_eq!(
            dominant_shapes(best.function(), 4.0),
            [TermShape::power(Exponent::ONE)]
        );
    }

    #[test]
    fn test_create_hypothesis_degenerate() {
        let shape = FunctionShape::new(
            true,
            vec![TermShape::logarithm(Exponent::ONE)],
        );
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let err = modeler()
            .create_hypothesis(&shape, &sequence(&xs, &[1.0; 5]))
            .unwrap_err();
        assert!(err.is_degenerate_fit());
        assert!(err.to_string().contains("log2(p)^1"));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = ModelerOptions {
            min_measurement_points: 0,
            ..ModelerOptions::default()
        };
        assert!(
            SingleParameterModeler::new(options)
                .unwrap_err()
                .is_invalid_options()
        );
    }
}
