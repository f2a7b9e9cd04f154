//! Cost computation and ranking of fitted hypotheses.

use std::cmp::Ordering;

use extrap_entities::{FitStatistics, FunctionShape, Hypothesis};
use extrap_regression::{adjusted_r_squared, r_squared};

/// Squared relative deviation of one prediction.
///
/// A zero actual value cannot be scaled against: the deviation is 0 for an
/// exact prediction and 1 otherwise.
fn relative_squared_error(actual: f64, predicted: f64) -> f64 {
    if actual == 0.0 {
        if predicted == 0.0 { 0.0 } else { 1.0 }
    } else {
        ((predicted - actual) / actual).powi(2)
    }
}

/// Scale-free fit error: the mean squared relative deviation between
/// `predicted` and `actual`.
///
/// Two metrics that differ only by a constant factor produce the same cost
/// for the same shape.
pub fn cost(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    #[expect(
        clippy::cast_precision_loss,
        reason = "sample counts are far below 2^52"
    )]
    let n = actual.len() as f64;
    relative_squared_sum(actual, predicted) / n
}

fn relative_squared_sum(actual: &[f64], predicted: &[f64]) -> f64 {
    actual
        .iter()
        .zip(predicted)
        .map(|(&a, &p)| relative_squared_error(a, p))
        .sum()
}

/// Computes the goodness-of-fit report for a fit with `terms` non-constant
/// terms.
pub fn fit_statistics(
    actual: &[f64],
    predicted: &[f64],
    terms: usize,
) -> FitStatistics {
    let rss = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (p - a).powi(2))
        .sum();
    let smape = if actual.is_empty() {
        0.0
    } else {
        let total: f64 = actual
            .iter()
            .zip(predicted)
            .map(|(&a, &p)| {
                let denominator = (a.abs() + p.abs()) / 2.0;
                if denominator == 0.0 {
                    0.0
                } else {
                    (p - a).abs() / denominator
                }
            })
            .sum();
        #[expect(
            clippy::cast_precision_loss,
            reason = "sample counts are far below 2^52"
        )]
        let n = actual.len() as f64;
        100.0 * total / n
    };
    FitStatistics {
        rss,
        rrss: relative_squared_sum(actual, predicted),
        smape,
        adjusted_r_squared: adjusted_r_squared(
            r_squared(actual, predicted),
            actual.len(),
            terms,
        ),
    }
}

/// A fitted hypothesis together with the shape it was fitted from.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub shape: FunctionShape,
    pub hypothesis: Hypothesis,
}

/// Orders candidates from best to worst.
///
/// Lower cost wins. Only exactly equal costs tie; a tie is broken by fewer
/// compound terms, then the smaller leading term (more conservative
/// extrapolation), then fewer coefficients. Candidates equal under all of
/// these compare `Equal`; [`select_best`] then keeps the one enumerated
/// first.
pub fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    let cost = a.hypothesis.cost().total_cmp(&b.hypothesis.cost());
    cost.then_with(|| a.shape.terms.len().cmp(&b.shape.terms.len()))
        .then_with(|| a.shape.leading_term().cmp(&b.shape.leading_term()))
        .then_with(|| {
            a.shape.coefficient_count().cmp(&b.shape.coefficient_count())
        })
}

/// Picks the best candidate, preferring the earliest on a full tie.
pub fn select_best(
    candidates: impl IntoIterator<Item = Candidate>,
) -> Option<Candidate> {
    candidates.into_iter().reduce(|best, candidate| {
        if compare(&candidate, &best) == Ordering::Less {
            candidate
        } else {
            best
        }
    })
}
