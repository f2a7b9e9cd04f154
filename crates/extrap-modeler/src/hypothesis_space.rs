//! Enumeration of the candidate function shapes tried for one parameter.
//!
//! The exponent sets are fixed: the search is a finite enumeration over
//! `p^i * log2(p)^j` terms, never a continuous optimization over exponents.

use extrap_entities::{Exponent, FunctionShape, TermShape};
use itertools::Itertools;

use crate::options::ModelerOptions;

/// Polynomial exponents: constant through cubic in thirds and quarters.
pub const POLY_EXPONENTS: [Exponent; 19] = [
    Exponent::new(0, 1),
    Exponent::new(1, 4),
    Exponent::new(1, 3),
    Exponent::new(1, 2),
    Exponent::new(2, 3),
    Exponent::new(3, 4),
    Exponent::new(1, 1),
    Exponent::new(5, 4),
    Exponent::new(4, 3),
    Exponent::new(3, 2),
    Exponent::new(5, 3),
    Exponent::new(7, 4),
    Exponent::new(2, 1),
    Exponent::new(9, 4),
    Exponent::new(7, 3),
    Exponent::new(5, 2),
    Exponent::new(8, 3),
    Exponent::new(11, 4),
    Exponent::new(3, 1),
];

/// Exponents of the `log2(p)` factor.
pub const LOG_EXPONENTS: [Exponent; 3] =
    [Exponent::new(0, 1), Exponent::new(1, 1), Exponent::new(2, 1)];

/// The ordered, finite set of shapes a single-parameter search tries.
///
/// Order is part of the contract: the selector's last tie-break is
/// enumeration order, so a given option set always yields the same winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HypothesisSpace {
    shapes: Vec<FunctionShape>,
}

impl HypothesisSpace {
    /// Enumerates the space for the single-parameter search.
    ///
    /// The space holds the constant-only shape, then every single term,
    /// then (when combinations are allowed) every unordered pair of
    /// distinct terms. Each non-constant entry appears once with a constant
    /// offset and once without.
    pub fn single_parameter(options: &ModelerOptions) -> Self {
        let terms = Self::terms(options.allow_log_terms);

        let mut shapes = vec![FunctionShape::constant_only()];
        for &term in &terms {
            push_with_and_without_constant(&mut shapes, vec![term]);
        }
        if options.allow_combinations {
            for (a, b) in terms.iter().copied().tuple_combinations() {
                push_with_and_without_constant(&mut shapes, vec![a, b]);
            }
        }
        Self { shapes }
    }

    /// Every admissible compound term shape, in `TermShape` order.
    ///
    /// Excludes `p^0 * log2(p)^0`, which would duplicate the constant.
    pub fn terms(allow_log_terms: bool) -> Vec<TermShape> {
        let logs: &[Exponent] = if allow_log_terms {
            &LOG_EXPONENTS
        } else {
            &LOG_EXPONENTS[..1]
        };
        POLY_EXPONENTS
            .iter()
            .cartesian_product(logs)
            .map(|(&poly, &log)| TermShape::new(poly, log))
            .filter(|shape| !shape.is_constant())
            .collect()
    }

    pub fn shapes(&self) -> &[FunctionShape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

fn push_with_and_without_constant(
    shapes: &mut Vec<FunctionShape>,
    terms: Vec<TermShape>,
) {
    shapes.push(FunctionShape::new(true, terms.clone()));
    shapes.push(FunctionShape::new(false, terms));
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_term_counts() {
        // 19 poly x 3 log minus the constant shape.
        assert_eq!(HypothesisSpace::terms(true).len(), 56);
        assert_eq!(HypothesisSpace::terms(false).len(), 18);
        assert!(
            HypothesisSpace::terms(false)
                .iter()
                .all(|t| !t.requires_log())
        );
    }

    /// 1 constant + 2 per term + 2 per unordered pair.
    #[test]
    fn test_full_space_size() {
        let space = HypothesisSpace::single_parameter(&ModelerOptions::default());
        let n = 56;
        assert_eq!(space.len(), 1 + 2 * n + n * (n - 1));
        assert_eq!(space.shapes()[0], FunctionShape::constant_only());
    }

    #[test]
    fn test_space_without_combinations() {
        let options = ModelerOptions {
            allow_combinations: false,
            allow_log_terms: false,
            ..ModelerOptions::default()
        };
        let space = HypothesisSpace::single_parameter(&options);
        assert_eq!(space.len(), 1 + 2 * 18);
        assert!(space.shapes().iter().all(|s| s.terms.len() <= 1));
        assert!(space.shapes().iter().all(|s| !s.requires_log()));
    }

    /// No shape is enumerated twice and pairs never repeat a term.
    #[test]
    fn test_shapes_unique() {
        let space = HypothesisSpace::single_parameter(&ModelerOptions::default());
        let unique: HashSet<_> = space.shapes().iter().collect();
        assert_eq!(unique.len(), space.len());
        assert!(
            space
                .shapes()
                .iter()
                .filter(|s| s.terms.len() == 2)
                .all(|s| s.terms[0] != s.terms[1])
        );
    }

    #[test]
    fn test_space_contains_linear_and_log_linear() {
        let space = HypothesisSpace::single_parameter(&ModelerOptions::default());
        let linear = FunctionShape::new(false, vec![TermShape::power(Exponent::ONE)]);
        let n_log_n = FunctionShape::new(
            true,
            vec![TermShape::new(Exponent::ONE, Exponent::ONE)],
        );
        assert!(space.shapes().contains(&linear));
        assert!(space.shapes().contains(&n_log_n));
    }
}
