//! Closed-form model functions built from power/logarithm terms.
//!
//! A function of one scaling parameter `p` has the form
//!
//! ```text
//! f(p) = c0 + c1 * p^i1 * log2(p)^j1 + c2 * p^i2 * log2(p)^j2 + ...
//! ```
//!
//! The exponents `i`, `j` are drawn from a small fixed set of rationals, so a
//! function's *shape* (which terms it has) is discrete and enumerable, while
//! the coefficients `c` are real numbers found by linear regression.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An exact, reduced rational exponent such as `3/2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(i32, u32)", into = "(i32, u32)")]
pub struct Exponent {
    numerator: i32,
    denominator: u32,
}

impl Exponent {
    pub const ZERO: Exponent = Exponent::new(0, 1);
    pub const ONE: Exponent = Exponent::new(1, 1);

    /// Creates a reduced exponent.
    ///
    /// # Panics
    ///
    /// Panics if `denominator` is zero.
    #[must_use]
    pub const fn new(numerator: i32, denominator: u32) -> Self {
        assert!(denominator != 0, "exponent denominator must be non-zero");
        let divisor = gcd(numerator.unsigned_abs(), denominator);
        #[expect(
            clippy::cast_possible_wrap,
            reason = "divisor divides |numerator|, which fits in i32"
        )]
        let numerator = numerator / divisor as i32;
        Self {
            numerator,
            denominator: denominator / divisor,
        }
    }

    /// Creates an integral exponent.
    #[must_use]
    pub const fn integer(value: i32) -> Self {
        Self::new(value, 1)
    }

    pub fn numerator(self) -> i32 {
        self.numerator
    }

    pub fn denominator(self) -> u32 {
        self.denominator
    }

    pub fn is_zero(self) -> bool {
        self.numerator == 0
    }

    pub fn value(self) -> f64 {
        f64::from(self.numerator) / f64::from(self.denominator)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    if a == 0 { 1 } else { a }
}

impl TryFrom<(i32, u32)> for Exponent {
    type Error = String;

    fn try_from(
        (numerator, denominator): (i32, u32),
    ) -> Result<Self, Self::Error> {
        if denominator == 0 {
            return Err("exponent denominator must be non-zero".to_string());
        }
        Ok(Self::new(numerator, denominator))
    }
}

impl From<Exponent> for (i32, u32) {
    fn from(exponent: Exponent) -> Self {
        (exponent.numerator, exponent.denominator)
    }
}

impl PartialOrd for Exponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Exponent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Cross-multiplication is exact for the small rationals used here.
        let lhs = i64::from(self.numerator) * i64::from(other.denominator);
        let rhs = i64::from(other.numerator) * i64::from(self.denominator);
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Exponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "({}/{})", self.numerator, self.denominator)
        }
    }
}

/// The fixed shape `p^poly * log2(p)^log` of one compound term.
///
/// Shapes order by growth: first by the power exponent, then by the
/// logarithm exponent. `max()` over a function's shapes is therefore its
/// leading-order term.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub struct TermShape {
    pub poly: Exponent,
    pub log: Exponent,
}

impl TermShape {
    pub fn new(poly: Exponent, log: Exponent) -> Self {
        Self { poly, log }
    }

    /// `p^exponent`.
    pub fn power(exponent: Exponent) -> Self {
        Self::new(exponent, Exponent::ZERO)
    }

    /// `log2(p)^exponent`.
    pub fn logarithm(exponent: Exponent) -> Self {
        Self::new(Exponent::ZERO, exponent)
    }

    /// Whether evaluating this shape takes a logarithm of the parameter.
    pub fn requires_log(self) -> bool {
        !self.log.is_zero()
    }

    /// True for the degenerate shape `p^0 * log2(p)^0`, which duplicates
    /// the constant offset.
    pub fn is_constant(self) -> bool {
        self.poly.is_zero() && self.log.is_zero()
    }

    /// Evaluates the shape at `x`.
    ///
    /// Returns NaN or infinity outside the shape's domain (a logarithm of a
    /// non-positive value, a fractional power of a negative value); callers
    /// that need a guarantee check finiteness.
    pub fn evaluate(self, x: f64) -> f64 {
        let mut value = 1.0;
        if !self.poly.is_zero() {
            value *= x.powf(self.poly.value());
        }
        if !self.log.is_zero() {
            value *= x.log2().powf(self.log.value());
        }
        value
    }

    /// Attaches a coefficient, producing a concrete term.
    pub fn with_coefficient(self, coefficient: f64) -> CompoundTerm {
        CompoundTerm {
            shape: self,
            coefficient,
        }
    }
}

impl fmt::Display for TermShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.poly.is_zero(), self.log.is_zero()) {
            (true, true) => f.write_str("1"),
            (false, true) => write!(f, "p^{}", self.poly),
            (true, false) => write!(f, "log2(p)^{}", self.log),
            (false, false) => {
                write!(f, "p^{} * log2(p)^{}", self.poly, self.log)
            }
        }
    }
}

/// A term with its fitted coefficient: `coefficient * shape(p)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundTerm {
    pub shape: TermShape,
    pub coefficient: f64,
}

impl CompoundTerm {
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coefficient * self.shape.evaluate(x)
    }
}

/// Which terms a candidate function has, before coefficients are known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionShape {
    /// Whether the function carries a constant offset coefficient.
    pub constant: bool,
    pub terms: Vec<TermShape>,
}

impl FunctionShape {
    pub fn new(constant: bool, terms: Vec<TermShape>) -> Self {
        Self { constant, terms }
    }

    /// The constant-only shape `f(p) = c0`.
    pub fn constant_only() -> Self {
        Self::new(true, Vec::new())
    }

    /// Number of unknown linear coefficients.
    pub fn coefficient_count(&self) -> usize {
        self.terms.len() + usize::from(self.constant)
    }

    /// Whether any term takes a logarithm of the parameter.
    pub fn requires_log(&self) -> bool {
        self.terms.iter().any(|t| t.requires_log())
    }

    /// The fastest-growing term, or `None` for a constant-only shape.
    pub fn leading_term(&self) -> Option<TermShape> {
        self.terms.iter().copied().max()
    }
}

impl fmt::Display for FunctionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.constant {
            parts.push("c".to_string());
        }
        parts.extend(self.terms.iter().map(|t| format!("c * {t}")));
        if parts.is_empty() {
            f.write_str("0")
        } else {
            f.write_str(&parts.join(" + "))
        }
    }
}

/// A fitted function: a constant offset plus compound terms.
///
/// Single-parameter candidates hold at most two terms; a weighted
/// composite holds the union of terms copied from several counter models.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Function {
    pub constant: f64,
    pub terms: Vec<CompoundTerm>,
}

impl Function {
    pub fn new(constant: f64, terms: Vec<CompoundTerm>) -> Self {
        Self { constant, terms }
    }

    /// Evaluates the function at parameter value `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.constant + self.terms.iter().map(|t| t.evaluate(x)).sum::<f64>()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// The fastest-growing term shape, or `None` for a constant function.
    pub fn leading_term(&self) -> Option<TermShape> {
        self.terms.iter().map(|t| t.shape).max()
    }

    pub fn shapes(&self) -> impl Iterator<Item = TermShape> + '_ {
        self.terms.iter().map(|t| t.shape)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.constant)?;
        for term in &self.terms {
            if term.coefficient.is_sign_negative() {
                write!(f, " - {} * {}", -term.coefficient, term.shape)?;
            } else {
                write!(f, " + {} * {}", term.coefficient, term.shape)?;
            }
        }
        Ok(())
    }
}
