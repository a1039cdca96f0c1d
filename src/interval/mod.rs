//! Correctly-rounded interval arithmetic and the forward/reverse primitives
//! the rest of the solver builds on.
//!
//! Every primitive here rounds outward: the left bound never rounds up and
//! the right bound never rounds down, so the returned interval always
//! encloses the true real-valued image. Rust cannot acquire/release the
//! FPU's rounding-mode, so outward rounding is emulated by computing with
//! the default round-to-nearest mode and then widening the result by one
//! ULP on each side with [`next_up`]/[`next_down`].

pub mod rounding;
mod sign;

pub use rounding::{next_down, next_up};
pub use sign::SignSet;

use std::fmt;

use derive_more::{Display, Error};

/// Domain-error taxonomy for interval construction.
///
/// These are raised only at construction time, never by a contractor, and
/// are treated as fatal build-time errors by callers.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq)]
pub enum IntervalError {
    #[display("lower bound {lo} exceeds upper bound {hi}")]
    InvertedBounds { lo: f64, hi: f64 },
    #[display("cannot raise an interval straddling or containing zero to a negative power")]
    NonPositivePow,
    #[display("cannot take the square root of an interval strictly below zero")]
    NegativeSqrt,
}

/// A closed real interval `[lo, hi]`, or the distinguished empty value.
///
/// Emptiness is encoded with both bounds set to `NaN`; every constructor and
/// operator checks for and propagates this sentinel rather than relying on
/// `NaN`'s IEEE comparison behavior.
#[derive(Clone, Copy)]
pub struct Interval {
    lo: f64,
    hi: f64,
}

impl Interval {
    pub const EMPTY: Interval = Interval {
        lo: f64::NAN,
        hi: f64::NAN,
    };

    /// The unbounded interval `(-inf, +inf)`.
    pub const UNIVERSE: Interval = Interval {
        lo: f64::NEG_INFINITY,
        hi: f64::INFINITY,
    };

    pub const ZERO: Interval = Interval { lo: 0.0, hi: 0.0 };

    /// Builds `[lo, hi]`. Panics if `lo > hi` (a construction bug, not a
    /// recoverable numerical condition — see [`Interval::try_new`] for the
    /// fallible form).
    pub fn new(lo: f64, hi: f64) -> Interval {
        debug_assert!(lo <= hi, "inverted interval bounds: [{lo}, {hi}]");
        Interval { lo, hi }
    }

    /// Fallible constructor surfacing `lo > hi` as a [`IntervalError`]
    /// rather than panicking, for callers building from untrusted input.
    pub fn try_new(lo: f64, hi: f64) -> Result<Interval, IntervalError> {
        if lo > hi {
            Err(IntervalError::InvertedBounds { lo, hi })
        } else {
            Ok(Interval { lo, hi })
        }
    }

    pub fn point(x: f64) -> Interval {
        Interval { lo: x, hi: x }
    }

    pub fn lo(self) -> f64 {
        self.lo
    }

    pub fn hi(self) -> f64 {
        self.hi
    }

    pub fn is_empty(self) -> bool {
        self.lo.is_nan() || self.hi.is_nan()
    }

    pub fn width(self) -> f64 {
        if self.is_empty() {
            f64::NAN
        } else {
            self.hi - self.lo
        }
    }

    pub fn mid(self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        if self.lo.is_infinite() && self.hi.is_infinite() {
            return 0.0;
        }
        if self.lo.is_infinite() {
            return f64::MIN / 2.0;
        }
        if self.hi.is_infinite() {
            return f64::MAX / 2.0;
        }
        self.lo + 0.5 * (self.hi - self.lo)
    }

    pub fn is_bounded(self) -> bool {
        !self.is_empty() && self.lo.is_finite() && self.hi.is_finite()
    }

    /// An interval is canonical when its endpoints are adjacent
    /// representable doubles.
    pub fn is_canonical(self) -> bool {
        !self.is_empty() && next_up(self.lo) == self.hi
    }

    pub fn contains(self, x: f64) -> bool {
        !self.is_empty() && self.lo <= x && x <= self.hi
    }

    /// Set inclusion: every point of `self` is a point of `other`.
    pub fn is_subset_of(self, other: Interval) -> bool {
        self.is_empty() || (!other.is_empty() && other.lo <= self.lo && self.hi <= other.hi)
    }

    pub fn hull(self, other: Interval) -> Interval {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Interval::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }

    pub fn intersect(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        if lo > hi {
            Interval::EMPTY
        } else {
            Interval::new(lo, hi)
        }
    }

    // --- relational predicates -------------------------------------------

    /// True iff every real pair `(x, y)` with `x` in `self`, `y` in `other`
    /// satisfies `x < y`.
    pub fn certainly_lt(self, other: Interval) -> bool {
        !self.is_empty() && !other.is_empty() && self.hi < other.lo
    }

    pub fn certainly_le(self, other: Interval) -> bool {
        !self.is_empty() && !other.is_empty() && self.hi <= other.lo
    }

    /// True iff some real pair `(x, y)` with `x` in `self`, `y` in `other`
    /// satisfies `x < y`.
    pub fn possibly_lt(self, other: Interval) -> bool {
        !self.is_empty() && !other.is_empty() && self.lo < other.hi
    }

    pub fn possibly_le(self, other: Interval) -> bool {
        !self.is_empty() && !other.is_empty() && self.lo <= other.hi
    }

    pub fn certainly_eq(self, other: Interval) -> bool {
        !self.is_empty() && !other.is_empty() && self.lo == self.hi && self == other
    }

    pub fn possibly_eq(self, other: Interval) -> bool {
        !self.intersect(other).is_empty()
    }

    // --- arithmetic, outward-rounded --------------------------------------

    pub fn neg(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(-self.hi, -self.lo)
    }

    pub fn add(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(
            next_down(self.lo + other.lo),
            next_up(self.hi + other.hi),
        )
    }

    pub fn sub(self, other: Interval) -> Interval {
        self.add(other.neg())
    }

    pub fn mul(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        let candidates = [
            self.lo * other.lo,
            self.lo * other.hi,
            self.hi * other.lo,
            self.hi * other.hi,
        ];
        let lo = candidates.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = candidates
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        Interval::new(next_down(lo), next_up(hi))
    }

    /// Division. An interval denominator straddling zero yields the
    /// universe — callers needing the sharper pair-of-half-lines result
    /// should use [`Interval::div_relational`].
    pub fn div(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        if other.lo <= 0.0 && other.hi >= 0.0 {
            return Interval::UNIVERSE;
        }
        self.mul(Interval::new(1.0 / other.hi, 1.0 / other.lo).outward_reciprocal_fix(other))
    }

    /// Helper for [`Interval::div`]: `1/other` computed with outward
    /// rounding (reciprocal flips and swaps bounds for a nonzero interval).
    fn outward_reciprocal_fix(self, other: Interval) -> Interval {
        debug_assert!(!(other.lo <= 0.0 && other.hi >= 0.0));
        Interval::new(next_down(1.0 / other.hi), next_up(1.0 / other.lo))
    }

    /// The relational (set-valued) division used by reverse projection:
    /// when the denominator straddles zero, returns the two disjoint
    /// half-line results as `(left, Some(right))` instead of collapsing to
    /// the universe.
    pub fn div_relational(self, other: Interval) -> (Interval, Option<Interval>) {
        if self.is_empty() || other.is_empty() {
            return (Interval::EMPTY, None);
        }
        if other.lo <= 0.0 && other.hi >= 0.0 {
            if other.lo == 0.0 && other.hi == 0.0 {
                return (Interval::EMPTY, None);
            }
            let left = if other.lo < 0.0 {
                Some(self.div(Interval::new(other.lo, next_down(0.0))))
            } else {
                None
            };
            let right = if other.hi > 0.0 {
                Some(self.div(Interval::new(next_up(0.0), other.hi)))
            } else {
                None
            };
            return match (left, right) {
                (Some(l), Some(r)) => (l, Some(r)),
                (Some(l), None) => (l, None),
                (None, Some(r)) => (r, None),
                (None, None) => (Interval::EMPTY, None),
            };
        }
        (self.div(other), None)
    }

    pub fn abs(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if self.lo >= 0.0 {
            self
        } else if self.hi <= 0.0 {
            self.neg()
        } else {
            Interval::new(0.0, self.lo.abs().max(self.hi.abs()))
        }
    }

    pub fn sgn(self) -> SignSet {
        SignSet::of_interval(self)
    }

    pub fn sqr(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        let abs = self.abs();
        Interval::new(next_down(abs.lo * abs.lo), next_up(abs.hi * abs.hi))
    }

    pub fn sqrt(self) -> Result<Interval, IntervalError> {
        if self.is_empty() {
            return Ok(Interval::EMPTY);
        }
        if self.hi < 0.0 {
            return Err(IntervalError::NegativeSqrt);
        }
        let lo = self.lo.max(0.0);
        Ok(Interval::new(
            next_down(lo.sqrt()),
            next_up(self.hi.sqrt()),
        ))
    }

    /// Small `n ∈ {-2,-1,0,1,2}` is expected to be rewritten by the term
    /// layer into `1`, `t`, `sqr(t)`, `1/t`, `1/sqr(t)`; this is the general
    /// fallback used for other integer exponents.
    pub fn pow_n(self, n: i32) -> Result<Interval, IntervalError> {
        if self.is_empty() {
            return Ok(Interval::EMPTY);
        }
        if n == 0 {
            return Ok(Interval::point(1.0));
        }
        if n < 0 {
            if self.contains(0.0) {
                return Err(IntervalError::NonPositivePow);
            }
            let pos = self.pow_n(-n)?;
            return Ok(Interval::point(1.0).div(pos));
        }
        if n % 2 == 0 {
            let abs = self.abs();
            Ok(Interval::new(
                next_down(abs.lo.powi(n)),
                next_up(abs.hi.powi(n)),
            ))
        } else {
            Ok(Interval::new(
                next_down(self.lo.powi(n)),
                next_up(self.hi.powi(n)),
            ))
        }
    }

    pub fn exp(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(next_down(self.lo.exp()), next_up(self.hi.exp()))
    }

    /// Natural log; domain below zero is clipped to empty contribution
    /// (callers are expected to intersect with the positive reals first).
    pub fn ln(self) -> Interval {
        if self.is_empty() || self.hi <= 0.0 {
            return Interval::EMPTY;
        }
        let lo = self.lo.max(0.0);
        Interval::new(next_down(lo.ln()), next_up(self.hi.ln()))
    }

    pub fn min(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(self.lo.min(other.lo), self.hi.min(other.hi))
    }

    pub fn max(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(self.lo.max(other.lo), self.hi.max(other.hi))
    }

    /// Monotone sine over `self`, correctly enclosing by tracking the
    /// critical points (`±pi/2 + k*pi`) that fall inside the interval.
    pub fn sin(self) -> Interval {
        trig_envelope(self, f64::sin, std::f64::consts::FRAC_PI_2)
    }

    pub fn cos(self) -> Interval {
        trig_envelope(self, f64::cos, 0.0)
    }

    /// Tangent; returns the universe across any interval containing a pole
    /// at `pi/2 + k*pi`.
    pub fn tan(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if self.width() >= std::f64::consts::PI {
            return Interval::UNIVERSE;
        }
        let period = std::f64::consts::PI;
        let k_lo = ((self.lo - std::f64::consts::FRAC_PI_2) / period).floor();
        let pole = std::f64::consts::FRAC_PI_2 + (k_lo + 1.0) * period;
        if pole > self.lo && pole < self.hi {
            return Interval::UNIVERSE;
        }
        Interval::new(next_down(self.lo.tan()), next_up(self.hi.tan()))
    }

    /// Rounds every point in `self` to the nearest integer hull: the
    /// smallest interval `[ceil(lo), floor(hi)]` containing integers of
    /// `self`. Used by the integer-domain contractor.
    pub fn integer_hull(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        let lo = self.lo.ceil();
        let hi = self.hi.floor();
        if lo > hi {
            Interval::EMPTY
        } else {
            Interval::new(lo, hi)
        }
    }

    // --- projection primitives (HC4 atoms) --------------------------------
    //
    // For `z = op(x, y)`, `op_pX`/`op_pY`/`op_pZ` return the tightened `x`
    // (resp. `y`, `z`) given the current three intervals. These are the
    // reverse-projection atoms HC4-revise calls while walking the DAG from
    // root to leaves.

    pub fn add_p_x(x: Interval, y: Interval, z: Interval) -> Interval {
        x.intersect(z.sub(y))
    }

    pub fn add_p_y(x: Interval, y: Interval, z: Interval) -> Interval {
        y.intersect(z.sub(x))
    }

    pub fn add_p_z(x: Interval, y: Interval, z: Interval) -> Interval {
        z.intersect(x.add(y))
    }

    pub fn sub_p_x(x: Interval, y: Interval, z: Interval) -> Interval {
        x.intersect(z.add(y))
    }

    pub fn sub_p_y(x: Interval, y: Interval, z: Interval) -> Interval {
        y.intersect(x.sub(z))
    }

    pub fn sub_p_z(x: Interval, y: Interval, z: Interval) -> Interval {
        z.intersect(x.sub(y))
    }

    pub fn mul_p_z(x: Interval, y: Interval, z: Interval) -> Interval {
        z.intersect(x.mul(y))
    }

    /// Projection of `x` from `z = x * y`: `x ∈ z / y` when `y` does not
    /// pin `x` to the universe (`y == {0}` and `z` containing 0 leaves `x`
    /// unconstrained).
    pub fn mul_p_x(x: Interval, y: Interval, z: Interval) -> Interval {
        if y.lo == 0.0 && y.hi == 0.0 {
            return if z.contains(0.0) { x } else { Interval::EMPTY };
        }
        x.intersect(z.div(y))
    }

    pub fn mul_p_y(x: Interval, y: Interval, z: Interval) -> Interval {
        Self::mul_p_x(y, x, z)
    }

    pub fn div_p_z(x: Interval, y: Interval, z: Interval) -> Interval {
        z.intersect(x.div(y))
    }

    /// Projection of `x` from `z = x / y`: `x ∈ z * y`.
    pub fn div_p_x(x: Interval, y: Interval, z: Interval) -> Interval {
        x.intersect(z.mul(y))
    }

    /// Projection of `y` from `z = x / y`, using the relational division
    /// to recover `y` even when `z` straddles zero.
    pub fn div_p_y(x: Interval, y: Interval, z: Interval) -> Interval {
        if z.lo == 0.0 && z.hi == 0.0 {
            return if x.contains(0.0) { y } else { Interval::EMPTY };
        }
        let (a, b) = x.div_relational(z);
        let candidate = match b {
            Some(b) => a.hull(b),
            None => a,
        };
        y.intersect(candidate)
    }
}

fn trig_envelope(x: Interval, f: fn(f64) -> f64, phase: f64) -> Interval {
    if x.is_empty() {
        return Interval::EMPTY;
    }
    let two_pi = 2.0 * std::f64::consts::PI;
    if x.width() >= two_pi {
        return Interval::new(-1.0, 1.0);
    }
    let mut lo = f(x.lo).min(f(x.hi));
    let mut hi = f(x.lo).max(f(x.hi));
    // critical points where the derivative vanishes: phase + k*pi
    let k_start = ((x.lo - phase) / std::f64::consts::PI).floor() as i64 - 1;
    let k_end = ((x.hi - phase) / std::f64::consts::PI).ceil() as i64 + 1;
    for k in k_start..=k_end {
        let crit = phase + (k as f64) * std::f64::consts::PI;
        if crit > x.lo && crit < x.hi {
            let v = f(crit);
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    Interval::new(next_down(lo).max(-1.0), next_up(hi).min(1.0))
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => true,
            (true, false) | (false, true) => false,
            (false, false) => self.lo == other.lo && self.hi == other.hi,
        }
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Interval(empty)")
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "∅")
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}
