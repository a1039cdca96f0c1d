//! Immutable expression trees with shared sub-terms.
//!
//! A [`Term`] is a cheap `Rc` handle over a [`TermNode`]; constructors
//! constant-fold whenever every child is already a constant, and the
//! arithmetic operator overloads apply the standard identity rewrites
//! (`0+x -> x`, `1*x -> x`, ...). Sharing is by `Rc` only — term-level
//! hash-consing across distinct expressions is the DAG's job (`crate::dag`),
//! not this layer's: this layer constant-folds at construction time, while
//! the DAG separately checks a canonical-form hash table when a term is
//! inserted as a constraint.

use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use derive_more::{Display, Error};

use crate::domain::{Scope, Variable};
use crate::interval::Interval;

#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum TermError {
    #[display("division by the zero term")]
    DivisionByZeroConstant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Abs,
    Sgn,
    Sqr,
    Sqrt,
    Exp,
    Ln,
    Sin,
    Cos,
    Tan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

#[derive(Debug, Clone)]
enum TermKind {
    Const(f64),
    Var(Variable),
    Unary(UnaryOp, Term),
    PowN(Term, i32),
    Binary(BinaryOp, Term, Term),
}

#[derive(Debug, Clone)]
struct TermNode {
    kind: TermKind,
}

/// A reference-counted handle to an immutable expression-tree node.
#[derive(Debug, Clone)]
pub struct Term(Rc<TermNode>);

impl Term {
    fn new(kind: TermKind) -> Term {
        Term(Rc::new(TermNode { kind }))
    }

    pub fn constant(x: f64) -> Term {
        Term::new(TermKind::Const(x))
    }

    pub fn var(v: Variable) -> Term {
        Term::new(TermKind::Var(v))
    }

    pub fn as_constant(&self) -> Option<f64> {
        match &self.0.kind {
            TermKind::Const(x) => Some(*x),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.as_constant().is_some()
    }

    /// True iff this term is affine in every free variable (sums,
    /// differences and scalar multiples of variables/constants only).
    pub fn is_linear(&self) -> bool {
        match &self.0.kind {
            TermKind::Const(_) | TermKind::Var(_) => true,
            TermKind::Unary(UnaryOp::Neg, t) => t.is_linear(),
            TermKind::Binary(BinaryOp::Add, a, b) | TermKind::Binary(BinaryOp::Sub, a, b) => {
                a.is_linear() && b.is_linear()
            }
            TermKind::Binary(BinaryOp::Mul, a, b) => {
                (a.is_constant() && b.is_linear()) || (b.is_constant() && a.is_linear())
            }
            TermKind::Binary(BinaryOp::Div, a, b) => a.is_linear() && b.is_constant(),
            _ => false,
        }
    }

    /// The set of variables this term reads, in first-encountered order.
    pub fn free_scope(&self) -> Scope {
        let mut scope = Scope::new();
        self.collect_scope(&mut scope);
        scope
    }

    fn collect_scope(&self, scope: &mut Scope) {
        match &self.0.kind {
            TermKind::Const(_) => {}
            TermKind::Var(v) => {
                scope.insert(v.clone());
            }
            TermKind::Unary(_, t) => t.collect_scope(scope),
            TermKind::PowN(t, _) => t.collect_scope(scope),
            TermKind::Binary(_, a, b) => {
                a.collect_scope(scope);
                b.collect_scope(scope);
            }
        }
    }

    /// Evaluates this term over a box given as `scope -> Interval` lookup.
    pub fn eval(&self, lookup: &impl Fn(&Variable) -> Interval) -> Interval {
        match &self.0.kind {
            TermKind::Const(x) => Interval::point(*x),
            TermKind::Var(v) => lookup(v),
            TermKind::Unary(op, t) => eval_unary(*op, t.eval(lookup)),
            TermKind::PowN(t, n) => t.eval(lookup).pow_n(*n).unwrap_or(Interval::EMPTY),
            TermKind::Binary(op, a, b) => eval_binary(*op, a.eval(lookup), b.eval(lookup)),
        }
    }

    pub fn neg(&self) -> Term {
        if let Some(x) = self.as_constant() {
            return Term::constant(-x);
        }
        if let TermKind::Unary(UnaryOp::Neg, inner) = &self.0.kind {
            return inner.clone();
        }
        Term::new(TermKind::Unary(UnaryOp::Neg, self.clone()))
    }

    pub fn abs(&self) -> Term {
        fold_unary(UnaryOp::Abs, self, f64::abs)
    }

    pub fn sgn(&self) -> Term {
        fold_unary(UnaryOp::Sgn, self, f64::signum)
    }

    pub fn sqr(&self) -> Term {
        fold_unary(UnaryOp::Sqr, self, |x| x * x)
    }

    pub fn sqrt(&self) -> Term {
        fold_unary(UnaryOp::Sqrt, self, f64::sqrt)
    }

    pub fn exp(&self) -> Term {
        fold_unary(UnaryOp::Exp, self, f64::exp)
    }

    pub fn ln(&self) -> Term {
        fold_unary(UnaryOp::Ln, self, f64::ln)
    }

    pub fn sin(&self) -> Term {
        fold_unary(UnaryOp::Sin, self, f64::sin)
    }

    pub fn cos(&self) -> Term {
        fold_unary(UnaryOp::Cos, self, f64::cos)
    }

    pub fn tan(&self) -> Term {
        fold_unary(UnaryOp::Tan, self, f64::tan)
    }

    /// `pow(t, n)`: small exponents collapse to `1`, `t`, `sqr(t)`, `1/t`,
    /// `1/sqr(t)`; other integer exponents keep a `PowN` node.
    pub fn pow(&self, n: i32) -> Result<Term, TermError> {
        if let Some(x) = self.as_constant() {
            if n < 0 && x == 0.0 {
                return Err(TermError::DivisionByZeroConstant);
            }
            return Ok(Term::constant(x.powi(n)));
        }
        Ok(match n {
            0 => Term::constant(1.0),
            1 => self.clone(),
            2 => self.sqr(),
            -1 => Term::constant(1.0).div_checked(self)?,
            -2 => Term::constant(1.0).div_checked(&self.sqr())?,
            _ => Term::new(TermKind::PowN(self.clone(), n)),
        })
    }

    pub fn min(&self, other: &Term) -> Term {
        fold_binary(BinaryOp::Min, self, other, f64::min)
    }

    pub fn max(&self, other: &Term) -> Term {
        fold_binary(BinaryOp::Max, self, other, f64::max)
    }

    /// Fallible division, surfacing division by the constant zero rather
    /// than silently folding to `NaN`/`inf`.
    pub fn div_checked(&self, other: &Term) -> Result<Term, TermError> {
        if let Some(0.0) = other.as_constant() {
            return Err(TermError::DivisionByZeroConstant);
        }
        Ok(self / other)
    }

    /// `self == rhs`, as a model constraint (target image is the point
    /// `[rhs, rhs]`).
    pub fn eq(&self, rhs: f64) -> Constraint {
        Constraint { term: self.clone(), image: Interval::point(rhs) }
    }

    /// `self <= rhs`.
    pub fn le(&self, rhs: f64) -> Constraint {
        Constraint { term: self.clone(), image: Interval::new(f64::NEG_INFINITY, rhs) }
    }

    /// `self >= rhs`.
    pub fn ge(&self, rhs: f64) -> Constraint {
        Constraint { term: self.clone(), image: Interval::new(rhs, f64::INFINITY) }
    }

    /// `lo <= self <= hi`.
    pub fn in_range(&self, lo: f64, hi: f64) -> Constraint {
        Constraint { term: self.clone(), image: Interval::new(lo, hi) }
    }
}

/// A term paired with the image interval it must evaluate into — a
/// constraint ready to be inserted into a [`crate::dag::Dag`] as a
/// [`crate::dag::DagFunction`].
#[derive(Debug, Clone)]
pub struct Constraint {
    pub term: Term,
    pub image: Interval,
}

fn fold_unary(op: UnaryOp, t: &Term, f: impl Fn(f64) -> f64) -> Term {
    if let Some(x) = t.as_constant() {
        return Term::constant(f(x));
    }
    Term::new(TermKind::Unary(op, t.clone()))
}

fn fold_binary(op: BinaryOp, a: &Term, b: &Term, f: impl Fn(f64, f64) -> f64) -> Term {
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        return Term::constant(f(x, y));
    }
    Term::new(TermKind::Binary(op, a.clone(), b.clone()))
}

fn eval_unary(op: UnaryOp, x: Interval) -> Interval {
    match op {
        UnaryOp::Neg => x.neg(),
        UnaryOp::Abs => x.abs(),
        UnaryOp::Sgn => sign_interval(x),
        UnaryOp::Sqr => x.sqr(),
        UnaryOp::Sqrt => x.sqrt().unwrap_or(Interval::EMPTY),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Ln => x.ln(),
        UnaryOp::Sin => x.sin(),
        UnaryOp::Cos => x.cos(),
        UnaryOp::Tan => x.tan(),
    }
}

fn sign_interval(x: Interval) -> Interval {
    let set = x.sgn();
    let lo = if set.has_neg() { -1.0 } else if set.has_zero() { 0.0 } else { 1.0 };
    let hi = if set.has_pos() { 1.0 } else if set.has_zero() { 0.0 } else { -1.0 };
    Interval::new(lo, hi)
}

fn eval_binary(op: BinaryOp, x: Interval, y: Interval) -> Interval {
    match op {
        BinaryOp::Add => x.add(y),
        BinaryOp::Sub => x.sub(y),
        BinaryOp::Mul => x.mul(y),
        BinaryOp::Div => x.div(y),
        BinaryOp::Min => x.min(y),
        BinaryOp::Max => x.max(y),
    }
}

macro_rules! impl_binary_op {
    ($trait_:ident, $method:ident, $op:expr, $identity_absorb:expr) => {
        impl $trait_ for &Term {
            type Output = Term;
            fn $method(self, rhs: &Term) -> Term {
                $identity_absorb(self, rhs).unwrap_or_else(|| fold_binary($op, self, rhs, binary_fn($op)))
            }
        }

        impl $trait_ for Term {
            type Output = Term;
            fn $method(self, rhs: Term) -> Term {
                (&self).$method(&rhs)
            }
        }

        impl $trait_<&Term> for Term {
            type Output = Term;
            fn $method(self, rhs: &Term) -> Term {
                (&self).$method(rhs)
            }
        }

        impl $trait_<Term> for &Term {
            type Output = Term;
            fn $method(self, rhs: Term) -> Term {
                self.$method(&rhs)
            }
        }
    };
}

fn binary_fn(op: BinaryOp) -> fn(f64, f64) -> f64 {
    match op {
        BinaryOp::Add => |a, b| a + b,
        BinaryOp::Sub => |a, b| a - b,
        BinaryOp::Mul => |a, b| a * b,
        BinaryOp::Div => |a, b| a / b,
        BinaryOp::Min => f64::min,
        BinaryOp::Max => f64::max,
    }
}

fn add_identity(a: &Term, b: &Term) -> Option<Term> {
    if let Some(0.0) = a.as_constant() {
        return Some(b.clone());
    }
    if let Some(0.0) = b.as_constant() {
        return Some(a.clone());
    }
    None
}

fn no_identity(_a: &Term, _b: &Term) -> Option<Term> {
    None
}

fn mul_identity(a: &Term, b: &Term) -> Option<Term> {
    if let Some(x) = a.as_constant() {
        if x == 0.0 {
            return Some(Term::constant(0.0));
        }
        if x == 1.0 {
            return Some(b.clone());
        }
    }
    if let Some(y) = b.as_constant() {
        if y == 0.0 {
            return Some(Term::constant(0.0));
        }
        if y == 1.0 {
            return Some(a.clone());
        }
    }
    None
}

impl_binary_op!(Add, add, BinaryOp::Add, add_identity);
impl_binary_op!(Sub, sub, BinaryOp::Sub, no_identity);
impl_binary_op!(Mul, mul, BinaryOp::Mul, mul_identity);
impl_binary_op!(Div, div, BinaryOp::Div, no_identity);

impl Neg for &Term {
    type Output = Term;
    fn neg(self) -> Term {
        Term::neg(self)
    }
}

impl Neg for Term {
    type Output = Term;
    fn neg(self) -> Term {
        Term::neg(&self)
    }
}

/// Re-exposes the DAG-facing structural view of a term for the DAG builder
/// (`crate::dag::Dag::insert`), which walks this shape to hash-cons nodes.
pub(crate) enum TermView<'a> {
    Const(f64),
    Var(&'a Variable),
    Unary(UnaryOp, &'a Term),
    PowN(&'a Term, i32),
    Binary(BinaryOp, &'a Term, &'a Term),
}

impl Term {
    pub(crate) fn view(&self) -> TermView<'_> {
        match &self.0.kind {
            TermKind::Const(x) => TermView::Const(*x),
            TermKind::Var(v) => TermView::Var(v),
            TermKind::Unary(op, t) => TermView::Unary(*op, t),
            TermKind::PowN(t, n) => TermView::PowN(t, *n),
            TermKind::Binary(op, a, b) => TermView::Binary(*op, a, b),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Tolerance, VariableKind};

    fn var(name: &str) -> Variable {
        Variable::new(name, VariableKind::Real, Tolerance::default())
    }

    #[test]
    fn constant_folding_collapses_pure_constant_subtrees() {
        let t = Term::constant(2.0) + Term::constant(3.0);
        assert_eq!(t.as_constant(), Some(5.0));
    }

    #[test]
    fn additive_identity_is_rewritten_away() {
        let x = Term::var(var("x"));
        let t = &x + &Term::constant(0.0);
        assert!(matches!(t.view(), TermView::Var(_)));
    }

    #[test]
    fn multiplicative_identity_and_zero_are_rewritten() {
        let x = Term::var(var("x"));
        let one = &x * &Term::constant(1.0);
        assert!(matches!(one.view(), TermView::Var(_)));
        let zero = &x * &Term::constant(0.0);
        assert_eq!(zero.as_constant(), Some(0.0));
    }

    #[test]
    fn pow_small_exponents_rewrite_to_canonical_forms() {
        let x = Term::var(var("x"));
        assert_eq!(x.pow(0).unwrap().as_constant(), Some(1.0));
        assert!(matches!(x.pow(1).unwrap().view(), TermView::Var(_)));
        assert!(matches!(x.pow(2).unwrap().view(), TermView::Unary(UnaryOp::Sqr, _)));
    }

    #[test]
    fn division_by_zero_constant_is_rejected() {
        let x = Term::var(var("x"));
        let zero = Term::constant(0.0);
        assert!(x.div_checked(&zero).is_err());
    }

    #[test]
    fn free_scope_collects_each_variable_once() {
        let x = Term::var(var("x"));
        let t = (&x + &x) * &x;
        assert_eq!(t.free_scope().len(), 1);
    }

    #[test]
    fn is_linear_detects_affine_combinations() {
        let x = Term::var(var("x"));
        let y = Term::var(var("y"));
        let affine = &(&x * &Term::constant(2.0)) - &y;
        assert!(affine.is_linear());
        let quadratic = &x * &y;
        assert!(!quadratic.is_linear());
    }
}
