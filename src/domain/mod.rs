//! Variables, their domains, and the scopes that give boxes a stable slot
//! order.
//!
//! Identity here is structural, not positional: a [`Variable`] is a cheap
//! handle (`Rc` to an immutable record plus an incrementing id), compared by
//! id, never by name or domain.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::interval::Interval;

/// What kind of numbers a variable ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Real,
    Integer,
}

/// Precision below which a domain is considered "precise enough" to stop
/// splitting on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    Absolute(f64),
    Relative(f64),
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Absolute(1e-8)
    }
}

impl Tolerance {
    /// True when `width(dom) <= abs_tol` or `width(dom)/|dom| <= rel_tol`.
    pub fn is_precise_enough(self, dom: Interval) -> bool {
        if dom.is_empty() {
            return true;
        }
        let width = dom.width();
        match self {
            Tolerance::Absolute(tol) => width <= tol,
            Tolerance::Relative(tol) => {
                let scale = dom.lo().abs().max(dom.hi().abs()).max(1.0);
                width / scale <= tol
            }
        }
    }
}

struct VariableRep {
    id: usize,
    name: String,
    kind: VariableKind,
    tolerance: Tolerance,
}

/// A handle to an immutable variable record. Two handles are equal iff they
/// share the same id, regardless of name or domain.
#[derive(Clone)]
pub struct Variable(Rc<VariableRep>);

thread_local! {
    static NEXT_ID: Cell<usize> = const { Cell::new(0) };
}

impl Variable {
    fn fresh_id() -> usize {
        NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        })
    }

    pub fn new(name: impl Into<String>, kind: VariableKind, tolerance: Tolerance) -> Variable {
        Variable(Rc::new(VariableRep {
            id: Self::fresh_id(),
            name: name.into(),
            kind,
            tolerance,
        }))
    }

    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> VariableKind {
        self.0.kind
    }

    pub fn tolerance(&self) -> Tolerance {
        self.0.tolerance
    }

    pub fn is_integer(&self) -> bool {
        self.0.kind == VariableKind::Integer
    }

    pub fn is_real(&self) -> bool {
        self.0.kind == VariableKind::Real
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.0.name, self.0.id)
    }
}

/// Sum type over the ways a variable's domain can be declared.
/// `Interval` covers plain real/integer ranges; `Disconnected` covers
/// a finite union of intervals (e.g. an integer range with holes removed by
/// preprocessing); `Single` is a fixed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    Interval(Interval),
    Disconnected(Vec<Interval>),
    Single(f64),
}

impl Domain {
    pub fn hull(&self) -> Interval {
        match self {
            Domain::Interval(i) => *i,
            Domain::Disconnected(parts) => parts
                .iter()
                .fold(Interval::EMPTY, |acc, i| acc.hull(*i)),
            Domain::Single(x) => Interval::point(*x),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Domain::Interval(i) => i.is_empty(),
            Domain::Disconnected(parts) => parts.iter().all(|i| i.is_empty()),
            Domain::Single(x) => x.is_nan(),
        }
    }

    pub fn is_canonical(&self) -> bool {
        match self {
            Domain::Interval(i) => i.is_canonical(),
            Domain::Disconnected(parts) => parts.iter().all(|i| i.is_canonical()),
            Domain::Single(_) => true,
        }
    }

    /// Contracts this domain by intersecting every component with `x`,
    /// dropping components that become empty. Disconnected domains expose
    /// this as their explicit contractor, hulling with the initial set.
    pub fn contract(&self, x: Interval) -> Domain {
        match self {
            Domain::Interval(i) => Domain::Interval(i.intersect(x)),
            Domain::Disconnected(parts) => {
                let kept: Vec<Interval> = parts
                    .iter()
                    .map(|i| i.intersect(x))
                    .filter(|i| !i.is_empty())
                    .collect();
                Domain::Disconnected(kept)
            }
            Domain::Single(v) => {
                if x.contains(*v) {
                    Domain::Single(*v)
                } else {
                    Domain::Single(f64::NAN)
                }
            }
        }
    }
}

/// An ordered set of variables giving boxes a stable slot index.
///
/// Membership is O(1) via a hash map from variable id to slot; the slot
/// order itself is the insertion order, giving O(1) slot lookup too (a
/// sorted-vec implementation would also satisfy a logarithmic lookup bound
/// but gives up O(1) membership for no benefit here).
#[derive(Clone, Debug, Default)]
pub struct Scope {
    vars: Vec<Variable>,
    index: HashMap<usize, usize>,
}

impl Scope {
    pub fn new() -> Scope {
        Scope::default()
    }

    pub fn from_vars(vars: impl IntoIterator<Item = Variable>) -> Scope {
        let mut scope = Scope::new();
        for v in vars {
            scope.insert(v);
        }
        scope
    }

    /// Inserts `var` if not already present; returns its slot.
    pub fn insert(&mut self, var: Variable) -> usize {
        if let Some(&slot) = self.index.get(&var.id()) {
            return slot;
        }
        let slot = self.vars.len();
        self.index.insert(var.id(), slot);
        self.vars.push(var);
        slot
    }

    pub fn contains(&self, var: &Variable) -> bool {
        self.index.contains_key(&var.id())
    }

    pub fn slot_of(&self, var: &Variable) -> Option<usize> {
        self.index.get(&var.id()).copied()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    pub fn get(&self, slot: usize) -> &Variable {
        &self.vars[slot]
    }

    /// Union of two scopes, preserving `self`'s order followed by any
    /// variables of `other` not already present.
    pub fn union(&self, other: &Scope) -> Scope {
        let mut merged = self.clone();
        for v in other.iter() {
            merged.insert(v.clone());
        }
        merged
    }

    /// True iff every variable of `other` is present in `self`.
    pub fn is_superset_of(&self, other: &Scope) -> bool {
        other.iter().all(|v| self.contains(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Variable {
        Variable::new(name, VariableKind::Real, Tolerance::default())
    }

    #[test]
    fn variables_are_distinct_even_with_same_name() {
        let a = var("x");
        let b = var("x");
        assert_ne!(a, b);
    }

    #[test]
    fn cloned_handle_is_equal() {
        let a = var("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn scope_preserves_insertion_order_and_dedups() {
        let x = var("x");
        let y = var("y");
        let mut scope = Scope::new();
        scope.insert(x.clone());
        scope.insert(y.clone());
        scope.insert(x.clone());
        assert_eq!(scope.len(), 2);
        assert_eq!(scope.slot_of(&x), Some(0));
        assert_eq!(scope.slot_of(&y), Some(1));
    }

    #[test]
    fn disconnected_domain_drops_empty_components_on_contract() {
        let dom = Domain::Disconnected(vec![
            Interval::new(0.0, 1.0),
            Interval::new(5.0, 6.0),
        ]);
        let contracted = dom.contract(Interval::new(0.5, 5.5));
        match contracted {
            Domain::Disconnected(parts) => assert_eq!(parts.len(), 1),
            _ => panic!("expected disconnected domain"),
        }
    }

    #[test]
    fn tolerance_relative_scales_with_magnitude() {
        let tol = Tolerance::Relative(1e-3);
        assert!(tol.is_precise_enough(Interval::new(1000.0, 1000.5)));
        assert!(!tol.is_precise_enough(Interval::new(0.0, 1.0)));
    }
}
