//! Boxes: the mutable state contractors prune and search nodes own.
//!
//! [`IntervalBox`] is the lightweight `scope -> Interval` variant the DAG
//! and contractors operate on directly. [`DomainBox`] is the full
//! `scope -> Domain` variant that additionally tracks integer/disconnected
//! domains; it projects down to an `IntervalBox` for every interval-kernel
//! operation and re-absorbs the contracted interval afterward. This is the
//! canonical (newer) Box form: a Scope together with a sum-typed Domain per
//! slot, superseding an older bare-interval-region representation.

use crate::domain::{Domain, Scope, Variable};
use crate::interval::Interval;

/// Mapping `scope -> Interval`, mutated in place during contraction.
/// Cloned (deep copy of the interval vector) on search branching.
#[derive(Debug, Clone)]
pub struct IntervalBox {
    scope: Scope,
    values: Vec<Interval>,
}

impl IntervalBox {
    pub fn new(scope: Scope) -> IntervalBox {
        let values = vec![Interval::UNIVERSE; scope.len()];
        IntervalBox { scope, values }
    }

    pub fn from_values(scope: Scope, values: Vec<Interval>) -> IntervalBox {
        debug_assert_eq!(scope.len(), values.len());
        IntervalBox { scope, values }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn get(&self, var: &Variable) -> Interval {
        match self.scope.slot_of(var) {
            Some(slot) => self.values[slot],
            None => Interval::UNIVERSE,
        }
    }

    pub fn get_slot(&self, slot: usize) -> Interval {
        self.values[slot]
    }

    pub fn set(&mut self, var: &Variable, value: Interval) {
        if let Some(slot) = self.scope.slot_of(var) {
            self.values[slot] = value;
        }
    }

    pub fn set_slot(&mut self, slot: usize, value: Interval) {
        self.values[slot] = value;
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().any(|v| v.is_empty())
    }

    /// Total width across every slot — a simple, cheap measure used by the
    /// loop contractor's reduction-threshold check.
    pub fn total_width(&self) -> f64 {
        self.values.iter().map(|v| v.width()).sum()
    }

    pub fn widths(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().map(|v| v.width())
    }

    /// Restricted copy over `subscope`'s variables, used to pass only the
    /// relevant slots to a contractor that depends on a subset of the box.
    pub fn restrict(&self, subscope: &Scope) -> IntervalBox {
        let values = subscope.iter().map(|v| self.get(v)).collect();
        IntervalBox::from_values(subscope.clone(), values)
    }

    /// Writes every slot of `other` (whose scope must be a subset of
    /// `self`'s) back into `self`.
    pub fn absorb(&mut self, other: &IntervalBox) {
        for v in other.scope.iter() {
            self.set(v, other.get(v));
        }
    }
}

/// Mapping `scope -> Domain`, the full per-variable state (interval,
/// integer-range, or disconnected union) that search nodes own.
#[derive(Debug, Clone)]
pub struct DomainBox {
    scope: Scope,
    domains: Vec<Domain>,
}

impl DomainBox {
    pub fn new(scope: Scope, domains: Vec<Domain>) -> DomainBox {
        debug_assert_eq!(scope.len(), domains.len());
        DomainBox { scope, domains }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn domain(&self, var: &Variable) -> &Domain {
        &self.domains[self.scope.slot_of(var).expect("variable not in box scope")]
    }

    pub fn domain_mut(&mut self, var: &Variable) -> &mut Domain {
        let slot = self.scope.slot_of(var).expect("variable not in box scope");
        &mut self.domains[slot]
    }

    pub fn domain_slot(&self, slot: usize) -> &Domain {
        &self.domains[slot]
    }

    pub fn set_domain_slot(&mut self, slot: usize, domain: Domain) {
        self.domains[slot] = domain;
    }

    pub fn is_empty(&self) -> bool {
        self.domains.iter().any(|d| d.is_empty())
    }

    /// The lightweight `IntervalBox` view contractors operate on: each
    /// domain collapses to its hull.
    pub fn as_interval_box(&self) -> IntervalBox {
        let values = self.domains.iter().map(|d| d.hull()).collect();
        IntervalBox::from_values(self.scope.clone(), values)
    }

    /// Re-absorbs a contracted `IntervalBox` (same scope) by intersecting
    /// each domain's components with the refined interval.
    pub fn absorb_interval_box(&mut self, refined: &IntervalBox) {
        for slot in 0..self.scope.len() {
            let contracted = self.domains[slot].contract(refined.get_slot(slot));
            self.domains[slot] = contracted;
        }
    }

    /// Deep clone for search branching.
    pub fn branch_clone(&self) -> DomainBox {
        self.clone()
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
    fn interval_box_round_trips_through_get_set() {
        let x = var("x");
        let scope = Scope::from_vars([x.clone()]);
        let mut box_ = IntervalBox::new(scope);
        box_.set(&x, Interval::new(1.0, 2.0));
        assert_eq!(box_.get(&x), Interval::new(1.0, 2.0));
    }

    #[test]
    fn domain_box_absorbs_contracted_interval_box() {
        let x = var("x");
        let scope = Scope::from_vars([x.clone()]);
        let mut domain_box = DomainBox::new(scope.clone(), vec![Domain::Interval(Interval::new(0.0, 10.0))]);
        let mut refined = domain_box.as_interval_box();
        refined.set(&x, Interval::new(2.0, 3.0));
        domain_box.absorb_interval_box(&refined);
        assert_eq!(domain_box.domain(&x).hull(), Interval::new(2.0, 3.0));
    }

    #[test]
    fn empty_domain_after_absorb_is_detected() {
        let x = var("x");
        let scope = Scope::from_vars([x.clone()]);
        let mut domain_box = DomainBox::new(scope.clone(), vec![Domain::Interval(Interval::new(0.0, 1.0))]);
        let mut refined = domain_box.as_interval_box();
        refined.set(&x, Interval::EMPTY);
        domain_box.absorb_interval_box(&refined);
        assert!(domain_box.is_empty());
    }
}
