//! Interval contractors: the operators that prune a [`DomainBox`] and return
//! a [`Proof`] certificate.

pub mod bc3;
pub mod bc4;
pub mod domain;
pub mod hc4;
pub mod newton;

use std::rc::Rc;

use crate::domain::{Scope, Variable};
use crate::proof::Proof;
use crate::region::DomainBox;
use crate::slice::Slicer;

/// An interval contractor is generally attached to a constraint. Given a
/// box, it removes infeasible facets and returns a proof certificate.
/// Never signals failure by exception: `Empty` is a value, not an error.
pub trait Contractor {
    fn scope(&self) -> &Scope;

    fn depends_on(&self, var: &Variable) -> bool {
        self.scope().contains(var)
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof;
}

/// Shared handle: the same contractor instance is reused across every box in
/// flight, parameterized only at construction.
pub type SharedContractor = Rc<dyn Contractor>;

/// Runs a fixed sequence of contractors in order, short-circuiting on the
/// first `Empty` and otherwise combining proofs via [`Proof::combine`].
pub struct ListContractor {
    scope: Scope,
    ops: Vec<SharedContractor>,
}

impl ListContractor {
    pub fn new(ops: Vec<SharedContractor>) -> ListContractor {
        let scope = ops
            .iter()
            .fold(Scope::new(), |acc, op| acc.union(op.scope()));
        ListContractor { scope, ops }
    }
}

impl Contractor for ListContractor {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof {
        let mut proof = Proof::Inner;
        for op in &self.ops {
            let certif = op.contract(box_);
            if certif.is_empty() {
                return Proof::Empty;
            }
            proof = proof.combine(certif);
        }
        proof
    }
}

/// Iterates an inner contractor to a fixed point: repeats while the box's
/// total width shrinks by more than `tol` (relative to the previous width),
/// stopping at `max_iter` regardless.
pub struct LoopContractor {
    op: SharedContractor,
    tol: f64,
    max_iter: usize,
}

impl LoopContractor {
    pub fn new(op: SharedContractor, tol: f64, max_iter: usize) -> LoopContractor {
        LoopContractor { op, tol, max_iter }
    }
}

impl Contractor for LoopContractor {
    fn scope(&self) -> &Scope {
        self.op.scope()
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof {
        let mut proof = Proof::Inner;
        let mut prev_width = box_.as_interval_box().total_width();
        for _ in 0..self.max_iter {
            let certif = self.op.contract(box_);
            if certif.is_empty() {
                return Proof::Empty;
            }
            proof = proof.combine(certif);
            let width = box_.as_interval_box().total_width();
            let reduction = if prev_width > 0.0 {
                (prev_width - width) / prev_width
            } else {
                0.0
            };
            prev_width = width;
            if reduction <= self.tol {
                break;
            }
        }
        proof
    }
}

/// Constructive Interval Disjunction: slices one variable's domain, applies
/// the inner contractor to each slice, and returns the hull of the slices
/// that survive.
pub struct CidContractor {
    op: SharedContractor,
    var: Variable,
    slicer: Box<dyn Slicer>,
    num_slices: usize,
}

impl CidContractor {
    pub fn new(
        op: SharedContractor,
        var: Variable,
        slicer: Box<dyn Slicer>,
        num_slices: usize,
    ) -> CidContractor {
        debug_assert!(op.scope().contains(&var));
        CidContractor {
            op,
            var,
            slicer,
            num_slices,
        }
    }
}

impl Contractor for CidContractor {
    fn scope(&self) -> &Scope {
        self.op.scope()
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof {
        slice_and_contract(&self.op, &self.var, self.slicer.as_ref(), self.num_slices, box_)
    }
}

/// The slice-contract-hull loop shared by [`CidContractor`] and
/// [`MaxCidContractor`]: slices `var`'s domain, contracts each slice with
/// `op`, and writes the hull of the surviving slices back into `box_`.
fn slice_and_contract(
    op: &SharedContractor,
    var: &Variable,
    slicer: &dyn Slicer,
    num_slices: usize,
    box_: &mut DomainBox,
) -> Proof {
    let slices = slicer.slice(box_.domain(var), num_slices, var.is_integer());
    if slices.len() <= 1 {
        return op.contract(box_);
    }

    let initial = box_.clone();
    let var_slot = initial.scope().slot_of(var).expect("variable not in scope");
    let mut proof = Proof::Empty;
    let mut hull: Option<DomainBox> = None;

    for slice in slices {
        let mut candidate = initial.clone();
        candidate.set_domain_slot(var_slot, slice);
        let certif = op.contract(&mut candidate);
        if certif.is_empty() {
            continue;
        }
        proof = if proof.is_empty() { certif } else { proof.combine(certif) };
        hull = Some(match hull {
            None => candidate,
            Some(mut acc) => {
                hull_boxes_onto(&mut acc, &candidate);
                acc
            }
        });
    }

    match hull {
        Some(merged) => {
            *box_ = merged;
            proof
        }
        None => Proof::Empty,
    }
}

fn hull_boxes_onto(acc: &mut DomainBox, other: &DomainBox) {
    for slot in 0..acc.scope().len() {
        let merged_hull = acc.domain_slot(slot).hull().hull(other.domain_slot(slot).hull());
        acc.set_domain_slot(slot, crate::domain::Domain::Interval(merged_hull));
    }
}

/// Picks the variable to slice dynamically via a
/// [`crate::select::VariableSelector`] before slicing, rather than slicing a
/// fixed variable as [`CidContractor`] does.
pub struct MaxCidContractor<S> {
    op: SharedContractor,
    selector: std::cell::RefCell<S>,
    slicer: Box<dyn Slicer>,
    num_slices: usize,
    dag: Rc<crate::dag::Dag>,
}

impl<S: crate::select::VariableSelector> MaxCidContractor<S> {
    pub fn new(
        op: SharedContractor,
        selector: S,
        slicer: Box<dyn Slicer>,
        num_slices: usize,
        dag: Rc<crate::dag::Dag>,
    ) -> MaxCidContractor<S> {
        MaxCidContractor {
            op,
            selector: std::cell::RefCell::new(selector),
            slicer,
            num_slices,
            dag,
        }
    }
}

impl<S: crate::select::VariableSelector> Contractor for MaxCidContractor<S> {
    fn scope(&self) -> &Scope {
        self.op.scope()
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof {
        let mut cache = crate::dag::DagCache::for_dag(&self.dag);
        let selected = self.selector.borrow_mut().select(box_, &self.dag, &mut cache);
        match selected {
            Some(var) if self.op.scope().contains(&var) => {
                slice_and_contract(&self.op, &var, self.slicer.as_ref(), self.num_slices, box_)
            }
            _ => Proof::Maybe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Tolerance, VariableKind};
    use crate::interval::Interval;

    struct AlwaysMaybe(Scope);
    impl Contractor for AlwaysMaybe {
        fn scope(&self) -> &Scope {
            &self.0
        }
        fn contract(&self, _box_: &mut DomainBox) -> Proof {
            Proof::Maybe
        }
    }

    struct Reject(Scope);
    impl Contractor for Reject {
        fn scope(&self) -> &Scope {
            &self.0
        }
        fn contract(&self, _box_: &mut DomainBox) -> Proof {
            Proof::Empty
        }
    }

    fn var(name: &str) -> Variable {
        Variable::new(name, VariableKind::Real, Tolerance::default())
    }

    #[test]
    fn list_contractor_short_circuits_on_empty() {
        let x = var("x");
        let scope = Scope::from_vars([x.clone()]);
        let ops: Vec<SharedContractor> = vec![
            Rc::new(AlwaysMaybe(scope.clone())),
            Rc::new(Reject(scope.clone())),
        ];
        let list = ListContractor::new(ops);
        let mut box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(0.0, 1.0))]);
        assert_eq!(list.contract(&mut box_), Proof::Empty);
    }

    #[test]
    fn list_contractor_combines_non_empty_proofs() {
        let x = var("x");
        let scope = Scope::from_vars([x.clone()]);
        let ops: Vec<SharedContractor> = vec![Rc::new(AlwaysMaybe(scope.clone()))];
        let list = ListContractor::new(ops);
        let mut box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(0.0, 1.0))]);
        assert_eq!(list.contract(&mut box_), Proof::Maybe);
    }
}
