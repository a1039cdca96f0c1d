//! Contractors tied directly to a variable's declared domain rather than
//! to a DAG function: rounding to the integer hull, and re-hulling a
//! disconnected/initial domain back in after other contractors have only
//! narrowed the interval view.

use crate::domain::{Domain, Scope, Variable};
use crate::proof::Proof;
use crate::region::DomainBox;

use super::Contractor;

/// Rounds an integer variable's current domain to its integer hull,
/// reporting `Empty` when no integer remains.
pub struct IntContractor {
    scope: Scope,
}

impl IntContractor {
    pub fn new(var: Variable) -> IntContractor {
        debug_assert!(var.is_integer(), "IntContractor requires an integer variable");
        IntContractor { scope: Scope::from_vars([var]) }
    }
}

impl Contractor for IntContractor {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof {
        let var = self.scope.get(0);
        let slot = box_.scope().slot_of(var).expect("variable not in box scope");
        let hull = box_.domain_slot(slot).hull().integer_hull();
        if hull.is_empty() {
            return Proof::Empty;
        }
        box_.set_domain_slot(slot, Domain::Interval(hull));
        Proof::Maybe
    }
}

/// Re-intersects a variable's current interval with its originally declared
/// domain (a disconnected union or a fixed range), undoing any contraction
/// that strayed outside the declared set. Other contractors operate on the
/// hull alone and can otherwise widen a disconnected domain back into a
/// single interval spanning its gaps.
pub struct DomainContractor {
    scope: Scope,
    initial: Domain,
}

impl DomainContractor {
    pub fn new(var: Variable, initial: Domain) -> DomainContractor {
        DomainContractor { scope: Scope::from_vars([var]), initial }
    }
}

impl Contractor for DomainContractor {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof {
        let var = self.scope.get(0);
        let slot = box_.scope().slot_of(var).expect("variable not in box scope");
        let hull = box_.domain_slot(slot).hull();
        let contracted = self.initial.contract(hull);
        if contracted.is_empty() {
            return Proof::Empty;
        }
        box_.set_domain_slot(slot, contracted);
        Proof::Maybe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Tolerance, VariableKind};
    use crate::interval::Interval;

    fn int_var(name: &str) -> Variable {
        Variable::new(name, VariableKind::Integer, Tolerance::default())
    }

    fn real_var(name: &str) -> Variable {
        Variable::new(name, VariableKind::Real, Tolerance::default())
    }

    #[test]
    fn int_contractor_rounds_to_integer_hull() {
        let x = int_var("x");
        let scope = Scope::from_vars([x.clone()]);
        let mut box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(1.2, 3.8))]);
        let contractor = IntContractor::new(x.clone());
        let proof = contractor.contract(&mut box_);
        assert!(!proof.is_empty());
        assert_eq!(box_.domain(&x).hull(), Interval::new(2.0, 3.0));
    }

    #[test]
    fn int_contractor_detects_empty_integer_hull() {
        let x = int_var("x");
        let scope = Scope::from_vars([x.clone()]);
        let mut box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(1.2, 1.8))]);
        let contractor = IntContractor::new(x.clone());
        assert!(contractor.contract(&mut box_).is_empty());
    }

    #[test]
    fn domain_contractor_re_hulls_disconnected_initial_domain() {
        let x = real_var("x");
        let scope = Scope::from_vars([x.clone()]);
        let initial = Domain::Disconnected(vec![
            Interval::new(0.0, 1.0),
            Interval::new(5.0, 6.0),
        ]);
        let mut box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(0.5, 5.5))]);
        let contractor = DomainContractor::new(x.clone(), initial);
        let proof = contractor.contract(&mut box_);
        assert!(!proof.is_empty());
        match box_.domain(&x) {
            Domain::Disconnected(parts) => assert_eq!(parts.len(), 1),
            other => panic!("expected disconnected domain, got {other:?}"),
        }
    }
}
