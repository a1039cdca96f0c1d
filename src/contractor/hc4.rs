//! HC4-revise as a [`Contractor`]: forward evaluation from the leaves to the
//! root, then reverse projection back down.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dag::{Dag, DagCache};
use crate::domain::Scope;
use crate::proof::Proof;
use crate::region::DomainBox;

use super::Contractor;

/// Wraps one DAG function. `cache` is scratch state reused across calls,
/// shared behind a `RefCell` since contractors are invoked through `&self`
/// but the cache is mutated on every contraction.
pub struct Hc4Contractor {
    dag: Rc<Dag>,
    function: usize,
    cache: RefCell<DagCache>,
}

impl Hc4Contractor {
    pub fn new(dag: Rc<Dag>, function: usize) -> Hc4Contractor {
        let cache = RefCell::new(DagCache::for_dag(&dag));
        Hc4Contractor { dag, function, cache }
    }
}

impl Contractor for Hc4Contractor {
    fn scope(&self) -> &Scope {
        &self.dag.function(self.function).scope
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof {
        let mut interval_box = box_.as_interval_box();
        let mut cache = self.cache.borrow_mut();
        let func = self.dag.function(self.function);
        let ok = self.dag.revise(func, &mut interval_box, &mut cache);
        if !ok {
            return Proof::Empty;
        }
        box_.absorb_interval_box(&interval_box);
        if box_.is_empty() {
            Proof::Empty
        } else {
            Proof::Maybe
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Tolerance, Variable, VariableKind};
    use crate::interval::Interval;
    use crate::region::DomainBox;
    use crate::term::Term;

    #[test]
    fn hc4_contracts_linear_equation() {
        let mut dag = Dag::new();
        let x = Term::var(Variable::new("x", VariableKind::Real, Tolerance::default()));
        let expr = x.clone() - Term::constant(1.0);
        let f = dag.insert(&expr, Interval::ZERO);
        let dag = Rc::new(dag);
        let scope = dag.scope().clone();
        let contractor = Hc4Contractor::new(Rc::clone(&dag), f);
        let mut box_ = DomainBox::new(
            scope.clone(),
            vec![crate::domain::Domain::Interval(Interval::new(-10.0, 10.0))],
        );
        let proof = contractor.contract(&mut box_);
        assert!(!proof.is_empty());
        assert_eq!(box_.domain(scope.get(0)).hull(), Interval::point(1.0));
    }
}
