//! BC4: HC4 over the whole function, then BC3 on every variable the
//! function reads more than once. Composition order: HC4 first, then one
//! BC3 pass per multi-occurrence variable, proofs combined via
//! `Proof::combine`, short-circuiting on `Empty`.

use std::rc::Rc;

use crate::dag::Dag;
use crate::domain::Scope;
use crate::proof::Proof;
use crate::region::DomainBox;

use super::bc3::{Bc3Contractor, Bc3Options};
use super::hc4::Hc4Contractor;
use super::Contractor;

/// Composes one [`Hc4Contractor`] with one [`Bc3Contractor`] per
/// multi-occurrence variable of `function` (detected once, at construction,
/// by [`Dag::multi_occurrence_vars`] — the DAG is immutable after
/// construction so this set never changes across calls).
pub struct Bc4Contractor {
    hc4: Hc4Contractor,
    bc3s: Vec<Bc3Contractor>,
    scope: Scope,
}

impl Bc4Contractor {
    pub fn new(dag: Rc<Dag>, function: usize, bc3_options: Bc3Options) -> Bc4Contractor {
        let multi = dag.multi_occurrence_vars(dag.function(function));
        let bc3s = multi
            .into_iter()
            .map(|v| Bc3Contractor::new(Rc::clone(&dag), function, v, bc3_options))
            .collect();
        let scope = dag.function(function).scope.clone();
        let hc4 = Hc4Contractor::new(dag, function);
        Bc4Contractor { hc4, bc3s, scope }
    }
}

impl Contractor for Bc4Contractor {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof {
        let mut proof = self.hc4.contract(box_);
        if proof.is_empty() {
            return Proof::Empty;
        }
        for bc3 in &self.bc3s {
            let certif = bc3.contract(box_);
            if certif.is_empty() {
                return Proof::Empty;
            }
            proof = proof.combine(certif);
        }
        proof
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Tolerance, Variable, VariableKind};
    use crate::interval::Interval;
    use crate::term::Term;

    fn var(name: &str) -> Variable {
        Variable::new(name, VariableKind::Real, Tolerance::default())
    }

    #[test]
    fn bc4_runs_bc3_on_multi_occurrence_variable() {
        // f(x) = x*x - x has x occurring twice; BC4 should contract past
        // what HC4 alone manages on a box straddling both roots.
        let mut dag = Dag::new();
        let x = var("x");
        let tx = Term::var(x.clone());
        let expr = &tx * &tx - &tx;
        let f = dag.insert(&expr, Interval::ZERO);
        let dag = Rc::new(dag);
        let scope = dag.scope().clone();
        let contractor = Bc4Contractor::new(Rc::clone(&dag), f, Bc3Options::default());
        let mut box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(0.5, 2.0))]);
        let proof = contractor.contract(&mut box_);
        assert!(!proof.is_empty());
        let hull = box_.domain(&x).hull();
        assert!(hull.lo() >= 0.5 && hull.hi() <= 2.0);
    }

    #[test]
    fn bc4_detects_infeasibility_at_hc4_stage() {
        let mut dag = Dag::new();
        let x = var("x");
        let f = dag.insert(&Term::var(x.clone()), Interval::point(10.0));
        let dag = Rc::new(dag);
        let scope = dag.scope().clone();
        let contractor = Bc4Contractor::new(Rc::clone(&dag), f, Bc3Options::default());
        let mut box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(0.0, 1.0))]);
        assert!(contractor.contract(&mut box_).is_empty());
    }
}
