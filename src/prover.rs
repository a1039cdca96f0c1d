//! Post-contraction classification of a search node's box: inner-region
//! detection and inflation+Newton certification of a `Maybe` proof up to
//! `Feasible`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::contractor::newton::{Inflator, IntervalNewton};
use crate::dag::{Dag, DagCache};
use crate::domain::Scope;
use crate::proof::Proof;
use crate::region::DomainBox;

/// Bounds the inflation+Newton certification loop.
#[derive(Debug, Clone, Copy)]
pub struct ProverOptions {
    pub max_iter: usize,
}

impl Default for ProverOptions {
    fn default() -> Self {
        ProverOptions { max_iter: 8 }
    }
}

/// Certifies candidate solution boxes against a square subsystem of
/// equations and classifies boxes as inner regions against the full
/// constraint set.
pub struct Prover {
    dag: Rc<Dag>,
    newton: Option<IntervalNewton>,
    inflator: Inflator,
    cache: RefCell<DagCache>,
    options: ProverOptions,
}

impl Prover {
    /// `equations` must be a square subsystem (as many equation functions as
    /// `scope` has variables) or `None` if the problem has no equations to
    /// certify existence against — in that case `certify` never upgrades a
    /// proof past `Maybe`.
    pub fn new(
        dag: Rc<Dag>,
        equations: Option<(Vec<usize>, Scope)>,
        inflator: Inflator,
        options: ProverOptions,
    ) -> Prover {
        let cache = RefCell::new(DagCache::for_dag(&dag));
        let newton = equations.map(|(functions, scope)| {
            IntervalNewton::new(Rc::clone(&dag), functions, scope, Default::default())
        });
        Prover { dag, newton, inflator, cache, options }
    }

    /// Runs inflation+Newton up to `max_iter` times against `box_`. Returns
    /// `Proof::Feasible` on strict inclusion, `Proof::Empty` if a step
    /// proves infeasibility, and `Proof::Maybe` unchanged otherwise.
    pub fn certify(&self, box_: &DomainBox) -> Proof {
        let Some(newton) = &self.newton else {
            return Proof::Maybe;
        };
        let full = box_.as_interval_box();
        let restricted = full.restrict(newton.scope());
        let mut cache = self.cache.borrow_mut();
        for _ in 0..self.options.max_iter {
            let proof = self.inflator.certify(newton, &restricted, &mut cache);
            if proof.is_empty() {
                return Proof::Empty;
            }
            if proof == Proof::Feasible {
                return Proof::Feasible;
            }
        }
        Proof::Maybe
    }

    /// A box is an inner region iff every one of `functions`' residuals is
    /// certainly contained in its declared image on `box_` — no
    /// approximation or certification needed, just a direct evaluation.
    /// Inner-region classification is kept separate from Newton
    /// certification: it needs no equation subsystem at all.
    pub fn is_inner_region(&self, functions: &[usize], box_: &DomainBox) -> bool {
        let interval_box = box_.as_interval_box();
        let mut cache = self.cache.borrow_mut();
        functions.iter().all(|&idx| {
            let func = self.dag.function(idx);
            self.dag.eval(func, &interval_box, &mut cache);
            cache.value(func.root).is_subset_of(func.image)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contractor::newton::InflationOptions;
    use crate::domain::{Domain, Tolerance, Variable, VariableKind};
    use crate::interval::Interval;
    use crate::term::Term;

    fn var(name: &str) -> Variable {
        Variable::new(name, VariableKind::Real, Tolerance::default())
    }

    #[test]
    fn certify_upgrades_a_tight_box_to_feasible() {
        let mut dag = Dag::new();
        let x = var("x");
        let expr = Term::var(x.clone()).sqr() - Term::constant(2.0);
        let f = dag.insert(&expr, Interval::ZERO);
        let scope = dag.scope().clone();
        let dag = Rc::new(dag);
        let prover = Prover::new(
            Rc::clone(&dag),
            Some((vec![f], scope.clone())),
            Inflator::new(InflationOptions::default()),
            ProverOptions::default(),
        );
        let box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(1.3, 1.5))]);
        assert_eq!(prover.certify(&box_), Proof::Feasible);
    }

    #[test]
    fn is_inner_region_true_when_residual_strictly_inside_image() {
        let mut dag = Dag::new();
        let x = var("x");
        let f = dag.insert(&Term::var(x.clone()), Interval::new(0.0, 10.0));
        let scope = dag.scope().clone();
        let dag = Rc::new(dag);
        let prover = Prover::new(Rc::clone(&dag), None, Inflator::new(InflationOptions::default()), ProverOptions::default());
        let box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(2.0, 3.0))]);
        assert!(prover.is_inner_region(&[f], &box_));
    }

    #[test]
    fn is_inner_region_false_when_box_straddles_boundary() {
        let mut dag = Dag::new();
        let x = var("x");
        let f = dag.insert(&Term::var(x.clone()), Interval::new(0.0, 10.0));
        let scope = dag.scope().clone();
        let dag = Rc::new(dag);
        let prover = Prover::new(Rc::clone(&dag), None, Inflator::new(InflationOptions::default()), ProverOptions::default());
        let box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(9.0, 11.0))]);
        assert!(!prover.is_inner_region(&[f], &box_));
    }

    #[test]
    fn certify_without_equations_never_upgrades_past_maybe() {
        let mut dag = Dag::new();
        let x = var("x");
        dag.insert(&Term::var(x.clone()), Interval::new(0.0, 10.0));
        let scope = dag.scope().clone();
        let dag = Rc::new(dag);
        let prover = Prover::new(Rc::clone(&dag), None, Inflator::new(InflationOptions::default()), ProverOptions::default());
        let box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(2.0, 3.0))]);
        assert_eq!(prover.certify(&box_), Proof::Maybe);
    }
}
