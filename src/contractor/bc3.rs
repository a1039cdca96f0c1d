//! Box consistency (BC3): tightens one variable's domain against one DAG
//! function by peeling infeasible slivers from each end, then sharpening
//! with a univariate interval Newton step.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dag::{Dag, DagCache};
use crate::domain::{Scope, Variable};
use crate::interval::Interval;
use crate::proof::Proof;
use crate::region::{DomainBox, IntervalBox};

use super::Contractor;

/// `peel_factor` is the relative width of each probed sliver at an
/// endpoint; `max_iter` bounds both the peeling loop and the outer
/// peel/Newton fixed-point loop.
#[derive(Debug, Clone, Copy)]
pub struct Bc3Options {
    pub peel_factor: f64,
    pub max_iter: usize,
}

impl Default for Bc3Options {
    fn default() -> Self {
        Bc3Options { peel_factor: 0.1, max_iter: 30 }
    }
}

/// Box-consistency on one variable inside one function. Unlike
/// [`super::hc4::Hc4Contractor`], which projects through every operator in
/// the expression tree, BC3 treats the whole function as a single
/// univariate thick function of `var` and narrows `var`'s domain directly
/// against it — sharper when `var` occurs more than once in the
/// expression, at the cost of re-evaluating the function at each probe.
pub struct Bc3Contractor {
    dag: Rc<Dag>,
    function: usize,
    var: Variable,
    cache: RefCell<DagCache>,
    options: Bc3Options,
}

impl Bc3Contractor {
    pub fn new(dag: Rc<Dag>, function: usize, var: Variable, options: Bc3Options) -> Bc3Contractor {
        let cache = RefCell::new(DagCache::for_dag(&dag));
        Bc3Contractor { dag, function, var, cache, options }
    }

    fn dag_slot(&self) -> usize {
        self.dag
            .scope()
            .slot_of(&self.var)
            .expect("BC3 variable not present in the dag")
    }

    fn eval_at(&self, box_: &IntervalBox, at: Interval, cache: &mut DagCache) -> Interval {
        let mut probe = box_.clone();
        probe.set(&self.var, at);
        let func = self.dag.function(self.function);
        self.dag.eval_only(func, self.dag_slot(), &probe, cache);
        cache.value(func.root)
    }

    fn is_feasible_at(&self, box_: &IntervalBox, at: Interval, cache: &mut DagCache) -> bool {
        let image = self.dag.function(self.function).image;
        !self.eval_at(box_, at, cache).intersect(image).is_empty()
    }

    /// Peels infeasible slivers from the left end of `domain`, stopping at
    /// the first probe that is possibly feasible.
    fn peel_left(&self, box_: &IntervalBox, domain: Interval, cache: &mut DagCache) -> Interval {
        let mut lo = domain.lo();
        let hi = domain.hi();
        let step = domain.width() * self.options.peel_factor;
        if !(step > 0.0) {
            return domain;
        }
        for _ in 0..self.options.max_iter {
            if hi - lo <= step {
                break;
            }
            let slice = Interval::new(lo, lo + step);
            if self.is_feasible_at(box_, slice, cache) {
                break;
            }
            lo += step;
        }
        Interval::new(lo, hi)
    }

    fn peel_right(&self, box_: &IntervalBox, domain: Interval, cache: &mut DagCache) -> Interval {
        let lo = domain.lo();
        let mut hi = domain.hi();
        let step = domain.width() * self.options.peel_factor;
        if !(step > 0.0) {
            return domain;
        }
        for _ in 0..self.options.max_iter {
            if hi - lo <= step {
                break;
            }
            let slice = Interval::new(hi - step, hi);
            if self.is_feasible_at(box_, slice, cache) {
                break;
            }
            hi -= step;
        }
        Interval::new(lo, hi)
    }

    /// One univariate interval-Newton step against the midpoint residual:
    /// `domain' = mid - f(mid) / df/dvar(domain)`, intersected with
    /// `domain`. A derivative straddling zero carries no information and
    /// leaves `domain` untouched.
    fn newton_refine(&self, box_: &IntervalBox, domain: Interval, cache: &mut DagCache) -> Interval {
        let func = self.dag.function(self.function);
        let target = func.image.mid();
        let mid = domain.mid();

        let mut at_mid = box_.clone();
        at_mid.set(&self.var, Interval::point(mid));
        self.dag.eval(func, &at_mid, cache);
        let f_mid = cache.value(func.root).mid() - target;

        let mut at_domain = box_.clone();
        at_domain.set(&self.var, domain);
        self.dag.eval(func, &at_domain, cache);
        self.dag.differentiate(func, cache);
        let var_scope = Scope::from_vars([self.var.clone()]);
        let deriv = self.dag.jacobian_row(func, &var_scope, cache)[0];

        if deriv.is_empty() || (deriv.lo() <= 0.0 && deriv.hi() >= 0.0) {
            return domain;
        }
        let step = Interval::point(mid).sub(Interval::point(f_mid).div(deriv));
        step.intersect(domain)
    }
}

impl Contractor for Bc3Contractor {
    fn scope(&self) -> &Scope {
        &self.dag.function(self.function).scope
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof {
        let mut interval_box = box_.as_interval_box();
        let mut cache = self.cache.borrow_mut();
        let mut domain = interval_box.get(&self.var);

        for _ in 0..self.options.max_iter {
            let prev_width = domain.width();
            domain = self.peel_left(&interval_box, domain, &mut cache);
            if domain.is_empty() {
                return Proof::Empty;
            }
            domain = self.peel_right(&interval_box, domain, &mut cache);
            if domain.is_empty() {
                return Proof::Empty;
            }
            domain = self.newton_refine(&interval_box, domain, &mut cache);
            if domain.is_empty() {
                return Proof::Empty;
            }
            let reduction = if prev_width > 0.0 {
                (prev_width - domain.width()) / prev_width
            } else {
                0.0
            };
            if reduction <= 1e-3 {
                break;
            }
        }

        interval_box.set(&self.var, domain);
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
    use crate::domain::{Domain, Tolerance, VariableKind};
    use crate::term::Term;

    fn var(name: &str) -> Variable {
        Variable::new(name, VariableKind::Real, Tolerance::default())
    }

    #[test]
    fn bc3_contracts_multi_occurrence_quadratic() {
        // f(x) = x*x - x, root at x=0 and x=1; a box of [-1, 2] should
        // contract toward the two roots without collapsing past them.
        let mut dag = Dag::new();
        let x = var("x");
        let tx = Term::var(x.clone());
        let expr = &tx * &tx - &tx;
        let f = dag.insert(&expr, Interval::ZERO);
        let dag = Rc::new(dag);
        let scope = dag.scope().clone();
        let contractor = Bc3Contractor::new(Rc::clone(&dag), f, x.clone(), Bc3Options::default());
        let mut box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(-1.0, 2.0))]);
        let proof = contractor.contract(&mut box_);
        assert!(!proof.is_empty());
        let hull = box_.domain(&x).hull();
        assert!(hull.lo() >= -1.0 && hull.hi() <= 2.0);
    }

    #[test]
    fn bc3_detects_infeasible_box() {
        let mut dag = Dag::new();
        let x = var("x");
        let tx = Term::var(x.clone());
        let f = dag.insert(&tx.clone(), Interval::point(10.0));
        let dag = Rc::new(dag);
        let scope = dag.scope().clone();
        let contractor = Bc3Contractor::new(Rc::clone(&dag), f, x.clone(), Bc3Options::default());
        let mut box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(0.0, 1.0))]);
        assert!(contractor.contract(&mut box_).is_empty());
    }
}
