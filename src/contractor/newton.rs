//! Interval Newton / preconditioned Gauss-Seidel existence certification,
//! plus the inflation wrapper that promotes a `Maybe` proof to `Feasible`.
//!
//! Builds the midpoint system and the interval Jacobian, preconditions by
//! the real midpoint-Jacobian inverse, then refines with one Gauss-Seidel
//! sweep per variable. Inflation around the midpoint uses a `delta`/`chi`
//! formula to re-attempt existence certification near a near-solution.

use std::cell::RefCell;
use std::rc::Rc;

use faer::prelude::*;
use faer::Mat;

use crate::dag::{Dag, DagCache};
use crate::domain::Scope;
use crate::interval::Interval;
use crate::proof::Proof;
use crate::region::{DomainBox, IntervalBox};

use super::Contractor;

/// Parameters governing one interval-Newton contraction.
#[derive(Debug, Clone, Copy)]
pub struct NewtonOptions {
    pub xtol: f64,
    pub dtol: f64,
    pub max_iter: usize,
}

impl Default for NewtonOptions {
    fn default() -> Self {
        NewtonOptions { xtol: 1e-10, dtol: 1e-8, max_iter: 20 }
    }
}

/// Mean-value-form interval Newton over a square subsystem: `functions.len()`
/// equations in `scope.len()` unknowns.
pub struct IntervalNewton {
    dag: Rc<Dag>,
    functions: Vec<usize>,
    scope: Scope,
    options: NewtonOptions,
}

impl IntervalNewton {
    pub fn new(
        dag: Rc<Dag>,
        functions: Vec<usize>,
        scope: Scope,
        options: NewtonOptions,
    ) -> IntervalNewton {
        debug_assert_eq!(
            functions.len(),
            scope.len(),
            "IntervalNewton requires a square subsystem"
        );
        IntervalNewton { dag, functions, scope, options }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Runs the contraction to a fixed point (or `max_iter`), returning the
    /// refined box restricted to `self.scope` and a proof: `Empty` if the
    /// preconditioned system proves infeasible, `Feasible` if some step
    /// certified strict inclusion, `Maybe` otherwise.
    pub fn contract(&self, box_: &IntervalBox, cache: &mut DagCache) -> (IntervalBox, Proof) {
        let mut current = box_.restrict(&self.scope);
        let mut certified = false;
        for _ in 0..self.options.max_iter {
            let prev_width = current.total_width();
            match self.newton_step(&current, cache) {
                None => return (current, Proof::Empty),
                Some((next, strict)) => {
                    if strict {
                        certified = true;
                    }
                    current = next;
                }
            }
            let width = current.total_width();
            let reduction = if prev_width > 0.0 {
                (prev_width - width) / prev_width
            } else {
                0.0
            };
            if reduction <= self.options.dtol || width <= self.options.xtol {
                break;
            }
        }
        let proof = if current.is_empty() {
            Proof::Empty
        } else if certified {
            Proof::Feasible
        } else {
            Proof::Maybe
        };
        (current, proof)
    }

    /// One mean-value Newton + preconditioned Gauss-Seidel sweep. `None`
    /// signals infeasibility; otherwise returns the refined box and whether
    /// this step certified strict inclusion (every component of the refined
    /// box strictly inside the corresponding component of `box_`).
    fn newton_step(&self, box_: &IntervalBox, cache: &mut DagCache) -> Option<(IntervalBox, bool)> {
        let n = self.scope.len();
        let c: Vec<f64> = self.scope.iter().map(|v| box_.get(v).mid()).collect();
        let mut midpoint_box = IntervalBox::new(self.scope.clone());
        for (slot, v) in self.scope.iter().enumerate() {
            midpoint_box.set(v, Interval::point(c[slot]));
        }

        let mut f_c = vec![0.0f64; n];
        let mut jac_mid = Mat::<f64>::zeros(n, n);
        let mut jac_interval = vec![vec![Interval::ZERO; n]; n];
        for (row, &fi) in self.functions.iter().enumerate() {
            let func = self.dag.function(fi);

            self.dag.eval(func, &midpoint_box, cache);
            f_c[row] = cache.value(func.root).mid() - func.image.mid();
            self.dag.differentiate(func, cache);
            for (col, d) in self.dag.jacobian_row(func, &self.scope, cache).into_iter().enumerate() {
                jac_mid.write(row, col, d.mid());
            }

            self.dag.eval(func, box_, cache);
            self.dag.differentiate(func, cache);
            jac_interval[row] = self.dag.jacobian_row(func, &self.scope, cache);
        }

        let precond = invert(&jac_mid, n)?;

        // Preconditioned right-hand side: P * (-F(c)).
        let mut rhs = vec![Interval::ZERO; n];
        for row in 0..n {
            let mut acc = Interval::ZERO;
            for col in 0..n {
                acc = acc.add(Interval::point(precond.read(row, col)).mul(Interval::point(-f_c[col])));
            }
            rhs[row] = acc;
        }

        // Preconditioned interval Jacobian: P * J(X).
        let mut pj = vec![vec![Interval::ZERO; n]; n];
        for row in 0..n {
            for col in 0..n {
                let mut acc = Interval::ZERO;
                for k in 0..n {
                    acc = acc.add(Interval::point(precond.read(row, k)).mul(jac_interval[k][col]));
                }
                pj[row][col] = acc;
            }
        }

        // Gauss-Seidel refinement of d = X - c, one pass per component.
        let mut d: Vec<Interval> = (0..n)
            .map(|slot| box_.get_slot(slot).sub(Interval::point(c[slot])))
            .collect();
        for row in 0..n {
            let mut rest = rhs[row];
            for col in 0..n {
                if col != row {
                    rest = rest.sub(pj[row][col].mul(d[col]));
                }
            }
            let diag = pj[row][row];
            if diag.lo() <= 0.0 && diag.hi() >= 0.0 {
                continue;
            }
            let candidate = rest.div(diag).intersect(d[row]);
            if candidate.is_empty() {
                return None;
            }
            d[row] = candidate;
        }

        let mut refined = IntervalBox::new(self.scope.clone());
        let mut strict = true;
        for (slot, v) in self.scope.iter().enumerate() {
            let original = box_.get_slot(slot);
            let shifted = Interval::point(c[slot]).add(d[slot]).intersect(original);
            if shifted.is_empty() {
                return None;
            }
            if !(shifted.lo() > original.lo() && shifted.hi() < original.hi()) {
                strict = false;
            }
            refined.set(v, shifted);
        }
        Some((refined, strict))
    }
}

/// Real midpoint-Jacobian inverse via `n` solves against the identity,
/// following the dense `faer` `partial_piv_lu`/`solve` pattern. `None` when
/// the factorization yields a non-finite column (a singular or
/// near-singular midpoint Jacobian).
fn invert(mat: &Mat<f64>, n: usize) -> Option<Mat<f64>> {
    if n == 0 {
        return Some(Mat::zeros(0, 0));
    }
    let lu = mat.partial_piv_lu();
    let mut inv = Mat::<f64>::zeros(n, n);
    for col in 0..n {
        let mut e = Mat::<f64>::zeros(n, 1);
        e.write(col, 0, 1.0);
        let solved = lu.solve(&e);
        for row in 0..n {
            let v = solved.read(row, 0);
            if !v.is_finite() {
                return None;
            }
            inv.write(row, col, v);
        }
    }
    Some(inv)
}

/// Wraps [`IntervalNewton`] as a [`Contractor`] over a full [`DomainBox`].
pub struct NewtonContractor {
    newton: IntervalNewton,
    cache: RefCell<DagCache>,
}

impl NewtonContractor {
    pub fn new(
        dag: Rc<Dag>,
        functions: Vec<usize>,
        scope: Scope,
        options: NewtonOptions,
    ) -> NewtonContractor {
        let cache = RefCell::new(DagCache::for_dag(&dag));
        NewtonContractor { newton: IntervalNewton::new(dag, functions, scope, options), cache }
    }
}

impl Contractor for NewtonContractor {
    fn scope(&self) -> &Scope {
        self.newton.scope()
    }

    fn contract(&self, box_: &mut DomainBox) -> Proof {
        let restricted = box_.as_interval_box().restrict(self.newton.scope());
        let mut cache = self.cache.borrow_mut();
        let (refined, proof) = self.newton.contract(&restricted, &mut cache);
        if proof.is_empty() {
            return Proof::Empty;
        }
        let mut full = box_.as_interval_box();
        full.absorb(&refined);
        box_.absorb_interval_box(&full);
        if box_.is_empty() {
            Proof::Empty
        } else {
            proof
        }
    }
}

/// Inflates a box around its center by a relative factor plus an absolute
/// margin — the precondition for a strict-inclusion Newton step to certify
/// existence near a boundary or near-singular root.
#[derive(Debug, Clone, Copy)]
pub struct InflationOptions {
    pub delta: f64,
    pub chi: f64,
}

impl Default for InflationOptions {
    fn default() -> Self {
        InflationOptions { delta: 1.125, chi: 1e-12 }
    }
}

pub struct Inflator {
    options: InflationOptions,
}

impl Inflator {
    pub fn new(options: InflationOptions) -> Inflator {
        Inflator { options }
    }

    /// `X' = c + delta*(X - c) + chi*[-1, 1]`, applied componentwise.
    pub fn inflate(&self, box_: &IntervalBox) -> IntervalBox {
        let scope = box_.scope().clone();
        let mut out = IntervalBox::new(scope.clone());
        for (slot, v) in scope.iter().enumerate() {
            let x = box_.get_slot(slot);
            if x.is_empty() {
                out.set(v, x);
                continue;
            }
            let c = x.mid();
            let half = 0.5 * x.width() * self.options.delta + self.options.chi;
            out.set(v, Interval::new(c - half, c + half));
        }
        out
    }

    /// Inflates, then runs one Newton contraction; existence is certified
    /// (`Proof::Feasible`) iff some step of that contraction found the
    /// refined box strictly inside the inflated one.
    pub fn certify(&self, newton: &IntervalNewton, box_: &IntervalBox, cache: &mut DagCache) -> Proof {
        let inflated = self.inflate(box_);
        let (_, proof) = newton.contract(&inflated, cache);
        proof
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Tolerance, Variable, VariableKind};
    use crate::region::DomainBox;
    use crate::term::Term;

    fn var(name: &str) -> Variable {
        Variable::new(name, VariableKind::Real, Tolerance::default())
    }

    #[test]
    fn newton_certifies_simple_root() {
        // f(x) = x^2 - 2, narrow box around sqrt(2) should certify existence.
        let mut dag = Dag::new();
        let x = var("x");
        let expr = Term::var(x.clone()).sqr() - Term::constant(2.0);
        let f = dag.insert(&expr, Interval::ZERO);
        let scope = dag.scope().clone();
        let dag = Rc::new(dag);
        let mut cache = DagCache::for_dag(&dag);
        let newton = IntervalNewton::new(
            Rc::clone(&dag),
            vec![f],
            scope.clone(),
            NewtonOptions::default(),
        );
        let mut box_ = IntervalBox::new(scope.clone());
        box_.set(&x, Interval::new(1.3, 1.5));
        let (refined, proof) = newton.contract(&box_, &mut cache);
        assert!(!proof.is_empty());
        assert!(refined.get(&x).contains(2.0f64.sqrt()));
    }

    #[test]
    fn newton_contractor_absorbs_into_domain_box() {
        let mut dag = Dag::new();
        let x = var("x");
        let expr = Term::var(x.clone()).sqr() - Term::constant(2.0);
        let f = dag.insert(&expr, Interval::ZERO);
        let scope = dag.scope().clone();
        let dag = Rc::new(dag);
        let contractor = NewtonContractor::new(
            Rc::clone(&dag),
            vec![f],
            scope.clone(),
            NewtonOptions::default(),
        );
        let mut box_ = DomainBox::new(
            scope.clone(),
            vec![crate::domain::Domain::Interval(Interval::new(1.3, 1.5))],
        );
        let proof = contractor.contract(&mut box_);
        assert!(!proof.is_empty());
        assert!(box_.domain(&x).hull().width() <= 0.2);
    }

    #[test]
    fn inflator_widens_box_around_its_center() {
        let inflator = Inflator::new(InflationOptions::default());
        let x = var("x");
        let scope = Scope::from_vars([x.clone()]);
        let mut box_ = IntervalBox::new(scope);
        box_.set(&x, Interval::new(1.0, 2.0));
        let inflated = inflator.inflate(&box_);
        assert!(inflated.get(&x).width() > box_.get(&x).width());
        assert!(inflated.get(&x).lo() < 1.0 && inflated.get(&x).hi() > 2.0);
    }
}
