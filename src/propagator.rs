//! AC3-style fixed-point scheduler over a pool of contractors.
//!
//! All contractors start enqueued. Each popped contractor's `contract` is
//! run; if any variable's domain shrinks by more than `dtol` (relative to
//! its pre-contraction width), every contractor depending on that variable
//! that is not already queued is re-enqueued. The queue empties, an `Empty`
//! proof short-circuits, or `max_iter` pops are reached, whichever comes
//! first. Confluent (the final box is independent of pop order) whenever
//! every pooled contractor is monotone and contracting, which HC4/BC3/BC4
//! and Newton all are.

use std::collections::VecDeque;

use crate::contractor::{Contractor, SharedContractor};
use crate::proof::Proof;
use crate::region::DomainBox;

#[derive(Debug, Clone, Copy)]
pub struct PropagatorOptions {
    pub dtol: f64,
    pub max_iter: usize,
}

impl Default for PropagatorOptions {
    fn default() -> Self {
        PropagatorOptions { dtol: 1e-8, max_iter: 1_000 }
    }
}

pub struct Propagator {
    pool: Vec<SharedContractor>,
    options: PropagatorOptions,
}

impl Propagator {
    pub fn new(pool: Vec<SharedContractor>, options: PropagatorOptions) -> Propagator {
        Propagator { pool, options }
    }

    pub fn pool(&self) -> &[SharedContractor] {
        &self.pool
    }

    /// Runs every pooled contractor to a fixed point on `box_`. Returns the
    /// combined proof (`Empty` iff any operator's run produced `Empty`, the
    /// weakest non-empty proof otherwise).
    pub fn contract(&self, box_: &mut DomainBox) -> Proof {
        if self.pool.is_empty() {
            return Proof::Inner;
        }

        let mut queued = vec![true; self.pool.len()];
        let mut queue: VecDeque<usize> = (0..self.pool.len()).collect();
        let mut proof = Proof::Inner;
        let mut pops = 0usize;

        while let Some(idx) = queue.pop_front() {
            queued[idx] = false;
            if pops >= self.options.max_iter {
                break;
            }
            pops += 1;

            let widths_before = widths_by_var(box_);
            let certif = self.pool[idx].contract(box_);
            if certif.is_empty() {
                return Proof::Empty;
            }
            proof = proof.combine(certif);

            for (var, before) in widths_before {
                let after = box_
                    .scope()
                    .slot_of(&var)
                    .map(|slot| box_.domain_slot(slot).hull().width())
                    .unwrap_or(before);
                let shrank = before > 0.0 && (before - after) / before > self.options.dtol;
                if !shrank {
                    continue;
                }
                for (j, op) in self.pool.iter().enumerate() {
                    if j != idx && !queued[j] && op.depends_on(&var) {
                        queued[j] = true;
                        queue.push_back(j);
                    }
                }
            }
        }
        proof
    }
}

fn widths_by_var(box_: &DomainBox) -> Vec<(crate::domain::Variable, f64)> {
    box_.scope()
        .iter()
        .enumerate()
        .map(|(slot, v)| (v.clone(), box_.domain_slot(slot).hull().width()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contractor::hc4::Hc4Contractor;
    use crate::dag::Dag;
    use crate::domain::{Domain, Scope, Tolerance, VariableKind};
    use crate::interval::Interval;
    use crate::term::Term;
    use std::rc::Rc;

    fn var(name: &str) -> crate::domain::Variable {
        crate::domain::Variable::new(name, VariableKind::Real, Tolerance::default())
    }

    #[test]
    fn propagator_reaches_fixed_point_on_two_equations() {
        let mut dag = Dag::new();
        let x = var("x");
        let y = var("y");
        let tx = Term::var(x.clone());
        let ty = Term::var(y.clone());
        let f1 = dag.insert(&(tx.sqr() - &ty), Interval::ZERO);
        let f2 = dag.insert(&(&tx - &ty), Interval::ZERO);
        let dag = Rc::new(dag);
        let scope = Scope::from_vars([x.clone(), y.clone()]);
        let pool: Vec<SharedContractor> = vec![
            Rc::new(Hc4Contractor::new(Rc::clone(&dag), f1)),
            Rc::new(Hc4Contractor::new(Rc::clone(&dag), f2)),
        ];
        let propagator = Propagator::new(pool, PropagatorOptions::default());
        let mut box_ = DomainBox::new(
            scope,
            vec![
                Domain::Interval(Interval::new(-0.5, 2.0)),
                Domain::Interval(Interval::new(-0.5, 2.0)),
            ],
        );
        let proof = propagator.contract(&mut box_);
        assert!(!proof.is_empty());
        assert!(box_.domain(&x).hull().lo() >= -1e-6);
    }

    #[test]
    fn propagator_is_confluent_under_reversed_pop_order() {
        let mut dag = Dag::new();
        let x = var("x");
        let y = var("y");
        let tx = Term::var(x.clone());
        let ty = Term::var(y.clone());
        let f1 = dag.insert(&(tx.sqr() - &ty), Interval::ZERO);
        let f2 = dag.insert(&(&tx - &ty), Interval::ZERO);
        let dag = Rc::new(dag);
        let scope = Scope::from_vars([x.clone(), y.clone()]);

        let forward: Vec<SharedContractor> = vec![
            Rc::new(Hc4Contractor::new(Rc::clone(&dag), f1)),
            Rc::new(Hc4Contractor::new(Rc::clone(&dag), f2)),
        ];
        let reversed: Vec<SharedContractor> = vec![
            Rc::new(Hc4Contractor::new(Rc::clone(&dag), f2)),
            Rc::new(Hc4Contractor::new(Rc::clone(&dag), f1)),
        ];

        let initial = DomainBox::new(
            scope,
            vec![
                Domain::Interval(Interval::new(-0.5, 2.0)),
                Domain::Interval(Interval::new(-0.5, 2.0)),
            ],
        );

        let mut box_a = initial.clone();
        Propagator::new(forward, PropagatorOptions::default()).contract(&mut box_a);
        let mut box_b = initial.clone();
        Propagator::new(reversed, PropagatorOptions::default()).contract(&mut box_b);

        assert_eq!(box_a.domain(&x).hull(), box_b.domain(&x).hull());
        assert_eq!(box_a.domain(&y).hull(), box_b.domain(&y).hull());
    }

    #[test]
    fn propagator_propagates_empty_from_any_operator() {
        let mut dag = Dag::new();
        let x = var("x");
        let f = dag.insert(&Term::var(x.clone()), Interval::point(10.0));
        let dag = Rc::new(dag);
        let scope = dag.scope().clone();
        let pool: Vec<SharedContractor> = vec![Rc::new(Hc4Contractor::new(dag, f))];
        let propagator = Propagator::new(pool, PropagatorOptions::default());
        let mut box_ = DomainBox::new(scope, vec![Domain::Interval(Interval::new(0.0, 1.0))]);
        assert!(propagator.contract(&mut box_).is_empty());
    }
}
