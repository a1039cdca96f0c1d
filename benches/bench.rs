//! Micro-benchmarks over the interval kernel, the HC4 contractor, and the
//! propagator's AC3 fixed-point loop — the operations the branch-and-prune
//! driver spends the overwhelming majority of its time in.

use paver::contractor::hc4::Hc4Contractor;
use paver::contractor::Contractor;
use paver::dag::Dag;
use paver::domain::{Domain, Scope, Tolerance, Variable, VariableKind};
use paver::interval::Interval;
use paver::propagator::{Propagator, PropagatorOptions};
use paver::region::DomainBox;
use paver::term::Term;

fn main() {
    divan::main();
}

#[divan::bench]
fn interval_arithmetic_chain() -> Interval {
    let a = Interval::new(-3.0, 5.0);
    let b = Interval::new(1.0, 2.0);
    let c = a.mul(b).add(a.sqr()).sub(b);
    divan::black_box(c)
}

#[divan::bench]
fn interval_transcendental_chain() -> Interval {
    let a = Interval::new(0.25, 3.0);
    divan::black_box(a.sqrt().unwrap_or(Interval::EMPTY).exp().ln())
}

fn circle_dag() -> (Dag, usize) {
    let mut dag = Dag::new();
    let x = Variable::new("x", VariableKind::Real, Tolerance::default());
    let y = Variable::new("y", VariableKind::Real, Tolerance::default());
    let tx = Term::var(x);
    let ty = Term::var(y);
    let constraint = (tx.sqr() + ty.sqr()).le(1.0);
    let idx = dag.insert(&constraint.term, constraint.image);
    (dag, idx)
}

fn circle_box(scope: &Scope) -> DomainBox {
    DomainBox::new(
        scope.clone(),
        vec![
            Domain::Interval(Interval::new(-2.0, 2.0)),
            Domain::Interval(Interval::new(-2.0, 2.0)),
        ],
    )
}

#[divan::bench]
fn hc4_contracts_a_circle_constraint() -> paver::proof::Proof {
    let (dag, idx) = circle_dag();
    let mut box_ = circle_box(dag.scope());
    let contractor = Hc4Contractor::new(std::rc::Rc::new(dag), idx);
    divan::black_box(contractor.contract(&mut box_))
}

#[divan::bench]
fn propagator_fixed_point_over_a_circle() -> paver::proof::Proof {
    let (dag, idx) = circle_dag();
    let scope = dag.scope().clone();
    let dag = std::rc::Rc::new(dag);
    let pool: Vec<std::rc::Rc<dyn Contractor>> =
        vec![std::rc::Rc::new(Hc4Contractor::new(dag, idx))];
    let propagator = Propagator::new(pool, PropagatorOptions::default());
    let mut box_ = circle_box(&scope);
    divan::black_box(propagator.contract(&mut box_))
}
