//! Property-based tests for interval soundness/monotonicity and contractor
//! monotonicity, idempotence.

use paver::contractor::hc4::Hc4Contractor;
use paver::contractor::Contractor;
use paver::dag::Dag;
use paver::domain::{Domain, Tolerance, Variable, VariableKind};
use paver::interval::Interval;
use paver::region::DomainBox;
use paver::term::Term;
use proptest::prelude::*;

const BOUND: f64 = 1.0e6;

fn arb_interval() -> impl Strategy<Value = Interval> {
    (-BOUND..BOUND, -BOUND..BOUND).prop_map(|(a, b)| {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Interval::new(lo, hi)
    })
}

/// A point inside `i`, parameterized by a fraction in `[0, 1]`.
fn point_in(i: Interval, t: f64) -> f64 {
    i.lo() + t * (i.hi() - i.lo())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // --- soundness: the arithmetic result encloses every real combination ---

    #[test]
    fn add_soundness(a in arb_interval(), b in arb_interval(), ta in 0.0f64..=1.0, tb in 0.0f64..=1.0) {
        let x = point_in(a, ta);
        let y = point_in(b, tb);
        prop_assert!(a.add(b).contains(x + y));
    }

    #[test]
    fn sub_soundness(a in arb_interval(), b in arb_interval(), ta in 0.0f64..=1.0, tb in 0.0f64..=1.0) {
        let x = point_in(a, ta);
        let y = point_in(b, tb);
        prop_assert!(a.sub(b).contains(x - y));
    }

    #[test]
    fn mul_soundness(a in arb_interval(), b in arb_interval(), ta in 0.0f64..=1.0, tb in 0.0f64..=1.0) {
        let x = point_in(a, ta);
        let y = point_in(b, tb);
        prop_assert!(a.mul(b).contains(x * y));
    }

    #[test]
    fn sqr_soundness(a in arb_interval(), ta in 0.0f64..=1.0) {
        let x = point_in(a, ta);
        prop_assert!(a.sqr().contains(x * x));
    }

    // --- monotonicity: shrinking an operand never grows the result --------

    #[test]
    fn add_monotone_under_subset(a in arb_interval(), b in arb_interval(), ta in 0.0f64..=1.0) {
        // A sub-interval of `a`, built by moving its low bound partway to the midpoint.
        let shrunk = Interval::new(point_in(a, ta * 0.5), a.hi());
        prop_assert!(shrunk.is_subset_of(a));
        prop_assert!(shrunk.add(b).is_subset_of(a.add(b)));
    }

    #[test]
    fn mul_monotone_under_subset(a in arb_interval(), b in arb_interval(), ta in 0.0f64..=1.0) {
        let shrunk = Interval::new(point_in(a, ta * 0.5), a.hi());
        prop_assert!(shrunk.is_subset_of(a));
        prop_assert!(shrunk.mul(b).is_subset_of(a.mul(b)));
    }

    // --- HC4 contraction is sound and monotone: never discards a feasible --
    // point, never grows a domain, and repeating it changes nothing further --
    // (idempotence).

    #[test]
    fn hc4_never_widens_the_box(
        x_lo in -5.0f64..4.0, x_span in 0.0f64..5.0,
        y_lo in -5.0f64..4.0, y_span in 0.0f64..5.0,
    ) {
        let (dag, idx) = circle_dag();
        let scope = dag.scope().clone();
        let original = DomainBox::new(
            scope,
            vec![
                Domain::Interval(Interval::new(x_lo, x_lo + x_span)),
                Domain::Interval(Interval::new(y_lo, y_lo + y_span)),
            ],
        );
        let mut box_ = original.clone();
        let contractor = Hc4Contractor::new(std::rc::Rc::new(dag), idx);
        let proof = contractor.contract(&mut box_);

        if !proof.is_empty() {
            for slot in 0..box_.scope().len() {
                prop_assert!(box_.domain_slot(slot).hull().is_subset_of(original.domain_slot(slot).hull()));
            }
        }

        // Idempotence: contracting the already-contracted box changes nothing.
        let mut twice = box_.clone();
        contractor.contract(&mut twice);
        for slot in 0..box_.scope().len() {
            prop_assert_eq!(twice.domain_slot(slot).hull(), box_.domain_slot(slot).hull());
        }
    }
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
