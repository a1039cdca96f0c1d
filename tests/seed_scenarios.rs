//! End-to-end scenarios exercising the branch-and-prune solver, built
//! through `ProblemBuilder` instead of a textual model grammar.

use rstest::rstest;
use paver::domain::Tolerance;
use paver::problem::ProblemBuilder;
use paver::solver::{NcspSolver, SolutionTag};
use paver::term::Term;
use paver::SolverOptions;

fn solver() -> NcspSolver {
    NcspSolver::new(&SolverOptions::new())
}

#[rstest]
fn quadratic_fixed_point_has_two_feasible_roots() {
    let mut builder = ProblemBuilder::new();
    let x = builder.add_variable("x", 0.0, 10.0).unwrap();
    let tx = Term::var(x);
    builder.add_constraint((tx.sqr() - &tx).eq(0.0));
    let model = builder.build().unwrap();

    let report = solver().solve(&model);
    assert_eq!(report.solutions.len(), 2);
    for solution in &report.solutions {
        assert!(matches!(solution.tag, SolutionTag::Feasible | SolutionTag::Inner));
    }

    let mut roots: Vec<f64> = report
        .solutions
        .iter()
        .map(|s| s.box_.domain_slot(0).hull().lo())
        .collect();
    roots.sort_by(|a, b| a.total_cmp(b));
    assert!((roots[0] - 0.0).abs() < 1e-4);
    assert!((roots[1] - 1.0).abs() < 1e-4);
}

#[rstest]
fn circle_parabola_intersection_isolates_one_point() {
    let mut builder = ProblemBuilder::new();
    let x = builder
        .add_variable_with_tolerance("x", 0.0, 10.0, Tolerance::Absolute(1e-7))
        .unwrap();
    let y = builder
        .add_variable_with_tolerance("y", 0.0, 10.0, Tolerance::Absolute(1e-7))
        .unwrap();
    let tx = Term::var(x);
    let ty = Term::var(y);
    builder.add_constraint((tx.sqr() - &ty).eq(0.0));
    builder.add_constraint((tx.sqr() + ty.sqr()).eq(2.0));
    let model = builder.build().unwrap();

    let report = solver().solve(&model);
    assert_eq!(report.solutions.len(), 1);
    let solution = &report.solutions[0];
    let x_hull = solution.box_.domain_slot(0).hull();
    let y_hull = solution.box_.domain_slot(1).hull();
    assert!(x_hull.width() < 1e-6);
    assert!(y_hull.width() < 1e-6);
    assert!(x_hull.contains(1.0));
    assert!(y_hull.contains(1.0));
}

#[rstest]
fn broyden_tridiagonal_five_has_a_certified_solution() {
    // (3 - 2 x_i) x_i - x_{i-1} - 2 x_{i+1} + 1 = 0, x_0 = x_6 = 0.
    let mut builder = ProblemBuilder::new();
    let n = 5;
    let vars: Vec<_> = (1..=n)
        .map(|i| builder.add_variable(&format!("x{i}"), -10.0, 10.0).unwrap())
        .collect();
    let terms: Vec<Term> = vars.iter().cloned().map(Term::var).collect();
    let zero = Term::constant(0.0);
    for i in 0..n {
        let xi = &terms[i];
        let prev = if i == 0 { &zero } else { &terms[i - 1] };
        let next = if i + 1 == n { &zero } else { &terms[i + 1] };
        let coeff = &Term::constant(3.0) - &(&Term::constant(2.0) * xi);
        let lead = &coeff * xi;
        let without_next: Term = &lead - prev;
        let next_term = &Term::constant(2.0) * next;
        let eq: Term = &(&without_next - &next_term) + &Term::constant(1.0);
        builder.add_constraint(eq.eq(0.0));
    }
    let model = builder.build().unwrap();

    let report = solver().solve(&model);
    assert!(!report.solutions.is_empty());
    for solution in &report.solutions {
        assert!(matches!(solution.tag, SolutionTag::Feasible | SolutionTag::Inner));
    }
}

#[rstest]
fn trivially_infeasible_model_reports_no_solutions() {
    let mut builder = ProblemBuilder::new();
    let x = builder.add_variable("x", 1.0, 2.0).unwrap();
    builder.add_constraint(Term::var(x).eq(5.0));
    let model = builder.build().unwrap();

    let report = solver().solve(&model);
    assert!(report.solutions.is_empty());
}

#[rstest]
fn integer_domain_has_exactly_two_inner_solutions() {
    let mut builder = ProblemBuilder::new();
    let x = builder.add_integer_variable("x", 0, 10).unwrap();
    let y = builder.add_integer_variable("y", 0, 10).unwrap();
    let tx = Term::var(x);
    let ty = Term::var(y);
    builder.add_constraint((&tx * &ty).eq(6.0));
    builder.add_constraint((&tx + &ty).eq(5.0));
    let model = builder.build().unwrap();

    let report = solver().solve(&model);
    assert_eq!(report.solutions.len(), 2);
    for solution in &report.solutions {
        assert_eq!(solution.tag, SolutionTag::Inner);
    }

    let mut pairs: Vec<(f64, f64)> = report
        .solutions
        .iter()
        .map(|s| (s.box_.domain_slot(0).hull().lo(), s.box_.domain_slot(1).hull().lo()))
        .collect();
    pairs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(pairs, vec![(2.0, 3.0), (3.0, 2.0)]);
}

#[rstest]
fn trigonometric_system_agrees_between_dfs_and_bfs() {
    use std::f64::consts::PI;

    fn model() -> paver::problem::Model {
        let mut builder = ProblemBuilder::new();
        let x1 = builder.add_variable("x1", 0.0, PI).unwrap();
        let x2 = builder.add_variable("x2", 0.0, PI).unwrap();
        let t1 = Term::var(x1);
        let t2 = Term::var(x2);

        let three_minus_cos_x2 = &Term::constant(3.0) - &t2.cos();
        let two_cos_x1 = &Term::constant(2.0) * &t1.cos();
        let partial1 = &three_minus_cos_x2 - &two_cos_x1;
        let eq1 = &partial1 - &t1.sin();

        let four_minus_cos_x1 = &Term::constant(4.0) - &t1.cos();
        let three_cos_x2 = &Term::constant(3.0) * &t2.cos();
        let partial2 = &four_minus_cos_x1 - &three_cos_x2;
        let eq2 = &partial2 - &t2.sin();

        builder.add_constraint(eq1.eq(0.0));
        builder.add_constraint(eq2.eq(0.0));
        builder.build().unwrap()
    }

    let mut dfs_options = SolverOptions::new();
    dfs_options.set_option::<String>("search_strategy", "dfs".to_string()).unwrap();
    let dfs_report = NcspSolver::new(&dfs_options).solve(&model());

    let mut bfs_options = SolverOptions::new();
    bfs_options.set_option::<String>("search_strategy", "bfs".to_string()).unwrap();
    let bfs_report = NcspSolver::new(&bfs_options).solve(&model());

    assert_eq!(dfs_report.solutions.len(), bfs_report.solutions.len());
}
