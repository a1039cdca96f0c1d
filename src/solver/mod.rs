//! The branch-and-prune driver: preprocesses a [`Model`] into a contractor
//! pool, then alternates propagation, classification, and splitting over a
//! [`SearchSpace`] until the pending set empties or a budget is hit.
//! Node-selection strategy and propagation base are resolved once, at
//! construction, from option values; budgets and callbacks are then
//! consulted once per loop iteration.

pub mod options;

use std::rc::Rc;

use crate::callback::Callback;
use crate::contractor::bc4::Bc4Contractor;
use crate::contractor::domain::{DomainContractor, IntContractor};
use crate::contractor::hc4::Hc4Contractor;
use crate::contractor::newton::{Inflator, NewtonContractor};
use crate::contractor::{MaxCidContractor, SharedContractor};
use crate::dag::Dag;
use crate::interval::Interval;
use crate::problem::Model;
use crate::proof::Proof;
use crate::propagator::Propagator;
use crate::prover::Prover;
use crate::region::DomainBox;
use crate::search::{Dfs, Bfs, Dmdfs, Hybrid, HybridMetric, SearchNode, SearchSpace};
use crate::select::{
    HybridDomRobinSelector, MaxDomSelector, RoundRobinSelector, SmearSumRelSelector, VariableSelector,
};
use crate::slice::{BisectionSlicer, Slicer};
use crate::terminators::{MultipleTerminators, Terminator, TimeOutTerminator};
use crate::{SolverOptions, Status};

pub use options::NcspSolverConfig;

/// How a retained box was classified: `Inner` satisfies every constraint
/// strictly, `Feasible` is existence-certified against the equation
/// subsystem, `Undecided` is narrower than tolerance but could be certified
/// neither way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionTag {
    Inner,
    Feasible,
    Undecided,
}

/// One retained box and its classification.
#[derive(Debug, Clone)]
pub struct Solution {
    pub box_: DomainBox,
    pub tag: SolutionTag,
}

/// The terminal report of a [`NcspSolver::solve`] run: every retained
/// solution (already clustered per `solution_cluster_gap`), any boxes still
/// pending when a budget was hit, the exit [`Status`], the number of nodes
/// processed, and how many nodes were discarded for exceeding `depth_limit`.
#[derive(Debug, Clone)]
pub struct SolverReport {
    pub status: Status,
    pub solutions: Vec<Solution>,
    pub pending: Vec<DomainBox>,
    pub nodes_processed: usize,
    pub depth_cuts: usize,
}

/// Picks a [`VariableSelector`] once, at setup, from
/// [`NcspSolverConfig::split_selector`]. Held as an enum rather than a
/// `Box<dyn VariableSelector>` since `MaxCidContractor` is generic over its
/// selector and a trait object would force dynamic dispatch even for the
/// pool-free branching path used here.
enum Selector {
    RoundRobin(RoundRobinSelector),
    MaxDom(MaxDomSelector),
    Smear(SmearSumRelSelector),
    Hybrid(HybridDomRobinSelector),
}

impl VariableSelector for Selector {
    fn select(
        &mut self,
        box_: &DomainBox,
        dag: &Dag,
        cache: &mut crate::dag::DagCache,
    ) -> Option<crate::domain::Variable> {
        match self {
            Selector::RoundRobin(s) => s.select(box_, dag, cache),
            Selector::MaxDom(s) => s.select(box_, dag, cache),
            Selector::Smear(s) => s.select(box_, dag, cache),
            Selector::Hybrid(s) => s.select(box_, dag, cache),
        }
    }
}

fn build_selector(config: &NcspSolverConfig) -> Selector {
    match config.split_selector() {
        "max_dom" => Selector::MaxDom(MaxDomSelector),
        "smear" => Selector::Smear(SmearSumRelSelector),
        "hybrid" => Selector::Hybrid(HybridDomRobinSelector::new(config.split_selector_period())),
        _ => Selector::RoundRobin(RoundRobinSelector::default()),
    }
}

fn build_space(config: &NcspSolverConfig) -> Box<dyn SearchSpace> {
    match config.search_strategy() {
        "bfs" => Box::new(Bfs::default()),
        "dmdfs" => Box::new(Dmdfs::default()),
        "hybrid" => Box::new(Hybrid::new(config.search_hybrid_period(), HybridMetric::Perimeter)),
        _ => Box::new(Dfs::default()),
    }
}

/// Builds the per-constraint contractor pool: one HC4 or BC4 contractor per
/// declared constraint, plus one `IntContractor`/`DomainContractor` per
/// variable, the latter kept separate from the DAG-attached constraint
/// contractors since they enforce declared-domain membership rather than a
/// constraint's own image. When `propagation_with_cid` is set, each
/// per-constraint contractor is wrapped in a [`MaxCidContractor`] that slices
/// its widest variable before contracting (`PROPAGATION_WITH_CID`). When
/// `propagation_with_newton` is set and the model's equations form a square
/// subsystem, an interval-Newton contractor over that subsystem is appended
/// to the pool (`PROPAGATION_WITH_NEWTON`), run inside the same fixed-point
/// propagation as HC4/BC4 rather than only at final certification.
fn build_pool(dag: &Rc<Dag>, model: &Model, config: &NcspSolverConfig) -> Vec<SharedContractor> {
    let mut pool: Vec<SharedContractor> = Vec::with_capacity(model.constraints().len() + model.scope().len() + 1);

    for &idx in model.constraints() {
        let base: SharedContractor = if config.propagation_base() == "bc4" {
            Rc::new(Bc4Contractor::new(Rc::clone(dag), idx, config.bc3_options()))
        } else {
            Rc::new(Hc4Contractor::new(Rc::clone(dag), idx))
        };
        let op: SharedContractor = if config.propagation_with_cid() {
            Rc::new(MaxCidContractor::new(
                base,
                MaxDomSelector,
                Box::new(BisectionSlicer),
                config.propagation_cid_slices().max(2),
                Rc::clone(dag),
            ))
        } else {
            base
        };
        pool.push(op);
    }

    for (slot, var) in model.scope().iter().enumerate() {
        if var.is_integer() {
            pool.push(Rc::new(IntContractor::new(var.clone())));
        }
        let initial = model.initial_box().domain_slot(slot).clone();
        pool.push(Rc::new(DomainContractor::new(var.clone(), initial)));
    }

    if config.propagation_with_newton() && !model.equations().is_empty() && model.equations().len() == model.scope().len() {
        pool.push(Rc::new(NewtonContractor::new(
            Rc::clone(dag),
            model.equations().to_vec(),
            model.scope().clone(),
            config.newton_options(),
        )));
    }

    pool
}

/// Builds the certifying [`Prover`] for `model`. Certification against the
/// equation subsystem only applies when it is square (as many equations as
/// variables); otherwise `certify` never upgrades past `Proof::Maybe`.
fn build_prover(dag: &Rc<Dag>, model: &Model, config: &NcspSolverConfig) -> Prover {
    let scope = model.scope();
    let equations = if !model.equations().is_empty() && model.equations().len() == scope.len() {
        Some((model.equations().to_vec(), scope.clone()))
    } else {
        None
    };
    Prover::new(
        Rc::clone(dag),
        equations,
        Inflator::new(config.inflation_options()),
        config.prover_options(),
    )
}

fn is_tight(model: &Model, box_: &DomainBox) -> bool {
    model.scope().iter().enumerate().all(|(slot, v)| {
        v.tolerance().is_precise_enough(box_.domain_slot(slot).hull())
    })
}

/// The real-line gap between two intervals: `0` if they overlap or touch,
/// otherwise the distance between the nearer pair of endpoints.
fn interval_gap(a: Interval, b: Interval) -> f64 {
    if a.hi() < b.lo() {
        b.lo() - a.hi()
    } else if b.hi() < a.lo() {
        a.lo() - b.hi()
    } else {
        0.0
    }
}

fn solution_tag_rank(tag: SolutionTag) -> u8 {
    match tag {
        SolutionTag::Undecided => 0,
        SolutionTag::Feasible => 1,
        SolutionTag::Inner => 2,
    }
}

/// Merges solutions whose bounding hulls are within `gap` per variable,
/// replacing each cluster with the componentwise hull of its members. The
/// merged tag is the weakest of the cluster's members: a hull spanning an
/// `Inner` box and a `Feasible` one is no longer certainly satisfied
/// everywhere, so it can only claim what the weaker member claims. A
/// non-positive `gap` disables clustering.
fn cluster_solutions(solutions: Vec<Solution>, gap: f64) -> Vec<Solution> {
    if gap <= 0.0 || solutions.len() < 2 {
        return solutions;
    }
    let mut merged: Vec<Solution> = Vec::with_capacity(solutions.len());
    'next_solution: for candidate in solutions {
        for existing in merged.iter_mut() {
            let within_gap = (0..existing.box_.scope().len()).all(|slot| {
                let a = existing.box_.domain_slot(slot).hull();
                let b = candidate.box_.domain_slot(slot).hull();
                interval_gap(a, b) <= gap
            });
            if within_gap {
                for slot in 0..existing.box_.scope().len() {
                    let merged_hull = existing
                        .box_
                        .domain_slot(slot)
                        .hull()
                        .hull(candidate.box_.domain_slot(slot).hull());
                    existing.box_.set_domain_slot(slot, crate::domain::Domain::Interval(merged_hull));
                }
                if solution_tag_rank(candidate.tag) < solution_tag_rank(existing.tag) {
                    existing.tag = candidate.tag;
                }
                continue 'next_solution;
            }
        }
        merged.push(candidate);
    }
    merged
}

/// The branch-and-prune solver over a compiled [`Model`]. Holds only
/// configuration; a fresh run's mutable state (pool, propagator, search
/// space) is built in [`NcspSolver::solve`] so one solver instance can be
/// reused across models.
pub struct NcspSolver {
    config: NcspSolverConfig,
    callback: Box<dyn Callback>,
    terminator: Option<Box<dyn Terminator>>,
}

impl NcspSolver {
    pub fn new(options: &SolverOptions) -> NcspSolver {
        NcspSolver {
            config: NcspSolverConfig::new(options),
            callback: Box::new(crate::callback::NoOpCallback {}),
            terminator: None,
        }
    }

    pub fn with_callback(options: &SolverOptions, callback: Box<dyn Callback>) -> NcspSolver {
        NcspSolver { config: NcspSolverConfig::new(options), callback, terminator: None }
    }

    /// Plugs in an externally owned terminator (e.g. a process-wide
    /// `InterruptTerminator`, which can only be constructed once). Combined
    /// with the configured time limit, if any.
    pub fn with_terminator(mut self, terminator: Box<dyn Terminator>) -> NcspSolver {
        self.terminator = Some(terminator);
        self
    }

    /// Runs branch-and-prune to completion (or until a budget expires).
    /// Infeasibility is never an `Err`: an infeasible model simply reports
    /// zero solutions with `Status::Complete`; infeasibility is a value,
    /// not an error.
    pub fn solve(&mut self, model: &Model) -> SolverReport {
        let mut terminator = self.build_terminator();
        terminator.initialize();

        let dag = Rc::clone(model.dag());
        let pool = build_pool(&dag, model, &self.config);
        let propagator = Propagator::new(pool, self.config.propagator_options());
        let prover = build_prover(&dag, model, &self.config);
        let mut selector = build_selector(&self.config);
        let slicer = BisectionSlicer;
        let mut space = build_space(&self.config);
        let mut cache = crate::dag::DagCache::for_dag(&dag);

        let mut solutions = Vec::new();
        let mut nodes_processed = 0usize;
        let mut depth_cuts = 0usize;
        let mut next_index = 1usize;
        let node_limit = self.config.node_limit();
        let solution_limit = self.config.solution_limit();
        let depth_limit = self.config.depth_limit();
        let num_slices = self.config.split_num_slices().max(2);

        space.insert(SearchNode::root(model.initial_box().clone()));

        let status = loop {
            if let Some(status) = terminator.terminate() {
                break status;
            }
            if node_limit > 0 && nodes_processed >= node_limit {
                break Status::NodeLimit;
            }
            if solution_limit > 0 && solutions.len() >= solution_limit {
                break Status::SolutionLimit;
            }
            let Some(mut node) = space.pop_next() else {
                break Status::Complete;
            };
            nodes_processed += 1;

            let proof = propagator.contract(node.box_mut());
            self.callback.on_node(&node, proof);
            if proof.is_empty() {
                tracing::trace!(depth = node.depth(), "node pruned empty");
                continue;
            }

            // Inner-region classification is unconditional: a box already
            // certainly satisfying every constraint is recorded as a
            // solution regardless of whether its domains have shrunk to
            // tolerance yet, so a wide, trivially-feasible region isn't
            // bisected down to tolerance width before it's recognized.
            if prover.is_inner_region(model.constraints(), node.box_()) {
                solutions.push(Solution { box_: node.into_box(), tag: SolutionTag::Inner });
                continue;
            }

            if is_tight(model, node.box_()) {
                let certified = prover.certify(node.box_());
                if certified.is_empty() {
                    continue;
                }
                let tag = if certified >= Proof::Feasible {
                    SolutionTag::Feasible
                } else {
                    SolutionTag::Undecided
                };
                solutions.push(Solution { box_: node.into_box(), tag });
                continue;
            }

            if depth_limit > 0 && node.depth() >= depth_limit {
                depth_cuts += 1;
                tracing::trace!(depth = node.depth(), "node discarded at depth limit");
                continue;
            }

            selector.resume_from(node.last_split(), node.box_());
            let Some(var) = selector.select(node.box_(), &dag, &mut cache) else {
                // Every variable is within tolerance but `is_tight` said
                // otherwise cannot happen; defensive fallback matches the
                // tight path above.
                solutions.push(Solution { box_: node.into_box(), tag: SolutionTag::Undecided });
                continue;
            };
            let slot = node.box_().scope().slot_of(&var).expect("selected variable not in scope");
            let pieces = slicer.slice(node.box_().domain_slot(slot), num_slices, var.is_integer());
            for piece in pieces {
                let mut child_box = node.box_().clone();
                child_box.set_domain_slot(slot, piece);
                let child = node.child(child_box, next_index, var.clone());
                next_index += 1;
                space.insert(child);
            }
        };

        let mut pending = Vec::with_capacity(space.size());
        while let Some(node) = space.pop_next() {
            pending.push(node.into_box());
        }

        let solutions = cluster_solutions(solutions, self.config.solution_cluster_gap());

        tracing::info!(
            nodes_processed,
            depth_cuts,
            solutions = solutions.len(),
            pending = pending.len(),
            ?status,
            "branch-and-prune run finished"
        );

        SolverReport { status, solutions, pending, nodes_processed, depth_cuts }
    }

    fn build_terminator(&mut self) -> Box<dyn Terminator> {
        let mut terminators: Vec<Box<dyn Terminator>> = Vec::new();
        let time_limit = self.config.time_limit_secs();
        if time_limit > 0 {
            terminators.push(Box::new(TimeOutTerminator::new(time_limit)));
        }
        if let Some(external) = self.terminator.take() {
            terminators.push(external);
        }
        Box::new(MultipleTerminators::new(terminators))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ProblemBuilder;
    use crate::term::Term;

    fn solver() -> NcspSolver {
        NcspSolver::new(&SolverOptions::new())
    }

    #[test]
    fn solves_a_trivial_fixed_point_system() {
        // x^2 = x over [-1, 2] has roots at 0 and 1.
        let mut builder = ProblemBuilder::new();
        let x = builder.add_variable("x", -1.0, 2.0).unwrap();
        let tx = Term::var(x);
        builder.add_constraint((tx.sqr() - &tx).eq(0.0));
        let model = builder.build().unwrap();

        let report = solver().solve(&model);
        assert_eq!(report.status, Status::Complete);
        assert!(report.pending.is_empty());
        assert!(report.solutions.len() >= 2);
    }

    #[test]
    fn detects_a_trivially_infeasible_model() {
        let mut builder = ProblemBuilder::new();
        let x = builder.add_variable("x", 1.0, 2.0).unwrap();
        builder.add_constraint(Term::var(x).eq(5.0));
        let model = builder.build().unwrap();

        let report = solver().solve(&model);
        assert_eq!(report.status, Status::Complete);
        assert!(report.solutions.is_empty());
    }

    #[test]
    fn enumerates_two_integer_solutions() {
        // x*y == 6, x+y == 5, x,y in [0, 5] integer: (2,3) and (3,2).
        let mut builder = ProblemBuilder::new();
        let x = builder.add_integer_variable("x", 0, 5).unwrap();
        let y = builder.add_integer_variable("y", 0, 5).unwrap();
        let tx = Term::var(x);
        let ty = Term::var(y);
        builder.add_constraint((&tx * &ty).eq(6.0));
        builder.add_constraint((&tx + &ty).eq(5.0));
        let model = builder.build().unwrap();

        let report = solver().solve(&model);
        assert_eq!(report.status, Status::Complete);
        assert!(report.solutions.len() >= 2);
    }

    #[test]
    fn node_limit_stops_the_search_early() {
        let mut builder = ProblemBuilder::new();
        let x = builder.add_variable("x", -100.0, 100.0).unwrap();
        let y = builder.add_variable("y", -100.0, 100.0).unwrap();
        let tx = Term::var(x);
        let ty = Term::var(y);
        builder.add_constraint((tx.sqr() + ty.sqr()).le(1.0));
        let model = builder.build().unwrap();

        let mut options = SolverOptions::new();
        options.set_option("node_limit", 3usize).unwrap();
        let mut solver = NcspSolver::new(&options);
        let report = solver.solve(&model);
        assert_eq!(report.status, Status::NodeLimit);
        assert!(report.nodes_processed <= 4);
    }
}
