use std::any::Any;

use dyn_clone::DynClone;
use macros::build_options;

pub mod callback;
pub mod contractor;
pub mod dag;
pub mod domain;
pub mod interval;
pub mod problem;
pub mod proof;
pub mod propagator;
pub mod prover;
pub mod region;
pub mod search;
pub mod select;
pub mod slice;
pub mod solver;
pub mod term;
pub mod terminators;

pub trait OptionTrait: Any + Sync + Send + DynClone {}
impl OptionTrait for &'static str {}
impl OptionTrait for String {}
impl OptionTrait for bool {}
impl OptionTrait for usize {}
impl OptionTrait for u8 {}
impl OptionTrait for u16 {}
impl OptionTrait for u32 {}
impl OptionTrait for u64 {}
impl OptionTrait for i8 {}
impl OptionTrait for i16 {}
impl OptionTrait for i32 {}
impl OptionTrait for i64 {}
impl OptionTrait for f32 {}
impl OptionTrait for f64 {}

impl Clone for Box<dyn OptionTrait> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

/// The exit status of one [`solver::NcspSolver::solve`] run.
///
/// There is no `Optimal`/`Infeasible`/`Unbounded` distinction: branch-and-prune
/// over a constraint satisfaction problem reports feasibility as data
/// (`solver::Solution`s), not as an exit code, so `Complete` covers both
/// "solutions found" and "none exist".
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Status {
    #[default]
    /// The solver is still running.
    InProgress,
    /// The pending set emptied; `solutions`/`pending` in the report are final.
    Complete,
    /// The solver stopped due to a time limit.
    TimeLimit,
    /// The solver stopped after processing its configured node budget.
    NodeLimit,
    /// The solver stopped after collecting its configured solution budget.
    SolutionLimit,
    /// The solver was interrupted (e.g., by user or signal).
    Interrupted,
}

build_options!(name = SolverOptions, registry_name = OPTION_REGISTRY);
