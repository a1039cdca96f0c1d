//! The solver's own tunables, layered onto the crate-wide [`crate::SolverOptions`]
//! registry via the `#[explicit_options]`/`#[use_option]` attribute-stacking
//! pattern. Choices that would naturally be an enum (propagation scheme,
//! branching selector, search strategy) are kept as `String` fields here and
//! parsed once in [`crate::solver::NcspSolver::new`]: `build_option_enum!`
//! requires every variant to share one constructor signature, which the
//! selector/slicer/search-space families don't.

use macros::{explicit_options, use_option};

/// Every numeric and string-valued solver parameter, collected into
/// one struct so [`crate::solver::NcspSolver::new`] only has to read
/// `crate::SolverOptions` once.
#[explicit_options(name = SolverOptions)]
#[use_option(name = "propagation_base", type_ = String, default = "hc4", description = "Per-constraint contraction scheme: \"hc4\" or \"bc4\"")]
#[use_option(name = "propagation_dtol", type_ = f64, default = "1e-8", description = "Relative width-shrink threshold that re-enqueues a dependent contractor")]
#[use_option(name = "propagation_iter_limit", type_ = usize, default = "1000", description = "Maximum number of contractor pops per propagation run")]
#[use_option(name = "bc3_peel_factor", type_ = f64, default = "0.1", description = "Relative width of each BC3 endpoint probe")]
#[use_option(name = "bc3_iter_limit", type_ = usize, default = "30", description = "Maximum BC3 peel/Newton passes per call")]
#[use_option(name = "newton_xtol", type_ = f64, default = "1e-10", description = "Interval Newton absolute width stopping tolerance")]
#[use_option(name = "newton_dtol", type_ = f64, default = "1e-8", description = "Interval Newton relative width-reduction stopping tolerance")]
#[use_option(name = "newton_iter_limit", type_ = usize, default = "20", description = "Maximum Gauss-Seidel sweeps per Newton contraction")]
#[use_option(name = "inflation_delta", type_ = f64, default = "1.125", description = "Relative inflation factor applied before existence certification")]
#[use_option(name = "inflation_chi", type_ = f64, default = "1e-12", description = "Absolute inflation margin applied before existence certification")]
#[use_option(name = "prover_iter_limit", type_ = usize, default = "8", description = "Maximum inflation+Newton rounds spent certifying one box")]
#[use_option(name = "split_selector", type_ = String, default = "round_robin", description = "Branching variable selector: \"round_robin\", \"max_dom\", \"smear\", or \"hybrid\"")]
#[use_option(name = "split_selector_period", type_ = usize, default = "4", description = "Period of the hybrid dom/round-robin selector")]
#[use_option(name = "split_num_slices", type_ = usize, default = "2", description = "Number of pieces a selected variable's domain is sliced into")]
#[use_option(name = "search_strategy", type_ = String, default = "dfs", description = "Pending-node container: \"dfs\", \"bfs\", \"dmdfs\", or \"hybrid\"")]
#[use_option(name = "search_hybrid_period", type_ = usize, default = "10", description = "Period between best-first pops in the hybrid search strategy")]
#[use_option(name = "node_limit", type_ = usize, default = "0", description = "Maximum search nodes processed before stopping with IterationLimit, 0 for unbounded")]
#[use_option(name = "time_limit_secs", type_ = u64, default = "0", description = "Wall-clock seconds before stopping with TimeLimit, 0 for unbounded")]
#[use_option(name = "depth_limit", type_ = usize, default = "0", description = "Maximum search-node depth before a node is discarded with a depth-cut flag, 0 for unbounded")]
#[use_option(name = "solution_limit", type_ = usize, default = "0", description = "Maximum number of retained solutions before stopping with SolutionLimit, 0 for unbounded")]
#[use_option(name = "solution_cluster_gap", type_ = f64, default = "0.0", description = "Per-variable gap below which two solution boxes' hulls are merged after collection, 0 to disable clustering")]
#[use_option(name = "propagation_with_cid", type_ = bool, default = "false", description = "Wrap each constraint's base contractor in a max-CID combinator that slices its widest variable before contracting")]
#[use_option(name = "propagation_cid_slices", type_ = usize, default = "3", description = "Number of slices the max-CID combinator cuts its chosen variable into")]
#[use_option(name = "propagation_with_newton", type_ = bool, default = "false", description = "Add an interval-Newton contractor over the square equation subsystem to the propagation pool")]
pub struct NcspSolverConfig {}

impl NcspSolverConfig {
    pub fn new(options: &crate::SolverOptions) -> NcspSolverConfig {
        NcspSolverConfig { options: options.into() }
    }

    pub fn propagation_base(&self) -> &str {
        &self.options.propagation_base
    }

    pub fn propagator_options(&self) -> crate::propagator::PropagatorOptions {
        crate::propagator::PropagatorOptions {
            dtol: self.options.propagation_dtol,
            max_iter: self.options.propagation_iter_limit,
        }
    }

    pub fn bc3_options(&self) -> crate::contractor::bc3::Bc3Options {
        crate::contractor::bc3::Bc3Options {
            peel_factor: self.options.bc3_peel_factor,
            max_iter: self.options.bc3_iter_limit,
        }
    }

    pub fn newton_options(&self) -> crate::contractor::newton::NewtonOptions {
        crate::contractor::newton::NewtonOptions {
            xtol: self.options.newton_xtol,
            dtol: self.options.newton_dtol,
            max_iter: self.options.newton_iter_limit,
        }
    }

    pub fn inflation_options(&self) -> crate::contractor::newton::InflationOptions {
        crate::contractor::newton::InflationOptions {
            delta: self.options.inflation_delta,
            chi: self.options.inflation_chi,
        }
    }

    pub fn prover_options(&self) -> crate::prover::ProverOptions {
        crate::prover::ProverOptions { max_iter: self.options.prover_iter_limit }
    }

    pub fn split_selector(&self) -> &str {
        &self.options.split_selector
    }

    pub fn split_selector_period(&self) -> usize {
        self.options.split_selector_period
    }

    pub fn split_num_slices(&self) -> usize {
        self.options.split_num_slices
    }

    pub fn search_strategy(&self) -> &str {
        &self.options.search_strategy
    }

    pub fn search_hybrid_period(&self) -> usize {
        self.options.search_hybrid_period
    }

    pub fn node_limit(&self) -> usize {
        self.options.node_limit
    }

    pub fn time_limit_secs(&self) -> u64 {
        self.options.time_limit_secs
    }

    pub fn depth_limit(&self) -> usize {
        self.options.depth_limit
    }

    pub fn solution_limit(&self) -> usize {
        self.options.solution_limit
    }

    pub fn solution_cluster_gap(&self) -> f64 {
        self.options.solution_cluster_gap
    }

    pub fn propagation_with_cid(&self) -> bool {
        self.options.propagation_with_cid
    }

    pub fn propagation_cid_slices(&self) -> usize {
        self.options.propagation_cid_slices
    }

    pub fn propagation_with_newton(&self) -> bool {
        self.options.propagation_with_newton
    }
}
