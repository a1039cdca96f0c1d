use macros::build_option_enum;

use crate::proof::Proof;
use crate::search::SearchNode;
use crate::SolverOptions;

/// Hook invoked once per processed search node, for logging, monitoring, or
/// early stopping.
pub trait Callback {
    /// Creates a new callback from solver options.
    fn new(options: &SolverOptions) -> Self
    where
        Self: Sized;

    /// Called once a node has been propagated and classified.
    fn on_node(&mut self, node: &SearchNode, proof: Proof);
}

/// A callback that does nothing. Use when no per-node output is needed.
pub struct NoOpCallback {}

impl Callback for NoOpCallback {
    fn new(_options: &SolverOptions) -> Self {
        Self {}
    }

    fn on_node(&mut self, _node: &SearchNode, _proof: Proof) {
        // Do nothing
    }
}

/// Emits one `tracing` event per processed node.
pub struct TracingCallback {}

impl Callback for TracingCallback {
    fn new(_options: &SolverOptions) -> Self {
        Self {}
    }

    fn on_node(&mut self, node: &SearchNode, proof: Proof) {
        tracing::debug!(
            depth = node.depth(),
            index = node.index(),
            ?proof,
            "processed search node"
        );
    }
}

build_option_enum!(
    trait_ = Callback,
    name = "Callbacks",
    variants = (NoOpCallback, TracingCallback),
    new_arguments = (&SolverOptions,),
    doc_header = "An enum representing the callback strategies a search run can be given."
);
