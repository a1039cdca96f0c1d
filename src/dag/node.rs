//! A single hash-consed DAG node.

use crate::dag::varset::VarSet;
use crate::domain::Variable;
use crate::term::{BinaryOp, UnaryOp};

#[derive(Debug, Clone)]
pub(crate) enum DagNodeKind {
    Const(f64),
    Var(Variable),
    Unary(UnaryOp, usize),
    PowN(usize, i32),
    Binary(BinaryOp, usize, usize),
}

/// Kinds: constant, variable, unary op, binary op, and the `pow_n` node
/// kept distinct from the generic unary set since it carries an integer
/// exponent.
#[derive(Debug, Clone)]
pub struct DagNode {
    pub(crate) kind: DagNodeKind,
    /// Bit-set of variables (by scope slot) this node's value depends on.
    pub(crate) deps: VarSet,
}

impl DagNode {
    pub fn depends_on(&self, slot: usize) -> bool {
        self.deps.contains(slot)
    }

    pub fn deps(&self) -> &VarSet {
        &self.deps
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, DagNodeKind::Var(_))
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.kind {
            DagNodeKind::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<f64> {
        match &self.kind {
            DagNodeKind::Const(x) => Some(*x),
            _ => None,
        }
    }

    /// Direct child node indices (empty for leaves).
    pub(crate) fn children(&self) -> [Option<usize>; 2] {
        match &self.kind {
            DagNodeKind::Const(_) | DagNodeKind::Var(_) => [None, None],
            DagNodeKind::Unary(_, a) | DagNodeKind::PowN(a, _) => [Some(*a), None],
            DagNodeKind::Binary(_, a, b) => [Some(*a), Some(*b)],
        }
    }
}
