//! The pending-node container search strategies draw from.

use std::collections::VecDeque;

use crate::domain::Variable;
use crate::region::DomainBox;

/// One node of the branch-and-prune tree. Immutable after dispatch except
/// for `box_`, which the contractor pool mutates in place before the node
/// is either discarded, promoted to a solution, or split into children.
#[derive(Debug, Clone)]
pub struct SearchNode {
    box_: DomainBox,
    depth: usize,
    index: usize,
    last_split: Option<Variable>,
}

impl SearchNode {
    pub fn root(box_: DomainBox) -> SearchNode {
        SearchNode { box_, depth: 0, index: 0, last_split: None }
    }

    pub fn child(&self, box_: DomainBox, next_index: usize, split_on: Variable) -> SearchNode {
        SearchNode {
            box_,
            depth: self.depth + 1,
            index: next_index,
            last_split: Some(split_on),
        }
    }

    pub fn box_(&self) -> &DomainBox {
        &self.box_
    }

    pub fn box_mut(&mut self) -> &mut DomainBox {
        &mut self.box_
    }

    pub fn into_box(self) -> DomainBox {
        self.box_
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn last_split(&self) -> Option<&Variable> {
        self.last_split.as_ref()
    }
}

/// Abstract pending-node container. `pop_next`'s ordering is
/// implementation-defined and externally observable through the order
/// solutions are enumerated; it never affects the *set* of
/// fixed points reached, only the order in which they are found.
pub trait SearchSpace {
    fn insert(&mut self, node: SearchNode);
    fn pop_next(&mut self) -> Option<SearchNode>;
    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Depth-first: a LIFO stack.
#[derive(Debug, Default)]
pub struct Dfs {
    stack: Vec<SearchNode>,
}

impl SearchSpace for Dfs {
    fn insert(&mut self, node: SearchNode) {
        self.stack.push(node);
    }

    fn pop_next(&mut self) -> Option<SearchNode> {
        self.stack.pop()
    }

    fn size(&self) -> usize {
        self.stack.len()
    }
}

/// Breadth-first: a FIFO queue.
#[derive(Debug, Default)]
pub struct Bfs {
    queue: VecDeque<SearchNode>,
}

impl SearchSpace for Bfs {
    fn insert(&mut self, node: SearchNode) {
        self.queue.push_back(node);
    }

    fn pop_next(&mut self) -> Option<SearchNode> {
        self.queue.pop_front()
    }

    fn size(&self) -> usize {
        self.queue.len()
    }
}

/// Depth-metric DFS: always pops the deepest pending node, ties broken by
/// earliest insertion order (the node with the smallest monotonic index).
#[derive(Debug, Default)]
pub struct Dmdfs {
    nodes: Vec<SearchNode>,
}

impl SearchSpace for Dmdfs {
    fn insert(&mut self, node: SearchNode) {
        self.nodes.push(node);
    }

    fn pop_next(&mut self) -> Option<SearchNode> {
        let best = self
            .nodes
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.depth()
                    .cmp(&b.depth())
                    .then(b.index().cmp(&a.index()))
            })
            .map(|(i, _)| i)?;
        Some(self.nodes.swap_remove(best))
    }

    fn size(&self) -> usize {
        self.nodes.len()
    }
}

/// What a best-first pop in [`Hybrid`] ranks nodes by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HybridMetric {
    /// Shallowest node first (closest to the root).
    Depth,
    /// Node whose box has the smallest total perimeter (sum of domain
    /// widths across the box's scope).
    Perimeter,
}

/// Periodic best-first: every `period`-th pop ranks the whole pending set
/// by `metric`; every other pop behaves like plain DFS.
#[derive(Debug)]
pub struct Hybrid {
    nodes: Vec<SearchNode>,
    period: usize,
    pops: usize,
    metric: HybridMetric,
}

impl Hybrid {
    pub fn new(period: usize, metric: HybridMetric) -> Hybrid {
        Hybrid { nodes: Vec::new(), period: period.max(1), pops: 0, metric }
    }

    fn best_first_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| match self.metric {
                HybridMetric::Depth => a.depth().cmp(&b.depth()),
                HybridMetric::Perimeter => {
                    let pa = a.box_().as_interval_box().total_width();
                    let pb = b.box_().as_interval_box().total_width();
                    pa.total_cmp(&pb)
                }
            })
            .map(|(i, _)| i)
    }
}

impl SearchSpace for Hybrid {
    fn insert(&mut self, node: SearchNode) {
        self.nodes.push(node);
    }

    fn pop_next(&mut self) -> Option<SearchNode> {
        if self.nodes.is_empty() {
            return None;
        }
        self.pops += 1;
        let idx = if self.pops % self.period == 0 {
            self.best_first_index()?
        } else {
            self.nodes.len() - 1
        };
        Some(self.nodes.swap_remove(idx))
    }

    fn size(&self) -> usize {
        self.nodes.len()
    }
}
