//! The shared sub-expression graph: hash-consed nodes, forward evaluation,
//! reverse-mode differentiation, and HC4-revise reverse projection, built
//! around a forward-then-reverse traversal shape.

mod node;
mod varset;

pub use node::DagNode;
pub use varset::VarSet;

use std::collections::HashMap;

use crate::domain::{Scope, Variable};
use crate::interval::Interval;
use crate::region::IntervalBox;
use crate::term::{BinaryOp, Term, TermView, UnaryOp};

use node::DagNodeKind;

/// Hash-consing key: structurally identical sub-expressions (same operator,
/// same child node indices) map to the same node via a hash table keyed on
/// (op, child-ids).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DagKey {
    Const(u64),
    Var(usize),
    Unary(UnaryOp, usize),
    PowN(usize, i32),
    Binary(BinaryOp, usize, usize),
}

/// A DAG function: a root node together with its target image interval
/// (e.g. `{0}` for equations, `(-inf, b]` for inequalities). Constraints are
/// attached functions.
#[derive(Debug, Clone)]
pub struct DagFunction {
    pub root: usize,
    pub image: Interval,
    /// The function's own scope, in DAG-insertion order.
    pub scope: Scope,
}

/// The shared, hash-consed expression DAG. Immutable once built: all
/// mutation happens in a caller-owned [`DagCache`] rather than on the DAG
/// itself, so a single `Dag` can be shared by reference across every
/// contractor and every box in flight.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    nodes: Vec<DagNode>,
    by_key: HashMap<DagKey, usize>,
    scope: Scope,
    functions: Vec<DagFunction>,
}

/// Per-evaluation scratch state: one interval value and one interval
/// derivative slot per node, sized to the owning [`Dag`]. Cheap to
/// construct, reusable across many contractions of the same box.
#[derive(Debug, Clone)]
pub struct DagCache {
    values: Vec<Interval>,
    derivatives: Vec<Interval>,
}

impl DagCache {
    pub fn for_dag(dag: &Dag) -> DagCache {
        DagCache {
            values: vec![Interval::EMPTY; dag.nodes.len()],
            derivatives: vec![Interval::ZERO; dag.nodes.len()],
        }
    }

    pub fn value(&self, node: usize) -> Interval {
        self.values[node]
    }

    pub fn derivative(&self, node: usize) -> Interval {
        self.derivatives[node]
    }
}

impl Dag {
    pub fn new() -> Dag {
        Dag::default()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn node(&self, idx: usize) -> &DagNode {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn functions(&self) -> &[DagFunction] {
        &self.functions
    }

    pub fn function(&self, idx: usize) -> &DagFunction {
        &self.functions[idx]
    }

    /// Inserts a constraint `term in image` as a new [`DagFunction`],
    /// hash-consing its nodes against everything already in the DAG.
    pub fn insert(&mut self, term: &Term, image: Interval) -> usize {
        let root = self.insert_term(term);
        let scope = self.reachable_scope(root);
        self.functions.push(DagFunction { root, image, scope });
        self.functions.len() - 1
    }

    fn insert_term(&mut self, term: &Term) -> usize {
        match term.view() {
            TermView::Const(x) => self.intern(DagKey::Const(x.to_bits()), || {
                (DagNodeKind::Const(x), VarSet::with_capacity(self.scope.len()))
            }),
            TermView::Var(v) => {
                let slot = self.scope.insert(v.clone());
                self.intern(DagKey::Var(slot), || {
                    let mut deps = VarSet::with_capacity(self.scope.len());
                    deps.set(slot);
                    (DagNodeKind::Var(v.clone()), deps)
                })
            }
            TermView::Unary(op, a) => {
                let ai = self.insert_term(a);
                self.intern(DagKey::Unary(op, ai), || {
                    (DagNodeKind::Unary(op, ai), self.nodes[ai].deps().clone())
                })
            }
            TermView::PowN(a, n) => {
                let ai = self.insert_term(a);
                self.intern(DagKey::PowN(ai, n), || {
                    (DagNodeKind::PowN(ai, n), self.nodes[ai].deps().clone())
                })
            }
            TermView::Binary(op, a, b) => {
                let ai = self.insert_term(a);
                let bi = self.insert_term(b);
                self.intern(DagKey::Binary(op, ai, bi), || {
                    let mut deps = self.nodes[ai].deps().clone();
                    deps.union_with(self.nodes[bi].deps());
                    (DagNodeKind::Binary(op, ai, bi), deps)
                })
            }
        }
    }

    fn intern(&mut self, key: DagKey, build: impl FnOnce() -> (DagNodeKind, VarSet)) -> usize {
        if let Some(&idx) = self.by_key.get(&key) {
            return idx;
        }
        let (kind, deps) = build();
        let idx = self.nodes.len();
        self.nodes.push(DagNode { kind, deps });
        self.by_key.insert(key, idx);
        idx
    }

    fn reachable_scope(&self, root: usize) -> Scope {
        let mut scope = Scope::new();
        for slot in self.nodes[root].deps().iter() {
            scope.insert(self.scope.get(slot).clone());
        }
        scope
    }

    // --- forward evaluation ------------------------------------------------

    /// Evaluates every node reachable from `function`'s root, storing
    /// results in `cache`. Nodes are visited in index order, which is a
    /// valid topological order since a node's children are always inserted
    /// (and so assigned lower indices) before the node itself.
    pub fn eval(&self, function: &DagFunction, box_: &IntervalBox, cache: &mut DagCache) {
        for idx in 0..=function.root {
            self.eval_node(idx, box_, cache);
        }
    }

    fn eval_node(&self, idx: usize, box_: &IntervalBox, cache: &mut DagCache) {
        let value = match &self.nodes[idx].kind {
            DagNodeKind::Const(x) => Interval::point(*x),
            DagNodeKind::Var(v) => box_.get(v),
            DagNodeKind::Unary(op, a) => eval_unary(*op, cache.values[*a]),
            DagNodeKind::PowN(a, n) => cache.values[*a].pow_n(*n).unwrap_or(Interval::EMPTY),
            DagNodeKind::Binary(op, a, b) => eval_binary(*op, cache.values[*a], cache.values[*b]),
        };
        cache.values[idx] = value;
    }

    /// Incremental evaluation that only recomputes nodes depending on
    /// `var_slot`, as used by BC3's univariate search.
    pub fn eval_only(
        &self,
        function: &DagFunction,
        var_slot: usize,
        box_: &IntervalBox,
        cache: &mut DagCache,
    ) {
        for idx in 0..=function.root {
            if self.nodes[idx].depends_on(var_slot) {
                self.eval_node(idx, box_, cache);
            }
        }
    }

    // --- reverse-mode differentiation --------------------------------------

    /// Populates `cache`'s derivative slots with d(root)/d(node) for every
    /// node reachable from `function`'s root, assuming `cache` already holds
    /// forward values from [`Dag::eval`]. One sweep yields every Jacobian
    /// column entry for this function.
    pub fn differentiate(&self, function: &DagFunction, cache: &mut DagCache) {
        for d in cache.derivatives.iter_mut() {
            *d = Interval::ZERO;
        }
        cache.derivatives[function.root] = Interval::point(1.0);
        for idx in (0..=function.root).rev() {
            let node = &self.nodes[idx];
            let adj = cache.derivatives[idx];
            if adj.is_empty() {
                continue;
            }
            match &node.kind {
                DagNodeKind::Const(_) | DagNodeKind::Var(_) => {}
                DagNodeKind::Unary(op, a) => {
                    let local = unary_derivative(*op, cache.values[*a]);
                    cache.derivatives[*a] = cache.derivatives[*a].add(adj.mul(local));
                }
                DagNodeKind::PowN(a, n) => {
                    let x = cache.values[*a];
                    let local = if *n == 0 {
                        Interval::ZERO
                    } else {
                        Interval::point(*n as f64).mul(
                            x.pow_n(*n - 1).unwrap_or(Interval::EMPTY),
                        )
                    };
                    cache.derivatives[*a] = cache.derivatives[*a].add(adj.mul(local));
                }
                DagNodeKind::Binary(op, a, b) => {
                    let (da, db) = binary_derivative(*op, cache.values[*a], cache.values[*b]);
                    cache.derivatives[*a] = cache.derivatives[*a].add(adj.mul(da));
                    cache.derivatives[*b] = cache.derivatives[*b].add(adj.mul(db));
                }
            }
        }
    }

    /// The interval Jacobian row for `function` over `scope`, read out of
    /// `cache` after a call to [`Dag::differentiate`]. Variables in `scope`
    /// not read by `function` get a zero entry.
    pub fn jacobian_row(&self, function: &DagFunction, scope: &Scope, cache: &DagCache) -> Vec<Interval> {
        let mut row = vec![Interval::ZERO; scope.len()];
        for idx in 0..self.nodes.len() {
            if let DagNodeKind::Var(v) = &self.nodes[idx].kind {
                if let Some(slot) = scope.slot_of(v) {
                    row[slot] = row[slot].add(cache.derivatives[idx]);
                }
            }
        }
        row
    }

    // --- reverse projection (HC4-revise) ------------------------------------

    /// HC4-revise: starting at the root, intersects the stored image with
    /// the target image, then walks the DAG root-to-leaves applying the
    /// `op_pX`/`op_pY` projections to tighten each node's stored interval,
    /// finally writing the refined variable intervals back to `box_`.
    /// Returns `false` iff any intersection along the way is empty — the
    /// caller must then discard `box_`.
    pub fn revise(&self, function: &DagFunction, box_: &mut IntervalBox, cache: &mut DagCache) -> bool {
        self.eval(function, box_, cache);
        let root_value = cache.values[function.root].intersect(function.image);
        if root_value.is_empty() {
            return false;
        }
        cache.values[function.root] = root_value;
        for idx in (0..=function.root).rev() {
            if !self.project_node(idx, cache) {
                return false;
            }
        }
        self.write_back(function, box_, cache)
    }

    fn project_node(&self, idx: usize, cache: &mut DagCache) -> bool {
        let node = &self.nodes[idx];
        let z = cache.values[idx];
        match &node.kind {
            DagNodeKind::Const(_) | DagNodeKind::Var(_) => true,
            DagNodeKind::Unary(op, a) => {
                let x = cache.values[*a];
                let projected = project_unary(*op, x, z);
                cache.values[*a] = projected;
                !projected.is_empty()
            }
            DagNodeKind::PowN(a, n) => {
                let x = cache.values[*a];
                let projected = project_pow_n(x, *n, z);
                cache.values[*a] = projected;
                !projected.is_empty()
            }
            DagNodeKind::Binary(op, a, b) => {
                let x = cache.values[*a];
                let y = cache.values[*b];
                let (px, py) = project_binary(*op, x, y, z);
                cache.values[*a] = px;
                cache.values[*b] = py;
                !px.is_empty() && !py.is_empty()
            }
        }
    }

    fn write_back(&self, function: &DagFunction, box_: &mut IntervalBox, cache: &DagCache) -> bool {
        for idx in 0..=function.root {
            if let DagNodeKind::Var(v) = &self.nodes[idx].kind {
                let current = box_.get(v);
                let refined = current.intersect(cache.values[idx]);
                if refined.is_empty() {
                    return false;
                }
                box_.set(v, refined);
            }
        }
        true
    }

    /// The variables occurring more than once in `function`'s subtree,
    /// counted by reachability multiplicity from the root (a shared node
    /// reached via two distinct parents counts twice). Used to decide which
    /// variables BC4 runs BC3 on.
    pub fn multi_occurrence_vars(&self, function: &DagFunction) -> Vec<Variable> {
        let mut mult = vec![0u32; function.root + 1];
        mult[function.root] = 1;
        for idx in (0..=function.root).rev() {
            let m = mult[idx];
            if m == 0 {
                continue;
            }
            for child in self.nodes[idx].children().into_iter().flatten() {
                mult[child] += m;
            }
        }
        let mut counts: HashMap<usize, (Variable, u32)> = HashMap::new();
        for idx in 0..=function.root {
            if let DagNodeKind::Var(v) = &self.nodes[idx].kind {
                let entry = counts.entry(v.id()).or_insert_with(|| (v.clone(), 0));
                entry.1 += mult[idx];
            }
        }
        counts
            .into_values()
            .filter(|(_, count)| *count > 1)
            .map(|(v, _)| v)
            .collect()
    }
}

fn eval_unary(op: UnaryOp, x: Interval) -> Interval {
    match op {
        UnaryOp::Neg => x.neg(),
        UnaryOp::Abs => x.abs(),
        UnaryOp::Sgn => x.sgn().project(Interval::new(-1.0, 1.0)),
        UnaryOp::Sqr => x.sqr(),
        UnaryOp::Sqrt => x.sqrt().unwrap_or(Interval::EMPTY),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Ln => x.ln(),
        UnaryOp::Sin => x.sin(),
        UnaryOp::Cos => x.cos(),
        UnaryOp::Tan => x.tan(),
    }
}

fn eval_binary(op: BinaryOp, x: Interval, y: Interval) -> Interval {
    match op {
        BinaryOp::Add => x.add(y),
        BinaryOp::Sub => x.sub(y),
        BinaryOp::Mul => x.mul(y),
        BinaryOp::Div => x.div(y),
        BinaryOp::Min => x.min(y),
        BinaryOp::Max => x.max(y),
    }
}

fn project_unary(op: UnaryOp, x: Interval, z: Interval) -> Interval {
    match op {
        UnaryOp::Neg => x.intersect(z.neg()),
        UnaryOp::Abs => x.intersect(Interval::new(-z.hi().max(0.0), z.hi().max(0.0))),
        UnaryOp::Sgn => x,
        UnaryOp::Sqr => {
            let nonneg = z.intersect(Interval::new(0.0, f64::INFINITY));
            if nonneg.is_empty() {
                Interval::EMPTY
            } else {
                let bound = nonneg.hi().sqrt();
                let lo = nonneg.lo().sqrt();
                x.intersect(Interval::new(-bound, -lo).hull(Interval::new(lo, bound)))
            }
        }
        UnaryOp::Sqrt => x.intersect(z.sqr()),
        UnaryOp::Exp => x.intersect(z.ln()),
        UnaryOp::Ln => x.intersect(z.exp()),
        UnaryOp::Sin | UnaryOp::Cos | UnaryOp::Tan => x,
    }
}

fn project_pow_n(x: Interval, n: i32, z: Interval) -> Interval {
    if n == 2 {
        return project_unary(UnaryOp::Sqr, x, z);
    }
    x
}

fn project_binary(op: BinaryOp, x: Interval, y: Interval, z: Interval) -> (Interval, Interval) {
    match op {
        BinaryOp::Add => (Interval::add_p_x(x, y, z), Interval::add_p_y(x, y, z)),
        BinaryOp::Sub => (Interval::sub_p_x(x, y, z), Interval::sub_p_y(x, y, z)),
        BinaryOp::Mul => (Interval::mul_p_x(x, y, z), Interval::mul_p_y(x, y, z)),
        BinaryOp::Div => (Interval::div_p_x(x, y, z), Interval::div_p_y(x, y, z)),
        BinaryOp::Min | BinaryOp::Max => (x, y),
    }
}

fn unary_derivative(op: UnaryOp, x: Interval) -> Interval {
    match op {
        UnaryOp::Neg => Interval::point(-1.0),
        UnaryOp::Abs => x.sgn().project(Interval::new(-1.0, 1.0)),
        UnaryOp::Sgn => Interval::ZERO,
        UnaryOp::Sqr => Interval::point(2.0).mul(x),
        UnaryOp::Sqrt => {
            if x.hi() <= 0.0 {
                Interval::EMPTY
            } else {
                Interval::point(1.0).div(Interval::point(2.0).mul(x.sqrt().unwrap_or(Interval::EMPTY)))
            }
        }
        UnaryOp::Exp => x.exp(),
        UnaryOp::Ln => Interval::point(1.0).div(x),
        UnaryOp::Sin => x.cos(),
        UnaryOp::Cos => x.sin().neg(),
        UnaryOp::Tan => Interval::point(1.0).add(x.tan().sqr()),
    }
}

fn binary_derivative(op: BinaryOp, x: Interval, y: Interval) -> (Interval, Interval) {
    match op {
        BinaryOp::Add => (Interval::point(1.0), Interval::point(1.0)),
        BinaryOp::Sub => (Interval::point(1.0), Interval::point(-1.0)),
        BinaryOp::Mul => (y, x),
        BinaryOp::Div => (
            Interval::point(1.0).div(y),
            x.neg().div(y.sqr()),
        ),
        BinaryOp::Min | BinaryOp::Max => (Interval::new(0.0, 1.0), Interval::new(0.0, 1.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Tolerance, VariableKind};

    fn var(name: &str) -> Variable {
        Variable::new(name, VariableKind::Real, Tolerance::default())
    }

    #[test]
    fn hash_consing_reuses_identical_subexpressions() {
        let mut dag = Dag::new();
        let x = Term::var(var("x"));
        // Two independently-built terms with the same shape must hash-cons
        // to the same node, not merely the same `Rc` allocation.
        let a = dag.insert_term(&(&x + &x));
        let b = dag.insert_term(&(&x + &x));
        assert_eq!(a, b);
        assert_eq!(dag.nodes.len(), 2); // the leaf `x` and the one addition
    }

    #[test]
    fn forward_eval_of_quadratic() {
        let mut dag = Dag::new();
        let x = Term::var(var("x"));
        let expr = x.sqr() - &x;
        let f = dag.insert(&expr, Interval::ZERO);
        let scope = dag.scope().clone();
        let mut box_ = IntervalBox::new(scope.clone());
        box_.set(scope.get(0), Interval::new(2.0, 2.0));
        let mut cache = DagCache::for_dag(&dag);
        dag.eval(dag.function(f), &box_, &mut cache);
        let root = dag.function(f).root;
        assert_eq!(cache.value(root), Interval::point(2.0));
    }

    #[test]
    fn revise_contracts_quadratic_fixed_point_box() {
        let mut dag = Dag::new();
        let x = Term::var(var("x"));
        let expr = x.sqr() - &x;
        let f = dag.insert(&expr, Interval::ZERO);
        let scope = dag.scope().clone();
        let mut box_ = IntervalBox::new(scope.clone());
        box_.set(scope.get(0), Interval::new(-1.0, 2.0));
        let mut cache = DagCache::for_dag(&dag);
        let ok = dag.revise(dag.function(f), &mut box_, &mut cache);
        assert!(ok);
        let refined = box_.get(scope.get(0));
        assert!(refined.width() <= 3.0);
    }

    #[test]
    fn revise_detects_infeasibility() {
        let mut dag = Dag::new();
        let x = Term::var(var("x"));
        let expr = x.clone();
        let f = dag.insert(&expr, Interval::point(5.0));
        let scope = dag.scope().clone();
        let mut box_ = IntervalBox::new(scope.clone());
        box_.set(scope.get(0), Interval::new(1.0, 2.0));
        let mut cache = DagCache::for_dag(&dag);
        assert!(!dag.revise(dag.function(f), &mut box_, &mut cache));
    }

    #[test]
    fn multi_occurrence_detects_repeated_variable() {
        let mut dag = Dag::new();
        let x = Term::var(var("x"));
        let y = Term::var(var("y"));
        let expr = &(&x * &x) + &y;
        let f = dag.insert(&expr, Interval::ZERO);
        let multi = dag.multi_occurrence_vars(dag.function(f));
        assert_eq!(multi.len(), 1);
        assert_eq!(multi[0].name(), "x");
    }
}
