//! Variable selection strategies for branching.
//!
//! Fixed tie-break and tolerance-skipping rules: round-robin carries the
//! last split variable forward and skips variables already within
//! tolerance; max-dom excludes variables already within tolerance before
//! comparing widths; smear uses the interval Jacobian magnitude times
//! width, falling back to width alone for a variable the function's scope
//! doesn't mention.

use crate::dag::{Dag, DagCache};
use crate::domain::Variable;
use crate::region::DomainBox;

/// Returns the next variable to branch on, or `None` when every variable in
/// the box's scope is already within tolerance.
pub trait VariableSelector {
    fn select(&mut self, box_: &DomainBox, dag: &Dag, cache: &mut DagCache) -> Option<Variable>;

    /// Synchronizes any internal cursor with a search node's own split
    /// history before `select` is called for that node. Selectors without
    /// node-scoped state (max-dom, smear) leave this a no-op; round-robin
    /// overrides it to resume from the node's `last_split` rather than a
    /// free-running global counter.
    fn resume_from(&mut self, _last_split: Option<&Variable>, _box_: &DomainBox) {}
}

fn candidates(box_: &DomainBox) -> impl Iterator<Item = (usize, Variable)> + '_ {
    box_.scope().iter().enumerate().filter_map(move |(slot, v)| {
        let hull = box_.domain_slot(slot).hull();
        if v.tolerance().is_precise_enough(hull) {
            None
        } else {
            Some((slot, v.clone()))
        }
    })
}

/// Advances past the last-split variable each call, skipping variables
/// already within tolerance, and wraps around.
#[derive(Debug, Clone, Default)]
pub struct RoundRobinSelector {
    cursor: usize,
}

impl VariableSelector for RoundRobinSelector {
    fn select(&mut self, box_: &DomainBox, _dag: &Dag, _cache: &mut DagCache) -> Option<Variable> {
        let n = box_.scope().len();
        if n == 0 {
            return None;
        }
        for offset in 0..n {
            let slot = (self.cursor + offset) % n;
            let v = box_.scope().get(slot).clone();
            let hull = box_.domain_slot(slot).hull();
            if !v.tolerance().is_precise_enough(hull) {
                self.cursor = (slot + 1) % n;
                return Some(v);
            }
        }
        None
    }

    /// Resumes from the slot after `last_split` (the node's own last-split
    /// variable), or resets to the start of the scope for a root node
    /// (`last_split` is `None`). Falls back to leaving the cursor untouched
    /// if `last_split` isn't in `box_`'s scope.
    fn resume_from(&mut self, last_split: Option<&Variable>, box_: &DomainBox) {
        let n = box_.scope().len();
        if n == 0 {
            return;
        }
        match last_split {
            Some(var) => {
                if let Some(slot) = box_.scope().slot_of(var) {
                    self.cursor = (slot + 1) % n;
                }
            }
            None => self.cursor = 0,
        }
    }
}

/// Picks the variable of maximum relative domain width, ties broken by
/// scope order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxDomSelector;

impl VariableSelector for MaxDomSelector {
    fn select(&mut self, box_: &DomainBox, _dag: &Dag, _cache: &mut DagCache) -> Option<Variable> {
        candidates(box_)
            .max_by(|(a_slot, _), (b_slot, _)| {
                let wa = box_.domain_slot(*a_slot).hull().width();
                let wb = box_.domain_slot(*b_slot).hull().width();
                wa.total_cmp(&wb)
            })
            .map(|(_, v)| v)
    }
}

/// Smear-sum-rel: scores `v` by `sum_i |df_i/dv| * width(v)`, accumulated
/// over every DAG function whose scope includes `v`; falls back to width
/// alone for a variable not read by any function.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmearSumRelSelector;

impl VariableSelector for SmearSumRelSelector {
    fn select(&mut self, box_: &DomainBox, dag: &Dag, cache: &mut DagCache) -> Option<Variable> {
        let interval_box = box_.as_interval_box();
        let mut scores = vec![0.0f64; box_.scope().len()];
        let mut touched = vec![false; box_.scope().len()];
        for function in dag.functions() {
            dag.eval(function, &interval_box, cache);
            dag.differentiate(function, cache);
            let row = dag.jacobian_row(function, box_.scope(), cache);
            for (slot, deriv) in row.into_iter().enumerate() {
                if deriv.is_empty() {
                    continue;
                }
                let magnitude = deriv.lo().abs().max(deriv.hi().abs());
                if magnitude > 0.0 {
                    touched[slot] = true;
                    let width = box_.domain_slot(slot).hull().width();
                    scores[slot] += magnitude * width;
                }
            }
        }
        candidates(box_)
            .max_by(|(a, _), (b, _)| {
                let score_a = if touched[*a] {
                    scores[*a]
                } else {
                    box_.domain_slot(*a).hull().width()
                };
                let score_b = if touched[*b] {
                    scores[*b]
                } else {
                    box_.domain_slot(*b).hull().width()
                };
                score_a.total_cmp(&score_b)
            })
            .map(|(_, v)| v)
    }
}

/// Alternates max-dom and round-robin with period `f`: `f == 1` always
/// round-robins; otherwise max-dom fires `f - 1` times out of every `f`
/// calls.
#[derive(Debug, Clone)]
pub struct HybridDomRobinSelector {
    period: usize,
    call: usize,
    max_dom: MaxDomSelector,
    round_robin: RoundRobinSelector,
}

impl HybridDomRobinSelector {
    pub fn new(period: usize) -> HybridDomRobinSelector {
        HybridDomRobinSelector {
            period: period.max(1),
            call: 0,
            max_dom: MaxDomSelector,
            round_robin: RoundRobinSelector::default(),
        }
    }
}

impl VariableSelector for HybridDomRobinSelector {
    fn select(&mut self, box_: &DomainBox, dag: &Dag, cache: &mut DagCache) -> Option<Variable> {
        let use_round_robin = self.period == 1 || self.call % self.period == self.period - 1;
        self.call = (self.call + 1) % self.period;
        if use_round_robin {
            self.round_robin.select(box_, dag, cache)
        } else {
            self.max_dom.select(box_, dag, cache)
        }
    }

    fn resume_from(&mut self, last_split: Option<&Variable>, box_: &DomainBox) {
        self.round_robin.resume_from(last_split, box_);
    }
}
