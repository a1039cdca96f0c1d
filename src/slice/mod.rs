//! Domain bisection: slicers turn one variable's current domain into a
//! sequence of sub-domains.

use crate::domain::Domain;
use crate::interval::Interval;

/// Produces the sequence of sub-domains a split or a CID slice introduces
/// for one variable.
pub trait Slicer {
    /// Slices `domain` into `k` parts (or one part if `domain` is already
    /// too narrow to usefully split, e.g. an integer domain of width < 2).
    /// `integer` must reflect the owning variable's kind: a `Domain::Interval`
    /// carries no kind of its own (the sum type distinguishes interval from
    /// integer-range only at the `Variable`/contractor level), so the caller
    /// has to say whether the cut points must land on integers.
    fn slice(&self, domain: &Domain, k: usize, integer: bool) -> Vec<Domain>;
}

/// Bisects at the midpoint for real intervals, at the median integer for
/// integer domains.
#[derive(Debug, Clone, Copy, Default)]
pub struct BisectionSlicer;

impl BisectionSlicer {
    fn slice_interval(&self, i: Interval, k: usize, integer: bool) -> Vec<Interval> {
        if k <= 1 || i.is_empty() {
            return vec![i];
        }
        if integer {
            return self.slice_integer(i, k);
        }
        let mut parts = Vec::with_capacity(k);
        let step = i.width() / k as f64;
        let mut lo = i.lo();
        for idx in 0..k {
            let hi = if idx + 1 == k { i.hi() } else { lo + step };
            parts.push(Interval::new(lo, hi));
            lo = hi;
        }
        parts
    }

    fn slice_integer(&self, i: Interval, k: usize) -> Vec<Interval> {
        let lo = i.lo().round() as i64;
        let hi = i.hi().round() as i64;
        let span = hi - lo + 1;
        if span <= 1 {
            return vec![i];
        }
        let k = (k as i64).min(span).max(1);
        let mut parts = Vec::with_capacity(k as usize);
        let mut cur = lo;
        for idx in 0..k {
            let remaining = span - (cur - lo);
            let take = (remaining + (k - idx) - 1) / (k - idx);
            let last = (cur + take - 1).min(hi);
            parts.push(Interval::new(cur as f64, last as f64));
            cur = last + 1;
        }
        parts
    }
}

impl Slicer for BisectionSlicer {
    fn slice(&self, domain: &Domain, k: usize, integer: bool) -> Vec<Domain> {
        match domain {
            Domain::Interval(i) => self
                .slice_interval(*i, k, integer)
                .into_iter()
                .map(Domain::Interval)
                .collect(),
            Domain::Disconnected(parts) => {
                // Split the widest component; leave the rest untouched.
                if parts.is_empty() {
                    return vec![domain.clone()];
                }
                let (widest, _) = parts
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.width().total_cmp(&b.width()))
                    .unwrap();
                self.slice_interval(parts[widest], k, integer)
                    .into_iter()
                    .map(|piece| {
                        let mut components = parts.clone();
                        components[widest] = piece;
                        Domain::Disconnected(components)
                    })
                    .collect()
            }
            Domain::Single(_) => vec![domain.clone()],
        }
    }
}
