//! Counting paths and satisfying assignments with a top-down sweep.
//!
//! Every request carries the number of ways to reach its target. Requests for the same node
//! are summed up, and the sum is passed on to both children.

use std::cmp::Ordering;
use std::io;

use log::debug;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::cut::CutType;
use crate::diagram::Diagram;
use crate::levelized_pq::{LevelizedOrder, LevelizedPriorityQueue};
use crate::memory::{Config, Planner};
use crate::ptr::Ptr;
use crate::sorter::Order;
use crate::stream::NodeStream;
use crate::types::Label;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Count {
    target: Ptr,
    value: BigUint,
}

#[derive(Debug, Copy, Clone)]
struct ByTarget;

impl Order<Count> for ByTarget {
    fn cmp(&self, a: &Count, b: &Count) -> Ordering {
        a.target.cmp(&b.target)
    }
}

impl LevelizedOrder<Count> for ByTarget {
    fn level(&self, item: &Count) -> Label {
        item.target.label()
    }
}

/// Sums, over all paths from the root to `true`, the weight of the path.
///
/// The weight of an arc is `2^skipped(from, to)`, where `from` is `None` above the root.
fn weighted_paths<F>(config: &Config, f: &Diagram, skipped: F) -> io::Result<BigUint>
where
    F: Fn(Option<Label>, Ptr) -> u32,
{
    let root = f.root();
    if root.is_terminal() {
        return Ok(if root.is_true() {
            BigUint::from(1u32) << skipped(None, root)
        } else {
            BigUint::ZERO
        });
    }

    let planner = Planner::new(config, NodeStream::memory_usage(), 1)?;
    let bound = f.max_1level_cut(CutType::Internal) as usize;
    let (_, setup) = planner.queue::<Count, ByTarget>("count", bound, planner.available(), 1);
    let mut pq = LevelizedPriorityQueue::new(&[f.file().levels()], ByTarget, setup)?;
    let mut stream = NodeStream::new(f.file(), f.is_negated())?;

    pq.push(Count {
        target: root,
        value: BigUint::from(1u32) << skipped(None, root),
    })?;
    let mut result = BigUint::ZERO;
    while stream.can_pull() && !pq.is_empty() {
        let node = stream.pull()?;
        let label = node.label();
        if pq.current_level() != Some(label) && pq.empty_level() {
            pq.setup_next_level(Some(label))?;
        }

        let mut sum = BigUint::ZERO;
        while pq.top().map_or(false, |c| node.uid == c.target) {
            sum += pq.pull()?.value;
        }
        if sum == BigUint::ZERO {
            continue;
        }

        for child in node.children() {
            let value = &sum << skipped(Some(label), child);
            if child.is_terminal() {
                if child.is_true() {
                    result += value;
                }
            } else {
                pq.push(Count { target: child, value })?;
            }
        }
    }
    debug!("count: {} nodes -> {}", f.size(), result);
    Ok(result)
}

/// Number of paths from the root to the `true` terminal.
///
/// For a ZDD this is the number of sets in the family.
pub fn path_count(config: &Config, f: &Diagram) -> io::Result<BigUint> {
    weighted_paths(config, f, |_, _| 0)
}

/// Number of assignments to the variables `0..varcount` that satisfy the BDD `f`.
///
/// Fails with [`io::ErrorKind::InvalidInput`] if `f` depends on a variable outside of
/// `0..varcount`.
pub fn sat_count(config: &Config, f: &Diagram, varcount: Label) -> io::Result<BigUint> {
    if let Some(last) = f.level_infos()?.last() {
        if last.label >= varcount {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Variable x{} lies outside of the {} counted variables", last.label, varcount),
            ));
        }
    }
    weighted_paths(config, f, |from, to| {
        let first = from.map_or(0, |l| l + 1);
        let until = if to.is_terminal() { varcount } else { to.label() };
        until - first
    })
}
