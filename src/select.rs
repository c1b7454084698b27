//! Selection of subfunctions and subfamilies level by level.
//!
//! A selection decides for every level what becomes of its nodes: they are kept, replaced by
//! one of their children, or kept with one arc cut to `false`. BDD restriction and the ZDD
//! `onset` and `offset` operations are selections. Each is a single-input product sweep.

use std::io;

use log::debug;

use crate::diagram::{Diagram, Output};
use crate::memory::{to_size, Config};
use crate::prod::{sweep, Combinator, Outcome, Resolved, Sweep, SweepResult};
use crate::ptr::Ptr;
use crate::request::MAX_SLOTS;
use crate::types::Label;

/// What happens to the nodes of one level.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Selection {
    Keep,
    /// Replace each node by its high (`true`) or low (`false`) child.
    Skip(bool),
    /// Keep each node, but redirect its high (`true`) or low (`false`) arc to `false`.
    Cut(bool),
}

struct SelectProduct<'a> {
    /// Selections sorted by label; levels not listed are kept.
    levels: &'a [(Label, Selection)],
    /// Whether every listed level has to be visited on a path to `true`.
    required: bool,
}

impl SelectProduct<'_> {
    fn selection(&self, label: Label) -> Selection {
        match self.levels.binary_search_by_key(&label, |&(l, _)| l) {
            Ok(i) => self.levels[i].1,
            Err(_) => Selection::Keep,
        }
    }

    /// Whether the arc from level `from` to `to` jumps over a listed level.
    fn skips_listed(&self, from: Label, to: Ptr) -> bool {
        let next = self.levels.partition_point(|&(l, _)| l <= from);
        match self.levels.get(next) {
            Some(&(l, _)) => to.is_terminal() || l < to.label(),
            None => false,
        }
    }

    fn resolve(&self, from: Label, to: Ptr) -> Resolved {
        if self.required && self.skips_listed(from, to) {
            Resolved::Terminal(Ptr::FALSE)
        } else if to.is_terminal() {
            Resolved::Terminal(to)
        } else {
            Resolved::Request([to, Ptr::NIL, Ptr::NIL])
        }
    }
}

impl Combinator for SelectProduct<'_> {
    fn slots(&self) -> usize {
        1
    }

    fn virtual_children(&self, target: Ptr) -> [Ptr; 2] {
        [target, target]
    }

    fn combine(&self, label: Label, children: &[[Ptr; 2]; MAX_SLOTS]) -> Outcome {
        let [low, high] = children[0];
        match self.selection(label) {
            Selection::Keep => Outcome::Node([self.resolve(label, low), self.resolve(label, high)]),
            Selection::Skip(to_high) => Outcome::Skip(self.resolve(label, if to_high { high } else { low })),
            Selection::Cut(true) => Outcome::Node([self.resolve(label, low), Resolved::Terminal(Ptr::FALSE)]),
            Selection::Cut(false) => Outcome::Node([Resolved::Terminal(Ptr::FALSE), self.resolve(label, high)]),
        }
    }
}

/// Applies `levels` to `f`.
///
/// With `required`, a path that does not visit every level in `levels` leads to `false`
/// instead. Labels in `levels` must be unique.
pub fn select(config: &Config, f: &Diagram, levels: &[(Label, Selection)], required: bool) -> io::Result<Output> {
    let mut levels = levels.to_vec();
    levels.sort_unstable_by_key(|&(l, _)| l);

    let root = f.root();
    let product = SelectProduct {
        levels: &levels,
        required,
    };
    let skips_above_root = required
        && levels
            .first()
            .is_some_and(|&(l, _)| root.is_terminal() || l < root.label());
    if skips_above_root {
        return Ok(Diagram::terminal(false)?.into());
    }
    if root.is_terminal() {
        return Ok(f.clone().into());
    }

    let present = f.level_infos()?.into_iter().map(|info| info.label).collect::<Vec<_>>();
    if !required && levels.iter().all(|(l, _)| present.binary_search(l).is_err()) {
        return Ok(f.clone().into());
    }

    debug!("select({:?}, {} levels, required: {})", f, levels.len(), required);
    let inputs = [f];
    let s = Sweep {
        name: "select",
        inputs: &inputs,
        // Every request stems from a distinct arc of a kept node, or from the root.
        bound: to_size(2 * f.size() as u128 + 2),
        output: true,
    };
    match sweep(config, &s, &product, [root, Ptr::NIL, Ptr::NIL])? {
        SweepResult::Arcs(arcs) => Ok(arcs.into()),
        SweepResult::Terminal(v) => Ok(Diagram::terminal(v)?.into()),
        SweepResult::Completed | SweepResult::Aborted => unreachable!("a selection always produces output"),
    }
}
