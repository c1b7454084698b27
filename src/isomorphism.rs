//! Isomorphism of two reduced diagrams.
//!
//! Cheap checks on the file statistics come first. Two canonical files are compared record by
//! record. Otherwise a sweep walks the product of both diagrams and stops at the first pair of
//! nodes that cannot match.

use std::cell::Cell;
use std::io;

use log::debug;

use crate::diagram::Diagram;
use crate::memory::Config;
use crate::prod::{sweep, Combinator, Outcome, Resolved, Sweep, SweepResult};
use crate::ptr::Ptr;
use crate::request::MAX_SLOTS;
use crate::stream::NodeStream;
use crate::types::{Label, LevelInfo};

/// Walks pairs of nodes on equal levels, counting them per level.
struct IsomorphismProduct {
    levels: Vec<LevelInfo>,
    level: Cell<usize>,
    seen: Cell<u64>,
}

impl IsomorphismProduct {
    fn new(levels: Vec<LevelInfo>) -> Self {
        Self {
            levels,
            level: Cell::new(0),
            seen: Cell::new(0),
        }
    }

    /// Counts one more pair on `label`; fails if there are more pairs than nodes.
    fn count(&self, label: Label) -> bool {
        let mut idx = self.level.get();
        if self.levels[idx].label != label {
            while idx < self.levels.len() && self.levels[idx].label != label {
                idx += 1;
            }
            if idx == self.levels.len() {
                return false;
            }
            self.level.set(idx);
            self.seen.set(0);
        }
        self.seen.set(self.seen.get() + 1);
        self.seen.get() <= self.levels[idx].width
    }
}

fn resolve(a: Ptr, b: Ptr) -> Option<Resolved> {
    if a.is_terminal() || b.is_terminal() {
        if a.is_terminal() && b.is_terminal() && a.value() == b.value() {
            Some(Resolved::Terminal(a))
        } else {
            None
        }
    } else if a.label() != b.label() {
        None
    } else {
        Some(Resolved::Request([a, b, Ptr::NIL]))
    }
}

impl Combinator for IsomorphismProduct {
    fn slots(&self) -> usize {
        2
    }

    fn virtual_children(&self, target: Ptr) -> [Ptr; 2] {
        [target, target]
    }

    fn combine(&self, label: Label, children: &[[Ptr; 2]; MAX_SLOTS]) -> Outcome {
        if !self.count(label) {
            return Outcome::Abort;
        }
        let [f, g, _] = children;
        match (resolve(f[0], g[0]), resolve(f[1], g[1])) {
            (Some(low), Some(high)) => Outcome::Descend([low, high]),
            _ => Outcome::Abort,
        }
    }
}

/// Compares two canonical diagrams record by record.
fn linear_check(f: &Diagram, g: &Diagram) -> io::Result<bool> {
    let mut fs = NodeStream::new(f.file(), f.is_negated())?;
    let mut gs = NodeStream::new(g.file(), g.is_negated())?;
    while fs.can_pull() {
        if fs.pull()? != gs.pull()? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Whether `f` and `g` are the same diagram up to the naming of their nodes.
pub fn is_isomorphic(config: &Config, f: &Diagram, g: &Diagram) -> io::Result<bool> {
    if f.file().ptr_eq(g.file()) {
        return Ok(f.is_negated() == g.is_negated());
    }
    if f.is_terminal() || g.is_terminal() {
        return Ok(f.value() == g.value());
    }
    if f.size() != g.size() || f.levels() != g.levels() || f.number_of_terminals() != g.number_of_terminals() {
        return Ok(false);
    }
    let levels = f.level_infos()?;
    if levels != g.level_infos()? {
        return Ok(false);
    }
    if f.is_canonical() && g.is_canonical() {
        return linear_check(f, g);
    }
    if f.root().label() != g.root().label() {
        return Ok(false);
    }

    let inputs = [f, g];
    let cut = |d: &Diagram| d.max_2level_cut(crate::cut::CutType::Internal) as usize;
    let s = Sweep {
        name: "isomorphism",
        inputs: &inputs,
        bound: cut(f).max(cut(g)),
        output: false,
    };
    let result = sweep(config, &s, &IsomorphismProduct::new(levels), [f.root(), g.root(), Ptr::NIL])?;
    debug!("isomorphism: sweep ended {}", matches!(result, SweepResult::Completed));
    Ok(matches!(result, SweepResult::Completed))
}
