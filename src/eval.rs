//! Evaluation of a diagram along a single path.
//!
//! A path from the root only ever moves to larger pointers, so one top-down pass over the node
//! file finds every node on it.

use std::io;

use log::trace;

use crate::diagram::Diagram;
use crate::node::Node;
use crate::ptr::Ptr;
use crate::stream::NodeStream;
use crate::types::Label;

/// Follows the path chosen by `visit` and returns the terminal it ends in.
///
/// `visit` is called with every node on the path and picks the high (`true`) or the low
/// (`false`) child. Returning `None` stops the walk, and `None` is returned.
pub fn traverse<F>(f: &Diagram, mut visit: F) -> io::Result<Option<Ptr>>
where
    F: FnMut(&Node) -> Option<bool>,
{
    let mut target = f.root();
    if target.is_terminal() {
        return Ok(Some(target));
    }

    let mut stream = NodeStream::new(f.file(), f.is_negated())?;
    while stream.can_pull() {
        let node = stream.pull()?;
        if node.uid != target {
            continue;
        }
        match visit(&node) {
            Some(branch) => target = node.child(branch as usize),
            None => return Ok(None),
        }
        trace!("traverse: {} -> {}", node, target);
        if target.is_terminal() {
            return Ok(Some(target));
        }
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Node {} is missing from its file", target),
    ))
}

/// Evaluates the BDD `f` under `assignment`, which gives the value of every variable.
pub fn eval<F>(f: &Diagram, assignment: F) -> io::Result<bool>
where
    F: Fn(Label) -> bool,
{
    let result = traverse(f, |node| Some(assignment(node.label())))?;
    Ok(result.is_some_and(|t| t.value()))
}

/// The path to `true` of the BDD `f` that prefers the low (`prefer_high = false`) or the high
/// child wherever that does not lead to `false`, as `(label, value)` pairs.
///
/// This is the lexicographically smallest or largest satisfying assignment, restricted to the
/// variables on its path. `None` if `f` is unsatisfiable.
pub fn sat_path(f: &Diagram, prefer_high: bool) -> io::Result<Option<Vec<(Label, bool)>>> {
    if f.is_false() {
        return Ok(None);
    }
    let mut path = Vec::new();
    let end = traverse(f, |node| {
        // Only the `false` terminal is unsatisfiable in a reduced BDD.
        let preferred = node.child(prefer_high as usize);
        let branch = if preferred.is_terminal() && !preferred.value() {
            !prefer_high
        } else {
            prefer_high
        };
        path.push((node.label(), branch));
        Some(branch)
    })?;
    Ok(end.filter(|t| t.value()).map(|_| path))
}

/// Evaluates the BDD `f` on the variables set to `true` in `values`; the others are `false`.
pub fn eval_slice(f: &Diagram, values: &[bool]) -> io::Result<bool> {
    eval(f, |label| values.get(label as usize).copied().unwrap_or(false))
}
