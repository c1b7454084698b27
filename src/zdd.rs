//! The ZDD manager.
//!
//! A Zero-suppressed Decision Diagram represents a family of sets of labels. A path to `true`
//! is a set: the labels whose high edge it takes. A label that the path skips is not in the set.
//!
//! List of basic operations over families P and Q:
//!   `empty` -- the empty family.
//!   `base` -- the family holding only the empty set.
//!   `P.union(Q)`, `P.intersect(Q)`, `P.diff(Q)` -- set operations on families.
//!   `P.project(dom)` -- remove every label outside of `dom` from each set.
//!   `P.offset(labels)` -- the sets of P that contain none of `labels`.
//!   `P.onset(labels)` -- the sets of P that contain all of `labels`.
//!
//! ```
//! use sweepdd::zdd::Zdd;
//!
//! let zdd = Zdd::default();
//! let f = zdd.union(&zdd.single([0, 1]).unwrap(), &zdd.single([2]).unwrap()).unwrap();
//! assert_eq!(zdd.count(&f).unwrap(), num_bigint::BigUint::from(2u32));
//! assert!(zdd.contains(&f, &[1, 0]).unwrap());
//! assert!(!zdd.contains(&f, &[0]).unwrap());
//! ```

use std::collections::HashMap;
use std::io;

use log::debug;
use num_bigint::BigUint;

use crate::apply::apply;
use crate::bool_op::BoolOp;
use crate::count::path_count;
use crate::diagram::{Diagram, Output};
use crate::eval::traverse;
use crate::isomorphism::is_isomorphic;
use crate::memory::Config;
use crate::node::Node;
use crate::policy::ZddPolicy;
use crate::ptr::Ptr;
use crate::quantify::quantify;
use crate::select::{select, Selection};
use crate::types::{Label, MAX_ID};
use crate::writer::NodeWriter;

/// Entry point for ZDD operations.
#[derive(Debug, Clone, Default)]
pub struct Zdd {
    config: Config,
}

impl Zdd {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn finalize(&self, output: Output) -> io::Result<Diagram> {
        output.finalize::<ZddPolicy>(&self.config)
    }

    /// Writes one node per label, bottom-up, with children given by `link` and the node below.
    fn chain<F>(&self, labels: impl IntoIterator<Item = Label>, bottom: Ptr, link: F) -> io::Result<Diagram>
    where
        F: Fn(Ptr) -> (Ptr, Ptr),
    {
        let mut labels = labels.into_iter().collect::<Vec<_>>();
        labels.sort_unstable();
        labels.dedup();
        if labels.is_empty() {
            return Diagram::terminal(bottom.value());
        }

        let mut w = NodeWriter::new()?;
        let mut current = bottom;
        for &label in labels.iter().rev() {
            let (low, high) = link(current);
            w.push(Node::new(label, MAX_ID, low, high))?;
            current = Ptr::node(label, MAX_ID);
        }
        Diagram::new(w.finish()?)
    }
}

// Builders
impl Zdd {
    /// The empty family.
    pub fn empty(&self) -> io::Result<Diagram> {
        Diagram::terminal(false)
    }

    /// The family holding only the empty set.
    pub fn base(&self) -> io::Result<Diagram> {
        Diagram::terminal(true)
    }

    /// `{{label}}`
    pub fn singleton(&self, label: Label) -> io::Result<Diagram> {
        self.single([label])
    }

    /// The family of one-element sets, one per label.
    pub fn singletons(&self, labels: impl IntoIterator<Item = Label>) -> io::Result<Diagram> {
        self.chain(labels, Ptr::FALSE, |next| (next, Ptr::TRUE))
    }

    /// The family of all subsets of `labels`.
    pub fn powerset(&self, labels: impl IntoIterator<Item = Label>) -> io::Result<Diagram> {
        self.chain(labels, Ptr::TRUE, |next| (next, next))
    }

    /// The family holding only the set `labels`.
    pub fn single(&self, labels: impl IntoIterator<Item = Label>) -> io::Result<Diagram> {
        self.chain(labels, Ptr::TRUE, |next| (Ptr::FALSE, next))
    }
}

// Operations
impl Zdd {
    fn apply(&self, f: &Diagram, g: &Diagram, op: BoolOp) -> io::Result<Diagram> {
        debug!("zdd {}(f = {:?}, g = {:?})", op, f, g);
        self.finalize(apply::<ZddPolicy>(&self.config, f, g, op)?)
    }

    pub fn union(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::Or)
    }

    /// Union of all families in `fs`; the empty family if there are none.
    pub fn union_many(&self, fs: impl IntoIterator<Item = Diagram>) -> io::Result<Diagram> {
        let mut result = self.empty()?;
        for f in fs {
            result = self.union(&result, &f)?;
        }
        Ok(result)
    }

    pub fn intersect(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::And)
    }

    /// The sets of `f` that are not in `g`.
    pub fn diff(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::Diff)
    }

    /// Removes every label outside of `dom` from each set of `f`.
    pub fn project(&self, f: &Diagram, dom: &[Label]) -> io::Result<Diagram> {
        let labels = f
            .level_infos()?
            .into_iter()
            .map(|info| info.label)
            .filter(|l| !dom.contains(l))
            .collect::<Vec<_>>();
        debug!("project(f = {:?}, dom = {:?}): removing {:?}", f, dom, labels);
        self.finalize(quantify::<ZddPolicy>(&self.config, f, &labels, BoolOp::Or)?)
    }

    fn select(&self, f: &Diagram, labels: &[Label], selection: Selection, required: bool) -> io::Result<Diagram> {
        let mut labels = labels.to_vec();
        labels.sort_unstable();
        labels.dedup();
        let levels = labels.into_iter().map(|l| (l, selection)).collect::<Vec<_>>();
        self.finalize(select(&self.config, f, &levels, required)?)
    }

    /// The sets of `f` that contain none of `labels`.
    pub fn offset(&self, f: &Diagram, labels: &[Label]) -> io::Result<Diagram> {
        debug!("offset(f = {:?}, labels = {:?})", f, labels);
        self.select(f, labels, Selection::Skip(false), false)
    }

    /// The sets of `f` that contain all of `labels`.
    ///
    /// ```
    /// use sweepdd::zdd::Zdd;
    ///
    /// let zdd = Zdd::default();
    /// let f = zdd.union(&zdd.single([0, 1]).unwrap(), &zdd.single([1, 2]).unwrap()).unwrap();
    /// assert_eq!(zdd.combinations(&zdd.onset(&f, &[2]).unwrap()).unwrap(), vec![vec![1, 2]]);
    /// ```
    pub fn onset(&self, f: &Diagram, labels: &[Label]) -> io::Result<Diagram> {
        debug!("onset(f = {:?}, labels = {:?})", f, labels);
        self.select(f, labels, Selection::Cut(false), true)
    }

    /// Whether `f` and `g` are the same family.
    pub fn equal(&self, f: &Diagram, g: &Diagram) -> io::Result<bool> {
        is_isomorphic(&self.config, f, g)
    }
}

// Queries
impl Zdd {
    /// Number of sets in the family.
    pub fn count(&self, f: &Diagram) -> io::Result<BigUint> {
        path_count(&self.config, f)
    }

    /// Whether the set `labels` is in the family `f`.
    pub fn contains(&self, f: &Diagram, labels: &[Label]) -> io::Result<bool> {
        let mut set = labels.to_vec();
        set.sort_unstable();
        set.dedup();

        let mut next = 0;
        let result = traverse(f, |node| {
            let label = node.label();
            if next < set.len() && set[next] < label {
                // The path skipped an element of the set.
                return None;
            }
            let member = next < set.len() && set[next] == label;
            next += member as usize;
            Some(member)
        })?;
        Ok(result.is_some_and(|t| t.value()) && next == set.len())
    }

    /// All sets of the family, each sorted by label.
    ///
    /// Loads the whole diagram into memory.
    pub fn combinations(&self, f: &Diagram) -> io::Result<Vec<Vec<Label>>> {
        let nodes = f
            .nodes()?
            .into_iter()
            .filter(|n| !n.is_terminal())
            .map(|n| (n.uid.as_ptr(), n))
            .collect::<HashMap<_, _>>();

        let mut result = Vec::new();
        let mut stack = vec![(f.root(), Vec::new())];
        while let Some((p, set)) = stack.pop() {
            if p.is_terminal() {
                if p.value() {
                    result.push(set);
                }
                continue;
            }
            let node = match nodes.get(&p) {
                Some(node) => node,
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Node {} is missing from its file", p),
                    ))
                }
            };
            let mut with = set.clone();
            with.push(node.label());
            stack.push((node.low, set));
            stack.push((node.high, with));
        }
        result.sort();
        Ok(result)
    }
}
