use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ptr::{Ptr, Uid};
use crate::types::{Id, Label};

/// A node record: its identity and its two children.
///
/// A diagram consisting of only a terminal is stored as a single node whose `uid` is that
/// terminal and whose children are nil.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub uid: Uid,
    pub low: Ptr,
    pub high: Ptr,
}

impl Node {
    /// Creates the node `(label, id)` with the given children.
    ///
    /// # Panics
    ///
    /// Panics if a child is nil or not strictly below `label`.
    pub fn new(label: Label, id: Id, low: Ptr, high: Ptr) -> Self {
        for child in [low, high] {
            assert!(!child.is_nil(), "Children of (x{}, {}) must not be nil", label, id);
            assert!(
                child.is_terminal() || child.label() > label,
                "Child {} of (x{}, {}) must be below its parent",
                child,
                label,
                id
            );
        }
        Self {
            uid: Uid::node(label, id),
            low: low.uid().as_ptr(),
            high: high.uid().as_ptr(),
        }
    }

    /// Creates the record of a terminal-only diagram.
    pub fn terminal(value: bool) -> Self {
        Self {
            uid: Uid::terminal(value),
            low: Ptr::NIL,
            high: Ptr::NIL,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.uid.is_terminal()
    }

    pub fn value(&self) -> bool {
        assert!(self.is_terminal(), "Node {} is not a terminal", self);
        self.uid.value()
    }

    pub fn label(&self) -> Label {
        self.uid.label()
    }

    pub fn id(&self) -> Id {
        self.uid.id()
    }

    /// Returns the children as `[low, high]`.
    pub fn children(&self) -> [Ptr; 2] {
        [self.low, self.high]
    }

    /// Returns the child behind the given out-index.
    pub fn child(&self, out_idx: usize) -> Ptr {
        self.children()[out_idx]
    }

    /// Negates every terminal mentioned by this record.
    pub fn negate(self) -> Self {
        Self {
            uid: if self.uid.is_terminal() {
                self.uid.as_ptr().negate().uid()
            } else {
                self.uid
            },
            low: self.low.negate(),
            high: self.high.negate(),
        }
    }

    /// Negates every terminal mentioned by this record if `negate` holds.
    pub fn negate_if(self, negate: bool) -> Self {
        if negate {
            self.negate()
        } else {
            self
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_terminal() {
            write!(f, "{}", self.uid)
        } else {
            write!(f, "{}:[{}, {}]", self.uid, self.low, self.high)
        }
    }
}
