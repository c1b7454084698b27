//! Bit-packed pointers and unique identifiers.
//!
//! A [`Ptr`] is a single `u64` whose numeric order coincides with the topological order of a
//! decision diagram. From the most significant bit down, the layout is:
//!
//! ```text
//! node:     0 | label (24) | id (37) | out_idx (1) | 0
//! terminal: 1 | 0 ....................... 0 | value (1) | 0
//! nil:      1 1 1 ............................... 1 1 | 0
//! ```
//!
//! Hence all nodes come before all terminals, which come before nil. Nodes are ordered by
//! label first, then by id, and the out-index (the direction of an arc) never disturbs that.
//!
//! A [`Uid`] is a pointer with the out-index cleared, i.e. the identity of a node or terminal.

use std::fmt::{self, Debug, Display, Formatter};
use std::ops::Neg;

use serde::{Deserialize, Serialize};

use crate::types::{Id, Label, ID_BITS, MAX_ID, MAX_LABEL};

const TERMINAL_BIT: u64 = 1 << 63;
const OUT_IDX_BIT: u64 = 1 << 1;
const ID_SHIFT: u32 = 2;
const LABEL_SHIFT: u32 = ID_SHIFT + ID_BITS;
const VALUE_BIT: u64 = 1 << 1;

/// A pointer to a node (possibly with an out-index), a terminal, or nothing.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Ptr(u64);

impl Ptr {
    /// The "nothing" pointer, greater than every other pointer.
    pub const NIL: Ptr = Ptr(u64::MAX ^ 1);

    /// The `false` terminal.
    pub const FALSE: Ptr = Ptr::terminal(false);

    /// The `true` terminal.
    pub const TRUE: Ptr = Ptr::terminal(true);

    /// Creates a terminal pointer.
    pub const fn terminal(value: bool) -> Self {
        Ptr(TERMINAL_BIT | ((value as u64) << 1))
    }

    /// Creates a pointer to the node `(label, id)` with out-index 0.
    ///
    /// # Panics
    ///
    /// Panics if `label > MAX_LABEL` or `id > MAX_ID`.
    pub fn node(label: Label, id: Id) -> Self {
        assert!(label <= MAX_LABEL, "Label {} exceeds the maximum {}", label, MAX_LABEL);
        assert!(id <= MAX_ID, "Id {} exceeds the maximum {}", id, MAX_ID);
        Ptr(((label as u64) << LABEL_SHIFT) | (id << ID_SHIFT))
    }

    /// Reconstructs a pointer from its raw bits.
    pub const fn from_raw(raw: u64) -> Self {
        Ptr(raw)
    }

    /// Returns the raw bits.
    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_nil(self) -> bool {
        self.0 >= Self::NIL.0
    }

    pub const fn is_terminal(self) -> bool {
        !self.is_nil() && self.0 >= TERMINAL_BIT
    }

    pub const fn is_node(self) -> bool {
        self.0 < TERMINAL_BIT
    }

    pub const fn is_false(self) -> bool {
        self.is_terminal() && !self.value()
    }

    pub const fn is_true(self) -> bool {
        self.is_terminal() && self.value()
    }

    /// Returns the value of a terminal.
    ///
    /// The result is meaningless for non-terminals; use [`Ptr::is_terminal`] first.
    pub const fn value(self) -> bool {
        self.0 & VALUE_BIT != 0
    }

    /// Returns the label of a node.
    ///
    /// # Panics
    ///
    /// Panics if the pointer is not a node.
    pub fn label(self) -> Label {
        assert!(self.is_node(), "Pointer {} is not a node", self);
        (self.0 >> LABEL_SHIFT) as Label
    }

    /// Returns the per-level id of a node.
    ///
    /// # Panics
    ///
    /// Panics if the pointer is not a node.
    pub fn id(self) -> Id {
        assert!(self.is_node(), "Pointer {} is not a node", self);
        (self.0 >> ID_SHIFT) & MAX_ID
    }

    /// Returns the out-index of a node pointer (0 for low, 1 for high).
    pub const fn out_idx(self) -> usize {
        (self.0 & OUT_IDX_BIT != 0) as usize
    }

    /// Returns a copy of this node pointer with the given out-index.
    ///
    /// # Panics
    ///
    /// Panics if the pointer is not a node.
    pub fn with_out_idx(self, out_idx: usize) -> Self {
        assert!(self.is_node(), "Only node pointers carry an out-index, got {}", self);
        assert!(out_idx < 2, "Out-index {} is out of range", out_idx);
        Ptr((self.0 & !OUT_IDX_BIT) | ((out_idx as u64) << 1))
    }

    /// Returns the identity of this pointer, i.e. without any out-index.
    pub fn uid(self) -> Uid {
        assert!(!self.is_nil(), "Nil has no identity");
        if self.is_node() {
            Uid(Ptr(self.0 & !OUT_IDX_BIT))
        } else {
            Uid(self)
        }
    }

    /// Negates a terminal; nodes and nil are returned unchanged.
    pub const fn negate(self) -> Self {
        if self.is_terminal() {
            Ptr(self.0 ^ VALUE_BIT)
        } else {
            self
        }
    }

    /// Negates a terminal if `negate` holds.
    pub const fn negate_if(self, negate: bool) -> Self {
        if negate {
            self.negate()
        } else {
            self
        }
    }

    /// Returns the label of a node, or `None` for terminals and nil.
    pub fn level(self) -> Option<Label> {
        if self.is_node() {
            Some(self.label())
        } else {
            None
        }
    }

    /// Returns whether `self` is a node on the given level.
    pub fn is_on_level(self, label: Label) -> bool {
        self.is_node() && self.label() == label
    }
}

impl Neg for Ptr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl From<bool> for Ptr {
    fn from(value: bool) -> Self {
        Ptr::terminal(value)
    }
}

impl Display for Ptr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "nil")
        } else if self.is_terminal() {
            write!(f, "{}", if self.value() { "T" } else { "F" })
        } else {
            write!(f, "(x{}, {})", self.label(), self.id())?;
            if self.out_idx() == 1 {
                write!(f, ".1")?;
            }
            Ok(())
        }
    }
}

impl Debug for Ptr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// The unique identifier of a node or terminal.
///
/// Ordered exactly like the underlying [`Ptr`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Uid(Ptr);

impl Uid {
    pub fn node(label: Label, id: Id) -> Self {
        Uid(Ptr::node(label, id))
    }

    pub const fn terminal(value: bool) -> Self {
        Uid(Ptr::terminal(value))
    }

    /// Returns this identifier as a pointer (out-index 0).
    pub const fn as_ptr(self) -> Ptr {
        self.0
    }

    /// Returns a pointer to the `out_idx` child slot of this node.
    pub fn with_out_idx(self, out_idx: usize) -> Ptr {
        self.0.with_out_idx(out_idx)
    }

    pub const fn is_terminal(self) -> bool {
        self.0.is_terminal()
    }

    pub const fn is_node(self) -> bool {
        self.0.is_node()
    }

    pub const fn value(self) -> bool {
        self.0.value()
    }

    pub fn label(self) -> Label {
        self.0.label()
    }

    pub fn id(self) -> Id {
        self.0.id()
    }
}

impl From<Uid> for Ptr {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

impl PartialEq<Ptr> for Uid {
    fn eq(&self, other: &Ptr) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<Ptr> for Uid {
    fn partial_cmp(&self, other: &Ptr) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl Display for Uid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for Uid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
