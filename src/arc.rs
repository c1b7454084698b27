use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ptr::Ptr;

/// An edge of a diagram under construction.
///
/// The `source` is a node pointer whose out-index tells which child slot the arc fills; the
/// `target` is either a node or a terminal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Arc {
    pub source: Ptr,
    pub target: Ptr,
}

impl Arc {
    pub fn new(source: Ptr, target: Ptr) -> Self {
        assert!(source.is_node(), "Arc source {} must be a node", source);
        assert!(!target.is_nil(), "Arc target must not be nil");
        Self { source, target }
    }

    /// Returns whether this arc is the high (`true`) edge of its source.
    pub fn is_high(&self) -> bool {
        self.source.out_idx() == 1
    }
}

impl Display for Arc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}
