//! Primitive types shared by the whole engine: labels, per-level ids and level metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A variable label, i.e. the level a node branches on.
///
/// Labels are processed in increasing order from the root towards the terminals.
pub type Label = u32;

/// A per-level node identifier.
pub type Id = u64;

/// Number of bits reserved for a [`Label`] inside a packed pointer.
pub const LABEL_BITS: u32 = 24;

/// Number of bits reserved for an [`Id`] inside a packed pointer.
pub const ID_BITS: u32 = 37;

/// Largest representable label.
pub const MAX_LABEL: Label = (1 << LABEL_BITS) - 1;

/// Largest representable per-level id.
pub const MAX_ID: Id = (1 << ID_BITS) - 1;

/// Metadata of one level of a levelized file.
///
/// # Invariants
///
/// - `label <= MAX_LABEL`
/// - `width > 0`, empty levels are never recorded
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub struct LevelInfo {
    pub label: Label,
    pub width: u64,
}

impl LevelInfo {
    /// Creates the metadata for a level with `width` records.
    ///
    /// # Panics
    ///
    /// Panics if `label` is out of range or `width == 0`.
    pub fn new(label: Label, width: u64) -> Self {
        assert!(label <= MAX_LABEL, "Label {} exceeds the maximum {}", label, MAX_LABEL);
        assert_ne!(width, 0, "Levels must not be empty");
        Self { label, width }
    }
}

impl fmt::Display for LevelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}#{}", self.label, self.width)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_limits() {
        assert_eq!(MAX_LABEL, 16_777_215);
        assert_eq!(MAX_ID, 137_438_953_471);
        assert_eq!(1 + LABEL_BITS + ID_BITS + 2, 64);
    }

    #[test]
    fn test_level_info() {
        let info = LevelInfo::new(3, 7);
        assert_eq!(info.label, 3);
        assert_eq!(info.width, 7);
        assert_eq!(format!("{}", info), "x3#7");
    }

    #[test]
    #[should_panic(expected = "Levels must not be empty")]
    fn test_level_info_empty_panics() {
        LevelInfo::new(0, 0);
    }
}
