//! Requests of product constructions.
//!
//! A request asks for the product of up to three nodes (unused slots hold `NIL`) on behalf of
//! the arc from `source`. While a request waits for the nodes of some of its slots, the
//! children of the slots already visited travel along in `carry`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::levelized_pq::LevelizedOrder;
use crate::ptr::Ptr;
use crate::sorter::Order;
use crate::types::Label;

/// Largest number of slots a request has.
pub const MAX_SLOTS: usize = 3;

/// Targets of a request, one per slot.
pub type Targets = [Ptr; MAX_SLOTS];

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub target: Targets,
    pub carry: [[Ptr; 2]; MAX_SLOTS],
    pub source: Ptr,
}

impl Request {
    pub fn new(target: Targets, source: Ptr) -> Self {
        Self {
            target,
            carry: [[Ptr::NIL; 2]; MAX_SLOTS],
            source,
        }
    }

    /// The smallest target whose slot is not carried yet, `NIL` if there is none.
    ///
    /// A request waits in the product sweep until its key is reached.
    pub fn key(&self) -> Ptr {
        (0..MAX_SLOTS)
            .filter(|&slot| !self.is_carried(slot))
            .map(|slot| self.target[slot])
            .min()
            .unwrap_or(Ptr::NIL)
    }

    /// Whether the children of `slot` travel along.
    pub fn is_carried(&self, slot: usize) -> bool {
        !self.carry[slot][0].is_nil()
    }

    /// Number of slots whose children travel along.
    pub fn carried(&self) -> usize {
        (0..MAX_SLOTS).filter(|&slot| self.is_carried(slot)).count()
    }

    /// Whether both requests ask for the same product.
    pub fn same_target(&self, other: &Request) -> bool {
        self.target == other.target
    }
}

/// Orders requests by their [key][Request::key], then by all targets, then by source.
///
/// Requests with the same targets are thereby adjacent.
#[derive(Debug, Copy, Clone, Default)]
pub struct ByKey;

impl Order<Request> for ByKey {
    fn cmp(&self, a: &Request, b: &Request) -> Ordering {
        a.key()
            .cmp(&b.key())
            .then_with(|| a.target.cmp(&b.target))
            .then_with(|| a.source.cmp(&b.source))
    }
}

impl LevelizedOrder<Request> for ByKey {
    fn level(&self, item: &Request) -> Label {
        item.key().label()
    }
}
