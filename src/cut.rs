//! Cut sizes: the number of arcs crossing one (or two) level boundaries.
//!
//! Cuts are tracked per [`CutType`], i.e. depending on which terminal arcs are counted, since an
//! operation that shortcuts on a terminal never needs to queue requests for it.

use serde::{Deserialize, Serialize};

/// Which arcs a cut includes besides the internal ones.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CutType {
    Internal,
    InternalFalse,
    InternalTrue,
    All,
}

impl CutType {
    pub const ALL: [CutType; 4] = [
        CutType::Internal,
        CutType::InternalFalse,
        CutType::InternalTrue,
        CutType::All,
    ];

    /// Selects the cut type including the given terminal arcs.
    pub fn with(false_arcs: bool, true_arcs: bool) -> Self {
        match (false_arcs, true_arcs) {
            (false, false) => CutType::Internal,
            (true, false) => CutType::InternalFalse,
            (false, true) => CutType::InternalTrue,
            (true, true) => CutType::All,
        }
    }

    pub fn includes(self, value: bool) -> bool {
        match self {
            CutType::Internal => false,
            CutType::InternalFalse => !value,
            CutType::InternalTrue => value,
            CutType::All => true,
        }
    }

    /// Number of terminal values this cut type includes.
    pub fn number_of_terminals(self) -> u64 {
        self.includes(false) as u64 + self.includes(true) as u64
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One cut size per [`CutType`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct Cuts([u64; 4]);

impl Cuts {
    /// Every cut type set to the same value.
    pub fn uniform(value: u64) -> Self {
        Cuts([value; 4])
    }

    /// Cuts of one level boundary crossed by `internal` node arcs and the given terminal arcs.
    pub fn from_counts(internal: u64, terminals: [u64; 2]) -> Self {
        let mut cuts = Cuts::default();
        for ct in CutType::ALL {
            let mut value = internal;
            for (v, &count) in terminals.iter().enumerate() {
                if ct.includes(v == 1) {
                    value += count;
                }
            }
            cuts.set(ct, value);
        }
        cuts
    }

    pub fn get(&self, ct: CutType) -> u64 {
        self.0[ct.index()]
    }

    pub fn set(&mut self, ct: CutType, value: u64) {
        self.0[ct.index()] = value;
    }

    /// Point-wise maximum.
    pub fn max(self, other: Cuts) -> Cuts {
        let mut res = self;
        for i in 0..4 {
            res.0[i] = res.0[i].max(other.0[i]);
        }
        res
    }

    /// Point-wise minimum with a single bound.
    pub fn clamp_to(self, bound: u64) -> Cuts {
        let mut res = self;
        for value in res.0.iter_mut() {
            *value = (*value).min(bound);
        }
        res
    }

    /// Upper bounds for a diagram with `nodes` internal nodes and the given terminal arc counts.
    ///
    /// Every cut contains at most `nodes + 1` arcs into nodes, and no more arcs than there are
    /// in total.
    pub fn fixup(self, nodes: u64, terminals: [u64; 2]) -> Cuts {
        let mut res = self;
        let total_arcs = 2 * nodes;
        for ct in CutType::ALL {
            let mut bound = nodes + 1;
            let mut terminal_arcs = 0;
            for (v, &count) in terminals.iter().enumerate() {
                if ct.includes(v == 1) {
                    terminal_arcs += count;
                }
            }
            bound = bound.saturating_add(terminal_arcs);
            let all = total_arcs
                .saturating_sub(terminals[0] + terminals[1])
                .saturating_add(terminal_arcs)
                + 1;
            res.set(ct, res.get(ct).min(bound).min(all));
        }
        res
    }

    /// Bound on 2-level cuts derived from 1-level cuts.
    ///
    /// A 2-level cut is at most 3/2 of the internal 1-level cut plus the counted terminal arcs.
    pub fn two_level_bound(one_level: Cuts, terminals: [u64; 2]) -> Cuts {
        let internal = one_level.get(CutType::Internal);
        let mut res = Cuts::default();
        for ct in CutType::ALL {
            let mut terminal_arcs = 0;
            for (v, &count) in terminals.iter().enumerate() {
                if ct.includes(v == 1) {
                    terminal_arcs += count;
                }
            }
            res.set(ct, (3 * internal) / 2 + terminal_arcs);
        }
        res
    }
}
