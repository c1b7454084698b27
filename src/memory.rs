//! Memory budget and strategy planning.
//!
//! Every sweep derives an upper bound on the size of its levelized priority queue from the
//! cut statistics of its inputs. Together with the memory budget of the [`Config`], that bound
//! decides once and up front whether the sweep runs with an unbucketed queue, a bucketed
//! in-memory queue, or fully external data structures.

use std::io;

use log::debug;

use crate::exec_policy::{AccessMode, ExecPolicy, MemoryMode};
use crate::levelized_pq::{no_lookahead_bound, LevelizedOrder, LevelizedPriorityQueue, QueueSetup};
use crate::sorter::Item;

/// Default memory budget: 128 MiB.
pub const DEFAULT_MEMORY_LIMIT: usize = 128 * 1024 * 1024;

/// Smallest amount of memory any auxiliary data structure gets.
pub const MIN_STRUCTURE_MEMORY: usize = 8 * 1024;

/// Configuration threaded through every operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Memory budget in bytes.
    pub memory_limit: usize,
    pub policy: ExecPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            policy: ExecPolicy::default(),
        }
    }
}

impl Config {
    pub fn with_memory_limit(mut self, memory_limit: usize) -> Self {
        self.memory_limit = memory_limit;
        self
    }

    pub fn with_policy(mut self, policy: ExecPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// The kind of levelized priority queue a sweep runs with.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Strategy {
    /// A plain in-memory priority queue without buckets.
    Unbucketed,
    /// Buckets and overflow queue in memory.
    Internal,
    /// Buckets and overflow queue spill to disk.
    External,
}

/// Splits the memory left over by a sweep's streams among its auxiliary data structures.
#[derive(Debug)]
pub struct Planner {
    policy: ExecPolicy,
    available: usize,
}

impl Planner {
    /// Reserves `streams` bytes for open streams and writers and checks that at least
    /// `structures` auxiliary data structures still fit.
    ///
    /// Nodes are only ever streamed, so [`AccessMode::RandomAccess`] is refused.
    pub fn new(config: &Config, streams: usize, structures: usize) -> io::Result<Self> {
        if config.policy.access_mode() == AccessMode::RandomAccess {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "random access to nodes is not supported, use the priority-queue access mode",
            ));
        }
        let needed = streams + structures * MIN_STRUCTURE_MEMORY;
        if config.memory_limit < needed {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!(
                    "memory budget of {} bytes is below the {} bytes needed by the smallest strategy",
                    config.memory_limit, needed
                ),
            ));
        }
        Ok(Self {
            policy: config.policy,
            available: config.memory_limit - streams,
        })
    }

    /// Memory available for auxiliary data structures.
    pub fn available(&self) -> usize {
        self.available
    }

    /// The share of `parts` out of `total` parts of the available memory.
    pub fn share(&self, parts: usize, total: usize) -> usize {
        (self.available / total) * parts
    }

    /// Whether a structure holding up to `bound` items, of which `fits` fit into its memory,
    /// has to spill to disk.
    pub fn spills(&self, bound: usize, fits: usize) -> bool {
        match self.policy.memory_mode() {
            MemoryMode::Internal => false,
            MemoryMode::External => true,
            MemoryMode::Auto => bound > fits,
        }
    }

    /// Chooses the strategy for a levelized priority queue of `T` with at most `bound`
    /// elements, given `memory` bytes, in a sweep with `degree` queues.
    pub fn choose<T: Item, O: LevelizedOrder<T>>(&self, bound: usize, memory: usize, degree: u32) -> Strategy {
        let buckets = QueueSetup::internal(memory).buckets;
        let fits = LevelizedPriorityQueue::<T, O>::memory_fits(memory, buckets);
        let max_size = match self.policy.memory_mode() {
            MemoryMode::Internal => bound.min(fits),
            _ => bound,
        };
        let external_only = self.policy.memory_mode() == MemoryMode::External;

        if !external_only && max_size <= no_lookahead_bound(degree) {
            Strategy::Unbucketed
        } else if !external_only && max_size <= fits {
            Strategy::Internal
        } else {
            Strategy::External
        }
    }

    /// Chooses a strategy and describes the matching levelized priority queue.
    pub fn queue<T: Item, O: LevelizedOrder<T>>(
        &self,
        name: &str,
        bound: usize,
        memory: usize,
        degree: u32,
    ) -> (Strategy, QueueSetup) {
        let strategy = self.choose::<T, O>(bound, memory, degree);
        debug!(
            "{}: queue bound {} with {} bytes -> {:?} ({})",
            name, bound, memory, strategy, self.policy
        );
        let setup = match strategy {
            Strategy::Unbucketed => QueueSetup::unbucketed(memory),
            Strategy::Internal => QueueSetup::internal(memory),
            Strategy::External => QueueSetup::external(memory),
        };
        (strategy, setup)
    }
}

/// Saturating conversion of a 64-bit size bound.
pub fn to_size(bound: u128) -> usize {
    bound.min(usize::MAX as u128) as usize
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::levelized_pq::LOOKAHEAD;
    use crate::request::{ByKey, Request};

    fn planner(mode: MemoryMode) -> Planner {
        let config = Config::default().with_policy(ExecPolicy::default().with_memory_mode(mode));
        Planner::new(&config, 1024, 2).unwrap()
    }

    #[test]
    fn test_small_bound_is_unbucketed() {
        let p = planner(MemoryMode::Auto);
        assert_eq!(p.choose::<Request, ByKey>(no_lookahead_bound(1), p.available(), 1), Strategy::Unbucketed);
        assert_eq!(p.choose::<Request, ByKey>(no_lookahead_bound(1) + 1, p.available(), 1), Strategy::Internal);
    }

    #[test]
    fn test_large_bound_is_external() {
        let p = planner(MemoryMode::Auto);
        assert_eq!(p.choose::<Request, ByKey>(usize::MAX, p.available(), 1), Strategy::External);
    }

    #[test]
    fn test_external_only_never_internal() {
        let p = planner(MemoryMode::External);
        for bound in [0, 1, 10, 1000, usize::MAX] {
            assert_eq!(p.choose::<Request, ByKey>(bound, p.available(), 2), Strategy::External);
        }
    }

    #[test]
    fn test_internal_only_clamps() {
        let p = planner(MemoryMode::Internal);
        assert_eq!(p.choose::<Request, ByKey>(usize::MAX, p.available(), 1), Strategy::Internal);
        assert_eq!(p.choose::<Request, ByKey>(3, p.available(), 1), Strategy::Unbucketed);
    }

    #[test]
    fn test_budget_too_small() {
        let config = Config::default().with_memory_limit(1000);
        let err = Planner::new(&config, 512, 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::OutOfMemory);
    }

    #[test]
    fn test_share() {
        let config = Config::default().with_memory_limit(10_000 + 2 * MIN_STRUCTURE_MEMORY);
        let p = Planner::new(&config, 10_000, 2).unwrap();
        assert_eq!(p.available(), 2 * MIN_STRUCTURE_MEMORY);
        assert_eq!(p.share(1, 2), MIN_STRUCTURE_MEMORY);
    }

    #[test]
    fn test_choice_follows_queue_capacity() {
        let p = planner(MemoryMode::Auto);
        let memory = 1 << 20;
        let fits = LevelizedPriorityQueue::<Request, ByKey>::memory_fits(memory, LOOKAHEAD + 1);
        assert_eq!(p.choose::<Request, ByKey>(fits, memory, 1), Strategy::Internal);
        assert_eq!(p.choose::<Request, ByKey>(fits + 1, memory, 1), Strategy::External);
    }

    #[test]
    fn test_spills() {
        assert!(planner(MemoryMode::Auto).spills(11, 10));
        assert!(!planner(MemoryMode::Auto).spills(10, 10));
        assert!(planner(MemoryMode::External).spills(0, 10));
        assert!(!planner(MemoryMode::Internal).spills(usize::MAX, 10));
    }

    #[test]
    fn test_random_access_is_refused() {
        let config = Config::default().with_policy(ExecPolicy::default().with_access_mode(AccessMode::RandomAccess));
        let err = Planner::new(&config, 1024, 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        let config = Config::default().with_policy(ExecPolicy::default().with_access_mode(AccessMode::PriorityQueue));
        assert!(Planner::new(&config, 1024, 1).is_ok());
    }
}
