//! The levelized priority queue.
//!
//! Requests pushed during a sweep are replayed one level at a time, each level sorted by the
//! queue's [`Order`]. The levels that can occur are known up front from the input files'
//! metadata, so a small number of *buckets* is bound to the next upcoming levels: a push for a
//! bucket's level lands in that bucket's [`Sorter`], everything else goes into an *overflow*
//! [`PriorityQueue`]. When a level is set up, its bucket is sorted and merged on the fly with
//! the overflow items of the same level.
//!
//! With zero buckets the queue degenerates into a plain priority queue, which is the cheapest
//! choice for small inputs.

use std::collections::VecDeque;
use std::io;
use std::mem::size_of;

use log::trace;

use crate::file::{Direction, RecordFile, RecordReader};
use crate::heap::PriorityQueue;
use crate::sorter::{Item, Order, Sorter};
use crate::types::{Label, LevelInfo};

/// Number of levels beyond the current one that have a bucket by default.
pub const LOOKAHEAD: usize = 1;

/// Bound on the number of elements below which the queue should not bother with buckets.
///
/// The `degree` is the number of queues a sweep uses side by side.
pub fn no_lookahead_bound(degree: u32) -> usize {
    8 * (1 << degree)
}

/// The order of a levelized priority queue, which also knows the level of each item.
///
/// The order must be consistent with levels: items on an earlier level are smaller.
pub trait LevelizedOrder<T>: Order<T> {
    fn level(&self, item: &T) -> Label;

    /// Whether levels are visited bottom-up.
    fn descending(&self) -> bool {
        false
    }

    /// Whether level `a` is visited before level `b`.
    fn level_before(&self, a: Label, b: Label) -> bool {
        if self.descending() {
            a > b
        } else {
            a < b
        }
    }
}

/// Merges the level metadata of several files into one ordered, duplicate-free sequence.
pub struct LevelMerger {
    readers: Vec<RecordReader<LevelInfo>>,
    heads: Vec<Option<Label>>,
    descending: bool,
}

impl LevelMerger {
    pub fn new(files: &[&RecordFile<LevelInfo>], descending: bool) -> io::Result<Self> {
        let direction = if descending {
            Direction::Reverse
        } else {
            Direction::Forward
        };
        let mut readers = Vec::with_capacity(files.len());
        let mut heads = Vec::with_capacity(files.len());
        for file in files {
            let mut reader = file.reader(direction)?;
            heads.push(if reader.can_pull() {
                Some(reader.pull()?.label)
            } else {
                None
            });
            readers.push(reader);
        }
        Ok(Self {
            readers,
            heads,
            descending,
        })
    }

    /// The next level, if any.
    pub fn peek(&self) -> Option<Label> {
        let heads = self.heads.iter().flatten().copied();
        if self.descending {
            heads.max()
        } else {
            heads.min()
        }
    }

    pub fn can_pull(&self) -> bool {
        self.peek().is_some()
    }

    /// Removes and returns the next level.
    pub fn pull(&mut self) -> io::Result<Option<Label>> {
        let next = match self.peek() {
            Some(next) => next,
            None => return Ok(None),
        };
        for (reader, head) in self.readers.iter_mut().zip(self.heads.iter_mut()) {
            if *head == Some(next) {
                *head = if reader.can_pull() {
                    Some(reader.pull()?.label)
                } else {
                    None
                };
            }
        }
        Ok(Some(next))
    }
}

/// How a levelized priority queue is backed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct QueueSetup {
    /// Number of buckets, zero for a plain priority queue.
    pub buckets: usize,
    /// Memory in bytes for all buckets and the overflow queue together.
    pub memory: usize,
    /// Whether the structures may spill to disk.
    pub external: bool,
}

impl QueueSetup {
    pub fn unbucketed(memory: usize) -> Self {
        Self {
            buckets: 0,
            memory,
            external: false,
        }
    }

    pub fn internal(memory: usize) -> Self {
        Self {
            buckets: LOOKAHEAD + 1,
            memory,
            external: false,
        }
    }

    pub fn external(memory: usize) -> Self {
        Self {
            buckets: LOOKAHEAD + 1,
            memory,
            external: true,
        }
    }
}

struct Bucket<T, O> {
    level: Label,
    sorter: Sorter<T, O>,
}

pub struct LevelizedPriorityQueue<T, O> {
    order: O,
    setup: QueueSetup,
    merger: LevelMerger,
    buckets: VecDeque<Bucket<T, O>>,
    current: Option<Bucket<T, O>>,
    overflow: PriorityQueue<T, O>,
    current_level: Option<Label>,
    size: usize,
}

impl<T: Item, O: LevelizedOrder<T>> LevelizedPriorityQueue<T, O> {
    /// Creates a queue whose buckets follow the levels of the given files.
    pub fn new(levels: &[&RecordFile<LevelInfo>], order: O, setup: QueueSetup) -> io::Result<Self> {
        let merger = LevelMerger::new(levels, order.descending())?;
        let overflow = if setup.external {
            PriorityQueue::external(setup.memory / (setup.buckets + 1), order)
        } else {
            PriorityQueue::internal(order)
        };
        let mut pq = Self {
            order,
            setup,
            merger,
            buckets: VecDeque::with_capacity(setup.buckets),
            current: None,
            overflow,
            current_level: None,
            size: 0,
        };
        pq.refill_buckets()?;
        Ok(pq)
    }

    /// Memory needed to hold `items` elements internally with `buckets` buckets.
    pub fn memory_usage(items: usize, buckets: usize) -> usize {
        items.saturating_mul(size_of::<T>()).saturating_mul(buckets + 1)
    }

    /// Number of elements that fit internally into `bytes` with `buckets` buckets.
    pub fn memory_fits(bytes: usize, buckets: usize) -> usize {
        bytes / (size_of::<T>().max(1) * (buckets + 1))
    }

    fn new_sorter(&self) -> Sorter<T, O> {
        if self.setup.external {
            Sorter::external(self.setup.memory / (self.setup.buckets + 1), self.order)
        } else {
            Sorter::internal(self.order)
        }
    }

    fn refill_buckets(&mut self) -> io::Result<()> {
        while self.buckets.len() < self.setup.buckets {
            let last = self.buckets.back().map(|b| b.level).or(self.current_level);
            let level = match self.merger.pull()? {
                Some(level) => level,
                None => break,
            };
            if let Some(last) = last {
                if !self.order.level_before(last, level) {
                    continue;
                }
            }
            let sorter = self.new_sorter();
            self.buckets.push_back(Bucket { level, sorter });
        }
        Ok(())
    }

    /// The level currently being replayed.
    pub fn current_level(&self) -> Option<Label> {
        self.current_level
    }

    /// Whether any level has been set up yet.
    pub fn has_current_level(&self) -> bool {
        self.current_level.is_some()
    }

    /// Total number of elements in the queue.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Adds an element on the current or a later level.
    ///
    /// # Panics
    ///
    /// Panics if the element belongs to an earlier level than the current one.
    pub fn push(&mut self, item: T) -> io::Result<()> {
        let level = self.order.level(&item);
        if let Some(current) = self.current_level {
            assert!(
                !self.order.level_before(level, current),
                "Cannot push to level {} while at level {}",
                level,
                current
            );
        }
        self.size += 1;
        match self.buckets.iter_mut().find(|b| b.level == level) {
            Some(bucket) => bucket.sorter.push(item),
            None => self.overflow.push(item),
        }
    }

    /// The next level with elements, if any.
    fn next_nonempty_level(&self) -> Option<Label> {
        let bucket = self.buckets.iter().find(|b| !b.sorter.is_empty()).map(|b| b.level);
        let overflow = self.overflow.top().map(|item| self.order.level(item));
        match (bucket, overflow) {
            (Some(a), Some(b)) => Some(if self.order.level_before(b, a) { b } else { a }),
            (a, b) => a.or(b),
        }
    }

    /// Advances to the next level that has elements, or to `stop` if that comes first.
    ///
    /// # Panics
    ///
    /// Panics if the current level still has elements, or if there is nothing to advance to.
    pub fn setup_next_level(&mut self, stop: Option<Label>) -> io::Result<()> {
        assert!(self.empty_level(), "Current level {:?} is not done yet", self.current_level);

        let next = match (self.next_nonempty_level(), stop) {
            (Some(a), Some(b)) => {
                if self.order.level_before(b, a) {
                    b
                } else {
                    a
                }
            }
            (a, b) => match a.or(b) {
                Some(level) => level,
                None => panic!("There is no next level after {:?}", self.current_level),
            },
        };

        while let Some(front) = self.buckets.front() {
            if !self.order.level_before(front.level, next) {
                break;
            }
            assert!(front.sorter.is_empty(), "Skipped bucket for level {} is not empty", front.level);
            self.buckets.pop_front();
        }

        let take_front = matches!(self.buckets.front(), Some(front) if front.level == next);
        self.current = if take_front { self.buckets.pop_front() } else { None };
        if let Some(bucket) = self.current.as_mut() {
            bucket.sorter.sort()?;
        }
        self.current_level = Some(next);
        self.refill_buckets()?;

        trace!(
            "levelized pq: level {} set up ({} elements, {} in overflow)",
            next,
            self.size,
            self.overflow.len()
        );
        Ok(())
    }

    fn overflow_top_on_level(&self) -> Option<&T> {
        let level = self.current_level?;
        self.overflow.top().filter(|item| self.order.level(item) == level)
    }

    /// Whether the current level has no more elements.
    pub fn empty_level(&self) -> bool {
        !self.can_pull()
    }

    /// Whether the current level has more elements.
    pub fn can_pull(&self) -> bool {
        self.current.as_ref().map_or(false, |b| b.sorter.can_pull()) || self.overflow_top_on_level().is_some()
    }

    /// Whether the next element comes from the bucket rather than the overflow queue.
    fn from_bucket(&self) -> Option<bool> {
        let bucket = self.current.as_ref().and_then(|b| b.sorter.top());
        let overflow = self.overflow_top_on_level();
        match (bucket, overflow) {
            (None, None) => None,
            (Some(_), None) => Some(true),
            (None, Some(_)) => Some(false),
            (Some(a), Some(b)) => Some(!self.order.lt(b, a)),
        }
    }

    /// The smallest element on the current level.
    pub fn top(&self) -> Option<&T> {
        match self.from_bucket()? {
            true => self.current.as_ref().and_then(|b| b.sorter.top()),
            false => self.overflow_top_on_level(),
        }
    }

    /// Removes and returns the smallest element on the current level.
    ///
    /// # Panics
    ///
    /// Panics if the current level is empty.
    pub fn pull(&mut self) -> io::Result<T> {
        let item = match self.from_bucket() {
            Some(true) => match self.current.as_mut() {
                Some(bucket) => bucket.sorter.pull()?,
                None => unreachable!("bucket was just found"),
            },
            Some(false) => match self.overflow.pop()? {
                Some(item) => item,
                None => unreachable!("overflow was just found non-empty"),
            },
            None => panic!("Cannot pull from empty level {:?}", self.current_level),
        };
        self.size -= 1;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use test_log::test;

    use super::*;

    /// Items are `(level, payload)`.
    #[derive(Copy, Clone)]
    struct ByLevel;

    impl Order<(Label, u64)> for ByLevel {
        fn cmp(&self, a: &(Label, u64), b: &(Label, u64)) -> Ordering {
            a.cmp(b)
        }
    }

    impl LevelizedOrder<(Label, u64)> for ByLevel {
        fn level(&self, item: &(Label, u64)) -> Label {
            item.0
        }
    }

    #[derive(Copy, Clone)]
    struct ByLevelDesc;

    impl Order<(Label, u64)> for ByLevelDesc {
        fn cmp(&self, a: &(Label, u64), b: &(Label, u64)) -> Ordering {
            b.cmp(a)
        }
    }

    impl LevelizedOrder<(Label, u64)> for ByLevelDesc {
        fn level(&self, item: &(Label, u64)) -> Label {
            item.0
        }

        fn descending(&self) -> bool {
            true
        }
    }

    fn levels(labels: &[Label]) -> RecordFile<LevelInfo> {
        RecordFile::from_records(labels.iter().map(|&l| LevelInfo::new(l, 1))).unwrap()
    }

    #[test]
    fn test_merger() {
        let a = levels(&[0, 2, 4]);
        let b = levels(&[1, 2, 5]);
        let mut merger = LevelMerger::new(&[&a, &b], false).unwrap();
        let mut res = Vec::new();
        while let Some(l) = merger.pull().unwrap() {
            res.push(l);
        }
        assert_eq!(res, vec![0, 1, 2, 4, 5]);

        let mut merger = LevelMerger::new(&[&a, &b], true).unwrap();
        assert_eq!(merger.peek(), Some(5));
        merger.pull().unwrap();
        assert_eq!(merger.pull().unwrap(), Some(4));
    }

    #[test]
    fn test_buckets_and_overflow() {
        let f = levels(&[0, 1, 2, 3, 4]);
        let mut pq = LevelizedPriorityQueue::new(&[&f], ByLevel, QueueSetup::internal(1 << 20)).unwrap();

        pq.push((1, 3)).unwrap();
        pq.push((1, 1)).unwrap();
        pq.push((4, 0)).unwrap(); // overflow
        pq.push((0, 9)).unwrap();
        assert_eq!(pq.size(), 4);

        pq.setup_next_level(None).unwrap();
        assert_eq!(pq.current_level(), Some(0));
        assert_eq!(pq.pull().unwrap(), (0, 9));
        assert!(pq.empty_level());

        pq.push((2, 5)).unwrap();
        pq.push((1, 2)).unwrap();
        pq.setup_next_level(None).unwrap();
        assert_eq!(pq.current_level(), Some(1));
        assert_eq!(pq.top(), Some(&(1, 1)));
        assert_eq!(pq.pull().unwrap(), (1, 1));
        assert_eq!(pq.pull().unwrap(), (1, 2));
        assert_eq!(pq.pull().unwrap(), (1, 3));

        pq.setup_next_level(None).unwrap();
        assert_eq!(pq.pull().unwrap(), (2, 5));

        pq.setup_next_level(None).unwrap();
        assert_eq!(pq.current_level(), Some(4));
        assert_eq!(pq.pull().unwrap(), (4, 0));
        assert!(pq.is_empty());
    }

    #[test]
    fn test_stop_level() {
        let f = levels(&[0, 1, 2, 3]);
        let mut pq = LevelizedPriorityQueue::new(&[&f], ByLevel, QueueSetup::internal(1 << 20)).unwrap();
        pq.push((3, 0)).unwrap();
        pq.setup_next_level(Some(1)).unwrap();
        assert_eq!(pq.current_level(), Some(1));
        assert!(pq.empty_level());
        pq.push((2, 1)).unwrap();
        pq.setup_next_level(Some(3)).unwrap();
        assert_eq!(pq.current_level(), Some(2));
        assert_eq!(pq.pull().unwrap(), (2, 1));
    }

    #[test]
    #[should_panic(expected = "Cannot push to level")]
    fn test_push_before_current_panics() {
        let f = levels(&[0, 1]);
        let mut pq = LevelizedPriorityQueue::new(&[&f], ByLevel, QueueSetup::internal(1 << 20)).unwrap();
        pq.push((1, 0)).unwrap();
        pq.setup_next_level(None).unwrap();
        pq.push((0, 0)).unwrap();
    }

    #[test]
    fn test_descending_levels() {
        let f = levels(&[0, 1, 2]);
        let mut pq = LevelizedPriorityQueue::new(&[&f], ByLevelDesc, QueueSetup::internal(1 << 20)).unwrap();
        pq.push((0, 1)).unwrap();
        pq.push((2, 1)).unwrap();
        pq.push((2, 7)).unwrap();
        pq.setup_next_level(None).unwrap();
        assert_eq!(pq.current_level(), Some(2));
        assert_eq!(pq.pull().unwrap(), (2, 7));
        assert_eq!(pq.pull().unwrap(), (2, 1));
        pq.setup_next_level(None).unwrap();
        assert_eq!(pq.current_level(), Some(0));
    }

    fn random_replay(setup: QueueSetup, seed: u64) {
        let labels: Vec<Label> = (0..40).collect();
        let f = levels(&labels);
        let mut pq = LevelizedPriorityQueue::new(&[&f], ByLevel, setup).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut pushed = Vec::new();
        let mut pulled = Vec::new();
        let mut counter = 0u64;
        for _ in 0..200 {
            let item = (rng.random_range(0..40), counter);
            counter += 1;
            pq.push(item).unwrap();
            pushed.push(item);
        }

        let mut last_level = None;
        while !pq.is_empty() {
            pq.setup_next_level(None).unwrap();
            let level = pq.current_level().unwrap();
            if let Some(last) = last_level {
                assert!(last < level, "levels must strictly increase");
            }
            last_level = Some(level);

            let mut prev: Option<(Label, u64)> = None;
            while pq.can_pull() {
                let item = pq.pull().unwrap();
                assert_eq!(item.0, level);
                if let Some(p) = prev {
                    assert!(p < item);
                }
                prev = Some(item);
                pulled.push(item);

                // Forward some work to later levels.
                if level + 1 < 40 && rng.random_bool(0.5) {
                    let next = (rng.random_range(level + 1..40), counter);
                    counter += 1;
                    pq.push(next).unwrap();
                    pushed.push(next);
                }
            }
        }

        pushed.sort();
        pulled.sort();
        assert_eq!(pushed, pulled);
    }

    #[test]
    fn test_random_replay_internal() {
        random_replay(QueueSetup::internal(1 << 20), 11);
    }

    #[test]
    fn test_random_replay_unbucketed() {
        random_replay(QueueSetup::unbucketed(1 << 20), 12);
    }

    #[test]
    fn test_random_replay_external() {
        random_replay(QueueSetup::external(64), 13);
    }

    #[test]
    fn test_memory_accounting() {
        type Pq = LevelizedPriorityQueue<(Label, u64), ByLevel>;
        let item = size_of::<(Label, u64)>();
        assert_eq!(Pq::memory_usage(10, 2), 30 * item);
        assert_eq!(Pq::memory_fits(30 * item, 2), 10);
        assert_eq!(Pq::memory_fits(30 * item, 0), 30);
        assert_eq!(no_lookahead_bound(1), 16);
    }
}
