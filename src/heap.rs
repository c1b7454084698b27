//! A min-priority queue with bounded memory.
//!
//! Items live in an in-memory binary heap until its capacity is exceeded; the heap is then
//! spilled as one sorted run to disk. Runs are grouped into tiers: a new run joins tier `0`,
//! and once a tier holds `fan_in` runs they are merged into one run of the next tier. The
//! minimum is the smallest of the heap top and the heads of all tiers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io;
use std::mem::size_of;

use log::trace;

use crate::sorter::{fan_in, items_in, Item, Merger, Order, Run, MAX_FAN_IN, MIN_CAPACITY};

struct Entry<T, O> {
    item: T,
    order: O,
}

impl<T, O: Order<T>> PartialEq for Entry<T, O> {
    fn eq(&self, other: &Self) -> bool {
        self.order.cmp(&self.item, &other.item) == Ordering::Equal
    }
}

impl<T, O: Order<T>> Eq for Entry<T, O> {}

impl<T, O: Order<T>> PartialOrd for Entry<T, O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, O: Order<T>> Ord for Entry<T, O> {
    // Reversed, so that `BinaryHeap` pops the smallest item first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.order.cmp(&other.item, &self.item)
    }
}

pub struct PriorityQueue<T, O> {
    order: O,
    capacity: usize,
    fan_in: usize,
    heap: BinaryHeap<Entry<T, O>>,
    tiers: Vec<Merger<T, O>>,
    len: usize,
}

impl<T: Item, O: Order<T>> PriorityQueue<T, O> {
    /// A priority queue that never spills.
    pub fn internal(order: O) -> Self {
        Self::with_capacity(usize::MAX, MAX_FAN_IN, order)
    }

    /// A priority queue that keeps at most `memory` bytes worth of items in memory.
    ///
    /// Half of `memory` holds the heap, the other half the chunks read from runs.
    pub fn external(memory: usize, order: O) -> Self {
        Self::with_capacity(
            Self::memory_fits(memory / 2).max(MIN_CAPACITY),
            fan_in::<T>(memory / 2),
            order,
        )
    }

    pub(crate) fn with_capacity(capacity: usize, fan_in: usize, order: O) -> Self {
        Self {
            order,
            capacity,
            fan_in: fan_in.max(2),
            heap: BinaryHeap::new(),
            tiers: Vec::new(),
            len: 0,
        }
    }

    /// Memory needed to hold `items` internally.
    pub fn memory_usage(items: usize) -> usize {
        items.saturating_mul(size_of::<T>())
    }

    /// Number of items that can be held internally within `bytes`.
    pub fn memory_fits(bytes: usize) -> usize {
        items_in::<T>(bytes)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of runs that still hold items.
    pub fn runs(&self) -> usize {
        self.tiers.iter().map(|t| t.live_runs()).sum()
    }

    pub fn push(&mut self, item: T) -> io::Result<()> {
        self.heap.push(Entry { item, order: self.order });
        self.len += 1;
        if self.heap.len() >= self.capacity {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> io::Result<()> {
        trace!("priority queue: spilling a run of {} items", self.heap.len());
        // The entry order is reversed, hence so is the sorted vector.
        let sorted = std::mem::take(&mut self.heap).into_sorted_vec();
        let mut run = Run::write(sorted.into_iter().rev().map(|e| e.item))?;

        let mut tier = 0;
        loop {
            if tier == self.tiers.len() {
                self.tiers.push(Merger::new(self.order));
            }
            if self.tiers[tier].live_runs() + 1 < self.fan_in {
                return self.tiers[tier].add(run);
            }
            // The tier is full: merge it together with the new run into the next tier.
            let mut full = std::mem::replace(&mut self.tiers[tier], Merger::new(self.order));
            full.add(run)?;
            trace!("priority queue: merging {} runs of tier {}", full.live_runs(), tier);
            run = full.into_run()?;
            tier += 1;
        }
    }

    /// Where the minimum currently lives: `None` for the heap, `Some(i)` for tier `i`.
    fn locate_min(&self) -> Option<Option<usize>> {
        let mut best: Option<(Option<usize>, &T)> = self.heap.peek().map(|e| (None, &e.item));
        for (i, tier) in self.tiers.iter().enumerate() {
            if let Some(head) = tier.peek() {
                if best.map_or(true, |(_, b)| self.order.lt(head, b)) {
                    best = Some((Some(i), head));
                }
            }
        }
        best.map(|(at, _)| at)
    }

    /// The smallest item.
    pub fn top(&self) -> Option<&T> {
        match self.locate_min()? {
            None => self.heap.peek().map(|e| &e.item),
            Some(i) => self.tiers[i].peek(),
        }
    }

    /// Removes and returns the smallest item.
    pub fn pop(&mut self) -> io::Result<Option<T>> {
        let item = match self.locate_min() {
            None => None,
            Some(None) => self.heap.pop().map(|e| e.item),
            Some(Some(i)) => self.tiers[i].pop()?,
        };
        if item.is_some() {
            self.len -= 1;
        }
        Ok(item)
    }
}
