//! Sorting with bounded memory.
//!
//! A [`Sorter`] accumulates items in memory and spills them as sorted runs to temporary files
//! once its capacity is exceeded. After [`Sorter::sort`], items are pulled in order, merging
//! the runs on the fly.
//!
//! A spilled run keeps no file open: it is read in chunks, reopening its file for every chunk.
//! At most `fan_in` runs are merged at once; [`Sorter::sort`] first merges groups of runs into
//! longer ones until few enough are left.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::mem::size_of;

use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::TempPath;

use crate::file::temp_file;

/// A total order on `T`, usually a zero-sized type.
pub trait Order<T>: Copy {
    fn cmp(&self, a: &T, b: &T) -> Ordering;

    fn lt(&self, a: &T, b: &T) -> bool {
        self.cmp(a, b) == Ordering::Less
    }
}

/// Anything that can be spilled to disk.
pub trait Item: Clone + Serialize + DeserializeOwned {}

impl<T: Clone + Serialize + DeserializeOwned> Item for T {}

/// Smallest number of items an external structure keeps in memory.
pub const MIN_CAPACITY: usize = 64;

/// Number of items a run reads from disk at once.
pub const RUN_CHUNK: usize = 128;

/// Largest number of runs merged at once.
pub const MAX_FAN_IN: usize = 64;

/// Number of `T` that fit into `bytes` of memory.
pub fn items_in<T>(bytes: usize) -> usize {
    bytes / size_of::<T>().max(1)
}

/// Number of runs of `T` that can be merged at once within `bytes` of memory.
pub fn fan_in<T>(bytes: usize) -> usize {
    (items_in::<T>(bytes) / RUN_CHUNK).clamp(2, MAX_FAN_IN)
}

/// Appends items to a new run.
pub(crate) struct RunWriter<T> {
    path: TempPath,
    out: BufWriter<File>,
    len: u64,
    _marker: PhantomData<T>,
}

impl<T: Item> RunWriter<T> {
    pub(crate) fn new() -> io::Result<Self> {
        let (file, path) = temp_file()?.into_parts();
        Ok(Self {
            path,
            out: BufWriter::new(file),
            len: 0,
            _marker: PhantomData,
        })
    }

    pub(crate) fn push(&mut self, item: &T) -> io::Result<()> {
        bincode::serialize_into(&mut self.out, item).map_err(io::Error::other)?;
        self.len += 1;
        Ok(())
    }

    /// Closes the file.
    pub(crate) fn finish(mut self) -> io::Result<Run<T>> {
        self.out.flush()?;
        Ok(Run {
            path: self.path,
            offset: 0,
            remaining: self.len,
            buffer: VecDeque::new(),
        })
    }
}

/// A sorted sequence of items spilled to disk, read front to back.
pub(crate) struct Run<T> {
    path: TempPath,
    offset: u64,
    remaining: u64,
    buffer: VecDeque<T>,
}

impl<T: Item> Run<T> {
    pub(crate) fn write(items: impl IntoIterator<Item = T>) -> io::Result<Self> {
        let mut w = RunWriter::new()?;
        for item in items {
            w.push(&item)?;
        }
        w.finish()
    }

    /// Number of items not yet read.
    pub(crate) fn len(&self) -> u64 {
        self.remaining + self.buffer.len() as u64
    }

    fn refill(&mut self) -> io::Result<()> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut input = BufReader::new(file);
        let count = self.remaining.min(RUN_CHUNK as u64);
        for _ in 0..count {
            self.buffer
                .push_back(bincode::deserialize_from(&mut input).map_err(io::Error::other)?);
        }
        self.remaining -= count;
        self.offset = input.stream_position()?;
        Ok(())
    }

    pub(crate) fn next(&mut self) -> io::Result<Option<T>> {
        if self.buffer.is_empty() && self.remaining > 0 {
            self.refill()?;
        }
        Ok(self.buffer.pop_front())
    }
}

/// The head of run `run`.
struct Head<T, O> {
    item: T,
    run: usize,
    order: O,
}

impl<T, O: Order<T>> PartialEq for Head<T, O> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T, O: Order<T>> Eq for Head<T, O> {}

impl<T, O: Order<T>> PartialOrd for Head<T, O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, O: Order<T>> Ord for Head<T, O> {
    // Reversed, so that `BinaryHeap` pops the smallest head first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.item, &self.item)
            .then_with(|| other.run.cmp(&self.run))
    }
}

/// Merges sorted runs, keeping their heads in a binary heap.
pub(crate) struct Merger<T, O> {
    order: O,
    runs: Vec<Option<Run<T>>>,
    heads: BinaryHeap<Head<T, O>>,
    len: u64,
}

impl<T: Item, O: Order<T>> Merger<T, O> {
    pub(crate) fn new(order: O) -> Self {
        Self {
            order,
            runs: Vec::new(),
            heads: BinaryHeap::new(),
            len: 0,
        }
    }

    pub(crate) fn from_runs(order: O, runs: impl IntoIterator<Item = Run<T>>) -> io::Result<Self> {
        let mut merger = Self::new(order);
        for run in runs {
            merger.add(run)?;
        }
        Ok(merger)
    }

    pub(crate) fn add(&mut self, mut run: Run<T>) -> io::Result<()> {
        self.len += run.len();
        if let Some(item) = run.next()? {
            self.heads.push(Head {
                item,
                run: self.runs.len(),
                order: self.order,
            });
            self.runs.push(Some(run));
        }
        Ok(())
    }

    /// Number of items not yet pulled.
    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    /// Number of runs that still hold items.
    pub(crate) fn live_runs(&self) -> usize {
        self.heads.len()
    }

    pub(crate) fn peek(&self) -> Option<&T> {
        self.heads.peek().map(|h| &h.item)
    }

    pub(crate) fn pop(&mut self) -> io::Result<Option<T>> {
        let Some(head) = self.heads.pop() else {
            return Ok(None);
        };
        self.len -= 1;
        let next = match self.runs[head.run].as_mut() {
            Some(run) => run.next()?,
            None => None,
        };
        match next {
            Some(item) => self.heads.push(Head {
                item,
                run: head.run,
                order: self.order,
            }),
            None => self.runs[head.run] = None,
        }
        if self.heads.is_empty() {
            self.runs.clear();
        }
        Ok(Some(head.item))
    }

    /// Writes everything not yet pulled into a single run.
    pub(crate) fn into_run(mut self) -> io::Result<Run<T>> {
        let mut w = RunWriter::new()?;
        while let Some(item) = self.pop()? {
            w.push(&item)?;
        }
        w.finish()
    }
}

/// Merges groups of at most `fan_in` runs until at most `fan_in` runs are left.
pub(crate) fn merge_passes<T: Item, O: Order<T>>(order: O, mut runs: Vec<Run<T>>, fan_in: usize) -> io::Result<Vec<Run<T>>> {
    let fan_in = fan_in.max(2);
    let mut pass = 0;
    while runs.len() > fan_in {
        pass += 1;
        debug!("merge pass {}: {} runs, fan-in {}", pass, runs.len(), fan_in);
        let mut merged = Vec::with_capacity(runs.len().div_ceil(fan_in));
        let mut rest = runs.into_iter().peekable();
        while rest.peek().is_some() {
            let group = rest.by_ref().take(fan_in).collect::<Vec<_>>();
            merged.push(Merger::from_runs(order, group)?.into_run()?);
        }
        runs = merged;
    }
    Ok(runs)
}

enum State<T, O> {
    Writing,
    Reading { buffer: VecDeque<T>, merger: Merger<T, O> },
}

/// An external-memory sorter.
pub struct Sorter<T, O> {
    order: O,
    capacity: usize,
    fan_in: usize,
    buffer: Vec<T>,
    runs: Vec<Run<T>>,
    state: State<T, O>,
    size: usize,
}

impl<T: Item, O: Order<T>> Sorter<T, O> {
    /// A sorter that never spills.
    pub fn internal(order: O) -> Self {
        Self::with_capacity(usize::MAX, MAX_FAN_IN, order)
    }

    /// A sorter that keeps at most `memory` bytes worth of items in memory.
    ///
    /// Half of `memory` buffers unsorted items, the other half the runs being merged.
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
            fan_in,
            buffer: Vec::new(),
            runs: Vec::new(),
            state: State::Writing,
            size: 0,
        }
    }

    /// Memory needed to sort `items` internally.
    pub fn memory_usage(items: usize) -> usize {
        items.saturating_mul(size_of::<T>())
    }

    /// Number of items that can be sorted internally within `bytes`.
    pub fn memory_fits(bytes: usize) -> usize {
        items_in::<T>(bytes)
    }

    pub fn push(&mut self, item: T) -> io::Result<()> {
        assert!(matches!(self.state, State::Writing), "Cannot push into a sorted sorter");
        self.buffer.push(item);
        self.size += 1;
        if self.buffer.len() >= self.capacity {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> io::Result<()> {
        let order = self.order;
        self.buffer.sort_by(|a, b| order.cmp(a, b));
        trace!("sorter: spilling a run of {} items", self.buffer.len());
        let run = Run::write(self.buffer.drain(..))?;
        self.runs.push(run);
        Ok(())
    }

    /// Number of items not yet pulled.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Ends the push phase and prepares pulling in order.
    pub fn sort(&mut self) -> io::Result<()> {
        assert!(matches!(self.state, State::Writing), "Sorter is already sorted");
        let order = self.order;
        if self.runs.is_empty() {
            self.buffer.sort_by(|a, b| order.cmp(a, b));
            self.state = State::Reading {
                buffer: self.buffer.drain(..).collect(),
                merger: Merger::new(order),
            };
        } else {
            if !self.buffer.is_empty() {
                self.spill()?;
            }
            let runs = merge_passes(order, std::mem::take(&mut self.runs), self.fan_in)?;
            self.state = State::Reading {
                buffer: VecDeque::new(),
                merger: Merger::from_runs(order, runs)?,
            };
        }
        Ok(())
    }

    pub fn can_pull(&self) -> bool {
        matches!(self.state, State::Reading { .. }) && self.size > 0
    }

    /// The smallest item not yet pulled.
    pub fn top(&self) -> Option<&T> {
        match &self.state {
            State::Writing => None,
            State::Reading { buffer, merger } => buffer.front().or_else(|| merger.peek()),
        }
    }

    /// Removes and returns the smallest item.
    ///
    /// # Panics
    ///
    /// Panics if the sorter is not sorted yet or is exhausted.
    pub fn pull(&mut self) -> io::Result<T> {
        let item = match &mut self.state {
            State::Writing => panic!("Cannot pull from an unsorted sorter"),
            State::Reading { buffer, merger } => match buffer.pop_front() {
                Some(item) => Some(item),
                None => merger.pop()?,
            },
        };
        match item {
            Some(item) => {
                self.size -= 1;
                Ok(item)
            }
            None => panic!("Cannot pull from an exhausted sorter"),
        }
    }
}
