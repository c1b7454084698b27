//! The generic top-down product construction.
//!
//! A sweep visits the product of up to three diagrams level by level. Requests for tuples of
//! nodes are kept in one priority queue per number of slots already visited: queue `0` is a
//! levelized priority queue ordered by the smallest target, queue `k` holds requests with `k`
//! visited slots ordered by the smallest target not visited yet. Each input is read by a single
//! forward cursor, so all nodes of a tuple that live on the same level are collected by moving
//! the request from queue to queue, carrying the children seen so far.
//!
//! What the product of a tuple is, is decided by a [`Combinator`]. Apply, if-then-else,
//! quantification and the isomorphism check only differ in their combinator.

use std::io;

use log::{debug, trace};

use crate::arc::Arc;
use crate::diagram::Diagram;
use crate::file::ArcFile;
use crate::heap::PriorityQueue;
use crate::levelized_pq::LevelizedPriorityQueue;
use crate::memory::{Config, Planner};
use crate::node::Node;
use crate::ptr::{Ptr, Uid};
use crate::request::{ByKey, Request, Targets, MAX_SLOTS};
use crate::stream::NodeStream;
use crate::types::{Label, LevelInfo};
use crate::writer::ArcWriter;

/// Where one child of a product node leads.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Resolved {
    Terminal(Ptr),
    Request(Targets),
}

/// What becomes of one tuple of the product.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Outcome {
    /// Output a node with these children.
    Node([Resolved; 2]),
    /// Output nothing; the parents point to the resolution instead.
    Skip(Resolved),
    /// Output nothing and visit the children without a parent.
    Descend([Resolved; 2]),
    /// Stop the sweep.
    Abort,
}

/// Decides the product of the sweep.
pub trait Combinator {
    /// Number of slots of a request.
    fn slots(&self) -> usize;

    /// The input that serves the given slot.
    fn input_of(&self, slot: usize) -> usize {
        slot
    }

    /// Children of `target` in a slot whose node is not on the current level.
    fn virtual_children(&self, target: Ptr) -> [Ptr; 2];

    /// Combines the children `[low, high]` of every slot at level `label`.
    ///
    /// Unused slots have `NIL` children.
    fn combine(&self, label: Label, children: &[[Ptr; 2]; MAX_SLOTS]) -> Outcome;
}

/// How a sweep ended.
pub enum SweepResult {
    /// The unreduced product.
    Arcs(ArcFile),
    /// The product is a terminal.
    Terminal(bool),
    /// The sweep ran to the end without output.
    Completed,
    /// The combinator stopped the sweep.
    Aborted,
}

/// Parameters of one sweep.
pub struct Sweep<'a> {
    /// Name used in log messages.
    pub name: &'a str,
    pub inputs: &'a [&'a Diagram],
    /// Upper bound on the number of requests in queue `0` at any time.
    pub bound: usize,
    /// Whether an arc file is written.
    pub output: bool,
}

/// A forward cursor into one input.
struct Cursor {
    stream: NodeStream,
    current: Option<Node>,
}

impl Cursor {
    fn new(diagram: &Diagram) -> io::Result<Self> {
        Ok(Self {
            stream: NodeStream::new(diagram.file(), diagram.is_negated())?,
            current: None,
        })
    }

    /// Moves forward until the cursor is at `target` or past it.
    fn seek(&mut self, target: Ptr) -> io::Result<()> {
        while self.current.map_or(true, |n| n.uid < target) && self.stream.can_pull() {
            self.current = Some(self.stream.pull()?);
        }
        Ok(())
    }

    fn at(&self, target: Ptr) -> Option<Node> {
        self.current.filter(|n| n.uid == target)
    }
}

struct Queues {
    first: LevelizedPriorityQueue<Request, ByKey>,
    rest: Vec<PriorityQueue<Request, ByKey>>,
}

impl Queues {
    fn rest_is_empty(&self) -> bool {
        self.rest.iter().all(|pq| pq.is_empty())
    }

    fn size(&self) -> usize {
        self.first.size() + self.rest.iter().map(|pq| pq.len()).sum::<usize>()
    }

    fn top(&self, k: usize) -> Option<&Request> {
        if k == 0 {
            self.first.top()
        } else {
            self.rest[k - 1].top()
        }
    }

    /// The queue holding the smallest key; on ties the one with more visited slots.
    fn next_queue(&self, slots: usize) -> Option<usize> {
        let mut best: Option<(usize, Ptr)> = None;
        for k in 0..slots {
            if let Some(r) = self.top(k) {
                let key = r.key();
                if best.map_or(true, |(_, b)| key <= b) {
                    best = Some((k, key));
                }
            }
        }
        best.map(|(k, _)| k)
    }

    fn pull(&mut self, k: usize) -> io::Result<Request> {
        if k == 0 {
            self.first.pull()
        } else {
            match self.rest[k - 1].pop()? {
                Some(r) => Ok(r),
                None => panic!("Cannot pull from empty queue {}", k),
            }
        }
    }

    /// Pulls the next request of queue `k` if it asks for the same tuple as `req`.
    fn pull_same(&mut self, k: usize, req: &Request) -> io::Result<Option<Request>> {
        match self.top(k) {
            Some(top) if top.same_target(req) => Ok(Some(self.pull(k)?)),
            _ => Ok(None),
        }
    }

    fn push(&mut self, k: usize, req: Request) -> io::Result<()> {
        if k == 0 {
            self.first.push(req)
        } else {
            self.rest[k - 1].push(req)
        }
    }
}

/// Runs a product construction from the tuple `root`.
pub fn sweep<C: Combinator>(config: &Config, sweep: &Sweep<'_>, combinator: &C, root: Targets) -> io::Result<SweepResult> {
    let slots = combinator.slots();
    assert!((1..=MAX_SLOTS).contains(&slots), "A sweep has between 1 and {} slots", MAX_SLOTS);

    let mut streams = sweep.inputs.len() * NodeStream::memory_usage();
    if sweep.output {
        streams += ArcWriter::memory_usage();
    }
    let planner = Planner::new(config, streams, slots)?;
    let first_parts = crate::levelized_pq::LOOKAHEAD + 2;
    let total_parts = first_parts + slots - 1;
    let (_, setup) = planner.queue::<Request, ByKey>(
        sweep.name,
        sweep.bound,
        planner.share(first_parts, total_parts),
        slots as u32,
    );
    let rest_memory = planner.share(1, total_parts);
    let rest_external = planner.spills(sweep.bound, PriorityQueue::<Request, ByKey>::memory_fits(rest_memory));

    let levels: Vec<_> = sweep.inputs.iter().map(|d| d.file().levels()).collect();
    let mut queues = Queues {
        first: LevelizedPriorityQueue::new(&levels, ByKey, setup)?,
        rest: (1..slots)
            .map(|_| {
                if rest_external {
                    PriorityQueue::external(rest_memory, ByKey)
                } else {
                    PriorityQueue::internal(ByKey)
                }
            })
            .collect(),
    };
    let mut cursors = sweep.inputs.iter().map(|d| Cursor::new(d)).collect::<io::Result<Vec<_>>>()?;
    let mut writer = if sweep.output { Some(ArcWriter::new()?) } else { None };

    queues.push(0, Request::new(root, Ptr::NIL))?;
    let mut label: Label = 0;
    let mut out_id = 0;
    let mut max_cut = 0;
    let mut visited = 0u64;

    loop {
        if queues.first.empty_level() && queues.rest_is_empty() {
            if out_id > 0 {
                if let Some(w) = writer.as_mut() {
                    w.push_level(LevelInfo::new(label, out_id))?;
                }
            }
            if queues.first.is_empty() {
                break;
            }
            queues.first.setup_next_level(None)?;
            label = match queues.first.current_level() {
                Some(label) => label,
                None => unreachable!("a level was just set up"),
            };
            out_id = 0;
            max_cut = max_cut.max(queues.size());
            trace!("{}: level x{} with {} requests", sweep.name, label, queues.size());
        }

        let k = match queues.next_queue(slots) {
            Some(k) => k,
            None => unreachable!("level x{} has requests", label),
        };
        let req = queues.pull(k)?;
        visited += 1;
        let seek = req.key();
        for cursor in cursors.iter_mut() {
            cursor.seek(seek)?;
        }

        // Visit the slots whose node is on this level.
        let mut carried = req;
        let mut missing = false;
        for slot in 0..slots {
            let t = req.target[slot];
            if req.is_carried(slot) || !t.is_on_level(label) {
                continue;
            }
            match cursors[combinator.input_of(slot)].at(t) {
                Some(node) => carried.carry[slot] = node.children(),
                None => missing = true,
            }
        }

        if missing {
            let next = carried.carried();
            if next <= k {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Node {} is missing from its file", seek),
                ));
            }
            let mut current = Some(req);
            while let Some(r) = current {
                let mut forward = carried;
                forward.source = r.source;
                queues.push(next, forward)?;
                current = queues.pull_same(k, &req)?;
            }
            continue;
        }

        let mut children = [[Ptr::NIL; 2]; MAX_SLOTS];
        for (slot, child) in children.iter_mut().enumerate().take(slots) {
            let t = req.target[slot];
            *child = if carried.is_carried(slot) {
                carried.carry[slot]
            } else if t.is_nil() {
                [Ptr::NIL; 2]
            } else {
                combinator.virtual_children(t)
            };
        }

        let outcome = combinator.combine(label, &children);
        if outcome == Outcome::Abort {
            debug!("{}: aborted at level x{} after {} requests", sweep.name, label, visited);
            return Ok(SweepResult::Aborted);
        }

        let out_uid = Uid::node(label, out_id);
        if let Outcome::Node(resolved) = outcome {
            out_id += 1;
            for (idx, r) in resolved.iter().enumerate() {
                let source = out_uid.with_out_idx(idx);
                match *r {
                    Resolved::Terminal(t) => {
                        if let Some(w) = writer.as_mut() {
                            w.push_terminal(Arc::new(source, t))?;
                        }
                    }
                    Resolved::Request(target) => queues.push(0, Request::new(target, source))?,
                }
            }
        }
        if let Outcome::Descend(resolved) = outcome {
            for r in resolved {
                if let Resolved::Request(target) = r {
                    queues.push(0, Request::new(target, Ptr::NIL))?;
                }
            }
        }

        let mut current = Some(req);
        while let Some(r) = current {
            match outcome {
                Outcome::Node(_) => {
                    if !r.source.is_nil() {
                        if let Some(w) = writer.as_mut() {
                            w.push_internal(Arc::new(r.source, out_uid.as_ptr()))?;
                        }
                    }
                }
                Outcome::Skip(Resolved::Terminal(t)) => {
                    if r.source.is_nil() {
                        debug!("{}: resolved to {} after {} requests", sweep.name, t, visited);
                        return Ok(SweepResult::Terminal(t.value()));
                    }
                    if let Some(w) = writer.as_mut() {
                        w.push_terminal(Arc::new(r.source, t))?;
                    }
                }
                Outcome::Skip(Resolved::Request(target)) => queues.push(0, Request::new(target, r.source))?,
                Outcome::Descend(_) | Outcome::Abort => {}
            }
            current = queues.pull_same(k, &req)?;
        }
    }

    debug!(
        "{}: {} requests, peak queue size {} (bound {})",
        sweep.name, visited, max_cut, sweep.bound
    );
    match writer {
        Some(mut w) => {
            w.set_max_1level_cut(max_cut as u64);
            Ok(SweepResult::Arcs(w.finish()?))
        }
        None => Ok(SweepResult::Completed),
    }
}
