//! Cursors over levelized files.

use std::io;

use crate::arc::Arc;
use crate::file::{stream_memory, ArcFile, Direction, NodeFile, RecordReader};
use crate::node::Node;

/// Reads the nodes of a [`NodeFile`], top-down unless asked otherwise.
///
/// Terminal values are negated on the fly if the stream was opened with `negate`.
pub struct NodeStream {
    reader: RecordReader<Node>,
    negate: bool,
}

impl NodeStream {
    pub fn new(file: &NodeFile, negate: bool) -> io::Result<Self> {
        Self::with_direction(file, negate, true)
    }

    /// Opens the stream either top-down (root first) or bottom-up.
    pub fn with_direction(file: &NodeFile, negate: bool, top_down: bool) -> io::Result<Self> {
        // Nodes are stored bottom-up.
        let direction = if top_down {
            Direction::Reverse
        } else {
            Direction::Forward
        };
        Ok(Self {
            reader: file.part(0).reader(direction)?,
            negate,
        })
    }

    pub fn memory_usage() -> usize {
        stream_memory::<Node>()
    }

    pub fn can_pull(&self) -> bool {
        self.reader.can_pull()
    }

    pub fn pull(&mut self) -> io::Result<Node> {
        Ok(self.reader.pull()?.negate_if(self.negate))
    }

    pub fn peek(&mut self) -> io::Result<Node> {
        Ok(self.reader.peek()?.negate_if(self.negate))
    }
}

/// Reads an [`ArcFile`] bottom-up, as Reduce needs it.
///
/// Arcs between nodes come in decreasing order of their target; arcs to terminals in
/// decreasing order of their source, merging the in-order and out-of-order parts.
pub struct ArcStream {
    internal: RecordReader<Arc>,
    in_order: RecordReader<Arc>,
    out_of_order: RecordReader<Arc>,
    unread_terminals: [u64; 2],
}

impl ArcStream {
    pub fn new(file: &ArcFile) -> io::Result<Self> {
        Ok(Self {
            internal: file.part(0).reader(Direction::Reverse)?,
            in_order: file.part(1).reader(Direction::Reverse)?,
            out_of_order: file.part(2).reader(Direction::Reverse)?,
            unread_terminals: file.stats().number_of_terminals,
        })
    }

    pub fn memory_usage() -> usize {
        3 * stream_memory::<Arc>()
    }

    pub fn can_pull_internal(&self) -> bool {
        self.internal.can_pull()
    }

    pub fn peek_internal(&mut self) -> io::Result<Arc> {
        self.internal.peek()
    }

    pub fn pull_internal(&mut self) -> io::Result<Arc> {
        self.internal.pull()
    }

    pub fn can_pull_terminal(&self) -> bool {
        self.in_order.can_pull() || self.out_of_order.can_pull()
    }

    fn from_in_order(&mut self) -> io::Result<bool> {
        Ok(match (self.in_order.can_pull(), self.out_of_order.can_pull()) {
            (true, true) => self.in_order.peek()?.source > self.out_of_order.peek()?.source,
            (in_order, _) => in_order,
        })
    }

    /// The terminal arc with the largest source not yet pulled.
    pub fn peek_terminal(&mut self) -> io::Result<Arc> {
        if self.from_in_order()? {
            self.in_order.peek()
        } else {
            self.out_of_order.peek()
        }
    }

    pub fn pull_terminal(&mut self) -> io::Result<Arc> {
        let arc = if self.from_in_order()? {
            self.in_order.pull()?
        } else {
            self.out_of_order.pull()?
        };
        self.unread_terminals[arc.target.value() as usize] -= 1;
        Ok(arc)
    }

    /// Number of arcs to each terminal not yet pulled.
    pub fn unread_terminals(&self) -> [u64; 2] {
        self.unread_terminals
    }
}
