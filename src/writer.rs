//! Writers of levelized files.
//!
//! A writer has exclusive access to the file it builds; [`NodeWriter::finish`] and
//! [`ArcWriter::finish`] consume it and hand out the shared, read-only file. Level metadata is
//! always stored top-down, whatever order the records are written in.

use std::cmp::Ordering;
use std::io;

use log::trace;

use crate::arc::Arc;
use crate::cut::{CutType, Cuts};
use crate::file::{stream_memory, ArcFile, Direction, FileStats, NodeFile, RecordFile, RecordWriter};
use crate::node::Node;
use crate::ptr::Ptr;
use crate::sorter::{Order, Sorter};
use crate::types::{Label, LevelInfo, MAX_ID};

/// Rewrites level metadata written bottom-up into a top-down file.
fn reversed_levels(levels: RecordWriter<LevelInfo>) -> io::Result<RecordFile<LevelInfo>> {
    let bottom_up = levels.finish()?;
    let mut reader = bottom_up.reader(Direction::Reverse)?;
    let mut top_down = RecordWriter::new()?;
    while reader.can_pull() {
        top_down.push(&reader.pull()?)?;
    }
    top_down.finish()
}

/// Writes a reduced diagram bottom-up, i.e. in strictly decreasing order of node identity.
pub struct NodeWriter {
    nodes: RecordWriter<Node>,
    levels: RecordWriter<LevelInfo>,
    last: Option<Node>,
    level: Option<(Label, u64)>,
    number_of_terminals: [u64; 2],
    width: u64,
    canonical: bool,
    max_1level_cut: Option<Cuts>,
}

impl NodeWriter {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            nodes: RecordWriter::new()?,
            levels: RecordWriter::new()?,
            last: None,
            level: None,
            number_of_terminals: [0, 0],
            width: 0,
            canonical: true,
            max_1level_cut: None,
        })
    }

    /// Memory used by an open writer.
    pub fn memory_usage() -> usize {
        stream_memory::<Node>() + stream_memory::<LevelInfo>()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    /// Number of nodes written so far.
    pub fn size(&self) -> u64 {
        self.nodes.len()
    }

    /// Appends a node.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not strictly smaller than the previous node, or if a terminal is
    /// mixed with other records.
    pub fn push(&mut self, node: Node) -> io::Result<()> {
        if node.is_terminal() {
            assert!(self.last.is_none(), "A terminal must be the only record of a node file");
        } else if let Some(last) = self.last {
            assert!(!last.is_terminal(), "A terminal must be the only record of a node file");
            assert!(
                node.uid < last.uid,
                "Nodes must be pushed in strictly decreasing order: {} after {}",
                node,
                last
            );
        }

        if !node.is_terminal() {
            let label = node.label();
            match self.level {
                Some((l, w)) if l == label => {
                    self.level = Some((l, w + 1));
                    if let Some(last) = self.last {
                        let prev = (last.high, last.low);
                        let this = (node.high, node.low);
                        if node.id() + 1 != last.id() || this.cmp(&prev) != Ordering::Less {
                            self.canonical = false;
                        }
                    }
                }
                _ => {
                    self.flush_level()?;
                    self.level = Some((label, 1));
                    if node.id() != MAX_ID {
                        self.canonical = false;
                    }
                }
            }
            for child in node.children() {
                if child.is_terminal() {
                    self.number_of_terminals[child.value() as usize] += 1;
                }
            }
        }

        self.nodes.push(&node)?;
        self.last = Some(node);
        Ok(())
    }

    fn flush_level(&mut self) -> io::Result<()> {
        if let Some((label, width)) = self.level.take() {
            self.width = self.width.max(width);
            self.levels.push(&LevelInfo::new(label, width))?;
        }
        Ok(())
    }

    /// Records a known bound on the 1-level cuts of the written diagram.
    pub fn set_max_1level_cut(&mut self, cuts: Cuts) {
        self.max_1level_cut = Some(cuts);
    }

    /// Detaches the writer and returns the read-only node file.
    ///
    /// # Panics
    ///
    /// Panics if nothing was written.
    pub fn finish(mut self) -> io::Result<NodeFile> {
        let last = match self.last {
            Some(last) => last,
            None => panic!("A node file must not be empty"),
        };
        self.flush_level()?;

        let nodes = self.nodes.len();
        let terminals = self.number_of_terminals;
        let stats = if last.is_terminal() {
            let mut cut = Cuts::default();
            for ct in CutType::ALL {
                cut.set(ct, ct.includes(last.value()) as u64);
            }
            FileStats {
                number_of_terminals: terminals,
                max_1level_cut: cut,
                max_2level_cut: cut,
                canonical: true,
                width: 0,
            }
        } else {
            let one_level = self
                .max_1level_cut
                .unwrap_or_else(|| Cuts::uniform(u64::MAX))
                .fixup(nodes, terminals);
            let two_level = Cuts::two_level_bound(one_level, terminals)
                .fixup(nodes, terminals)
                .max(one_level);
            FileStats {
                number_of_terminals: terminals,
                max_1level_cut: one_level,
                max_2level_cut: two_level,
                canonical: self.canonical,
                width: self.width,
            }
        };

        let levels = reversed_levels(self.levels)?;
        trace!(
            "node writer: {} nodes on {} levels (canonical: {})",
            nodes,
            levels.len(),
            stats.canonical
        );
        Ok(NodeFile::new(vec![self.nodes.finish()?], levels, stats))
    }
}

/// Orders arcs by their source.
#[derive(Debug, Copy, Clone)]
pub struct BySource;

impl Order<Arc> for BySource {
    fn cmp(&self, a: &Arc, b: &Arc) -> Ordering {
        a.source.cmp(&b.source)
    }
}

/// Writes an unreduced diagram top-down.
pub struct ArcWriter {
    internal: RecordWriter<Arc>,
    terminals: RecordWriter<Arc>,
    out_of_order: Sorter<Arc, BySource>,
    levels: RecordWriter<LevelInfo>,
    last_target: Option<Ptr>,
    last_terminal_source: Option<Ptr>,
    last_level: Option<Label>,
    number_of_terminals: [u64; 2],
    max_1level_cut: u64,
}

impl ArcWriter {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            internal: RecordWriter::new()?,
            terminals: RecordWriter::new()?,
            out_of_order: Sorter::external(4 * stream_memory::<Arc>(), BySource),
            levels: RecordWriter::new()?,
            last_target: None,
            last_terminal_source: None,
            last_level: None,
            number_of_terminals: [0, 0],
            max_1level_cut: 0,
        })
    }

    /// Memory used by an open writer.
    pub fn memory_usage() -> usize {
        7 * stream_memory::<Arc>() + stream_memory::<LevelInfo>()
    }

    /// Appends an arc between two nodes.
    ///
    /// # Panics
    ///
    /// Panics if the target is not a node or comes before the previous arc's target.
    pub fn push_internal(&mut self, arc: Arc) -> io::Result<()> {
        assert!(arc.target.is_node(), "Internal arc {} must target a node", arc);
        assert!(arc.source < arc.target, "Arc {} must point downwards", arc);
        if let Some(last) = self.last_target {
            assert!(last <= arc.target, "Internal arcs must be pushed in order of their target");
        }
        self.last_target = Some(arc.target);
        self.internal.push(&arc)
    }

    /// Appends an arc to a terminal; out-of-order arcs are sorted when the writer detaches.
    pub fn push_terminal(&mut self, arc: Arc) -> io::Result<()> {
        assert!(arc.target.is_terminal(), "Terminal arc {} must target a terminal", arc);
        self.number_of_terminals[arc.target.value() as usize] += 1;
        match self.last_terminal_source {
            Some(last) if arc.source < last => self.out_of_order.push(arc),
            _ => {
                self.last_terminal_source = Some(arc.source);
                self.terminals.push(&arc)
            }
        }
    }

    /// Appends an arc to whatever it targets.
    pub fn push(&mut self, arc: Arc) -> io::Result<()> {
        if arc.target.is_terminal() {
            self.push_terminal(arc)
        } else {
            self.push_internal(arc)
        }
    }

    /// Records that the level `info.label` holds `info.width` nodes.
    ///
    /// # Panics
    ///
    /// Panics if levels are not pushed in increasing order.
    pub fn push_level(&mut self, info: LevelInfo) -> io::Result<()> {
        if let Some(last) = self.last_level {
            assert!(last < info.label, "Levels must be pushed top-down: {} after x{}", info, last);
        }
        self.last_level = Some(info.label);
        self.levels.push(&info)
    }

    /// Records a bound on the 1-level cut of the diagram being written.
    pub fn set_max_1level_cut(&mut self, cut: u64) {
        self.max_1level_cut = cut;
    }

    pub fn has_levels(&self) -> bool {
        self.last_level.is_some()
    }

    /// Detaches the writer and returns the read-only arc file.
    pub fn finish(mut self) -> io::Result<ArcFile> {
        self.out_of_order.sort()?;
        let mut sorted = RecordWriter::new()?;
        while self.out_of_order.can_pull() {
            sorted.push(&self.out_of_order.pull()?)?;
        }
        let stats = FileStats {
            number_of_terminals: self.number_of_terminals,
            max_1level_cut: Cuts::uniform(self.max_1level_cut),
            max_2level_cut: Cuts::uniform(self.max_1level_cut.saturating_mul(3) / 2),
            canonical: false,
            width: 0,
        };
        trace!(
            "arc writer: {} internal, {} + {} terminal arcs",
            self.internal.len(),
            self.terminals.len(),
            sorted.len()
        );
        let parts = vec![self.internal.finish()?, self.terminals.finish()?, sorted.finish()?];
        Ok(ArcFile::new(parts, self.levels.finish()?, stats))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_node_writer_levels_top_down() {
        let mut w = NodeWriter::new().unwrap();
        w.push(Node::new(2, MAX_ID, Ptr::FALSE, Ptr::TRUE)).unwrap();
        w.push(Node::new(1, MAX_ID, Ptr::node(2, MAX_ID), Ptr::TRUE)).unwrap();
        w.push(Node::new(1, MAX_ID - 1, Ptr::FALSE, Ptr::node(2, MAX_ID))).unwrap();
        w.push(Node::new(0, MAX_ID, Ptr::node(1, MAX_ID - 1), Ptr::node(1, MAX_ID))).unwrap();
        let f = w.finish().unwrap();

        assert_eq!(f.size(), 4);
        let levels = f.level_infos().unwrap();
        assert_eq!(levels, vec![LevelInfo::new(0, 1), LevelInfo::new(1, 2), LevelInfo::new(2, 1)]);
        assert_eq!(f.stats().number_of_terminals, [2, 2]);
        assert_eq!(f.stats().width, 2);
        assert!(f.stats().canonical);
    }

    #[test]
    fn test_node_writer_detects_non_canonical() {
        let mut w = NodeWriter::new().unwrap();
        w.push(Node::new(1, 5, Ptr::FALSE, Ptr::TRUE)).unwrap();
        w.push(Node::new(0, 3, Ptr::FALSE, Ptr::node(1, 5))).unwrap();
        let f = w.finish().unwrap();
        assert!(!f.stats().canonical);
        assert_eq!(f.stats().max_1level_cut.get(CutType::Internal), 2);
    }

    #[test]
    fn test_terminal_file() {
        let mut w = NodeWriter::new().unwrap();
        w.push(Node::terminal(true)).unwrap();
        let f = w.finish().unwrap();
        assert_eq!(f.size(), 1);
        assert_eq!(f.level_count(), 0);
        assert_eq!(f.stats().max_1level_cut.get(CutType::InternalTrue), 1);
        assert_eq!(f.stats().max_1level_cut.get(CutType::InternalFalse), 0);
    }

    #[test]
    #[should_panic(expected = "strictly decreasing order")]
    fn test_out_of_order_node_panics() {
        let mut w = NodeWriter::new().unwrap();
        w.push(Node::new(0, 0, Ptr::FALSE, Ptr::TRUE)).unwrap();
        w.push(Node::new(1, 0, Ptr::FALSE, Ptr::TRUE)).unwrap();
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_empty_node_file_panics() {
        let w = NodeWriter::new().unwrap();
        let _ = w.finish();
    }

    #[test]
    fn test_arc_writer_sorts_out_of_order_terminals() {
        let mut w = ArcWriter::new().unwrap();
        let n0 = Ptr::node(0, 0);
        let n1 = Ptr::node(1, 0);
        let n2 = Ptr::node(1, 1);
        w.push_internal(Arc::new(n0, n1)).unwrap();
        w.push_internal(Arc::new(n0.with_out_idx(1), n2)).unwrap();
        w.push_terminal(Arc::new(n2, Ptr::FALSE)).unwrap();
        w.push_terminal(Arc::new(n2.with_out_idx(1), Ptr::TRUE)).unwrap();
        w.push_terminal(Arc::new(n1.with_out_idx(1), Ptr::TRUE)).unwrap();
        w.push_terminal(Arc::new(n1, Ptr::FALSE)).unwrap();
        w.push_level(LevelInfo::new(0, 1)).unwrap();
        w.push_level(LevelInfo::new(1, 2)).unwrap();
        let f = w.finish().unwrap();

        assert_eq!(f.part(0).len(), 2);
        assert_eq!(f.part(1).len(), 2);
        let ooo = f.part(2).to_vec().unwrap();
        assert_eq!(ooo, vec![Arc::new(n1, Ptr::FALSE), Arc::new(n1.with_out_idx(1), Ptr::TRUE)]);
        assert_eq!(f.stats().number_of_terminals, [2, 2]);
    }

    #[test]
    #[should_panic(expected = "in order of their target")]
    fn test_internal_arcs_out_of_order_panics() {
        let mut w = ArcWriter::new().unwrap();
        w.push_internal(Arc::new(Ptr::node(0, 0), Ptr::node(2, 0))).unwrap();
        w.push_internal(Arc::new(Ptr::node(0, 0).with_out_idx(1), Ptr::node(1, 0))).unwrap();
    }
}
