//! Reduce: turns the arc file of a sweep into a canonical node file.
//!
//! Levels are processed bottom-up. For every level, the arcs of its nodes arrive from the
//! terminal arcs of the input and from a levelized priority queue that holds the arcs already
//! redirected to reduced children. A node with redundant children is replaced by one of its
//! children (rule 1), nodes with equal children are merged (rule 2). The remaining nodes are
//! numbered from [`MAX_ID`] downwards in decreasing order of their children, which makes the
//! output canonical. Finally the replacement of every input node is forwarded to its parents.

use std::cmp::Ordering;
use std::io;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::arc::Arc;
use crate::cut::Cuts;
use crate::diagram::Diagram;
use crate::file::{ArcFile, Direction};
use crate::levelized_pq::{LevelizedOrder, LevelizedPriorityQueue};
use crate::memory::{to_size, Config, Planner};
use crate::node::Node;
use crate::policy::DdPolicy;
use crate::ptr::{Ptr, Uid};
use crate::sorter::{Order, Sorter};
use crate::stream::ArcStream;
use crate::types::{Label, MAX_ID};
use crate::writer::NodeWriter;

/// Arcs ordered by decreasing source; levels are visited bottom-up.
#[derive(Debug, Copy, Clone)]
struct BySourceDesc;

impl Order<Arc> for BySourceDesc {
    fn cmp(&self, a: &Arc, b: &Arc) -> Ordering {
        b.source.cmp(&a.source)
    }
}

impl LevelizedOrder<Arc> for BySourceDesc {
    fn level(&self, item: &Arc) -> Label {
        item.source.label()
    }

    fn descending(&self) -> bool {
        true
    }
}

/// Nodes ordered by decreasing `(high, low)`.
#[derive(Debug, Copy, Clone)]
struct ByChildrenDesc;

impl Order<Node> for ByChildrenDesc {
    fn cmp(&self, a: &Node, b: &Node) -> Ordering {
        (b.high, b.low).cmp(&(a.high, a.low)).then_with(|| b.uid.cmp(&a.uid))
    }
}

/// The replacement of an input node.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
struct Mapping {
    old: Uid,
    new: Ptr,
}

#[derive(Debug, Copy, Clone)]
struct ByOldDesc;

impl Order<Mapping> for ByOldDesc {
    fn cmp(&self, a: &Mapping, b: &Mapping) -> Ordering {
        b.old.cmp(&a.old)
    }
}

/// Counts of the arcs in the queue, per kind of target.
#[derive(Debug, Default)]
struct Pending {
    internal: u64,
    terminals: [u64; 2],
}

impl Pending {
    fn add(&mut self, target: Ptr) {
        if target.is_terminal() {
            self.terminals[target.value() as usize] += 1;
        } else {
            self.internal += 1;
        }
    }

    fn remove(&mut self, target: Ptr) {
        if target.is_terminal() {
            self.terminals[target.value() as usize] -= 1;
        } else {
            self.internal -= 1;
        }
    }
}

/// Pulls the arc with the largest source on `label`, from the terminal arcs or the queue.
fn next_arc(
    arcs: &mut ArcStream,
    pq: &mut LevelizedPriorityQueue<Arc, BySourceDesc>,
    pending: &mut Pending,
    label: Label,
) -> io::Result<Arc> {
    let terminal = if arcs.can_pull_terminal() {
        Some(arcs.peek_terminal()?).filter(|a| a.source.label() == label)
    } else {
        None
    };
    let queued = pq.top().map(|a| a.source);
    match (terminal, queued) {
        (Some(t), Some(q)) if t.source > q => arcs.pull_terminal(),
        (Some(_), None) => arcs.pull_terminal(),
        (_, Some(_)) => {
            let arc = pq.pull()?;
            pending.remove(arc.target);
            Ok(arc)
        }
        (None, None) => panic!("Missing an arc of a node on level {}", label),
    }
}

/// A diagram without arcs between nodes has at most one node.
fn reduce_single<P: DdPolicy>(arcs: &ArcFile) -> io::Result<Diagram> {
    let mut stream = ArcStream::new(arcs)?;
    let high = stream.pull_terminal()?;
    let low = stream.pull_terminal()?;
    assert!(
        high.is_high() && !low.is_high() && high.source.uid() == low.source.uid(),
        "A single node needs exactly one low and one high arc"
    );

    let mut out = NodeWriter::new()?;
    match P::reduction_rule(low.target, high.target) {
        Some(child) => out.push(Node::terminal(child.value()))?,
        None => out.push(Node::new(low.source.label(), MAX_ID, low.target, high.target))?,
    }
    Diagram::new(out.finish()?)
}

/// Reduces an arc file into a canonical diagram.
pub fn reduce<P: DdPolicy>(config: &Config, arcs: &ArcFile) -> io::Result<Diagram> {
    if arcs.part(0).is_empty() {
        return reduce_single::<P>(arcs);
    }

    let streams = ArcStream::memory_usage() + NodeWriter::memory_usage();
    let planner = Planner::new(config, streams, 3)?;
    let bound = to_size(arcs.stats().max_1level_cut.get(crate::cut::CutType::All) as u128);
    let (_, setup) = planner.queue::<Arc, BySourceDesc>(&format!("reduce<{}>", P::NAME), bound, planner.share(1, 2), 1);
    let sorter_memory = planner.share(1, 4);

    let mut stream = ArcStream::new(arcs)?;
    let mut pq = LevelizedPriorityQueue::new(&[arcs.levels()], BySourceDesc, setup)?;
    let mut pending = Pending::default();
    let mut out = NodeWriter::new()?;
    let mut cuts = Cuts::from_counts(1, [0, 0]);
    let mut last_mapping: Option<Ptr> = None;

    let mut levels = arcs.levels().reader(Direction::Reverse)?;
    while levels.can_pull() {
        let info = levels.pull()?;
        let label = info.label;
        if pq.current_level() != Some(label) && !pq.is_empty() {
            pq.setup_next_level(Some(label))?;
        }

        let width = info.width as usize;
        let external = planner.spills(width, Sorter::<Node, ByChildrenDesc>::memory_fits(sorter_memory));
        let (mut reducible, mut mappings) = if external {
            (
                Sorter::external(sorter_memory, ByChildrenDesc),
                Sorter::external(sorter_memory, ByOldDesc),
            )
        } else {
            (Sorter::internal(ByChildrenDesc), Sorter::internal(ByOldDesc))
        };

        for _ in 0..info.width {
            let high = next_arc(&mut stream, &mut pq, &mut pending, label)?;
            let low = next_arc(&mut stream, &mut pq, &mut pending, label)?;
            assert!(
                high.is_high() && !low.is_high() && high.source.uid() == low.source.uid(),
                "Arcs {} and {} do not belong to the same node",
                high,
                low
            );
            let uid = low.source.uid();
            match P::reduction_rule(low.target, high.target) {
                Some(child) => mappings.push(Mapping { old: uid, new: child })?,
                None => reducible.push(Node {
                    uid,
                    low: low.target,
                    high: high.target,
                })?,
            }
        }

        reducible.sort()?;
        let mut width = 0;
        let mut prev: Option<Node> = None;
        while reducible.can_pull() {
            let node = reducible.pull()?;
            match prev {
                Some(p) if p.low == node.low && p.high == node.high => {
                    mappings.push(Mapping {
                        old: node.uid,
                        new: p.uid.as_ptr(),
                    })?;
                }
                _ => {
                    let fresh = Node::new(label, MAX_ID - width, node.low, node.high);
                    width += 1;
                    out.push(fresh)?;
                    mappings.push(Mapping {
                        old: node.uid,
                        new: fresh.uid.as_ptr(),
                    })?;
                    prev = Some(fresh);
                }
            }
        }

        mappings.sort()?;
        while mappings.can_pull() {
            let m = mappings.pull()?;
            last_mapping = Some(m.new);
            while stream.can_pull_internal() && m.old == stream.peek_internal()?.target {
                let arc = stream.pull_internal()?;
                pq.push(Arc::new(arc.source, m.new))?;
                pending.add(m.new);
            }
        }

        let unread = stream.unread_terminals();
        let local = Cuts::from_counts(
            pending.internal,
            [pending.terminals[0] + unread[0], pending.terminals[1] + unread[1]],
        );
        cuts = cuts.max(local);
    }
    debug_assert!(pq.is_empty(), "Reduce left {} arcs behind", pq.size());

    if out.is_empty() {
        let root = match last_mapping {
            Some(root) => root,
            None => panic!("Cannot reduce an arc file without levels"),
        };
        assert!(root.is_terminal(), "Root {} collapsed without output", root);
        out.push(Node::terminal(root.value()))?;
        return Diagram::new(out.finish()?);
    }

    let nodes = out.size();
    out.set_max_1level_cut(cuts);
    let result = Diagram::new(out.finish()?)?;
    debug!(
        "reduce<{}>: {} arcs -> {} nodes on {} levels",
        P::NAME,
        arcs.size(),
        nodes,
        result.levels()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::diagram::Output;
    use crate::policy::{BddPolicy, ZddPolicy};
    use crate::types::LevelInfo;
    use crate::writer::ArcWriter;

    fn arc(source: Ptr, high: bool, target: Ptr) -> Arc {
        Arc::new(source.with_out_idx(high as usize), target)
    }

    /// ```text
    ///      1                 1
    ///     / \               / \
    ///     2 T               | T
    ///    / \       =>       |
    ///    3 4                4
    ///    |X|               / \
    ///    F T               F T
    /// ```
    fn rule_1_and_2() -> ArcFile {
        let n1 = Ptr::node(0, 0);
        let n2 = Ptr::node(1, 0);
        let n3 = Ptr::node(2, 0);
        let n4 = Ptr::node(2, 1);

        let mut w = ArcWriter::new().unwrap();
        w.push_internal(arc(n1, false, n2)).unwrap();
        w.push_internal(arc(n2, false, n3)).unwrap();
        w.push_internal(arc(n2, true, n4)).unwrap();

        w.push_terminal(arc(n1, true, Ptr::TRUE)).unwrap();
        w.push_terminal(arc(n3, false, Ptr::FALSE)).unwrap();
        w.push_terminal(arc(n3, true, Ptr::TRUE)).unwrap();
        w.push_terminal(arc(n4, false, Ptr::FALSE)).unwrap();
        w.push_terminal(arc(n4, true, Ptr::TRUE)).unwrap();

        w.push_level(LevelInfo::new(0, 1)).unwrap();
        w.push_level(LevelInfo::new(1, 1)).unwrap();
        w.push_level(LevelInfo::new(2, 2)).unwrap();
        w.finish().unwrap()
    }

    #[test]
    fn test_reduction_rule_1_and_2() {
        let d = reduce::<BddPolicy>(&Config::default(), &rule_1_and_2()).unwrap();
        let nodes = d.nodes().unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::new(0, MAX_ID, Ptr::node(2, MAX_ID), Ptr::TRUE),
                Node::new(2, MAX_ID, Ptr::FALSE, Ptr::TRUE),
            ]
        );
        assert_eq!(d.level_infos().unwrap(), vec![LevelInfo::new(0, 1), LevelInfo::new(2, 1)]);
        assert!(d.is_canonical());
        assert_eq!(d.number_of_terminals(), [1, 2]);
    }

    /// Writes the nodes of `d` back as arcs.
    fn to_arcs(d: &Diagram) -> ArcFile {
        let nodes = d.nodes().unwrap();
        let mut internal = Vec::new();
        let mut w = ArcWriter::new().unwrap();
        for node in &nodes {
            for (idx, child) in node.children().into_iter().enumerate() {
                let a = Arc::new(node.uid.as_ptr().with_out_idx(idx), child);
                if child.is_terminal() {
                    w.push_terminal(a).unwrap();
                } else {
                    internal.push(a);
                }
            }
        }
        internal.sort_by_key(|a| (a.target, a.source));
        for a in internal {
            w.push_internal(a).unwrap();
        }
        for info in d.level_infos().unwrap() {
            w.push_level(info).unwrap();
        }
        w.set_max_1level_cut(2 * nodes.len() as u64);
        w.finish().unwrap()
    }

    #[test]
    fn test_finalize_keeps_reduced() {
        let config = Config::default();
        let d = reduce::<BddPolicy>(&config, &rule_1_and_2()).unwrap();
        let again = Output::from(d.clone()).finalize::<BddPolicy>(&config).unwrap();
        assert!(again.same_as(&d));
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let config = Config::default();
        let d = reduce::<BddPolicy>(&config, &rule_1_and_2()).unwrap();
        let again = reduce::<BddPolicy>(&config, &to_arcs(&d)).unwrap();
        assert_eq!(again.nodes().unwrap(), d.nodes().unwrap());
        assert_eq!(again.level_infos().unwrap(), d.level_infos().unwrap());
        assert!(again.is_canonical());
    }

    #[test]
    fn test_reduce_is_idempotent_on_wider_diagrams() {
        let bdd = crate::bdd::Bdd::default();
        let x = |l| bdd.ithvar(l).unwrap();
        // (x0 ^ x1 ^ x2) | (x1 & x3)
        let parity = bdd.apply_xor(&bdd.apply_xor(&x(0), &x(1)).unwrap(), &x(2)).unwrap();
        let d = bdd.apply_or(&parity, &bdd.apply_and(&x(1), &x(3)).unwrap()).unwrap();
        assert!(d.width() >= 2);

        let config = Config::default();
        let again = reduce::<BddPolicy>(&config, &to_arcs(&d)).unwrap();
        assert_eq!(again.nodes().unwrap(), d.nodes().unwrap());
    }

    #[test]
    fn test_reduce_external() {
        use crate::exec_policy::{ExecPolicy, MemoryMode};
        let config = Config::default().with_policy(ExecPolicy::default().with_memory_mode(MemoryMode::External));
        let d = reduce::<BddPolicy>(&config, &rule_1_and_2()).unwrap();
        assert_eq!(d.size(), 2);
    }

    #[test]
    fn test_collapse_to_terminal() {
        // x0 ? x1 : x1 with x1 := (T, T).
        let n0 = Ptr::node(0, 0);
        let n1 = Ptr::node(1, 0);
        let mut w = ArcWriter::new().unwrap();
        w.push_internal(arc(n0, false, n1)).unwrap();
        w.push_internal(arc(n0, true, n1)).unwrap();
        w.push_terminal(arc(n1, false, Ptr::TRUE)).unwrap();
        w.push_terminal(arc(n1, true, Ptr::TRUE)).unwrap();
        w.push_level(LevelInfo::new(0, 1)).unwrap();
        w.push_level(LevelInfo::new(1, 1)).unwrap();
        let d = reduce::<BddPolicy>(&Config::default(), &w.finish().unwrap()).unwrap();
        assert_eq!(d.value(), Some(true));
    }

    #[test]
    fn test_single_node() {
        let n0 = Ptr::node(4, 0);
        let mut w = ArcWriter::new().unwrap();
        w.push_terminal(arc(n0, false, Ptr::FALSE)).unwrap();
        w.push_terminal(arc(n0, true, Ptr::TRUE)).unwrap();
        w.push_level(LevelInfo::new(4, 1)).unwrap();
        let f = w.finish().unwrap();

        let d = reduce::<BddPolicy>(&Config::default(), &f).unwrap();
        assert_eq!(d.nodes().unwrap(), vec![Node::new(4, MAX_ID, Ptr::FALSE, Ptr::TRUE)]);

        // The same node is redundant for ZDDs only if its high child is false.
        let z = reduce::<ZddPolicy>(&Config::default(), &f).unwrap();
        assert_eq!(z.size(), 1);
    }

    #[test]
    fn test_zdd_rule() {
        // x0 with high child false collapses into its low child.
        let n0 = Ptr::node(0, 0);
        let n1 = Ptr::node(1, 0);
        let mut w = ArcWriter::new().unwrap();
        w.push_internal(arc(n0, false, n1)).unwrap();
        w.push_terminal(arc(n0, true, Ptr::FALSE)).unwrap();
        w.push_terminal(arc(n1, false, Ptr::FALSE)).unwrap();
        w.push_terminal(arc(n1, true, Ptr::TRUE)).unwrap();
        w.push_level(LevelInfo::new(0, 1)).unwrap();
        w.push_level(LevelInfo::new(1, 1)).unwrap();
        let f = w.finish().unwrap();

        let z = reduce::<ZddPolicy>(&Config::default(), &f).unwrap();
        assert_eq!(z.nodes().unwrap(), vec![Node::new(1, MAX_ID, Ptr::FALSE, Ptr::TRUE)]);

        let b = reduce::<BddPolicy>(&Config::default(), &f).unwrap();
        assert_eq!(b.size(), 2);
    }

    #[test]
    fn test_disjoint_branches_merge() {
        //        1
        //       / \
        //      2   3
        //     / \ / \
        //     4 T 5 T      with 4 == 5 == (F, T)
        let n1 = Ptr::node(0, 0);
        let n2 = Ptr::node(1, 0);
        let n3 = Ptr::node(1, 1);
        let n4 = Ptr::node(2, 0);
        let n5 = Ptr::node(2, 1);
        let mut w = ArcWriter::new().unwrap();
        w.push_internal(arc(n1, false, n2)).unwrap();
        w.push_internal(arc(n1, true, n3)).unwrap();
        w.push_internal(arc(n2, false, n4)).unwrap();
        w.push_internal(arc(n3, false, n5)).unwrap();
        w.push_terminal(arc(n2, true, Ptr::TRUE)).unwrap();
        w.push_terminal(arc(n3, true, Ptr::TRUE)).unwrap();
        w.push_terminal(arc(n4, false, Ptr::FALSE)).unwrap();
        w.push_terminal(arc(n4, true, Ptr::TRUE)).unwrap();
        w.push_terminal(arc(n5, false, Ptr::FALSE)).unwrap();
        w.push_terminal(arc(n5, true, Ptr::TRUE)).unwrap();
        w.push_level(LevelInfo::new(0, 1)).unwrap();
        w.push_level(LevelInfo::new(1, 2)).unwrap();
        w.push_level(LevelInfo::new(2, 2)).unwrap();

        let d = reduce::<BddPolicy>(&Config::default(), &w.finish().unwrap()).unwrap();
        // 2 and 3 merge, which then makes 1 redundant.
        assert_eq!(d.size(), 2);
        assert_eq!(d.root(), Ptr::node(1, MAX_ID));
    }
}
