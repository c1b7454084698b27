//! Shared handles on reduced diagrams and the results of sweeps.

use std::fmt::{Debug, Formatter};
use std::io;

use crate::cut::{CutType, Cuts};
use crate::file::{ArcFile, Direction, NodeFile};
use crate::memory::Config;
use crate::node::Node;
use crate::policy::DdPolicy;
use crate::ptr::Ptr;
use crate::reduce::reduce;
use crate::types::LevelInfo;
use crate::writer::NodeWriter;

/// A reduced diagram: a shared node file plus a negation flag.
///
/// Cloning is cheap. Negation never touches the file; it only flips how terminals are read.
#[derive(Clone)]
pub struct Diagram {
    file: NodeFile,
    negate: bool,
    root: Ptr,
}

impl Diagram {
    /// Wraps a node file, reading its root.
    pub fn new(file: NodeFile) -> io::Result<Self> {
        Self::with_negation(file, false)
    }

    pub fn with_negation(file: NodeFile, negate: bool) -> io::Result<Self> {
        let mut reader = file.part(0).reader(Direction::Reverse)?;
        let top = reader.pull()?;
        let root = if top.is_terminal() {
            Ptr::terminal(top.value())
        } else {
            top.uid.as_ptr()
        };
        Ok(Self { file, negate, root })
    }

    /// The diagram of a constant function.
    pub fn terminal(value: bool) -> io::Result<Self> {
        let mut w = NodeWriter::new()?;
        w.push(Node::terminal(value))?;
        Self::new(w.finish()?)
    }

    pub fn file(&self) -> &NodeFile {
        &self.file
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    /// The same diagram with its terminals swapped.
    pub fn negated(&self) -> Self {
        Self {
            file: self.file.clone(),
            negate: !self.negate,
            root: self.root,
        }
    }

    /// The root, with the negation flag applied if it is a terminal.
    pub fn root(&self) -> Ptr {
        self.root.negate_if(self.negate)
    }

    pub fn is_terminal(&self) -> bool {
        self.root.is_terminal()
    }

    /// The constant value, if the diagram is a terminal.
    pub fn value(&self) -> Option<bool> {
        if self.is_terminal() {
            Some(self.root().value())
        } else {
            None
        }
    }

    pub fn is_false(&self) -> bool {
        self.value() == Some(false)
    }

    pub fn is_true(&self) -> bool {
        self.value() == Some(true)
    }

    /// Number of internal nodes.
    pub fn size(&self) -> u64 {
        if self.is_terminal() {
            0
        } else {
            self.file.size()
        }
    }

    pub fn levels(&self) -> u64 {
        self.file.level_count()
    }

    pub fn width(&self) -> u64 {
        self.file.stats().width
    }

    pub fn level_infos(&self) -> io::Result<Vec<LevelInfo>> {
        self.file.level_infos()
    }

    /// Number of arcs to the `false` and `true` terminal, as seen through the negation flag.
    pub fn number_of_terminals(&self) -> [u64; 2] {
        let [f, t] = self.file.stats().number_of_terminals;
        if self.negate {
            [t, f]
        } else {
            [f, t]
        }
    }

    fn cut_of(&self, cuts: &Cuts, ct: CutType) -> u64 {
        let ct = if self.negate {
            CutType::with(ct.includes(true), ct.includes(false))
        } else {
            ct
        };
        cuts.get(ct)
    }

    /// Upper bound on the 1-level cut of the given type.
    pub fn max_1level_cut(&self, ct: CutType) -> u64 {
        self.cut_of(&self.file.stats().max_1level_cut, ct)
    }

    /// Upper bound on the 2-level cut of the given type.
    pub fn max_2level_cut(&self, ct: CutType) -> u64 {
        self.cut_of(&self.file.stats().max_2level_cut, ct)
    }

    pub fn is_canonical(&self) -> bool {
        self.file.stats().canonical
    }

    /// Whether both handles denote the same file with the same negation.
    pub fn same_as(&self, other: &Diagram) -> bool {
        self.file.ptr_eq(&other.file) && self.negate == other.negate
    }

    /// All nodes top-down, with the negation flag applied.
    pub fn nodes(&self) -> io::Result<Vec<Node>> {
        let mut stream = crate::stream::NodeStream::new(&self.file, self.negate)?;
        let mut nodes = Vec::with_capacity(self.file.size() as usize);
        while stream.can_pull() {
            nodes.push(stream.pull()?);
        }
        Ok(nodes)
    }
}

impl Debug for Diagram {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagram")
            .field("root", &self.root())
            .field("size", &self.size())
            .field("levels", &self.levels())
            .field("negate", &self.negate)
            .finish()
    }
}

/// The result of a sweep: either still to be reduced, or already a reduced diagram.
pub enum Output {
    Unreduced(ArcFile),
    Reduced(Diagram),
    /// No result at all.
    Empty,
}

impl Output {
    /// Reduces the result if needed; a reduced result is handed back unchanged.
    ///
    /// # Panics
    ///
    /// Panics on [`Output::Empty`].
    pub fn finalize<P: DdPolicy>(self, config: &Config) -> io::Result<Diagram> {
        match self {
            Output::Unreduced(arcs) => reduce::<P>(config, &arcs),
            Output::Reduced(diagram) => Ok(diagram),
            Output::Empty => panic!("Cannot finalize an empty result"),
        }
    }
}

impl From<Diagram> for Output {
    fn from(diagram: Diagram) -> Self {
        Output::Reduced(diagram)
    }
}

impl From<ArcFile> for Output {
    fn from(arcs: ArcFile) -> Self {
        Output::Unreduced(arcs)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::policy::BddPolicy;
    use crate::types::MAX_ID;

    fn x0_and_not_x1() -> Diagram {
        let mut w = NodeWriter::new().unwrap();
        w.push(Node::new(1, MAX_ID, Ptr::TRUE, Ptr::FALSE)).unwrap();
        w.push(Node::new(0, MAX_ID, Ptr::FALSE, Ptr::node(1, MAX_ID))).unwrap();
        Diagram::new(w.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_terminal() {
        let t = Diagram::terminal(true).unwrap();
        assert!(t.is_terminal());
        assert_eq!(t.value(), Some(true));
        assert_eq!(t.negated().value(), Some(false));
        assert_eq!(t.size(), 0);
        assert_eq!(t.levels(), 0);
    }

    #[test]
    fn test_negation_shares_file() {
        let d = x0_and_not_x1();
        let n = d.negated();
        assert!(d.file().ptr_eq(n.file()));
        assert!(!d.same_as(&n));
        assert!(d.same_as(&n.negated()));
        assert_eq!(d.root(), Ptr::node(0, MAX_ID));
        assert_eq!(d.number_of_terminals(), [2, 1]);
        assert_eq!(n.number_of_terminals(), [1, 2]);
        assert_eq!(
            d.max_1level_cut(CutType::InternalFalse),
            n.max_1level_cut(CutType::InternalTrue)
        );
        assert_eq!(n.nodes().unwrap()[1].children(), [Ptr::FALSE, Ptr::TRUE]);
    }

    #[test]
    fn test_finalize_reduced_is_identity() {
        let d = x0_and_not_x1();
        let out = Output::from(d.clone()).finalize::<BddPolicy>(&Config::default()).unwrap();
        assert!(out.same_as(&d));
        assert_eq!(d.file().ref_count(), 2);
    }

    #[test]
    #[should_panic(expected = "empty result")]
    fn test_finalize_empty_panics() {
        let _ = Output::Empty.finalize::<BddPolicy>(&Config::default());
    }
}
