//! Diagram to DOT (Graphviz) conversion.
//!
//! The generated DOT output follows these conventions:
//! - **Terminal nodes** are rendered as squares at the bottom (sink rank)
//! - **Internal nodes** are rendered as circles, one rank per level
//! - **Edges**: solid lines are high edges, dashed lines are low edges
//! - The **root** is a rectangle at the top (source rank)
//!
//! # Examples
//!
//! ```
//! use sweepdd::bdd::Bdd;
//! use sweepdd::dot::to_dot;
//!
//! let bdd = Bdd::default();
//! let f = bdd.apply_and(&bdd.ithvar(1).unwrap(), &bdd.ithvar(2).unwrap()).unwrap();
//!
//! let dot = to_dot(&f).unwrap();
//! assert!(dot.starts_with("digraph {"));
//! ```

use std::fmt::Write as _;
use std::io;

use crate::diagram::Diagram;
use crate::node::Node;
use crate::ptr::Ptr;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for internal nodes (default: "circle")
    pub node_shape: &'static str,
    /// Shape for terminal nodes (default: "square")
    pub terminal_shape: &'static str,
    /// Shape for the root marker (default: "rect")
    pub root_shape: &'static str,
    /// Style for high edges (default: "solid")
    pub high_edge_style: &'static str,
    /// Style for low edges (default: "dashed")
    pub low_edge_style: &'static str,
    /// Whether to use HTML labels for subscripts (default: true)
    pub use_html_labels: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "circle",
            terminal_shape: "square",
            root_shape: "rect",
            high_edge_style: "solid",
            low_edge_style: "dashed",
            use_html_labels: true,
        }
    }
}

fn name(p: Ptr) -> String {
    if p.is_terminal() {
        format!("{}", p.value() as u8)
    } else {
        format!("n{}_{}", p.label(), p.id())
    }
}

/// Converts a diagram to DOT format.
pub fn to_dot(f: &Diagram) -> io::Result<String> {
    to_dot_with_config(f, &DotConfig::default())
}

/// Converts a diagram to DOT format with a custom configuration.
pub fn to_dot_with_config(f: &Diagram, config: &DotConfig) -> io::Result<String> {
    let nodes = f.nodes()?;
    render(f.root(), &nodes, config).map_err(io::Error::other)
}

fn render(root: Ptr, nodes: &[Node], config: &DotConfig) -> Result<String, std::fmt::Error> {
    let mut dot = String::new();
    writeln!(dot, "digraph {{")?;
    writeln!(dot, "node [shape={}, fixedsize=true];", config.node_shape)?;

    writeln!(dot, "{{ rank=sink")?;
    writeln!(dot, "0 [shape={}, label=\"0\"];", config.terminal_shape)?;
    writeln!(dot, "1 [shape={}, label=\"1\"];", config.terminal_shape)?;
    writeln!(dot, "}}")?;

    // Nodes come top-down, so every level is contiguous.
    let mut edges = String::new();
    let mut level = None;
    for node in nodes.iter().filter(|n| !n.is_terminal()) {
        if level != Some(node.label()) {
            if level.is_some() {
                writeln!(dot, "}}")?;
            }
            writeln!(dot, "{{ rank=same")?;
            level = Some(node.label());
        }
        let label = if config.use_html_labels {
            format!("<x<SUB>{}</SUB>>", node.label())
        } else {
            format!("\"x{}\"", node.label())
        };
        let id = name(node.uid.as_ptr());
        writeln!(dot, "{} [label={}];", id, label)?;
        writeln!(edges, "{} -> {} [style={}];", id, name(node.low), config.low_edge_style)?;
        writeln!(edges, "{} -> {} [style={}];", id, name(node.high), config.high_edge_style)?;
    }
    if level.is_some() {
        writeln!(dot, "}}")?;
    }
    dot.push_str(&edges);

    writeln!(dot, "{{ rank=source")?;
    writeln!(dot, "r [shape={}, label=\"root\"];", config.root_shape)?;
    writeln!(dot, "}}")?;
    writeln!(dot, "r -> {};", name(root))?;

    writeln!(dot, "}}")?;
    Ok(dot)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::MAX_ID;
    use crate::writer::NodeWriter;

    #[test]
    fn test_to_dot_basic() {
        let mut w = NodeWriter::new().unwrap();
        w.push(Node::new(1, MAX_ID, Ptr::FALSE, Ptr::TRUE)).unwrap();
        w.push(Node::new(0, MAX_ID, Ptr::FALSE, Ptr::node(1, MAX_ID))).unwrap();
        let f = Diagram::new(w.finish().unwrap()).unwrap();

        let dot = to_dot(&f).unwrap();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.ends_with("}\n"));
        assert_eq!(dot.matches("rank=same").count(), 2);
        assert!(dot.contains(&format!("n0_{} -> n1_{} [style=solid];", MAX_ID, MAX_ID)));
        assert!(dot.contains(&format!("r -> n0_{};", MAX_ID)));
    }

    #[test]
    fn test_to_dot_terminal() {
        let f = Diagram::terminal(false).unwrap().negated();
        let dot = to_dot(&f).unwrap();
        assert!(dot.contains("r -> 1;"));
        assert!(!dot.contains("rank=same"));
    }
}
