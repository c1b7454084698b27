//! Diagram kinds: what a missing node means and how terminals short-circuit.

use crate::bool_op::BoolOp;
use crate::cut::CutType;
use crate::ptr::Ptr;

/// The rules that distinguish one kind of decision diagram from another.
pub trait DdPolicy {
    const NAME: &'static str;

    /// Whether a negated diagram denotes the complement of the function.
    const COMPLEMENTS: bool;

    /// Returns the child a node with these children is replaced by, if it is redundant.
    fn reduction_rule(low: Ptr, high: Ptr) -> Option<Ptr>;

    /// The children of a node that was removed in favour of `child`.
    fn reduction_rule_inv(child: Ptr) -> [Ptr; 2];

    /// The outcome of `op` with the terminal `a` as left operand, if it does not depend on
    /// the right operand.
    fn shortcut(op: BoolOp, a: Ptr) -> Option<Ptr>;

    /// Resolves the pair `(a, b)` under `op` if its outcome is already fixed.
    fn resolve_terminals(op: BoolOp, a: Ptr, b: Ptr) -> Option<Ptr> {
        if a.is_terminal() && b.is_terminal() {
            Some(op.apply(a, b))
        } else if a.is_terminal() {
            Self::shortcut(op, a)
        } else if b.is_terminal() {
            Self::shortcut(op.flip(), b)
        } else {
            None
        }
    }

    /// The arcs of the left operand that can lead to pending requests.
    fn left_cut(op: BoolOp) -> CutType;

    /// The arcs of the right operand that can lead to pending requests.
    fn right_cut(op: BoolOp) -> CutType {
        Self::left_cut(op.flip())
    }
}

/// Binary Decision Diagrams: a node with two equal children is redundant.
#[derive(Debug, Copy, Clone)]
pub struct BddPolicy;

impl DdPolicy for BddPolicy {
    const NAME: &'static str = "bdd";
    const COMPLEMENTS: bool = true;

    fn reduction_rule(low: Ptr, high: Ptr) -> Option<Ptr> {
        if low == high {
            Some(low)
        } else {
            None
        }
    }

    fn reduction_rule_inv(child: Ptr) -> [Ptr; 2] {
        [child, child]
    }

    fn shortcut(op: BoolOp, a: Ptr) -> Option<Ptr> {
        if op.can_left_shortcut(a.value()) {
            Some(op.apply(a, Ptr::FALSE))
        } else {
            None
        }
    }

    fn left_cut(op: BoolOp) -> CutType {
        CutType::with(!op.can_left_shortcut(false), !op.can_left_shortcut(true))
    }
}

/// Zero-suppressed Decision Diagrams: a node whose high child is `false` is redundant.
#[derive(Debug, Copy, Clone)]
pub struct ZddPolicy;

impl ZddPolicy {
    /// Whether an empty left operand makes the result empty.
    fn left_annihilates(op: BoolOp) -> bool {
        !op.eval(false, true) && !op.eval(false, false)
    }
}

impl DdPolicy for ZddPolicy {
    const NAME: &'static str = "zdd";
    const COMPLEMENTS: bool = false;

    fn reduction_rule(low: Ptr, high: Ptr) -> Option<Ptr> {
        if high.is_false() {
            Some(low)
        } else {
            None
        }
    }

    fn reduction_rule_inv(child: Ptr) -> [Ptr; 2] {
        [child, Ptr::FALSE]
    }

    fn shortcut(op: BoolOp, a: Ptr) -> Option<Ptr> {
        if a.is_false() && Self::left_annihilates(op) {
            Some(Ptr::FALSE)
        } else {
            None
        }
    }

    fn left_cut(op: BoolOp) -> CutType {
        CutType::with(!Self::left_annihilates(op), true)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_bdd_rules() {
        let n = Ptr::node(3, 1);
        assert_eq!(BddPolicy::reduction_rule(n, n), Some(n));
        assert_eq!(BddPolicy::reduction_rule(n, Ptr::TRUE), None);
        assert_eq!(BddPolicy::reduction_rule_inv(n), [n, n]);
    }

    #[test]
    fn test_zdd_rules() {
        let n = Ptr::node(3, 1);
        assert_eq!(ZddPolicy::reduction_rule(n, Ptr::FALSE), Some(n));
        assert_eq!(ZddPolicy::reduction_rule(n, n), None);
        assert_eq!(ZddPolicy::reduction_rule_inv(n), [n, Ptr::FALSE]);
    }

    #[test]
    fn test_bdd_resolve() {
        let n = Ptr::node(0, 0);
        assert_eq!(BddPolicy::resolve_terminals(BoolOp::And, Ptr::FALSE, n), Some(Ptr::FALSE));
        assert_eq!(BddPolicy::resolve_terminals(BoolOp::And, Ptr::TRUE, n), None);
        assert_eq!(BddPolicy::resolve_terminals(BoolOp::Or, n, Ptr::TRUE), Some(Ptr::TRUE));
        assert_eq!(BddPolicy::resolve_terminals(BoolOp::Xor, Ptr::TRUE, Ptr::TRUE), Some(Ptr::FALSE));
        assert_eq!(BddPolicy::left_cut(BoolOp::And), CutType::InternalTrue);
        assert_eq!(BddPolicy::left_cut(BoolOp::Xor), CutType::All);
    }

    #[test]
    fn test_zdd_resolve() {
        let n = Ptr::node(0, 0);
        assert_eq!(ZddPolicy::resolve_terminals(BoolOp::And, Ptr::FALSE, n), Some(Ptr::FALSE));
        assert_eq!(ZddPolicy::resolve_terminals(BoolOp::And, n, Ptr::FALSE), Some(Ptr::FALSE));
        assert_eq!(ZddPolicy::resolve_terminals(BoolOp::Or, Ptr::TRUE, n), None);
        assert_eq!(ZddPolicy::resolve_terminals(BoolOp::Diff, n, Ptr::FALSE), None);
        assert_eq!(ZddPolicy::resolve_terminals(BoolOp::Diff, Ptr::FALSE, n), Some(Ptr::FALSE));
        assert_eq!(ZddPolicy::left_cut(BoolOp::Or), CutType::All);
        assert_eq!(ZddPolicy::left_cut(BoolOp::And), CutType::InternalTrue);
    }
}
