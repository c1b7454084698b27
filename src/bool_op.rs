//! Binary boolean operators on terminals.

use std::fmt::{Display, Formatter};

use crate::ptr::Ptr;

/// A binary boolean operator, given by its truth table.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BoolOp {
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Xnor,
    /// `a -> b`
    Imp,
    /// `b -> a`
    InvImp,
    /// `a & !b`
    Diff,
    /// `!a & b`
    Less,
}

impl BoolOp {
    /// Evaluates the operator on two booleans.
    pub fn eval(self, a: bool, b: bool) -> bool {
        match self {
            BoolOp::And => a && b,
            BoolOp::Nand => !(a && b),
            BoolOp::Or => a || b,
            BoolOp::Nor => !(a || b),
            BoolOp::Xor => a != b,
            BoolOp::Xnor => a == b,
            BoolOp::Imp => !a || b,
            BoolOp::InvImp => a || !b,
            BoolOp::Diff => a && !b,
            BoolOp::Less => !a && b,
        }
    }

    /// Applies the operator to two terminal pointers.
    ///
    /// # Panics
    ///
    /// Panics if either argument is not a terminal.
    pub fn apply(self, a: Ptr, b: Ptr) -> Ptr {
        assert!(a.is_terminal() && b.is_terminal(), "Cannot apply {} to {} and {}", self, a, b);
        Ptr::terminal(self.eval(a.value(), b.value()))
    }

    /// The operator with its arguments swapped.
    pub fn flip(self) -> Self {
        match self {
            BoolOp::Imp => BoolOp::InvImp,
            BoolOp::InvImp => BoolOp::Imp,
            BoolOp::Diff => BoolOp::Less,
            BoolOp::Less => BoolOp::Diff,
            op => op,
        }
    }

    pub fn is_commutative(self) -> bool {
        self.flip() == self
    }

    /// Whether a left argument `a` alone determines the result.
    pub fn can_left_shortcut(self, a: bool) -> bool {
        self.eval(a, false) == self.eval(a, true)
    }

    /// Whether a right argument `b` alone determines the result.
    pub fn can_right_shortcut(self, b: bool) -> bool {
        self.eval(false, b) == self.eval(true, b)
    }

    /// Whether a left argument `a` makes the result equal to the right argument.
    pub fn is_left_irrelevant(self, a: bool) -> bool {
        !self.eval(a, false) && self.eval(a, true)
    }

    /// Whether a right argument `b` makes the result equal to the left argument.
    pub fn is_right_irrelevant(self, b: bool) -> bool {
        !self.eval(false, b) && self.eval(true, b)
    }

    /// Whether a left argument `a` makes the result the negation of the right argument.
    pub fn is_left_negating(self, a: bool) -> bool {
        self.eval(a, false) && !self.eval(a, true)
    }

    /// Whether a right argument `b` makes the result the negation of the left argument.
    pub fn is_right_negating(self, b: bool) -> bool {
        self.eval(false, b) && !self.eval(true, b)
    }
}

impl Display for BoolOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BoolOp::And => "and",
            BoolOp::Nand => "nand",
            BoolOp::Or => "or",
            BoolOp::Nor => "nor",
            BoolOp::Xor => "xor",
            BoolOp::Xnor => "xnor",
            BoolOp::Imp => "imp",
            BoolOp::InvImp => "invimp",
            BoolOp::Diff => "diff",
            BoolOp::Less => "less",
        };
        write!(f, "{}", name)
    }
}
