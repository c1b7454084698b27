//! Apply: the product of two diagrams under a binary operator.

use std::io;
use std::marker::PhantomData;

use log::debug;

use crate::bool_op::BoolOp;
use crate::cut::CutType;
use crate::diagram::{Diagram, Output};
use crate::memory::{to_size, Config};
use crate::policy::DdPolicy;
use crate::prod::{sweep, Combinator, Outcome, Resolved, Sweep, SweepResult};
use crate::ptr::Ptr;
use crate::request::MAX_SLOTS;
use crate::types::Label;

/// Resolves a pair of children: a terminal if `op` already decides it, a request otherwise.
pub(crate) fn resolve_pair<P: DdPolicy>(op: BoolOp, a: Ptr, b: Ptr) -> Resolved {
    match P::resolve_terminals(op, a, b) {
        Some(t) => Resolved::Terminal(t),
        None => Resolved::Request([a, b, Ptr::NIL]),
    }
}

struct ApplyProduct<P> {
    op: BoolOp,
    _policy: PhantomData<P>,
}

impl<P: DdPolicy> Combinator for ApplyProduct<P> {
    fn slots(&self) -> usize {
        2
    }

    fn virtual_children(&self, target: Ptr) -> [Ptr; 2] {
        P::reduction_rule_inv(target)
    }

    fn combine(&self, _label: Label, children: &[[Ptr; 2]; MAX_SLOTS]) -> Outcome {
        let [f, g, _] = children;
        Outcome::Node([
            resolve_pair::<P>(self.op, f[0], g[0]),
            resolve_pair::<P>(self.op, f[1], g[1]),
        ])
    }
}

/// Arcs of a diagram that can lead to requests, split into internal and terminal ones.
fn cut_parts(d: &Diagram, ct: CutType, two_level: bool) -> (u128, u128) {
    let get = |ct| {
        if two_level {
            d.max_2level_cut(ct)
        } else {
            d.max_1level_cut(ct)
        }
    };
    let internal = get(CutType::Internal) as u128;
    let with_terminals = get(ct) as u128;
    (internal, with_terminals.saturating_sub(internal))
}

/// Bound on the product's i-level cut from the i-level cuts of the inputs.
fn ilevel_bound<P: DdPolicy>(f: &Diagram, g: &Diagram, op: BoolOp, two_level: bool, inc: u128) -> usize {
    let (fi, ft) = cut_parts(f, P::left_cut(op), two_level);
    let (gi, gt) = cut_parts(g, P::right_cut(op), two_level);
    to_size(fi * gi + ft * gi + fi * gt + inc)
}

/// Bound on the product's 2-level cut from the 1-level and 2-level cuts of the inputs.
fn two_level_bound<P: DdPolicy>(f: &Diagram, g: &Diagram, op: BoolOp) -> usize {
    let left = P::left_cut(op);
    let right = P::right_cut(op);
    let (f1, ft) = cut_parts(f, left, false);
    let (g1, gt) = cut_parts(g, right, false);
    let f2 = f.max_2level_cut(CutType::Internal) as u128;
    let g2 = g.max_2level_cut(CutType::Internal) as u128;
    let fv = left.number_of_terminals() as u128;
    let gv = right.number_of_terminals() as u128;
    to_size(f2 * g2 + g1 * ft + fv * g2 + f1 * gt + gv * f2 + 2)
}

/// Bound on the product's size from the sizes of the inputs.
fn size_bound<P: DdPolicy>(f: &Diagram, g: &Diagram, op: BoolOp) -> usize {
    let fv = P::left_cut(op).number_of_terminals() as u128;
    let gv = P::right_cut(op).number_of_terminals() as u128;
    to_size((f.size() as u128 + fv) * (g.size() as u128 + gv) + 3)
}

/// Upper bound on the number of requests queued at once while applying `op` to `f` and `g`.
pub fn apply_bound<P: DdPolicy>(f: &Diagram, g: &Diagram, op: BoolOp) -> usize {
    ilevel_bound::<P>(f, g, op, true, 2)
        .min(two_level_bound::<P>(f, g, op))
        .min(size_bound::<P>(f, g, op))
}

/// The result of `op(f, g)` when it is one of the inputs or a constant, found without a sweep.
fn shortcut<P: DdPolicy>(f: &Diagram, g: &Diagram, op: BoolOp) -> io::Result<Option<Diagram>> {
    if f.file().ptr_eq(g.file()) {
        // `g` is either `f` or its complement: `op` is a unary function of `f`.
        let differs = f.is_negated() != g.is_negated();
        let on = |a: bool| op.eval(a, a ^ differs);
        return match (on(false), on(true)) {
            (false, false) => Diagram::terminal(false).map(Some),
            (false, true) => Ok(Some(f.clone())),
            (true, true) if P::COMPLEMENTS => Diagram::terminal(true).map(Some),
            (true, false) if P::COMPLEMENTS => Ok(Some(f.negated())),
            _ => Ok(None),
        };
    }

    // A terminal operand may leave the other one unchanged, or negate it.
    let unary = |v: bool, left: bool, other: &Diagram| {
        if !P::COMPLEMENTS && v {
            return None;
        }
        let (irrelevant, negating) = if left {
            (op.is_left_irrelevant(v), op.is_left_negating(v))
        } else {
            (op.is_right_irrelevant(v), op.is_right_negating(v))
        };
        if irrelevant {
            Some(other.clone())
        } else if negating && P::COMPLEMENTS {
            Some(other.negated())
        } else {
            None
        }
    };
    Ok(match (f.value(), g.value()) {
        (Some(v), _) => unary(v, true, g),
        (_, Some(v)) => unary(v, false, f),
        _ => None,
    })
}

/// Computes `op(f, g)`.
///
/// If the roots already decide the result, no sweep runs and the result is a terminal.
pub fn apply<P: DdPolicy>(config: &Config, f: &Diagram, g: &Diagram, op: BoolOp) -> io::Result<Output> {
    if let Some(t) = P::resolve_terminals(op, f.root(), g.root()) {
        debug!("apply<{}>({}): resolved by the roots to {}", P::NAME, op, t);
        return Ok(Diagram::terminal(t.value())?.into());
    }
    if let Some(d) = shortcut::<P>(f, g, op)? {
        debug!("apply<{}>({}): shortcut to {:?}", P::NAME, op, d);
        return Ok(d.into());
    }

    let inputs = [f, g];
    let name = format!("apply<{}>({})", P::NAME, op);
    let product = ApplyProduct::<P> {
        op,
        _policy: PhantomData,
    };
    let s = Sweep {
        name: &name,
        inputs: &inputs,
        bound: apply_bound::<P>(f, g, op),
        output: true,
    };
    match sweep(config, &s, &product, [f.root(), g.root(), Ptr::NIL])? {
        SweepResult::Arcs(arcs) => Ok(arcs.into()),
        SweepResult::Terminal(v) => Ok(Diagram::terminal(v)?.into()),
        SweepResult::Completed | SweepResult::Aborted => unreachable!("apply always produces output"),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::node::Node;
    use crate::policy::{BddPolicy, ZddPolicy};
    use crate::types::MAX_ID;
    use crate::writer::NodeWriter;

    fn ithvar(label: Label) -> Diagram {
        let mut w = NodeWriter::new().unwrap();
        w.push(Node::new(label, MAX_ID, Ptr::FALSE, Ptr::TRUE)).unwrap();
        Diagram::new(w.finish().unwrap()).unwrap()
    }

    fn bdd_apply(f: &Diagram, g: &Diagram, op: BoolOp) -> Diagram {
        let config = Config::default();
        apply::<BddPolicy>(&config, f, g, op)
            .unwrap()
            .finalize::<BddPolicy>(&config)
            .unwrap()
    }

    #[test]
    fn test_and_of_two_variables() {
        let d = bdd_apply(&ithvar(21), &ithvar(42), BoolOp::And);
        assert_eq!(
            d.nodes().unwrap(),
            vec![
                Node::new(21, MAX_ID, Ptr::FALSE, Ptr::node(42, MAX_ID)),
                Node::new(42, MAX_ID, Ptr::FALSE, Ptr::TRUE),
            ]
        );
    }

    #[test]
    fn test_terminal_roots_resolve_without_sweep() {
        let x = ithvar(3);
        let f = Diagram::terminal(false).unwrap();
        let d = apply::<BddPolicy>(&Config::default(), &f, &x, BoolOp::And).unwrap();
        match d {
            Output::Reduced(d) => assert_eq!(d.value(), Some(false)),
            _ => panic!("expected a terminal"),
        }
    }

    #[test]
    fn test_xor_with_itself_is_false() {
        let x = ithvar(3);
        let d = bdd_apply(&x, &x, BoolOp::Xor);
        assert_eq!(d.value(), Some(false));
    }

    #[test]
    fn test_same_file_shortcuts() {
        let x = ithvar(3);
        let config = Config::default();
        let run = |g: &Diagram, op| match apply::<BddPolicy>(&config, &x, g, op).unwrap() {
            Output::Reduced(d) => d,
            _ => panic!("expected a shortcut"),
        };
        assert!(run(&x, BoolOp::And).same_as(&x));
        assert_eq!(run(&x, BoolOp::Xnor).value(), Some(true));
        assert_eq!(run(&x.negated(), BoolOp::And).value(), Some(false));
        assert_eq!(run(&x.negated(), BoolOp::Or).value(), Some(true));
        assert!(run(&x, BoolOp::Nand).same_as(&x.negated()));
        // x & !!x
        assert!(run(&x.negated(), BoolOp::Diff).same_as(&x));
    }

    #[test]
    fn test_terminal_operand_shortcuts() {
        let x = ithvar(3);
        let config = Config::default();
        let t = Diagram::terminal(true).unwrap();
        match apply::<BddPolicy>(&config, &t, &x, BoolOp::Xor).unwrap() {
            Output::Reduced(d) => assert!(d.same_as(&x.negated())),
            _ => panic!("expected a shortcut"),
        }
        match apply::<BddPolicy>(&config, &x, &t, BoolOp::And).unwrap() {
            Output::Reduced(d) => assert!(d.same_as(&x)),
            _ => panic!("expected a shortcut"),
        }
        // Under ZDD semantics `true` is the family of the empty set, not an identity.
        assert!(matches!(
            apply::<ZddPolicy>(&config, &x, &t, BoolOp::And).unwrap(),
            Output::Unreduced(_)
        ));
    }

    #[test]
    fn test_negated_input() {
        let x = ithvar(0);
        let y = ithvar(1);
        // !x0 | x1
        let d = bdd_apply(&x.negated(), &y, BoolOp::Or);
        assert_eq!(
            d.nodes().unwrap(),
            vec![
                Node::new(0, MAX_ID, Ptr::TRUE, Ptr::node(1, MAX_ID)),
                Node::new(1, MAX_ID, Ptr::FALSE, Ptr::TRUE),
            ]
        );
    }

    #[test]
    fn test_bounds_are_positive() {
        let x = ithvar(0);
        let y = ithvar(1);
        assert!(apply_bound::<BddPolicy>(&x, &y, BoolOp::And) >= 3);
        assert!(apply_bound::<BddPolicy>(&x, &y, BoolOp::And) <= size_bound::<BddPolicy>(&x, &y, BoolOp::And));
    }
}
