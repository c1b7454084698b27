//! If-then-else on BDDs.
//!
//! Whenever two of the three arguments share a file, or `then` or `else` is a terminal, the
//! operation boils down to a single [`apply`]. Otherwise the product of all three diagrams is
//! computed; as soon as the `if` part reaches a terminal, only the chosen branch is copied.

use std::io;

use log::debug;

use crate::apply::apply;
use crate::bool_op::BoolOp;
use crate::cut::CutType;
use crate::diagram::{Diagram, Output};
use crate::memory::{to_size, Config};
use crate::policy::{BddPolicy, DdPolicy};
use crate::prod::{sweep, Combinator, Outcome, Resolved, Sweep, SweepResult};
use crate::ptr::Ptr;
use crate::request::{Targets, MAX_SLOTS};
use crate::types::Label;

fn resolve_triple(i: Ptr, t: Ptr, e: Ptr) -> Resolved {
    let single = |target: Targets, p: Ptr| {
        if p.is_terminal() {
            Resolved::Terminal(p)
        } else {
            Resolved::Request(target)
        }
    };
    if i.is_terminal() {
        if i.value() {
            single([Ptr::NIL, t, Ptr::NIL], t)
        } else {
            single([Ptr::NIL, Ptr::NIL, e], e)
        }
    } else if i.is_nil() {
        if t.is_nil() {
            single([Ptr::NIL, Ptr::NIL, e], e)
        } else {
            single([Ptr::NIL, t, Ptr::NIL], t)
        }
    } else if t.is_terminal() && t == e {
        Resolved::Terminal(t)
    } else {
        Resolved::Request([i, t, e])
    }
}

struct IteProduct;

impl Combinator for IteProduct {
    fn slots(&self) -> usize {
        3
    }

    fn virtual_children(&self, target: Ptr) -> [Ptr; 2] {
        BddPolicy::reduction_rule_inv(target)
    }

    fn combine(&self, _label: Label, children: &[[Ptr; 2]; MAX_SLOTS]) -> Outcome {
        let [i, t, e] = children;
        Outcome::Node([
            resolve_triple(i[0], t[0], e[0]),
            resolve_triple(i[1], t[1], e[1]),
        ])
    }
}

fn split(d: &Diagram, two_level: bool) -> [u128; 4] {
    let get = |ct| {
        (if two_level {
            d.max_2level_cut(ct)
        } else {
            d.max_1level_cut(ct)
        }) as u128
    };
    let internal = get(CutType::Internal);
    [
        internal,
        get(CutType::InternalFalse).saturating_sub(internal),
        get(CutType::InternalTrue).saturating_sub(internal),
        get(CutType::All),
    ]
}

/// Upper bound on the requests queued at once while computing `ite(f, g, h)`.
pub fn ite_bound(f: &Diagram, g: &Diagram, h: &Diagram) -> usize {
    let [fi, ff, ft, _] = split(f, true);
    let [gi, gf, gt, ga] = split(g, true);
    let [hi, hf, ht, ha] = split(h, true);
    let by_cuts = fi * (ga * hi + gi * ha + gf * ht + gt * hf) + ft * gi + ff * hi + 2;

    let (fs, gs, hs) = (f.size() as u128, g.size() as u128, h.size() as u128);
    let by_size = fs * ((gs + 2) * (hs + 2) - 2) + gs + hs + 3;
    to_size(by_cuts.min(by_size))
}

/// Computes `(f & g) | (!f & h)`.
pub fn ite(config: &Config, f: &Diagram, g: &Diagram, h: &Diagram) -> io::Result<Output> {
    if let Some(v) = f.value() {
        return Ok(if v { g.clone() } else { h.clone() }.into());
    }
    if g.file().ptr_eq(h.file()) {
        return if g.is_negated() == h.is_negated() {
            Ok(g.clone().into())
        } else {
            apply::<BddPolicy>(config, f, g, BoolOp::Xnor)
        };
    }
    if f.file().ptr_eq(g.file()) {
        return if f.is_negated() == g.is_negated() {
            apply::<BddPolicy>(config, f, h, BoolOp::Or)
        } else {
            apply::<BddPolicy>(config, f, h, BoolOp::Less)
        };
    }
    if f.file().ptr_eq(h.file()) {
        return if f.is_negated() == h.is_negated() {
            apply::<BddPolicy>(config, f, g, BoolOp::And)
        } else {
            apply::<BddPolicy>(config, f, g, BoolOp::Imp)
        };
    }
    if let Some(v) = g.value() {
        return apply::<BddPolicy>(config, f, h, if v { BoolOp::Or } else { BoolOp::Less });
    }
    if let Some(v) = h.value() {
        return apply::<BddPolicy>(config, f, g, if v { BoolOp::Imp } else { BoolOp::And });
    }

    debug!("ite: full product of {}, {} and {} nodes", f.size(), g.size(), h.size());
    let inputs = [f, g, h];
    let s = Sweep {
        name: "ite",
        inputs: &inputs,
        bound: ite_bound(f, g, h),
        output: true,
    };
    match sweep(config, &s, &IteProduct, [f.root(), g.root(), h.root()])? {
        SweepResult::Arcs(arcs) => Ok(arcs.into()),
        SweepResult::Terminal(v) => Ok(Diagram::terminal(v)?.into()),
        SweepResult::Completed | SweepResult::Aborted => unreachable!("ite always produces output"),
    }
}
