//! Quantification of variables.
//!
//! A sweep over a single diagram whose requests are pairs of its nodes. On a quantified level
//! the children of both nodes of a pair are merged under the operator and the level is skipped.
//! If more than two distinct nodes are left on a quantified level, a partial sweep keeps a node
//! on that level instead, to be resolved by a later sweep.

use std::io;
use std::marker::PhantomData;

use log::debug;

use crate::bool_op::BoolOp;
use crate::cut::CutType;
use crate::diagram::{Diagram, Output};
use crate::exec_policy::QuantifyAlgorithm;
use crate::memory::{to_size, Config};
use crate::policy::DdPolicy;
use crate::prod::{sweep, Combinator, Outcome, Resolved, Sweep, SweepResult};
use crate::ptr::Ptr;
use crate::request::MAX_SLOTS;
use crate::types::Label;

/// The nodes left after merging a set of children under an operator.
#[derive(Debug, Eq, PartialEq)]
enum Merged {
    Terminal(Ptr),
    /// Sorted and distinct, at most four.
    Targets(Vec<Ptr>),
}

fn merge<P: DdPolicy>(op: BoolOp, items: &[Ptr]) -> Merged {
    let mut kept = Vec::with_capacity(items.len());
    let mut neutral = None;
    for &p in items.iter().filter(|p| !p.is_nil()) {
        if p.is_terminal() {
            if let Some(t) = P::shortcut(op, p) {
                return Merged::Terminal(t);
            }
            if op.is_left_irrelevant(p.value()) {
                neutral = Some(p);
                continue;
            }
        }
        kept.push(p);
    }
    kept.sort_unstable();
    kept.dedup();
    match (kept.as_slice(), neutral) {
        ([], Some(t)) => Merged::Terminal(t),
        ([], None) => panic!("Cannot merge an empty set of children"),
        ([t], _) if t.is_terminal() => Merged::Terminal(*t),
        _ => Merged::Targets(kept),
    }
}

fn resolve<P: DdPolicy>(op: BoolOp, items: &[Ptr]) -> Resolved {
    match merge::<P>(op, items) {
        Merged::Terminal(t) => Resolved::Terminal(t),
        Merged::Targets(ts) => {
            assert!(ts.len() <= 2, "A request holds at most two nodes");
            Resolved::Request([ts[0], ts.get(1).copied().unwrap_or(Ptr::NIL), Ptr::NIL])
        }
    }
}

struct QuantifyProduct<'a, P> {
    op: BoolOp,
    labels: &'a [Label],
    _policy: PhantomData<P>,
}

impl<P: DdPolicy> Combinator for QuantifyProduct<'_, P> {
    fn slots(&self) -> usize {
        2
    }

    fn input_of(&self, _slot: usize) -> usize {
        0
    }

    fn virtual_children(&self, target: Ptr) -> [Ptr; 2] {
        P::reduction_rule_inv(target)
    }

    fn combine(&self, label: Label, children: &[[Ptr; 2]; MAX_SLOTS]) -> Outcome {
        let [a, b, _] = children;
        if self.labels.binary_search(&label).is_err() {
            return Outcome::Node([
                resolve::<P>(self.op, &[a[0], b[0]]),
                resolve::<P>(self.op, &[a[1], b[1]]),
            ]);
        }
        match merge::<P>(self.op, &[a[0], a[1], b[0], b[1]]) {
            Merged::Terminal(t) => Outcome::Skip(Resolved::Terminal(t)),
            Merged::Targets(ts) if ts.len() <= 2 => Outcome::Skip(resolve::<P>(self.op, &ts)),
            Merged::Targets(ts) => {
                let (low, high) = ts.split_at(2);
                Outcome::Node([resolve::<P>(self.op, low), resolve::<P>(self.op, high)])
            }
        }
    }
}

/// Upper bound on the requests queued at once while quantifying over `f`.
pub fn quantify_bound<P: DdPolicy>(f: &Diagram, op: BoolOp) -> usize {
    let internal = f.max_2level_cut(CutType::Internal) as u128;
    let with_terminals = f.max_2level_cut(P::left_cut(op)) as u128;
    let size = f.size() as u128;
    to_size((internal * with_terminals + 2).min(size * size + 3))
}

/// Labels among `labels` that `f` has a level for.
fn present(f: &Diagram, labels: &[Label]) -> io::Result<Vec<Label>> {
    Ok(f.level_infos()?
        .into_iter()
        .map(|info| info.label)
        .filter(|l| labels.binary_search(l).is_ok())
        .collect())
}

/// One sweep quantifying all of `labels` as far as pairs allow.
fn pass<P: DdPolicy>(config: &Config, f: &Diagram, labels: &[Label], op: BoolOp) -> io::Result<Output> {
    let inputs = [f];
    let name = format!("quantify<{}>({}, {} labels)", P::NAME, op, labels.len());
    let product = QuantifyProduct::<P> {
        op,
        labels,
        _policy: PhantomData,
    };
    let s = Sweep {
        name: &name,
        inputs: &inputs,
        bound: quantify_bound::<P>(f, op),
        output: true,
    };
    match sweep(config, &s, &product, [f.root(), Ptr::NIL, Ptr::NIL])? {
        SweepResult::Arcs(arcs) => Ok(arcs.into()),
        SweepResult::Terminal(v) => Ok(Diagram::terminal(v)?.into()),
        SweepResult::Completed | SweepResult::Aborted => unreachable!("quantification always produces output"),
    }
}

/// Whether `after` nodes exceed `before` nodes by more than a factor of `1 + epsilon`.
fn too_large(before: u64, after: u64, epsilon: f32) -> bool {
    after as f64 > (1.0 + epsilon as f64) * before as f64
}

/// One sweep per label, bottom-up.
fn singleton<P: DdPolicy>(config: &Config, f: Diagram, labels: &[Label], op: BoolOp) -> io::Result<Output> {
    let mut result: Output = f.into();
    for &label in labels.iter().rev() {
        let f = result.finalize::<P>(config)?;
        if f.is_terminal() {
            return Ok(f.into());
        }
        result = pass::<P>(config, &f, &[label], op)?;
    }
    Ok(result)
}

/// Quantifies the variables `labels` of `f` under `op`.
///
/// # Panics
///
/// Panics if `op` is neither [`BoolOp::Or`] nor [`BoolOp::And`].
pub fn quantify<P: DdPolicy>(config: &Config, f: &Diagram, labels: &[Label], op: BoolOp) -> io::Result<Output> {
    assert!(
        matches!(op, BoolOp::Or | BoolOp::And),
        "Cannot quantify under {}",
        op
    );
    let mut sorted = labels.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    if f.is_terminal() {
        return Ok(f.clone().into());
    }
    let pending = present(f, &sorted)?;
    if pending.is_empty() {
        return Ok(f.clone().into());
    }

    let algorithm = config.policy.quantify_algorithm();
    debug!(
        "quantify<{}>({}): {} of {} labels present, {:?}",
        P::NAME,
        op,
        pending.len(),
        sorted.len(),
        algorithm
    );
    match algorithm {
        QuantifyAlgorithm::Singleton => singleton::<P>(config, f.clone(), &pending, op),
        QuantifyAlgorithm::Partial => {
            let g = pass::<P>(config, f, &pending, op)?.finalize::<P>(config)?;
            let rest = present(&g, &pending)?;
            singleton::<P>(config, g, &rest, op)
        }
        QuantifyAlgorithm::Nested | QuantifyAlgorithm::Auto => {
            let epsilon = match algorithm {
                QuantifyAlgorithm::Auto => config.policy.fast_reduce_epsilon(),
                _ => None,
            };
            let mut g = f.clone();
            let mut pending = pending;
            loop {
                let next = pass::<P>(config, &g, &pending, op)?.finalize::<P>(config)?;
                let rest = present(&next, &pending)?;
                let grew = epsilon.is_some_and(|eps| too_large(g.size(), next.size(), eps));
                g = next;
                if rest.is_empty() {
                    return Ok(g.into());
                }
                if rest.len() == pending.len() || grew {
                    debug!("quantify<{}>: {} labels left for singleton sweeps", P::NAME, rest.len());
                    return singleton::<P>(config, g, &rest, op);
                }
                pending = rest;
            }
        }
    }
}
