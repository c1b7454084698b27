//! # The BDD manager
//!
//! [`Bdd`] is the entry point for working with Binary Decision Diagrams. Unlike a classic
//! unique-table manager it holds no nodes: every [`Diagram`] owns its node file, which lives on
//! disk and is shared between diagrams by reference counting. The manager only carries the
//! [`Config`] (memory budget and execution policy) that every operation runs with.
//!
//! ## Variables
//!
//! Variables are identified by their [`Label`], starting at 0. The variable order is the order
//! of the labels.
//!
//! ## Operations
//!
//! Every operation is one or more sweeps over its inputs followed by a Reduce sweep, so each
//! returns a fresh, reduced diagram. Negation is the only exception: it flips a flag on the
//! diagram and shares the node file.
//!
//! ```
//! use sweepdd::bdd::Bdd;
//!
//! let bdd = Bdd::default();
//! let x0 = bdd.ithvar(0).unwrap();
//! let x1 = bdd.ithvar(1).unwrap();
//!
//! // x0 & !x1
//! let f = bdd.apply_and(&x0, &bdd.apply_not(&x1)).unwrap();
//! assert!(bdd.eval(&f, |v| v == 0).unwrap());
//! assert!(!bdd.eval(&f, |_| true).unwrap());
//!
//! // Existential quantification of x1 leaves x0.
//! let g = bdd.exists(&f, &[1]).unwrap();
//! assert!(bdd.equal(&g, &x0).unwrap());
//! ```
//!
//! ## Memory
//!
//! Each sweep plans its data structures within `memory_limit` bytes. Structures whose bounds
//! fit stay in memory; larger ones spill sorted runs to temporary files.

use std::io;

use log::debug;
use num_bigint::BigUint;

use crate::apply::apply;
use crate::bool_op::BoolOp;
use crate::count::{path_count, sat_count};
use crate::diagram::{Diagram, Output};
use crate::eval::{eval, sat_path};
use crate::exec_policy::ExecPolicy;
use crate::isomorphism::is_isomorphic;
use crate::ite::ite;
use crate::memory::Config;
use crate::node::Node;
use crate::policy::BddPolicy;
use crate::ptr::Ptr;
use crate::quantify::quantify;
use crate::select::{select, Selection};
use crate::types::{Label, MAX_ID};
use crate::writer::NodeWriter;

/// Entry point for BDD operations.
#[derive(Debug, Clone, Default)]
pub struct Bdd {
    config: Config,
}

impl Bdd {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A copy of this manager running with another execution policy.
    pub fn with_policy(&self, policy: ExecPolicy) -> Self {
        Self::new(self.config.clone().with_policy(policy))
    }

    /// A copy of this manager running within another memory budget.
    pub fn with_memory_limit(&self, memory_limit: usize) -> Self {
        Self::new(self.config.clone().with_memory_limit(memory_limit))
    }

    fn finalize(&self, output: Output) -> io::Result<Diagram> {
        output.finalize::<BddPolicy>(&self.config)
    }
}

// Builders
impl Bdd {
    pub fn constant(&self, value: bool) -> io::Result<Diagram> {
        Diagram::terminal(value)
    }

    pub fn zero(&self) -> io::Result<Diagram> {
        self.constant(false)
    }

    pub fn one(&self) -> io::Result<Diagram> {
        self.constant(true)
    }

    /// The function `x{label}`.
    pub fn ithvar(&self, label: Label) -> io::Result<Diagram> {
        let mut w = NodeWriter::new()?;
        w.push(Node::new(label, MAX_ID, Ptr::FALSE, Ptr::TRUE))?;
        Diagram::new(w.finish()?)
    }

    /// The function `!x{label}`.
    pub fn nithvar(&self, label: Label) -> io::Result<Diagram> {
        Ok(self.ithvar(label)?.negated())
    }

    /// Sorts literals by label, dropping duplicates. `None` if a label occurs in both polarities.
    fn literals(literals: impl IntoIterator<Item = (Label, bool)>) -> Option<Vec<(Label, bool)>> {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort_unstable();
        literals.dedup();
        if literals.windows(2).any(|w| w[0].0 == w[1].0) {
            None
        } else {
            Some(literals)
        }
    }

    /// Builds a chain of nodes bottom-up; `link` gives the children of a literal's node.
    fn chain<F>(&self, literals: &[(Label, bool)], bottom: Ptr, link: F) -> io::Result<Diagram>
    where
        F: Fn(bool, Ptr) -> (Ptr, Ptr),
    {
        if literals.is_empty() {
            return self.constant(bottom.value());
        }
        let mut w = NodeWriter::new()?;
        let mut current = bottom;
        for &(label, positive) in literals.iter().rev() {
            let (low, high) = link(positive, current);
            w.push(Node::new(label, MAX_ID, low, high))?;
            current = Ptr::node(label, MAX_ID);
        }
        Diagram::new(w.finish()?)
    }

    /// The conjunction of literals, given as `(label, polarity)` pairs.
    ///
    /// ```
    /// use sweepdd::bdd::Bdd;
    ///
    /// let bdd = Bdd::default();
    /// // x1 & !x3
    /// let f = bdd.cube([(1, true), (3, false)]).unwrap();
    /// assert_eq!(f.size(), 2);
    /// assert!(bdd.eval(&f, |v| v == 1).unwrap());
    /// ```
    pub fn cube(&self, literals: impl IntoIterator<Item = (Label, bool)>) -> io::Result<Diagram> {
        match Self::literals(literals) {
            Some(literals) => {
                debug!("cube(literals = {:?})", literals);
                self.chain(&literals, Ptr::TRUE, |positive, next| {
                    if positive {
                        (Ptr::FALSE, next)
                    } else {
                        (next, Ptr::FALSE)
                    }
                })
            }
            None => self.zero(),
        }
    }

    /// The disjunction of literals, given as `(label, polarity)` pairs.
    pub fn clause(&self, literals: impl IntoIterator<Item = (Label, bool)>) -> io::Result<Diagram> {
        match Self::literals(literals) {
            Some(literals) => {
                debug!("clause(literals = {:?})", literals);
                self.chain(&literals, Ptr::FALSE, |positive, next| {
                    if positive {
                        (next, Ptr::TRUE)
                    } else {
                        (Ptr::TRUE, next)
                    }
                })
            }
            None => self.one(),
        }
    }
}

// Operations
impl Bdd {
    pub fn apply(&self, f: &Diagram, g: &Diagram, op: BoolOp) -> io::Result<Diagram> {
        debug!("apply_{}(f = {:?}, g = {:?})", op, f, g);
        self.finalize(apply::<BddPolicy>(&self.config, f, g, op)?)
    }

    pub fn apply_not(&self, f: &Diagram) -> Diagram {
        f.negated()
    }

    pub fn apply_and(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::And)
    }

    pub fn apply_nand(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::Nand)
    }

    pub fn apply_or(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::Or)
    }

    pub fn apply_nor(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::Nor)
    }

    pub fn apply_xor(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::Xor)
    }

    pub fn apply_eq(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::Xnor)
    }

    pub fn apply_imply(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::Imp)
    }

    /// `f & !g`
    pub fn apply_diff(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::Diff)
    }

    /// `!f & g`
    pub fn apply_less(&self, f: &Diagram, g: &Diagram) -> io::Result<Diagram> {
        self.apply(f, g, BoolOp::Less)
    }

    /// Conjunction of all `fs`; `true` if there are none.
    pub fn apply_and_many<'a>(&self, fs: impl IntoIterator<Item = &'a Diagram>) -> io::Result<Diagram> {
        debug!("apply_and_many(...)");
        let mut res = self.one()?;
        for f in fs {
            res = self.apply_and(&res, f)?;
        }
        Ok(res)
    }

    /// Disjunction of all `fs`; `false` if there are none.
    pub fn apply_or_many<'a>(&self, fs: impl IntoIterator<Item = &'a Diagram>) -> io::Result<Diagram> {
        debug!("apply_or_many(...)");
        let mut res = self.zero()?;
        for f in fs {
            res = self.apply_or(&res, f)?;
        }
        Ok(res)
    }

    /// `if f then g else h`
    pub fn apply_ite(&self, f: &Diagram, g: &Diagram, h: &Diagram) -> io::Result<Diagram> {
        debug!("apply_ite(f = {:?}, g = {:?}, h = {:?})", f, g, h);
        self.finalize(ite(&self.config, f, g, h)?)
    }

    /// Existential quantification of the variables `labels`.
    pub fn exists(&self, f: &Diagram, labels: &[Label]) -> io::Result<Diagram> {
        debug!("exists(f = {:?}, labels = {:?})", f, labels);
        self.finalize(quantify::<BddPolicy>(&self.config, f, labels, BoolOp::Or)?)
    }

    /// Universal quantification of the variables `labels`.
    pub fn forall(&self, f: &Diagram, labels: &[Label]) -> io::Result<Diagram> {
        debug!("forall(f = {:?}, labels = {:?})", f, labels);
        self.finalize(quantify::<BddPolicy>(&self.config, f, labels, BoolOp::And)?)
    }

    /// Fixes the variables of `assignment`, given as `(label, value)` pairs, to their values.
    ///
    /// ```
    /// use sweepdd::bdd::Bdd;
    ///
    /// let bdd = Bdd::default();
    /// let f = bdd.apply_and(&bdd.ithvar(0).unwrap(), &bdd.ithvar(1).unwrap()).unwrap();
    /// let g = bdd.restrict(&f, &[(0, true)]).unwrap();
    /// assert!(bdd.equal(&g, &bdd.ithvar(1).unwrap()).unwrap());
    /// ```
    pub fn restrict(&self, f: &Diagram, assignment: &[(Label, bool)]) -> io::Result<Diagram> {
        debug!("restrict(f = {:?}, assignment = {:?})", f, assignment);
        let mut levels = assignment
            .iter()
            .map(|&(label, value)| (label, Selection::Skip(value)))
            .collect::<Vec<_>>();
        levels.sort_unstable_by_key(|&(l, _)| l);
        levels.dedup_by_key(|&mut (l, _)| l);
        self.finalize(select(&self.config, f, &levels, false)?)
    }

    /// Whether `f` and `g` denote the same function.
    pub fn equal(&self, f: &Diagram, g: &Diagram) -> io::Result<bool> {
        is_isomorphic(&self.config, f, g)
    }
}

// Queries
impl Bdd {
    /// The value of `f` under `assignment`.
    pub fn eval<F>(&self, f: &Diagram, assignment: F) -> io::Result<bool>
    where
        F: Fn(Label) -> bool,
    {
        eval(f, assignment)
    }

    /// Number of satisfying assignments to the variables `0..varcount`.
    pub fn sat_count(&self, f: &Diagram, varcount: Label) -> io::Result<BigUint> {
        sat_count(&self.config, f, varcount)
    }

    /// Number of paths from the root to `true`.
    pub fn path_count(&self, f: &Diagram) -> io::Result<BigUint> {
        path_count(&self.config, f)
    }

    /// The lexicographically smallest satisfying assignment as a cube over the variables on
    /// its path; `false` if there is none.
    pub fn satmin(&self, f: &Diagram) -> io::Result<Diagram> {
        match sat_path(f, false)? {
            Some(path) => self.cube(path),
            None => self.zero(),
        }
    }

    /// The lexicographically largest satisfying assignment as a cube over the variables on
    /// its path; `false` if there is none.
    pub fn satmax(&self, f: &Diagram) -> io::Result<Diagram> {
        match sat_path(f, true)? {
            Some(path) => self.cube(path),
            None => self.zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use test_log::test;

    use super::*;
    use crate::exec_policy::MemoryMode;

    const VARS: Label = 5;

    /// Disjunction of a few random cubes over `VARS` variables.
    fn random_function(bdd: &Bdd, rng: &mut impl Rng) -> Diagram {
        let mut cubes = Vec::new();
        for _ in 0..rng.random_range(1..4) {
            let mut literals = Vec::new();
            for v in 0..VARS {
                if rng.random_bool(0.5) {
                    literals.push((v, rng.random::<bool>()));
                }
            }
            cubes.push(bdd.cube(literals).unwrap());
        }
        bdd.apply_or_many(&cubes).unwrap()
    }

    /// Truth table over `VARS` variables.
    fn table(bdd: &Bdd, f: &Diagram) -> Vec<bool> {
        (0..1u32 << VARS)
            .map(|bits| bdd.eval(f, |v| (bits >> v) & 1 != 0).unwrap())
            .collect()
    }

    #[test]
    fn test_var() {
        let bdd = Bdd::default();
        let x = bdd.ithvar(3).unwrap();
        assert_eq!(x.nodes().unwrap(), vec![Node::new(3, MAX_ID, Ptr::FALSE, Ptr::TRUE)]);
        assert!(bdd.eval(&x, |v| v == 3).unwrap());
        assert!(!bdd.eval(&x, |_| false).unwrap());
    }

    #[test]
    fn test_not_var() {
        let bdd = Bdd::default();
        let x = bdd.nithvar(3).unwrap();
        assert_eq!(x.nodes().unwrap(), vec![Node::new(3, MAX_ID, Ptr::TRUE, Ptr::FALSE)]);
    }

    #[test]
    fn test_terminal() {
        let bdd = Bdd::default();
        assert!(bdd.zero().unwrap().is_false());
        assert!(bdd.one().unwrap().is_true());
        assert!(bdd.apply_not(&bdd.zero().unwrap()).is_true());
    }

    #[test]
    fn test_cube() {
        let bdd = Bdd::default();
        // x0 & !x2 & x4
        let f = bdd.cube([(4, true), (0, true), (2, false)]).unwrap();
        assert_eq!(f.size(), 3);
        let expected = (0..1u32 << VARS)
            .map(|bits| bits & 1 != 0 && bits & 4 == 0 && bits & 16 != 0)
            .collect::<Vec<_>>();
        assert_eq!(table(&bdd, &f), expected);
        assert!(bdd.cube([(1, true), (1, false)]).unwrap().is_false());
        assert!(bdd.cube([]).unwrap().is_true());
    }

    #[test]
    fn test_clause() {
        let bdd = Bdd::default();
        // x1 | !x3
        let f = bdd.clause([(1, true), (3, false)]).unwrap();
        let expected = (0..1u32 << VARS)
            .map(|bits| bits & 2 != 0 || bits & 8 == 0)
            .collect::<Vec<_>>();
        assert_eq!(table(&bdd, &f), expected);
        assert!(bdd.clause([(1, true), (1, false)]).unwrap().is_true());
        assert!(bdd.clause([]).unwrap().is_false());
    }

    #[test]
    fn test_and_matches_cube() {
        let bdd = Bdd::default();
        let f = bdd.apply_and(&bdd.ithvar(21).unwrap(), &bdd.ithvar(42).unwrap()).unwrap();
        let g = bdd.cube([(21, true), (42, true)]).unwrap();
        assert!(bdd.equal(&f, &g).unwrap());
        assert!(!bdd.equal(&f, &bdd.apply_not(&g)).unwrap());
    }

    #[test]
    fn test_and_commutative() {
        let bdd = Bdd::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..10 {
            let f = random_function(&bdd, &mut rng);
            let g = random_function(&bdd, &mut rng);
            let fg = bdd.apply_and(&f, &g).unwrap();
            let gf = bdd.apply_and(&g, &f).unwrap();
            assert!(bdd.equal(&fg, &gf).unwrap());
        }
    }

    #[test]
    fn test_de_morgan() {
        let bdd = Bdd::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10 {
            let f = random_function(&bdd, &mut rng);
            let g = random_function(&bdd, &mut rng);
            // !(f & g) == !f | !g
            let left = bdd.apply_not(&bdd.apply_and(&f, &g).unwrap());
            let right = bdd.apply_or(&bdd.apply_not(&f), &bdd.apply_not(&g)).unwrap();
            assert!(bdd.equal(&left, &right).unwrap());
            // !(f | g) == !f & !g
            let left = bdd.apply_nor(&f, &g).unwrap();
            let right = bdd.apply_and(&bdd.apply_not(&f), &bdd.apply_not(&g)).unwrap();
            assert!(bdd.equal(&left, &right).unwrap());
        }
    }

    #[test]
    fn test_operators_match_truth_tables() {
        let bdd = Bdd::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let ops = [
            BoolOp::And,
            BoolOp::Nand,
            BoolOp::Or,
            BoolOp::Nor,
            BoolOp::Xor,
            BoolOp::Xnor,
            BoolOp::Imp,
            BoolOp::InvImp,
            BoolOp::Diff,
            BoolOp::Less,
        ];
        for op in ops {
            let f = random_function(&bdd, &mut rng);
            let g = random_function(&bdd, &mut rng);
            let h = bdd.apply(&f, &g, op).unwrap();
            let expected = table(&bdd, &f)
                .into_iter()
                .zip(table(&bdd, &g))
                .map(|(a, b)| op.eval(a, b))
                .collect::<Vec<_>>();
            assert_eq!(table(&bdd, &h), expected, "{}", op);
        }
    }

    #[test]
    fn test_xor_itself() {
        let bdd = Bdd::default();
        let f = bdd.cube([(0, true), (1, false)]).unwrap();
        assert!(bdd.apply_xor(&f, &f).unwrap().is_false());
        assert!(bdd.apply_xor(&f, &bdd.apply_not(&f)).unwrap().is_true());
    }

    #[test]
    fn test_apply_ite() {
        let bdd = Bdd::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..5 {
            let f = random_function(&bdd, &mut rng);
            let g = random_function(&bdd, &mut rng);
            let h = random_function(&bdd, &mut rng);
            let ite = bdd.apply_ite(&f, &g, &h).unwrap();
            let expected = bdd
                .apply_or(&bdd.apply_and(&f, &g).unwrap(), &bdd.apply_less(&f, &h).unwrap())
                .unwrap();
            assert!(bdd.equal(&ite, &expected).unwrap());
        }
    }

    #[test]
    fn test_quantification() {
        let bdd = Bdd::default();
        // (x0 & x1) | (!x0 & x2)
        let f = bdd
            .apply_ite(&bdd.ithvar(0).unwrap(), &bdd.ithvar(1).unwrap(), &bdd.ithvar(2).unwrap())
            .unwrap();
        let exists = bdd.exists(&f, &[0]).unwrap();
        let forall = bdd.forall(&f, &[0]).unwrap();
        let x1 = bdd.ithvar(1).unwrap();
        let x2 = bdd.ithvar(2).unwrap();
        assert!(bdd.equal(&exists, &bdd.apply_or(&x1, &x2).unwrap()).unwrap());
        assert!(bdd.equal(&forall, &bdd.apply_and(&x1, &x2).unwrap()).unwrap());
        assert!(bdd.exists(&f, &[0, 1, 2]).unwrap().is_true());
    }

    #[test]
    fn test_counting() {
        let bdd = Bdd::default();
        let f = bdd.clause([(0, true), (2, true)]).unwrap();
        assert_eq!(bdd.sat_count(&f, 3).unwrap(), BigUint::from(6u32));
        assert_eq!(bdd.sat_count(&bdd.apply_not(&f), 3).unwrap(), BigUint::from(2u32));
        assert_eq!(bdd.path_count(&f).unwrap(), BigUint::from(2u32));
    }

    #[test]
    fn test_external_memory_agrees() {
        let bdd = Bdd::default();
        let external = bdd.with_policy(ExecPolicy::default().with_memory_mode(MemoryMode::External));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..5 {
            let f = random_function(&bdd, &mut rng);
            let g = random_function(&bdd, &mut rng);
            let internal = bdd.apply_xor(&f, &g).unwrap();
            let spilled = external.apply_xor(&f, &g).unwrap();
            assert!(bdd.equal(&internal, &spilled).unwrap());
        }
    }

    #[test]
    fn test_out_of_memory() {
        let bdd = Bdd::default().with_memory_limit(16);
        let x = bdd.ithvar(0).unwrap();
        let y = bdd.ithvar(1).unwrap();
        let err = bdd.apply_and(&x, &y).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::OutOfMemory);
    }

    #[test]
    fn test_restrict_matches_truth_tables() {
        let bdd = Bdd::default();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        for _ in 0..20 {
            let f = random_function(&bdd, &mut rng);
            let mut assignment = Vec::new();
            for v in 0..VARS {
                if rng.random_bool(0.4) {
                    assignment.push((v, rng.random::<bool>()));
                }
            }
            let g = bdd.restrict(&f, &assignment).unwrap();
            let fixed = |bits: u32| {
                assignment.iter().fold(bits, |b, &(v, value)| {
                    if value {
                        b | 1 << v
                    } else {
                        b & !(1 << v)
                    }
                })
            };
            let tf = table(&bdd, &f);
            let expected = (0..1u32 << VARS).map(|bits| tf[fixed(bits) as usize]).collect::<Vec<_>>();
            assert_eq!(table(&bdd, &g), expected, "{:?}", assignment);
        }
    }

    #[test]
    fn test_restrict_to_constant() {
        let bdd = Bdd::default();
        let f = bdd.cube([(0, true), (2, false)]).unwrap();
        assert!(bdd.restrict(&f, &[(0, false)]).unwrap().is_false());
        assert!(bdd.restrict(&f, &[(2, false), (0, true)]).unwrap().is_true());
        assert!(bdd.restrict(&f, &[]).unwrap().same_as(&f));
    }

    #[test]
    fn test_satmin_and_satmax() {
        let bdd = Bdd::default();
        // x0 ? x1 : x2
        let f = bdd
            .apply_ite(&bdd.ithvar(0).unwrap(), &bdd.ithvar(1).unwrap(), &bdd.ithvar(2).unwrap())
            .unwrap();
        let min = bdd.satmin(&f).unwrap();
        assert!(bdd.equal(&min, &bdd.cube([(0, false), (2, true)]).unwrap()).unwrap());
        let max = bdd.satmax(&f).unwrap();
        assert!(bdd.equal(&max, &bdd.cube([(0, true), (1, true)]).unwrap()).unwrap());

        // Both imply `f`.
        for cube in [&min, &max] {
            assert!(bdd.apply_imply(cube, &f).unwrap().is_true());
        }
        assert!(bdd.satmin(&bdd.zero().unwrap()).unwrap().is_false());
        assert!(bdd.satmax(&bdd.one().unwrap()).unwrap().is_true());
    }
}
