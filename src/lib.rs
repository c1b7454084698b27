//! # sweepdd: external-memory decision diagrams
//!
//! **`sweepdd`** manipulates **Binary Decision Diagrams (BDDs)** and **Zero-suppressed Decision
//! Diagrams (ZDDs)** that do not have to fit in memory. Diagrams live in files on disk, and every
//! operation is a small number of sequential sweeps over those files, driven by priority queues
//! that spill to disk when their contents outgrow the memory budget.
//!
//! ## How it works
//!
//! A diagram is stored as a **levelized file**: its nodes sorted by level and, within a level,
//! by id. There are no pointers into memory. A node refers to its children by
//! `(label, id)` pairs packed into a 64-bit [`Ptr`][crate::ptr::Ptr].
//!
//! Operations follow the time-forward processing pattern:
//!
//! 1. A **top-down product sweep** ([`prod`]) walks the inputs in lockstep. Requests for nodes
//!    further down wait in a levelized priority queue until their level is reached. The sweep
//!    writes the unreduced result as a file of arcs.
//! 2. A **bottom-up Reduce sweep** ([`reduce`]) applies the reduction rules level by level and
//!    writes the canonical node file.
//!
//! Apply, if-then-else, and quantification are all instances of the product sweep, each with its
//! own [`Combinator`][crate::prod::Combinator].
//!
//! ## Key Features
//!
//! - **Bounded memory**: Each sweep plans its structures within the configured budget and
//!   picks an in-memory or an external strategy from upper bounds derived from cuts of the inputs.
//! - **Cheap negation**: A [`Diagram`][crate::diagram::Diagram] is a shared file plus a negation
//!   flag, so complementing a BDD costs nothing.
//! - **Two kinds of diagrams**: The [`DdPolicy`][crate::policy::DdPolicy] trait captures what
//!   differs between BDDs and ZDDs, and every algorithm is generic over it.
//! - **Exact counting**: Satisfying assignments and paths are counted with arbitrary precision.
//!
//! ## Basic Usage
//!
//! ```rust
//! use sweepdd::bdd::Bdd;
//!
//! // 1. Initialize the manager with the default 128 MiB budget
//! let bdd = Bdd::default();
//!
//! // 2. Create variables (0-indexed)
//! let x0 = bdd.ithvar(0).unwrap();
//! let x1 = bdd.ithvar(1).unwrap();
//!
//! // 3. Build a formula: f = x0 AND (NOT x1)
//! let f = bdd.apply_and(&x0, &bdd.apply_not(&x1)).unwrap();
//!
//! // 4. Check properties
//! assert!(!f.is_false()); // It is satisfiable
//! assert!(!f.is_true()); // It is not a tautology
//! assert_eq!(bdd.sat_count(&f, 2).unwrap(), num_bigint::BigUint::from(1u32));
//!
//! // 5. Evaluate (x0=true, x1=false) -> should be true
//! assert!(bdd.eval(&f, |v| v == 0).unwrap());
//! ```
//!
//! ## Core Components
//!
//! - **[`bdd`]** and **[`zdd`]**: The managers, the entry points for users.
//! - **[`diagram`]**: Diagram handles and the results of sweeps.
//! - **[`apply`]**, **[`ite`]**, **[`quantify`]**, **[`select`]**, **[`isomorphism`]**, **[`count`]**: The
//!   algorithms.
//! - **[`levelized_pq`]**, **[`sorter`]**, **[`heap`]**: External-memory data structures.
//! - **[`memory`]** and **[`exec_policy`]**: Memory budget and per-operation choices.
//! - **[`dot`]**: Utilities for visualizing diagrams using Graphviz.

pub mod apply;
pub mod arc;
pub mod bdd;
pub mod bool_op;
pub mod count;
pub mod cut;
pub mod diagram;
pub mod dot;
pub mod eval;
pub mod exec_policy;
pub mod file;
pub mod heap;
pub mod isomorphism;
pub mod ite;
pub mod levelized_pq;
pub mod memory;
pub mod node;
pub mod policy;
pub mod prod;
pub mod ptr;
pub mod quantify;
pub mod reduce;
pub mod request;
pub mod select;
pub mod sorter;
pub mod stream;
pub mod types;
pub mod writer;
pub mod zdd;
