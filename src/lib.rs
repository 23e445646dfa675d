//! # herbrand-rs: Herbrand equivalence analysis in Rust
//!
//! **`herbrand-rs`** computes Herbrand equivalence classes for straight-line-with-branches
//! imperative programs: at every program point it partitions a fixed universe of candidate
//! expressions into classes such that two expressions share a class iff they are provably
//! equal under uninterpreted-operator semantics along *every* execution path reaching that
//! point. The result feeds redundancy elimination and related compiler transformations.
//!
//! ## What is Herbrand equivalence?
//!
//! Equality in the free term algebra: operators carry no arithmetic meaning, so `A + B`
//! equals `X + Y` exactly when `A ≡ X` and `B ≡ Y` are already proven. Because operators
//! are uninterpreted, the analysis is sound for any operator set, and equivalences are
//! exactly the ones that hold on all paths.
//!
//! ## Key pieces
//!
//! - **Normalised CFG**: every multi-predecessor join gets an explicit confluence node in
//!   front of the instruction's transfer node, so a node is either a transfer step or a
//!   confluence step, never both. See [`cfg`].
//! - **Fixed expression universe**: all atoms plus all two-operand expressions over them,
//!   densely indexed by pure arithmetic. See [`universe`].
//! - **Congruence-closure registry**: a run-global map from `(op, class, class)` to the
//!   canonical class id of the compound expression, so structurally identical compounds
//!   collapse and classes that fragment and re-form recover their old id. See [`registry`].
//! - **Monotone fixed-point driver**: applies the transfer or confluence function at each
//!   node until a full pass changes nothing. See [`analysis`].
//!
//! ## Basic usage
//!
//! ```rust
//! use herbrand_rs::analysis::Analysis;
//! use herbrand_rs::parser::parse_program;
//!
//! let program = parse_program("A = 5\nB = A\nC = A + B\n").unwrap();
//! let mut analysis = Analysis::new(&program);
//! analysis.run();
//!
//! // At the end of the program, C is equivalent to A + B (and much more).
//! let exit = analysis.cfg().end_node().unwrap();
//! let c = program.values().find(|v| program.value_string(*v) == "C").unwrap();
//! let (values, binaries) = analysis.class_members_at(exit, c).unwrap();
//! assert!(!binaries.is_empty());
//! # let _ = values;
//! ```
//!
//! Programs come from the textual mini-language ([`parser`]) or are assembled directly
//! with [`program::ProgramBuilder`] when translating an external IR.

pub mod analysis;
pub mod cfg;
pub mod display;
pub mod dot;
pub mod interner;
pub mod parser;
pub mod partition;
pub mod program;
pub mod registry;
pub mod types;
pub mod universe;
