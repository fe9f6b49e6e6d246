//! Local optimizations over the linear IR.
//!
//! Two passes, run after SSA construction: arithmetic peepholes (constant
//! folding and algebraic identities) and statement reordering (hoisting
//! loop-invariant allocas). Both keep the instruction-index invariants
//! intact, renumbering whenever they move anything.

pub mod arith;
pub mod reorder;
