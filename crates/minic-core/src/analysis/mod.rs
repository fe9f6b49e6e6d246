//! Middle-end analysis infrastructure over the linear IR.
//!
//! The analyses form a dependency chain, each consuming the previous:
//!
//! ```text
//! CFG (needs only the IR)
//!  └─> Dominance (needs CFG)
//!       └─> SSA (needs CFG + Dominance, rewrites the IR)
//! ```
//!
//! All data structures use instruction indices and dense block ids rather
//! than references into the body vector, so they survive the IR mutations
//! the SSA transform performs.

pub mod cfg;
pub mod dominance;
pub mod ssa;

pub use cfg::{BasicBlock, BlockId, ControlFlowGraph};
pub use dominance::DominatorTree;
pub use ssa::FunctionAnalysis;
