//! Semantic analysis: a family of AST walks sharing the scoped symbol table.
//!
//! Pass order is fixed: usage analysis (warnings only), then the function
//! analyzer (call shape), then the type checker (which annotates the tree
//! with implicit casts). Each pass walks the tree in lexical pre-order.

pub mod functions;
pub mod scope;
pub mod types;
pub mod usage;

pub use scope::{ParamSig, Scope, SymbolInfo, SymbolKind};
pub use types::TypeInfo;
