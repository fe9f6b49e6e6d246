//! Source positions.
//!
//! Every token, AST node and diagnostic carries a `Span` so that errors and
//! dumps can point back into the source text.

use serde::{Deserialize, Serialize};

/// A line/column position in the source file. Both are 1-based; the parser
/// never produces line 0 except through [`Span::dummy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub fn new(line: u32, col: u32) -> Self {
        Span { line, col }
    }

    /// A placeholder position for synthesized nodes (desugared loops,
    /// inserted casts) and test fixtures.
    pub fn dummy() -> Self {
        Span { line: 0, col: 0 }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
