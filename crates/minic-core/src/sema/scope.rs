//! Lexically scoped symbol table.
//!
//! A stack of frames: `enter_scope`/`leave_scope` push and pop, `declare`
//! binds in the innermost frame (rejecting same-depth redeclaration), and
//! `lookup` resolves to the deepest binding, so inner declarations shadow
//! outer ones.

use crate::ast::DataType;
use crate::diagnostics::{err, CompileError, ErrorKind};
use crate::span::Span;
use rustc_hash::FxHashMap;

/// What a name is bound to, carrying the declaration payload each analyzer
/// needs (the declaring node itself stays owned by the AST).
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Var,
    Array { dims: Vec<i32> },
    Func { params: Vec<ParamSig>, defined: bool },
}

/// A function parameter signature as visible to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSig {
    pub name: String,
    pub ty: DataType,
    pub ptr_depth: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub name: String,
    pub ty: DataType,
    pub type_name: Option<String>,
    pub ptr_depth: u16,
    pub kind: SymbolKind,
    pub scope_depth: usize,
    pub span: Span,
}

#[derive(Debug, Default)]
pub struct Scope {
    frames: Vec<FxHashMap<String, SymbolInfo>>,
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            frames: vec![FxHashMap::default()],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn enter_scope(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub fn leave_scope(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot leave the root scope");
        self.frames.pop();
    }

    /// Bind `info` in the innermost frame. Shadowing an outer binding is
    /// allowed; rebinding at the same depth is not.
    pub fn declare(&mut self, mut info: SymbolInfo) -> Result<(), CompileError> {
        info.scope_depth = self.depth();
        let frame = self.frames.last_mut().expect("scope stack is never empty");
        if frame.contains_key(&info.name) {
            return err(ErrorKind::DuplicateInScope(info.name.clone()), info.span);
        }
        frame.insert(info.name.clone(), info);
        Ok(())
    }

    /// Re-bind a name at the current depth, replacing any existing binding.
    /// Used for function definitions overriding their own prototype.
    pub fn redeclare(&mut self, mut info: SymbolInfo) {
        info.scope_depth = self.depth();
        let frame = self.frames.last_mut().expect("scope stack is never empty");
        frame.insert(info.name.clone(), info);
    }

    /// Resolve a name to its innermost binding.
    pub fn lookup(&self, name: &str) -> Option<&SymbolInfo> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Resolve, or fail with UNDECLARED-NAME at `span`.
    pub fn lookup_or_err(&self, name: &str, span: Span) -> Result<&SymbolInfo, CompileError> {
        self.lookup(name)
            .ok_or_else(|| CompileError::new(ErrorKind::UndeclaredName(name.to_string()), span))
    }
}
