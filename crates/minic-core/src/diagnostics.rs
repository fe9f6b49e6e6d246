//! Diagnostics: positioned compile errors and accumulated warnings.
//!
//! Errors abort the current compilation by propagating a [`CompileError`]
//! out of every pass; the driver is the only place that turns one into a
//! process exit. Warnings never abort: they accumulate on the [`Session`]
//! sink and are drained by the caller after the pipeline finishes.

use crate::span::Span;
use thiserror::Error;

/// Everything a pass can reject. Lexical and syntactic kinds are produced by
/// the lexer/parser; the rest by semantic analysis. `MalformedAst` covers
/// trees that violate the AST invariants (e.g. a non-compound argument list
/// handed in by an external front end).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("unexpected character `{0}`")]
    UnknownChar(char),
    #[error("malformed {what} literal")]
    MalformedLiteral { what: &'static str },
    #[error("unexpected token `{0}`")]
    UnexpectedToken(String),
    #[error("expected `{expected}`, got `{got}`")]
    ExpectedToken { expected: String, got: String },

    #[error("`{0}` is not declared")]
    UndeclaredName(String),
    #[error("`{0}` is already declared in this scope")]
    DuplicateInScope(String),
    #[error("`{0}` is not a function")]
    UnknownFunction(String),
    #[error("`{name}` takes {expected} argument(s), {got} given")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("cannot assign {got} to variable of type {expected}")]
    TypeMismatch { expected: String, got: String },
    #[error("indirection level mismatch ({lhs} vs {rhs})")]
    IndirectionMismatch { lhs: u16, rhs: u16 },
    #[error("attempt to dereference non-pointer type")]
    DerefNonPointer,
    #[error("expected integer as array index, got {0}")]
    NonIntegerIndex(String),
    #[error("out of range: index (which is {index}) >= array size (which is {size})")]
    OutOfRange { index: i64, size: i64 },
    #[error("array index less than zero")]
    NegativeIndex,
    #[error("array size cannot be equal '0'")]
    ZeroSizedArray,
    #[error("cannot index {dims}-dimensional array with {got} indices")]
    TooManyIndices { dims: usize, got: usize },
    #[error("cannot return {got} instead of {expected}")]
    ReturnTypeMismatch { expected: String, got: String },
    #[error("function `{0}` misses at least one return statement")]
    MissingReturn(String),
    #[error("cannot apply `{op}` to {lhs} and {rhs}")]
    CannotApplyOp {
        op: String,
        lhs: String,
        rhs: String,
    },
    #[error("cannot convert {0} to boolean")]
    NotConvertibleToBool(String),
    #[error("struct `{0}` has no field `{1}`")]
    UnknownField(String, String),
    #[error("malformed AST: {0}")]
    MalformedAst(String),
}

/// A fatal, positioned compile error. Formatting follows the user-visible
/// contract: `error at line L, column C: <message>`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("error at line {}, column {}: {kind}", .span.line, .span.col)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub span: Span,
}

impl CompileError {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        CompileError { kind, span }
    }
}

/// Warning kinds. Warnings are advisory and never abort compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    UnusedFunction,
    UnusedVariable,
    WriteOnlyVariable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    pub span: Span,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "warning at line {}, column {}: {}",
            self.span.line, self.span.col, self.message
        )
    }
}

/// Diagnostic configuration.
#[derive(Debug, Clone, Copy)]
pub struct DiagConfig {
    /// Drop warnings instead of accumulating them.
    pub ignore_warnings: bool,
    /// Include `at line L, column C` in rendered messages.
    pub show_location: bool,
}

impl Default for DiagConfig {
    fn default() -> Self {
        DiagConfig {
            ignore_warnings: false,
            show_location: true,
        }
    }
}

/// Per-compilation state threaded through every pass: the warning sink and
/// diagnostic configuration. Replaces the process-wide streams and jump
/// buffer of a classic C front end with a plain value.
#[derive(Debug, Default)]
pub struct Session {
    pub config: DiagConfig,
    warnings: Vec<Warning>,
}

impl Session {
    pub fn new(config: DiagConfig) -> Self {
        Session {
            config,
            warnings: Vec::new(),
        }
    }

    /// Record a warning, unless warnings are suppressed.
    pub fn warn(&mut self, kind: WarningKind, span: Span, message: impl Into<String>) {
        if self.config.ignore_warnings {
            return;
        }
        self.warnings.push(Warning {
            kind,
            span,
            message: message.into(),
        });
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Render an error according to the session's location setting.
    pub fn render_error(&self, err: &CompileError) -> String {
        if self.config.show_location {
            err.to_string()
        } else {
            format!("error: {}", err.kind)
        }
    }
}

/// Shorthand used by every pass.
pub fn err<T>(kind: ErrorKind, span: Span) -> Result<T, CompileError> {
    Err(CompileError::new(kind, span))
}
