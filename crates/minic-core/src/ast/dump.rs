//! Textual AST dump.
//!
//! Renders the tree one node per line with two-space indent steps, in the
//! shape `NodeName <line:L, col:C> payload`. Positions can be omitted and
//! node names colored, which is what the `dump-ast-simple` / `dump-ast`
//! driver surfaces toggle.

use crate::ast::*;
use crate::span::Span;
use std::fmt::Write;

/// Dump configuration.
#[derive(Debug, Clone, Copy)]
pub struct DumpConfig {
    /// Leave out `<line:L, col:C>` markers (stable output for tests).
    pub omit_position: bool,
    /// ANSI-color node names.
    pub colored: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        DumpConfig {
            omit_position: false,
            colored: false,
        }
    }
}

const COL_NAME: &str = "\x1b[35m";
const COL_LOCATION: &str = "\x1b[90m";
const COL_END: &str = "\x1b[0m";

/// Dump a whole translation unit.
pub fn dump_unit(stmts: &[Stmt], config: DumpConfig) -> String {
    let mut d = Dumper {
        out: String::new(),
        indent: 0,
        config,
    };
    for stmt in stmts {
        d.stmt(stmt);
    }
    d.out
}

struct Dumper {
    out: String,
    indent: usize,
    config: DumpConfig,
}

impl Dumper {
    fn line(&mut self, span: Span, name: &str, payload: &str) {
        for _ in 0..self.indent {
            self.out.push(' ');
        }
        if self.config.colored {
            let _ = write!(self.out, "{COL_NAME}{name}{COL_END}");
        } else {
            self.out.push_str(name);
        }
        if !self.config.omit_position {
            if self.config.colored {
                let _ = write!(
                    self.out,
                    " {COL_LOCATION}<line:{}, col:{}>{COL_END}",
                    span.line, span.col
                );
            } else {
                let _ = write!(self.out, " <line:{}, col:{}>", span.line, span.col);
            }
        }
        if !payload.is_empty() {
            let _ = write!(self.out, " {payload}");
        }
        self.out.push('\n');
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 2;
        f(self);
        self.indent -= 2;
    }

    fn type_str(ty: DataType, type_name: Option<&str>, ptr_depth: u16) -> String {
        let base = match (ty, type_name) {
            (DataType::Struct, Some(name)) => format!("struct {name}"),
            _ => ty.to_string(),
        };
        format!("{base}{}", "*".repeat(ptr_depth as usize))
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Var(v) => self.var_decl(v),
            Decl::Array(a) => self.array_decl(a),
        }
    }

    fn var_decl(&mut self, v: &VarDecl) {
        let ty = Self::type_str(v.ty, v.type_name.as_deref(), v.ptr_depth);
        self.line(v.span, "VarDecl", &format!("{ty} `{}`", v.name));
        if let Some(init) = &v.init {
            self.nested(|d| d.expr(init));
        }
    }

    fn array_decl(&mut self, a: &ArrayDecl) {
        let ty = Self::type_str(a.ty, a.type_name.as_deref(), a.ptr_depth);
        let dims: Vec<String> = a.dims.iter().map(|d| format!("[{d}]")).collect();
        self.line(
            a.span,
            "ArrayDecl",
            &format!("{ty} `{}` {}", a.name, dims.join("")),
        );
    }

    fn block(&mut self, block: &Block) {
        self.line(block.span, "CompoundStmt", "");
        self.nested(|d| {
            for stmt in &block.stmts {
                d.stmt(stmt);
            }
        });
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl(v) => self.var_decl(v),
            StmtKind::ArrayDecl(a) => self.array_decl(a),
            StmtKind::StructDecl(s) => {
                self.line(s.span, "StructDecl", &format!("`{}`", s.name));
                self.nested(|d| {
                    for field in &s.fields {
                        d.decl(field);
                    }
                });
            }
            StmtKind::FnDecl(f) => {
                let ty = Self::type_str(f.ret_ty, None, f.ptr_depth);
                let name = if f.body.is_some() {
                    "FunctionDecl"
                } else {
                    "FunctionPrototype"
                };
                self.line(f.span, name, &format!("{ty} `{}`", f.name));
                self.nested(|d| {
                    for arg in &f.args {
                        d.decl(arg);
                    }
                    if let Some(body) = &f.body {
                        d.block(body);
                    }
                });
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.line(stmt.span, "IfStmt", "");
                self.nested(|d| {
                    d.expr(cond);
                    d.block(then_body);
                    if let Some(else_body) = else_body {
                        d.block(else_body);
                    }
                });
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.line(stmt.span, "ForStmt", "");
                self.nested(|d| {
                    if let Some(init) = init {
                        d.stmt(init);
                    }
                    if let Some(cond) = cond {
                        d.expr(cond);
                    }
                    if let Some(step) = step {
                        d.expr(step);
                    }
                    d.block(body);
                });
            }
            StmtKind::ForRange {
                ty,
                name,
                array,
                body,
            } => {
                self.line(
                    stmt.span,
                    "ForRangeStmt",
                    &format!("{ty} `{name}` : `{array}`"),
                );
                self.nested(|d| d.block(body));
            }
            StmtKind::While { cond, body } => {
                self.line(stmt.span, "WhileStmt", "");
                self.nested(|d| {
                    d.expr(cond);
                    d.block(body);
                });
            }
            StmtKind::DoWhile { body, cond } => {
                self.line(stmt.span, "DoWhileStmt", "");
                self.nested(|d| {
                    d.block(body);
                    d.expr(cond);
                });
            }
            StmtKind::Return { value } => {
                self.line(stmt.span, "ReturnStmt", "");
                if let Some(value) = value {
                    self.nested(|d| d.expr(value));
                }
            }
            StmtKind::Break => self.line(stmt.span, "BreakStmt", ""),
            StmtKind::Continue => self.line(stmt.span, "ContinueStmt", ""),
            StmtKind::Compound(block) => self.block(block),
            StmtKind::Expr(e) => self.expr(e),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Int(v) => self.line(expr.span, "IntegerLiteral", &v.to_string()),
            ExprKind::Float(v) => self.line(expr.span, "FloatingPointLiteral", &v.to_string()),
            ExprKind::Char(c) => self.line(expr.span, "CharLiteral", &format!("'{c}'")),
            ExprKind::Bool(b) => self.line(expr.span, "BooleanLiteral", &b.to_string()),
            ExprKind::Str(s) => self.line(expr.span, "StringLiteral", &format!("\"{s}\"")),
            ExprKind::Symbol(name) => self.line(expr.span, "Symbol", &format!("`{name}`")),
            ExprKind::Binary { op, lhs, rhs } => {
                self.line(expr.span, "BinaryOperator", op.symbol());
                self.nested(|d| {
                    d.expr(lhs);
                    d.expr(rhs);
                });
            }
            ExprKind::Unary {
                op,
                postfix,
                operand,
            } => {
                let name = if *postfix {
                    "PostfixUnaryOperator"
                } else {
                    "PrefixUnaryOperator"
                };
                self.line(expr.span, name, op.symbol());
                self.nested(|d| d.expr(operand));
            }
            ExprKind::ArrayAccess { name, indices } => {
                self.line(expr.span, "ArrayAccess", &format!("`{name}`"));
                self.nested(|d| {
                    for index in indices {
                        d.expr(index);
                    }
                });
            }
            ExprKind::Member { object, field } => {
                self.line(expr.span, "MemberAccess", &format!("`{object}`.`{field}`"));
            }
            ExprKind::Call { name, args } => {
                self.line(expr.span, "FunctionCall", &format!("`{name}`"));
                self.nested(|d| {
                    for arg in args {
                        d.expr(arg);
                    }
                });
            }
            ExprKind::ImplicitCast { to, expr: inner } => {
                self.line(expr.span, "ImplicitCast", &to.to_string());
                self.nested(|d| d.expr(inner));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn dump(src: &str, config: DumpConfig) -> String {
        dump_unit(&parse(tokenize(src).unwrap()).unwrap(), config)
    }

    #[test]
    fn simple_function_shape() {
        let out = dump(
            "int f() { return 1; }",
            DumpConfig {
                omit_position: true,
                colored: false,
            },
        );
        let expected = "\
FunctionDecl int `f`
  CompoundStmt
    ReturnStmt
      IntegerLiteral 1
";
        assert_eq!(out, expected);
    }

    #[test]
    fn positions_present_by_default() {
        let out = dump("int x;", DumpConfig::default());
        assert!(out.contains("<line:1, col:1>"));
    }

    #[test]
    fn colored_dump_wraps_names() {
        let out = dump(
            "int x;",
            DumpConfig {
                omit_position: true,
                colored: true,
            },
        );
        assert!(out.contains("\x1b[35mVarDecl\x1b[0m"));
    }
}
