//! Variable and function usage analyzer.
//!
//! One AST walk with per-binding read/write counters. Emits warnings only:
//! a declared-but-unreferenced variable, a variable that is only ever
//! written, and a function that is never called (the entry point is exempt).

use crate::ast::*;
use crate::diagnostics::{Session, WarningKind};
use crate::span::Span;
use rustc_hash::FxHashMap;

/// The designated entry point, never reported as unused.
const ENTRY_POINT: &str = "main";

#[derive(Debug)]
struct Counters {
    span: Span,
    is_function: bool,
    reads: u32,
    writes: u32,
}

pub struct UsageAnalyzer<'s> {
    frames: Vec<FxHashMap<String, Counters>>,
    sess: &'s mut Session,
}

/// Run the analyzer over a translation unit.
pub fn analyze(unit: &[Stmt], sess: &mut Session) {
    let mut ana = UsageAnalyzer {
        frames: vec![FxHashMap::default()],
        sess,
    };
    for stmt in unit {
        ana.stmt(stmt);
    }
    ana.leave_frame();
}

impl<'s> UsageAnalyzer<'s> {
    fn enter_frame(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    /// Pop a frame and report on everything that went out of scope.
    fn leave_frame(&mut self) {
        let frame = self.frames.pop().expect("usage frame stack is never empty");
        let mut entries: Vec<(String, Counters)> = frame.into_iter().collect();
        // Hash maps iterate in arbitrary order; warnings should not.
        entries.sort_by_key(|(_, c)| (c.span.line, c.span.col));
        for (name, c) in entries {
            if c.is_function {
                if c.reads == 0 && name != ENTRY_POINT {
                    self.sess.warn(
                        WarningKind::UnusedFunction,
                        c.span,
                        format!("function `{name}` is never called"),
                    );
                }
            } else if c.reads == 0 && c.writes == 0 {
                self.sess.warn(
                    WarningKind::UnusedVariable,
                    c.span,
                    format!("variable `{name}` is never used"),
                );
            } else if c.reads == 0 {
                self.sess.warn(
                    WarningKind::WriteOnlyVariable,
                    c.span,
                    format!("variable `{name}` is written, but never read"),
                );
            }
        }
    }

    fn declare(&mut self, name: &str, span: Span, is_function: bool) {
        let frame = self.frames.last_mut().expect("usage frame stack is never empty");
        // A definition following its own prototype keeps the counters.
        frame.entry(name.to_string()).or_insert(Counters {
            span,
            is_function,
            reads: 0,
            writes: 0,
        });
    }

    fn count(&mut self, name: &str, read: bool, write: bool) {
        for frame in self.frames.iter_mut().rev() {
            if let Some(c) = frame.get_mut(name) {
                c.reads += read as u32;
                c.writes += write as u32;
                return;
            }
        }
        // Undeclared names are someone else's error to report.
    }

    fn decl(&mut self, decl: &Decl) {
        self.declare(decl.name(), decl.span(), false);
        if let Decl::Var(v) = decl {
            if let Some(init) = &v.init {
                self.expr(init);
                // An initializer counts as the first write.
                self.count(&v.name, false, true);
            }
        }
    }

    fn block(&mut self, block: &Block) {
        self.enter_frame();
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
        self.leave_frame();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl(v) => self.decl(&Decl::Var(v.clone())),
            StmtKind::ArrayDecl(a) => self.declare(&a.name, a.span, false),
            StmtKind::StructDecl(_) => {}
            StmtKind::FnDecl(f) => {
                self.declare(&f.name, f.span, true);
                if let Some(body) = &f.body {
                    self.enter_frame();
                    for arg in &f.args {
                        self.decl(arg);
                    }
                    for stmt in &body.stmts {
                        self.stmt(stmt);
                    }
                    self.leave_frame();
                }
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expr(cond);
                self.block(then_body);
                if let Some(else_body) = else_body {
                    self.block(else_body);
                }
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.enter_frame();
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(cond) = cond {
                    self.expr(cond);
                }
                if let Some(step) = step {
                    self.expr(step);
                }
                for stmt in &body.stmts {
                    self.stmt(stmt);
                }
                self.leave_frame();
            }
            StmtKind::ForRange { name, array, body, .. } => {
                self.enter_frame();
                self.declare(name, stmt.span, false);
                // The loop variable is written on each iteration.
                self.count(name, false, true);
                self.count(array, true, false);
                for stmt in &body.stmts {
                    self.stmt(stmt);
                }
                self.leave_frame();
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.block(body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.block(body);
                self.expr(cond);
            }
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Compound(block) => self.block(block),
            StmtKind::Expr(e) => self.expr(e),
        }
    }

    /// Mark the target of an assignment. Compound assignment also reads.
    fn write_target(&mut self, expr: &Expr, also_read: bool) {
        match &expr.kind {
            ExprKind::Symbol(name) => self.count(name, also_read, true),
            ExprKind::ArrayAccess { name, indices } => {
                self.count(name, also_read, true);
                for index in indices {
                    self.expr(index);
                }
            }
            ExprKind::Member { object, .. } => self.count(object, also_read, true),
            ExprKind::Unary {
                op: UnOp::Deref,
                operand,
                ..
            } => {
                // Writing through a pointer reads the pointer itself.
                self.expr(operand);
            }
            _ => self.expr(expr),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Char(_)
            | ExprKind::Bool(_)
            | ExprKind::Str(_) => {}
            ExprKind::Symbol(name) => self.count(name, true, false),
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_assignment() {
                    self.write_target(lhs, *op != BinOp::Assign);
                    self.expr(rhs);
                } else {
                    self.expr(lhs);
                    self.expr(rhs);
                }
            }
            ExprKind::Unary { op, operand, .. } => match op {
                UnOp::Inc | UnOp::Dec => self.write_target(operand, false),
                UnOp::AddrOf | UnOp::Deref => self.expr(operand),
            },
            ExprKind::ArrayAccess { name, indices } => {
                self.count(name, true, false);
                for index in indices {
                    self.expr(index);
                }
            }
            ExprKind::Member { object, .. } => self.count(object, true, false),
            ExprKind::Call { name, args } => {
                self.count(name, true, false);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::ImplicitCast { expr, .. } => self.expr(expr),
        }
    }
}
