//! Function analyzer.
//!
//! Verifies that every call resolves to a visible function declaration or
//! prototype, that arity matches the declaration, and that every non-void
//! function body has a returning terminal path. Runs before the type
//! checker, which assumes arity has already been validated.

use crate::ast::*;
use crate::diagnostics::{err, CompileError, ErrorKind};
use crate::sema::scope::{ParamSig, Scope, SymbolInfo, SymbolKind};

pub struct FunctionAnalyzer {
    scope: Scope,
}

/// Run the analyzer over a translation unit.
pub fn analyze(unit: &[Stmt]) -> Result<(), CompileError> {
    let mut ana = FunctionAnalyzer {
        scope: Scope::new(),
    };
    for stmt in unit {
        ana.stmt(stmt)?;
    }
    Ok(())
}

fn param_sigs(args: &[Decl]) -> Vec<ParamSig> {
    args.iter()
        .map(|d| ParamSig {
            name: d.name().to_string(),
            ty: d.ty(),
            ptr_depth: d.ptr_depth(),
        })
        .collect()
}

impl FunctionAnalyzer {
    fn declare_decl(&mut self, decl: &Decl) -> Result<(), CompileError> {
        let kind = match decl {
            Decl::Var(_) => SymbolKind::Var,
            Decl::Array(a) => SymbolKind::Array {
                dims: a.dims.clone(),
            },
        };
        self.scope.declare(SymbolInfo {
            name: decl.name().to_string(),
            ty: decl.ty(),
            type_name: None,
            ptr_depth: decl.ptr_depth(),
            kind,
            scope_depth: 0,
            span: decl.span(),
        })
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::VarDecl(v) => {
                if let Some(init) = &v.init {
                    self.expr(init)?;
                }
                self.declare_decl(&Decl::Var(v.clone()))
            }
            StmtKind::ArrayDecl(a) => self.declare_decl(&Decl::Array(a.clone())),
            StmtKind::StructDecl(_) => Ok(()),
            StmtKind::FnDecl(f) => self.fn_decl(f),
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expr(cond)?;
                self.block(then_body)?;
                if let Some(else_body) = else_body {
                    self.block(else_body)?;
                }
                Ok(())
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.scope.enter_scope();
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                if let Some(cond) = cond {
                    self.expr(cond)?;
                }
                if let Some(step) = step {
                    self.expr(step)?;
                }
                for stmt in &body.stmts {
                    self.stmt(stmt)?;
                }
                self.scope.leave_scope();
                Ok(())
            }
            StmtKind::ForRange { name, body, .. } => {
                self.scope.enter_scope();
                self.scope.declare(SymbolInfo {
                    name: name.clone(),
                    ty: DataType::Int,
                    type_name: None,
                    ptr_depth: 0,
                    kind: SymbolKind::Var,
                    scope_depth: 0,
                    span: stmt.span,
                })?;
                for stmt in &body.stmts {
                    self.stmt(stmt)?;
                }
                self.scope.leave_scope();
                Ok(())
            }
            StmtKind::While { cond, body } => {
                self.expr(cond)?;
                self.block(body)
            }
            StmtKind::DoWhile { body, cond } => {
                self.block(body)?;
                self.expr(cond)
            }
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.expr(value)?;
                }
                Ok(())
            }
            StmtKind::Break | StmtKind::Continue => Ok(()),
            StmtKind::Compound(block) => self.block(block),
            StmtKind::Expr(e) => self.expr(e),
        }
    }

    fn block(&mut self, block: &Block) -> Result<(), CompileError> {
        self.scope.enter_scope();
        for stmt in &block.stmts {
            self.stmt(stmt)?;
        }
        self.scope.leave_scope();
        Ok(())
    }

    fn fn_decl(&mut self, f: &FnDecl) -> Result<(), CompileError> {
        let info = SymbolInfo {
            name: f.name.clone(),
            ty: f.ret_ty,
            type_name: None,
            ptr_depth: f.ptr_depth,
            kind: SymbolKind::Func {
                params: param_sigs(&f.args),
                defined: f.body.is_some(),
            },
            scope_depth: 0,
            span: f.span,
        };
        // A definition may follow its own prototype; anything else bound to
        // the name at this depth is a duplicate.
        let is_proto = matches!(
            self.scope.lookup(&f.name),
            Some(SymbolInfo {
                kind: SymbolKind::Func { defined: false, .. },
                ..
            })
        );
        if self.scope.lookup(&f.name).is_some() && !is_proto {
            return err(ErrorKind::DuplicateInScope(f.name.clone()), f.span);
        }
        self.scope.redeclare(info);

        let Some(body) = &f.body else {
            return Ok(());
        };

        self.scope.enter_scope();
        for arg in &f.args {
            self.declare_decl(arg)?;
        }
        for stmt in &body.stmts {
            self.stmt(stmt)?;
        }
        self.scope.leave_scope();

        if f.ret_ty != DataType::Void && !block_returns(body) {
            return err(ErrorKind::MissingReturn(f.name.clone()), f.span);
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::Call { name, args } => {
                let info = self.scope.lookup_or_err(name, expr.span)?;
                let SymbolKind::Func { params, .. } = &info.kind else {
                    return err(ErrorKind::UnknownFunction(name.clone()), expr.span);
                };
                if params.len() != args.len() {
                    return err(
                        ErrorKind::ArityMismatch {
                            name: name.clone(),
                            expected: params.len(),
                            got: args.len(),
                        },
                        expr.span,
                    );
                }
                for arg in args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs)?;
                self.expr(rhs)
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::ArrayAccess { indices, .. } => {
                for index in indices {
                    self.expr(index)?;
                }
                Ok(())
            }
            ExprKind::ImplicitCast { expr, .. } => self.expr(expr),
            _ => Ok(()),
        }
    }
}

/// Structural check: does this block end on a path that always returns?
/// Either the terminal statement is a return, or it is an if/else whose both
/// branches return (nested compounds recurse).
fn block_returns(block: &Block) -> bool {
    match block.stmts.last() {
        Some(stmt) => stmt_returns(stmt),
        None => false,
    }
}

fn stmt_returns(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return { .. } => true,
        StmtKind::If {
            then_body,
            else_body: Some(else_body),
            ..
        } => block_returns(then_body) && block_returns(else_body),
        StmtKind::Compound(block) => block_returns(block),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn check(src: &str) -> Result<(), CompileError> {
        analyze(&parse(tokenize(src).unwrap()).unwrap())
    }

    #[test]
    fn call_to_unknown_name_is_rejected() {
        let e = check("int main() { g(); return 0; }").unwrap_err();
        assert_eq!(e.kind, ErrorKind::UndeclaredName("g".to_string()));
    }

    #[test]
    fn call_to_variable_is_rejected() {
        let e = check("int main() { int g = 0; g(); return g; }").unwrap_err();
        assert_eq!(e.kind, ErrorKind::UnknownFunction("g".to_string()));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let e = check("int f(int a) { return a; }\nint main() { return f(1, 2); }").unwrap_err();
        assert_eq!(
            e.kind,
            ErrorKind::ArityMismatch {
                name: "f".to_string(),
                expected: 1,
                got: 2,
            }
        );
    }

    #[test]
    fn call_through_prototype_is_accepted() {
        check("int f(int a);\nint main() { return f(1); }\nint f(int a) { return a; }").unwrap();
    }

    #[test]
    fn missing_return_is_rejected() {
        let e = check("int f() { int x = 1; x = x + 1; }").unwrap_err();
        assert_eq!(e.kind, ErrorKind::MissingReturn("f".to_string()));
    }

    #[test]
    fn void_function_without_return_is_accepted() {
        check("void f() { int x = 1; x = x + 1; }").unwrap();
    }

    #[test]
    fn terminal_if_else_with_both_returns_is_accepted() {
        check("int sign(int x) { if (x < 0) { return 1; } else { return 0; } }").unwrap();
    }

    #[test]
    fn if_without_else_does_not_count_as_return() {
        let e = check("int f(int x) { if (x) { return 1; } }").unwrap_err();
        assert_eq!(e.kind, ErrorKind::MissingReturn("f".to_string()));
    }

    #[test]
    fn recursive_call_is_visible_inside_own_body() {
        check("int fact(int n) { if (n < 2) { return 1; } return n * fact(n - 1); }").unwrap();
    }
}
