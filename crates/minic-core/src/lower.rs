//! AST lowering: desugars the convenience forms into the core grammar
//! before IR generation.
//!
//! Currently that is only the range-for. `for (T x : arr)` over an array of
//! length N becomes
//!
//! ```text
//! {
//!     for (int __it0 = 0; __it0 < N; __it0++) {
//!         T x = arr[__it0];
//!         <body>
//!     }
//! }
//! ```
//!
//! The hidden index name carries a per-lowering counter so nested range
//! loops do not collide; user identifiers cannot start with `__it` followed
//! by a digit without having chosen that name themselves, in which case the
//! symbol table's shadowing rules still keep the loops correct.

use crate::ast::*;
use crate::span::Span;
use rustc_hash::FxHashMap;

pub struct Lowering {
    /// Array name -> dimension list, tracked so the range-for can read the
    /// iterated array's length without a symbol table.
    array_dims: Vec<FxHashMap<String, Vec<i32>>>,
    next_it: u32,
}

/// Desugar every statement in the unit. Post-condition: no `ForRange`
/// nodes remain anywhere in the tree.
pub fn desugar(unit: &mut Vec<Stmt>) {
    let mut lowering = Lowering {
        array_dims: vec![FxHashMap::default()],
        next_it: 0,
    };
    for stmt in unit.iter_mut() {
        lowering.stmt(stmt);
    }
}

impl Lowering {
    fn record_arrays(&mut self, stmt: &Stmt) {
        if let StmtKind::ArrayDecl(a) = &stmt.kind {
            self.array_dims
                .last_mut()
                .expect("array scope stack is never empty")
                .insert(a.name.clone(), a.dims.clone());
        }
    }

    fn array_len(&self, name: &str) -> i32 {
        for frame in self.array_dims.iter().rev() {
            if let Some(dims) = frame.get(name) {
                return dims.first().copied().unwrap_or(0);
            }
        }
        0
    }

    fn block(&mut self, block: &mut Block) {
        self.array_dims.push(FxHashMap::default());
        for stmt in &mut block.stmts {
            self.stmt(stmt);
        }
        self.array_dims.pop();
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        self.record_arrays(stmt);
        if matches!(stmt.kind, StmtKind::ForRange { .. }) {
            let lowered = self.lower_range_for(stmt);
            *stmt = lowered;
            return;
        }
        match &mut stmt.kind {
            StmtKind::FnDecl(f) => {
                self.array_dims.push(FxHashMap::default());
                for arg in &f.args {
                    if let Decl::Array(a) = arg {
                        self.array_dims
                            .last_mut()
                            .expect("array scope stack is never empty")
                            .insert(a.name.clone(), a.dims.clone());
                    }
                }
                if let Some(body) = &mut f.body {
                    for stmt in &mut body.stmts {
                        self.stmt(stmt);
                    }
                }
                self.array_dims.pop();
            }
            StmtKind::If {
                then_body,
                else_body,
                ..
            } => {
                self.block(then_body);
                if let Some(else_body) = else_body {
                    self.block(else_body);
                }
            }
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.block(body);
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => self.block(body),
            StmtKind::Compound(block) => self.block(block),
            _ => {}
        }
    }

    fn lower_range_for(&mut self, stmt: &mut Stmt) -> Stmt {
        let span = stmt.span;
        let StmtKind::ForRange {
            ty,
            name,
            array,
            body,
        } = &mut stmt.kind
        else {
            unreachable!("lower_range_for is only called on ForRange");
        };
        let len = self.array_len(array);
        let it = format!("__it{}", self.next_it);
        self.next_it += 1;

        let it_sym = |s: Span| Expr::new(ExprKind::Symbol(it.clone()), s);

        let init = Stmt::new(
            StmtKind::VarDecl(VarDecl {
                ty: DataType::Int,
                type_name: None,
                name: it.clone(),
                ptr_depth: 0,
                init: Some(Expr::new(ExprKind::Int(0), span)),
                span,
            }),
            span,
        );
        let cond = Expr::new(
            ExprKind::Binary {
                op: BinOp::Lt,
                lhs: Box::new(it_sym(span)),
                rhs: Box::new(Expr::new(ExprKind::Int(len), span)),
            },
            span,
        );
        let step = Expr::new(
            ExprKind::Unary {
                op: UnOp::Inc,
                postfix: true,
                operand: Box::new(it_sym(span)),
            },
            span,
        );

        // `T x = arr[__it];` heads the rebuilt body.
        let element = Stmt::new(
            StmtKind::VarDecl(VarDecl {
                ty: *ty,
                type_name: None,
                name: name.clone(),
                ptr_depth: 0,
                init: Some(Expr::new(
                    ExprKind::ArrayAccess {
                        name: array.clone(),
                        indices: vec![it_sym(span)],
                    },
                    span,
                )),
                span,
            }),
            span,
        );

        let mut new_body = Block::new(vec![element], body.span);
        new_body.stmts.append(&mut body.stmts);
        let mut new_body_stmt_holder = new_body;
        self.block(&mut new_body_stmt_holder);

        Stmt::new(
            StmtKind::For {
                init: Some(Box::new(init)),
                cond: Some(cond),
                step: Some(step),
                body: new_body_stmt_holder,
            },
            span,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn lowered(src: &str) -> Vec<Stmt> {
        let mut unit = parse(tokenize(src).unwrap()).unwrap();
        desugar(&mut unit);
        unit
    }

    fn has_for_range(stmts: &[Stmt]) -> bool {
        stmts.iter().any(|s| match &s.kind {
            StmtKind::ForRange { .. } => true,
            StmtKind::FnDecl(f) => f
                .body
                .as_ref()
                .map(|b| has_for_range(&b.stmts))
                .unwrap_or(false),
            StmtKind::If {
                then_body,
                else_body,
                ..
            } => {
                has_for_range(&then_body.stmts)
                    || else_body
                        .as_ref()
                        .map(|b| has_for_range(&b.stmts))
                        .unwrap_or(false)
            }
            StmtKind::For { body, .. }
            | StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. } => has_for_range(&body.stmts),
            StmtKind::Compound(b) => has_for_range(&b.stmts),
            _ => false,
        })
    }

    #[test]
    fn range_for_becomes_three_part_for() {
        let unit = lowered("void f() { int a[4]; for (int x : a) { x; } }");
        assert!(!has_for_range(&unit));
        let StmtKind::FnDecl(f) = &unit[0].kind else {
            panic!()
        };
        let StmtKind::For {
            init, cond, step, body,
        } = &f.body.as_ref().unwrap().stmts[1].kind
        else {
            panic!("expected a classic for");
        };
        assert!(init.is_some() && step.is_some());
        // The bound is the array's first dimension.
        let Some(Expr {
            kind: ExprKind::Binary { op: BinOp::Lt, rhs, .. },
            ..
        }) = cond
        else {
            panic!()
        };
        assert!(matches!(rhs.kind, ExprKind::Int(4)));
        // The body head loads the element.
        assert!(matches!(
            &body.stmts[0].kind,
            StmtKind::VarDecl(v) if v.init.is_some() && v.name == "x"
        ));
    }

    #[test]
    fn nested_range_fors_use_distinct_counters() {
        let unit = lowered(
            "void f() { int a[2]; int b[3]; for (int x : a) { for (int y : b) { y; } x; } }",
        );
        assert!(!has_for_range(&unit));
        let dump = format!("{unit:?}");
        assert!(dump.contains("__it0") && dump.contains("__it1"));
    }

    #[test]
    fn classic_for_is_untouched() {
        let unit = lowered("void f() { for (int i = 0; i < 3; i++) { i; } }");
        let StmtKind::FnDecl(f) = &unit[0].kind else {
            panic!()
        };
        assert!(matches!(
            f.body.as_ref().unwrap().stmts[0].kind,
            StmtKind::For { .. }
        ));
    }
}
