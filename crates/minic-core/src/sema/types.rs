//! Type checker.
//!
//! A single AST walk carrying `last` (the type and pointer depth of the most
//! recently visited expression) and `last_ret` (the type of the most recent
//! return). Operator admissibility is per scalar family; pointer operands
//! require equal depth on both sides. Mixed-but-cheaply-convertible numeric
//! operands get an implicit-cast node wrapped around the converted side, so
//! re-running the checker on an annotated tree is a no-op.

use crate::ast::*;
use crate::diagnostics::{err, CompileError, ErrorKind};
use crate::sema::scope::{ParamSig, Scope, SymbolInfo, SymbolKind};
use crate::span::Span;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// Type and indirection of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub ty: DataType,
    pub ptr_depth: u16,
}

impl TypeInfo {
    fn new(ty: DataType, ptr_depth: u16) -> Self {
        TypeInfo { ty, ptr_depth }
    }

    fn scalar(ty: DataType) -> Self {
        TypeInfo { ty, ptr_depth: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub ty: DataType,
    pub ptr_depth: u16,
}

#[derive(Debug, Clone, Default)]
pub struct StructInfo {
    /// Declaration order matters: the field's position is its IR index.
    pub fields: IndexMap<String, FieldInfo>,
}

pub struct TypeChecker {
    scope: Scope,
    structs: FxHashMap<String, StructInfo>,
    last: TypeInfo,
    last_ret: TypeInfo,
}

/// Run the type checker, annotating the tree with implicit casts.
pub fn check(unit: &mut [Stmt]) -> Result<(), CompileError> {
    let mut tc = TypeChecker {
        scope: Scope::new(),
        structs: FxHashMap::default(),
        last: TypeInfo::scalar(DataType::Void),
        last_ret: TypeInfo::scalar(DataType::Void),
    };
    for stmt in unit.iter_mut() {
        tc.stmt_mut(stmt)?;
    }
    Ok(())
}

/// Conversion rank inside the numeric family; a mixed pair converts to the
/// higher rank. Anything outside the family never converts implicitly.
fn numeric_rank(ty: DataType) -> Option<u8> {
    match ty {
        DataType::Bool => Some(0),
        DataType::Char => Some(1),
        DataType::Int => Some(2),
        DataType::Float => Some(3),
        _ => None,
    }
}

/// Operator admissibility for depth-0 operands of scalar type `t`, per
/// family: assignment takes everything, comparisons and arithmetic take the
/// whole numeric family, bitwise/shift/mod take the integral types only.
fn op_admits(op: BinOp, t: DataType) -> bool {
    use BinOp::*;
    match op {
        Assign => true,
        Le | Lt | Ge | Gt | Eq | Ne | Or | And | Add | Sub | Mul | Div | AddAssign
        | SubAssign | MulAssign | DivAssign => matches!(
            t,
            DataType::Int | DataType::Char | DataType::Bool | DataType::Float
        ),
        BitOr | BitAnd | BitXor | Shl | Shr | Mod | ModAssign | BitOrAssign | BitAndAssign
        | BitXorAssign | ShlAssign | ShrAssign => {
            matches!(t, DataType::Int | DataType::Char | DataType::Bool)
        }
    }
}

/// Wrap `expr` in an implicit cast to `to`, in place.
fn insert_cast(expr: &mut Expr, to: DataType) {
    let span = expr.span;
    let inner = std::mem::replace(expr, Expr::new(ExprKind::Int(0), span));
    *expr = Expr::new(
        ExprKind::ImplicitCast {
            to,
            expr: Box::new(inner),
        },
        span,
    );
}

impl TypeChecker {
    // ----- statements -----

    fn stmt_mut(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        let span = stmt.span;
        if matches!(stmt.kind, StmtKind::ForRange { .. }) {
            return self.for_range(stmt);
        }
        match &mut stmt.kind {
            StmtKind::VarDecl(v) => self.var_decl(v),
            StmtKind::ArrayDecl(a) => self.array_decl(a),
            StmtKind::StructDecl(s) => self.struct_decl(s),
            StmtKind::FnDecl(f) => self.fn_decl(f),
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expr(cond)?;
                self.require_bool_convertible(span)?;
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
                    self.stmt_mut(init)?;
                }
                if let Some(cond) = cond {
                    self.expr(cond)?;
                    self.require_bool_convertible(span)?;
                }
                if let Some(step) = step {
                    self.expr(step)?;
                }
                for stmt in &mut body.stmts {
                    self.stmt_mut(stmt)?;
                }
                self.scope.leave_scope();
                Ok(())
            }
            StmtKind::ForRange { .. } => unreachable!("handled before the match"),
            StmtKind::While { cond, body } => {
                self.expr(cond)?;
                self.require_bool_convertible(span)?;
                self.block(body)
            }
            StmtKind::DoWhile { body, cond } => {
                self.block(body)?;
                self.expr(cond)?;
                self.require_bool_convertible(span)
            }
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.expr(value)?;
                    self.last_ret = self.last;
                } else {
                    self.last_ret = TypeInfo::scalar(DataType::Void);
                }
                Ok(())
            }
            StmtKind::Break | StmtKind::Continue => Ok(()),
            StmtKind::Compound(block) => self.block(block),
            StmtKind::Expr(e) => self.expr(e),
        }
    }

    fn for_range(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        let span = stmt.span;
        let StmtKind::ForRange {
            ty,
            name,
            array,
            body,
        } = &mut stmt.kind
        else {
            unreachable!();
        };
        let info = self.scope.lookup_or_err(array, span)?;
        let SymbolKind::Array { .. } = &info.kind else {
            return err(
                ErrorKind::MalformedAst(format!("`{array}` is not an array")),
                span,
            );
        };
        if info.ty != *ty {
            return err(
                ErrorKind::TypeMismatch {
                    expected: info.ty.to_string(),
                    got: ty.to_string(),
                },
                span,
            );
        }
        self.scope.enter_scope();
        self.scope.declare(SymbolInfo {
            name: name.clone(),
            ty: *ty,
            type_name: None,
            ptr_depth: 0,
            kind: SymbolKind::Var,
            scope_depth: 0,
            span,
        })?;
        for stmt in &mut body.stmts {
            self.stmt_mut(stmt)?;
        }
        self.scope.leave_scope();
        Ok(())
    }

    fn block(&mut self, block: &mut Block) -> Result<(), CompileError> {
        self.scope.enter_scope();
        for stmt in &mut block.stmts {
            self.stmt_mut(stmt)?;
        }
        self.scope.leave_scope();
        Ok(())
    }

    fn var_decl(&mut self, v: &mut VarDecl) -> Result<(), CompileError> {
        if let Some(init) = &mut v.init {
            let is_string = string_beneath(init);
            self.expr(init)?;
            let matches_decl = self.last.ty == v.ty && self.last.ptr_depth == v.ptr_depth;
            let string_to_pointer = v.ptr_depth == 1 && is_string;
            if !matches_decl && !string_to_pointer {
                return err(
                    ErrorKind::TypeMismatch {
                        expected: v.ty.to_string(),
                        got: self.last.ty.to_string(),
                    },
                    v.span,
                );
            }
        }
        self.scope.declare(SymbolInfo {
            name: v.name.clone(),
            ty: v.ty,
            type_name: v.type_name.clone(),
            ptr_depth: v.ptr_depth,
            kind: SymbolKind::Var,
            scope_depth: 0,
            span: v.span,
        })?;
        self.last = TypeInfo::new(v.ty, v.ptr_depth);
        Ok(())
    }

    fn array_decl(&mut self, a: &ArrayDecl) -> Result<(), CompileError> {
        for &dim in &a.dims {
            if dim == 0 {
                return err(ErrorKind::ZeroSizedArray, a.span);
            }
        }
        self.scope.declare(SymbolInfo {
            name: a.name.clone(),
            ty: a.ty,
            type_name: a.type_name.clone(),
            ptr_depth: a.ptr_depth,
            kind: SymbolKind::Array {
                dims: a.dims.clone(),
            },
            scope_depth: 0,
            span: a.span,
        })?;
        self.last = TypeInfo::new(a.ty, a.ptr_depth);
        Ok(())
    }

    fn struct_decl(&mut self, s: &StructDecl) -> Result<(), CompileError> {
        let mut info = StructInfo::default();
        for field in &s.fields {
            info.fields.insert(
                field.name().to_string(),
                FieldInfo {
                    ty: field.ty(),
                    ptr_depth: field.ptr_depth(),
                },
            );
        }
        self.structs.insert(s.name.clone(), info);
        Ok(())
    }

    fn fn_decl(&mut self, f: &mut FnDecl) -> Result<(), CompileError> {
        let params: Vec<ParamSig> = f
            .args
            .iter()
            .map(|d| ParamSig {
                name: d.name().to_string(),
                ty: d.ty(),
                ptr_depth: d.ptr_depth(),
            })
            .collect();
        let info = SymbolInfo {
            name: f.name.clone(),
            ty: f.ret_ty,
            type_name: None,
            ptr_depth: f.ptr_depth,
            kind: SymbolKind::Func {
                params,
                defined: f.body.is_some(),
            },
            scope_depth: 0,
            span: f.span,
        };
        // The function analyzer has already rejected duplicate definitions.
        self.scope.redeclare(info);

        let Some(body) = &mut f.body else {
            return Ok(());
        };

        self.last_ret = TypeInfo::scalar(DataType::Void);
        self.scope.enter_scope();
        for arg in &f.args {
            let kind = match arg {
                Decl::Var(_) => SymbolKind::Var,
                Decl::Array(a) => SymbolKind::Array {
                    dims: a.dims.clone(),
                },
            };
            self.scope.declare(SymbolInfo {
                name: arg.name().to_string(),
                ty: arg.ty(),
                type_name: None,
                ptr_depth: arg.ptr_depth(),
                kind,
                scope_depth: 0,
                span: arg.span(),
            })?;
        }
        self.block(body)?;
        self.scope.leave_scope();

        if f.ret_ty != DataType::Void
            && (self.last_ret.ty != f.ret_ty || self.last_ret.ptr_depth != f.ptr_depth)
        {
            return err(
                ErrorKind::ReturnTypeMismatch {
                    expected: f.ret_ty.to_string(),
                    got: self.last_ret.ty.to_string(),
                },
                f.span,
            );
        }
        Ok(())
    }

    // ----- expressions -----

    fn require_bool_convertible(&self, span: Span) -> Result<(), CompileError> {
        if self.last.ty != DataType::Int && self.last.ty != DataType::Bool {
            return err(
                ErrorKind::NotConvertibleToBool(self.last.ty.to_string()),
                span,
            );
        }
        Ok(())
    }

    fn expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Int(_) => self.last = TypeInfo::scalar(DataType::Int),
            ExprKind::Float(_) => self.last = TypeInfo::scalar(DataType::Float),
            ExprKind::Char(_) => self.last = TypeInfo::scalar(DataType::Char),
            ExprKind::Bool(_) => self.last = TypeInfo::scalar(DataType::Bool),
            // A string literal is a char pointer value.
            ExprKind::Str(_) => self.last = TypeInfo::new(DataType::Char, 1),
            ExprKind::Symbol(name) => {
                let info = self.scope.lookup_or_err(name, span)?;
                self.last = TypeInfo::new(info.ty, info.ptr_depth);
            }
            ExprKind::Binary { op, lhs, rhs } => return self.binary(span, *op, lhs, rhs),
            ExprKind::Unary { op, operand, .. } => return self.unary(span, *op, operand),
            ExprKind::ArrayAccess { name, indices } => {
                return self.array_access(span, name, indices)
            }
            ExprKind::Member { object, field } => return self.member(span, object, field),
            ExprKind::Call { name, args } => return self.call(span, name, args),
            ExprKind::ImplicitCast { to, expr: inner } => {
                let to = *to;
                self.expr(inner)?;
                self.last = TypeInfo::new(to, self.last.ptr_depth);
            }
        }
        Ok(())
    }

    fn binary(
        &mut self,
        span: Span,
        op: BinOp,
        lhs: &mut Expr,
        rhs: &mut Expr,
    ) -> Result<(), CompileError> {
        self.expr(lhs)?;
        let l = self.last;
        self.expr(rhs)?;
        let r = self.last;

        if l.ptr_depth == 0 && r.ptr_depth == 0 {
            let common = if l.ty == r.ty {
                l.ty
            } else {
                // A mixed-but-convertible numeric pair gets an implicit
                // cast on the converted side; assignments convert toward
                // the assigned variable's type.
                match (numeric_rank(l.ty), numeric_rank(r.ty)) {
                    (Some(lr), Some(rr)) => {
                        if op.is_assignment() {
                            insert_cast(rhs, l.ty);
                            l.ty
                        } else if lr < rr {
                            insert_cast(lhs, r.ty);
                            r.ty
                        } else {
                            insert_cast(rhs, l.ty);
                            l.ty
                        }
                    }
                    _ => {
                        return err(
                            ErrorKind::CannotApplyOp {
                                op: op.symbol().to_string(),
                                lhs: l.ty.to_string(),
                                rhs: r.ty.to_string(),
                            },
                            span,
                        )
                    }
                }
            };
            if !op_admits(op, common) {
                return err(
                    ErrorKind::CannotApplyOp {
                        op: op.symbol().to_string(),
                        lhs: l.ty.to_string(),
                        rhs: r.ty.to_string(),
                    },
                    span,
                );
            }
            self.last = if op.is_comparison() || op == BinOp::And || op == BinOp::Or {
                TypeInfo::scalar(DataType::Int)
            } else if op.is_assignment() {
                l
            } else {
                TypeInfo::scalar(common)
            };
        } else {
            // Pointer operands: both sides must agree on type and depth.
            if l.ptr_depth != r.ptr_depth || l.ty != r.ty {
                return err(
                    ErrorKind::IndirectionMismatch {
                        lhs: l.ptr_depth,
                        rhs: r.ptr_depth,
                    },
                    span,
                );
            }
            self.last = if op.is_comparison() {
                TypeInfo::scalar(DataType::Int)
            } else {
                l
            };
        }
        Ok(())
    }

    fn unary(&mut self, span: Span, op: UnOp, operand: &mut Expr) -> Result<(), CompileError> {
        self.expr(operand)?;
        match op {
            UnOp::Inc | UnOp::Dec => {
                if self.last.ty != DataType::Int && self.last.ty != DataType::Char {
                    return err(
                        ErrorKind::CannotApplyOp {
                            op: op.symbol().to_string(),
                            lhs: self.last.ty.to_string(),
                            rhs: self.last.ty.to_string(),
                        },
                        span,
                    );
                }
            }
            UnOp::AddrOf => self.last.ptr_depth += 1,
            UnOp::Deref => {
                if self.last.ptr_depth == 0 {
                    return err(ErrorKind::DerefNonPointer, span);
                }
                self.last.ptr_depth -= 1;
            }
        }
        Ok(())
    }

    fn array_access(
        &mut self,
        span: Span,
        name: &str,
        indices: &mut [Expr],
    ) -> Result<(), CompileError> {
        let info = self.scope.lookup_or_err(name, span)?.clone();
        let result = match &info.kind {
            SymbolKind::Array { dims } => {
                if indices.len() > dims.len() {
                    return err(
                        ErrorKind::TooManyIndices {
                            dims: dims.len(),
                            got: indices.len(),
                        },
                        span,
                    );
                }
                for (index, &dim) in indices.iter().zip(dims.iter()) {
                    if let ExprKind::Int(v) = index.kind {
                        if v < 0 {
                            return err(ErrorKind::NegativeIndex, index.span);
                        }
                        if i64::from(v) >= i64::from(dim) {
                            return err(
                                ErrorKind::OutOfRange {
                                    index: i64::from(v),
                                    size: i64::from(dim),
                                },
                                index.span,
                            );
                        }
                    }
                }
                TypeInfo::new(info.ty, info.ptr_depth)
            }
            SymbolKind::Var if info.ptr_depth >= 1 => {
                let used = indices.len() as u16;
                if used > info.ptr_depth {
                    return err(ErrorKind::DerefNonPointer, span);
                }
                TypeInfo::new(info.ty, info.ptr_depth - used)
            }
            _ => return err(ErrorKind::DerefNonPointer, span),
        };
        for index in indices.iter_mut() {
            self.expr(index)?;
            if self.last.ty != DataType::Int || self.last.ptr_depth != 0 {
                return err(
                    ErrorKind::NonIntegerIndex(self.last.ty.to_string()),
                    index.span,
                );
            }
        }
        self.last = result;
        Ok(())
    }

    fn member(&mut self, span: Span, object: &str, field: &str) -> Result<(), CompileError> {
        let info = self.scope.lookup_or_err(object, span)?;
        let Some(struct_name) = info.type_name.clone() else {
            return err(
                ErrorKind::MalformedAst(format!("`{object}` is not a structure")),
                span,
            );
        };
        let Some(sinfo) = self.structs.get(&struct_name) else {
            return err(ErrorKind::UndeclaredName(struct_name), span);
        };
        let Some(finfo) = sinfo.fields.get(field) else {
            return err(
                ErrorKind::UnknownField(struct_name, field.to_string()),
                span,
            );
        };
        self.last = TypeInfo::new(finfo.ty, finfo.ptr_depth);
        Ok(())
    }

    fn call(&mut self, span: Span, name: &str, args: &mut [Expr]) -> Result<(), CompileError> {
        let info = self.scope.lookup_or_err(name, span)?.clone();
        let SymbolKind::Func { params, .. } = &info.kind else {
            return err(ErrorKind::UnknownFunction(name.to_string()), span);
        };
        debug_assert_eq!(
            params.len(),
            args.len(),
            "arity checked by the function analyzer"
        );
        for (arg, param) in args.iter_mut().zip(params.iter()) {
            self.expr(arg)?;
            if self.last.ty != param.ty {
                return err(
                    ErrorKind::TypeMismatch {
                        expected: param.ty.to_string(),
                        got: self.last.ty.to_string(),
                    },
                    arg.span,
                );
            }
            if self.last.ptr_depth != param.ptr_depth {
                return err(
                    ErrorKind::IndirectionMismatch {
                        lhs: param.ptr_depth,
                        rhs: self.last.ptr_depth,
                    },
                    arg.span,
                );
            }
        }
        self.last = TypeInfo::new(info.ty, info.ptr_depth);
        Ok(())
    }
}

/// True when the expression is a string literal, possibly under casts.
fn string_beneath(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Str(_) => true,
        ExprKind::ImplicitCast { expr, .. } => string_beneath(expr),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn check_src(src: &str) -> Result<Vec<Stmt>, CompileError> {
        let mut unit = parse(tokenize(src).unwrap()).unwrap();
        crate::sema::functions::analyze(&unit)?;
        check(&mut unit)?;
        Ok(unit)
    }

    #[test]
    fn arithmetic_on_matching_ints_is_accepted() {
        check_src("int f(int a) { return a + 2 * 3; }").unwrap();
    }

    #[test]
    fn mixed_numeric_operands_get_an_implicit_cast() {
        let unit = check_src("float f() { float x = 1.5; x = x + 1; return x; }").unwrap();
        let StmtKind::FnDecl(f) = &unit[0].kind else {
            panic!()
        };
        let StmtKind::Expr(e) = &f.body.as_ref().unwrap().stmts[1].kind else {
            panic!()
        };
        let ExprKind::Binary { rhs, .. } = &e.kind else {
            panic!()
        };
        let ExprKind::Binary { rhs: int_side, .. } = &rhs.kind else {
            panic!()
        };
        assert!(matches!(
            int_side.kind,
            ExprKind::ImplicitCast {
                to: DataType::Float,
                ..
            }
        ));
        // Re-running the checker on the annotated tree changes nothing.
        let mut again = unit.clone();
        check(&mut again).unwrap();
        assert_eq!(unit, again);
    }

    #[test]
    fn cast_is_inserted_toward_the_wider_type() {
        let mut unit = parse(tokenize("int f(int a, float b) { b = b * b; return a; }").unwrap())
            .unwrap();
        check(&mut unit).unwrap();
        let mut unit2 =
            parse(tokenize("float g(float b) { b = b + 1.5; return b; }").unwrap()).unwrap();
        check(&mut unit2).unwrap();
    }

    #[test]
    fn int_plus_float_wraps_the_int_side() {
        let mut unit =
            parse(tokenize("float f(int a, float b) { float c = b + 1.5; return c; }").unwrap())
                .unwrap();
        check(&mut unit).unwrap();
    }

    #[test]
    fn bitwise_on_float_is_rejected() {
        let e = check_src("int f(int a) { return a & 1; }").map(|_| ());
        assert!(e.is_ok());
        let e = check_src("float f(float a) { float b = 1.0; b = a; return a; }").map(|_| ());
        assert!(e.is_ok());
        let e = check_src("void f(float a) { float b = 1.0; b = a % 2.0; }").unwrap_err();
        assert!(matches!(e.kind, ErrorKind::CannotApplyOp { .. }));
    }

    #[test]
    fn deref_of_non_pointer_is_rejected() {
        let e = check_src("void f() { int x; *x; }").unwrap_err();
        assert_eq!(e.kind, ErrorKind::DerefNonPointer);
    }

    #[test]
    fn deref_reduces_depth_by_one() {
        check_src("int f(int* p) { return *p; }").unwrap();
        let e = check_src("int f(int* p) { return **p; }").unwrap_err();
        assert_eq!(e.kind, ErrorKind::DerefNonPointer);
    }

    #[test]
    fn pointer_depth_mismatch_is_rejected() {
        let e = check_src("void f(int* p, int x) { p = p + x; }").unwrap_err();
        assert!(matches!(e.kind, ErrorKind::IndirectionMismatch { .. }));
    }

    #[test]
    fn array_bounds_at_the_edges() {
        check_src("void f() { int a[4]; a[0]; a[3]; }").unwrap();
        let e = check_src("void f() { int a[4]; a[4]; }").unwrap_err();
        assert_eq!(e.kind, ErrorKind::OutOfRange { index: 4, size: 4 });
        // The error points at the literal's column.
        assert_eq!(e.span.col, 24);
        let e = check_src("void f() { int a[4]; a[-1]; }").unwrap_err();
        assert_eq!(e.kind, ErrorKind::NegativeIndex);
    }

    #[test]
    fn zero_sized_array_is_rejected() {
        let e = check_src("void f() { int a[0]; }").unwrap_err();
        assert_eq!(e.kind, ErrorKind::ZeroSizedArray);
    }

    #[test]
    fn non_integer_index_is_rejected() {
        let e = check_src("void f(float x) { int a[4]; a[x]; }").unwrap_err();
        assert!(matches!(e.kind, ErrorKind::NonIntegerIndex(_)));
    }

    #[test]
    fn too_many_indices_are_rejected() {
        let e = check_src("void f() { int a[4]; a[1][2]; }").unwrap_err();
        assert!(matches!(e.kind, ErrorKind::TooManyIndices { dims: 1, got: 2 }));
    }

    #[test]
    fn condition_must_be_bool_convertible() {
        let e = check_src("void f(float x) { while (x) { } }").unwrap_err();
        assert!(matches!(e.kind, ErrorKind::NotConvertibleToBool(_)));
        check_src("void f(int x) { while (x) { x = x - 1; } }").unwrap();
    }

    #[test]
    fn return_type_must_match_declaration() {
        let e = check_src("int f() { float x = 1.5; return x; }").unwrap_err();
        assert!(matches!(e.kind, ErrorKind::ReturnTypeMismatch { .. }));
    }

    #[test]
    fn string_initializer_requires_char_pointer() {
        check_src("void f() { char* s = \"hi\"; *s; }").unwrap();
        let e = check_src("void f() { int s = \"hi\"; s; }").unwrap_err();
        assert!(matches!(e.kind, ErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn call_argument_types_must_match() {
        let e =
            check_src("int f(int a) { return a; }\nint main() { float x = 1.5; return f(x); }")
                .unwrap_err();
        assert!(matches!(e.kind, ErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn call_argument_depth_must_match() {
        let e = check_src("int f(int* p) { return *p; }\nint main() { int x = 0; return f(x); }")
            .unwrap_err();
        assert!(matches!(e.kind, ErrorKind::IndirectionMismatch { .. }));
    }

    #[test]
    fn member_access_types_as_the_field() {
        check_src(
            "struct P { int x; float y; };\nint f() { struct P p; p.x = 3; return p.x; }",
        )
        .unwrap();
        let e = check_src("struct P { int x; };\nint f() { struct P p; return p.z; }")
            .unwrap_err();
        assert!(matches!(e.kind, ErrorKind::UnknownField(_, _)));
    }

    #[test]
    fn increment_requires_int_or_char() {
        check_src("void f() { int x = 0; x++; }").unwrap();
        let e = check_src("void f() { float x = 0.5; x++; }").unwrap_err();
        assert!(matches!(e.kind, ErrorKind::CannotApplyOp { .. }));
    }

    #[test]
    fn duplicate_declaration_in_scope_is_rejected() {
        let e = check_src("void f() { int x; int x; }").unwrap_err();
        assert_eq!(e.kind, ErrorKind::DuplicateInScope("x".to_string()));
    }

    #[test]
    fn shadowing_in_inner_scope_is_accepted() {
        check_src("void f() { int x = 1; { float x = 2.0; x = x + 1.0; } x = x + 1; }").unwrap();
    }
}
