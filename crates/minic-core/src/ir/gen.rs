//! IR generator: annotated AST in, translation unit out.
//!
//! Per-function state is a growing instruction list, the most recently
//! produced value (`last`), a monotonically increasing alloca counter and a
//! flat name-to-slot map (IR variable indices are function-unique; there
//! are no nested scopes at this level).
//!
//! Control flow lowers to index-based jumps. Targets are not known at
//! emission time, so jumps are emitted against symbolic labels and a fixup
//! list; labels resolve to instruction indices in a single pass when the
//! function is finished. The observable IR is the classic schema:
//!
//! ```text
//! if:                      while:                 do-while:
//!   if C != 0 goto L1        L0: if C goto L2       L0: body..
//!   jmp L3 (else/exit)       L1: jmp L5 (exit)          if C != 0 goto L0
//! L1: then-body..            L2: body..
//! L3: after                  L4: jmp L0
//!                            L5: after
//! ```

use crate::ast::{self, BinOp, DataType, Decl, UnOp};
use crate::diagnostics::{err, CompileError, ErrorKind};
use crate::ir::*;
use crate::span::Span;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Struct layouts the generator needs: field name to declaration-order
/// index.
#[derive(Debug, Default)]
struct StructLayout {
    fields: IndexMap<String, ()>,
}

/// Signature info for call emission.
#[derive(Debug, Clone, Copy)]
struct FnSig {
    ret: IrType,
}

#[derive(Debug, Clone)]
struct VarInfo {
    idx: VarId,
    dims: Vec<i32>,
    /// Set for struct-typed variables; member access resolves through it.
    type_name: Option<String>,
}

/// Generate IR for a lowered, type-checked translation unit.
pub fn emit(unit: &[ast::Stmt]) -> Result<Unit, CompileError> {
    let mut structs: FxHashMap<String, StructLayout> = FxHashMap::default();
    let mut sigs: FxHashMap<String, FnSig> = FxHashMap::default();
    let mut out = Unit::default();

    for stmt in unit {
        match &stmt.kind {
            ast::StmtKind::StructDecl(s) => {
                let mut layout = StructLayout::default();
                let mut fields = Vec::new();
                for field in &s.fields {
                    layout.fields.insert(field.name().to_string(), ());
                    let dims = match field {
                        Decl::Array(a) => a.dims.clone(),
                        Decl::Var(_) => Vec::new(),
                    };
                    fields.push(TypeDeclField {
                        ty: field.ty(),
                        ptr_depth: field.ptr_depth(),
                        dims,
                    });
                }
                structs.insert(s.name.clone(), layout);
                out.types.push(TypeDecl {
                    name: s.name.clone(),
                    fields,
                });
            }
            ast::StmtKind::FnDecl(f) => {
                sigs.insert(
                    f.name.clone(),
                    FnSig {
                        ret: IrType::new(f.ret_ty, f.ptr_depth),
                    },
                );
            }
            _ => {}
        }
    }

    for stmt in unit {
        if let ast::StmtKind::FnDecl(f) = &stmt.kind {
            if f.body.is_some() {
                let func = FnEmitter::new(&structs, &sigs).emit_fn(f)?;
                debug!(name = %func.name, instrs = func.body.len(), "generated function IR");
                validate(&func);
                out.functions.push(func);
            }
        }
    }
    Ok(out)
}

/// Convert an immediate across the numeric family.
fn convert_imm(imm: Imm, to: DataType) -> Imm {
    let as_i32 = |imm: Imm| match imm {
        Imm::Int(v) => v,
        Imm::Char(c) => c as i32,
        Imm::Bool(b) => b as i32,
        Imm::Float(v) => v as i32,
    };
    match to {
        DataType::Float => Imm::Float(match imm {
            Imm::Float(v) => v,
            other => as_i32(other) as f32,
        }),
        DataType::Int => Imm::Int(as_i32(imm)),
        DataType::Char => Imm::Char((as_i32(imm) as u8) as char),
        DataType::Bool => Imm::Bool(as_i32(imm) != 0),
        _ => imm,
    }
}

type LabelId = usize;

struct LoopCtx {
    continue_label: LabelId,
    break_label: LabelId,
}

struct FnEmitter<'a> {
    stmts: Vec<Instr>,
    last: Option<Value>,
    var_idx: VarId,
    vars: FxHashMap<String, VarInfo>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, LabelId)>,
    loops: Vec<LoopCtx>,
    structs: &'a FxHashMap<String, StructLayout>,
    sigs: &'a FxHashMap<String, FnSig>,
}

impl<'a> FnEmitter<'a> {
    fn new(
        structs: &'a FxHashMap<String, StructLayout>,
        sigs: &'a FxHashMap<String, FnSig>,
    ) -> Self {
        FnEmitter {
            stmts: Vec::new(),
            last: None,
            var_idx: 0,
            vars: FxHashMap::default(),
            labels: Vec::new(),
            fixups: Vec::new(),
            loops: Vec::new(),
            structs,
            sigs,
        }
    }

    // ----- emission plumbing -----

    fn push(&mut self, kind: InstrKind) -> usize {
        let idx = self.stmts.len();
        self.stmts.push(Instr::new(idx, kind));
        idx
    }

    fn new_label(&mut self) -> LabelId {
        self.labels.push(None);
        self.labels.len() - 1
    }

    /// Bind a label to the next instruction to be emitted.
    fn bind(&mut self, label: LabelId) {
        debug_assert!(self.labels[label].is_none(), "label bound twice");
        self.labels[label] = Some(self.stmts.len());
    }

    fn push_jump(&mut self, label: LabelId) {
        let at = self.push(InstrKind::Jump { target: usize::MAX });
        self.fixups.push((at, label));
    }

    fn push_cond(&mut self, cond: Bin, label: LabelId) {
        let at = self.push(InstrKind::Cond {
            cond,
            target: usize::MAX,
        });
        self.fixups.push((at, label));
    }

    fn alloca(&mut self, ty: DataType, ptr_depth: u16, type_name: Option<String>) -> VarId {
        let idx = self.var_idx;
        self.var_idx += 1;
        self.push(InstrKind::Alloca {
            ty,
            type_name,
            ptr_depth,
            idx,
        });
        idx
    }

    /// The value most recently produced by an expression visit.
    fn take_last(&mut self, span: Span) -> Result<Value, CompileError> {
        self.last
            .take()
            .ok_or_else(|| CompileError::new(ErrorKind::MalformedAst("expected a value".into()), span))
    }

    fn var(&self, name: &str, span: Span) -> Result<VarInfo, CompileError> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::new(ErrorKind::UndeclaredName(name.to_string()), span))
    }

    // ----- functions -----

    fn emit_fn(mut self, f: &ast::FnDecl) -> Result<Function, CompileError> {
        let body = f.body.as_ref().expect("prototypes are filtered by emit");

        // Parameter allocas occupy the first variable slots.
        let mut params = Vec::new();
        for (pos, arg) in f.args.iter().enumerate() {
            let idx = self.var_idx;
            self.var_idx += 1;
            let kind = match arg {
                Decl::Var(v) => InstrKind::Alloca {
                    ty: v.ty,
                    type_name: v.type_name.clone(),
                    ptr_depth: v.ptr_depth,
                    idx,
                },
                Decl::Array(a) => InstrKind::AllocaArray {
                    ty: a.ty,
                    dims: a.dims.clone(),
                    idx,
                },
            };
            params.push(Instr::new(pos, kind));
            let (dims, type_name) = match arg {
                Decl::Array(a) => (a.dims.clone(), a.type_name.clone()),
                Decl::Var(v) => (Vec::new(), v.type_name.clone()),
            };
            self.vars.insert(
                arg.name().to_string(),
                VarInfo {
                    idx,
                    dims,
                    type_name,
                },
            );
        }

        for stmt in &body.stmts {
            self.stmt(stmt)?;
        }

        self.finish(f, params)
    }

    fn finish(mut self, f: &ast::FnDecl, params: Vec<Instr>) -> Result<Function, CompileError> {
        // Resolve symbolic labels into instruction indices.
        for (at, label) in std::mem::take(&mut self.fixups) {
            let target = self.labels[label]
                .unwrap_or_else(|| panic!("unresolved jump label {label} in `{}`", f.name));
            match &mut self.stmts[at].kind {
                InstrKind::Jump { target: t } | InstrKind::Cond { target: t, .. } => *t = target,
                _ => unreachable!("fixup on a non-jump instruction"),
            }
        }

        // Every function ends on a return. A void body may fall off the
        // end, and a branch may have been patched to one-past-the-last
        // instruction; both land on an appended void return.
        let len = self.stmts.len();
        let jumps_past_end = self.stmts.iter().any(|i| {
            matches!(
                &i.kind,
                InstrKind::Jump { target } | InstrKind::Cond { target, .. } if *target == len
            )
        });
        let falls_through = !matches!(
            self.stmts.last().map(|i| &i.kind),
            Some(InstrKind::Ret { .. })
        );
        if jumps_past_end || (f.ret_ty == DataType::Void && falls_through) || self.stmts.is_empty()
        {
            self.push(InstrKind::Ret { value: None });
        }

        Ok(Function {
            name: f.name.clone(),
            ret: IrType::new(f.ret_ty, f.ptr_depth),
            params,
            body: self.stmts,
        })
    }

    // ----- statements -----

    fn stmt(&mut self, stmt: &ast::Stmt) -> Result<(), CompileError> {
        let span = stmt.span;
        match &stmt.kind {
            ast::StmtKind::VarDecl(v) => {
                let idx = self.alloca(v.ty, v.ptr_depth, v.type_name.clone());
                self.vars.insert(
                    v.name.clone(),
                    VarInfo {
                        idx,
                        dims: Vec::new(),
                        type_name: v.type_name.clone(),
                    },
                );
                if let Some(init) = &v.init {
                    self.expr(init)?;
                    let value = self.take_last(span)?;
                    self.push(InstrKind::Store {
                        dest: Sym::plain(idx),
                        value: Rvalue::Value(value),
                    });
                }
                Ok(())
            }
            ast::StmtKind::ArrayDecl(a) => {
                let idx = self.var_idx;
                self.var_idx += 1;
                self.push(InstrKind::AllocaArray {
                    ty: a.ty,
                    dims: a.dims.clone(),
                    idx,
                });
                self.vars.insert(
                    a.name.clone(),
                    VarInfo {
                        idx,
                        dims: a.dims.clone(),
                        type_name: a.type_name.clone(),
                    },
                );
                Ok(())
            }
            ast::StmtKind::StructDecl(_) | ast::StmtKind::FnDecl(_) => Ok(()),
            ast::StmtKind::If {
                cond,
                then_body,
                else_body,
            } => self.if_stmt(span, cond, then_body, else_body.as_ref()),
            ast::StmtKind::While { cond, body } => self.while_stmt(span, cond, body),
            ast::StmtKind::DoWhile { body, cond } => self.do_while_stmt(span, body, cond),
            ast::StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.for_stmt(span, init.as_deref(), cond.as_ref(), step.as_ref(), body),
            ast::StmtKind::ForRange { .. } => err(
                ErrorKind::MalformedAst("range-for survived lowering".into()),
                span,
            ),
            ast::StmtKind::Return { value } => {
                let value = match value {
                    Some(e) => {
                        self.expr(e)?;
                        Some(self.take_last(span)?)
                    }
                    None => None,
                };
                self.push(InstrKind::Ret { value });
                Ok(())
            }
            ast::StmtKind::Break => match self.loops.last() {
                Some(ctx) => {
                    let label = ctx.break_label;
                    self.push_jump(label);
                    Ok(())
                }
                None => err(ErrorKind::MalformedAst("break outside of loop".into()), span),
            },
            ast::StmtKind::Continue => match self.loops.last() {
                Some(ctx) => {
                    let label = ctx.continue_label;
                    self.push_jump(label);
                    Ok(())
                }
                None => err(
                    ErrorKind::MalformedAst("continue outside of loop".into()),
                    span,
                ),
            },
            ast::StmtKind::Compound(block) => {
                for stmt in &block.stmts {
                    self.stmt(stmt)?;
                }
                Ok(())
            }
            ast::StmtKind::Expr(e) => {
                self.expr(e)?;
                self.last = None;
                Ok(())
            }
        }
    }

    /// The condition of a branch always compares against zero, so plain
    /// truth tests and comparisons lower uniformly.
    fn truth_test(&mut self, cond: &ast::Expr) -> Result<Bin, CompileError> {
        self.expr(cond)?;
        let value = self.take_last(cond.span)?;
        Ok(Bin {
            op: BinOp::Ne,
            lhs: value,
            rhs: Value::Imm(Imm::Int(0)),
        })
    }

    fn if_stmt(
        &mut self,
        _span: Span,
        cond: &ast::Expr,
        then_body: &ast::Block,
        else_body: Option<&ast::Block>,
    ) -> Result<(), CompileError> {
        let cond_bin = self.truth_test(cond)?;
        let then_label = self.new_label();
        let exit_label = self.new_label();

        self.push_cond(cond_bin, then_label);
        self.push_jump(exit_label);
        self.bind(then_label);
        for stmt in &then_body.stmts {
            self.stmt(stmt)?;
        }

        match else_body {
            None => self.bind(exit_label),
            Some(else_body) => {
                let end_label = self.new_label();
                self.push_jump(end_label);
                self.bind(exit_label);
                for stmt in &else_body.stmts {
                    self.stmt(stmt)?;
                }
                self.bind(end_label);
            }
        }
        Ok(())
    }

    fn while_stmt(
        &mut self,
        _span: Span,
        cond: &ast::Expr,
        body: &ast::Block,
    ) -> Result<(), CompileError> {
        let cond_label = self.new_label();
        let body_label = self.new_label();
        let exit_label = self.new_label();

        self.bind(cond_label);
        let cond_bin = self.truth_test(cond)?;
        self.push_cond(cond_bin, body_label);
        self.push_jump(exit_label);
        self.bind(body_label);

        self.loops.push(LoopCtx {
            continue_label: cond_label,
            break_label: exit_label,
        });
        for stmt in &body.stmts {
            self.stmt(stmt)?;
        }
        self.loops.pop();

        self.push_jump(cond_label);
        self.bind(exit_label);
        Ok(())
    }

    fn do_while_stmt(
        &mut self,
        _span: Span,
        body: &ast::Block,
        cond: &ast::Expr,
    ) -> Result<(), CompileError> {
        let body_label = self.new_label();
        let cond_label = self.new_label();
        let exit_label = self.new_label();

        self.bind(body_label);
        self.loops.push(LoopCtx {
            continue_label: cond_label,
            break_label: exit_label,
        });
        for stmt in &body.stmts {
            self.stmt(stmt)?;
        }
        self.loops.pop();

        self.bind(cond_label);
        let cond_bin = self.truth_test(cond)?;
        self.push_cond(cond_bin, body_label);
        self.bind(exit_label);
        Ok(())
    }

    fn for_stmt(
        &mut self,
        _span: Span,
        init: Option<&ast::Stmt>,
        cond: Option<&ast::Expr>,
        step: Option<&ast::Expr>,
        body: &ast::Block,
    ) -> Result<(), CompileError> {
        if let Some(init) = init {
            self.stmt(init)?;
        }

        let cond_label = self.new_label();
        let body_label = self.new_label();
        let step_label = self.new_label();
        let exit_label = self.new_label();

        self.bind(cond_label);
        if let Some(cond) = cond {
            let cond_bin = self.truth_test(cond)?;
            self.push_cond(cond_bin, body_label);
            self.push_jump(exit_label);
        }
        self.bind(body_label);

        self.loops.push(LoopCtx {
            continue_label: step_label,
            break_label: exit_label,
        });
        for stmt in &body.stmts {
            self.stmt(stmt)?;
        }
        self.loops.pop();

        self.bind(step_label);
        if let Some(step) = step {
            self.expr(step)?;
            self.last = None;
        }
        self.push_jump(cond_label);
        self.bind(exit_label);
        Ok(())
    }

    // ----- expressions -----

    fn expr(&mut self, expr: &ast::Expr) -> Result<(), CompileError> {
        let span = expr.span;
        match &expr.kind {
            ast::ExprKind::Int(v) => {
                self.last = Some(Value::Imm(Imm::Int(*v)));
                Ok(())
            }
            ast::ExprKind::Float(v) => {
                self.last = Some(Value::Imm(Imm::Float(*v)));
                Ok(())
            }
            ast::ExprKind::Char(c) => {
                self.last = Some(Value::Imm(Imm::Char(*c)));
                Ok(())
            }
            ast::ExprKind::Bool(b) => {
                self.last = Some(Value::Imm(Imm::Bool(*b)));
                Ok(())
            }
            ast::ExprKind::Str(s) => {
                self.last = Some(Value::Str(StrLit::new(s.clone())));
                Ok(())
            }
            ast::ExprKind::Symbol(name) => {
                let info = self.var(name, span)?;
                self.last = Some(Value::Sym(Sym::plain(info.idx)));
                Ok(())
            }
            ast::ExprKind::Binary { op, lhs, rhs } => self.binary(span, *op, lhs, rhs),
            ast::ExprKind::Unary {
                op,
                operand,
                ..
            } => self.unary(span, *op, operand),
            ast::ExprKind::ArrayAccess { name, indices } => {
                let sym = self.array_element(span, name, indices)?;
                self.last = Some(Value::Sym(sym));
                Ok(())
            }
            ast::ExprKind::Member { object, field } => {
                let (idx, field_idx) = self.member_slot(span, object, field)?;
                self.last = Some(Value::Member(Member {
                    idx,
                    field_idx,
                    ty: None,
                }));
                Ok(())
            }
            ast::ExprKind::Call { name, args } => self.call(span, name, args),
            // A cast around an immediate converts the value right here;
            // casts around anything else are type-level only, recorded by
            // the IR type pass.
            ast::ExprKind::ImplicitCast { to, expr } => {
                self.expr(expr)?;
                if let Some(Value::Imm(imm)) = &self.last {
                    self.last = Some(Value::Imm(convert_imm(*imm, *to)));
                }
                Ok(())
            }
        }
    }

    fn binary(
        &mut self,
        span: Span,
        op: BinOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
    ) -> Result<(), CompileError> {
        if op == BinOp::Assign {
            self.expr(rhs)?;
            let value = self.take_last(span)?;
            let dest = self.lvalue(lhs)?;
            self.push(InstrKind::Store {
                dest: dest.clone(),
                value: Rvalue::Value(value),
            });
            self.last = Some(Value::Sym(dest));
            return Ok(());
        }
        if let Some(base) = op.compound_base() {
            self.expr(rhs)?;
            let rv = self.take_last(span)?;
            let dest = self.lvalue(lhs)?;
            let bin = Bin {
                op: base,
                lhs: Value::Sym(dest.clone()),
                rhs: rv,
            };
            self.push(InstrKind::Store {
                dest: dest.clone(),
                value: Rvalue::Bin(bin),
            });
            self.last = Some(Value::Sym(dest));
            return Ok(());
        }

        // A pure operator gets an anonymous result slot. The slot type is
        // provisional; the IR type pass narrows it from the operands.
        let dest = self.alloca(DataType::Int, 0, None);
        self.expr(lhs)?;
        let lv = self.take_last(span)?;
        self.expr(rhs)?;
        let rv = self.take_last(span)?;
        self.push(InstrKind::Store {
            dest: Sym::plain(dest),
            value: Rvalue::Bin(Bin {
                op,
                lhs: lv,
                rhs: rv,
            }),
        });
        self.last = Some(Value::Sym(Sym::plain(dest)));
        Ok(())
    }

    fn unary(
        &mut self,
        span: Span,
        op: UnOp,
        operand: &ast::Expr,
    ) -> Result<(), CompileError> {
        match op {
            // Increments materialize as a store of `sym +/- 1` at visit
            // time, before any consuming use that is emitted afterwards.
            UnOp::Inc | UnOp::Dec => {
                let dest = self.lvalue(operand)?;
                let bin_op = if op == UnOp::Inc { BinOp::Add } else { BinOp::Sub };
                self.push(InstrKind::Store {
                    dest: dest.clone(),
                    value: Rvalue::Bin(Bin {
                        op: bin_op,
                        lhs: Value::Sym(dest.clone()),
                        rhs: Value::Imm(Imm::Int(1)),
                    }),
                });
                self.last = Some(Value::Sym(dest));
                Ok(())
            }
            UnOp::Deref => {
                self.expr(operand)?;
                match self.take_last(span)? {
                    Value::Sym(sym) => {
                        self.last = Some(Value::Sym(Sym::deref(sym.idx)));
                        Ok(())
                    }
                    _ => err(
                        ErrorKind::MalformedAst("dereference of a non-symbol".into()),
                        span,
                    ),
                }
            }
            UnOp::AddrOf => {
                self.expr(operand)?;
                match self.take_last(span)? {
                    Value::Sym(sym) => {
                        self.last = Some(Value::Sym(Sym::addr_of(sym.idx)));
                        Ok(())
                    }
                    _ => err(
                        ErrorKind::MalformedAst("address of a non-symbol".into()),
                        span,
                    ),
                }
            }
        }
    }

    /// Resolve an expression in assignment-destination position to a
    /// (possibly dereferencing) symbol.
    fn lvalue(&mut self, expr: &ast::Expr) -> Result<Sym, CompileError> {
        let span = expr.span;
        match &expr.kind {
            ast::ExprKind::Symbol(name) => {
                let info = self.var(name, span)?;
                Ok(Sym::plain(info.idx))
            }
            ast::ExprKind::Unary {
                op: UnOp::Deref,
                operand,
                ..
            } => {
                self.expr(operand)?;
                match self.take_last(span)? {
                    Value::Sym(sym) => Ok(Sym::deref(sym.idx)),
                    _ => err(
                        ErrorKind::MalformedAst("dereference of a non-symbol".into()),
                        span,
                    ),
                }
            }
            ast::ExprKind::ArrayAccess { name, indices } => {
                self.array_element(span, name, indices)
            }
            ast::ExprKind::Member { object, field } => {
                let (idx, field_idx) = self.member_slot(span, object, field)?;
                // Writes go through a computed address: `t = &s + field`.
                let addr = self.bin_temp(
                    BinOp::Add,
                    Value::Sym(Sym::addr_of(idx)),
                    Value::Imm(Imm::Int(field_idx as i32)),
                );
                Ok(Sym::deref(addr))
            }
            _ => err(
                ErrorKind::MalformedAst("expression is not assignable".into()),
                span,
            ),
        }
    }

    /// Emit `dest <- bin(op, lhs, rhs)` into a fresh slot, returning it.
    fn bin_temp(&mut self, op: BinOp, lhs: Value, rhs: Value) -> VarId {
        let dest = self.alloca(DataType::Int, 0, None);
        self.push(InstrKind::Store {
            dest: Sym::plain(dest),
            value: Rvalue::Bin(Bin { op, lhs, rhs }),
        });
        dest
    }

    /// Lower `a[i]` / `a[i][j]` to a flattened row-major offset into a
    /// fresh slot plus a dereferencing symbol over the element address.
    /// Arrays stay in memory form; these syms never enter SSA.
    fn array_element(
        &mut self,
        span: Span,
        name: &str,
        indices: &[ast::Expr],
    ) -> Result<Sym, CompileError> {
        let info = self.var(name, span)?;

        let mut offset: Option<Value> = None;
        for (pos, index) in indices.iter().enumerate() {
            self.expr(index)?;
            let iv = self.take_last(span)?;
            offset = Some(match offset {
                None => iv,
                Some(acc) => {
                    let dim = info.dims.get(pos).copied().unwrap_or(1);
                    let scaled = self.bin_temp(BinOp::Mul, acc, Value::Imm(Imm::Int(dim)));
                    Value::Sym(Sym::plain(self.bin_temp(
                        BinOp::Add,
                        Value::Sym(Sym::plain(scaled)),
                        iv,
                    )))
                }
            });
        }
        let offset = offset.unwrap_or(Value::Imm(Imm::Int(0)));

        let base = if info.dims.is_empty() {
            // Indexing a pointer variable uses its value as the base.
            Value::Sym(Sym::plain(info.idx))
        } else {
            Value::Sym(Sym::addr_of(info.idx))
        };
        let addr = self.bin_temp(BinOp::Add, base, offset);
        Ok(Sym::deref(addr))
    }

    fn member_slot(
        &mut self,
        span: Span,
        object: &str,
        field: &str,
    ) -> Result<(VarId, u64), CompileError> {
        let info = self.var(object, span)?;
        let Some(type_name) = &info.type_name else {
            return err(
                ErrorKind::MalformedAst(format!("`{object}` is not a structure")),
                span,
            );
        };
        let layout = self
            .structs
            .get(type_name)
            .ok_or_else(|| CompileError::new(ErrorKind::UndeclaredName(type_name.clone()), span))?;
        let field_idx = layout.fields.get_index_of(field).ok_or_else(|| {
            CompileError::new(
                ErrorKind::UnknownField(type_name.clone(), field.to_string()),
                span,
            )
        })?;
        Ok((info.idx, field_idx as u64))
    }

    fn call(
        &mut self,
        span: Span,
        name: &str,
        args: &[ast::Expr],
    ) -> Result<(), CompileError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            self.expr(arg)?;
            values.push(self.take_last(span)?);
        }
        let sig = self
            .sigs
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::new(ErrorKind::UnknownFunction(name.to_string()), span))?;

        let dest = if sig.ret.ty != DataType::Void || sig.ret.ptr_depth > 0 {
            Some(Sym::plain(self.alloca(sig.ret.ty, sig.ret.ptr_depth, None)))
        } else {
            None
        };
        self.push(InstrKind::FnCall {
            name: name.to_string(),
            args: values,
            dest: dest.clone(),
        });
        self.last = dest.map(Value::Sym);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn ir(src: &str) -> Unit {
        let mut unit = parse(tokenize(src).unwrap()).unwrap();
        crate::sema::functions::analyze(&unit).unwrap();
        crate::sema::types::check(&mut unit).unwrap();
        crate::lower::desugar(&mut unit);
        emit(&unit).unwrap()
    }

    fn body(src: &str) -> Vec<InstrKind> {
        ir(src).functions[0]
            .body
            .iter()
            .map(|i| i.kind.clone())
            .collect()
    }

    #[test]
    fn straight_line_function_shape() {
        // int f() { int a = 1; return a + 2; }
        let b = body("int f() { int a = 1; return a + 2; }");
        assert_eq!(b.len(), 5);
        assert!(matches!(b[0], InstrKind::Alloca { idx: 0, ty: DataType::Int, .. }));
        assert!(matches!(
            &b[1],
            InstrKind::Store { dest, value: Rvalue::Value(Value::Imm(Imm::Int(1))) }
                if dest.idx == 0
        ));
        assert!(matches!(b[2], InstrKind::Alloca { idx: 1, .. }));
        match &b[3] {
            InstrKind::Store {
                dest,
                value: Rvalue::Bin(bin),
            } => {
                assert_eq!(dest.idx, 1);
                assert_eq!(bin.op, BinOp::Add);
                assert!(matches!(&bin.lhs, Value::Sym(s) if s.idx == 0));
                assert!(matches!(bin.rhs, Value::Imm(Imm::Int(2))));
            }
            other => panic!("expected a bin store, got {other:?}"),
        }
        assert!(matches!(
            &b[4],
            InstrKind::Ret { value: Some(Value::Sym(s)) } if s.idx == 1
        ));
    }

    #[test]
    fn if_lowering_targets_then_and_fallthrough() {
        // int abs(int x) { if (x < 0) return -x; return x; }
        let b = body("int abs(int x) { if (x < 0) return -x; return x; }");
        // 0: alloca t1, 1: t1 = x < 0, 2: cond -> 4, 3: jmp -> 7,
        // 4: alloca t2, 5: t2 = 0 - x, 6: ret t2, 7: ret x
        let k = 2;
        match &b[k] {
            InstrKind::Cond { target, .. } => assert_eq!(*target, k + 2),
            other => panic!("expected cond at {k}, got {other:?}"),
        }
        match &b[k + 1] {
            InstrKind::Jump { target } => assert_eq!(*target, k + 5),
            other => panic!("expected jump at {}, got {other:?}", k + 1),
        }
        assert!(matches!(b[k + 4], InstrKind::Ret { .. }));
        assert!(matches!(b[k + 5], InstrKind::Ret { .. }));
    }

    #[test]
    fn while_lowering_has_back_edge_and_exit() {
        let b = body(
            "int sum(int n) { int s = 0; int i = 0; while (i < n) { s = s + i; i = i + 1; } return s; }",
        );
        // Find the cond; its target is the body start, the following jump
        // exits, and the loop closes with a jump back to the condition.
        let cond_at = b
            .iter()
            .position(|k| matches!(k, InstrKind::Cond { .. }))
            .unwrap();
        let InstrKind::Cond { target, .. } = &b[cond_at] else {
            unreachable!()
        };
        assert_eq!(*target, cond_at + 2);
        let InstrKind::Jump { target: exit } = &b[cond_at + 1] else {
            panic!("expected exit jump after cond")
        };
        let back = b
            .iter()
            .rposition(|k| matches!(k, InstrKind::Jump { .. }))
            .unwrap();
        let InstrKind::Jump { target: back_target } = &b[back] else {
            unreachable!()
        };
        // Back edge returns to the first instruction of the condition.
        assert!(*back_target < cond_at);
        assert_eq!(*exit, back + 1);
        assert!(matches!(b[*exit], InstrKind::Ret { .. }));
    }

    #[test]
    fn do_while_jumps_back_to_body_entry() {
        let b = body("int f() { int i = 0; do { i = i + 1; } while (i < 3); return i; }");
        let cond_at = b
            .iter()
            .position(|k| matches!(k, InstrKind::Cond { .. }))
            .unwrap();
        let InstrKind::Cond { target, .. } = &b[cond_at] else {
            unreachable!()
        };
        // The body starts right after the two init instructions.
        assert_eq!(*target, 2);
    }

    #[test]
    fn for_step_runs_before_back_edge() {
        let b = body("int f() { int s = 0; for (int i = 0; i < 3; i++) { s = s + i; } return s; }");
        let back = b
            .iter()
            .rposition(|k| matches!(k, InstrKind::Jump { .. }))
            .unwrap();
        // The instruction before the back edge is the step's store.
        assert!(matches!(&b[back - 1], InstrKind::Store { value: Rvalue::Bin(bin), .. }
            if bin.op == BinOp::Add));
    }

    #[test]
    fn break_jumps_to_loop_exit() {
        let b = body("int f() { while (1) { break; } return 0; }");
        let break_jump = b
            .iter()
            .enumerate()
            .filter_map(|(i, k)| match k {
                InstrKind::Jump { target } => Some((i, *target)),
                _ => None,
            })
            .find(|(i, _)| {
                // the break is the jump that is neither the exit jump after
                // the cond nor the back edge
                *i != 2 && !matches!(b[*i], InstrKind::Jump { target } if target < *i)
            });
        let (_, target) = break_jump.expect("break jump present");
        assert!(matches!(b[target], InstrKind::Ret { .. }));
    }

    #[test]
    fn void_function_gets_terminating_return() {
        let b = body("void f() { int x = 0; x = x + 1; }");
        assert!(matches!(b.last(), Some(InstrKind::Ret { value: None })));
    }

    #[test]
    fn both_branches_returning_still_land_on_a_terminator() {
        let u = ir("int f(int x) { if (x) { return 1; } else { return 2; } }");
        validate(&u.functions[0]);
        let b = &u.functions[0].body;
        assert!(matches!(b.last().map(|i| &i.kind), Some(InstrKind::Ret { .. })));
    }

    #[test]
    fn call_gets_result_slot() {
        let b = body("int g() { return 1; }\nint f() { return g() + 2; }");
        // f is the second function; recompute.
        let u = ir("int g() { return 1; }\nint f() { return g() + 2; }");
        let f = &u.functions[1];
        let call = f
            .body
            .iter()
            .find(|i| matches!(i.kind, InstrKind::FnCall { .. }))
            .unwrap();
        let InstrKind::FnCall { dest, .. } = &call.kind else {
            unreachable!()
        };
        assert!(dest.is_some());
        let _ = b;
    }

    #[test]
    fn array_store_goes_through_deref_slot() {
        let b = body("void f() { int a[4]; a[2] = 7; }");
        let store = b
            .iter()
            .rev()
            .find_map(|k| match k {
                InstrKind::Store { dest, value } if dest.deref => Some((dest.clone(), value.clone())),
                _ => None,
            })
            .expect("a store through a deref symbol");
        assert!(matches!(store.1, Rvalue::Value(Value::Imm(Imm::Int(7)))));
    }

    #[test]
    fn unary_increment_becomes_plus_one_store() {
        let b = body("void f() { int x = 0; x++; }");
        let inc = b
            .iter()
            .rev()
            .find_map(|k| match k {
                InstrKind::Store {
                    value: Rvalue::Bin(bin),
                    ..
                } => Some(bin.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(inc.op, BinOp::Add);
        assert!(matches!(inc.rhs, Value::Imm(Imm::Int(1))));
    }

    #[test]
    fn jump_targets_are_always_resolved() {
        let u = ir(
            "int f(int n) { int s = 0; for (int i = 0; i < n; i++) { if (i % 2) { continue; } s += i; } return s; }",
        );
        validate(&u.functions[0]);
        for instr in &u.functions[0].body {
            if let InstrKind::Jump { target } | InstrKind::Cond { target, .. } = &instr.kind {
                assert!(*target < u.functions[0].body.len());
            }
        }
    }

    #[test]
    fn member_write_goes_through_field_address() {
        let u = ir("struct P { int x; int y; };\nvoid f() { struct P p; p.y = 3; }");
        assert_eq!(u.types.len(), 1);
        assert_eq!(u.types[0].fields.len(), 2);
        let b = &u.functions[0].body;
        // The address temp adds the field index to &p.
        let addr = b
            .iter()
            .find_map(|i| match &i.kind {
                InstrKind::Store {
                    value: Rvalue::Bin(bin),
                    ..
                } if matches!(&bin.lhs, Value::Sym(s) if s.addr_of) => Some(bin.clone()),
                _ => None,
            })
            .expect("field address computation");
        assert!(matches!(addr.rhs, Value::Imm(Imm::Int(1))));
    }
}
