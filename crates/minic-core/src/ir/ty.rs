//! IR type pass: attaches an [`IrType`] to every value operand.
//!
//! Variable types come from the allocas (parameters included). Anonymous
//! result slots are emitted with a provisional `int` type; a forward pass
//! over the stores narrows them from the stored value, which is always
//! defined before use in the linear IR. A second pass then tags every sym
//! and member operand with its effective type (dereference drops one level
//! of indirection, address-of adds one).

use crate::ast::DataType;
use crate::ir::*;
use rustc_hash::FxHashMap;

/// Annotate a whole unit in place.
pub fn annotate(unit: &mut Unit) {
    let types = unit.types.clone();
    for func in &mut unit.functions {
        annotate_function(func, &types);
    }
}

fn annotate_function(func: &mut Function, types: &[TypeDecl]) {
    let mut vars: FxHashMap<VarId, IrType> = FxHashMap::default();
    // Struct-typed variables keep their type name for member lookups.
    let mut struct_names: FxHashMap<VarId, String> = FxHashMap::default();

    let mut record = |instr: &Instr,
                      vars: &mut FxHashMap<VarId, IrType>,
                      struct_names: &mut FxHashMap<VarId, String>| {
        match &instr.kind {
            InstrKind::Alloca {
                ty,
                type_name,
                ptr_depth,
                idx,
            } => {
                vars.insert(*idx, IrType::new(*ty, *ptr_depth));
                if let Some(name) = type_name {
                    struct_names.insert(*idx, name.clone());
                }
            }
            InstrKind::AllocaArray { ty, idx, .. } => {
                vars.insert(*idx, IrType::scalar(*ty));
            }
            _ => {}
        }
    };
    for instr in &func.params {
        record(instr, &mut vars, &mut struct_names);
    }
    for instr in &func.body {
        record(instr, &mut vars, &mut struct_names);
    }

    // Narrow provisional slot types from the first store into them.
    let mut narrowed: FxHashMap<VarId, IrType> = FxHashMap::default();
    for instr in &func.body {
        if let InstrKind::Store { dest, value } = &instr.kind {
            if !dest.is_scalar() {
                continue;
            }
            let current = vars.get(&dest.idx).copied();
            if current != Some(IrType::scalar(DataType::Int)) {
                continue;
            }
            if let Some(inferred) = rvalue_type(value, &vars, &struct_names, types) {
                if inferred != IrType::scalar(DataType::Int) {
                    vars.insert(dest.idx, inferred);
                    narrowed.insert(dest.idx, inferred);
                }
            }
        }
    }
    for instr in &mut func.body {
        if let InstrKind::Alloca { ty, ptr_depth, idx, .. } = &mut instr.kind {
            if let Some(t) = narrowed.get(idx) {
                *ty = t.ty;
                *ptr_depth = t.ptr_depth;
            }
        }
    }

    // Tag every operand.
    for instr in &mut func.body {
        match &mut instr.kind {
            InstrKind::Store { dest, value } => {
                tag_sym(dest, &vars);
                match value {
                    Rvalue::Value(v) => tag_value(v, &vars, &struct_names, types),
                    Rvalue::Bin(bin) => tag_bin(bin, &vars, &struct_names, types),
                }
            }
            InstrKind::Cond { cond, .. } => tag_bin(cond, &vars, &struct_names, types),
            InstrKind::Ret { value: Some(v) } => tag_value(v, &vars, &struct_names, types),
            InstrKind::FnCall { args, dest, .. } => {
                for arg in args {
                    tag_value(arg, &vars, &struct_names, types);
                }
                if let Some(dest) = dest {
                    tag_sym(dest, &vars);
                }
            }
            _ => {}
        }
    }
}

/// The effective type of a sym as used: base variable type adjusted by the
/// deref/address flags.
fn sym_type(sym: &Sym, vars: &FxHashMap<VarId, IrType>) -> Option<IrType> {
    let base = vars.get(&sym.idx)?;
    let depth = if sym.deref {
        base.ptr_depth.saturating_sub(1)
    } else if sym.addr_of {
        base.ptr_depth + 1
    } else {
        base.ptr_depth
    };
    Some(IrType::new(base.ty, depth))
}

fn member_type(
    member: &Member,
    struct_names: &FxHashMap<VarId, String>,
    types: &[TypeDecl],
) -> Option<IrType> {
    let name = struct_names.get(&member.idx)?;
    let decl = types.iter().find(|t| &t.name == name)?;
    let field = decl.fields.get(member.field_idx as usize)?;
    Some(IrType::new(field.ty, field.ptr_depth))
}

fn value_type(
    value: &Value,
    vars: &FxHashMap<VarId, IrType>,
    struct_names: &FxHashMap<VarId, String>,
    types: &[TypeDecl],
) -> Option<IrType> {
    match value {
        Value::Imm(imm) => Some(IrType::scalar(imm.data_type())),
        Value::Sym(sym) => sym_type(sym, vars),
        Value::Member(m) => member_type(m, struct_names, types),
        Value::Str(_) => Some(IrType::new(DataType::Char, 1)),
    }
}

fn rvalue_type(
    value: &Rvalue,
    vars: &FxHashMap<VarId, IrType>,
    struct_names: &FxHashMap<VarId, String>,
    types: &[TypeDecl],
) -> Option<IrType> {
    match value {
        Rvalue::Value(v) => value_type(v, vars, struct_names, types),
        Rvalue::Bin(bin) => {
            if bin.op.is_comparison() {
                return Some(IrType::scalar(DataType::Int));
            }
            // Mixed operands surface where an implicit cast wrapped one
            // side; the wider type wins, matching the checker's rule.
            let l = value_type(&bin.lhs, vars, struct_names, types);
            let r = value_type(&bin.rhs, vars, struct_names, types);
            match (l, r) {
                (Some(a), Some(b)) => {
                    if b.ptr_depth == 0 && a.ptr_depth == 0 && b.ty == DataType::Float {
                        Some(b)
                    } else {
                        Some(a)
                    }
                }
                (a, b) => a.or(b),
            }
        }
    }
}

fn tag_sym(sym: &mut Sym, vars: &FxHashMap<VarId, IrType>) {
    sym.ty = sym_type(sym, vars);
}

fn tag_value(
    value: &mut Value,
    vars: &FxHashMap<VarId, IrType>,
    struct_names: &FxHashMap<VarId, String>,
    types: &[TypeDecl],
) {
    match value {
        Value::Sym(sym) => tag_sym(sym, vars),
        Value::Member(m) => m.ty = member_type(m, struct_names, types),
        Value::Imm(_) | Value::Str(_) => {}
    }
}

fn tag_bin(
    bin: &mut Bin,
    vars: &FxHashMap<VarId, IrType>,
    struct_names: &FxHashMap<VarId, String>,
    types: &[TypeDecl],
) {
    tag_value(&mut bin.lhs, vars, struct_names, types);
    tag_value(&mut bin.rhs, vars, struct_names, types);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn typed_ir(src: &str) -> Unit {
        let mut ast = parse(tokenize(src).unwrap()).unwrap();
        crate::sema::functions::analyze(&ast).unwrap();
        crate::sema::types::check(&mut ast).unwrap();
        crate::lower::desugar(&mut ast);
        let mut unit = crate::ir::gen::emit(&ast).unwrap();
        annotate(&mut unit);
        unit
    }

    #[test]
    fn float_temp_slot_is_narrowed() {
        let u = typed_ir("float f(float x) { float y = x + 1.5; return y; }");
        let f = &u.functions[0];
        // The anonymous slot holding `x + 1.5` must be float, not the
        // provisional int.
        let temp = f
            .body
            .iter()
            .find_map(|i| match &i.kind {
                InstrKind::Alloca { ty, idx, .. } if *idx == 1 => Some(*ty),
                _ => None,
            })
            .unwrap();
        assert_eq!(temp, DataType::Float);
    }

    #[test]
    fn every_sym_is_tagged_after_the_pass() {
        let u = typed_ir("int f(int a) { int b = a + 2; return b; }");
        for instr in &u.functions[0].body {
            match &instr.kind {
                InstrKind::Store { dest, value } => {
                    assert!(dest.ty.is_some());
                    if let Rvalue::Bin(bin) = value {
                        if let Value::Sym(s) = &bin.lhs {
                            assert!(s.ty.is_some());
                        }
                    }
                }
                InstrKind::Ret {
                    value: Some(Value::Sym(s)),
                } => assert!(s.ty.is_some()),
                _ => {}
            }
        }
    }

    #[test]
    fn deref_drops_one_level_of_indirection() {
        let u = typed_ir("int f(int* p) { return *p; }");
        let ret_sym = u.functions[0]
            .body
            .iter()
            .find_map(|i| match &i.kind {
                InstrKind::Ret {
                    value: Some(Value::Sym(s)),
                } => Some(s.clone()),
                _ => None,
            })
            .unwrap();
        assert!(ret_sym.deref);
        assert_eq!(ret_sym.ty, Some(IrType::scalar(DataType::Int)));
    }

    #[test]
    fn member_operand_gets_field_type() {
        let u = typed_ir(
            "struct P { int x; float y; };\nfloat f() { struct P p; float v = p.y; return v; }",
        );
        let member = u.functions[0]
            .body
            .iter()
            .find_map(|i| match &i.kind {
                InstrKind::Store {
                    value: Rvalue::Value(Value::Member(m)),
                    ..
                } => Some(m.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(member.ty, Some(IrType::scalar(DataType::Float)));
    }
}
