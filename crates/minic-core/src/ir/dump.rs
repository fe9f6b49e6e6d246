//! Textual IR listing.
//!
//! One instruction per line, prefixed with its index:
//!
//! ```text
//! fun int sum(int t0):
//!      0: int t1
//!      1: t1 = 0
//!      2: int t2
//!      3: t2 = t1 < t0
//!      4: if t2 != 0 goto L6
//!      5: jmp L9
//!      ...
//! ```
//!
//! Variables print as `t<idx>` with an `.n` SSA suffix once renaming has
//! run, or as `#reg<n>` when a physical register has been claimed.

use crate::ir::*;
use std::fmt::Write;

pub fn dump_unit(unit: &Unit) -> String {
    let mut out = String::new();
    for ty in &unit.types {
        let fields: Vec<String> = ty
            .fields
            .iter()
            .map(|f| {
                let dims: String = f.dims.iter().map(|d| format!("[{d}]")).collect();
                format!("{}{}{}", f.ty, "*".repeat(f.ptr_depth as usize), dims)
            })
            .collect();
        let _ = writeln!(out, "type {} = {{ {} }}", ty.name, fields.join(", "));
    }
    for func in &unit.functions {
        dump_function(&mut out, func);
    }
    out
}

pub fn dump_function(out: &mut String, func: &Function) {
    let args: Vec<String> = func
        .params
        .iter()
        .map(|p| match &p.kind {
            InstrKind::Alloca {
                ty,
                ptr_depth,
                idx,
                ..
            } => format!("{}{} t{}", ty, "*".repeat(*ptr_depth as usize), idx),
            InstrKind::AllocaArray { ty, dims, idx } => {
                let dims: String = dims.iter().map(|d| format!("[{d}]")).collect();
                format!("{ty} t{idx}{dims}")
            }
            other => unreachable!("parameter is always an alloca, got {other:?}"),
        })
        .collect();
    let ret = format!("{}{}", func.ret.ty, "*".repeat(func.ret.ptr_depth as usize));
    let _ = writeln!(out, "fun {ret} {}({}):", func.name, args.join(", "));
    for instr in &func.body {
        let _ = writeln!(out, "{:>6}: {}", instr.idx, instr_str(instr));
    }
}

fn sym_str(sym: &Sym) -> String {
    let name = format!("t{}", sym.idx);
    let versioned = match sym.ssa_idx {
        Some(v) => format!("{name}.{v}"),
        None => name,
    };
    if sym.deref {
        format!("*{versioned}")
    } else if sym.addr_of {
        format!("&{versioned}")
    } else {
        versioned
    }
}

fn imm_str(imm: &Imm) -> String {
    match imm {
        Imm::Bool(b) => format!("${}", *b as u8),
        Imm::Char(c) => format!("${}", *c as u32),
        Imm::Float(v) => format!("${v}"),
        Imm::Int(v) => format!("${v}"),
    }
}

fn value_str(value: &Value) -> String {
    match value {
        Value::Imm(imm) => imm_str(imm),
        Value::Sym(sym) => sym_str(sym),
        Value::Member(m) => format!("t{}.{}", m.idx, m.field_idx),
        Value::Str(s) => format!("\"{}\"", s.data),
    }
}

fn bin_str(bin: &Bin) -> String {
    format!(
        "{} {} {}",
        value_str(&bin.lhs),
        bin.op.symbol(),
        value_str(&bin.rhs)
    )
}

fn instr_str(instr: &Instr) -> String {
    if let Some(reg) = instr.claimed_reg {
        return format!("#reg{reg}: {}", instr_kind_str(&instr.kind));
    }
    instr_kind_str(&instr.kind)
}

fn instr_kind_str(kind: &InstrKind) -> String {
    match kind {
        InstrKind::Alloca {
            ty,
            ptr_depth,
            idx,
            ..
        } => format!("{}{} t{}", ty, "*".repeat(*ptr_depth as usize), idx),
        InstrKind::AllocaArray { ty, dims, idx } => {
            let dims: String = dims.iter().map(|d| format!("[{d}]")).collect();
            format!("{ty} t{idx}{dims}")
        }
        InstrKind::Store { dest, value } => {
            let rhs = match value {
                Rvalue::Value(v) => value_str(v),
                Rvalue::Bin(bin) => bin_str(bin),
            };
            format!("{} = {}", sym_str(dest), rhs)
        }
        InstrKind::Jump { target } => format!("jmp L{target}"),
        InstrKind::Cond { cond, target } => {
            format!("if {} goto L{target}", bin_str(cond))
        }
        InstrKind::Ret { value: None } => "ret".to_string(),
        InstrKind::Ret { value: Some(v) } => format!("ret {}", value_str(v)),
        InstrKind::FnCall { name, args, dest } => {
            let args: Vec<String> = args.iter().map(value_str).collect();
            let call = format!("call {name}({})", args.join(", "));
            match dest {
                Some(sym) => format!("{} = {call}", sym_str(sym)),
                None => call,
            }
        }
        InstrKind::Phi(phi) => {
            let ops: Vec<String> = phi
                .ops
                .iter()
                .map(|op| match op.ssa_idx {
                    Some(v) => format!("B{}: {}", op.pred_block, v),
                    None => format!("B{}: ?", op.pred_block),
                })
                .collect();
            let target = match phi.ssa_idx {
                Some(v) => format!("t{}.{v}", phi.var),
                None => format!("t{}", phi.var),
            };
            format!("{target} = phi({})", ops.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn dumped(src: &str) -> String {
        let mut ast = parse(tokenize(src).unwrap()).unwrap();
        crate::sema::functions::analyze(&ast).unwrap();
        crate::sema::types::check(&mut ast).unwrap();
        crate::lower::desugar(&mut ast);
        dump_unit(&crate::ir::gen::emit(&ast).unwrap())
    }

    #[test]
    fn straight_line_listing() {
        let out = dumped("int f() { int a = 1; return a + 2; }");
        let expected = "\
fun int f():
     0: int t0
     1: t0 = $1
     2: int t1
     3: t1 = t0 + $2
     4: ret t1
";
        assert_eq!(out, expected);
    }

    #[test]
    fn branches_print_goto_labels() {
        let out = dumped("int abs(int x) { if (x < 0) { return 0 - x; } return x; }");
        assert!(out.contains("if t1 != $0 goto L4"));
        assert!(out.contains("jmp L7"));
    }

    #[test]
    fn struct_types_are_listed() {
        let out = dumped("struct P { int x; float y; };\nvoid f() { struct P p; p.x = 1; }");
        assert!(out.starts_with("type P = { int, float }\n"));
    }
}
