//! Arithmetic peephole pass.
//!
//! Folds immediate-on-immediate binary expressions in store bodies and
//! applies the cheap algebraic identities (`x + 0`, `x * 1`, `x * 0`,
//! `x - x`). Works on value operands only, so instruction indices and jump
//! targets are untouched.

use crate::ast::BinOp;
use crate::ir::{Bin, Function, Imm, InstrKind, Rvalue, Unit, Value};
use tracing::debug;

/// Run the pass over a whole unit. Returns whether anything changed.
pub fn run(unit: &mut Unit) -> bool {
    let mut changed = false;
    for func in &mut unit.functions {
        changed |= run_function(func);
    }
    changed
}

fn run_function(func: &mut Function) -> bool {
    let mut changed = false;
    for instr in &mut func.body {
        if let InstrKind::Store { value, .. } = &mut instr.kind {
            if let Rvalue::Bin(bin) = value {
                if let Some(simpler) = simplify(bin) {
                    debug!(at = instr.idx, "simplified bin");
                    *value = Rvalue::Value(simpler);
                    changed = true;
                }
            }
        }
    }
    changed
}

fn simplify(bin: &Bin) -> Option<Value> {
    if let (Value::Imm(l), Value::Imm(r)) = (&bin.lhs, &bin.rhs) {
        return fold(bin.op, *l, *r).map(Value::Imm);
    }
    algebraic(bin)
}

/// `x + 0`, `0 + x`, `x - 0`, `x * 1`, `1 * x`, `x * 0`, `0 * x`, `x - x`.
/// Only plain (non-deref) symbols qualify: a dereferencing load is not a
/// pure value.
fn algebraic(bin: &Bin) -> Option<Value> {
    let plain = |v: &Value| match v {
        Value::Sym(s) if s.is_scalar() => Some(s.clone()),
        _ => None,
    };
    let int_imm = |v: &Value, expected: i32| {
        matches!(v, Value::Imm(Imm::Int(n)) if *n == expected)
    };

    match bin.op {
        BinOp::Add => {
            if let Some(s) = plain(&bin.lhs) {
                if int_imm(&bin.rhs, 0) {
                    return Some(Value::Sym(s));
                }
            }
            if let Some(s) = plain(&bin.rhs) {
                if int_imm(&bin.lhs, 0) {
                    return Some(Value::Sym(s));
                }
            }
            None
        }
        BinOp::Sub => {
            if let Some(s) = plain(&bin.lhs) {
                if int_imm(&bin.rhs, 0) {
                    return Some(Value::Sym(s));
                }
                if let Some(r) = plain(&bin.rhs) {
                    // x - x with matching SSA versions is zero.
                    if s.idx == r.idx && s.ssa_idx == r.ssa_idx {
                        return Some(Value::Imm(Imm::Int(0)));
                    }
                }
            }
            None
        }
        BinOp::Mul => {
            if int_imm(&bin.lhs, 0) || int_imm(&bin.rhs, 0) {
                // Multiplying a pure symbol by zero is zero.
                if plain(&bin.lhs).is_some() || plain(&bin.rhs).is_some() {
                    return Some(Value::Imm(Imm::Int(0)));
                }
            }
            if let Some(s) = plain(&bin.lhs) {
                if int_imm(&bin.rhs, 1) {
                    return Some(Value::Sym(s));
                }
            }
            if let Some(s) = plain(&bin.rhs) {
                if int_imm(&bin.lhs, 1) {
                    return Some(Value::Sym(s));
                }
            }
            None
        }
        _ => None,
    }
}

/// Constant-fold two immediates. Integral arithmetic wraps; division by
/// zero is left for the target to trap on.
fn fold(op: BinOp, l: Imm, r: Imm) -> Option<Imm> {
    use BinOp::*;
    // Comparisons produce int 0/1 across the numeric family.
    if op.is_comparison() {
        let res = match (imm_f64(l), imm_f64(r)) {
            (Some(a), Some(b)) => match op {
                Eq => a == b,
                Ne => a != b,
                Lt => a < b,
                Gt => a > b,
                Le => a <= b,
                Ge => a >= b,
                _ => unreachable!(),
            },
            _ => return None,
        };
        return Some(Imm::Int(res as i32));
    }

    match (l, r) {
        (Imm::Int(a), Imm::Int(b)) => {
            let v = match op {
                Add => a.wrapping_add(b),
                Sub => a.wrapping_sub(b),
                Mul => a.wrapping_mul(b),
                Div => {
                    if b == 0 {
                        return None;
                    }
                    a.wrapping_div(b)
                }
                Mod => {
                    if b == 0 {
                        return None;
                    }
                    a.wrapping_rem(b)
                }
                BitAnd => a & b,
                BitOr => a | b,
                BitXor => a ^ b,
                Shl => a.wrapping_shl(b as u32),
                Shr => a.wrapping_shr(b as u32),
                And => ((a != 0) && (b != 0)) as i32,
                Or => ((a != 0) || (b != 0)) as i32,
                _ => return None,
            };
            Some(Imm::Int(v))
        }
        (Imm::Float(a), Imm::Float(b)) => {
            let v = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => return None,
            };
            Some(Imm::Float(v))
        }
        (Imm::Bool(a), Imm::Bool(b)) => {
            let v = match op {
                And | BitAnd => a && b,
                Or | BitOr => a || b,
                BitXor => a != b,
                _ => return None,
            };
            Some(Imm::Bool(v))
        }
        _ => None,
    }
}

fn imm_f64(imm: Imm) -> Option<f64> {
    match imm {
        Imm::Int(v) => Some(v as f64),
        Imm::Char(c) => Some(c as u32 as f64),
        Imm::Float(v) => Some(v as f64),
        Imm::Bool(b) => Some(b as u8 as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DataType as Dt;
    use crate::ir::{Instr, IrType, Sym};

    fn store(idx: usize, dest: u64, bin: Bin) -> Instr {
        Instr::new(
            idx,
            InstrKind::Store {
                dest: Sym::plain(dest),
                value: Rvalue::Bin(bin),
            },
        )
    }

    fn func_with(body: Vec<Instr>) -> Function {
        Function {
            name: "f".into(),
            ret: IrType::scalar(Dt::Void),
            params: vec![],
            body,
        }
    }

    fn stored_value(func: &Function, at: usize) -> Rvalue {
        match &func.body[at].kind {
            InstrKind::Store { value, .. } => value.clone(),
            other => panic!("expected store, got {other:?}"),
        }
    }

    #[test]
    fn folds_integer_constants() {
        let mut f = func_with(vec![store(
            0,
            0,
            Bin {
                op: BinOp::Add,
                lhs: Value::Imm(Imm::Int(2)),
                rhs: Value::Imm(Imm::Int(3)),
            },
        )]);
        assert!(run_function(&mut f));
        assert_eq!(
            stored_value(&f, 0),
            Rvalue::Value(Value::Imm(Imm::Int(5)))
        );
    }

    #[test]
    fn folds_comparisons_to_int() {
        let mut f = func_with(vec![store(
            0,
            0,
            Bin {
                op: BinOp::Lt,
                lhs: Value::Imm(Imm::Int(1)),
                rhs: Value::Imm(Imm::Int(2)),
            },
        )]);
        run_function(&mut f);
        assert_eq!(
            stored_value(&f, 0),
            Rvalue::Value(Value::Imm(Imm::Int(1)))
        );
    }

    #[test]
    fn division_by_zero_is_left_alone() {
        let mut f = func_with(vec![store(
            0,
            0,
            Bin {
                op: BinOp::Div,
                lhs: Value::Imm(Imm::Int(7)),
                rhs: Value::Imm(Imm::Int(0)),
            },
        )]);
        assert!(!run_function(&mut f));
    }

    #[test]
    fn plus_zero_becomes_the_symbol() {
        let mut f = func_with(vec![store(
            0,
            1,
            Bin {
                op: BinOp::Add,
                lhs: Value::Sym(Sym::plain(0)),
                rhs: Value::Imm(Imm::Int(0)),
            },
        )]);
        run_function(&mut f);
        assert_eq!(
            stored_value(&f, 0),
            Rvalue::Value(Value::Sym(Sym::plain(0)))
        );
    }

    #[test]
    fn times_zero_becomes_zero() {
        let mut f = func_with(vec![store(
            0,
            1,
            Bin {
                op: BinOp::Mul,
                lhs: Value::Sym(Sym::plain(0)),
                rhs: Value::Imm(Imm::Int(0)),
            },
        )]);
        run_function(&mut f);
        assert_eq!(
            stored_value(&f, 0),
            Rvalue::Value(Value::Imm(Imm::Int(0)))
        );
    }

    #[test]
    fn x_minus_x_becomes_zero_only_for_the_same_version() {
        let same = Bin {
            op: BinOp::Sub,
            lhs: Value::Sym(Sym::plain(0)),
            rhs: Value::Sym(Sym::plain(0)),
        };
        let mut f = func_with(vec![store(0, 1, same)]);
        run_function(&mut f);
        assert_eq!(
            stored_value(&f, 0),
            Rvalue::Value(Value::Imm(Imm::Int(0)))
        );

        let mut differing = Sym::plain(0);
        differing.ssa_idx = Some(2);
        let mut other = Sym::plain(0);
        other.ssa_idx = Some(3);
        let mut f = func_with(vec![store(
            0,
            1,
            Bin {
                op: BinOp::Sub,
                lhs: Value::Sym(differing),
                rhs: Value::Sym(other),
            },
        )]);
        assert!(!run_function(&mut f));
    }

    #[test]
    fn deref_loads_are_not_pure_values() {
        let mut f = func_with(vec![store(
            0,
            1,
            Bin {
                op: BinOp::Add,
                lhs: Value::Sym(Sym::deref(0)),
                rhs: Value::Imm(Imm::Int(0)),
            },
        )]);
        assert!(!run_function(&mut f));
    }

    #[test]
    fn float_arithmetic_folds() {
        let mut f = func_with(vec![store(
            0,
            0,
            Bin {
                op: BinOp::Mul,
                lhs: Value::Imm(Imm::Float(2.0)),
                rhs: Value::Imm(Imm::Float(4.0)),
            },
        )]);
        run_function(&mut f);
        assert_eq!(
            stored_value(&f, 0),
            Rvalue::Value(Value::Imm(Imm::Float(8.0)))
        );
    }
}
