//! Statement reordering: hoists loop-invariant allocas out of loop bodies.
//!
//! A back edge (a jump whose target precedes it) delimits a loop region.
//! An alloca inside the region, together with its immediately following
//! constant-immediate store when present, moves to just before the region
//! when the conservative safety predicate holds:
//!
//! - the stored value is an immediate (no dependence on anything the loop
//!   assigns),
//! - the variable is never dereferenced or address-taken anywhere in the
//!   function (no aliasing),
//! - the variable is not assigned anywhere else in the region,
//! - no phi merges the variable,
//! - nothing jumps into the moved instructions or enters the loop header
//!   other than the back edge and straight-line fall-through.
//!
//! When in doubt the pass does nothing. After every motion the body is
//! renumbered and jump targets are remapped, keeping the index invariants
//! intact. The pass also stamps `IN_LOOP` and the loop depth on every
//! instruction inside a region, which later consumers read.

use crate::ir::{self, Function, InstrFlags, InstrKind, Rvalue, Sym, Unit, Value, VarId};
use rustc_hash::FxHashSet;
use tracing::debug;

/// Run the pass over a whole unit. Returns whether anything moved.
pub fn run(unit: &mut Unit) -> bool {
    let mut changed = false;
    for func in &mut unit.functions {
        mark_loops(func);
        while hoist_one(func) {
            changed = true;
        }
    }
    changed
}

/// A loop region delimited by a back edge: instructions `[header, back]`.
#[derive(Debug, Clone, Copy)]
struct Loop {
    header: usize,
    back: usize,
}

fn find_loops(func: &Function) -> Vec<Loop> {
    let mut loops = Vec::new();
    for (pos, instr) in func.body.iter().enumerate() {
        if let InstrKind::Jump { target } | InstrKind::Cond { target, .. } = &instr.kind {
            if *target <= pos {
                loops.push(Loop {
                    header: *target,
                    back: pos,
                });
            }
        }
    }
    loops
}

/// Stamp loop membership and nesting depth.
fn mark_loops(func: &mut Function) {
    for instr in &mut func.body {
        instr.flags.remove(InstrFlags::IN_LOOP);
        instr.loop_depth = 0;
    }
    for l in find_loops(func) {
        for instr in &mut func.body[l.header..=l.back] {
            instr.flags.insert(InstrFlags::IN_LOOP);
            instr.loop_depth += 1;
        }
    }
}

/// Variables that must not be touched: dereferenced, address-taken, or
/// merged by a phi anywhere in the function.
fn pinned_vars(func: &Function) -> FxHashSet<VarId> {
    let mut pinned = FxHashSet::default();
    let mut scan_sym = |sym: &Sym, pinned: &mut FxHashSet<VarId>| {
        if sym.deref || sym.addr_of {
            pinned.insert(sym.idx);
        }
    };
    for instr in &func.body {
        match &instr.kind {
            InstrKind::Store { dest, value } => {
                scan_sym(dest, &mut pinned);
                match value {
                    Rvalue::Value(Value::Sym(s)) => scan_sym(s, &mut pinned),
                    Rvalue::Bin(bin) => {
                        if let Value::Sym(s) = &bin.lhs {
                            scan_sym(s, &mut pinned);
                        }
                        if let Value::Sym(s) = &bin.rhs {
                            scan_sym(s, &mut pinned);
                        }
                    }
                    _ => {}
                }
            }
            InstrKind::Cond { cond, .. } => {
                if let Value::Sym(s) = &cond.lhs {
                    scan_sym(s, &mut pinned);
                }
                if let Value::Sym(s) = &cond.rhs {
                    scan_sym(s, &mut pinned);
                }
            }
            InstrKind::Ret {
                value: Some(Value::Sym(s)),
            } => scan_sym(s, &mut pinned),
            InstrKind::FnCall { args, .. } => {
                for arg in args {
                    if let Value::Sym(s) = arg {
                        scan_sym(s, &mut pinned);
                    }
                }
            }
            InstrKind::Phi(phi) => {
                pinned.insert(phi.var);
            }
            _ => {}
        }
    }
    pinned
}

fn jump_targets(func: &Function) -> Vec<usize> {
    func.body
        .iter()
        .filter_map(|i| match &i.kind {
            InstrKind::Jump { target } | InstrKind::Cond { target, .. } => Some(*target),
            _ => None,
        })
        .collect()
}

/// Find one hoistable alloca (plus its constant store) and move it out of
/// its innermost loop. Returns whether a motion happened.
fn hoist_one(func: &mut Function) -> bool {
    let loops = find_loops(func);
    let pinned = pinned_vars(func);
    let targets = jump_targets(func);

    for l in &loops {
        // The header must be entered by fall-through plus the back edge
        // only; another entry could skip the hoisted initialization.
        let header_entries = targets.iter().filter(|&&t| t == l.header).count();
        if header_entries != 1 {
            continue;
        }

        for pos in l.header..=l.back {
            let InstrKind::Alloca { idx: var, .. } = &func.body[pos].kind else {
                continue;
            };
            let var = *var;
            if pinned.contains(&var) {
                continue;
            }

            // Optional companion: the immediately following constant store.
            let with_store = matches!(
                func.body.get(pos + 1).map(|i| &i.kind),
                Some(InstrKind::Store {
                    dest,
                    value: Rvalue::Value(Value::Imm(_)),
                }) if dest.is_scalar() && dest.idx == var
            );
            let moved = if with_store { pos..pos + 2 } else { pos..pos + 1 };

            // No other assignment to the variable inside the region.
            let reassigned = func.body[l.header..=l.back]
                .iter()
                .enumerate()
                .any(|(off, i)| {
                    let at = l.header + off;
                    if moved.contains(&at) {
                        return false;
                    }
                    match &i.kind {
                        InstrKind::Store { dest, .. } => dest.is_scalar() && dest.idx == var,
                        InstrKind::FnCall {
                            dest: Some(dest), ..
                        } => dest.idx == var,
                        _ => false,
                    }
                });
            if reassigned {
                continue;
            }

            // Nothing may jump into the middle of the moved range. A jump
            // to its first instruction is fine: it retargets to the
            // instruction after the range, which is the remainder of the
            // block.
            if targets.iter().any(|t| moved.contains(t) && *t != moved.start) {
                continue;
            }

            debug!(var, from = pos, to = l.header, "hoisting loop-invariant alloca");
            apply_motion(func, moved, l.header);
            return true;
        }
    }
    false
}

/// Move `range` to just before `dest` (dest <= range.start), then
/// renumber and remap every jump target. A target on the range's first
/// instruction lands on the instruction after the range instead, so flow
/// that entered there still skips the hoisted initialization exactly once.
fn apply_motion(func: &mut Function, range: std::ops::Range<usize>, dest: usize) {
    let count = range.len();
    let old = std::mem::take(&mut func.body);
    let len = old.len();

    let mut old_to_new = vec![0usize; len];
    for (x, slot) in old_to_new.iter_mut().enumerate() {
        *slot = if x < dest {
            x
        } else if range.contains(&x) {
            dest + (x - range.start)
        } else if x < range.start {
            x + count
        } else {
            x
        };
    }

    let mut new_body: Vec<Option<crate::ir::Instr>> = vec![None; len];
    for (x, instr) in old.into_iter().enumerate() {
        new_body[old_to_new[x]] = Some(instr);
    }
    func.body = new_body
        .into_iter()
        .map(|slot| slot.expect("motion mapping is a permutation"))
        .collect();

    let mut target_map = old_to_new.clone();
    if range.end < len {
        target_map[range.start] = old_to_new[range.end];
    }
    ir::renumber(&mut func.body, &target_map);
    ir::validate(func);
}
