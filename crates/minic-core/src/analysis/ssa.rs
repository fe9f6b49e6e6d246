//! SSA construction: phi insertion and variable renaming.
//!
//! The Cytron et al. recipe over the linear IR:
//!
//! 1. Collect, per scalar variable, the set of blocks that assign it.
//! 2. Place phi instructions with the dominance-frontier worklist: pop an
//!    assigning block X, and for each frontier block Y not yet holding a
//!    phi for the variable, insert one at the head of Y; Y itself then
//!    counts as assigning.
//! 3. Rename with one stack per variable over a dominator-tree walk:
//!    definitions (stores, call results, phis) push fresh versions, uses
//!    read the top of stack, phi operands in CFG successors are filled
//!    from the version live at the end of the predecessor, and a block's
//!    pushes are popped on exit.
//!
//! Phi insertion grows the instruction list, so the body is renumbered and
//! every jump target remapped; a jump that entered a block now lands on
//! its first phi. Only plain scalar variables participate: arrays,
//! dereferencing accesses and address-taken variables stay in memory form.

use super::cfg::{BlockId, ControlFlowGraph};
use super::dominance::DominatorTree;
use crate::ir::{self, Function, Instr, InstrKind, Phi, PhiOp, Rvalue, Sym, Value, VarId};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

/// The per-function analysis artifacts left by SSA construction: the final
/// CFG (phis included) and its dominator tree.
#[derive(Debug)]
pub struct FunctionAnalysis {
    pub cfg: ControlFlowGraph,
    pub dominators: DominatorTree,
}

/// Convert one function into SSA form in place.
pub fn build(func: &mut Function) -> FunctionAnalysis {
    let cfg = ControlFlowGraph::build(func);
    let dom = DominatorTree::build(&cfg);

    let tracked = tracked_vars(func);
    let inserts = place_phis(func, &cfg, &dom, &tracked);
    insert_phis(func, &cfg, &inserts);
    ir::validate(func);

    // The body changed shape; rebuild the graph before renaming.
    let cfg = ControlFlowGraph::build(func);
    let dom = DominatorTree::build(&cfg);
    Renamer::new(&tracked).run(func, &cfg, &dom);
    ir::validate(func);

    FunctionAnalysis {
        cfg,
        dominators: dom,
    }
}

/// Convert every function of a unit.
pub fn build_unit(unit: &mut ir::Unit) -> Vec<FunctionAnalysis> {
    unit.functions.iter_mut().map(build).collect()
}

/// Scalar variables eligible for SSA: plain allocas (parameters included)
/// that are never address-taken. Arrays and anything reached through a
/// pointer stay in memory form.
fn tracked_vars(func: &Function) -> FxHashSet<VarId> {
    let mut vars: FxHashSet<VarId> = FxHashSet::default();
    for instr in func.params.iter().chain(func.body.iter()) {
        if let InstrKind::Alloca { idx, .. } = &instr.kind {
            vars.insert(*idx);
        }
    }

    let mut address_taken: FxHashSet<VarId> = FxHashSet::default();
    let mut scan_value = |value: &Value, address_taken: &mut FxHashSet<VarId>| {
        if let Value::Sym(sym) = value {
            if sym.addr_of {
                address_taken.insert(sym.idx);
            }
        }
    };
    for instr in &func.body {
        match &instr.kind {
            InstrKind::Store { value, .. } => match value {
                Rvalue::Value(v) => scan_value(v, &mut address_taken),
                Rvalue::Bin(bin) => {
                    scan_value(&bin.lhs, &mut address_taken);
                    scan_value(&bin.rhs, &mut address_taken);
                }
            },
            InstrKind::Cond { cond, .. } => {
                scan_value(&cond.lhs, &mut address_taken);
                scan_value(&cond.rhs, &mut address_taken);
            }
            InstrKind::Ret { value: Some(v) } => scan_value(v, &mut address_taken),
            InstrKind::FnCall { args, .. } => {
                for arg in args {
                    scan_value(arg, &mut address_taken);
                }
            }
            _ => {}
        }
    }
    vars.retain(|v| !address_taken.contains(v));
    vars
}

/// Blocks assigning each tracked variable.
fn assignments(func: &Function, cfg: &ControlFlowGraph, tracked: &FxHashSet<VarId>) -> FxHashMap<VarId, Vec<BlockId>> {
    let mut assigns: FxHashMap<VarId, Vec<BlockId>> = FxHashMap::default();
    for (pos, instr) in func.body.iter().enumerate() {
        let defined = match &instr.kind {
            InstrKind::Store { dest, .. } if dest.is_scalar() => Some(dest.idx),
            InstrKind::FnCall {
                dest: Some(dest), ..
            } => Some(dest.idx),
            _ => None,
        };
        if let Some(var) = defined {
            if tracked.contains(&var) {
                let block = cfg.instr_block[pos];
                let list = assigns.entry(var).or_default();
                if !list.contains(&block) {
                    list.push(block);
                }
            }
        }
    }
    assigns
}

/// Worklist phi placement. Returns, per block, the variables needing a phi
/// at its head, in deterministic variable order.
fn place_phis(
    func: &Function,
    cfg: &ControlFlowGraph,
    dom: &DominatorTree,
    tracked: &FxHashSet<VarId>,
) -> FxHashMap<BlockId, Vec<VarId>> {
    let assigns = assignments(func, cfg, tracked);
    let mut vars: Vec<VarId> = assigns.keys().copied().collect();
    vars.sort_unstable();

    let mut inserts: FxHashMap<BlockId, Vec<VarId>> = FxHashMap::default();
    for var in vars {
        let assign_blocks = &assigns[&var];
        let mut placed: FxHashSet<BlockId> = FxHashSet::default();
        let mut worklist: Vec<BlockId> = assign_blocks.clone();

        while let Some(x) = worklist.pop() {
            for &y in dom.frontier(x) {
                if placed.insert(y) {
                    trace!(var, block = %y, "placing phi");
                    inserts.entry(y).or_default().push(var);
                    if !assign_blocks.contains(&y) {
                        worklist.push(y);
                    }
                }
            }
        }
    }
    inserts
}

/// Materialize the placed phis at their blocks' heads, renumbering the
/// body and remapping every jump target. A jump into a block with phis now
/// targets its first phi, which keeps the phi on every path into the
/// block.
fn insert_phis(
    func: &mut Function,
    cfg: &ControlFlowGraph,
    inserts: &FxHashMap<BlockId, Vec<VarId>>,
) {
    if inserts.is_empty() {
        return;
    }

    let old_body = std::mem::take(&mut func.body);
    let mut new_body: Vec<Instr> =
        Vec::with_capacity(old_body.len() + inserts.values().map(Vec::len).sum::<usize>());
    let mut old_to_new = vec![0usize; old_body.len()];
    // Old block-leader position -> position of the block's first phi.
    let mut leader_remap: FxHashMap<usize, usize> = FxHashMap::default();

    let mut old_iter = old_body.into_iter();
    for block in &cfg.blocks {
        if let Some(vars) = inserts.get(&block.id) {
            leader_remap.insert(block.start, new_body.len());
            for &var in vars {
                let ops = cfg
                    .preds(block.id)
                    .iter()
                    .map(|p| PhiOp {
                        pred_block: p.0,
                        ssa_idx: None,
                    })
                    .collect();
                new_body.push(Instr::new(
                    0,
                    InstrKind::Phi(Phi {
                        var,
                        ssa_idx: None,
                        ops,
                    }),
                ));
            }
        }
        for pos in block.instr_range() {
            old_to_new[pos] = new_body.len();
            new_body.push(old_iter.next().expect("block ranges cover the body"));
        }
    }

    for (pos, instr) in new_body.iter_mut().enumerate() {
        instr.idx = pos;
        if let InstrKind::Jump { target } | InstrKind::Cond { target, .. } = &mut instr.kind {
            *target = leader_remap
                .get(target)
                .copied()
                .unwrap_or_else(|| old_to_new[*target]);
        }
    }
    func.body = new_body;
}

/// The stack-based renaming walk.
struct Renamer {
    counters: FxHashMap<VarId, u32>,
    stacks: FxHashMap<VarId, Vec<u32>>,
}

impl Renamer {
    fn new(tracked: &FxHashSet<VarId>) -> Self {
        let mut counters = FxHashMap::default();
        let mut stacks = FxHashMap::default();
        for &var in tracked {
            counters.insert(var, 0);
            // Version 0 stands for the entry value: a parameter's incoming
            // value, or an as-yet-unwritten local.
            stacks.insert(var, vec![0]);
        }
        Renamer { counters, stacks }
    }

    fn tracked(&self, var: VarId) -> bool {
        self.stacks.contains_key(&var)
    }

    fn current(&self, var: VarId) -> u32 {
        self.stacks
            .get(&var)
            .and_then(|s| s.last())
            .copied()
            .unwrap_or(0)
    }

    fn new_version(&mut self, var: VarId) -> u32 {
        let counter = self.counters.entry(var).or_insert(0);
        *counter += 1;
        let version = *counter;
        self.stacks.entry(var).or_default().push(version);
        version
    }

    fn run(mut self, func: &mut Function, cfg: &ControlFlowGraph, dom: &DominatorTree) {
        self.rename_block(BlockId::ENTRY, func, cfg, dom);
    }

    /// Tag a symbol in use position with the live version of its variable.
    /// Dereferencing symbols read the pointer variable itself.
    fn rename_use(&mut self, sym: &mut Sym) {
        if !sym.addr_of && self.tracked(sym.idx) {
            sym.ssa_idx = Some(self.current(sym.idx));
        }
    }

    fn rename_value(&mut self, value: &mut Value) {
        if let Value::Sym(sym) = value {
            self.rename_use(sym);
        }
    }

    fn rename_block(
        &mut self,
        block: BlockId,
        func: &mut Function,
        cfg: &ControlFlowGraph,
        dom: &DominatorTree,
    ) {
        // Record what this block pushes so the exits pair with pops.
        let mut pushed: Vec<VarId> = Vec::new();

        for pos in cfg.block(block).instr_range() {
            match &mut func.body[pos].kind {
                InstrKind::Phi(phi) => {
                    if self.tracked(phi.var) {
                        phi.ssa_idx = Some(self.new_version(phi.var));
                        pushed.push(phi.var);
                    }
                }
                InstrKind::Store { dest, value } => {
                    match value {
                        Rvalue::Value(v) => self.rename_value(v),
                        Rvalue::Bin(bin) => {
                            self.rename_value(&mut bin.lhs);
                            self.rename_value(&mut bin.rhs);
                        }
                    }
                    if dest.is_scalar() && self.tracked(dest.idx) {
                        dest.ssa_idx = Some(self.new_version(dest.idx));
                        pushed.push(dest.idx);
                    } else if dest.deref {
                        // A write through a pointer reads the pointer.
                        self.rename_use(dest);
                    }
                }
                InstrKind::Cond { cond, .. } => {
                    self.rename_value(&mut cond.lhs);
                    self.rename_value(&mut cond.rhs);
                }
                InstrKind::Ret { value: Some(v) } => self.rename_value(v),
                InstrKind::FnCall { args, dest, .. } => {
                    for arg in args {
                        self.rename_value(arg);
                    }
                    if let Some(dest) = dest {
                        if self.tracked(dest.idx) {
                            dest.ssa_idx = Some(self.new_version(dest.idx));
                            pushed.push(dest.idx);
                        }
                    }
                }
                _ => {}
            }
        }

        // Feed this block's live versions into the successors' phis.
        for &succ in cfg.succs(block) {
            for pos in cfg.block(succ).instr_range() {
                let InstrKind::Phi(phi) = &mut func.body[pos].kind else {
                    break; // phis sit contiguously at the block head
                };
                if self.tracked(phi.var) {
                    let version = self.current(phi.var);
                    for op in &mut phi.ops {
                        if op.pred_block == block.0 {
                            op.ssa_idx = Some(version);
                        }
                    }
                }
            }
        }

        // Recurse into dominator-tree children.
        let children = dom.children(block).to_vec();
        for child in children {
            self.rename_block(child, func, cfg, dom);
        }

        // Pop exactly what this block pushed.
        for var in pushed.into_iter().rev() {
            if let Some(stack) = self.stacks.get_mut(&var) {
                stack.pop();
            }
        }
    }
}
