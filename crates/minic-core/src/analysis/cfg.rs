//! Control flow graph construction over the linear IR.
//!
//! Partitions a function body into basic blocks and links the edges.
//! Block boundaries sit before every jump target and immediately after
//! every jump, conditional or return. A node has at most two successors:
//! a conditional's taken target plus its fall-through.
//!
//! Blocks are identified by dense `BlockId`s in instruction order, so the
//! entry block is always `BlockId::ENTRY`; analyses use `usize` instruction
//! indices and block ids rather than references to stay decoupled from the
//! body vector's lifetime.

use crate::ir::{Function, InstrKind};
use rustc_hash::FxHashMap;

/// Unique identifier for a basic block within a function's CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    /// The entry block: an empty sentinel holding no instructions, with a
    /// single edge to the first code block. Keeping it separate means a
    /// loop header at instruction 0 still has a visible entry edge, which
    /// phi placement depends on.
    pub const ENTRY: BlockId = BlockId(0);
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A maximal straight-line instruction run: control enters at `start` and
/// leaves after `end - 1`.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Half-open instruction index range `[start, end)`.
    pub start: usize,
    pub end: usize,
}

impl BasicBlock {
    pub fn instr_range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// The control flow graph of one function.
#[derive(Debug)]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlock>,
    /// Block -> blocks that can jump here.
    pub predecessors: FxHashMap<BlockId, Vec<BlockId>>,
    /// Block -> blocks reachable from here (at most two entries).
    pub successors: FxHashMap<BlockId, Vec<BlockId>>,
    /// Instruction index -> containing block.
    pub instr_block: Vec<BlockId>,
}

impl ControlFlowGraph {
    /// Build the CFG of `func` and stamp every instruction's block number.
    pub fn build(func: &mut Function) -> Self {
        let body = &func.body;
        let len = body.len();

        let mut leader = vec![false; len];
        if len > 0 {
            leader[0] = true;
        }
        for (pos, instr) in body.iter().enumerate() {
            match &instr.kind {
                InstrKind::Jump { target } => {
                    leader[*target] = true;
                    if pos + 1 < len {
                        leader[pos + 1] = true;
                    }
                }
                InstrKind::Cond { target, .. } => {
                    leader[*target] = true;
                    if pos + 1 < len {
                        leader[pos + 1] = true;
                    }
                }
                InstrKind::Ret { .. } => {
                    if pos + 1 < len {
                        leader[pos + 1] = true;
                    }
                }
                _ => {}
            }
        }

        // Block 0 is the empty ENTRY sentinel; code blocks follow in
        // instruction order.
        let mut blocks = vec![BasicBlock {
            id: BlockId::ENTRY,
            start: 0,
            end: 0,
        }];
        let mut instr_block = vec![BlockId::ENTRY; len];
        let mut start = 0;
        for pos in 0..len {
            let is_last = pos + 1 == len;
            let next_is_leader = !is_last && leader[pos + 1];
            if is_last || next_is_leader {
                let id = BlockId(blocks.len() as u32);
                for slot in instr_block.iter_mut().take(pos + 1).skip(start) {
                    *slot = id;
                }
                blocks.push(BasicBlock {
                    id,
                    start,
                    end: pos + 1,
                });
                start = pos + 1;
            }
        }

        let mut successors: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        let mut predecessors: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        for block in &blocks {
            successors.entry(block.id).or_default();
            predecessors.entry(block.id).or_default();
        }
        for block in &blocks {
            let mut succs = Vec::new();
            if block.id == BlockId::ENTRY {
                if len > 0 {
                    succs.push(instr_block[0]);
                }
            } else {
                let last = &body[block.end - 1];
                match &last.kind {
                    InstrKind::Jump { target } => succs.push(instr_block[*target]),
                    InstrKind::Cond { target, .. } => {
                        succs.push(instr_block[*target]);
                        if block.end < len {
                            succs.push(instr_block[block.end]);
                        }
                    }
                    InstrKind::Ret { .. } => {}
                    _ => {
                        if block.end < len {
                            succs.push(instr_block[block.end]);
                        }
                    }
                }
            }
            debug_assert!(succs.len() <= 2, "a CFG node has at most two successors");
            for &succ in &succs {
                predecessors.entry(succ).or_default().push(block.id);
            }
            successors.insert(block.id, succs);
        }

        for (pos, instr) in func.body.iter_mut().enumerate() {
            instr.block = instr_block[pos].0;
        }

        let cfg = ControlFlowGraph {
            blocks,
            predecessors,
            successors,
            instr_block,
        };
        cfg.assert_symmetry();
        cfg
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn preds(&self, id: BlockId) -> &[BlockId] {
        self.predecessors
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn succs(&self, id: BlockId) -> &[BlockId] {
        self.successors
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Blocks in reverse postorder, the iteration order dataflow wants.
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut visited = vec![false; self.blocks.len()];
        let mut postorder = Vec::with_capacity(self.blocks.len());
        self.dfs_postorder(BlockId::ENTRY, &mut visited, &mut postorder);
        postorder.reverse();
        postorder
    }

    fn dfs_postorder(&self, block: BlockId, visited: &mut Vec<bool>, postorder: &mut Vec<BlockId>) {
        let idx = block.0 as usize;
        if idx >= visited.len() || visited[idx] {
            return;
        }
        visited[idx] = true;
        for &succ in self.succs(block) {
            self.dfs_postorder(succ, visited, postorder);
        }
        postorder.push(block);
    }

    /// `N ∈ succs(P)` if and only if `P ∈ preds(N)`; violations are
    /// construction bugs.
    fn assert_symmetry(&self) {
        for block in &self.blocks {
            for &succ in self.succs(block.id) {
                debug_assert!(
                    self.preds(succ).contains(&block.id),
                    "{} missing from preds of {}",
                    block.id,
                    succ
                );
            }
            for &pred in self.preds(block.id) {
                debug_assert!(
                    self.succs(pred).contains(&block.id),
                    "{} missing from succs of {}",
                    block.id,
                    pred
                );
            }
        }
    }
}
