//! Dominator tree and dominance frontiers.
//!
//! Dominators come from the set-based iterative dataflow: a reachable
//! block's dominator set is itself plus the intersection of its
//! predecessors' sets, refined to a fixpoint in reverse postorder.
//! Function-local CFGs are small, so keeping the full sets costs little and
//! buys constant-time dominance queries; the immediate dominator falls out
//! of the sets directly, since a block's strict dominators form a chain and
//! the closest one carries the largest set.
//!
//! Frontiers use the local/up decomposition over the dominator tree, walked
//! in tree postorder: a block contributes every CFG successor it does not
//! immediately dominate, and inherits from each dominator-tree child the
//! frontier entries it does not strictly dominate.

use super::cfg::{BlockId, ControlFlowGraph};
use rustc_hash::FxHashSet;

/// Dominator tree computed from a CFG.
///
/// Block A **dominates** block B if every path from the entry block to B
/// passes through A; the **immediate dominator** is the closest strict one.
/// Everything is stored dense, indexed by block id; unreachable blocks have
/// no dominator set and sit outside the tree.
#[derive(Debug)]
pub struct DominatorTree {
    /// Per block: every block on all entry paths, the block itself
    /// included. `None` marks an unreachable block.
    doms: Vec<Option<FxHashSet<BlockId>>>,
    /// Per block: the immediate dominator. `None` for the entry block and
    /// for unreachable ones.
    idoms: Vec<Option<BlockId>>,
    /// Per block: the blocks it immediately dominates, in id order so the
    /// SSA rename walk is deterministic.
    tree_children: Vec<Vec<BlockId>>,
    /// Per block: its dominance frontier.
    frontiers: Vec<Vec<BlockId>>,
}

impl DominatorTree {
    /// Compute the dominator tree for `cfg`.
    pub fn build(cfg: &ControlFlowGraph) -> Self {
        let n = cfg.block_count();
        let rpo = cfg.reverse_postorder();

        let doms = Self::solve_dom_sets(cfg, &rpo, n);

        // The immediate dominator is the strict dominator with the largest
        // set: deeper blocks in the chain dominate through all shallower
        // ones, so their sets strictly grow along it.
        let mut idoms: Vec<Option<BlockId>> = vec![None; n];
        for &block in rpo.iter().skip(1) {
            let Some(set) = &doms[block.0 as usize] else {
                continue;
            };
            idoms[block.0 as usize] = set
                .iter()
                .filter(|&&d| d != block)
                .max_by_key(|d| doms[d.0 as usize].as_ref().map(|s| s.len()).unwrap_or(0))
                .copied();
        }

        let mut tree_children: Vec<Vec<BlockId>> = vec![Vec::new(); n];
        for &block in &rpo {
            if let Some(idom) = idoms[block.0 as usize] {
                tree_children[idom.0 as usize].push(block);
            }
        }
        for list in &mut tree_children {
            list.sort();
        }

        let frontiers = Self::solve_frontiers(cfg, &rpo, &doms, &idoms, &tree_children);

        DominatorTree {
            doms,
            idoms,
            tree_children,
            frontiers,
        }
    }

    /// Fixpoint over reverse postorder. A not-yet-computed predecessor (a
    /// back edge on the first sweep) contributes nothing to the
    /// intersection; later sweeps refine until nothing changes.
    fn solve_dom_sets(
        cfg: &ControlFlowGraph,
        rpo: &[BlockId],
        n: usize,
    ) -> Vec<Option<FxHashSet<BlockId>>> {
        let mut doms: Vec<Option<FxHashSet<BlockId>>> = vec![None; n];
        if let Some(&entry) = rpo.first() {
            let mut set = FxHashSet::default();
            set.insert(entry);
            doms[entry.0 as usize] = Some(set);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut common: Option<FxHashSet<BlockId>> = None;
                for &pred in cfg.preds(block) {
                    let Some(pred_doms) = &doms[pred.0 as usize] else {
                        continue;
                    };
                    common = Some(match common {
                        None => pred_doms.clone(),
                        Some(acc) => acc.intersection(pred_doms).copied().collect(),
                    });
                }
                let Some(mut set) = common else {
                    continue;
                };
                set.insert(block);
                if doms[block.0 as usize].as_ref() != Some(&set) {
                    doms[block.0 as usize] = Some(set);
                    changed = true;
                }
            }
        }
        doms
    }

    /// DF(b) = { s ∈ succ(b) : idom(s) ≠ b }
    ///       ∪ { y ∈ DF(c) : c a tree child of b, b does not strictly
    ///           dominate y }.
    ///
    /// Children are finished before their parent (tree postorder), so each
    /// frontier is assembled exactly once. A loop header lands in its own
    /// frontier through its back edge: via the up-part of the back-edge
    /// child, or via the local part when the header loops on itself.
    fn solve_frontiers(
        cfg: &ControlFlowGraph,
        rpo: &[BlockId],
        doms: &[Option<FxHashSet<BlockId>>],
        idoms: &[Option<BlockId>],
        tree_children: &[Vec<BlockId>],
    ) -> Vec<Vec<BlockId>> {
        let mut frontiers: Vec<Vec<BlockId>> = vec![Vec::new(); cfg.block_count()];
        let Some(&entry) = rpo.first() else {
            return frontiers;
        };

        let mut order = Vec::with_capacity(rpo.len());
        tree_postorder(entry, tree_children, &mut order);

        let strictly_dominates = |a: BlockId, y: BlockId| {
            a != y
                && doms[y.0 as usize]
                    .as_ref()
                    .map(|set| set.contains(&a))
                    .unwrap_or(false)
        };

        for &block in &order {
            let mut df: Vec<BlockId> = Vec::new();
            for &succ in cfg.succs(block) {
                if idoms[succ.0 as usize] != Some(block) && !df.contains(&succ) {
                    df.push(succ);
                }
            }
            for &child in &tree_children[block.0 as usize] {
                let inherited = frontiers[child.0 as usize].clone();
                for y in inherited {
                    if !strictly_dominates(block, y) && !df.contains(&y) {
                        df.push(y);
                    }
                }
            }
            frontiers[block.0 as usize] = df;
        }
        frontiers
    }

    /// Returns true if block `a` dominates block `b` (reflexively).
    /// Constant-time: the answer is a set lookup.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.doms
            .get(b.0 as usize)
            .and_then(Option::as_ref)
            .map(|set| set.contains(&a))
            .unwrap_or(false)
    }

    /// The immediate dominator, or `None` for the entry block and for
    /// unreachable blocks.
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.idoms.get(block.0 as usize).copied().flatten()
    }

    /// True when the block was reached by the dataflow at all.
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.doms
            .get(block.0 as usize)
            .map(Option::is_some)
            .unwrap_or(false)
    }

    /// The blocks this block immediately dominates.
    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.tree_children
            .get(block.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The dominance frontier of a block.
    pub fn frontier(&self, block: BlockId) -> &[BlockId] {
        self.frontiers
            .get(block.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn tree_postorder(block: BlockId, tree_children: &[Vec<BlockId>], out: &mut Vec<BlockId>) {
    for &child in &tree_children[block.0 as usize] {
        tree_postorder(child, tree_children, out);
    }
    out.push(block);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cfg::ControlFlowGraph;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn dom_of(src: &str) -> (ControlFlowGraph, DominatorTree) {
        let mut ast = parse(tokenize(src).unwrap()).unwrap();
        crate::sema::functions::analyze(&ast).unwrap();
        crate::sema::types::check(&mut ast).unwrap();
        crate::lower::desugar(&mut ast);
        let unit = crate::ir::gen::emit(&ast).unwrap();
        let mut func = unit.functions.into_iter().next().unwrap();
        let cfg = ControlFlowGraph::build(&mut func);
        let dom = DominatorTree::build(&cfg);
        (cfg, dom)
    }

    #[test]
    fn entry_has_no_idom_and_dominates_everything() {
        let (cfg, dom) = dom_of(
            "int f(int x) { int r = 0; if (x) { r = 1; } else { r = 2; } while (r) { r = r - 1; } return r; }",
        );
        assert_eq!(dom.immediate_dominator(BlockId::ENTRY), None);
        assert!(dom.dominates(BlockId::ENTRY, BlockId::ENTRY));
        for &block in &cfg.reverse_postorder() {
            assert!(dom.dominates(BlockId::ENTRY, block));
        }
    }

    #[test]
    fn non_entry_idom_strictly_dominates() {
        let (cfg, dom) = dom_of("int f(int x) { if (x) { x = x + 1; } return x; }");
        for &block in &cfg.reverse_postorder() {
            if block == BlockId::ENTRY {
                continue;
            }
            let idom = dom.immediate_dominator(block).expect("reachable block");
            assert_ne!(idom, block);
            assert!(dom.dominates(idom, block));
            assert!(!dom.dominates(block, idom), "idom relation is asymmetric");
        }
    }

    #[test]
    fn idoms_form_a_tree() {
        let (cfg, dom) = dom_of(
            "int f(int n) { int s = 0; for (int i = 0; i < n; i++) { if (i) { s = s + i; } } return s; }",
        );
        // Walking idom pointers from any block terminates at the entry,
        // and every non-entry block appears in its idom's child list.
        for &block in &cfg.reverse_postorder() {
            let mut current = block;
            let mut steps = 0;
            while let Some(idom) = dom.immediate_dominator(current) {
                assert!(dom.children(idom).contains(&current));
                current = idom;
                steps += 1;
                assert!(steps <= cfg.block_count(), "idom chain cycles");
            }
            assert_eq!(current, BlockId::ENTRY);
        }
    }

    #[test]
    fn dominator_sets_are_chains() {
        let (cfg, dom) = dom_of(
            "int f(int n) { int s = 0; int i = 0; while (i < n) { if (s) { s = s - 1; } i = i + 1; } return s; }",
        );
        // Any two dominators of the same block are ordered between
        // themselves; that order is what the idom derivation relies on.
        for &block in &cfg.reverse_postorder() {
            let doms: Vec<BlockId> = cfg
                .reverse_postorder()
                .into_iter()
                .filter(|&d| dom.dominates(d, block))
                .collect();
            for &a in &doms {
                for &b in &doms {
                    assert!(
                        dom.dominates(a, b) || dom.dominates(b, a),
                        "dominators of {block} are not a chain: {a} vs {b}"
                    );
                }
            }
        }
    }

    #[test]
    fn diamond_join_is_on_both_branch_frontiers() {
        let (cfg, dom) = dom_of(
            "int f(int x) { int r = 0; if (x) { r = 1; } else { r = 2; } return r; }",
        );
        let join = cfg
            .blocks
            .iter()
            .find(|b| cfg.preds(b.id).len() == 2)
            .expect("join block")
            .id;
        // Each predecessor of the join ends a branch, and the join sits on
        // its dominance frontier.
        for &pred in cfg.preds(join) {
            assert!(
                dom.frontier(pred).contains(&join),
                "join missing from {pred}'s frontier"
            );
        }
        assert!(
            !dom.frontier(join).contains(&join),
            "diamond join is not a loop header"
        );
    }

    #[test]
    fn loop_body_frontier_contains_the_header() {
        let (cfg, dom) = dom_of(
            "int sum(int n) { int s = 0; int i = 0; while (i < n) { s = s + i; i = i + 1; } return s; }",
        );
        let header = cfg
            .blocks
            .iter()
            .find(|b| cfg.preds(b.id).len() == 2)
            .expect("loop header")
            .id;
        // The body closes the back edge, so the header is in its own
        // body's frontier (and in its own, being a loop).
        let body = cfg
            .preds(header)
            .iter()
            .copied()
            .find(|p| p.0 > header.0)
            .expect("back-edge predecessor");
        assert!(dom.frontier(body).contains(&header));
        assert!(dom.frontier(header).contains(&header));
    }
}
