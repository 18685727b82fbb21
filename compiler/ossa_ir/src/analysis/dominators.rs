//! Dominator and post-dominator trees.
//!
//! Both use the Cooper-Harvey-Kennedy iterative algorithm, which is simpler
//! than Lengauer-Tarjan and fast enough for typical function sizes. The
//! algorithm works on reverse postorder and converges in O(n * d) where d
//! is the loop nesting depth.
//!
//! The post-dominator tree runs the same algorithm on the reversed CFG,
//! rooted at a virtual exit node that every returning or unreachable-ending
//! block flows into. Blocks that cannot reach any exit (infinite loops) are
//! absent from it.
//!
//! Reference: Cooper, Harvey, Kennedy - "A Simple, Fast Dominance Algorithm" (2001)

use smallvec::SmallVec;

use crate::function::Function;
use crate::ids::{BlockId, FuncId};

type Neighbors = SmallVec<[usize; 4]>;

/// Dominator tree of the blocks reachable from the entry.
pub struct DominatorTree {
    func: FuncId,
    /// Immediate dominator per block slot. `idom[entry] == Some(entry)`;
    /// unreachable blocks are `None`.
    idom: Vec<Option<usize>>,
}

impl DominatorTree {
    /// Build the dominator tree for a function.
    pub fn build(func: &Function) -> Self {
        let n = func.block_capacity();
        let Some(entry) = func.entry_block() else {
            return Self {
                func: func.id(),
                idom: vec![None; n],
            };
        };
        let succs = |b: usize| -> Neighbors {
            func.successors(BlockId::new(func.id(), raw(b)))
                .iter()
                .map(|s| s.index())
                .collect()
        };
        let preds = |b: usize| -> Neighbors {
            func.predecessors(BlockId::new(func.id(), raw(b)))
                .iter()
                .map(|p| p.index())
                .collect()
        };
        let idom = compute_idoms(n, entry.index(), succs, preds);
        Self {
            func: func.id(),
            idom,
        }
    }

    /// Does block `a` dominate block `b`?
    ///
    /// A block dominates itself. Unreachable blocks are dominated only by
    /// themselves.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        dominates_in(&self.idom, a.index(), b.index())
    }

    /// Strict dominance: `a` dominates `b` and `a != b`.
    pub fn properly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Immediate dominator of `block`; `None` for the entry and for
    /// unreachable blocks.
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        match self.idom.get(block.index()).copied().flatten() {
            Some(d) if d != block.index() => Some(BlockId::new(self.func, raw(d))),
            _ => None,
        }
    }

    /// Returns `true` if `block` is reachable from the entry.
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.idom.get(block.index()).copied().flatten().is_some()
    }
}

/// Post-dominator tree, rooted at a virtual exit.
pub struct PostDominatorTree {
    func: FuncId,
    /// Indexed by block slot; slot `exit` is the virtual exit node.
    idom: Vec<Option<usize>>,
    exit: usize,
}

impl PostDominatorTree {
    pub fn build(func: &Function) -> Self {
        let n = func.block_capacity();
        let exit = n;
        let is_exit = |b: usize| -> bool {
            let block = BlockId::new(func.id(), raw(b));
            func.is_live_block(block)
                && func.terminator(block).is_some()
                && func.successors(block).is_empty()
        };
        // Walking the reversed CFG: "successors" are CFG predecessors.
        let rsuccs = |b: usize| -> Neighbors {
            if b == exit {
                return (0..n).filter(|&i| is_exit(i)).collect();
            }
            func.predecessors(BlockId::new(func.id(), raw(b)))
                .iter()
                .map(|p| p.index())
                .collect()
        };
        let rpreds = |b: usize| -> Neighbors {
            if b == exit {
                return Neighbors::new();
            }
            let mut out: Neighbors = func
                .successors(BlockId::new(func.id(), raw(b)))
                .iter()
                .map(|s| s.index())
                .collect();
            if is_exit(b) {
                out.push(exit);
            }
            out
        };
        let idom = compute_idoms(n + 1, exit, rsuccs, rpreds);
        Self {
            func: func.id(),
            idom,
            exit,
        }
    }

    /// Does `a` post-dominate `b` (every path from `b` to an exit passes
    /// through `a`)?
    pub fn post_dominates(&self, a: BlockId, b: BlockId) -> bool {
        dominates_in(&self.idom, a.index(), b.index())
    }

    /// Immediate post-dominator; `None` when it is the virtual exit or the
    /// block cannot reach an exit.
    pub fn immediate_post_dominator(&self, block: BlockId) -> Option<BlockId> {
        match self.idom.get(block.index()).copied().flatten() {
            Some(d) if d != self.exit && d != block.index() => {
                Some(BlockId::new(self.func, raw(d)))
            }
            _ => None,
        }
    }
}

#[expect(clippy::cast_possible_truncation, reason = "block slots fit in u32")]
fn raw(index: usize) -> u32 {
    index as u32
}

fn dominates_in(idom: &[Option<usize>], a: usize, b: usize) -> bool {
    let mut current = b;
    loop {
        if current == a {
            return true;
        }
        match idom.get(current).copied().flatten() {
            Some(dom) if dom != current => current = dom,
            _ => return false,
        }
    }
}

/// Iterative DFS postorder over dense node indices.
fn postorder(n: usize, entry: usize, succs: &impl Fn(usize) -> Neighbors) -> Vec<usize> {
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<(usize, bool)> = vec![(entry, false)];
    while let Some(&mut (node, ref mut children_done)) = stack.last_mut() {
        if *children_done {
            order.push(node);
            stack.pop();
            continue;
        }
        *children_done = true;
        if visited[node] {
            stack.pop();
            continue;
        }
        visited[node] = true;
        for succ in succs(node) {
            if succ < n && !visited[succ] {
                stack.push((succ, false));
            }
        }
    }
    order
}

/// CHK fixed point. Returns the immediate dominator of every node reachable
/// from `entry` (`entry` maps to itself).
fn compute_idoms(
    n: usize,
    entry: usize,
    succs: impl Fn(usize) -> Neighbors,
    preds: impl Fn(usize) -> Neighbors,
) -> Vec<Option<usize>> {
    let mut rpo = postorder(n, entry, &succs);
    rpo.reverse();

    let mut rpo_pos = vec![usize::MAX; n];
    for (pos, &node) in rpo.iter().enumerate() {
        rpo_pos[node] = pos;
    }

    let mut idom: Vec<Option<usize>> = vec![None; n];
    idom[entry] = Some(entry);

    let mut changed = true;
    while changed {
        changed = false;
        for &node in &rpo[1..] {
            let node_preds = preds(node);
            let mut processed = node_preds.iter().copied().filter(|&p| idom[p].is_some());
            let Some(mut new_idom) = processed.next() else {
                continue;
            };
            for pred in processed {
                new_idom = intersect(pred, new_idom, &idom, &rpo_pos);
            }
            if idom[node] != Some(new_idom) {
                idom[node] = Some(new_idom);
                changed = true;
            }
        }
    }
    idom
}

/// CHK intersect: walk two fingers upward until they meet.
fn intersect(mut a: usize, mut b: usize, idom: &[Option<usize>], rpo_pos: &[usize]) -> usize {
    while a != b {
        while rpo_pos[a] > rpo_pos[b] {
            let Some(next) = idom[a] else {
                debug_assert!(false, "intersect: broken idom chain at {a}");
                return a;
            };
            a = next;
        }
        while rpo_pos[b] > rpo_pos[a] {
            let Some(next) = idom[b] else {
                debug_assert!(false, "intersect: broken idom chain at {b}");
                return b;
            };
            b = next;
        }
    }
    a
}
