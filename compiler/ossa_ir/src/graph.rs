//! Shared CFG traversals.
//!
//! Generic graph walks that several analyses and passes need. They live
//! here rather than in a specific analysis so that analyses do not import
//! from each other.

use crate::function::Function;
use crate::ids::BlockId;
use crate::worklist::{BlockSet, BlockWorklist};

/// Postorder of the blocks reachable from the entry.
///
/// Uses an iterative DFS with an explicit stack to avoid recursion depth
/// issues on deeply nested CFGs.
pub fn postorder(func: &Function) -> Vec<BlockId> {
    let Some(entry) = func.entry_block() else {
        return Vec::new();
    };
    let mut visited = BlockSet::new(func);
    let mut order = Vec::with_capacity(func.num_blocks());

    // (block, children_pushed)
    let mut stack: Vec<(BlockId, bool)> = vec![(entry, false)];
    while let Some(&mut (block, ref mut children_done)) = stack.last_mut() {
        if *children_done {
            order.push(block);
            stack.pop();
            continue;
        }
        *children_done = true;
        if !visited.insert(block) {
            stack.pop();
            continue;
        }
        for succ in func.successors(block) {
            if !visited.contains(succ) {
                stack.push((succ, false));
            }
        }
    }
    order
}

/// Reverse postorder of the blocks reachable from the entry.
pub fn reverse_postorder(func: &Function) -> Vec<BlockId> {
    let mut rpo = postorder(func);
    rpo.reverse();
    rpo
}

/// Blocks reachable from the entry by forward traversal.
pub fn reachable_blocks(func: &Function) -> BlockSet {
    let mut reachable = BlockSet::new(func);
    let mut worklist = BlockWorklist::new();
    if let Some(entry) = func.entry_block() {
        worklist.push_if_not_visited(entry);
    }
    while let Some(block) = worklist.pop() {
        reachable.insert(block);
        worklist.push_all_if_not_visited(func.successors(block));
    }
    reachable
}
