//! Dead-end blocks: blocks from which no `return` is reachable.
//!
//! Owned values may leak into dead-end regions, where the program traps or
//! loops forever. Ownership checks can consult this set to tell such a
//! value apart from a real leak.

use crate::function::Function;
use crate::ids::BlockId;
use crate::inst::InstKind;
use crate::worklist::{BlockSet, BlockWorklist};

pub struct DeadEndBlocks {
    /// Blocks that can reach a `return`.
    reaches_return: BlockSet,
}

impl DeadEndBlocks {
    pub fn build(func: &Function) -> Self {
        let mut reaches_return = BlockSet::new(func);
        let mut worklist = BlockWorklist::new();
        for block in func.blocks() {
            let returns = func
                .terminator(block)
                .is_some_and(|t| matches!(func.inst_kind(t), InstKind::Return));
            if returns {
                worklist.push_if_not_visited(block);
            }
        }
        while let Some(block) = worklist.pop() {
            reaches_return.insert(block);
            worklist.push_all_if_not_visited(func.predecessors(block).iter().copied());
        }
        Self { reaches_return }
    }

    /// Returns `true` if no path from `block` reaches a `return`.
    pub fn is_dead_end(&self, block: BlockId) -> bool {
        !self.reaches_return.contains(block)
    }
}
