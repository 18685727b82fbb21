//! A range of blocks from a dominating begin block to a set of ends.

use smallvec::SmallVec;

use ossa_ir::{BlockId, BlockSet, BlockWorklist, DominatorTree, Function};

/// The blocks on paths from `begin` to any inserted end block.
///
/// Built backwards: inserting a block walks its predecessors until
/// `begin`. The *inclusive* range is every block visited that way, ends
/// included. The *exclusive* range ([`contains`](Self::contains)) drops the
/// ends, unless an end also flows into another range block (it sits in a
/// cycle inside the range), in which case it is an *interior* block.
///
/// ```text
///   begin ──► A ──► end          exclusive: {begin, A}
///             │                  exits:     B
///             └───► B
/// ```
pub struct BasicBlockRange {
    begin: BlockId,
    inserted: Vec<BlockId>,
    was_inserted: BlockSet,
    /// Doubles as the inclusive-range membership set.
    worklist: BlockWorklist,
    inclusive: Vec<BlockId>,
    in_exclusive: BlockSet,
}

impl BasicBlockRange {
    pub fn new(func: &Function, begin: BlockId) -> Self {
        BasicBlockRange {
            begin,
            inserted: Vec::new(),
            was_inserted: BlockSet::new(func),
            worklist: BlockWorklist::new(),
            inclusive: Vec::new(),
            in_exclusive: BlockSet::new(func),
        }
    }

    pub fn begin(&self) -> BlockId {
        self.begin
    }

    /// Add a potential end block.
    pub fn insert(&mut self, func: &Function, block: BlockId) {
        if self.was_inserted.insert(block) {
            self.inserted.push(block);
        }
        self.worklist.push_if_not_visited(block);
        while let Some(b) = self.worklist.pop() {
            self.inclusive.push(b);
            if b == self.begin {
                continue;
            }
            for &pred in func.predecessors(b) {
                self.worklist.push_if_not_visited(pred);
                self.in_exclusive.insert(pred);
            }
        }
    }

    /// Is `block` in the exclusive range?
    pub fn contains(&self, block: BlockId) -> bool {
        self.in_exclusive.contains(block)
    }

    pub fn inclusive_range_contains(&self, block: BlockId) -> bool {
        self.worklist.has_been_pushed(block)
    }

    /// The exclusive range, in discovery order.
    pub fn range(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.inclusive.iter().copied().filter(|&b| self.contains(b))
    }

    pub fn inclusive_range(&self) -> &[BlockId] {
        &self.inclusive
    }

    /// Inserted blocks outside the exclusive range.
    pub fn ends(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.inserted.iter().copied().filter(|&b| !self.contains(b))
    }

    /// Inserted blocks inside the exclusive range (other than `begin`).
    pub fn interiors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.inserted
            .iter()
            .copied()
            .filter(|&b| self.contains(b) && b != self.begin)
    }

    /// Edges `(from, to)` leaving the exclusive range: `to` is outside the
    /// inclusive range, or is `begin` reached again.
    pub fn exits(&self, func: &Function) -> Vec<(BlockId, BlockId)> {
        let mut exits = Vec::new();
        for from in self.range() {
            let mut succs: SmallVec<[BlockId; 4]> = func.successors(from);
            succs.dedup();
            for to in succs {
                if !self.inclusive_range_contains(to) || to == self.begin {
                    exits.push((from, to));
                }
            }
        }
        exits
    }

    /// Does `begin` dominate every inserted block?
    pub fn is_valid(&self, dominators: &DominatorTree) -> bool {
        self.inserted
            .iter()
            .all(|&b| dominators.dominates(self.begin, b))
    }
}
