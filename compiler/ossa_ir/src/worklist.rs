//! Worklists and dense block sets used by the CFG walks.

use std::hash::Hash;

use rustc_hash::FxHashSet;

use crate::function::Function;
use crate::ids::{BlockId, InstId, ValueId};

/// Dense set of blocks of one function.
///
/// Grows on demand, so blocks created after the set (edge splits) can be
/// inserted without resizing up front.
#[derive(Clone, Debug, Default)]
pub struct BlockSet {
    bits: Vec<bool>,
    len: usize,
}

impl BlockSet {
    /// Empty set sized for `func`'s current blocks.
    pub fn new(func: &Function) -> Self {
        BlockSet {
            bits: vec![false; func.block_capacity()],
            len: 0,
        }
    }

    /// Inserts `block`; returns `true` if it was not already present.
    pub fn insert(&mut self, block: BlockId) -> bool {
        let idx = block.index();
        if idx >= self.bits.len() {
            self.bits.resize(idx + 1, false);
        }
        if self.bits[idx] {
            return false;
        }
        self.bits[idx] = true;
        self.len += 1;
        true
    }

    pub fn remove(&mut self, block: BlockId) -> bool {
        match self.bits.get_mut(block.index()) {
            Some(bit) if *bit => {
                *bit = false;
                self.len -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.bits.get(block.index()).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// LIFO worklist that hands out each item at most once.
///
/// An item pushed after it was already pushed (and possibly popped) is
/// ignored, so cyclic walks terminate.
#[derive(Clone, Debug)]
pub struct Worklist<T> {
    stack: Vec<T>,
    visited: FxHashSet<T>,
}

impl<T: Copy + Eq + Hash> Worklist<T> {
    pub fn new() -> Self {
        Worklist {
            stack: Vec::new(),
            visited: FxHashSet::default(),
        }
    }

    /// Push `item` unless it has been pushed before. Returns `true` if it
    /// was pushed.
    pub fn push_if_not_visited(&mut self, item: T) -> bool {
        if self.visited.insert(item) {
            self.stack.push(item);
            true
        } else {
            false
        }
    }

    pub fn push_all_if_not_visited(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.push_if_not_visited(item);
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.stack.pop()
    }

    pub fn has_been_pushed(&self, item: T) -> bool {
        self.visited.contains(&item)
    }
}

impl<T: Copy + Eq + Hash> Default for Worklist<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub type BlockWorklist = Worklist<BlockId>;
pub type InstWorklist = Worklist<InstId>;
pub type ValueWorklist = Worklist<ValueId>;
