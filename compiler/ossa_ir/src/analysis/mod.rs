//! Lazily computed, cached function analyses.
//!
//! An analysis is any `'static` type implementing [`Analysis`]. The
//! [`Context`](crate::Context) computes it on first request, caches it
//! behind an `Rc`, and drops it as soon as a notification intersecting
//! [`Analysis::INVALIDATED_BY`] arrives. Nothing is recomputed eagerly.

mod dead_end;
mod dominators;

pub use dead_end::DeadEndBlocks;
pub use dominators::{DominatorTree, PostDominatorTree};

use crate::context::Invalidation;
use crate::function::Function;
use crate::options::PassOptions;

/// A per-function analysis result that can be cached by a Context.
pub trait Analysis: 'static {
    /// Notification kinds that make a cached result stale.
    const INVALIDATED_BY: Invalidation;

    /// Compute the analysis from scratch under the context's `options`.
    fn compute(func: &Function, options: &PassOptions) -> Self;
}

impl Analysis for DominatorTree {
    const INVALIDATED_BY: Invalidation = Invalidation::BRANCHES;

    fn compute(func: &Function, _options: &PassOptions) -> Self {
        DominatorTree::build(func)
    }
}

impl Analysis for PostDominatorTree {
    const INVALIDATED_BY: Invalidation = Invalidation::BRANCHES;

    fn compute(func: &Function, _options: &PassOptions) -> Self {
        PostDominatorTree::build(func)
    }
}

impl Analysis for DeadEndBlocks {
    const INVALIDATED_BY: Invalidation = Invalidation::BRANCHES;

    fn compute(func: &Function, _options: &PassOptions) -> Self {
        DeadEndBlocks::build(func)
    }
}
