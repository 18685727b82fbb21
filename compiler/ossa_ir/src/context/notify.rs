//! Change notifications and their coalesced record.

use bitflags::bitflags;

use crate::ids::FuncId;

bitflags! {
    /// Kinds of change a mutation can make, as seen by cached analyses.
    ///
    /// An [`Analysis`](crate::Analysis) declares the kinds it depends on;
    /// a notification of any of them evicts it from the cache.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Invalidation: u8 {
        /// Instructions were added, removed or rewired.
        const INSTRUCTIONS = 1 << 0;
        /// Call sites or callees changed.
        const CALLS = 1 << 1;
        /// The CFG changed: blocks, terminators, edges.
        const BRANCHES = 1 << 2;
        /// Memory or side effects of existing instructions changed.
        const EFFECTS = 1 << 3;
    }
}

/// One change message emitted by a mutator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Notification {
    InstructionsChanged,
    CallsChanged,
    BranchesChanged,
    EffectsChanged,
    /// The function now references another function of the module.
    DependencyOn(FuncId),
}

impl Notification {
    /// The invalidation kind carried by this message (empty for
    /// dependency messages).
    pub fn invalidation(self) -> Invalidation {
        match self {
            Notification::InstructionsChanged => Invalidation::INSTRUCTIONS,
            Notification::CallsChanged => Invalidation::CALLS,
            Notification::BranchesChanged => Invalidation::BRANCHES,
            Notification::EffectsChanged => Invalidation::EFFECTS,
            Notification::DependencyOn(_) => Invalidation::empty(),
        }
    }
}

/// Everything a pass run changed, returned by
/// [`Context::finish`](crate::Context::finish).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub changed: Invalidation,
    /// Functions referenced by newly created instructions, deduplicated,
    /// in first-reference order.
    pub dependencies: Vec<FuncId>,
}

impl ChangeSummary {
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty() && self.dependencies.is_empty()
    }
}
