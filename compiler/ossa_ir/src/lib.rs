//! Ownership SSA IR for the mid-level optimizer.
//!
//! This crate provides:
//!
//! - **Data model** ([`Module`], [`Function`], [`InstKind`]) - a CFG of
//!   basic blocks with block arguments, use-def chains and per-value
//!   [`Ownership`] tags. Entities live in per-function arenas and are
//!   referenced by handles ([`BlockId`], [`InstId`], [`ValueId`]) that
//!   remember their owning function.
//!
//! - **Mutation context** ([`Context`]) - the single gateway for
//!   structural edits. Each edit emits a coalesced [`Notification`] that
//!   evicts the cached analyses depending on it.
//!
//! - **Builder** ([`Builder`]) - insertion cursor that creates instructions
//!   with inherited spans and derived result ownership.
//!
//! - **Analyses** ([`DominatorTree`], [`PostDominatorTree`],
//!   [`DeadEndBlocks`]) computed lazily through [`Context::analysis`].
//!
//! - **Verifier** ([`verify_function`]) for structural and
//!   ownership-balance invariants.
//!
//! # Ownership discipline
//!
//! An `owned` value must be consumed exactly once on every path from its
//! definition to a `return`. Mutators never insert copies or destroys on
//! their own; a pass that adds a consuming use must compensate
//! explicitly. Invariant violations (mutating a foreign function, erasing
//! a still-used instruction, inserting across a critical edge) panic.

pub mod analysis;
pub mod builder;
pub mod context;
pub mod function;
pub mod graph;
mod ids;
pub mod inst;
pub mod module;
mod name;
mod options;
mod ownership;
mod span;
mod ty;
pub mod verify;
pub mod worklist;

pub use analysis::{Analysis, DeadEndBlocks, DominatorTree, PostDominatorTree};
pub use builder::Builder;
pub use context::{ChangeSummary, Context, Invalidation, Notification};
pub use function::{Function, FunctionKind, InsertionPoint, UseList, ValueDef};
pub use ids::{BlockId, FuncId, GlobalId, InstId, OperandId, ValueId};
pub use inst::{BinaryOp, Capabilities, InstKind, LoadQualifier, StoreQualifier};
pub use module::{Global, Module};
pub use name::{Interner, Name};
pub use options::{EscapeConfig, PassOptions};
pub use ownership::{OperandOwnership, Ownership};
pub use span::Span;
pub use ty::Ty;
pub use verify::{verify_function, VerifyError};
pub use worklist::{BlockSet, BlockWorklist, InstWorklist, ValueWorklist, Worklist};

#[cfg(test)]
mod test_helpers;
