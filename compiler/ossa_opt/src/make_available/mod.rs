//! Extending an owned value into a block it dominates.
//!
//! [`make_available`] takes a fresh owned value (no uses yet) and a
//! destination block, and balances the value's lifetime so the caller
//! can consume it there:
//!
//! - the *use-to-def range* is the [`BasicBlockRange`] from the defining
//!   block to the destination,
//! - every edge leaving the range gets a `destroy_value` (on a split edge
//!   when the target has other predecessors),
//! - if the destination lies inside the exclusive range it sits on a
//!   cycle that comes back to it before leaving, so it receives a copy
//!   per iteration and the original is left to the exit destroys.

mod block_range;

pub use block_range::BasicBlockRange;

use ossa_ir::{BlockId, Builder, Context, ValueId};

/// Make the owned `value` consumable in `dest`. Returns the value the
/// caller must consume there: `value` itself, or a copy of it made at the
/// start of `dest`.
///
/// # Panics
///
/// Panics if `value` is not owned, already has uses, or is not defined in
/// a block dominating `dest`.
pub fn make_available(ctx: &mut Context<'_>, value: ValueId, dest: BlockId) -> ValueId {
    let func = ctx.function();
    assert!(
        func.value_ownership(value).is_owned(),
        "make_available: {value} is not owned"
    );
    assert!(
        func.uses(value).is_empty(),
        "make_available: {value} already has uses"
    );
    let begin = func
        .value_block(value)
        .unwrap_or_else(|| panic!("make_available: {value} is not defined in a block"));
    if begin == dest {
        return value;
    }
    let dominators = ctx.dominators();
    assert!(
        dominators.dominates(begin, dest),
        "make_available: {begin} does not dominate {dest}"
    );

    let func = ctx.function();
    let mut range = BasicBlockRange::new(func, begin);
    range.insert(func, dest);
    let exits = range.exits(func);
    let in_cycle = range.contains(dest);

    for &(from, to) in &exits {
        // Coming back to `begin` always needs its own block: the value is
        // not yet defined at `begin`'s start on the first visit.
        let at = if to != begin && ctx.function().predecessors(to).len() == 1 {
            to
        } else {
            ctx.split_edge(from, to)
        };
        Builder::at_start(ctx, at).create_destroy_value(value);
    }

    let available = if in_cycle {
        Builder::at_start(ctx, dest).create_copy_value(value)
    } else {
        value
    };
    tracing::debug!(
        function = ctx.module().function_name(ctx.func_id()),
        %value,
        %dest,
        exits = exits.len(),
        copied = in_cycle,
        "made value available"
    );
    available
}

#[cfg(test)]
mod tests;
