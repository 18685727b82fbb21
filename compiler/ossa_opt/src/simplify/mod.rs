//! Peephole simplification.
//!
//! Every rule here matches a producer/consumer pair and replaces the
//! consumer with something the producer already had at hand, deleting the
//! producer too when the consumer was its only user. The shared gate lives
//! in [`try_replace_redundant_instruction_pair`]:
//!
//! 1. The producer may be erased only if the consumer is its sole use
//!    (ignoring debug uses unless debug info is being preserved).
//! 2. If the producer must stay and the replacement is owned, the rewrite
//!    is abandoned: routing another use to an owned value would consume it
//!    twice.
//!
//! Case targets a rewritten `switch_enum` no longer reaches are left to
//! dead block elimination.

use smallvec::SmallVec;

use ossa_ir::{Builder, Context, InstId, InstKind, ValueId};

use crate::pass::FunctionPass;

/// Is `consumer` the only user of `value`?
///
/// Debug users count only when the context preserves debug info.
fn is_sole_consumer(ctx: &Context<'_>, value: ValueId, consumer: InstId) -> bool {
    let uses = ctx.function().uses(value);
    let single = if ctx.preserve_debug_info() {
        uses.single_use()
    } else {
        uses.single_non_debug_use()
    };
    single.is_some_and(|op| op.inst() == consumer)
}

/// Gate and tail shared by all pair rules.
///
/// `rewrite` runs after the gate passes and before `second` is erased; it
/// must leave `second` without result uses.
fn replace_instruction_pair(
    ctx: &mut Context<'_>,
    first: InstId,
    second: InstId,
    blocks_if_kept: bool,
    rewrite: impl FnOnce(&mut Context<'_>),
) -> bool {
    let Some(produced) = ctx.function().result(first) else {
        return false;
    };
    let can_erase_first = is_sole_consumer(ctx, produced, second);
    if !can_erase_first && blocks_if_kept {
        return false;
    }
    rewrite(ctx);
    ctx.erase_instruction(second);
    if can_erase_first {
        ctx.erase_instruction_with_debug_uses(first);
    }
    true
}

/// Replace `second` by `replacement`, erasing `first` as well when
/// `second` was its only user.
///
/// Returns `false` (IR untouched) when `first` has other users and
/// `replacement` is owned.
pub fn try_replace_redundant_instruction_pair(
    ctx: &mut Context<'_>,
    first: InstId,
    second: InstId,
    replacement: ValueId,
) -> bool {
    let owned = ctx.function().value_ownership(replacement).is_owned();
    replace_instruction_pair(ctx, first, second, owned, |ctx| {
        if let Some(result) = ctx.function().result(second) {
            ctx.replace_all_uses_with(result, replacement);
        }
    })
}

// ── Rules ───────────────────────────────────────────────────────────

/// `switch_enum (enum #case, payload)` becomes `br target(payload)`.
///
/// Leaves the IR untouched when the folded branch could not carry the
/// payload: the target takes no argument while the payload is owned, or
/// takes one while the enum has none.
///
/// # Panics
///
/// Panics if the matched target takes more than one argument.
pub fn simplify_switch_enum(ctx: &mut Context<'_>, switch: InstId) -> bool {
    let func = ctx.function();
    let InstKind::SwitchEnum { .. } = func.inst_kind(switch) else {
        return false;
    };
    let Some(scrutinee) = func.operands(switch).next() else {
        return false;
    };
    let Some(enum_inst) = func.defining_inst(scrutinee) else {
        return false;
    };
    let InstKind::Enum { case } = *func.inst_kind(enum_inst) else {
        return false;
    };
    let Some(target) = func.inst_kind(switch).switch_target(case) else {
        return false;
    };
    let payload = func.operands(enum_inst).next();
    let enum_owned = func.value_ownership(scrutinee).is_owned();
    let arity = func.block_args(target).len();

    let args: SmallVec<[ValueId; 1]> = match arity {
        0 if payload.is_some_and(|p| func.value_ownership(p).is_owned()) => return false,
        0 => SmallVec::new(),
        1 => match payload {
            Some(payload) => SmallVec::from_elem(payload, 1),
            None => return false,
        },
        n => panic!("{switch}: case block {target} takes {n} arguments"),
    };

    let changed = replace_instruction_pair(ctx, enum_inst, switch, enum_owned, |ctx| {
        Builder::before(ctx, switch).create_branch(target, &args);
    });
    if changed {
        tracing::trace!(%switch, %target, "switch_enum of enum folded to br");
    }
    changed
}

/// `unchecked_enum_data (enum #case, payload), #case` becomes `payload`.
pub fn simplify_unchecked_enum_data(ctx: &mut Context<'_>, inst: InstId) -> bool {
    let func = ctx.function();
    let InstKind::UncheckedEnumData { case } = *func.inst_kind(inst) else {
        return false;
    };
    let Some(operand) = func.operands(inst).next() else {
        return false;
    };
    let Some(enum_inst) = func.defining_inst(operand) else {
        return false;
    };
    if *func.inst_kind(enum_inst) != (InstKind::Enum { case }) {
        return false;
    }
    let Some(payload) = func.operands(enum_inst).next() else {
        return false;
    };
    try_replace_redundant_instruction_pair(ctx, enum_inst, inst, payload)
}

/// `struct_extract (struct fields...), #n` becomes `fields[n]` for
/// aggregates that are not owned.
pub fn simplify_struct_extract(ctx: &mut Context<'_>, inst: InstId) -> bool {
    let func = ctx.function();
    let InstKind::StructExtract { field } = *func.inst_kind(inst) else {
        return false;
    };
    let Some(aggregate) = func.operands(inst).next() else {
        return false;
    };
    if func.value_ownership(aggregate).is_owned() {
        return false;
    }
    let Some(struct_inst) = func.defining_inst(aggregate) else {
        return false;
    };
    if !matches!(func.inst_kind(struct_inst), InstKind::Struct) {
        return false;
    }
    let Some(value) = func.operands(struct_inst).nth(field as usize) else {
        return false;
    };
    try_replace_redundant_instruction_pair(ctx, struct_inst, inst, value)
}

/// `destroy_value (copy_value x)` disappears when the copy has no other
/// user.
pub fn simplify_destroy_of_copy(ctx: &mut Context<'_>, destroy: InstId) -> bool {
    let func = ctx.function();
    if !matches!(func.inst_kind(destroy), InstKind::DestroyValue) {
        return false;
    }
    let Some(copied) = func.operands(destroy).next() else {
        return false;
    };
    let Some(copy) = func.defining_inst(copied) else {
        return false;
    };
    if !matches!(func.inst_kind(copy), InstKind::CopyValue) {
        return false;
    }
    // The destroy has no result to redirect, so the copy must go with it.
    replace_instruction_pair(ctx, copy, destroy, true, |_| {})
}

/// Try every rule on `inst`.
pub fn simplify_instruction(ctx: &mut Context<'_>, inst: InstId) -> bool {
    match ctx.function().inst_kind(inst) {
        InstKind::SwitchEnum { .. } => simplify_switch_enum(ctx, inst),
        InstKind::UncheckedEnumData { .. } => simplify_unchecked_enum_data(ctx, inst),
        InstKind::StructExtract { .. } => simplify_struct_extract(ctx, inst),
        InstKind::DestroyValue => simplify_destroy_of_copy(ctx, inst),
        _ => false,
    }
}

/// Apply the rules until nothing changes or `max_iterations` sweeps have
/// run. Returns `true` if anything changed.
pub fn simplify_function(ctx: &mut Context<'_>, max_iterations: usize) -> bool {
    let mut any_change = false;
    let mut rewrites = 0usize;
    let mut iterations = 0usize;
    while iterations < max_iterations {
        iterations += 1;
        let func = ctx.function();
        let insts: Vec<InstId> = func.blocks().flat_map(move |b| func.insts(b)).collect();
        let mut changed = false;
        for inst in insts {
            if ctx.function().inst_block(inst).is_some() && simplify_instruction(ctx, inst) {
                changed = true;
                rewrites += 1;
            }
        }
        if !changed {
            break;
        }
        any_change = true;
    }
    tracing::debug!(
        function = ctx.module().function_name(ctx.func_id()),
        rewrites,
        iterations,
        "simplification complete"
    );
    any_change
}

/// The simplification rules as a pipeline pass.
pub struct Simplification {
    max_iterations: usize,
}

impl Simplification {
    pub fn new(max_iterations: usize) -> Self {
        Simplification { max_iterations }
    }
}

impl FunctionPass for Simplification {
    fn name(&self) -> &'static str {
        "simplify"
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> bool {
        simplify_function(ctx, self.max_iterations)
    }
}

#[cfg(test)]
mod tests;
