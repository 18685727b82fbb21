//! Dead block and dead instruction elimination.

use ossa_ir::graph::reachable_blocks;
use ossa_ir::{BlockId, Capabilities, Context, Function, InstId, InstKind, LoadQualifier, ValueId};

use crate::pass::FunctionPass;

// ── Dead blocks ─────────────────────────────────────────────────────

/// Delete every block not reachable from the entry.
///
/// Values defined in a dead block first have their remaining uses
/// rewritten to undef (uses can only come from other dead blocks), so
/// the blocks can then be torn down in any order without dangling
/// operands.
pub fn remove_unreachable_blocks(ctx: &mut Context<'_>) -> bool {
    let func = ctx.function();
    let reachable = reachable_blocks(func);
    let dead: Vec<BlockId> = func.blocks().filter(|&b| !reachable.contains(b)).collect();
    if dead.is_empty() {
        return false;
    }

    let defined: Vec<ValueId> = dead
        .iter()
        .flat_map(move |&b| {
            let args = func.block_args(b).iter().copied();
            let results = func
                .insts(b)
                .flat_map(move |i| func.results(i).iter().copied());
            args.chain(results)
        })
        .collect();
    for value in defined {
        if ctx.function().uses(value).is_empty() {
            continue;
        }
        let ty = ctx.function().value_ty(value);
        let undef = ctx.undef(ty);
        ctx.replace_all_uses_with(value, undef);
    }

    // Terminators go with their blocks, so by the time a block is removed
    // its dead predecessors no longer branch to it.
    for &block in &dead {
        let insts: Vec<InstId> = ctx.function().insts_rev(block).collect();
        for inst in insts {
            ctx.erase_instruction(inst);
        }
    }
    for &block in &dead {
        ctx.erase_block(block);
    }

    tracing::debug!(
        function = ctx.module().function_name(ctx.func_id()),
        removed = dead.len(),
        "removed unreachable blocks"
    );
    true
}

// ── Dead instructions ───────────────────────────────────────────────

/// Can `inst` be deleted without changing behavior?
///
/// It must have no remaining uses (debug uses count only when
/// `preserve_debug_info` is set), no side effects, and must not be a
/// terminator, a debug or marker instruction, a scope opener, or a
/// consumer of an owned operand.
pub fn is_trivially_dead(func: &Function, inst: InstId, preserve_debug_info: bool) -> bool {
    let kind = func.inst_kind(inst);
    if kind.has_side_effects()
        || kind
            .capabilities()
            .intersects(Capabilities::DEBUG | Capabilities::MARKER)
    {
        return false;
    }
    // Look pure, but deleting them unbalances a scope or memory state.
    if matches!(
        kind,
        InstKind::AllocStack | InstKind::BeginBorrow | InstKind::Load(LoadQualifier::Take)
    ) {
        return false;
    }
    if func.operand_ids(inst).any(|op| func.is_lifetime_ending(op)) {
        return false;
    }
    func.results(inst).iter().all(|&r| {
        let uses = func.uses(r);
        if preserve_debug_info {
            uses.is_empty()
        } else {
            !uses.has_non_debug_uses()
        }
    })
}

/// Delete trivially dead instructions, walking each block backwards so
/// that a producer whose last consumer was just deleted is seen next.
pub fn eliminate_dead_instructions(ctx: &mut Context<'_>) -> bool {
    let preserve = ctx.preserve_debug_info();
    let blocks: Vec<BlockId> = ctx.function().blocks().collect();
    let mut erased = 0usize;
    for block in blocks {
        let mut cursor = ctx.function().last_inst(block);
        while let Some(inst) = cursor {
            cursor = ctx.function().prev_inst(inst);
            if is_trivially_dead(ctx.function(), inst, preserve) {
                ctx.erase_instruction_with_debug_uses(inst);
                erased += 1;
            }
        }
    }
    if erased > 0 {
        tracing::debug!(
            function = ctx.module().function_name(ctx.func_id()),
            erased,
            "removed dead instructions"
        );
    }
    erased > 0
}

/// Dead blocks first, then dead instructions.
pub fn eliminate_dead_code(ctx: &mut Context<'_>) -> bool {
    let blocks = remove_unreachable_blocks(ctx);
    let insts = eliminate_dead_instructions(ctx);
    blocks || insts
}

/// [`eliminate_dead_code`] as a pipeline pass.
pub struct DeadCodeElimination;

impl FunctionPass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> bool {
        eliminate_dead_code(ctx)
    }
}
