//! Structural and ownership verifier.
//!
//! Used by the pass manager after each pass (when enabled) and by tests to
//! check that transformations keep the IR well formed. Only blocks
//! reachable from the entry are held to the terminator rules; unreachable
//! scratch blocks may be mid-construction.
//!
//! # Ownership balance
//!
//! For each owned value the verifier runs a forward dataflow from its
//! definition with a two-point state per block entry, *live* or
//! *consumed*:
//!
//! - a lifetime-ending use while live moves the state to consumed; while
//!   consumed it is an over-consumption,
//! - any other real use while consumed is a use after consume,
//! - reaching a `return` while live is a leak (reaching `unreachable` is
//!   not: dead ends may leak),
//! - flowing back into the defining block while live is a leak (the next
//!   iteration redefines the value),
//! - two different states meeting at a block entry is a partial
//!   consumption.
//!
//! Leaks are reported only after the walk settles, so a partial
//! consumption further down is reported in preference to the leak it
//! implies.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::function::{Function, FunctionKind, ValueDef};
use crate::graph::reachable_blocks;
use crate::ids::{BlockId, InstId, ValueId};
use crate::inst::InstKind;
use crate::ownership::OperandOwnership;
use crate::worklist::BlockSet;

/// A violated IR invariant.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("{block} has no terminator")]
    MissingTerminator { block: BlockId },

    #[error("terminator {inst} is not the last instruction of {block}")]
    TerminatorNotLast { block: BlockId, inst: InstId },

    #[error("predecessor list of {block} does not match the CFG")]
    PredecessorMismatch { block: BlockId },

    #[error("{inst} passes the wrong number of arguments to {block}")]
    ArgumentCount { inst: InstId, block: BlockId },

    #[error("{inst} uses {value} whose definition was erased")]
    DanglingUse { inst: InstId, value: ValueId },

    #[error("{inst} uses {value} of another function")]
    ForeignValue { inst: InstId, value: ValueId },

    #[error("owned value {value} is not consumed on a path through {block}")]
    Leaked { value: ValueId, block: BlockId },

    #[error("owned value {value} is consumed again by {inst}")]
    OverConsumed { value: ValueId, inst: InstId },

    #[error("{inst} uses {value} after it was consumed")]
    UseAfterConsume { value: ValueId, inst: InstId },

    #[error("owned value {value} is consumed on some but not all paths into {block}")]
    PartiallyConsumed { value: ValueId, block: BlockId },
}

/// Verify structure and, for regular functions, ownership balance.
pub fn verify_function(func: &Function) -> Result<(), VerifyError> {
    verify_operands(func)?;
    verify_predecessors(func)?;
    if func.kind() != FunctionKind::Regular {
        return Ok(());
    }
    let reachable = reachable_blocks(func);
    verify_terminators(func, &reachable)?;
    verify_ownership(func, &reachable)
}

// ── Structure ───────────────────────────────────────────────────────

fn verify_operands(func: &Function) -> Result<(), VerifyError> {
    for block in func.blocks() {
        for inst in func.insts(block) {
            for value in func.operands(inst) {
                if value.func() != func.id() {
                    return Err(VerifyError::ForeignValue { inst, value });
                }
                let defined = match func.value_def(value) {
                    ValueDef::Result { inst: def, .. } => func.inst_block(def).is_some(),
                    ValueDef::BlockArg { block, .. } => func.is_live_block(block),
                    ValueDef::Undef => true,
                };
                if !defined {
                    return Err(VerifyError::DanglingUse { inst, value });
                }
            }
        }
    }
    Ok(())
}

fn verify_predecessors(func: &Function) -> Result<(), VerifyError> {
    let mut expected: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
    for block in func.blocks() {
        for succ in func.successors(block) {
            expected.entry(succ).or_default().push(block);
        }
    }
    for block in func.blocks() {
        let mut actual = func.predecessors(block).to_vec();
        let mut want = expected.remove(&block).unwrap_or_default();
        actual.sort_unstable();
        want.sort_unstable();
        if actual != want {
            return Err(VerifyError::PredecessorMismatch { block });
        }
    }
    Ok(())
}

fn verify_terminators(func: &Function, reachable: &BlockSet) -> Result<(), VerifyError> {
    for block in func.blocks().filter(|&b| reachable.contains(b)) {
        let Some(term) = func.terminator(block) else {
            return Err(VerifyError::MissingTerminator { block });
        };
        if let Some(inst) = func
            .insts(block)
            .find(|&i| i != term && func.inst_kind(i).is_terminator())
        {
            return Err(VerifyError::TerminatorNotLast { block, inst });
        }
        match func.inst_kind(term) {
            InstKind::Branch { target } => {
                if func.operands(term).len() != func.block_args(*target).len() {
                    return Err(VerifyError::ArgumentCount {
                        inst: term,
                        block: *target,
                    });
                }
            }
            InstKind::SwitchEnum { cases, default } => {
                let too_many = cases
                    .iter()
                    .map(|&(_, b)| b)
                    .find(|&b| func.block_args(b).len() > 1)
                    .or(default.filter(|&d| !func.block_args(d).is_empty()));
                if let Some(block) = too_many {
                    return Err(VerifyError::ArgumentCount { inst: term, block });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ── Ownership ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Liveness {
    Live,
    Consumed,
}

fn verify_ownership(func: &Function, reachable: &BlockSet) -> Result<(), VerifyError> {
    for block in func.blocks().filter(|&b| reachable.contains(b)) {
        for &arg in func.block_args(block) {
            if func.value_ownership(arg).is_owned() {
                check_owned_value(func, arg, block, None)?;
            }
        }
        for inst in func.insts(block) {
            for &result in func.results(inst) {
                if func.value_ownership(result).is_owned() {
                    check_owned_value(func, result, block, Some(inst))?;
                }
            }
        }
    }
    Ok(())
}

/// Dataflow for one owned value defined in `def_block` (after `def_inst`,
/// or at block entry for arguments).
fn check_owned_value(
    func: &Function,
    value: ValueId,
    def_block: BlockId,
    def_inst: Option<InstId>,
) -> Result<(), VerifyError> {
    let mut entry_state: FxHashMap<BlockId, Liveness> = FxHashMap::default();
    let mut leak = None;
    let mut worklist: Vec<(BlockId, Option<InstId>, Liveness)> = vec![(
        def_block,
        def_inst.map_or_else(|| func.first_inst(def_block), |i| func.next_inst(i)),
        Liveness::Live,
    )];

    while let Some((block, start, mut state)) = worklist.pop() {
        let mut cursor = start;
        while let Some(inst) = cursor {
            cursor = func.next_inst(inst);
            for op in func.operand_ids(inst) {
                if func.operand_value(op) != value {
                    continue;
                }
                if func.is_lifetime_ending(op) {
                    if state == Liveness::Consumed {
                        return Err(VerifyError::OverConsumed { value, inst });
                    }
                    state = Liveness::Consumed;
                } else if state == Liveness::Consumed
                    && func.operand_ownership(op) != OperandOwnership::NonUse
                {
                    return Err(VerifyError::UseAfterConsume { value, inst });
                }
            }
        }

        let Some(term) = func.terminator(block) else {
            continue;
        };
        let succs = func.successors(block);
        if succs.is_empty() {
            if state == Liveness::Live && matches!(func.inst_kind(term), InstKind::Return) {
                leak.get_or_insert(VerifyError::Leaked { value, block });
            }
            continue;
        }
        for succ in succs {
            if succ == def_block {
                if state == Liveness::Live {
                    leak.get_or_insert(VerifyError::Leaked { value, block });
                }
                continue;
            }
            match entry_state.get(&succ) {
                Some(&seen) if seen == state => {}
                Some(_) => {
                    return Err(VerifyError::PartiallyConsumed { value, block: succ });
                }
                None => {
                    entry_state.insert(succ, state);
                    worklist.push((succ, func.first_inst(succ), state));
                }
            }
        }
    }
    leak.map_or(Ok(()), Err)
}
