//! Shared test utilities for the IR crate.
//!
//! Only compiled in test builds.

use crate::builder::Builder;
use crate::context::Context;
use crate::function::Function;
use crate::ids::{BlockId, FuncId, InstId};
use crate::inst::{BinaryOp, InstKind};
use crate::module::Module;
use crate::ty::Ty;

/// A non-trivial enum type.
pub(crate) fn enum_ty() -> Ty {
    Ty::Enum { trivial: false }
}

/// Instructions of `block` whose kind satisfies `pred`.
pub(crate) fn find_insts(
    func: &Function,
    block: BlockId,
    pred: impl Fn(&InstKind) -> bool,
) -> Vec<InstId> {
    func.insts(block)
        .filter(|&i| pred(func.inst_kind(i)))
        .collect()
}

/// Number of instructions in the whole function satisfying `pred`.
pub(crate) fn count_insts(func: &Function, pred: impl Fn(&InstKind) -> bool) -> usize {
    func.blocks()
        .map(|b| func.insts(b).filter(|&i| pred(func.inst_kind(i))).count())
        .sum()
}

/// Kinds of `block`'s instructions, in order.
pub(crate) fn kinds(func: &Function, block: BlockId) -> Vec<InstKind> {
    func.insts(block).map(|i| func.inst_kind(i).clone()).collect()
}

/// Build a function whose CFG is given as successor lists, one per block
/// (block 0 is the entry). Zero successors ends in `return`, one in `br`,
/// two in `cond_br` on a constant.
pub(crate) fn build_cfg(
    module: &mut Module,
    succs: &[&[usize]],
) -> (FuncId, Vec<BlockId>) {
    let f = module.add_function("cfg");
    let mut ctx = Context::new(module, f);
    let blocks: Vec<BlockId> = succs.iter().map(|_| ctx.create_block()).collect();
    for (i, targets) in succs.iter().enumerate() {
        let mut b = Builder::at_end(&mut ctx, blocks[i]);
        match targets {
            [] => {
                b.create_return(None);
            }
            [t] => {
                b.create_branch(blocks[*t], &[]);
            }
            [t, e] => {
                let one = b.create_int_literal(1);
                let cond = b.create_binary(BinaryOp::Eq, one, one);
                b.create_cond_branch(cond, blocks[*t], blocks[*e]);
            }
            _ => panic!("at most two successors per block"),
        }
    }
    (f, blocks)
}
