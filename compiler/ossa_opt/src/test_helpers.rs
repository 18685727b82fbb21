//! Shared test utilities for the optimizer crate.
//!
//! Only compiled in test builds.

use ossa_ir::{verify_function, BlockId, FuncId, Function, InstKind, Module, Ty};

/// A non-trivial enum type.
pub(crate) fn enum_ty() -> Ty {
    Ty::Enum { trivial: false }
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

/// Kinds of every instruction, block by block.
pub(crate) fn all_kinds(func: &Function) -> Vec<Vec<InstKind>> {
    func.blocks().map(|b| kinds(func, b)).collect()
}

/// Panic with the verifier's message if `f` is malformed.
#[track_caller]
pub(crate) fn assert_verifies(module: &Module, f: FuncId) {
    if let Err(err) = verify_function(module.function(f)) {
        panic!("{} failed verification: {err}", module.function_name(f));
    }
}
