//! Instruction kinds and their capability surface.
//!
//! The instruction set is a closed sum type. Passes never test for
//! "kinds of kinds" by listing variants; they ask the kind for a
//! [`Capabilities`] set or for the [`OperandOwnership`] of an operand slot,
//! so adding a variant forces every capability table below to be updated
//! (the matches are exhaustive).

use bitflags::bitflags;
use smallvec::{smallvec, SmallVec};

use crate::ids::{BlockId, FuncId, GlobalId};
use crate::ownership::OperandOwnership;

/// Binary arithmetic and comparison operators on trivial values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Eq,
    Lt,
}

/// How a `load` treats the loaded value's ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadQualifier {
    /// Copy out; the memory keeps its value. Result is owned.
    Copy,
    /// Move out; the memory is left uninitialized. Result is owned.
    Take,
    /// Trivial load, no ownership.
    Trivial,
}

/// How a `store` treats the stored value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreQualifier {
    /// Initialize memory, consuming the stored value.
    Init,
    /// Trivial store, no ownership.
    Trivial,
}

bitflags! {
    /// Capability set of an instruction kind.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u16 {
        /// Ends a block and names its successors.
        const TERMINATOR = 1 << 0;
        /// Passes the ownership of (some) operands on to its result.
        const FORWARDS_OWNERSHIP = 1 << 1;
        const READS_MEMORY = 1 << 2;
        const WRITES_MEMORY = 1 << 3;
        /// A call site.
        const CALL = 1 << 4;
        /// Debug-info tracking only.
        const DEBUG = 1 << 5;
        /// Lifetime or scope marker with no computational content.
        const MARKER = 1 << 6;
        /// Allocates memory.
        const ALLOCATES = 1 << 7;
        /// Has effects not described by the memory flags (deinit, traps,
        /// scope ends, calls into unknown code).
        const SIDE_EFFECTS = 1 << 8;
    }
}

/// The opcode of an instruction, with its immediate (non-operand) payload.
///
/// Operand counts per kind:
/// - `IntLiteral`, `AllocStack`, `AllocRef`, `GlobalAddr`, `FunctionRef`,
///   `Unreachable`: none
/// - `Binary`, `Store` (`[src, dest]`): two
/// - `Struct`: one per field
/// - `Enum`: zero or one (the payload)
/// - `Apply`: the callee, then the arguments
/// - `Return`: zero or one
/// - `Branch`: one per target block argument
/// - everything else: one
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InstKind {
    // ── Values ──────────────────────────────────────────────────
    IntLiteral(i64),
    Binary(BinaryOp),
    /// Aggregate construction from field values.
    Struct,
    /// Project a field out of a struct value.
    StructExtract { field: u32 },
    /// Tagged-union construction.
    Enum { case: u32 },
    /// Extract the payload of a known case.
    UncheckedEnumData { case: u32 },
    /// Reference upcast; forwards ownership.
    Upcast,
    CopyValue,
    BeginBorrow,
    EndBorrow,
    DestroyValue,

    // ── Memory ──────────────────────────────────────────────────
    AllocStack,
    DeallocStack,
    AllocRef,
    /// Address of a field of the memory at the operand address.
    FieldAddr { field: u32 },
    GlobalAddr(GlobalId),
    Load(LoadQualifier),
    Store(StoreQualifier),

    // ── Calls ───────────────────────────────────────────────────
    FunctionRef(FuncId),
    Apply,

    // ── Debug & markers ─────────────────────────────────────────
    DebugValue,
    FixLifetime,

    // ── Terminators ─────────────────────────────────────────────
    Return,
    Branch {
        target: BlockId,
    },
    CondBranch {
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Dispatch on the case of an enum operand. A case block takes the
    /// payload as its single argument, or no argument for payload-less
    /// cases. The default block takes no arguments.
    SwitchEnum {
        cases: SmallVec<[(u32, BlockId); 4]>,
        default: Option<BlockId>,
    },
    Unreachable,
}

impl InstKind {
    /// Capability set of this kind.
    pub fn capabilities(&self) -> Capabilities {
        type C = Capabilities;
        match self {
            InstKind::IntLiteral(_)
            | InstKind::Binary(_)
            | InstKind::StructExtract { .. }
            | InstKind::FieldAddr { .. }
            | InstKind::GlobalAddr(_)
            | InstKind::FunctionRef(_)
            | InstKind::CopyValue
            | InstKind::BeginBorrow => C::empty(),
            InstKind::Struct
            | InstKind::Enum { .. }
            | InstKind::UncheckedEnumData { .. }
            | InstKind::Upcast => C::FORWARDS_OWNERSHIP,
            InstKind::EndBorrow => C::MARKER | C::SIDE_EFFECTS,
            InstKind::DestroyValue => C::WRITES_MEMORY | C::SIDE_EFFECTS,
            InstKind::AllocStack => C::ALLOCATES,
            InstKind::DeallocStack => C::WRITES_MEMORY | C::SIDE_EFFECTS,
            InstKind::AllocRef => C::ALLOCATES | C::WRITES_MEMORY,
            InstKind::Load(_) => C::READS_MEMORY,
            InstKind::Store(_) => C::WRITES_MEMORY,
            InstKind::Apply => {
                C::CALL | C::READS_MEMORY | C::WRITES_MEMORY | C::SIDE_EFFECTS
            }
            InstKind::DebugValue => C::DEBUG,
            InstKind::FixLifetime => C::MARKER | C::SIDE_EFFECTS,
            InstKind::Return | InstKind::Branch { .. } | InstKind::SwitchEnum { .. } => {
                C::TERMINATOR | C::FORWARDS_OWNERSHIP
            }
            InstKind::CondBranch { .. } => C::TERMINATOR,
            InstKind::Unreachable => C::TERMINATOR | C::SIDE_EFFECTS,
        }
    }

    #[inline]
    pub fn is_terminator(&self) -> bool {
        self.capabilities().contains(Capabilities::TERMINATOR)
    }

    #[inline]
    pub fn is_call(&self) -> bool {
        self.capabilities().contains(Capabilities::CALL)
    }

    #[inline]
    pub fn is_debug(&self) -> bool {
        self.capabilities().contains(Capabilities::DEBUG)
    }

    #[inline]
    pub fn forwards_ownership(&self) -> bool {
        self.capabilities().contains(Capabilities::FORWARDS_OWNERSHIP)
    }

    #[inline]
    pub fn may_read_memory(&self) -> bool {
        self.capabilities().contains(Capabilities::READS_MEMORY)
    }

    #[inline]
    pub fn may_write_memory(&self) -> bool {
        self.capabilities().contains(Capabilities::WRITES_MEMORY)
    }

    /// Returns `true` if removing the instruction could change observable
    /// behavior even when its results are unused.
    pub fn has_side_effects(&self) -> bool {
        self.capabilities().intersects(
            Capabilities::WRITES_MEMORY | Capabilities::SIDE_EFFECTS | Capabilities::TERMINATOR,
        )
    }

    /// What this instruction does with operand `index`.
    pub fn operand_ownership(&self, index: usize) -> OperandOwnership {
        type O = OperandOwnership;
        match self {
            InstKind::DebugValue => O::NonUse,
            InstKind::DestroyValue => O::DestroyingConsume,
            InstKind::Struct
            | InstKind::Enum { .. }
            | InstKind::UncheckedEnumData { .. }
            | InstKind::Upcast
            | InstKind::Return
            | InstKind::Branch { .. }
            | InstKind::SwitchEnum { .. } => O::ForwardingConsume,
            InstKind::Store(StoreQualifier::Init) if index == 0 => O::ForwardingConsume,
            InstKind::Apply if index > 0 => O::ForwardingConsume,
            InstKind::StructExtract { .. } | InstKind::BeginBorrow => O::Borrow,
            InstKind::IntLiteral(_)
            | InstKind::Binary(_)
            | InstKind::CopyValue
            | InstKind::EndBorrow
            | InstKind::AllocStack
            | InstKind::DeallocStack
            | InstKind::AllocRef
            | InstKind::FieldAddr { .. }
            | InstKind::GlobalAddr(_)
            | InstKind::Load(_)
            | InstKind::Store(_)
            | InstKind::FunctionRef(_)
            | InstKind::Apply
            | InstKind::FixLifetime
            | InstKind::CondBranch { .. }
            | InstKind::Unreachable => O::InstantaneousUse,
        }
    }

    /// Successor blocks named by a terminator, in edge order (duplicates
    /// kept: a `cond_br` to the same block twice has two edges).
    ///
    /// Returns an empty list for non-terminators.
    pub fn successors(&self) -> SmallVec<[BlockId; 4]> {
        match self {
            InstKind::Branch { target } => smallvec![*target],
            InstKind::CondBranch {
                then_block,
                else_block,
            } => smallvec![*then_block, *else_block],
            InstKind::SwitchEnum { cases, default } => {
                let mut targets = SmallVec::with_capacity(cases.len() + 1);
                for &(_, b) in cases {
                    targets.push(b);
                }
                if let Some(d) = default {
                    targets.push(*d);
                }
                targets
            }
            _ => SmallVec::new(),
        }
    }

    /// Redirect every edge to `old` so it targets `new`. Returns how many
    /// edges were redirected.
    pub(crate) fn redirect_successor(&mut self, old: BlockId, new: BlockId) -> usize {
        fn sub(b: &mut BlockId, old: BlockId, new: BlockId, n: &mut usize) {
            if *b == old {
                *b = new;
                *n += 1;
            }
        }
        let mut n = 0;
        match self {
            InstKind::Branch { target } => sub(target, old, new, &mut n),
            InstKind::CondBranch {
                then_block,
                else_block,
            } => {
                sub(then_block, old, new, &mut n);
                sub(else_block, old, new, &mut n);
            }
            InstKind::SwitchEnum { cases, default } => {
                for (_, b) in cases.iter_mut() {
                    sub(b, old, new, &mut n);
                }
                if let Some(d) = default {
                    sub(d, old, new, &mut n);
                }
            }
            _ => {}
        }
        n
    }

    /// For a `switch_enum`, the block control reaches when the operand has
    /// case `case`: the matching case target, else the default.
    pub fn switch_target(&self, case: u32) -> Option<BlockId> {
        let InstKind::SwitchEnum { cases, default } = self else {
            return None;
        };
        cases
            .iter()
            .find(|&&(c, _)| c == case)
            .map(|&(_, b)| b)
            .or(*default)
    }
}
