//! Entity handles for the IR arena.
//!
//! Functions own their blocks, instructions and values in flat vectors;
//! everything else refers to them by index. Every block, instruction and
//! value handle also records its owning [`FuncId`], so a handle that leaks
//! from one function into a mutation of another is caught immediately
//! instead of silently aliasing an unrelated slot.

use std::fmt;

// ── Functions ───────────────────────────────────────────────────────

/// Function ID within a [`Module`](crate::Module).
///
/// IDs are allocated sequentially starting from 0 and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FuncId(u32);

impl FuncId {
    /// Create a new function ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

/// Global variable ID within a [`Module`](crate::Module).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct GlobalId(u32);

impl GlobalId {
    /// Create a new global ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@g{}", self.0)
    }
}

// ── Function-local entities ─────────────────────────────────────────

macro_rules! local_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            func: FuncId,
            index: u32,
        }

        impl $name {
            /// Create a handle for slot `index` of function `func`.
            #[inline]
            pub fn new(func: FuncId, index: u32) -> Self {
                Self { func, index }
            }

            /// The function that owns this entity.
            #[inline]
            pub fn func(self) -> FuncId {
                self.func
            }

            /// Get the raw slot index.
            #[inline]
            pub fn raw(self) -> u32 {
                self.index
            }

            /// Get the slot index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub fn index(self) -> usize {
                self.index as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.index)
            }
        }
    };
}

local_id!(
    /// Basic block handle.
    BlockId,
    "bb"
);

local_id!(
    /// Instruction handle.
    InstId,
    "i"
);

local_id!(
    /// Value handle: an instruction result, a block argument or an undef
    /// sentinel.
    ValueId,
    "%"
);

/// One operand slot: the `index`-th input of instruction `inst`.
///
/// Operands are stored inline in their instruction, so the pair is
/// enough to reach the slot in O(1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperandId {
    inst: InstId,
    index: u32,
}

impl OperandId {
    #[inline]
    pub fn new(inst: InstId, index: u32) -> Self {
        Self { inst, index }
    }

    /// The instruction that uses the value.
    #[inline]
    pub fn inst(self) -> InstId {
        self.inst
    }

    /// Position of this operand in the instruction's operand list.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for OperandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.inst, self.index)
    }
}
