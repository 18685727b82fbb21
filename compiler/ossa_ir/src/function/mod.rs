//! Functions, blocks, instructions and values.
//!
//! # Storage
//!
//! A [`Function`] owns three arenas: blocks, instructions and values.
//! Entities are never moved or reused; erasing one marks its slot dead.
//! Everything that is not ownership is a handle:
//!
//! - block order is a `layout` vector of [`BlockId`]s,
//! - instructions in a block form a doubly linked list (`prev`/`next`),
//! - every [`Value`](ValueId) heads a doubly linked list of the operand
//!   slots that use it (the *use list*), so adding or removing a use is O(1),
//! - predecessor lists are maintained from terminators as they are linked
//!   and unlinked, one entry per CFG edge.
//!
//! Read access is public. Every structural write is `pub(crate)` and is
//! reached only through [`Context`](crate::Context) and
//! [`Builder`](crate::Builder), which add notifications and precondition
//! checks on top.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::ids::{BlockId, FuncId, GlobalId, InstId, OperandId, ValueId};
use crate::inst::InstKind;
use crate::name::Name;
use crate::ownership::{OperandOwnership, Ownership};
use crate::span::Span;
use crate::ty::Ty;

mod uses;

pub use uses::{UseIter, UseList};

/// Whether a function is ordinary code or the body of a global's static
/// initializer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Regular,
    /// Straight-line initializer of a global. Has a single block, no
    /// terminator, and is never analyzed by the optimizer.
    StaticInitializer(GlobalId),
}

/// Where a value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueDef {
    /// The `index`-th result of `inst`.
    Result { inst: InstId, index: u32 },
    /// The `index`-th argument of `block`. Entry block arguments are the
    /// function's parameters.
    BlockArg { block: BlockId, index: u32 },
    /// The undefined sentinel used to replace uses of deleted definitions.
    Undef,
}

/// Where to link a new instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InsertionPoint {
    Before(InstId),
    After(InstId),
    AtStart(BlockId),
    AtEnd(BlockId),
}

// ── Arena records ───────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub(crate) struct Operand {
    pub(crate) value: ValueId,
    prev_use: Option<OperandId>,
    next_use: Option<OperandId>,
}

#[derive(Clone, Debug)]
struct InstData {
    kind: InstKind,
    block: Option<BlockId>,
    prev: Option<InstId>,
    next: Option<InstId>,
    operands: SmallVec<[Operand; 2]>,
    results: SmallVec<[ValueId; 1]>,
    span: Span,
    erased: bool,
}

#[derive(Clone, Debug, Default)]
struct BlockData {
    args: SmallVec<[ValueId; 2]>,
    first_inst: Option<InstId>,
    last_inst: Option<InstId>,
    /// One entry per incoming edge.
    preds: SmallVec<[BlockId; 4]>,
    erased: bool,
}

#[derive(Clone, Debug)]
struct ValueData {
    def: ValueDef,
    ty: Ty,
    ownership: Ownership,
    first_use: Option<OperandId>,
    last_use: Option<OperandId>,
}

// ── Function ────────────────────────────────────────────────────────

/// A function body in the ownership SSA IR.
pub struct Function {
    id: FuncId,
    name: Name,
    kind: FunctionKind,
    blocks: Vec<BlockData>,
    layout: Vec<BlockId>,
    insts: Vec<InstData>,
    values: Vec<ValueData>,
    undefs: FxHashMap<Ty, ValueId>,
    /// Set while a [`Context`](crate::Context) is bound to this function.
    pub(crate) transforming: bool,
}

impl Function {
    pub(crate) fn new(id: FuncId, name: Name, kind: FunctionKind) -> Self {
        Function {
            id,
            name,
            kind,
            blocks: Vec::new(),
            layout: Vec::new(),
            insts: Vec::new(),
            values: Vec::new(),
            undefs: FxHashMap::default(),
            transforming: false,
        }
    }

    #[inline]
    pub fn id(&self) -> FuncId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> Name {
        self.name
    }

    #[inline]
    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// Returns `true` while a pass holds a Context on this function.
    #[inline]
    pub fn is_being_transformed(&self) -> bool {
        self.transforming
    }

    /// Fatal check that a handle belongs to this function.
    #[inline]
    #[track_caller]
    fn check_owner(&self, owner: FuncId) {
        assert!(
            owner == self.id,
            "handle belonging to {owner} used on function {}",
            self.id,
        );
    }

    // ── Blocks ──────────────────────────────────────────────────

    /// The entry block (first in layout order).
    pub fn entry_block(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    /// Live blocks in layout order.
    pub fn blocks(&self) -> impl ExactSizeIterator<Item = BlockId> + '_ {
        self.layout.iter().copied()
    }

    /// Number of live blocks.
    pub fn num_blocks(&self) -> usize {
        self.layout.len()
    }

    /// One past the highest block slot ever allocated. Dense per-block
    /// tables are sized by this, not by [`num_blocks`](Self::num_blocks).
    pub fn block_capacity(&self) -> usize {
        self.blocks.len()
    }

    #[track_caller]
    fn block(&self, block: BlockId) -> &BlockData {
        self.check_owner(block.func());
        &self.blocks[block.index()]
    }

    #[track_caller]
    fn block_mut(&mut self, block: BlockId) -> &mut BlockData {
        self.check_owner(block.func());
        &mut self.blocks[block.index()]
    }

    pub fn is_live_block(&self, block: BlockId) -> bool {
        block.func() == self.id
            && self
                .blocks
                .get(block.index())
                .is_some_and(|b| !b.erased)
    }

    pub fn block_args(&self, block: BlockId) -> &[ValueId] {
        &self.block(block).args
    }

    pub fn first_inst(&self, block: BlockId) -> Option<InstId> {
        self.block(block).first_inst
    }

    pub fn last_inst(&self, block: BlockId) -> Option<InstId> {
        self.block(block).last_inst
    }

    /// The block's terminator, if its last instruction is one.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        self.last_inst(block)
            .filter(|&i| self.inst(i).kind.is_terminator())
    }

    /// Instructions of `block` in order.
    pub fn insts(&self, block: BlockId) -> InstIter<'_> {
        InstIter {
            func: self,
            next: self.first_inst(block),
            forward: true,
        }
    }

    /// Instructions of `block` in reverse order.
    pub fn insts_rev(&self, block: BlockId) -> InstIter<'_> {
        InstIter {
            func: self,
            next: self.last_inst(block),
            forward: false,
        }
    }

    /// Predecessors, one entry per incoming edge.
    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        &self.block(block).preds
    }

    pub fn single_predecessor(&self, block: BlockId) -> Option<BlockId> {
        match self.predecessors(block) {
            [p] => Some(*p),
            _ => None,
        }
    }

    /// Successors named by the block's terminator (empty without one).
    pub fn successors(&self, block: BlockId) -> SmallVec<[BlockId; 4]> {
        self.terminator(block)
            .map(|t| self.inst(t).kind.successors())
            .unwrap_or_default()
    }

    // ── Instructions ────────────────────────────────────────────

    #[track_caller]
    fn inst(&self, inst: InstId) -> &InstData {
        self.check_owner(inst.func());
        &self.insts[inst.index()]
    }

    #[track_caller]
    fn inst_mut(&mut self, inst: InstId) -> &mut InstData {
        self.check_owner(inst.func());
        &mut self.insts[inst.index()]
    }

    pub fn inst_kind(&self, inst: InstId) -> &InstKind {
        &self.inst(inst).kind
    }

    /// The block containing `inst`, or `None` once erased.
    pub fn inst_block(&self, inst: InstId) -> Option<BlockId> {
        self.inst(inst).block
    }

    /// The block containing `inst`.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is not linked into a block.
    #[track_caller]
    pub fn parent_block(&self, inst: InstId) -> BlockId {
        self.inst(inst)
            .block
            .unwrap_or_else(|| panic!("{inst} is not in a block"))
    }

    pub fn is_live_inst(&self, inst: InstId) -> bool {
        inst.func() == self.id
            && self
                .insts
                .get(inst.index())
                .is_some_and(|i| !i.erased)
    }

    pub fn next_inst(&self, inst: InstId) -> Option<InstId> {
        self.inst(inst).next
    }

    pub fn prev_inst(&self, inst: InstId) -> Option<InstId> {
        self.inst(inst).prev
    }

    pub fn span(&self, inst: InstId) -> Span {
        self.inst(inst).span
    }

    /// Values used by `inst`, in operand order.
    pub fn operands(&self, inst: InstId) -> impl ExactSizeIterator<Item = ValueId> + '_ {
        self.inst(inst).operands.iter().map(|o| o.value)
    }

    /// Operand slots of `inst`.
    pub fn operand_ids(&self, inst: InstId) -> impl ExactSizeIterator<Item = OperandId> {
        #[expect(clippy::cast_possible_truncation, reason = "operand counts fit in u32")]
        let n = self.inst(inst).operands.len() as u32;
        (0..n).map(move |i| OperandId::new(inst, i))
    }

    #[track_caller]
    pub(crate) fn operand(&self, op: OperandId) -> &Operand {
        &self.inst(op.inst()).operands[op.index()]
    }

    #[track_caller]
    fn operand_mut(&mut self, op: OperandId) -> &mut Operand {
        &mut self.inst_mut(op.inst()).operands[op.index()]
    }

    /// The value referenced by an operand slot.
    pub fn operand_value(&self, op: OperandId) -> ValueId {
        self.operand(op).value
    }

    /// What the using instruction does with this operand.
    pub fn operand_ownership(&self, op: OperandId) -> OperandOwnership {
        self.inst_kind(op.inst()).operand_ownership(op.index())
    }

    /// Does this use end the lifetime of the value it references?
    pub fn is_lifetime_ending(&self, op: OperandId) -> bool {
        let value = self.operand_value(op);
        self.operand_ownership(op)
            .ends_lifetime(self.value_ownership(value))
    }

    /// Is the user of this operand a debug-only instruction?
    pub fn is_debug_use(&self, op: OperandId) -> bool {
        self.inst_kind(op.inst()).is_debug()
    }

    pub fn results(&self, inst: InstId) -> &[ValueId] {
        &self.inst(inst).results
    }

    /// The first (for every current kind, the only) result.
    pub fn result(&self, inst: InstId) -> Option<ValueId> {
        self.inst(inst).results.first().copied()
    }

    // ── Values ──────────────────────────────────────────────────

    #[track_caller]
    fn value(&self, value: ValueId) -> &ValueData {
        self.check_owner(value.func());
        &self.values[value.index()]
    }

    pub fn value_ty(&self, value: ValueId) -> Ty {
        self.value(value).ty
    }

    pub fn value_ownership(&self, value: ValueId) -> Ownership {
        self.value(value).ownership
    }

    pub fn value_def(&self, value: ValueId) -> ValueDef {
        self.value(value).def
    }

    /// The instruction producing `value`, if it is a result.
    pub fn defining_inst(&self, value: ValueId) -> Option<InstId> {
        match self.value_def(value) {
            ValueDef::Result { inst, .. } => Some(inst),
            ValueDef::BlockArg { .. } | ValueDef::Undef => None,
        }
    }

    /// The block defining `value`; `None` for undef and for results of
    /// erased instructions.
    pub fn value_block(&self, value: ValueId) -> Option<BlockId> {
        match self.value_def(value) {
            ValueDef::Result { inst, .. } => self.inst_block(inst),
            ValueDef::BlockArg { block, .. } => Some(block),
            ValueDef::Undef => None,
        }
    }

    /// Returns `true` for entry block arguments.
    pub fn is_function_argument(&self, value: ValueId) -> bool {
        matches!(
            self.value_def(value),
            ValueDef::BlockArg { block, .. } if Some(block) == self.entry_block()
        )
    }

    /// The use list of `value`.
    pub fn uses(&self, value: ValueId) -> UseList<'_> {
        UseList::new(self, self.value(value).first_use)
    }

    // ── Raw mutation (crate-internal) ───────────────────────────

    /// Allocate a detached block. The caller links it into the layout.
    pub(crate) fn alloc_block(&mut self) -> BlockId {
        let raw = u32::try_from(self.blocks.len())
            .unwrap_or_else(|_| panic!("block count exceeds u32::MAX"));
        self.blocks.push(BlockData::default());
        BlockId::new(self.id, raw)
    }

    /// Place `block` in the layout after `after`, or at the end.
    pub(crate) fn insert_block_after(&mut self, block: BlockId, after: Option<BlockId>) {
        let pos = match after {
            Some(a) => {
                self.check_owner(a.func());
                let idx = self
                    .layout
                    .iter()
                    .position(|&b| b == a)
                    .unwrap_or_else(|| panic!("{a} is not in the layout"));
                idx + 1
            }
            None => self.layout.len(),
        };
        self.layout.insert(pos, block);
    }

    /// Remove an empty, unreferenced block.
    pub(crate) fn remove_block(&mut self, block: BlockId) {
        let data = self.block(block);
        assert!(
            data.first_inst.is_none(),
            "{block} still contains instructions"
        );
        assert!(
            data.preds.is_empty(),
            "{block} still has {} predecessor edge(s)",
            data.preds.len()
        );
        for &arg in &data.args {
            assert!(
                self.value(arg).first_use.is_none(),
                "argument {arg} of {block} still has uses"
            );
        }
        self.layout.retain(|&b| b != block);
        self.block_mut(block).erased = true;
    }

    pub(crate) fn push_block_arg(
        &mut self,
        block: BlockId,
        ty: Ty,
        ownership: Ownership,
    ) -> ValueId {
        let index = u32::try_from(self.block(block).args.len())
            .unwrap_or_else(|_| panic!("argument count exceeds u32::MAX"));
        let value = self.alloc_value(ValueDef::BlockArg { block, index }, ty, ownership);
        self.block_mut(block).args.push(value);
        value
    }

    fn alloc_value(&mut self, def: ValueDef, ty: Ty, ownership: Ownership) -> ValueId {
        let raw = u32::try_from(self.values.len())
            .unwrap_or_else(|_| panic!("value count exceeds u32::MAX"));
        let ownership = if ty.is_trivial() {
            Ownership::None
        } else {
            ownership
        };
        self.values.push(ValueData {
            def,
            ty,
            ownership,
            first_use: None,
            last_use: None,
        });
        ValueId::new(self.id, raw)
    }

    /// The undef sentinel of type `ty` (one per type, created on demand).
    pub(crate) fn undef(&mut self, ty: Ty) -> ValueId {
        if let Some(&v) = self.undefs.get(&ty) {
            return v;
        }
        let v = self.alloc_value(ValueDef::Undef, ty, Ownership::None);
        self.undefs.insert(ty, v);
        v
    }

    /// Create a detached instruction with its operands already on their
    /// values' use lists.
    pub(crate) fn create_inst(
        &mut self,
        kind: InstKind,
        operands: &[ValueId],
        results: &[(Ty, Ownership)],
        span: Span,
    ) -> InstId {
        let raw = u32::try_from(self.insts.len())
            .unwrap_or_else(|_| panic!("instruction count exceeds u32::MAX"));
        let inst = InstId::new(self.id, raw);
        for &v in operands {
            self.check_owner(v.func());
        }
        self.insts.push(InstData {
            kind,
            block: None,
            prev: None,
            next: None,
            operands: operands
                .iter()
                .map(|&value| Operand {
                    value,
                    prev_use: None,
                    next_use: None,
                })
                .collect(),
            results: SmallVec::new(),
            span,
            erased: false,
        });
        for (i, &(ty, ownership)) in results.iter().enumerate() {
            #[expect(clippy::cast_possible_truncation, reason = "result counts fit in u32")]
            let def = ValueDef::Result {
                inst,
                index: i as u32,
            };
            let v = self.alloc_value(def, ty, ownership);
            self.inst_mut(inst).results.push(v);
        }
        for op in self.operand_ids(inst).collect::<SmallVec<[_; 4]>>() {
            self.link_use(op);
        }
        inst
    }

    /// Link a detached instruction at `at`. Terminators add one
    /// predecessor edge to each successor.
    pub(crate) fn link_inst(&mut self, inst: InstId, at: InsertionPoint) {
        let (block, prev, next) = match at {
            InsertionPoint::Before(i) => (self.parent_block(i), self.inst(i).prev, Some(i)),
            InsertionPoint::After(i) => (self.parent_block(i), Some(i), self.inst(i).next),
            InsertionPoint::AtStart(b) => (b, None, self.block(b).first_inst),
            InsertionPoint::AtEnd(b) => (b, self.block(b).last_inst, None),
        };
        {
            let data = self.inst_mut(inst);
            debug_assert!(data.block.is_none(), "{inst} is already linked");
            data.block = Some(block);
            data.prev = prev;
            data.next = next;
        }
        match prev {
            Some(p) => self.inst_mut(p).next = Some(inst),
            None => self.block_mut(block).first_inst = Some(inst),
        }
        match next {
            Some(n) => self.inst_mut(n).prev = Some(inst),
            None => self.block_mut(block).last_inst = Some(inst),
        }
        for succ in self.inst(inst).kind.successors() {
            self.block_mut(succ).preds.push(block);
        }
    }

    /// Detach an instruction from its block, keeping its operands.
    pub(crate) fn unlink_inst(&mut self, inst: InstId) {
        let (block, prev, next) = {
            let data = self.inst(inst);
            let Some(block) = data.block else {
                return;
            };
            (block, data.prev, data.next)
        };
        match prev {
            Some(p) => self.inst_mut(p).next = next,
            None => self.block_mut(block).first_inst = next,
        }
        match next {
            Some(n) => self.inst_mut(n).prev = prev,
            None => self.block_mut(block).last_inst = prev,
        }
        for succ in self.inst(inst).kind.successors() {
            self.remove_pred_edge(succ, block);
        }
        let data = self.inst_mut(inst);
        data.block = None;
        data.prev = None;
        data.next = None;
    }

    fn remove_pred_edge(&mut self, block: BlockId, pred: BlockId) {
        let preds = &mut self.block_mut(block).preds;
        if let Some(pos) = preds.iter().position(|&p| p == pred) {
            preds.remove(pos);
        }
    }

    /// Unlink and kill an instruction whose results have no uses.
    pub(crate) fn erase_inst(&mut self, inst: InstId) {
        for &r in &self.inst(inst).results {
            assert!(
                self.value(r).first_use.is_none(),
                "cannot erase {inst}: result {r} still has uses"
            );
        }
        self.unlink_inst(inst);
        for op in self.operand_ids(inst).collect::<SmallVec<[_; 4]>>() {
            self.unlink_use(op);
        }
        self.inst_mut(inst).erased = true;
    }

    /// Point operand `op` at `value`.
    pub(crate) fn set_operand(&mut self, op: OperandId, value: ValueId) {
        self.check_owner(value.func());
        self.unlink_use(op);
        self.operand_mut(op).value = value;
        self.link_use(op);
    }

    /// Retarget every edge of terminator `term` from `old` to `new`,
    /// keeping predecessor lists in sync.
    pub(crate) fn redirect_edges(&mut self, term: InstId, old: BlockId, new: BlockId) -> usize {
        let block = self.parent_block(term);
        let n = self.inst_mut(term).kind.redirect_successor(old, new);
        for _ in 0..n {
            self.remove_pred_edge(old, block);
            self.block_mut(new).preds.push(block);
        }
        n
    }

    /// Move `first` and every instruction after it in its block to the end
    /// of `to`.
    pub(crate) fn move_tail(&mut self, first: InstId, to: BlockId) {
        let mut cursor = Some(first);
        while let Some(inst) = cursor {
            cursor = self.inst(inst).next;
            self.unlink_inst(inst);
            self.link_inst(inst, InsertionPoint::AtEnd(to));
        }
    }

    fn link_use(&mut self, op: OperandId) {
        let value = self.operand(op).value;
        let last = self.values[value.index()].last_use;
        {
            let o = self.operand_mut(op);
            o.prev_use = last;
            o.next_use = None;
        }
        match last {
            Some(l) => self.operand_mut(l).next_use = Some(op),
            None => self.values[value.index()].first_use = Some(op),
        }
        self.values[value.index()].last_use = Some(op);
    }

    fn unlink_use(&mut self, op: OperandId) {
        let (value, prev, next) = {
            let o = self.operand(op);
            (o.value, o.prev_use, o.next_use)
        };
        match prev {
            Some(p) => self.operand_mut(p).next_use = next,
            None => self.values[value.index()].first_use = next,
        }
        match next {
            Some(n) => self.operand_mut(n).prev_use = prev,
            None => self.values[value.index()].last_use = prev,
        }
        let o = self.operand_mut(op);
        o.prev_use = None;
        o.next_use = None;
    }

    pub(crate) fn next_use(&self, op: OperandId) -> Option<OperandId> {
        self.operand(op).next_use
    }
}

/// Iterator over the instructions of one block.
///
/// Reads the link of the *current* instruction before yielding it, so the
/// caller may not erase the instruction it has just received and keep
/// iterating; collect first when mutating.
pub struct InstIter<'f> {
    func: &'f Function,
    next: Option<InstId>,
    forward: bool,
}

impl Iterator for InstIter<'_> {
    type Item = InstId;

    fn next(&mut self) -> Option<InstId> {
        let cur = self.next?;
        self.next = if self.forward {
            self.func.next_inst(cur)
        } else {
            self.func.prev_inst(cur)
        };
        Some(cur)
    }
}
