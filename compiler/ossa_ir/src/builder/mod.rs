//! Instruction builder.
//!
//! A [`Builder`] is a cursor at an [`InsertionPoint`]. Every `create_*`
//! method links a new instruction at the cursor, derives the result's
//! ownership from the operands, and advances the cursor so that
//! successive creations appear in program order.
//!
//! Builders created from a [`Context`] route every insertion through it,
//! so notifications fire. The static-initializer mode writes straight into
//! a global's initializer body and emits nothing.

use smallvec::SmallVec;

use crate::context::Context;
use crate::function::{Function, InsertionPoint};
use crate::ids::{BlockId, FuncId, GlobalId, InstId, ValueId};
use crate::inst::{BinaryOp, InstKind, LoadQualifier, StoreQualifier};
use crate::module::Module;
use crate::ownership::Ownership;
use crate::span::Span;
use crate::ty::Ty;

enum Sink<'a, 'm> {
    Context(&'a mut Context<'m>),
    StaticInitializer(&'a mut Function),
}

/// Insertion cursor.
pub struct Builder<'a, 'm> {
    sink: Sink<'a, 'm>,
    at: InsertionPoint,
    span: Span,
}

impl<'a, 'm> Builder<'a, 'm> {
    /// Builder at `at`. The span defaults to the span of the neighboring
    /// instruction.
    pub fn new(ctx: &'a mut Context<'m>, at: InsertionPoint) -> Self {
        if let InsertionPoint::After(inst) = at {
            assert!(
                !ctx.function().inst_kind(inst).is_terminator(),
                "cannot insert after terminator {inst}; use Builder::insert_after"
            );
        }
        let span = default_span(ctx.function(), at);
        Builder {
            sink: Sink::Context(ctx),
            at,
            span,
        }
    }

    pub fn before(ctx: &'a mut Context<'m>, inst: InstId) -> Self {
        Self::new(ctx, InsertionPoint::Before(inst))
    }

    /// # Panics
    ///
    /// Panics if `inst` is a terminator.
    pub fn after(ctx: &'a mut Context<'m>, inst: InstId) -> Self {
        Self::new(ctx, InsertionPoint::After(inst))
    }

    pub fn at_start(ctx: &'a mut Context<'m>, block: BlockId) -> Self {
        Self::new(ctx, InsertionPoint::AtStart(block))
    }

    pub fn at_end(ctx: &'a mut Context<'m>, block: BlockId) -> Self {
        Self::new(ctx, InsertionPoint::AtEnd(block))
    }

    /// Builder appending to the end of `init`'s single block, without
    /// notifications.
    pub(crate) fn for_static_initializer(init: &'a mut Function) -> Self {
        let block = init
            .entry_block()
            .unwrap_or_else(|| panic!("static initializer {} has no block", init.id()));
        let at = InsertionPoint::AtEnd(block);
        let span = default_span(init, at);
        Builder {
            sink: Sink::StaticInitializer(init),
            at,
            span,
        }
    }

    /// Builder for `global`'s initializer used while the module is being
    /// constructed (no pass running).
    pub fn static_initializer(module: &'a mut Module, global: GlobalId) -> Self {
        let init = module.global(global).initializer;
        Self::for_static_initializer(module.function_mut(init))
    }

    /// Override the span given to created instructions.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn insertion_point(&self) -> InsertionPoint {
        self.at
    }

    pub fn set_insertion_point(&mut self, at: InsertionPoint) {
        self.at = at;
    }

    pub fn is_static_initializer(&self) -> bool {
        matches!(self.sink, Sink::StaticInitializer(_))
    }

    /// The function being built into.
    pub fn function(&self) -> &Function {
        match &self.sink {
            Sink::Context(ctx) => ctx.function(),
            Sink::StaticInitializer(f) => &**f,
        }
    }

    /// Insert after `inst`, calling `build` once per insertion point.
    ///
    /// For an ordinary instruction there is one point, right after it. For
    /// a terminator there is no "after" within the block: `build` runs at
    /// the start of every distinct successor instead.
    ///
    /// # Panics
    ///
    /// Panics if `inst` is a terminator and any successor has more than one
    /// predecessor (a critical edge).
    pub fn insert_after(
        ctx: &mut Context<'m>,
        inst: InstId,
        mut build: impl FnMut(&mut Builder<'_, 'm>),
    ) {
        let f = ctx.function();
        if !f.inst_kind(inst).is_terminator() {
            build(&mut Builder::after(ctx, inst));
            return;
        }
        let mut succs: SmallVec<[BlockId; 4]> = f.inst_kind(inst).successors();
        succs.dedup();
        for &succ in &succs {
            let preds = f.predecessors(succ).len();
            assert!(
                preds == 1,
                "cannot insert after {inst}: successor {succ} has {preds} predecessors \
                 (critical edge)"
            );
        }
        for succ in succs {
            build(&mut Builder::at_start(ctx, succ));
        }
    }

    // ── Core insertion ──────────────────────────────────────────

    fn insert(
        &mut self,
        kind: InstKind,
        operands: &[ValueId],
        results: &[(Ty, Ownership)],
    ) -> InstId {
        let inst = match &mut self.sink {
            Sink::Context(ctx) => {
                ctx.insert_instruction(kind, operands, results, self.span, self.at)
            }
            Sink::StaticInitializer(f) => {
                let inst = f.create_inst(kind, operands, results, self.span);
                f.link_inst(inst, self.at);
                inst
            }
        };
        self.at = match self.at {
            InsertionPoint::After(_) | InsertionPoint::AtStart(_) => InsertionPoint::After(inst),
            at @ (InsertionPoint::Before(_) | InsertionPoint::AtEnd(_)) => at,
        };
        inst
    }

    fn insert_value(
        &mut self,
        kind: InstKind,
        operands: &[ValueId],
        ty: Ty,
        ownership: Ownership,
    ) -> ValueId {
        let inst = self.insert(kind, operands, &[(ty, ownership)]);
        self.function().results(inst)[0]
    }

    fn ownership(&self, value: ValueId) -> Ownership {
        self.function().value_ownership(value)
    }

    /// Ownership of an aggregate built from `operands`.
    ///
    /// # Panics
    ///
    /// Panics if the operands mix incompatible ownership kinds.
    fn merged_ownership(&self, operands: &[ValueId]) -> Ownership {
        operands.iter().try_fold(Ownership::None, |acc, &v| acc.merge(self.ownership(v)))
            .unwrap_or_else(|| panic!("aggregate operands {operands:?} mix ownership kinds"))
    }

    // ── Values ──────────────────────────────────────────────────

    pub fn create_int_literal(&mut self, value: i64) -> ValueId {
        self.insert_value(InstKind::IntLiteral(value), &[], Ty::Int, Ownership::None)
    }

    pub fn create_binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = match op {
            BinaryOp::Eq | BinaryOp::Lt => Ty::Bool,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => Ty::Int,
        };
        self.insert_value(InstKind::Binary(op), &[lhs, rhs], ty, Ownership::None)
    }

    pub fn create_struct(&mut self, ty: Ty, fields: &[ValueId]) -> ValueId {
        let own = self.merged_ownership(fields);
        self.insert_value(InstKind::Struct, fields, ty, own)
    }

    /// Project a field. The result is borrowed from the aggregate.
    pub fn create_struct_extract(&mut self, aggregate: ValueId, field: u32, ty: Ty) -> ValueId {
        let own = match self.ownership(aggregate) {
            Ownership::Owned | Ownership::Guaranteed => Ownership::Guaranteed,
            other => other,
        };
        self.insert_value(InstKind::StructExtract { field }, &[aggregate], ty, own)
    }

    pub fn create_enum(&mut self, ty: Ty, case: u32, payload: Option<ValueId>) -> ValueId {
        let operands: SmallVec<[ValueId; 1]> = payload.into_iter().collect();
        let own = self.merged_ownership(&operands);
        self.insert_value(InstKind::Enum { case }, &operands, ty, own)
    }

    pub fn create_unchecked_enum_data(&mut self, value: ValueId, case: u32, ty: Ty) -> ValueId {
        let own = self.ownership(value);
        self.insert_value(InstKind::UncheckedEnumData { case }, &[value], ty, own)
    }

    pub fn create_upcast(&mut self, value: ValueId) -> ValueId {
        let own = self.ownership(value);
        let ty = self.function().value_ty(value);
        self.insert_value(InstKind::Upcast, &[value], ty, own)
    }

    pub fn create_copy_value(&mut self, value: ValueId) -> ValueId {
        let ty = self.function().value_ty(value);
        self.insert_value(InstKind::CopyValue, &[value], ty, Ownership::Owned)
    }

    pub fn create_begin_borrow(&mut self, value: ValueId) -> ValueId {
        let ty = self.function().value_ty(value);
        self.insert_value(InstKind::BeginBorrow, &[value], ty, Ownership::Guaranteed)
    }

    pub fn create_end_borrow(&mut self, borrow: ValueId) -> InstId {
        self.insert(InstKind::EndBorrow, &[borrow], &[])
    }

    pub fn create_destroy_value(&mut self, value: ValueId) -> InstId {
        self.insert(InstKind::DestroyValue, &[value], &[])
    }

    // ── Memory ──────────────────────────────────────────────────

    pub fn create_alloc_stack(&mut self) -> ValueId {
        self.insert_value(InstKind::AllocStack, &[], Ty::Address, Ownership::None)
    }

    pub fn create_dealloc_stack(&mut self, addr: ValueId) -> InstId {
        self.insert(InstKind::DeallocStack, &[addr], &[])
    }

    pub fn create_alloc_ref(&mut self) -> ValueId {
        self.insert_value(InstKind::AllocRef, &[], Ty::Ref, Ownership::Owned)
    }

    pub fn create_field_addr(&mut self, addr: ValueId, field: u32) -> ValueId {
        self.insert_value(InstKind::FieldAddr { field }, &[addr], Ty::Address, Ownership::None)
    }

    pub fn create_global_addr(&mut self, global: GlobalId) -> ValueId {
        self.insert_value(InstKind::GlobalAddr(global), &[], Ty::Address, Ownership::None)
    }

    pub fn create_load(&mut self, addr: ValueId, qualifier: LoadQualifier, ty: Ty) -> ValueId {
        let own = match qualifier {
            LoadQualifier::Copy | LoadQualifier::Take => Ownership::Owned,
            LoadQualifier::Trivial => Ownership::None,
        };
        self.insert_value(InstKind::Load(qualifier), &[addr], ty, own)
    }

    pub fn create_store(
        &mut self,
        src: ValueId,
        dest: ValueId,
        qualifier: StoreQualifier,
    ) -> InstId {
        self.insert(InstKind::Store(qualifier), &[src, dest], &[])
    }

    // ── Calls ───────────────────────────────────────────────────

    /// Reference `callee`. Records a dependency on it.
    pub fn create_function_ref(&mut self, callee: FuncId) -> ValueId {
        self.insert_value(InstKind::FunctionRef(callee), &[], Ty::Function, Ownership::None)
    }

    /// Call `callee` with `args`. Non-trivial results are owned.
    pub fn create_apply(&mut self, callee: ValueId, args: &[ValueId], result: Ty) -> ValueId {
        let mut operands: SmallVec<[ValueId; 4]> = SmallVec::with_capacity(args.len() + 1);
        operands.push(callee);
        operands.extend_from_slice(args);
        self.insert_value(InstKind::Apply, &operands, result, Ownership::Owned)
    }

    // ── Debug & markers ─────────────────────────────────────────

    pub fn create_debug_value(&mut self, value: ValueId) -> InstId {
        self.insert(InstKind::DebugValue, &[value], &[])
    }

    pub fn create_fix_lifetime(&mut self, value: ValueId) -> InstId {
        self.insert(InstKind::FixLifetime, &[value], &[])
    }

    // ── Terminators ─────────────────────────────────────────────

    pub fn create_return(&mut self, value: Option<ValueId>) -> InstId {
        let operands: SmallVec<[ValueId; 1]> = value.into_iter().collect();
        self.insert(InstKind::Return, &operands, &[])
    }

    pub fn create_branch(&mut self, target: BlockId, args: &[ValueId]) -> InstId {
        self.insert(InstKind::Branch { target }, args, &[])
    }

    pub fn create_cond_branch(
        &mut self,
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    ) -> InstId {
        self.insert(
            InstKind::CondBranch {
                then_block,
                else_block,
            },
            &[cond],
            &[],
        )
    }

    pub fn create_switch_enum(
        &mut self,
        value: ValueId,
        cases: &[(u32, BlockId)],
        default: Option<BlockId>,
    ) -> InstId {
        self.insert(
            InstKind::SwitchEnum {
                cases: cases.iter().copied().collect(),
                default,
            },
            &[value],
            &[],
        )
    }

    pub fn create_unreachable(&mut self) -> InstId {
        self.insert(InstKind::Unreachable, &[], &[])
    }
}

/// Span of the instruction next to `at`, or [`Span::DUMMY`] in an empty
/// block.
fn default_span(func: &Function, at: InsertionPoint) -> Span {
    let neighbor = match at {
        InsertionPoint::Before(i) | InsertionPoint::After(i) => Some(i),
        InsertionPoint::AtStart(b) => func.first_inst(b),
        InsertionPoint::AtEnd(b) => func.last_inst(b),
    };
    neighbor.map_or(Span::DUMMY, |i| func.span(i))
}
