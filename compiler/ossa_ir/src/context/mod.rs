//! The mutation gateway.
//!
//! A [`Context`] is bound to one function of a [`Module`] for the duration
//! of one pass run. Every structural edit goes through it: the Context
//! performs the edit on the function's arenas, checks that the edited
//! entity belongs to the bound function, and records the change as a
//! [`Notification`]. Notifications are coalesced: a kind that has already
//! been reported (and has not been "re-armed" by recomputing an analysis
//! that depends on it) is a no-op.
//!
//! Cached analyses live in the Context too, keyed by type. A notification
//! evicts exactly the analyses whose [`Analysis::INVALIDATED_BY`] mask it
//! intersects.

mod notify;

pub use notify::{ChangeSummary, Invalidation, Notification};

use std::any::{Any, TypeId};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::analysis::{Analysis, DeadEndBlocks, DominatorTree, PostDominatorTree};
use crate::builder::Builder;
use crate::function::{Function, FunctionKind, InsertionPoint};
use crate::ids::{BlockId, FuncId, GlobalId, InstId, OperandId, ValueId};
use crate::inst::InstKind;
use crate::module::Module;
use crate::options::PassOptions;
use crate::ownership::Ownership;
use crate::span::Span;
use crate::ty::Ty;

struct CachedAnalysis {
    value: Rc<dyn Any>,
    invalidated_by: Invalidation,
}

/// Mutation context for one function during one pass run.
pub struct Context<'m> {
    module: &'m mut Module,
    func: FuncId,
    options: PassOptions,
    /// Union of everything reported.
    changes: Invalidation,
    /// Kinds reported since the last analysis that depends on them was
    /// computed; reporting one of these again is a no-op.
    dirty: Invalidation,
    dependencies: Vec<FuncId>,
    analyses: FxHashMap<TypeId, CachedAnalysis>,
}

impl<'m> Context<'m> {
    /// Bind a context to `func` with default options.
    ///
    /// # Panics
    ///
    /// Panics if `func` is a static initializer or is already being
    /// transformed.
    pub fn new(module: &'m mut Module, func: FuncId) -> Self {
        Self::with_options(module, func, PassOptions::default())
    }

    pub fn with_options(module: &'m mut Module, func: FuncId, options: PassOptions) -> Self {
        let f = module.function_mut(func);
        assert!(
            matches!(f.kind(), FunctionKind::Regular),
            "{func} is a static initializer; use a static initializer builder"
        );
        assert!(!f.transforming, "{func} is already being transformed");
        f.transforming = true;
        Context {
            module,
            func,
            options,
            changes: Invalidation::empty(),
            dirty: Invalidation::all(),
            dependencies: Vec::new(),
            analyses: FxHashMap::default(),
        }
    }

    // ── Read access ─────────────────────────────────────────────

    /// The function being transformed.
    pub fn function(&self) -> &Function {
        self.module.function(self.func)
    }

    pub fn func_id(&self) -> FuncId {
        self.func
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    pub fn options(&self) -> PassOptions {
        self.options
    }

    pub fn preserve_debug_info(&self) -> bool {
        self.options.preserve_debug_info
    }

    /// Read access to another function of the module.
    pub fn function_of(&self, func: FuncId) -> &Function {
        self.module.function(func)
    }

    /// The regular function called `name`, if exactly one exists.
    pub fn lookup_function(&self, name: &str) -> Option<FuncId> {
        self.module.lookup_function(name)
    }

    /// The global called `name`, if exactly one exists.
    pub fn lookup_global(&self, name: &str) -> Option<GlobalId> {
        self.module.lookup_global(name)
    }

    /// Mutable access to the bound function, for an entity owned by
    /// `owner`.
    ///
    /// # Panics
    ///
    /// Panics if `owner` is not the function this context is bound to.
    #[track_caller]
    fn func_mut(&mut self, owner: FuncId) -> &mut Function {
        self.check_owner(owner);
        self.module.function_mut(self.func)
    }

    #[track_caller]
    fn check_owner(&self, owner: FuncId) {
        assert!(
            owner == self.func,
            "context for {} ({}) cannot mutate {owner}",
            self.func,
            self.module.function_name(self.func),
        );
    }

    /// The bound function, after checking that `owner` is it.
    #[track_caller]
    fn function_for(&self, owner: FuncId) -> &Function {
        self.check_owner(owner);
        self.function()
    }

    // ── Notifications ───────────────────────────────────────────

    /// Report a change.
    pub fn notify(&mut self, notification: Notification) {
        if let Notification::DependencyOn(f) = notification {
            if !self.dependencies.contains(&f) {
                self.dependencies.push(f);
            }
            return;
        }
        let kind = notification.invalidation();
        self.changes |= kind;
        if self.dirty.contains(kind) {
            return;
        }
        self.dirty |= kind;
        let before = self.analyses.len();
        self.analyses
            .retain(|_, cached| !cached.invalidated_by.intersects(kind));
        tracing::trace!(
            ?notification,
            evicted = before - self.analyses.len(),
            "analysis cache invalidated"
        );
    }

    fn notify_kind(&mut self, kind: Invalidation) {
        for (flag, n) in [
            (Invalidation::INSTRUCTIONS, Notification::InstructionsChanged),
            (Invalidation::CALLS, Notification::CallsChanged),
            (Invalidation::BRANCHES, Notification::BranchesChanged),
            (Invalidation::EFFECTS, Notification::EffectsChanged),
        ] {
            if kind.contains(flag) {
                self.notify(n);
            }
        }
    }

    /// Notifications implied by creating or erasing an instruction of
    /// `kind`.
    fn inst_invalidation(kind: &InstKind) -> Invalidation {
        let mut inv = Invalidation::INSTRUCTIONS;
        if kind.is_call() {
            inv |= Invalidation::CALLS;
        }
        if kind.is_terminator() {
            inv |= Invalidation::BRANCHES;
        }
        inv
    }

    /// Everything reported so far.
    pub fn changes(&self) -> Invalidation {
        self.changes
    }

    /// End the pass run, returning the coalesced change record.
    pub fn finish(mut self) -> ChangeSummary {
        ChangeSummary {
            changed: self.changes,
            dependencies: std::mem::take(&mut self.dependencies),
        }
    }

    // ── Analyses ────────────────────────────────────────────────

    /// The cached analysis `A`, computed now if missing or stale.
    pub fn analysis<A: Analysis>(&mut self) -> Rc<A> {
        let key = TypeId::of::<A>();
        if let Some(cached) = self.analyses.get(&key) {
            if let Ok(a) = Rc::clone(&cached.value).downcast::<A>() {
                return a;
            }
        }
        let a = Rc::new(A::compute(self.function(), &self.options));
        self.dirty.remove(A::INVALIDATED_BY);
        self.analyses.insert(
            key,
            CachedAnalysis {
                value: Rc::clone(&a) as Rc<dyn Any>,
                invalidated_by: A::INVALIDATED_BY,
            },
        );
        a
    }

    /// Returns `true` if `A` is cached and valid.
    pub fn is_cached<A: Analysis>(&self) -> bool {
        self.analyses.contains_key(&TypeId::of::<A>())
    }

    pub fn dominators(&mut self) -> Rc<DominatorTree> {
        self.analysis()
    }

    pub fn post_dominators(&mut self) -> Rc<PostDominatorTree> {
        self.analysis()
    }

    pub fn dead_end_blocks(&mut self) -> Rc<DeadEndBlocks> {
        self.analysis()
    }

    // ── Blocks ──────────────────────────────────────────────────

    /// Append a new empty block to the layout.
    pub fn create_block(&mut self) -> BlockId {
        let func = self.func;
        let f = self.func_mut(func);
        let block = f.alloc_block();
        f.insert_block_after(block, None);
        self.notify(Notification::BranchesChanged);
        block
    }

    /// Create a new empty block placed right after `after`.
    pub fn create_block_after(&mut self, after: BlockId) -> BlockId {
        let f = self.func_mut(after.func());
        let block = f.alloc_block();
        f.insert_block_after(block, Some(after));
        self.notify(Notification::BranchesChanged);
        block
    }

    /// Append an argument to `block`.
    pub fn add_block_arg(&mut self, block: BlockId, ty: Ty, ownership: Ownership) -> ValueId {
        let value = self.func_mut(block.func()).push_block_arg(block, ty, ownership);
        self.notify(Notification::InstructionsChanged);
        value
    }

    /// Split `inst`'s block before `inst`: `inst` and everything after it
    /// move to a new block placed after the original. The original block
    /// is left without a terminator.
    pub fn split_block_before(&mut self, inst: InstId) -> BlockId {
        let f = self.func_mut(inst.func());
        let block = f.parent_block(inst);
        let new_block = f.alloc_block();
        f.insert_block_after(new_block, Some(block));
        f.move_tail(inst, new_block);
        self.notify_kind(Invalidation::INSTRUCTIONS | Invalidation::BRANCHES);
        new_block
    }

    /// Split `inst`'s block after `inst`.
    ///
    /// # Panics
    ///
    /// Panics if `inst` is a terminator.
    pub fn split_block_after(&mut self, inst: InstId) -> BlockId {
        let f = self.func_mut(inst.func());
        assert!(
            !f.inst_kind(inst).is_terminator(),
            "cannot split after terminator {inst}"
        );
        let block = f.parent_block(inst);
        let new_block = f.alloc_block();
        f.insert_block_after(new_block, Some(block));
        if let Some(next) = f.next_inst(inst) {
            f.move_tail(next, new_block);
        }
        self.notify_kind(Invalidation::INSTRUCTIONS | Invalidation::BRANCHES);
        new_block
    }

    /// Insert a block on the edge(s) `from -> to`.
    ///
    /// The new block takes the same arguments as `to` and branches to it,
    /// forwarding them; `from`'s terminator is retargeted.
    ///
    /// # Panics
    ///
    /// Panics if `from` has no edge to `to`.
    pub fn split_edge(&mut self, from: BlockId, to: BlockId) -> BlockId {
        let f = self.func_mut(from.func());
        let term = f
            .terminator(from)
            .unwrap_or_else(|| panic!("{from} has no terminator"));
        let arg_types: SmallVec<[(Ty, Ownership); 2]> = f
            .block_args(to)
            .iter()
            .map(|&a| (f.value_ty(a), f.value_ownership(a)))
            .collect();
        let span = f.span(term);
        let mid = f.alloc_block();
        f.insert_block_after(mid, Some(from));
        let redirected = f.redirect_edges(term, to, mid);
        assert!(redirected > 0, "{from} has no edge to {to}");
        let args: SmallVec<[ValueId; 2]> = arg_types
            .iter()
            .map(|&(ty, own)| f.push_block_arg(mid, ty, own))
            .collect();
        let br = f.create_inst(InstKind::Branch { target: to }, &args, &[], span);
        f.link_inst(br, InsertionPoint::AtEnd(mid));
        tracing::trace!(%from, %to, %mid, "split edge");
        self.notify_kind(Invalidation::INSTRUCTIONS | Invalidation::BRANCHES);
        mid
    }

    /// Erase an empty-able block: its instructions are erased in reverse
    /// order, then the block itself.
    ///
    /// # Panics
    ///
    /// Panics if the block still has predecessors, or any of its values
    /// is still used.
    pub fn erase_block(&mut self, block: BlockId) {
        let insts: Vec<InstId> = self.function_for(block.func()).insts_rev(block).collect();
        for inst in insts {
            self.erase_instruction(inst);
        }
        self.func_mut(block.func()).remove_block(block);
        self.notify_kind(Invalidation::INSTRUCTIONS | Invalidation::BRANCHES);
    }

    // ── Instructions ────────────────────────────────────────────

    /// Create and link an instruction. The [`Builder`] is the public way in.
    pub(crate) fn insert_instruction(
        &mut self,
        kind: InstKind,
        operands: &[ValueId],
        results: &[(Ty, Ownership)],
        span: Span,
        at: InsertionPoint,
    ) -> InstId {
        let func = self.func;
        let inv = Self::inst_invalidation(&kind);
        let dependency = match &kind {
            InstKind::FunctionRef(callee) => Some(*callee),
            _ => None,
        };
        let f = self.func_mut(func);
        let inst = f.create_inst(kind, operands, results, span);
        f.link_inst(inst, at);
        self.notify_kind(inv);
        if let Some(callee) = dependency {
            self.notify(Notification::DependencyOn(callee));
        }
        inst
    }

    /// Erase an instruction whose results have no uses.
    ///
    /// # Panics
    ///
    /// Panics if a result is still used.
    pub fn erase_instruction(&mut self, inst: InstId) {
        let f = self.func_mut(inst.func());
        let inv = Self::inst_invalidation(f.inst_kind(inst));
        tracing::trace!(%inst, kind = ?f.inst_kind(inst), "erase");
        f.erase_inst(inst);
        self.notify_kind(inv);
    }

    /// Erase `root` after erasing, depth first, every instruction that
    /// uses one of its results (transitively).
    pub fn erase_instruction_with_users(&mut self, root: InstId) {
        // (inst, users_pushed)
        let mut stack: Vec<(InstId, bool)> = vec![(root, false)];
        while let Some((inst, users_pushed)) = stack.pop() {
            let f = self.function_for(inst.func());
            if !f.is_live_inst(inst) || f.inst_block(inst).is_none() {
                continue;
            }
            if users_pushed {
                self.erase_instruction(inst);
                continue;
            }
            stack.push((inst, true));
            for &r in f.results(inst) {
                stack.extend(f.uses(r).users().map(|u| (u, false)));
            }
        }
    }

    /// Erase `inst` together with its debug-only users.
    ///
    /// # Panics
    ///
    /// Panics if any result still has a non-debug use.
    pub fn erase_instruction_with_debug_uses(&mut self, inst: InstId) {
        let f = self.function_for(inst.func());
        let mut debug_users: SmallVec<[InstId; 2]> = SmallVec::new();
        for &r in f.results(inst) {
            let uses = f.uses(r);
            assert!(
                !uses.has_non_debug_uses(),
                "cannot erase {inst}: {r} still has non-debug uses"
            );
            debug_users.extend(uses.users());
        }
        for user in debug_users {
            if self.function().is_live_inst(user) {
                self.erase_instruction(user);
            }
        }
        self.erase_instruction(inst);
    }

    // ── Operands ────────────────────────────────────────────────

    /// Point operand `op` at `value`. Never inserts copies.
    pub fn set_operand(&mut self, op: OperandId, value: ValueId) {
        let f = self.func_mut(op.inst().func());
        let is_callee = op.index() == 0 && f.inst_kind(op.inst()).is_call();
        f.set_operand(op, value);
        self.notify(Notification::InstructionsChanged);
        if is_callee {
            self.notify(Notification::CallsChanged);
        }
    }

    /// Rewire every use of `old` to `new`. Never inserts copies.
    ///
    /// # Panics
    ///
    /// Panics if the two values have different types.
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        let f = self.function_for(old.func());
        assert!(
            f.value_ty(old) == f.value_ty(new),
            "replacing {old}: {:?} with {new}: {:?}",
            f.value_ty(old),
            f.value_ty(new),
        );
        let uses: SmallVec<[OperandId; 4]> = f.uses(old).iter().collect();
        for op in uses {
            self.set_operand(op, new);
        }
    }

    /// The undef sentinel of type `ty`.
    pub fn undef(&mut self, ty: Ty) -> ValueId {
        let func = self.func;
        self.func_mut(func).undef(ty)
    }

    // ── Builders ────────────────────────────────────────────────

    /// Builder appending to `global`'s static initializer.
    ///
    /// Edits made through it emit no notifications: initializers are not
    /// analyzed, and caches of the bound function are unaffected.
    pub fn static_initializer_builder(&mut self, global: GlobalId) -> Builder<'_, 'm> {
        let init = self.module.global(global).initializer;
        Builder::for_static_initializer(self.module.function_mut(init))
    }
}

impl Drop for Context<'_> {
    fn drop(&mut self) {
        self.module.function_mut(self.func).transforming = false;
    }
}

#[cfg(test)]
mod tests;
