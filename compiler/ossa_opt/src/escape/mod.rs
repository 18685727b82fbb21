//! Escape and alias analysis.
//!
//! An escape walk starts at a [`ProjectedValue`], walks *up* the use-def
//! graph to the value's roots (allocations) and then *down* through every
//! use reachable from them: address projections, aggregate construction
//! and extraction, ownership-forwarding casts, block arguments and, when
//! configured, values loaded back out of memory. The projection path is
//! kept in step with each projection so that only uses touching the
//! tracked part are followed.
//!
//! An [`EscapeVisitor`] sees every value and use the walk reaches and
//! decides to continue, ignore the use, or abort. Aborting means "escapes".
//! Anything the walk cannot see through (calls, globals, function
//! arguments, an exhausted complexity budget) also counts as escaping, so
//! a `false` answer is always safe to rely on.
//!
//! [`may_alias`] is the symmetric closure of [`escapes_to`]: two projected
//! values may alias unless neither reaches the other.

mod alias;
mod path;

pub use alias::AliasAnalysis;
pub use path::{PathComponent, ProjectedValue, ProjectionPath, MAX_PATH_LEN};

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

pub use ossa_ir::EscapeConfig;

use ossa_ir::{BlockId, Function, InstKind, OperandId, ValueDef, ValueId};

/// A visitor's verdict on a value or use reached by the walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkDecision {
    /// Walk through it as usual.
    ContinueWalk,
    /// It cannot make the walked value escape; do not follow it.
    IgnoreUse,
    /// The value escapes; stop.
    AbortWalk,
}

/// Callbacks of an escape walk. Both default to [`WalkDecision::ContinueWalk`].
pub trait EscapeVisitor {
    /// Called for each value the down-walk reaches, before its uses.
    fn visit_value(&mut self, _func: &Function, _value: &ProjectedValue) -> WalkDecision {
        WalkDecision::ContinueWalk
    }

    /// Called for each use of a reached value; `path` is the tracked part
    /// of the used value.
    fn visit_use(
        &mut self,
        _func: &Function,
        _operand: OperandId,
        _path: &ProjectionPath,
    ) -> WalkDecision {
        WalkDecision::ContinueWalk
    }
}

/// Visitor that only relies on the walk's built-in escape points.
struct EscapingVisitor;

impl EscapeVisitor for EscapingVisitor {}

/// Aborts when the walk reaches `target` with an overlapping path.
///
/// Returning a value does not make it reach anything still inside the
/// function, so returns are ignored.
pub struct EscapesToValueVisitor {
    target: ProjectedValue,
}

impl EscapesToValueVisitor {
    pub fn new(target: ProjectedValue) -> Self {
        EscapesToValueVisitor { target }
    }
}

impl EscapeVisitor for EscapesToValueVisitor {
    fn visit_value(&mut self, _func: &Function, value: &ProjectedValue) -> WalkDecision {
        if value.value == self.target.value && value.path.may_overlap(&self.target.path) {
            WalkDecision::AbortWalk
        } else {
            WalkDecision::ContinueWalk
        }
    }

    fn visit_use(
        &mut self,
        func: &Function,
        operand: OperandId,
        _path: &ProjectionPath,
    ) -> WalkDecision {
        if matches!(func.inst_kind(operand.inst()), InstKind::Return) {
            WalkDecision::IgnoreUse
        } else {
            WalkDecision::ContinueWalk
        }
    }
}

/// Does `value` escape the function (to a call, a global, the caller)?
pub fn is_escaping(func: &Function, value: &ProjectedValue, config: &EscapeConfig) -> bool {
    walk(func, value, config, &mut EscapingVisitor)
}

/// Can `from` reach `to`?
pub fn escapes_to(
    func: &Function,
    from: &ProjectedValue,
    to: &ProjectedValue,
    config: &EscapeConfig,
) -> bool {
    walk(func, from, config, &mut EscapesToValueVisitor::new(to.clone()))
}

/// May `x` and `y` address the same storage?
///
/// Only a failed reach in *both* directions proves them distinct: one
/// side being a local allocation says nothing about whether the other
/// side was derived from it.
pub fn may_alias(
    func: &Function,
    x: &ProjectedValue,
    y: &ProjectedValue,
    config: &EscapeConfig,
) -> bool {
    let result = escapes_to(func, x, y, config) || escapes_to(func, y, x, config);
    tracing::trace!(%x, %y, result, "may_alias");
    result
}

/// Run an escape walk from `start` with `visitor`. Returns `true` if the
/// walk was aborted (the value escapes).
pub fn walk(
    func: &Function,
    start: &ProjectedValue,
    config: &EscapeConfig,
    visitor: &mut impl EscapeVisitor,
) -> bool {
    let mut walker = Walker {
        func,
        config,
        visitor,
        budget: config.complexity_budget,
        visited: FxHashSet::default(),
        stack: Vec::new(),
    };
    walker.run(start)
}

// ── Walker ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Direction {
    /// Towards the value's roots.
    Up,
    /// Through the value's uses.
    Down,
}

struct Walker<'f, 'c, V> {
    func: &'f Function,
    config: &'c EscapeConfig,
    visitor: &'c mut V,
    budget: usize,
    visited: FxHashSet<(Direction, ValueId, ProjectionPath)>,
    stack: Vec<(Direction, ValueId, ProjectionPath)>,
}

impl<V: EscapeVisitor> Walker<'_, '_, V> {
    fn run(&mut self, start: &ProjectedValue) -> bool {
        self.push(Direction::Up, start.value, start.path.clone());
        while let Some((dir, value, path)) = self.stack.pop() {
            if self.budget == 0 {
                tracing::trace!(start = %start, "escape walk over budget");
                return true;
            }
            self.budget -= 1;
            let escaped = match dir {
                Direction::Up => self.walk_up(value, path),
                Direction::Down => self.walk_down(value, path),
            };
            if escaped {
                return true;
            }
        }
        false
    }

    fn push(&mut self, dir: Direction, value: ValueId, path: ProjectionPath) {
        if self.visited.insert((dir, value, path.clone())) {
            self.stack.push((dir, value, path));
        }
    }

    fn is_ignored(&self, value: ValueId) -> bool {
        let ty = self.func.value_ty(value);
        self.config.ignore_trivial && ty.is_trivial() && !ty.is_address()
    }

    // ── Up ──────────────────────────────────────────────────────

    fn walk_up(&mut self, value: ValueId, path: ProjectionPath) -> bool {
        if self.is_ignored(value) {
            return false;
        }
        let func = self.func;
        match func.value_def(value) {
            ValueDef::Undef => false,
            ValueDef::BlockArg { block, index } => {
                // Function arguments come from the caller.
                if func.entry_block() == Some(block) {
                    return true;
                }
                let mut preds: SmallVec<[BlockId; 4]> =
                    SmallVec::from_slice(func.predecessors(block));
                preds.sort_unstable();
                preds.dedup();
                for pred in preds {
                    let Some(term) = func.terminator(pred) else {
                        continue;
                    };
                    match func.inst_kind(term) {
                        InstKind::Branch { .. } => {
                            if let Some(incoming) = func.operands(term).nth(index as usize) {
                                self.push(Direction::Up, incoming, path.clone());
                            }
                        }
                        InstKind::SwitchEnum { cases, .. } => {
                            let Some(scrutinee) = func.operands(term).next() else {
                                continue;
                            };
                            for &(case, _) in cases.iter().filter(|&&(_, t)| t == block) {
                                self.push(
                                    Direction::Up,
                                    scrutinee,
                                    path.push(PathComponent::Case(case)),
                                );
                            }
                        }
                        _ => {}
                    }
                }
                false
            }
            ValueDef::Result { inst, .. } => {
                let operands: SmallVec<[ValueId; 4]> = func.operands(inst).collect();
                match func.inst_kind(inst) {
                    InstKind::AllocStack | InstKind::AllocRef => {
                        self.push(Direction::Down, value, path);
                        false
                    }
                    // Visible to other functions, or of unknown provenance.
                    InstKind::GlobalAddr(_) | InstKind::Load(_) | InstKind::Apply => true,
                    InstKind::StructExtract { field } | InstKind::FieldAddr { field } => {
                        let outer = path.push(PathComponent::Field(*field));
                        self.push(Direction::Up, operands[0], outer);
                        false
                    }
                    InstKind::UncheckedEnumData { case } => {
                        let outer = path.push(PathComponent::Case(*case));
                        self.push(Direction::Up, operands[0], outer);
                        false
                    }
                    InstKind::Upcast | InstKind::CopyValue | InstKind::BeginBorrow => {
                        self.push(Direction::Up, operands[0], path);
                        false
                    }
                    InstKind::Struct => {
                        if let Some(&PathComponent::Field(n)) = path.components().first() {
                            if let (Some(&field), Some(rest)) = (
                                operands.get(n as usize),
                                path.project(PathComponent::Field(n)),
                            ) {
                                self.push(Direction::Up, field, rest);
                            }
                        } else {
                            let rest = path
                                .project(PathComponent::AnyField)
                                .unwrap_or_else(ProjectionPath::anything);
                            for &field in &operands {
                                self.push(Direction::Up, field, rest.clone());
                            }
                        }
                        false
                    }
                    InstKind::Enum { case } => {
                        if let (Some(&payload), Some(rest)) =
                            (operands.first(), path.project(PathComponent::Case(*case)))
                        {
                            self.push(Direction::Up, payload, rest);
                        }
                        false
                    }
                    InstKind::IntLiteral(_)
                    | InstKind::Binary(_)
                    | InstKind::FunctionRef(_)
                    | InstKind::EndBorrow
                    | InstKind::DestroyValue
                    | InstKind::DeallocStack
                    | InstKind::Store(_)
                    | InstKind::DebugValue
                    | InstKind::FixLifetime
                    | InstKind::Return
                    | InstKind::Branch { .. }
                    | InstKind::CondBranch { .. }
                    | InstKind::SwitchEnum { .. }
                    | InstKind::Unreachable => false,
                }
            }
        }
    }

    // ── Down ────────────────────────────────────────────────────

    fn walk_down(&mut self, value: ValueId, path: ProjectionPath) -> bool {
        let func = self.func;
        let projected = ProjectedValue::with_path(value, path);
        match self.visitor.visit_value(func, &projected) {
            WalkDecision::AbortWalk => return true,
            WalkDecision::IgnoreUse => return false,
            WalkDecision::ContinueWalk => {}
        }
        if self.is_ignored(value) {
            return false;
        }
        for op in func.uses(value) {
            match self.visitor.visit_use(func, op, &projected.path) {
                WalkDecision::AbortWalk => return true,
                WalkDecision::IgnoreUse => continue,
                WalkDecision::ContinueWalk => {}
            }
            if self.walk_use(op, &projected.path) {
                return true;
            }
        }
        false
    }

    /// Follow one use. Returns `true` if the use is an escape point.
    fn walk_use(&mut self, op: OperandId, path: &ProjectionPath) -> bool {
        let func = self.func;
        let inst = op.inst();
        let result = func.result(inst);
        let forward = |walker: &mut Self, path: Option<ProjectionPath>| {
            if let (Some(r), Some(p)) = (result, path) {
                walker.push(Direction::Down, r, p);
            }
        };
        match func.inst_kind(inst) {
            InstKind::StructExtract { field } | InstKind::FieldAddr { field } => {
                forward(self, path.project(PathComponent::Field(*field)));
                false
            }
            InstKind::UncheckedEnumData { case } => {
                forward(self, path.project(PathComponent::Case(*case)));
                false
            }
            InstKind::Struct => {
                #[expect(clippy::cast_possible_truncation, reason = "operand counts fit in u32")]
                let field = op.index() as u32;
                forward(self, Some(path.push(PathComponent::Field(field))));
                false
            }
            InstKind::Enum { case } => {
                forward(self, Some(path.push(PathComponent::Case(*case))));
                false
            }
            InstKind::Upcast | InstKind::CopyValue | InstKind::BeginBorrow => {
                forward(self, Some(path.clone()));
                false
            }
            InstKind::Load(_) => {
                if self.config.follow_loads {
                    forward(self, Some(path.clone()));
                }
                false
            }
            // [src, dest]: storing the tracked value makes it reachable
            // through `dest`; storing into tracked memory does not move it.
            InstKind::Store(_) => {
                if op.index() != 0 {
                    return false;
                }
                if !self.config.follow_loads {
                    return true;
                }
                if let Some(dest) = func.operands(inst).nth(1) {
                    self.push(Direction::Up, dest, path.clone());
                }
                false
            }
            // Arguments go to unknown code; the callee operand does not.
            InstKind::Apply => op.index() != 0,
            InstKind::Return => true,
            InstKind::Branch { target } => {
                if let Some(&arg) = func.block_args(*target).get(op.index()) {
                    self.push(Direction::Down, arg, path.clone());
                }
                false
            }
            InstKind::SwitchEnum { cases, .. } => {
                for &(case, target) in cases {
                    if let (Some(&arg), Some(p)) = (
                        func.block_args(target).first(),
                        path.project(PathComponent::Case(case)),
                    ) {
                        self.push(Direction::Down, arg, p);
                    }
                }
                false
            }
            InstKind::IntLiteral(_)
            | InstKind::Binary(_)
            | InstKind::EndBorrow
            | InstKind::DestroyValue
            | InstKind::AllocStack
            | InstKind::DeallocStack
            | InstKind::AllocRef
            | InstKind::GlobalAddr(_)
            | InstKind::FunctionRef(_)
            | InstKind::DebugValue
            | InstKind::FixLifetime
            | InstKind::CondBranch { .. }
            | InstKind::Unreachable => false,
        }
    }
}
