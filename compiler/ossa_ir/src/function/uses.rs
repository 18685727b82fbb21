//! Use lists: the operands that reference a value.

use crate::ids::{InstId, OperandId};

use super::Function;

/// Borrowed view of a value's use list, in insertion order.
///
/// Debug-only users (`debug_value`) are part of the list; the
/// `*_non_debug` and [`ignore_debug_uses`](Self::ignore_debug_uses)
/// helpers filter them out, since they never count as real consumers.
#[derive(Clone, Copy)]
pub struct UseList<'f> {
    func: &'f Function,
    first: Option<OperandId>,
}

impl<'f> UseList<'f> {
    pub(super) fn new(func: &'f Function, first: Option<OperandId>) -> Self {
        UseList { func, first }
    }

    pub fn iter(&self) -> UseIter<'f> {
        UseIter {
            func: self.func,
            next: self.first,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// The only use, debug uses included.
    pub fn single_use(&self) -> Option<OperandId> {
        let mut it = self.iter();
        let first = it.next()?;
        it.next().is_none().then_some(first)
    }

    /// Uses whose user is not a debug instruction.
    pub fn ignore_debug_uses(&self) -> impl Iterator<Item = OperandId> + 'f {
        let func = self.func;
        self.iter().filter(move |&op| !func.is_debug_use(op))
    }

    /// The only non-debug use.
    pub fn single_non_debug_use(&self) -> Option<OperandId> {
        let mut it = self.ignore_debug_uses();
        let first = it.next()?;
        it.next().is_none().then_some(first)
    }

    pub fn has_non_debug_uses(&self) -> bool {
        self.ignore_debug_uses().next().is_some()
    }

    /// Using instructions, one per operand (an instruction that uses the
    /// value twice appears twice).
    pub fn users(&self) -> impl Iterator<Item = InstId> + 'f {
        self.iter().map(OperandId::inst)
    }

    /// Lifetime-ending uses.
    pub fn consuming_uses(&self) -> impl Iterator<Item = OperandId> + 'f {
        let func = self.func;
        self.iter().filter(move |&op| func.is_lifetime_ending(op))
    }
}

impl<'f> IntoIterator for UseList<'f> {
    type Item = OperandId;
    type IntoIter = UseIter<'f>;

    fn into_iter(self) -> UseIter<'f> {
        self.iter()
    }
}

/// Iterator over a use list.
pub struct UseIter<'f> {
    func: &'f Function,
    next: Option<OperandId>,
}

impl Iterator for UseIter<'_> {
    type Item = OperandId;

    fn next(&mut self) -> Option<OperandId> {
        let cur = self.next?;
        self.next = self.func.next_use(cur);
        Some(cur)
    }
}
