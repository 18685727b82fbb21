//! Ownership tags for values and operands.
//!
//! Every value carries an [`Ownership`] describing the obligation its uses
//! have toward it. Every operand slot has an [`OperandOwnership`] describing
//! what the using instruction does with the value. Together they decide
//! which uses *end* an owned value's lifetime: exactly one such use must
//! exist on every path from the definition to a function exit.

/// Per-value ownership kind.
///
/// Forms a small lattice with `None` compatible with every other kind
/// (trivial values never constrain forwarding), see [`merge`](Self::merge).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// No obligation; the value is trivially copyable.
    None,
    /// Unowned reference; uses carry no lifetime obligation.
    Unowned,
    /// Borrowed for a scope; must not outlive whatever guarantees it.
    Guaranteed,
    /// Must be consumed exactly once on every path to function exit.
    Owned,
}

impl Ownership {
    /// Returns `true` for [`Ownership::Owned`].
    #[inline]
    pub fn is_owned(self) -> bool {
        self == Ownership::Owned
    }

    /// Combine the ownership of two forwarded operands.
    ///
    /// `None` is the identity. Mixing two different non-`None` kinds is
    /// not representable and returns `None` (the `Option`).
    pub fn merge(self, other: Ownership) -> Option<Ownership> {
        match (self, other) {
            (Ownership::None, o) | (o, Ownership::None) => Some(o),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }
}

/// What an instruction does with one of its operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperandOwnership {
    /// Debug tracking only; never a real use.
    NonUse,
    /// Reads the value at one point without affecting its lifetime.
    InstantaneousUse,
    /// Borrows the value; the result (if any) is guaranteed.
    Borrow,
    /// Passes the value on (into an aggregate, a block argument, a call,
    /// the caller). Ends the lifetime of an owned value.
    ForwardingConsume,
    /// Destroys the value.
    DestroyingConsume,
}

impl OperandOwnership {
    /// Does a use of this kind end the lifetime of a value with ownership
    /// `value`?
    pub fn ends_lifetime(self, value: Ownership) -> bool {
        match self {
            OperandOwnership::DestroyingConsume => true,
            OperandOwnership::ForwardingConsume => value.is_owned(),
            OperandOwnership::NonUse
            | OperandOwnership::InstantaneousUse
            | OperandOwnership::Borrow => false,
        }
    }
}
