//! Value types, reduced to what the optimizer core needs to know.
//!
//! The front end's type system is out of scope here; the optimizer only
//! asks two questions of a type: is it trivially copyable (no ownership
//! obligations), and is it an address.

/// The type of an IR value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// The empty tuple.
    Unit,
    Bool,
    Int,
    /// A reference-counted heap object.
    Ref,
    /// A tagged union. `trivial` is true when no case payload carries
    /// ownership (e.g. `option[int]`).
    Enum { trivial: bool },
    /// A record. `trivial` is true when no field carries ownership.
    Struct { trivial: bool },
    /// The address of a memory location.
    Address,
    /// A reference to a function (the callee operand of `apply`).
    Function,
}

impl Ty {
    /// Returns `true` if values of this type carry no ownership obligation.
    pub fn is_trivial(self) -> bool {
        match self {
            Ty::Unit | Ty::Bool | Ty::Int | Ty::Address | Ty::Function => true,
            Ty::Ref => false,
            Ty::Enum { trivial } | Ty::Struct { trivial } => trivial,
        }
    }

    /// Returns `true` for address types.
    pub fn is_address(self) -> bool {
        matches!(self, Ty::Address)
    }
}

#[cfg(test)]
mod tests;
