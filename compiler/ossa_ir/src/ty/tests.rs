use super::*;

#[test]
fn scalars_are_trivial() {
    assert!(Ty::Int.is_trivial());
    assert!(Ty::Bool.is_trivial());
    assert!(Ty::Unit.is_trivial());
    assert!(Ty::Address.is_trivial());
}

#[test]
fn references_are_not_trivial() {
    assert!(!Ty::Ref.is_trivial());
    assert!(!Ty::Enum { trivial: false }.is_trivial());
    assert!(Ty::Struct { trivial: true }.is_trivial());
}
