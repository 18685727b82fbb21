use pretty_assertions::assert_eq;

use ossa_ir::{
    BinaryOp, BlockId, Builder, Context, InstId, InstKind, Module, Ownership, PassOptions, Ty,
    ValueId,
};

use crate::test_helpers::{all_kinds, assert_verifies, count_insts, enum_ty, kinds};

use super::*;

fn def(ctx: &Context<'_>, value: ValueId) -> InstId {
    ctx.function().defining_inst(value).unwrap()
}

/// ```text
/// entry:
///   %p = alloc_ref
///   %v1 = enum #0, %p
///   <extra>
///   switch_enum %v1 [#0: bb1, #1: bb2]
/// bb1(%arg: owned):
///   destroy_value %arg
///   return
/// bb2:
///   unreachable
/// ```
struct Dispatch {
    entry: BlockId,
    bb1: BlockId,
    payload: ValueId,
    enum_value: ValueId,
    switch: InstId,
}

fn build_dispatch(
    ctx: &mut Context<'_>,
    extra: impl FnOnce(&mut Builder<'_, '_>, ValueId),
) -> Dispatch {
    let entry = ctx.create_block();
    let bb1 = ctx.create_block();
    let bb2 = ctx.create_block();
    let arg = ctx.add_block_arg(bb1, Ty::Ref, Ownership::Owned);

    let mut b = Builder::at_end(ctx, entry);
    let payload = b.create_alloc_ref();
    let enum_value = b.create_enum(enum_ty(), 0, Some(payload));
    extra(&mut b, enum_value);
    let switch = b.create_switch_enum(enum_value, &[(0, bb1), (1, bb2)], None);

    let mut b = Builder::at_end(ctx, bb1);
    b.create_destroy_value(arg);
    b.create_return(None);
    Builder::at_end(ctx, bb2).create_unreachable();

    Dispatch {
        entry,
        bb1,
        payload,
        enum_value,
        switch,
    }
}

// ── switch_enum ─────────────────────────────────────────────────────

#[test]
fn switch_of_known_enum_becomes_branch() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let d = build_dispatch(&mut ctx, |_, _| {});

    assert!(simplify_switch_enum(&mut ctx, d.switch));

    let func = ctx.function();
    assert_eq!(
        kinds(func, d.entry),
        vec![InstKind::AllocRef, InstKind::Branch { target: d.bb1 }]
    );
    let br = func.terminator(d.entry).unwrap();
    assert_eq!(func.operands(br).collect::<Vec<_>>(), vec![d.payload]);
    assert!(!func.is_live_inst(d.switch));
    drop(ctx);
    assert_verifies(&m, f);
}

#[test]
fn second_use_of_owned_enum_leaves_ir_unchanged() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let d = build_dispatch(&mut ctx, |b, v| {
        b.create_fix_lifetime(v);
    });
    let before = all_kinds(ctx.function());

    assert!(!simplify_switch_enum(&mut ctx, d.switch));

    assert_eq!(all_kinds(ctx.function()), before);
    assert_eq!(ctx.function().uses(d.enum_value).len(), 2);
}

#[test]
fn debug_uses_do_not_block_the_rewrite() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let d = build_dispatch(&mut ctx, |b, v| {
        b.create_debug_value(v);
    });

    assert!(simplify_switch_enum(&mut ctx, d.switch));

    let func = ctx.function();
    assert_eq!(count_insts(func, |k| matches!(k, InstKind::Enum { .. })), 0);
    assert_eq!(count_insts(func, |k| matches!(k, InstKind::DebugValue)), 0);
    drop(ctx);
    assert_verifies(&m, f);
}

#[test]
fn preserved_debug_uses_block_an_owned_rewrite() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let options = PassOptions {
        preserve_debug_info: true,
        ..PassOptions::default()
    };
    let mut ctx = Context::with_options(&mut m, f, options);
    let d = build_dispatch(&mut ctx, |b, v| {
        b.create_debug_value(v);
    });
    let before = all_kinds(ctx.function());

    assert!(!simplify_switch_enum(&mut ctx, d.switch));
    assert_eq!(all_kinds(ctx.function()), before);
}

#[test]
fn rewritten_form_is_a_fixed_point() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let d = build_dispatch(&mut ctx, |_, _| {});
    assert!(simplify_switch_enum(&mut ctx, d.switch));
    let after = all_kinds(ctx.function());

    let br = ctx.function().terminator(d.entry).unwrap();
    assert!(!simplify_switch_enum(&mut ctx, br));
    assert!(!simplify_function(&mut ctx, 4));
    assert_eq!(all_kinds(ctx.function()), after);
}

#[test]
fn trivial_enum_with_other_uses_is_kept() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let bb1 = ctx.create_block();
    let bb2 = ctx.create_block();
    let arg = ctx.add_block_arg(bb1, Ty::Int, Ownership::None);

    let mut b = Builder::at_end(&mut ctx, entry);
    let p = b.create_int_literal(7);
    let v = b.create_enum(Ty::Enum { trivial: true }, 0, Some(p));
    b.create_fix_lifetime(v);
    let switch = b.create_switch_enum(v, &[(0, bb1), (1, bb2)], None);
    Builder::at_end(&mut ctx, bb1).create_return(Some(arg));
    Builder::at_end(&mut ctx, bb2).create_unreachable();

    assert!(simplify_switch_enum(&mut ctx, switch));

    let func = ctx.function();
    assert!(func.is_live_inst(def(&ctx, v)));
    assert_eq!(
        kinds(func, entry).last(),
        Some(&InstKind::Branch { target: bb1 })
    );
    drop(ctx);
    assert_verifies(&m, f);
}

#[test]
fn payloadless_case_branches_without_arguments() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let some = ctx.create_block();
    let none = ctx.create_block();
    ctx.add_block_arg(some, Ty::Int, Ownership::None);

    let mut b = Builder::at_end(&mut ctx, entry);
    let v = b.create_enum(Ty::Enum { trivial: true }, 1, None);
    let switch = b.create_switch_enum(v, &[(0, some), (1, none)], None);
    Builder::at_end(&mut ctx, some).create_unreachable();
    Builder::at_end(&mut ctx, none).create_return(None);

    assert!(simplify_switch_enum(&mut ctx, switch));

    let func = ctx.function();
    assert_eq!(kinds(func, entry), vec![InstKind::Branch { target: none }]);
    let br = func.terminator(entry).unwrap();
    assert_eq!(func.operands(br).len(), 0);
}

#[test]
fn unmatched_case_falls_back_to_default() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let zero = ctx.create_block();
    let other = ctx.create_block();

    let mut b = Builder::at_end(&mut ctx, entry);
    let v = b.create_enum(Ty::Enum { trivial: true }, 3, None);
    let switch = b.create_switch_enum(v, &[(0, zero)], Some(other));
    Builder::at_end(&mut ctx, zero).create_unreachable();
    Builder::at_end(&mut ctx, other).create_return(None);

    assert!(simplify_switch_enum(&mut ctx, switch));
    assert_eq!(
        kinds(ctx.function(), entry),
        vec![InstKind::Branch { target: other }]
    );
}

#[test]
#[should_panic(expected = "takes 2 arguments")]
fn case_block_with_two_arguments_is_fatal() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let bb1 = ctx.create_block();
    ctx.add_block_arg(bb1, Ty::Int, Ownership::None);
    ctx.add_block_arg(bb1, Ty::Int, Ownership::None);

    let mut b = Builder::at_end(&mut ctx, entry);
    let p = b.create_int_literal(1);
    let v = b.create_enum(Ty::Enum { trivial: true }, 0, Some(p));
    let switch = b.create_switch_enum(v, &[(0, bb1)], None);
    simplify_switch_enum(&mut ctx, switch);
}

#[test]
fn owned_payload_routed_to_a_payloadless_default_is_left_alone() {
    let mut m = Module::new();
    let f = m.add_function("f");
    {
        let mut ctx = Context::new(&mut m, f);
        let entry = ctx.create_block();
        let bb1 = ctx.create_block();
        let bb2 = ctx.create_block();
        let arg = ctx.add_block_arg(bb1, Ty::Ref, Ownership::Owned);
        let mut b = Builder::at_end(&mut ctx, entry);
        let p = b.create_alloc_ref();
        let v = b.create_enum(enum_ty(), 3, Some(p));
        b.create_switch_enum(v, &[(0, bb1)], Some(bb2));
        let mut b = Builder::at_end(&mut ctx, bb1);
        b.create_destroy_value(arg);
        b.create_return(None);
        Builder::at_end(&mut ctx, bb2).create_return(None);
    }
    assert_verifies(&m, f);
    let before = all_kinds(m.function(f));

    let mut ctx = Context::new(&mut m, f);
    assert!(!simplify_function(&mut ctx, 8));
    assert_eq!(all_kinds(ctx.function()), before);
}

#[test]
fn payload_case_reached_by_a_payloadless_enum_is_left_alone() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let bb1 = ctx.create_block();
    ctx.add_block_arg(bb1, Ty::Int, Ownership::None);

    let mut b = Builder::at_end(&mut ctx, entry);
    let v = b.create_enum(Ty::Enum { trivial: true }, 0, None);
    let switch = b.create_switch_enum(v, &[(0, bb1)], None);
    Builder::at_end(&mut ctx, bb1).create_return(None);

    assert!(!simplify_switch_enum(&mut ctx, switch));
    let func = ctx.function();
    assert_eq!(func.terminator(entry), Some(switch));
    assert_eq!(kinds(func, entry)[0], InstKind::Enum { case: 0 });
}

// ── Other pair rules ────────────────────────────────────────────────

#[test]
fn unchecked_enum_data_of_enum_is_the_payload() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let p = b.create_int_literal(4);
    let e = b.create_enum(Ty::Enum { trivial: true }, 2, Some(p));
    let data = b.create_unchecked_enum_data(e, 2, Ty::Int);
    let sum = b.create_binary(BinaryOp::Add, data, data);
    b.create_return(Some(sum));

    let inst = def(&ctx, data);
    assert!(simplify_unchecked_enum_data(&mut ctx, inst));

    let func = ctx.function();
    assert_eq!(func.operands(def(&ctx, sum)).collect::<Vec<_>>(), vec![p, p]);
    assert_eq!(count_insts(func, |k| matches!(k, InstKind::Enum { .. })), 0);
}

#[test]
fn unchecked_enum_data_of_another_case_is_left_alone() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let p = b.create_int_literal(4);
    let e = b.create_enum(Ty::Enum { trivial: true }, 2, Some(p));
    let data = b.create_unchecked_enum_data(e, 1, Ty::Int);
    b.create_return(Some(data));

    let inst = def(&ctx, data);
    assert!(!simplify_unchecked_enum_data(&mut ctx, inst));
}

#[test]
fn struct_extract_of_trivial_struct_is_the_field() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let x = b.create_int_literal(1);
    let y = b.create_int_literal(2);
    let s = b.create_struct(Ty::Struct { trivial: true }, &[x, y]);
    let field = b.create_struct_extract(s, 1, Ty::Int);
    b.create_return(Some(field));

    let inst = def(&ctx, field);
    assert!(simplify_struct_extract(&mut ctx, inst));

    let func = ctx.function();
    let ret = func.terminator(entry).unwrap();
    assert_eq!(func.operands(ret).collect::<Vec<_>>(), vec![y]);
    assert_eq!(count_insts(func, |k| matches!(k, InstKind::Struct)), 0);
}

#[test]
fn struct_extract_of_owned_struct_is_left_alone() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let r = b.create_alloc_ref();
    let s = b.create_struct(Ty::Struct { trivial: false }, &[r]);
    let field = b.create_struct_extract(s, 0, Ty::Ref);
    b.create_fix_lifetime(field);
    b.create_destroy_value(s);
    b.create_return(None);

    let inst = def(&ctx, field);
    assert!(!simplify_struct_extract(&mut ctx, inst));
}

#[test]
fn destroy_of_unused_copy_disappears() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let r = b.create_alloc_ref();
    let c = b.create_copy_value(r);
    let destroy = b.create_destroy_value(c);
    b.create_destroy_value(r);
    b.create_return(None);

    assert!(simplify_destroy_of_copy(&mut ctx, destroy));

    let func = ctx.function();
    assert_eq!(
        kinds(func, entry),
        vec![InstKind::AllocRef, InstKind::DestroyValue, InstKind::Return]
    );
    drop(ctx);
    assert_verifies(&m, f);
}

#[test]
fn destroy_of_copy_with_other_uses_is_kept() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let r = b.create_alloc_ref();
    let c = b.create_copy_value(r);
    b.create_fix_lifetime(c);
    let destroy = b.create_destroy_value(c);
    b.create_destroy_value(r);
    b.create_return(None);

    assert!(!simplify_destroy_of_copy(&mut ctx, destroy));
}

// ── Driver ──────────────────────────────────────────────────────────

#[test]
fn driver_folds_chained_patterns_to_a_fixed_point() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let bb1 = ctx.create_block();
    let bb2 = ctx.create_block();
    let arg = ctx.add_block_arg(bb1, Ty::Int, Ownership::None);
    let opt = Ty::Enum { trivial: true };

    let mut b = Builder::at_end(&mut ctx, entry);
    let p = b.create_int_literal(5);
    let e = b.create_enum(opt, 0, Some(p));
    let data = b.create_unchecked_enum_data(e, 0, Ty::Int);
    let pair = b.create_struct(Ty::Struct { trivial: true }, &[data, data]);
    let first = b.create_struct_extract(pair, 0, Ty::Int);
    let v = b.create_enum(opt, 0, Some(first));
    b.create_switch_enum(v, &[(0, bb1), (1, bb2)], None);
    Builder::at_end(&mut ctx, bb1).create_return(Some(arg));
    Builder::at_end(&mut ctx, bb2).create_unreachable();

    assert!(simplify_function(&mut ctx, 8));

    let func = ctx.function();
    assert_eq!(
        kinds(func, entry),
        vec![InstKind::IntLiteral(5), InstKind::Branch { target: bb1 }]
    );
    let br = func.terminator(entry).unwrap();
    assert_eq!(func.operands(br).collect::<Vec<_>>(), vec![p]);
    assert!(!simplify_function(&mut ctx, 8));
    drop(ctx);
    assert_verifies(&m, f);
}

#[test]
fn pass_reports_instruction_changes() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    build_dispatch(&mut ctx, |_, _| {});
    let mut pass = Simplification::new(4);
    assert_eq!(pass.name(), "simplify");
    assert!(pass.run(&mut ctx));
    let summary = ctx.finish();
    assert!(summary.changed.contains(ossa_ir::Invalidation::BRANCHES));
}
