use pretty_assertions::assert_eq;

use ossa_ir::{BinaryOp, BlockId, Builder, Context, DominatorTree, InstKind, Module};

use crate::test_helpers::{assert_verifies, count_insts, kinds};

use super::*;

/// Append `cond_br` on a constant to `block`.
fn cond_branch(
    ctx: &mut Context<'_>,
    block: BlockId,
    then_block: BlockId,
    else_block: BlockId,
) {
    let mut b = Builder::at_end(ctx, block);
    let one = b.create_int_literal(1);
    let cond = b.create_binary(BinaryOp::Eq, one, one);
    b.create_cond_branch(cond, then_block, else_block);
}

/// Consume `value` in `block`, then return.
fn consume_and_return(ctx: &mut Context<'_>, block: BlockId, value: ValueId) {
    let mut b = Builder::at_end(ctx, block);
    b.create_destroy_value(value);
    b.create_return(None);
}

// ── BasicBlockRange ─────────────────────────────────────────────────

#[test]
fn diamond_range_has_no_exits() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let left = ctx.create_block();
    let right = ctx.create_block();
    let join = ctx.create_block();
    cond_branch(&mut ctx, entry, left, right);
    Builder::at_end(&mut ctx, left).create_branch(join, &[]);
    Builder::at_end(&mut ctx, right).create_branch(join, &[]);
    Builder::at_end(&mut ctx, join).create_return(None);

    let func = ctx.function();
    let mut range = BasicBlockRange::new(func, entry);
    range.insert(func, join);

    assert!(range.contains(entry));
    assert!(range.contains(left));
    assert!(range.contains(right));
    assert!(!range.contains(join));
    assert!(range.inclusive_range_contains(join));
    assert_eq!(range.ends().collect::<Vec<_>>(), vec![join]);
    assert_eq!(range.interiors().count(), 0);
    assert!(range.exits(func).is_empty());
    assert!(range.is_valid(&DominatorTree::build(func)));
}

#[test]
fn end_inside_a_cycle_is_an_interior_block() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let header = ctx.create_block();
    let body = ctx.create_block();
    let exit = ctx.create_block();
    Builder::at_end(&mut ctx, entry).create_branch(header, &[]);
    cond_branch(&mut ctx, header, body, exit);
    Builder::at_end(&mut ctx, body).create_branch(header, &[]);
    Builder::at_end(&mut ctx, exit).create_return(None);

    let func = ctx.function();
    let mut range = BasicBlockRange::new(func, entry);
    range.insert(func, body);

    assert!(range.contains(body));
    assert_eq!(range.interiors().collect::<Vec<_>>(), vec![body]);
    assert_eq!(range.ends().count(), 0);
    assert_eq!(range.exits(func), vec![(header, exit)]);
}

// ── make_available ──────────────────────────────────────────────────

#[test]
fn destination_outside_a_cycle_gets_the_original_value() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let def = ctx.create_block();
    let dest = ctx.create_block();
    let other = ctx.create_block();
    let r = Builder::at_end(&mut ctx, def).create_alloc_ref();
    cond_branch(&mut ctx, def, dest, other);
    Builder::at_end(&mut ctx, dest).create_return(None);
    Builder::at_end(&mut ctx, other).create_return(None);

    let available = make_available(&mut ctx, r, dest);
    assert_eq!(available, r);
    let ret = ctx.function().terminator(dest).unwrap();
    Builder::before(&mut ctx, ret).create_destroy_value(available);

    let func = ctx.function();
    assert_eq!(count_insts(func, |k| matches!(k, InstKind::CopyValue)), 0);
    assert_eq!(
        kinds(func, other),
        vec![InstKind::DestroyValue, InstKind::Return]
    );
    drop(ctx);
    assert_verifies(&m, f);
}

#[test]
fn destination_in_a_loop_gets_a_copy_per_iteration() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let def = ctx.create_block();
    let header = ctx.create_block();
    let body = ctx.create_block();
    let exit = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, def);
    let r = b.create_alloc_ref();
    b.create_branch(header, &[]);
    cond_branch(&mut ctx, header, body, exit);
    Builder::at_end(&mut ctx, body).create_branch(header, &[]);
    Builder::at_end(&mut ctx, exit).create_return(None);

    let available = make_available(&mut ctx, r, body);
    assert_ne!(available, r);
    let br = ctx.function().terminator(body).unwrap();
    Builder::before(&mut ctx, br).create_destroy_value(available);

    let func = ctx.function();
    let first = func.first_inst(body).unwrap();
    assert_eq!(func.inst_kind(first), &InstKind::CopyValue);
    assert_eq!(func.results(first), &[available]);
    assert_eq!(
        kinds(func, exit),
        vec![InstKind::DestroyValue, InstKind::Return]
    );
    // One destroy on the exit, one for the copy.
    assert_eq!(
        count_insts(func, |k| matches!(k, InstKind::DestroyValue)),
        2
    );
    drop(ctx);
    assert_verifies(&m, f);
}

#[test]
fn loop_back_to_the_defining_block_consumes_directly() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let def = ctx.create_block();
    let dest = ctx.create_block();
    let exit = ctx.create_block();
    Builder::at_end(&mut ctx, entry).create_branch(def, &[]);
    let r = Builder::at_end(&mut ctx, def).create_alloc_ref();
    cond_branch(&mut ctx, def, dest, exit);
    Builder::at_end(&mut ctx, dest).create_branch(def, &[]);
    Builder::at_end(&mut ctx, exit).create_return(None);

    let available = make_available(&mut ctx, r, dest);
    assert_eq!(available, r);
    let br = ctx.function().terminator(dest).unwrap();
    Builder::before(&mut ctx, br).create_destroy_value(available);

    let func = ctx.function();
    assert_eq!(count_insts(func, |k| matches!(k, InstKind::CopyValue)), 0);
    assert_eq!(
        kinds(func, exit),
        vec![InstKind::DestroyValue, InstKind::Return]
    );
    drop(ctx);
    assert_verifies(&m, f);
}

#[test]
fn back_edge_into_the_defining_block_is_split() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let def = ctx.create_block();
    let latch = ctx.create_block();
    let dest = ctx.create_block();
    Builder::at_end(&mut ctx, entry).create_branch(def, &[]);
    let mut b = Builder::at_end(&mut ctx, def);
    let r = b.create_alloc_ref();
    b.create_branch(latch, &[]);
    cond_branch(&mut ctx, latch, dest, def);
    let blocks_before = ctx.function().num_blocks();

    let available = make_available(&mut ctx, r, dest);
    assert_eq!(available, r);
    consume_and_return(&mut ctx, dest, available);

    let func = ctx.function();
    assert_eq!(func.num_blocks(), blocks_before + 1);
    let split = func
        .predecessors(def)
        .iter()
        .copied()
        .find(|&p| p != entry)
        .unwrap();
    assert_eq!(
        kinds(func, split),
        vec![InstKind::DestroyValue, InstKind::Branch { target: def }]
    );
    drop(ctx);
    assert_verifies(&m, f);
}

#[test]
fn same_block_is_a_no_op() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let r = Builder::at_end(&mut ctx, entry).create_alloc_ref();
    assert_eq!(make_available(&mut ctx, r, entry), r);
    consume_and_return(&mut ctx, entry, r);
    drop(ctx);
    assert_verifies(&m, f);
}

#[test]
#[should_panic(expected = "is not owned")]
fn trivial_value_is_rejected() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let next = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let x = b.create_int_literal(1);
    b.create_branch(next, &[]);
    make_available(&mut ctx, x, next);
}

#[test]
#[should_panic(expected = "does not dominate")]
fn non_dominated_destination_is_rejected() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let left = ctx.create_block();
    let right = ctx.create_block();
    cond_branch(&mut ctx, entry, left, right);
    let r = Builder::at_end(&mut ctx, left).create_alloc_ref();
    Builder::at_end(&mut ctx, left).create_return(None);
    Builder::at_end(&mut ctx, right).create_return(None);
    make_available(&mut ctx, r, right);
}
