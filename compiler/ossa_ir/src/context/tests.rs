use pretty_assertions::assert_eq;

use crate::analysis::{DeadEndBlocks, DominatorTree};
use crate::builder::Builder;
use crate::ids::FuncId;
use crate::inst::InstKind;
use crate::module::Module;
use crate::ownership::Ownership;
use crate::test_helpers::{count_insts, kinds};
use crate::ty::Ty;
use crate::verify::verify_function;

use super::*;

/// `entry: %r = alloc_ref; destroy_value %r; return`
fn simple(m: &mut Module) -> FuncId {
    let f = m.add_function("simple");
    let mut ctx = Context::new(m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let r = b.create_alloc_ref();
    b.create_destroy_value(r);
    b.create_return(None);
    f
}

#[test]
fn context_marks_function_while_alive() {
    let mut m = Module::new();
    let f = simple(&mut m);
    assert!(!m.function(f).is_being_transformed());
    {
        let ctx = Context::new(&mut m, f);
        assert!(ctx.function().is_being_transformed());
    }
    assert!(!m.function(f).is_being_transformed());
}

#[test]
#[should_panic(expected = "cannot mutate")]
fn mutating_another_function_is_fatal() {
    let mut m = Module::new();
    let g = simple(&mut m);
    let other = m.function(g).first_inst(m.function(g).entry_block().unwrap()).unwrap();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    ctx.erase_instruction(other);
}

#[test]
#[should_panic(expected = "static initializer")]
fn initializers_cannot_be_bound() {
    let mut m = Module::new();
    let g = m.add_global("g", Ty::Int);
    let init = m.global(g).initializer;
    let _ctx = Context::new(&mut m, init);
}

#[test]
fn notifications_are_coalesced_into_the_summary() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let callee = m.add_function("callee");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let fr = b.create_function_ref(callee);
    b.create_apply(fr, &[], Ty::Unit);
    let fr2 = b.create_function_ref(callee);
    b.create_apply(fr2, &[], Ty::Unit);
    b.create_return(None);

    let summary = ctx.finish();
    assert_eq!(
        summary.changed,
        Invalidation::INSTRUCTIONS | Invalidation::CALLS | Invalidation::BRANCHES
    );
    assert_eq!(summary.dependencies, vec![callee]);
}

#[test]
fn untouched_context_reports_no_change() {
    let mut m = Module::new();
    let f = simple(&mut m);
    let ctx = Context::new(&mut m, f);
    assert!(ctx.finish().is_unchanged());
}

#[test]
fn analyses_are_cached_until_invalidated() {
    let mut m = Module::new();
    let f = simple(&mut m);
    let mut ctx = Context::new(&mut m, f);

    let first = ctx.dominators();
    let again = ctx.dominators();
    assert!(Rc::ptr_eq(&first, &again));
    assert!(ctx.is_cached::<DominatorTree>());

    // Dominators ignore plain instruction edits.
    let entry = ctx.function().entry_block().unwrap();
    let first_inst = ctx.function().first_inst(entry).unwrap();
    Builder::before(&mut ctx, first_inst).create_int_literal(3);
    assert!(ctx.is_cached::<DominatorTree>());

    ctx.create_block();
    assert!(!ctx.is_cached::<DominatorTree>());
    let rebuilt = ctx.dominators();
    assert!(!Rc::ptr_eq(&first, &rebuilt));
}

#[test]
fn recomputed_analysis_is_evicted_by_a_repeated_kind() {
    let mut m = Module::new();
    let f = simple(&mut m);
    let mut ctx = Context::new(&mut m, f);
    ctx.dead_end_blocks();
    ctx.notify(Notification::BranchesChanged);
    assert!(!ctx.is_cached::<DeadEndBlocks>());
    // Second report with nothing cached is a no-op.
    ctx.notify(Notification::BranchesChanged);
    ctx.dead_end_blocks();
    assert!(ctx.is_cached::<DeadEndBlocks>());
    ctx.notify(Notification::BranchesChanged);
    assert!(!ctx.is_cached::<DeadEndBlocks>());
}

#[test]
fn erase_with_users_handles_diamonds() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let a = b.create_int_literal(1);
    let l = b.create_binary(crate::inst::BinaryOp::Add, a, a);
    let r = b.create_binary(crate::inst::BinaryOp::Mul, a, a);
    b.create_binary(crate::inst::BinaryOp::Sub, l, r);
    b.create_return(None);

    let root = ctx.function().defining_inst(a).unwrap();
    ctx.erase_instruction_with_users(root);
    assert_eq!(kinds(ctx.function(), entry), vec![InstKind::Return]);
}

#[test]
fn erase_with_debug_uses_purges_debug_users() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let lit = b.create_int_literal(1);
    b.create_debug_value(lit);
    b.create_debug_value(lit);
    b.create_return(None);

    let inst = ctx.function().defining_inst(lit).unwrap();
    ctx.erase_instruction_with_debug_uses(inst);
    assert_eq!(count_insts(ctx.function(), InstKind::is_debug), 0);
    assert_eq!(kinds(ctx.function(), entry), vec![InstKind::Return]);
}

#[test]
#[should_panic(expected = "non-debug uses")]
fn erase_with_debug_uses_rejects_live_values() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let lit = b.create_int_literal(1);
    b.create_return(Some(lit));

    let inst = ctx.function().defining_inst(lit).unwrap();
    ctx.erase_instruction_with_debug_uses(inst);
}

#[test]
#[should_panic(expected = "still has uses")]
fn erasing_a_used_instruction_is_fatal() {
    let mut m = Module::new();
    let f = simple(&mut m);
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.function().entry_block().unwrap();
    let alloc = ctx.function().first_inst(entry).unwrap();
    ctx.erase_instruction(alloc);
}

#[test]
fn replace_all_uses_rewires_without_copies() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let mut b = Builder::at_end(&mut ctx, entry);
    let one = b.create_int_literal(1);
    let two = b.create_int_literal(2);
    b.create_binary(crate::inst::BinaryOp::Add, one, one);
    b.create_return(Some(one));

    ctx.replace_all_uses_with(one, two);
    assert!(ctx.function().uses(one).is_empty());
    assert_eq!(ctx.function().uses(two).len(), 3);
    assert_eq!(count_insts(ctx.function(), |k| matches!(k, InstKind::CopyValue)), 0);
}

#[test]
fn split_block_before_moves_the_tail() {
    let mut m = Module::new();
    let f = simple(&mut m);
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.function().entry_block().unwrap();
    let destroy = ctx.function().next_inst(ctx.function().first_inst(entry).unwrap()).unwrap();

    let tail = ctx.split_block_before(destroy);
    assert_eq!(
        kinds(ctx.function(), tail),
        vec![InstKind::DestroyValue, InstKind::Return]
    );
    assert_eq!(kinds(ctx.function(), entry), vec![InstKind::AllocRef]);
    assert_eq!(ctx.function().blocks().collect::<Vec<_>>(), vec![entry, tail]);

    Builder::at_end(&mut ctx, entry).create_branch(tail, &[]);
    assert_eq!(ctx.function().predecessors(tail), &[entry]);
    assert_eq!(verify_function(ctx.function()), Ok(()));
}

#[test]
fn split_block_after_keeps_the_head() {
    let mut m = Module::new();
    let f = simple(&mut m);
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.function().entry_block().unwrap();
    let alloc = ctx.function().first_inst(entry).unwrap();

    let tail = ctx.split_block_after(alloc);
    assert_eq!(kinds(ctx.function(), entry), vec![InstKind::AllocRef]);
    assert_eq!(ctx.function().insts(tail).count(), 2);
}

#[test]
fn split_edge_forwards_block_arguments() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let mut ctx = Context::new(&mut m, f);
    let entry = ctx.create_block();
    let exit = ctx.create_block();
    let x = ctx.add_block_arg(exit, Ty::Ref, Ownership::Owned);
    let mut b = Builder::at_end(&mut ctx, entry);
    let r = b.create_alloc_ref();
    b.create_branch(exit, &[r]);
    Builder::at_end(&mut ctx, exit).create_return(Some(x));

    let mid = ctx.split_edge(entry, exit);
    let func = ctx.function();
    assert_eq!(func.successors(entry).as_slice(), &[mid]);
    assert_eq!(func.predecessors(exit), &[mid]);
    assert_eq!(func.block_args(mid).len(), 1);
    assert_eq!(
        func.operands(func.terminator(mid).unwrap()).collect::<Vec<_>>(),
        vec![func.block_args(mid)[0]]
    );
    assert_eq!(verify_function(func), Ok(()));
}

#[test]
fn lookups_go_through_the_module() {
    let mut m = Module::new();
    let f = m.add_function("f");
    let helper = m.add_function("helper");
    let g = m.add_global("table", Ty::Int);
    let ctx = Context::new(&mut m, f);
    assert_eq!(ctx.lookup_function("helper"), Some(helper));
    assert_eq!(ctx.lookup_global("table"), Some(g));
    assert_eq!(ctx.lookup_function("table"), None);
}

#[test]
fn static_initializer_edits_are_silent() {
    let mut m = Module::new();
    let f = simple(&mut m);
    let g = m.add_global("answer", Ty::Int);
    let mut ctx = Context::new(&mut m, f);
    ctx.dominators();
    {
        let mut b = ctx.static_initializer_builder(g);
        assert!(b.is_static_initializer());
        b.create_int_literal(42);
    }
    assert!(ctx.is_cached::<DominatorTree>());
    assert!(ctx.finish().is_unchanged());

    let init = m.global(g).initializer;
    let block = m.function(init).entry_block().unwrap();
    assert_eq!(kinds(m.function(init), block), vec![InstKind::IntLiteral(42)]);
}
