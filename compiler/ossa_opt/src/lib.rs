//! Mid-level optimizer passes over the ownership SSA IR.
//!
//! This crate provides:
//!
//! - **Peephole simplification** ([`simplify`]) - producer/consumer pair
//!   rules, led by folding a `switch_enum` of a known `enum` into a `br`,
//!   all sharing the single-use/ownership gate of
//!   [`try_replace_redundant_instruction_pair`].
//!
//! - **Escape and alias analysis** ([`escape`]) - def-use walks over
//!   projected values, and the symmetric [`may_alias`] query built on
//!   them. [`AliasAnalysis`] caches answers per Context.
//!
//! - **Dead code elimination** ([`dead_code`]) - unreachable block removal
//!   and a single reverse sweep over trivially dead instructions.
//!
//! - **Make-available** ([`make_available()`]) - balancing an owned value's
//!   lifetime so it can be consumed in a dominated block, loops included.
//!
//! - **Pass manager** ([`PassManager`]) - runs [`FunctionPass`]es over a
//!   module with a fresh Context per run, optional verification and a
//!   report of changed functions and dependencies.
//!
//! # Crate Dependencies
//!
//! `ossa_opt` depends only on `ossa_ir`. Every edit goes through
//! [`ossa_ir::Context`], so this crate never touches IR storage directly.

use std::sync::Once;

pub mod dead_code;
pub mod escape;
pub mod make_available;
pub mod pass;
pub mod simplify;

pub use dead_code::{
    eliminate_dead_code, eliminate_dead_instructions, is_trivially_dead,
    remove_unreachable_blocks, DeadCodeElimination,
};
pub use escape::{
    escapes_to, is_escaping, may_alias, AliasAnalysis, EscapeConfig, EscapeVisitor,
    EscapesToValueVisitor, PathComponent, ProjectedValue, ProjectionPath, WalkDecision,
};
pub use make_available::{make_available, BasicBlockRange};
pub use pass::{FunctionPass, PassManager, PipelineError, PipelineOptions, PipelineReport};
pub use simplify::{
    simplify_function, simplify_instruction, simplify_switch_enum,
    try_replace_redundant_instruction_pair, Simplification,
};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=ossa_opt=debug` or `RUST_LOG=ossa_ir=trace`.
/// Set `OSSA_LOG_TREE=1` for indented, span-nested output.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let filter = EnvFilter::from_default_env();
        if std::env::var("OSSA_LOG_TREE").is_ok_and(|v| v == "1") {
            tracing_subscriber::registry()
                .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true))
                .with(filter)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

#[cfg(test)]
mod test_helpers;
