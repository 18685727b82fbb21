//! Function passes and the pipeline that runs them.
//!
//! A [`PassManager`] runs each pass over every regular function of a
//! module in turn. Every (pass, function) run gets a fresh [`Context`],
//! so analyses never leak between functions, and its own tracing span.
//! After each run the change summary is folded into the
//! [`PipelineReport`], and the function is verified when
//! [`PipelineOptions::verify_after_each_pass`] is set.

use thiserror::Error;

use ossa_ir::{verify_function, Context, FuncId, Module, PassOptions, VerifyError};

use crate::dead_code::DeadCodeElimination;
use crate::simplify::Simplification;

/// A transformation of one function.
pub trait FunctionPass {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Transform the context's function. Returns `true` if it changed.
    fn run(&mut self, ctx: &mut Context<'_>) -> bool;
}

/// Pipeline configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Options of every pass Context, escape configuration included.
    pub pass: PassOptions,
    /// Run the verifier after every (pass, function) run.
    pub verify_after_each_pass: bool,
    /// Sweep limit of the simplification fixed point.
    pub max_simplify_iterations: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            pass: PassOptions::default(),
            verify_after_each_pass: cfg!(debug_assertions),
            max_simplify_iterations: 8,
        }
    }
}

/// Verification failure after a pass.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pass `{pass}` left `{function}` invalid: {source}")]
    Verification {
        pass: &'static str,
        function: String,
        #[source]
        source: VerifyError,
    },
}

/// What a pipeline run did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Functions changed by at least one pass, in first-change order.
    pub changed_functions: Vec<FuncId>,
    /// `(function, depends_on)` pairs reported by passes, deduplicated.
    pub dependencies: Vec<(FuncId, FuncId)>,
    /// Number of (pass, function) runs.
    pub pass_runs: usize,
}

impl PipelineReport {
    pub fn is_changed(&self, func: FuncId) -> bool {
        self.changed_functions.contains(&func)
    }

    fn record_change(&mut self, func: FuncId) {
        if !self.changed_functions.contains(&func) {
            self.changed_functions.push(func);
        }
    }

    fn record_dependency(&mut self, func: FuncId, on: FuncId) {
        if !self.dependencies.contains(&(func, on)) {
            self.dependencies.push((func, on));
        }
    }
}

/// An ordered list of function passes.
pub struct PassManager {
    passes: Vec<Box<dyn FunctionPass>>,
    options: PipelineOptions,
}

impl PassManager {
    /// An empty pipeline.
    pub fn new(options: PipelineOptions) -> Self {
        PassManager {
            passes: Vec::new(),
            options,
        }
    }

    /// Simplification followed by dead code elimination.
    pub fn with_default_pipeline(options: PipelineOptions) -> Self {
        let mut pm = PassManager::new(options);
        pm.add_pass(Simplification::new(options.max_simplify_iterations));
        pm.add_pass(DeadCodeElimination);
        pm
    }

    pub fn add_pass(&mut self, pass: impl FunctionPass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|p| p.name())
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run every pass over every regular function.
    pub fn run(&mut self, module: &mut Module) -> Result<PipelineReport, PipelineError> {
        let functions: Vec<FuncId> = module.regular_functions().collect();
        let mut report = PipelineReport::default();

        for pass in &mut self.passes {
            for &func in &functions {
                let name = module.function_name(func).to_owned();
                let span = tracing::debug_span!("pass", pass = pass.name(), function = %name);
                let _enter = span.enter();

                let mut ctx = Context::with_options(module, func, self.options.pass);
                let reported = pass.run(&mut ctx);
                let summary = ctx.finish();
                report.pass_runs += 1;

                if reported || !summary.is_unchanged() {
                    tracing::debug!(changes = ?summary.changed, "function changed");
                    report.record_change(func);
                }
                for &dep in &summary.dependencies {
                    report.record_dependency(func, dep);
                }

                if self.options.verify_after_each_pass {
                    verify_function(module.function(func)).map_err(|source| {
                        PipelineError::Verification {
                            pass: pass.name(),
                            function: name.clone(),
                            source,
                        }
                    })?;
                }
            }
        }

        tracing::debug!(
            passes = self.passes.len(),
            changed = report.changed_functions.len(),
            "pipeline complete"
        );
        Ok(report)
    }
}
