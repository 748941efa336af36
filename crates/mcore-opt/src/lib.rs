//! Matrix-core rewrite passes for mcore.
//!
//! Provides a [`Pass`] trait, a [`PassManager`] with fixed-point iteration,
//! the greedy pattern driver, and the two AMD matrix-core passes:
//! [`AccelerateMatmul`] (blocked `dot` to MFMA) and [`OptimizeEpilogue`]
//! (store directly from the accumulator layout).

pub mod accelerate_matmul;
pub mod convert;
mod error;
pub mod instr_select;
pub mod optimize_epilogue;
pub mod rewrite;
pub mod warps;

pub use accelerate_matmul::{AccelerateMatmul, AccelerateMatmulOptions, BlockedToMfma};
pub use convert::{cast_for, convert_and_cast};
pub use error::{PassError, RewriteError};
pub use instr_select::{choose_mfma_dimensions, choose_tile, k_width};
pub use optimize_epilogue::{BypassEpilogue, OptimizeEpilogue};
pub use rewrite::{GreedyRewriteConfig, RewritePattern, Rewriter, apply_patterns_greedily};
pub use warps::warps_per_tile;

use std::fmt::Debug;

use mcore_ir::Module;

/// A transformation over a whole module.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Run the pass on a module. Returns `true` if anything was modified.
    fn run(&self, module: &mut Module) -> Result<bool, PassError>;
}

/// Maximum number of fixed-point iterations before giving up.
const MAX_ITERATIONS: usize = 10;

/// Runs passes in sequence with fixed-point iteration.
#[derive(Debug)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Creates an empty pass manager with no passes.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Matmul lowering followed by the epilogue store bypass.
    pub fn for_matrix_core(options: AccelerateMatmulOptions) -> Self {
        let mut pm = Self::new();
        pm.add_pass(Box::new(AccelerateMatmul::new(options)));
        pm.add_pass(Box::new(OptimizeEpilogue));
        pm
    }

    /// Adds a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Names of the registered passes, in order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Runs all passes until a fixed point is reached or the iteration
    /// limit. Returns `true` if any pass changed the module; the first
    /// error aborts the run.
    pub fn run(&self, module: &mut Module) -> Result<bool, PassError> {
        let mut changed_any = false;
        for iteration in 0..MAX_ITERATIONS {
            let mut changed = false;
            for pass in &self.passes {
                let pass_changed = pass.run(module)?;
                if pass_changed {
                    log::debug!("{} changed the module (iteration {})", pass.name(), iteration);
                }
                changed |= pass_changed;
            }
            changed_any |= changed;
            if !changed {
                break;
            }
        }
        Ok(changed_any)
    }
}
