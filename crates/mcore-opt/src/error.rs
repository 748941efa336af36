//! Errors raised while rewriting.

use mcore_ir::{IrError, Scalar};

/// A rewrite that cannot proceed. Declined matches are not errors; they
/// are reported as `Ok(false)` by the pattern.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("no matrix-core instruction for {m_dim}x{n_dim} with operands {a} x {b} on mfma v{version}")]
    UnsupportedInstruction {
        m_dim: u32,
        n_dim: u32,
        a: Scalar,
        b: Scalar,
        version: u32,
    },
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("rewrite did not converge after {iterations} iterations")]
    DidNotConverge { iterations: usize },
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// A pass failed; wraps the underlying rewrite error with the pass name.
#[derive(Debug, thiserror::Error)]
#[error("pass '{pass}' failed")]
pub struct PassError {
    pub pass: String,
    #[source]
    pub source: RewriteError,
}

impl PassError {
    pub fn new(pass: impl Into<String>, source: RewriteError) -> Self {
        Self {
            pass: pass.into(),
            source,
        }
    }
}
