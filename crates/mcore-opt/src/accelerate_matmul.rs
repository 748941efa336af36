//! Lowering of blocked matrix multiplies onto AMD matrix-core (MFMA)
//! instructions.
//!
//! A `dot` whose result is still in a blocked layout is rewritten into a
//! `dot` over matrix-core layouts:
//!
//! ```text
//! %c = dot %a, %b, %acc : #blocked
//! ```
//! becomes
//! ```text
//! %acc' = convert_layout %acc : #mfma      (+ cast to i32/f32)
//! %a'   = convert_layout %a   : #dot_op<0, #mfma>
//! %b'   = convert_layout %b   : #dot_op<1, #mfma>
//! %d    = dot %a', %b', %acc' : #mfma
//! %c    = convert_layout %d   : #blocked   (+ cast back)
//! ```

use mcore_analysis::is_chain_dot;
use mcore_ir::{
    DotOperandEncoding, Encoding, Handle, MfmaEncoding, Module, OpFamily, OpKind, OperandIndex,
    Operation, Scalar,
};
use mcore_target_amd::{CdnaSupport, DotProblem, MatmulSupport, MatrixCoreVersion, supports_mfma};

use crate::convert::convert_and_cast;
use crate::error::{PassError, RewriteError};
use crate::instr_select::{choose_mfma_dimensions, k_width};
use crate::rewrite::{GreedyRewriteConfig, RewritePattern, Rewriter, apply_patterns_greedily};
use crate::warps::warps_per_tile;
use crate::Pass;

/// Construction-time options of [`AccelerateMatmul`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccelerateMatmulOptions {
    /// Matrix-core generation (1, 2 or 3). Any other value disables the
    /// pass.
    pub matrix_core_version: u32,
    /// Forced instruction tile size for both M and N; 0 picks one from the
    /// result shape.
    pub matrix_instruction_size: u32,
}

impl Default for AccelerateMatmulOptions {
    fn default() -> Self {
        Self {
            matrix_core_version: 2,
            matrix_instruction_size: 0,
        }
    }
}

/// Rewrites one blocked `dot` into its matrix-core form.
#[derive(Debug)]
pub struct BlockedToMfma {
    version: MatrixCoreVersion,
    forced_size: u32,
    num_warps: u32,
}

impl BlockedToMfma {
    pub fn new(version: MatrixCoreVersion, forced_size: u32, num_warps: u32) -> Self {
        Self {
            version,
            forced_size,
            num_warps,
        }
    }
}

fn invariant(msg: impl Into<String>) -> RewriteError {
    RewriteError::InvariantViolation(msg.into())
}

impl RewritePattern for BlockedToMfma {
    fn name(&self) -> &str {
        "blocked-to-mfma"
    }

    fn root_kind(&self) -> OpFamily {
        OpFamily::Dot
    }

    fn benefit(&self) -> u16 {
        2
    }

    fn match_and_rewrite(
        &self,
        op: Handle<Operation>,
        rewriter: &mut Rewriter<'_>,
    ) -> Result<bool, RewriteError> {
        let func = rewriter.func();
        let kind = func.op(op).kind.clone();
        let OpKind::Dot {
            allow_tf32,
            max_num_imprecise_acc,
        } = kind
        else {
            return Ok(false);
        };
        let Some(result) = func.result(op) else {
            return Ok(false);
        };
        let old_ret = func.tensor_type(result)?.clone();
        let Some(ret_encoding) = old_ret.encoding else {
            log::trace!("dot {}: result has no encoding", op.index());
            return Ok(false);
        };
        if !func.encoding(ret_encoding).is_blocked() {
            log::trace!("dot {}: result is not blocked", op.index());
            return Ok(false);
        }
        if !supports_mfma(func, op, self.version) {
            log::trace!(
                "dot {}: not supported by {} {}",
                op.index(),
                CdnaSupport.hardware_name(),
                self.version
            );
            return Ok(false);
        }

        let problem = DotProblem::from_dot(func, op)
            .ok_or_else(|| invariant(format!("dot {} is not a 2-D multiply", op.index())))?;
        let cta_layout = func
            .cta_layout(ret_encoding)
            .cloned()
            .ok_or_else(|| invariant("blocked encoding without CTA layout"))?;
        let [a, b, acc] = func.op(op).operands[..] else {
            return Err(invariant("dot must have three operands"));
        };
        let a_ty = func.tensor_type(a)?.clone();
        let b_ty = func.tensor_type(b)?.clone();

        let insn = choose_mfma_dimensions(&problem, self.version, self.forced_size)?;
        let chained = is_chain_dot(func, op);
        let warps = warps_per_tile(
            (problem.m, problem.n),
            self.num_warps,
            (insn.m_dim, insn.n_dim),
            chained,
        );
        let k_width = k_width(insn.m_dim, insn.n_dim, insn.k_dim)?;

        let mfma = rewriter.intern_encoding(Encoding::Mfma(MfmaEncoding {
            version_major: self.version.major(),
            version_minor: self.version.minor(),
            warps_per_cta: warps,
            m_dim: insn.m_dim,
            n_dim: insn.n_dim,
            is_transposed: chained,
            cta_layout,
        }));

        let acc_scalar = if old_ret.scalar.is_integer() {
            Scalar::I32
        } else {
            Scalar::F32
        };
        let new_acc = convert_and_cast(rewriter, acc, mfma, acc_scalar)?;

        let a_encoding = rewriter.intern_encoding(Encoding::DotOperand(DotOperandEncoding {
            op_idx: OperandIndex::A,
            parent: mfma,
            k_width,
        }));
        let b_encoding = rewriter.intern_encoding(Encoding::DotOperand(DotOperandEncoding {
            op_idx: OperandIndex::B,
            parent: mfma,
            k_width,
        }));
        let new_a =
            rewriter.create_value(OpKind::ConvertLayout, vec![a], a_ty.with_encoding(a_encoding))?;
        let new_b =
            rewriter.create_value(OpKind::ConvertLayout, vec![b], b_ty.with_encoding(b_encoding))?;

        let acc_ty = rewriter.func().value_type(new_acc).clone();
        let new_dot = rewriter.create_value(
            OpKind::Dot {
                allow_tf32,
                max_num_imprecise_acc,
            },
            vec![new_a, new_b, new_acc],
            acc_ty,
        )?;
        let output = convert_and_cast(rewriter, new_dot, ret_encoding, old_ret.scalar)?;
        rewriter.replace_op(op, &[output])?;

        log::debug!(
            "dot {}: {} warps {:?} chained={} kWidth={}",
            op.index(),
            insn.name,
            warps,
            chained,
            k_width
        );
        Ok(true)
    }
}

/// Lowers every supported blocked `dot` of the module onto matrix cores.
#[derive(Debug, Default)]
pub struct AccelerateMatmul {
    options: AccelerateMatmulOptions,
}

impl AccelerateMatmul {
    pub fn new(options: AccelerateMatmulOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AccelerateMatmulOptions {
        &self.options
    }
}

impl Pass for AccelerateMatmul {
    fn name(&self) -> &str {
        "accelerate-amd-matmul"
    }

    fn run(&self, module: &mut Module) -> Result<bool, PassError> {
        let Ok(version) = MatrixCoreVersion::try_from(self.options.matrix_core_version) else {
            log::debug!(
                "{}: matrix-core version {} has no MFMA lowering, skipping",
                self.name(),
                self.options.matrix_core_version
            );
            return Ok(false);
        };

        let patterns: Vec<Box<dyn RewritePattern>> = vec![Box::new(BlockedToMfma::new(
            version,
            self.options.matrix_instruction_size,
            module.num_warps,
        ))];
        let config = GreedyRewriteConfig::default();
        let mut changed = false;
        for (_, func) in module.functions.iter_mut() {
            changed |= apply_patterns_greedily(func, &patterns, &config)
                .map_err(|e| PassError::new(self.name(), e))?;
        }
        Ok(changed)
    }
}
