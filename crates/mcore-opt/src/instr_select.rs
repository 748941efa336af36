//! Matrix-core instruction shape selection.

use mcore_target_amd::{DotProblem, MatrixCoreVersion, MfmaInsn};

use crate::error::RewriteError;

/// Output tile of the instruction for an `M x N` result, before the table
/// lookup. `forced` (non-zero) overrides the choice for both dimensions.
pub fn choose_tile(m: u32, n: u32, forced: u32) -> (u32, u32) {
    if forced != 0 {
        return (forced, forced);
    }
    match m.min(n) {
        32.. => (32, 32),
        16..32 => (16, 16),
        _ if m < 16 && n >= 64 => (4, 64),
        _ if m >= 64 && n < 16 => (64, 4),
        _ => (4, 4),
    }
}

/// Picks the instruction for `problem`.
///
/// A missing table entry is [`RewriteError::UnsupportedInstruction`]; a
/// selection that does not tile the problem exactly (including a 4x4 tile
/// with `K < 64`) is [`RewriteError::InvariantViolation`].
pub fn choose_mfma_dimensions(
    problem: &DotProblem,
    version: MatrixCoreVersion,
    forced: u32,
) -> Result<MfmaInsn, RewriteError> {
    let (m_dim, n_dim) = choose_tile(problem.m, problem.n, forced);
    if forced == 0 && (m_dim, n_dim) == (4, 4) && problem.k < 64 {
        return Err(RewriteError::InvariantViolation(format!(
            "4x4 mfma tile needs K >= 64, got K = {}",
            problem.k
        )));
    }

    let insn = MfmaInsn::select(m_dim, n_dim, problem.a, problem.b, version).ok_or(
        RewriteError::UnsupportedInstruction {
            m_dim,
            n_dim,
            a: problem.a,
            b: problem.b,
            version: version.major(),
        },
    )?;

    if problem.m % insn.m_dim != 0 || problem.n % insn.n_dim != 0 || problem.k % insn.k_dim != 0 {
        return Err(RewriteError::InvariantViolation(format!(
            "{} does not tile {}x{}x{}",
            insn.name, problem.m, problem.n, problem.k
        )));
    }
    Ok(insn)
}

/// Contiguous K elements one lane feeds into one instruction.
///
/// The 32x32 tile splits K across 2 lane groups, 16x16 across 4 and 4x4
/// across 16; the 4x64 and 64x4 tiles do not split it.
pub fn k_width(m_dim: u32, n_dim: u32, k_dim: u32) -> Result<u32, RewriteError> {
    let groups = match (m_dim, n_dim) {
        (32, 32) => 2,
        (16, 16) => 4,
        (4, 4) => 16,
        (4, 64) | (64, 4) => 1,
        _ => {
            return Err(RewriteError::InvariantViolation(format!(
                "no kWidth rule for a {m_dim}x{n_dim} tile"
            )));
        }
    };
    Ok(k_dim / groups)
}
