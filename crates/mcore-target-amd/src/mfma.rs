//! The MFMA instruction table.
//!
//! Each row is one hardware instruction: its output tile (`m_dim` x
//! `n_dim`), the K extent it consumes per issue, the contiguous K elements
//! each lane supplies (`k_base`), and the operand type group it accepts.
//! For the small 4x4 tiles `k_dim` counts all 16 blocks of the
//! instruction, so `k_dim / 16 == k_base`.

use mcore_ir::{Scalar, ScalarKind};

use crate::version::MatrixCoreVersion;

/// Operand element-type pairing accepted by an instruction family.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum OperandGroup {
    F32,
    F16,
    /// Legacy bf16 instructions (CDNA1).
    Bf16,
    /// Full-rate bf16 instructions (CDNA2 onwards).
    Bf16_1k,
    I8,
    Fp8Fp8,
    Fp8Bf8,
    Bf8Fp8,
    Bf8Bf8,
}

impl OperandGroup {
    /// Maps the operand element types of a multiply onto a group.
    ///
    /// A and B must agree, except on the 8-bit float path where E4M3
    /// ("fp8") and E5M2 ("bf8") may be mixed.
    pub fn classify(a: Scalar, b: Scalar, version: MatrixCoreVersion) -> Option<Self> {
        let is_i8 = |s: Scalar| s.width == 1 && matches!(s.kind, ScalarKind::Sint | ScalarKind::Uint);
        match (a.kind, b.kind) {
            (ScalarKind::Float8E4M3, ScalarKind::Float8E4M3) => Some(Self::Fp8Fp8),
            (ScalarKind::Float8E4M3, ScalarKind::Float8E5M2) => Some(Self::Fp8Bf8),
            (ScalarKind::Float8E5M2, ScalarKind::Float8E4M3) => Some(Self::Bf8Fp8),
            (ScalarKind::Float8E5M2, ScalarKind::Float8E5M2) => Some(Self::Bf8Bf8),
            _ if a != b => None,
            _ if a == Scalar::F32 => Some(Self::F32),
            _ if a == Scalar::F16 => Some(Self::F16),
            _ if a == Scalar::BF16 && version == MatrixCoreVersion::V1 => Some(Self::Bf16),
            _ if a == Scalar::BF16 => Some(Self::Bf16_1k),
            _ if is_i8(a) => Some(Self::I8),
            _ => None,
        }
    }
}

/// One matrix-core instruction.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct MfmaInsn {
    pub m_dim: u32,
    pub n_dim: u32,
    pub k_dim: u32,
    /// Contiguous K elements held by one lane.
    pub k_base: u32,
    /// LLVM intrinsic suffix, e.g. `mfma_f32_32x32x8f16`.
    pub name: &'static str,
}

struct Row {
    group: OperandGroup,
    since: MatrixCoreVersion,
    until: MatrixCoreVersion,
    insn: MfmaInsn,
}

const fn row(
    group: OperandGroup,
    since: MatrixCoreVersion,
    until: MatrixCoreVersion,
    (m_dim, n_dim, k_dim, k_base): (u32, u32, u32, u32),
    name: &'static str,
) -> Row {
    Row {
        group,
        since,
        until,
        insn: MfmaInsn {
            m_dim,
            n_dim,
            k_dim,
            k_base,
            name,
        },
    }
}

use MatrixCoreVersion::{V1, V2, V3};
use OperandGroup as G;

#[rustfmt::skip]
static TABLE: &[Row] = &[
    // f32
    row(G::F32, V1, V3, (32, 32, 2, 1), "mfma_f32_32x32x2f32"),
    row(G::F32, V1, V3, (16, 16, 4, 1), "mfma_f32_16x16x4f32"),
    row(G::F32, V1, V3, (4, 4, 16, 1), "mfma_f32_4x4x1f32"),
    row(G::F32, V1, V3, (4, 64, 1, 1), "mfma_f32_4x4x1f32"),
    row(G::F32, V1, V3, (64, 4, 1, 1), "mfma_f32_4x4x1f32"),
    // f16
    row(G::F16, V1, V3, (32, 32, 8, 4), "mfma_f32_32x32x8f16"),
    row(G::F16, V1, V3, (16, 16, 16, 4), "mfma_f32_16x16x16f16"),
    row(G::F16, V1, V3, (4, 4, 64, 4), "mfma_f32_4x4x4f16"),
    row(G::F16, V1, V3, (4, 64, 4, 4), "mfma_f32_4x4x4f16"),
    row(G::F16, V1, V3, (64, 4, 4, 4), "mfma_f32_4x4x4f16"),
    // bf16, CDNA1
    row(G::Bf16, V1, V1, (32, 32, 4, 2), "mfma_f32_32x32x4bf16"),
    row(G::Bf16, V1, V1, (16, 16, 8, 2), "mfma_f32_16x16x8bf16"),
    row(G::Bf16, V1, V1, (4, 4, 32, 2), "mfma_f32_4x4x2bf16"),
    row(G::Bf16, V1, V1, (4, 64, 2, 2), "mfma_f32_4x4x2bf16"),
    row(G::Bf16, V1, V1, (64, 4, 2, 2), "mfma_f32_4x4x2bf16"),
    // bf16_1k
    row(G::Bf16_1k, V2, V3, (32, 32, 8, 4), "mfma_f32_32x32x8bf16_1k"),
    row(G::Bf16_1k, V2, V3, (16, 16, 16, 4), "mfma_f32_16x16x16bf16_1k"),
    row(G::Bf16_1k, V2, V3, (4, 4, 64, 4), "mfma_f32_4x4x4bf16_1k"),
    row(G::Bf16_1k, V2, V3, (4, 64, 4, 4), "mfma_f32_4x4x4bf16_1k"),
    row(G::Bf16_1k, V2, V3, (64, 4, 4, 4), "mfma_f32_4x4x4bf16_1k"),
    // i8
    row(G::I8, V1, V2, (32, 32, 8, 4), "mfma_i32_32x32x8i8"),
    row(G::I8, V1, V2, (16, 16, 16, 4), "mfma_i32_16x16x16i8"),
    row(G::I8, V3, V3, (32, 32, 16, 8), "mfma_i32_32x32x16_i8"),
    row(G::I8, V3, V3, (16, 16, 32, 8), "mfma_i32_16x16x32_i8"),
    row(G::I8, V1, V3, (4, 4, 64, 4), "mfma_i32_4x4x4i8"),
    row(G::I8, V1, V3, (4, 64, 4, 4), "mfma_i32_4x4x4i8"),
    row(G::I8, V1, V3, (64, 4, 4, 4), "mfma_i32_4x4x4i8"),
    // fp8 / bf8, CDNA3
    row(G::Fp8Fp8, V3, V3, (32, 32, 16, 8), "mfma_f32_32x32x16_fp8_fp8"),
    row(G::Fp8Fp8, V3, V3, (16, 16, 32, 8), "mfma_f32_16x16x32_fp8_fp8"),
    row(G::Fp8Bf8, V3, V3, (32, 32, 16, 8), "mfma_f32_32x32x16_fp8_bf8"),
    row(G::Fp8Bf8, V3, V3, (16, 16, 32, 8), "mfma_f32_16x16x32_fp8_bf8"),
    row(G::Bf8Fp8, V3, V3, (32, 32, 16, 8), "mfma_f32_32x32x16_bf8_fp8"),
    row(G::Bf8Fp8, V3, V3, (16, 16, 32, 8), "mfma_f32_16x16x32_bf8_fp8"),
    row(G::Bf8Bf8, V3, V3, (32, 32, 16, 8), "mfma_f32_32x32x16_bf8_bf8"),
    row(G::Bf8Bf8, V3, V3, (16, 16, 32, 8), "mfma_f32_16x16x32_bf8_bf8"),
];

impl MfmaInsn {
    /// Looks up the instruction for an output tile and operand types on a
    /// given generation.
    pub fn select(
        m_dim: u32,
        n_dim: u32,
        a: Scalar,
        b: Scalar,
        version: MatrixCoreVersion,
    ) -> Option<Self> {
        let group = OperandGroup::classify(a, b, version)?;
        let found = TABLE
            .iter()
            .find(|r| {
                r.group == group
                    && (r.since..=r.until).contains(&version)
                    && r.insn.m_dim == m_dim
                    && r.insn.n_dim == n_dim
            })
            .map(|r| r.insn);
        if found.is_none() {
            log::trace!("no mfma for {m_dim}x{n_dim} {a} x {b} on {version}");
        }
        found
    }
}
