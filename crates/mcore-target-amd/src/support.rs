//! Which matrix multiplies the CDNA matrix cores can execute.

use mcore_ir::{Function, Handle, OpFamily, Operation, Scalar};

use crate::mfma::{MfmaInsn, OperandGroup};
use crate::version::MatrixCoreVersion;

/// Shape and operand types of a 2-D multiply `(M x K) * (K x N)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DotProblem {
    pub m: u32,
    pub n: u32,
    pub k: u32,
    pub a: Scalar,
    pub b: Scalar,
}

impl DotProblem {
    /// Reads the problem off a dot op. `None` for anything that is not a
    /// rank-2 multiply with consistent dimensions.
    pub fn from_dot(func: &Function, dot: Handle<Operation>) -> Option<Self> {
        let op = func.op(dot);
        if op.kind.family() != OpFamily::Dot {
            return None;
        }
        let [a, b, _acc] = op.operands.as_slice() else {
            return None;
        };
        let a = func.tensor_type(*a).ok()?;
        let b = func.tensor_type(*b).ok()?;
        let d = func.tensor_type(op.result()?).ok()?;
        match (a.shape.as_slice(), b.shape.as_slice(), d.shape.as_slice()) {
            (&[m, k], &[kb, n], &[dm, dn]) if k == kb && m == dm && n == dn => Some(Self {
                m,
                n,
                k,
                a: a.scalar,
                b: b.scalar,
            }),
            _ => None,
        }
    }
}

/// `(M, N, K)` multiples an instruction family can tile. The 4-wide
/// shapes cover skinny outputs. A granularity only counts for operand
/// types the table has an instruction for at that tile.
const GRANULARITIES: &[(u32, u32, u32)] = &[
    (32, 32, 8),
    (16, 16, 16),
    (4, 64, 4),
    (64, 4, 4),
    (4, 4, 64),
];

/// Matrix-multiply capability of a GPU family.
pub trait MatmulSupport {
    /// Whether `problem` can be lowered onto matrix-core instructions.
    fn supports(&self, problem: &DotProblem, version: MatrixCoreVersion) -> bool;

    /// Human-readable hardware name.
    fn hardware_name(&self) -> &str;
}

/// AMD CDNA accelerators (MI100 / MI200 / MI300).
#[derive(Clone, Copy, Debug, Default)]
pub struct CdnaSupport;

impl MatmulSupport for CdnaSupport {
    fn supports(&self, problem: &DotProblem, version: MatrixCoreVersion) -> bool {
        let Some(group) = OperandGroup::classify(problem.a, problem.b, version) else {
            return false;
        };
        let fp8 = matches!(
            group,
            OperandGroup::Fp8Fp8 | OperandGroup::Fp8Bf8 | OperandGroup::Bf8Fp8 | OperandGroup::Bf8Bf8
        );
        if fp8 && !version.has_fp8() {
            return false;
        }
        GRANULARITIES.iter().any(|&(gm, gn, gk)| {
            problem.m % gm == 0
                && problem.n % gn == 0
                && problem.k % gk == 0
                && MfmaInsn::select(gm, gn, problem.a, problem.b, version).is_some()
        })
    }

    fn hardware_name(&self) -> &str {
        "AMD CDNA"
    }
}

/// `true` if `dot` can be lowered onto CDNA matrix cores of `version`.
pub fn supports_mfma(func: &Function, dot: Handle<Operation>, version: MatrixCoreVersion) -> bool {
    DotProblem::from_dot(func, dot).is_some_and(|p| CdnaSupport.supports(&p, version))
}
