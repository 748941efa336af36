//! Encoding invariants.
//!
//! Matrix-core encodings are only ever created by the lowering pass, so a
//! violation here points at a bug in a rewrite rather than in user input.

use std::collections::HashSet;

use mcore_ir::{Encoding, Function, Handle, Value};

/// A tensor value whose layout encoding breaks an invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingViolation {
    #[error("%{value}: mfma tile {m_dim}x{n_dim} does not divide shape {shape:?}")]
    TileDoesNotDivide {
        value: usize,
        shape: Vec<u32>,
        m_dim: u32,
        n_dim: u32,
    },
    #[error("%{value}: dot operand parent #e{parent} is not an mfma encoding")]
    ParentNotMfma { value: usize, parent: usize },
    #[error("%{value}: dot operand has zero kWidth")]
    ZeroKWidth { value: usize },
}

fn check_value(func: &Function, value: Handle<Value>, out: &mut Vec<EncodingViolation>) {
    let Some(ty) = func.value_type(value).as_tensor() else {
        return;
    };
    let Some(encoding) = ty.encoding else {
        return;
    };
    match func.encoding(encoding) {
        Encoding::Blocked(_) => {}
        Encoding::Mfma(mfma) => {
            let fits = match ty.shape.as_slice() {
                [m, n] => {
                    mfma.m_dim != 0
                        && mfma.n_dim != 0
                        && m % mfma.m_dim == 0
                        && n % mfma.n_dim == 0
                }
                _ => false,
            };
            if !fits {
                out.push(EncodingViolation::TileDoesNotDivide {
                    value: value.index(),
                    shape: ty.shape.clone(),
                    m_dim: mfma.m_dim,
                    n_dim: mfma.n_dim,
                });
            }
        }
        Encoding::DotOperand(op) => {
            if func.encodings().try_get(op.parent).and_then(Encoding::as_mfma).is_none() {
                out.push(EncodingViolation::ParentNotMfma {
                    value: value.index(),
                    parent: op.parent.index(),
                });
            }
            if op.k_width == 0 {
                out.push(EncodingViolation::ZeroKWidth {
                    value: value.index(),
                });
            }
        }
    }
}

/// Checks every tensor value reachable from a live op or a region argument.
pub fn verify_encodings(func: &Function) -> Vec<EncodingViolation> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut visit = |value: Handle<Value>, out: &mut Vec<EncodingViolation>| {
        if seen.insert(value) {
            check_value(func, value, out);
        }
    };
    for &arg in &func.region(func.body()).arguments {
        visit(arg, &mut out);
    }
    for op in func.walk() {
        let operation = func.op(op);
        for &nested in &operation.regions {
            for &arg in &func.region(nested).arguments {
                visit(arg, &mut out);
            }
        }
        for &value in operation.operands.iter().chain(&operation.results) {
            visit(value, &mut out);
        }
    }
    out
}

/// Runs [`verify_encodings`] and logs each violation. Returns `true` when
/// the function is clean.
pub fn verify_function(func: &Function) -> bool {
    let violations = verify_encodings(func);
    for v in &violations {
        log::warn!("@{}: {v}", func.name);
    }
    violations.is_empty()
}
