//! Layout conversion with an optional element-type cast.

use mcore_ir::{CastOp, Encoding, Handle, OpKind, Scalar, ScalarKind, Value};

use crate::error::RewriteError;
use crate::rewrite::Rewriter;

/// The cast turning `from` elements into `to` elements, or `None` if they
/// are already equal.
///
/// Both types must be in the same category (integer or float); pointers
/// are never cast here.
pub fn cast_for(from: Scalar, to: Scalar) -> Result<Option<CastOp>, RewriteError> {
    if from == to {
        return Ok(None);
    }
    if from.kind == ScalarKind::Ptr || to.kind == ScalarKind::Ptr {
        return Err(RewriteError::InvariantViolation(format!(
            "cannot cast {from} to {to}: pointer element type"
        )));
    }
    if from.is_integer() != to.is_integer() {
        return Err(RewriteError::InvariantViolation(format!(
            "cannot cast {from} to {to}: integer/float category mismatch"
        )));
    }

    let op = if to.is_integer() {
        match from.bit_width().cmp(&to.bit_width()) {
            std::cmp::Ordering::Equal => CastOp::Bitcast,
            std::cmp::Ordering::Greater => CastOp::TruncI,
            std::cmp::Ordering::Less if from.is_signed() => CastOp::ExtSI,
            std::cmp::Ordering::Less => CastOp::ExtUI,
        }
    } else if from == Scalar::F16 && to == Scalar::F32 {
        CastOp::ExtF
    } else if from == Scalar::F32 && to == Scalar::F16 {
        CastOp::TruncF
    } else {
        CastOp::FpToFp
    };
    Ok(Some(op))
}

/// Moves `value` into `encoding` and, if needed, casts its elements to
/// `scalar`.
///
/// Always emits one `convert_layout`; emits one cast after it when the
/// element type changes. Returns the final value.
pub fn convert_and_cast(
    rewriter: &mut Rewriter<'_>,
    value: Handle<Value>,
    encoding: Handle<Encoding>,
    scalar: Scalar,
) -> Result<Handle<Value>, RewriteError> {
    let old = rewriter.func().tensor_type(value)?.clone();
    let cast = cast_for(old.scalar, scalar)?;

    let converted_ty = old.with_encoding(encoding);
    let converted =
        rewriter.create_value(OpKind::ConvertLayout, vec![value], converted_ty.clone())?;
    match cast {
        None => Ok(converted),
        Some(op) => rewriter.create_value(
            OpKind::Cast(op),
            vec![converted],
            converted_ty.with_scalar(scalar),
        ),
    }
}
