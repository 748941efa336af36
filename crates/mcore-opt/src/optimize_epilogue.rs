//! Stores straight from the matrix-core accumulator layout.
//!
//! ```text
//! %v0 = convert_layout %acc : #mfma -> #blocked
//! %v1 = truncf %v0          : #blocked
//! %v2 = negf %v1            : #blocked
//! store %ptr, %v2, %mask    : #blocked
//! ```
//! becomes
//! ```text
//! %p  = convert_layout %ptr  : #blocked -> #mfma
//! %m  = convert_layout %mask : #blocked -> #mfma
//! %v1 = truncf %acc          : #mfma
//! %v2 = negf %v1             : #mfma
//! store %p, %v2, %m          : #mfma
//! ```
//!
//! The elementwise chain is retyped in place, so the accumulator never
//! round-trips through the blocked layout before the write.

use mcore_ir::{Function, Handle, Module, OpFamily, OpKind, Operation, Value};

use crate::error::{PassError, RewriteError};
use crate::rewrite::{GreedyRewriteConfig, RewritePattern, Rewriter, apply_patterns_greedily};
use crate::Pass;

/// Single-operand, single-result elementwise ops that may move into the
/// accumulator layout.
fn is_one_operand_elementwise(op: &Operation) -> bool {
    if op.operands.len() != 1 || op.results.len() != 1 {
        return false;
    }
    match &op.kind {
        OpKind::Cast(_) => true,
        OpKind::Unary(_) => true,
        OpKind::ExternElementwise { pure, .. } => *pure,
        OpKind::Dot { .. }
        | OpKind::Store { .. }
        | OpKind::ConvertLayout
        | OpKind::Opaque { .. } => false,
    }
}

fn is_blocked_tensor(func: &Function, value: Handle<Value>) -> bool {
    func.value_encoding(value).is_some_and(|e| e.is_blocked())
}

/// Moves a store, and the elementwise chain feeding it, into the layout of
/// the accumulator the chain was converted from.
#[derive(Debug, Default)]
pub struct BypassEpilogue;

impl RewritePattern for BypassEpilogue {
    fn name(&self) -> &str {
        "bypass-epilogue"
    }

    fn root_kind(&self) -> OpFamily {
        OpFamily::Store
    }

    fn match_and_rewrite(
        &self,
        op: Handle<Operation>,
        rewriter: &mut Rewriter<'_>,
    ) -> Result<bool, RewriteError> {
        let func = rewriter.func();
        let store = func.op(op);
        let OpKind::Store { cache, evict } = store.kind else {
            return Ok(false);
        };
        let (ptr, value, mask) = match store.operands[..] {
            [ptr, value] => (ptr, value, None),
            [ptr, value, mask] => (ptr, value, Some(mask)),
            _ => return Ok(false),
        };
        if !is_blocked_tensor(func, ptr) || !is_blocked_tensor(func, value) {
            return Ok(false);
        }
        if mask.is_some_and(|m| func.value_type(m).as_tensor().is_none()) {
            return Ok(false);
        }

        // Walk from the stored value back to the layout conversion.
        let mut chain = Vec::new();
        let mut current = value;
        let convert = loop {
            let Some(def) = func.defining_op(current) else {
                return Ok(false);
            };
            let def_op = func.op(def);
            if def_op.kind == OpKind::ConvertLayout {
                break def;
            }
            if !func.has_one_use(current) || !is_one_operand_elementwise(def_op) {
                log::trace!(
                    "store {}: `{}` blocks the epilogue bypass",
                    op.index(),
                    def_op.kind.name()
                );
                return Ok(false);
            }
            chain.push(def);
            current = def_op.operands[0];
        };

        let Some(source) = func.op(convert).operands.first().copied() else {
            return Ok(false);
        };
        let Some(accumulator_encoding) = func.tensor_type(source)?.encoding else {
            return Ok(false);
        };
        if func.encoding(accumulator_encoding).as_mfma().is_none() {
            return Ok(false);
        }
        if !func.has_one_use(current) {
            return Ok(false);
        }

        let ptr_ty = func.tensor_type(ptr)?.with_encoding(accumulator_encoding);
        let mask_ty = match mask {
            Some(m) => Some((m, func.tensor_type(m)?.with_encoding(accumulator_encoding))),
            None => None,
        };

        let new_ptr = rewriter.create_value(OpKind::ConvertLayout, vec![ptr], ptr_ty)?;

        // Retype from the conversion towards the store so each op reads its
        // already retyped predecessor.
        let mut new_value = source;
        for &link in chain.iter().rev() {
            rewriter.set_operand(link, 0, new_value)?;
            let result = rewriter.func().result(link).ok_or_else(|| {
                RewriteError::InvariantViolation("chain op without result".into())
            })?;
            let retyped = rewriter
                .func()
                .tensor_type(result)?
                .with_encoding(accumulator_encoding);
            rewriter.set_result_type(result, retyped);
            new_value = result;
        }

        let mut operands = vec![new_ptr, new_value];
        if let Some((m, ty)) = mask_ty {
            operands.push(rewriter.create_value(OpKind::ConvertLayout, vec![m], ty)?);
        }
        rewriter.create_op(OpKind::Store { cache, evict }, operands, vec![])?;
        rewriter.replace_op(op, &[])?;
        if rewriter.func().is_unused(convert) {
            rewriter.erase_op(convert)?;
        }

        log::debug!(
            "store {}: stored from mfma layout through {} elementwise op(s)",
            op.index(),
            chain.len()
        );
        Ok(true)
    }
}

/// Applies [`BypassEpilogue`] to every function of the module.
#[derive(Debug, Default)]
pub struct OptimizeEpilogue;

impl Pass for OptimizeEpilogue {
    fn name(&self) -> &str {
        "optimize-epilogue"
    }

    fn run(&self, module: &mut Module) -> Result<bool, PassError> {
        let patterns: Vec<Box<dyn RewritePattern>> = vec![Box::new(BypassEpilogue)];
        let config = GreedyRewriteConfig::default();
        let mut changed = false;
        for (_, func) in module.functions.iter_mut() {
            changed |= apply_patterns_greedily(func, &patterns, &config)
                .map_err(|e| PassError::new(self.name(), e))?;
        }
        Ok(changed)
    }
}
