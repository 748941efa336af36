//! Error types for the mcore IR.

/// Errors raised by graph mutation and typed queries.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A handle does not refer to a live operation.
    #[error("operation {index} has been erased")]
    ErasedOp { index: usize },

    /// An operation was erased while one of its results still had users.
    #[error("cannot erase `{op}` (operation {index}): result still has {uses} use(s)")]
    EraseWithUses {
        op: String,
        index: usize,
        uses: usize,
    },

    /// An operand slot does not exist.
    #[error("operand index {operand} out of range for `{op}` ({count} operands)")]
    OperandOutOfRange {
        op: String,
        operand: usize,
        count: usize,
    },

    /// A tensor was required but a scalar value was found.
    #[error("value {index} is not a tensor")]
    NotATensor { index: usize },
}
