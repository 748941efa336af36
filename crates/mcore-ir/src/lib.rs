//! mcore intermediate representation.
//!
//! A region-structured SSA dataflow graph over distributed tensors, the
//! input of the matrix-core lowering passes. Tensor types carry a layout
//! [`Encoding`] describing how elements map onto threads and warps; the
//! passes rewrite the graph by creating new operations and re-encoding
//! values.

pub mod arena;
mod display;
mod encoding;
mod error;
mod function;
mod op;
mod types;

pub use arena::{Arena, Handle, UniqueArena};
pub use display::{dump_function, dump_module, format_encoding, format_tensor_type, format_type};
pub use encoding::{
    BlockedEncoding, CtaLayout, DotOperandEncoding, Encoding, MfmaEncoding, OperandIndex,
};
pub use error::IrError;
pub use function::{Function, Use};
pub use op::{
    CacheModifier, CastOp, EvictionPolicy, OpFamily, OpKind, Operation, Region, UnaryOp, Value,
    ValueDef,
};
pub use types::{Bytes, Scalar, ScalarKind, TensorType, Type};

/// Warps per CTA when a module does not say otherwise.
pub const DEFAULT_NUM_WARPS: u32 = 4;

/// Lanes per warp (wavefront) on matrix-core hardware.
pub const DEFAULT_THREADS_PER_WARP: u32 = 64;

/// A compilation unit.
#[derive(Clone, Debug)]
pub struct Module {
    /// Optional module name.
    pub name: Option<String>,
    /// Warps per CTA, shared by every kernel of the module.
    pub num_warps: u32,
    /// Lanes per warp.
    pub threads_per_warp: u32,
    /// Kernel functions.
    pub functions: Arena<Function>,
}

impl Default for Module {
    fn default() -> Self {
        Self {
            name: None,
            num_warps: DEFAULT_NUM_WARPS,
            threads_per_warp: DEFAULT_THREADS_PER_WARP,
            functions: Arena::new(),
        }
    }
}

impl Module {
    /// An empty module with the given warp count.
    pub fn with_num_warps(num_warps: u32) -> Self {
        Self {
            num_warps,
            ..Self::default()
        }
    }
}
