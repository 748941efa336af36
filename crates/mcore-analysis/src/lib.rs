//! Dataflow analyses over the mcore IR.

pub mod slice;
pub mod verify;

pub use slice::{
    Slice, backward_slice, bidirectional_slice, forward_slice, is_chain_dot, same_region_filter,
};
pub use verify::{EncodingViolation, verify_encodings, verify_function};
