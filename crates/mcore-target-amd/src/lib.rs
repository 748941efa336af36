//! AMD CDNA matrix-core target description.
//!
//! Provides the MFMA instruction table per hardware generation and the
//! predicate deciding whether a multiply can be lowered onto it at all.

pub mod mfma;
pub mod support;
pub mod version;

pub use mfma::{MfmaInsn, OperandGroup};
pub use support::{CdnaSupport, DotProblem, MatmulSupport, supports_mfma};
pub use version::{MatrixCoreVersion, VersionError};
