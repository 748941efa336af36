//! Scalar and tensor types.

use crate::arena::Handle;
use crate::encoding::Encoding;

/// Width of a scalar type in bytes.
pub type Bytes = u8;

/// The kind of a scalar element.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ScalarKind {
    /// Boolean (predicate masks).
    Bool,
    /// Signed integer.
    Sint,
    /// Unsigned integer.
    Uint,
    /// IEEE floating point.
    Float,
    /// Brain floating point.
    BFloat,
    /// 8-bit float, 4 exponent bits.
    Float8E4M3,
    /// 8-bit float, 5 exponent bits.
    Float8E5M2,
    /// Global memory pointer.
    Ptr,
}

/// A scalar element type: kind + byte width.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub width: Bytes,
}

impl Scalar {
    pub const BOOL: Self = Self {
        kind: ScalarKind::Bool,
        width: 1,
    };
    pub const I8: Self = Self {
        kind: ScalarKind::Sint,
        width: 1,
    };
    pub const U8: Self = Self {
        kind: ScalarKind::Uint,
        width: 1,
    };
    pub const I16: Self = Self {
        kind: ScalarKind::Sint,
        width: 2,
    };
    pub const I32: Self = Self {
        kind: ScalarKind::Sint,
        width: 4,
    };
    pub const U32: Self = Self {
        kind: ScalarKind::Uint,
        width: 4,
    };
    pub const I64: Self = Self {
        kind: ScalarKind::Sint,
        width: 8,
    };
    pub const F8E4M3: Self = Self {
        kind: ScalarKind::Float8E4M3,
        width: 1,
    };
    pub const F8E5M2: Self = Self {
        kind: ScalarKind::Float8E5M2,
        width: 1,
    };
    pub const F16: Self = Self {
        kind: ScalarKind::Float,
        width: 2,
    };
    pub const BF16: Self = Self {
        kind: ScalarKind::BFloat,
        width: 2,
    };
    pub const F32: Self = Self {
        kind: ScalarKind::Float,
        width: 4,
    };
    pub const F64: Self = Self {
        kind: ScalarKind::Float,
        width: 8,
    };
    pub const PTR: Self = Self {
        kind: ScalarKind::Ptr,
        width: 8,
    };

    /// Bool, signed or unsigned integer.
    pub fn is_integer(self) -> bool {
        matches!(
            self.kind,
            ScalarKind::Bool | ScalarKind::Sint | ScalarKind::Uint
        )
    }

    /// Any floating-point kind, including bf16 and the 8-bit formats.
    pub fn is_float(self) -> bool {
        matches!(
            self.kind,
            ScalarKind::Float | ScalarKind::BFloat | ScalarKind::Float8E4M3 | ScalarKind::Float8E5M2
        )
    }

    /// Only [`ScalarKind::Sint`] counts as signed; bool and unsigned widen
    /// with zero extension.
    pub fn is_signed(self) -> bool {
        self.kind == ScalarKind::Sint
    }

    /// Width in bits.
    pub fn bit_width(self) -> u32 {
        u32::from(self.width) * 8
    }
}

/// A ranked tensor type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TensorType {
    /// Dimension sizes, outermost first.
    pub shape: Vec<u32>,
    /// Element type.
    pub scalar: Scalar,
    /// Layout encoding, if one has been assigned.
    pub encoding: Option<Handle<Encoding>>,
}

impl TensorType {
    pub fn new(shape: impl Into<Vec<u32>>, scalar: Scalar, encoding: Handle<Encoding>) -> Self {
        Self {
            shape: shape.into(),
            scalar,
            encoding: Some(encoding),
        }
    }

    /// Same shape and element type, different layout.
    pub fn with_encoding(&self, encoding: Handle<Encoding>) -> Self {
        Self {
            shape: self.shape.clone(),
            scalar: self.scalar,
            encoding: Some(encoding),
        }
    }

    /// Same shape and layout, different element type.
    pub fn with_scalar(&self, scalar: Scalar) -> Self {
        Self {
            shape: self.shape.clone(),
            scalar,
            encoding: self.encoding,
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

/// The type of a graph value.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Type {
    /// A single scalar (loop induction variables, scalar kernel arguments).
    Scalar(Scalar),
    /// A distributed tensor.
    Tensor(TensorType),
}

impl Type {
    pub fn as_tensor(&self) -> Option<&TensorType> {
        match self {
            Self::Tensor(t) => Some(t),
            Self::Scalar(_) => None,
        }
    }

    pub fn scalar(&self) -> Scalar {
        match self {
            Self::Scalar(s) => *s,
            Self::Tensor(t) => t.scalar,
        }
    }
}

impl From<TensorType> for Type {
    fn from(t: TensorType) -> Self {
        Self::Tensor(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_categories() {
        assert!(Scalar::I8.is_integer());
        assert!(Scalar::BOOL.is_integer());
        assert!(!Scalar::F16.is_integer());
        assert!(Scalar::BF16.is_float());
        assert!(Scalar::F8E5M2.is_float());
        assert!(!Scalar::PTR.is_float());
        assert!(!Scalar::PTR.is_integer());
    }

    #[test]
    fn signedness() {
        assert!(Scalar::I32.is_signed());
        assert!(!Scalar::U32.is_signed());
        assert!(!Scalar::BOOL.is_signed());
    }

    #[test]
    fn bit_widths() {
        assert_eq!(Scalar::F16.bit_width(), 16);
        assert_eq!(Scalar::I64.bit_width(), 64);
        assert_eq!(Scalar::F8E4M3.bit_width(), 8);
    }

    #[test]
    fn tensor_type_builders_keep_shape() {
        let t = TensorType {
            shape: vec![64, 32],
            scalar: Scalar::F16,
            encoding: None,
        };
        let widened = t.with_scalar(Scalar::F32);
        assert_eq!(widened.shape, vec![64, 32]);
        assert_eq!(widened.scalar, Scalar::F32);
        assert_eq!(widened.encoding, None);
        assert_eq!(t.rank(), 2);
    }
}
