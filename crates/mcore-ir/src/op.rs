//! Operations, values and regions of the dataflow graph.

use crate::arena::Handle;
use crate::types::Type;

/// Numeric and pointer casts.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum CastOp {
    /// Reinterpret bits, same width.
    Bitcast,
    /// Integer truncation.
    TruncI,
    /// Sign-extending integer widen.
    ExtSI,
    /// Zero-extending integer widen.
    ExtUI,
    /// f16 -> f32.
    ExtF,
    /// f32 -> f16.
    TruncF,
    /// Any other float-to-float conversion (bf16, f8, f64...).
    FpToFp,
    FpToSI,
    FpToUI,
    SIToFP,
    UIToFP,
    IntToPtr,
    PtrToInt,
    /// Pointer-to-pointer reinterpretation.
    PtrBitcast,
}

impl CastOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bitcast => "bitcast",
            Self::TruncI => "trunci",
            Self::ExtSI => "extsi",
            Self::ExtUI => "extui",
            Self::ExtF => "extf",
            Self::TruncF => "truncf",
            Self::FpToFp => "fp_to_fp",
            Self::FpToSI => "fptosi",
            Self::FpToUI => "fptoui",
            Self::SIToFP => "sitofp",
            Self::UIToFP => "uitofp",
            Self::IntToPtr => "int_to_ptr",
            Self::PtrToInt => "ptr_to_int",
            Self::PtrBitcast => "ptr_bitcast",
        }
    }
}

/// Single-operand elementwise math.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnaryOp {
    NegF,
    AbsF,
    AbsI,
    Atan,
    Ceil,
    Cos,
    Sin,
    CountLeadingZeros,
    CountTrailingZeros,
    CtPop,
    Erf,
    Exp,
    Exp2,
    ExpM1,
    Floor,
    Log,
    Log10,
    Log1p,
    Log2,
    Rsqrt,
    Sqrt,
    Tanh,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::NegF => "negf",
            Self::AbsF => "absf",
            Self::AbsI => "absi",
            Self::Atan => "atan",
            Self::Ceil => "ceil",
            Self::Cos => "cos",
            Self::Sin => "sin",
            Self::CountLeadingZeros => "ctlz",
            Self::CountTrailingZeros => "cttz",
            Self::CtPop => "ctpop",
            Self::Erf => "erf",
            Self::Exp => "exp",
            Self::Exp2 => "exp2",
            Self::ExpM1 => "expm1",
            Self::Floor => "floor",
            Self::Log => "log",
            Self::Log10 => "log10",
            Self::Log1p => "log1p",
            Self::Log2 => "log2",
            Self::Rsqrt => "rsqrt",
            Self::Sqrt => "sqrt",
            Self::Tanh => "tanh",
        }
    }
}

/// Cache hint carried by stores.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum CacheModifier {
    #[default]
    None,
    Ca,
    Cg,
    Wb,
    Cs,
    Wt,
}

/// Eviction hint carried by stores.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum EvictionPolicy {
    #[default]
    Normal,
    EvictFirst,
    EvictLast,
}

/// What an operation does.
#[derive(Clone, Debug, PartialEq)]
pub enum OpKind {
    /// `d = a * b + c`. Operands `[a, b, c]`, one result.
    Dot {
        allow_tf32: bool,
        max_num_imprecise_acc: u32,
    },
    /// Memory write. Operands `[ptr, value]` or `[ptr, value, mask]`.
    Store {
        cache: CacheModifier,
        evict: EvictionPolicy,
    },
    /// Same element type, new layout encoding.
    ConvertLayout,
    Cast(CastOp),
    Unary(UnaryOp),
    /// Call to an externally declared elementwise function.
    ExternElementwise { symbol: String, pure: bool },
    /// Any other operation. Treated as having side effects.
    Opaque { name: String },
}

/// Operation kinds without payload, used to route ops to patterns.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum OpFamily {
    Dot,
    Store,
    ConvertLayout,
    Cast,
    Unary,
    ExternElementwise,
    Opaque,
}

impl OpKind {
    pub fn family(&self) -> OpFamily {
        match self {
            Self::Dot { .. } => OpFamily::Dot,
            Self::Store { .. } => OpFamily::Store,
            Self::ConvertLayout => OpFamily::ConvertLayout,
            Self::Cast(_) => OpFamily::Cast,
            Self::Unary(_) => OpFamily::Unary,
            Self::ExternElementwise { .. } => OpFamily::ExternElementwise,
            Self::Opaque { .. } => OpFamily::Opaque,
        }
    }

    /// `true` if the op has no side effects and may be erased once unused.
    pub fn is_pure(&self) -> bool {
        match self {
            Self::Dot { .. } | Self::ConvertLayout | Self::Cast(_) | Self::Unary(_) => true,
            Self::ExternElementwise { pure, .. } => *pure,
            Self::Store { .. } | Self::Opaque { .. } => false,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Dot { .. } => "dot",
            Self::Store { .. } => "store",
            Self::ConvertLayout => "convert_layout",
            Self::Cast(c) => c.name(),
            Self::Unary(u) => u.name(),
            Self::ExternElementwise { .. } => "extern_elementwise",
            Self::Opaque { name } => name,
        }
    }
}

/// Where a value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueDef {
    /// The `index`-th result of `op`.
    Result { op: Handle<Operation>, index: u32 },
    /// The `index`-th argument of `region`.
    Argument { region: Handle<Region>, index: u32 },
}

/// An SSA value.
#[derive(Clone, Debug)]
pub struct Value {
    pub ty: Type,
    pub def: ValueDef,
}

/// A node of the dataflow graph.
#[derive(Clone, Debug)]
pub struct Operation {
    pub kind: OpKind,
    pub operands: Vec<Handle<Value>>,
    pub results: Vec<Handle<Value>>,
    /// Nested regions (loop bodies and the like).
    pub regions: Vec<Handle<Region>>,
    /// Enclosing region; `None` once the op has been erased.
    pub parent: Option<Handle<Region>>,
}

impl Operation {
    /// The single result, if the op has exactly one.
    pub fn result(&self) -> Option<Handle<Value>> {
        match self.results.as_slice() {
            [r] => Some(*r),
            _ => None,
        }
    }

    pub fn is_erased(&self) -> bool {
        self.parent.is_none()
    }
}

/// An ordered list of operations with block arguments.
#[derive(Clone, Debug, Default)]
pub struct Region {
    /// The op owning this region; `None` for a function body.
    pub parent_op: Option<Handle<Operation>>,
    pub arguments: Vec<Handle<Value>>,
    pub ops: Vec<Handle<Operation>>,
}
