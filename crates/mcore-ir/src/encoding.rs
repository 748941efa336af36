//! Layout encodings attached to tensor types.
//!
//! An encoding describes how the elements of a tensor are distributed over
//! threads, warps and CTAs. Three families exist:
//!
//! - [`BlockedEncoding`]: generic distribution, independent of any
//!   hardware instruction.
//! - [`MfmaEncoding`]: the accumulator layout of a matrix-core instruction.
//! - [`DotOperandEncoding`]: the A or B operand layout of a matrix-core
//!   instruction, owned by a parent [`MfmaEncoding`].

use crate::arena::Handle;

/// Block-level (multi-CTA) tiling, inherited unchanged across lowering.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CtaLayout {
    pub ctas_per_cga: Vec<u32>,
    pub cta_split_num: Vec<u32>,
    pub cta_order: Vec<u32>,
}

impl CtaLayout {
    /// A single CTA covering a tensor of the given rank.
    pub fn single(rank: usize) -> Self {
        Self {
            ctas_per_cga: vec![1; rank],
            cta_split_num: vec![1; rank],
            cta_order: (0..rank as u32).rev().collect(),
        }
    }
}

/// Generic thread/warp distribution.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct BlockedEncoding {
    pub size_per_thread: Vec<u32>,
    pub threads_per_warp: Vec<u32>,
    pub warps_per_cta: Vec<u32>,
    pub order: Vec<u32>,
    pub cta_layout: CtaLayout,
}

impl BlockedEncoding {
    pub fn new(
        size_per_thread: impl Into<Vec<u32>>,
        threads_per_warp: impl Into<Vec<u32>>,
        warps_per_cta: impl Into<Vec<u32>>,
        order: impl Into<Vec<u32>>,
    ) -> Self {
        let order = order.into();
        let cta_layout = CtaLayout::single(order.len());
        Self {
            size_per_thread: size_per_thread.into(),
            threads_per_warp: threads_per_warp.into(),
            warps_per_cta: warps_per_cta.into(),
            order,
            cta_layout,
        }
    }
}

/// Matrix-core accumulator layout.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct MfmaEncoding {
    pub version_major: u32,
    pub version_minor: u32,
    /// Warps along M and N.
    pub warps_per_cta: [u32; 2],
    /// Instruction tile rows.
    pub m_dim: u32,
    /// Instruction tile columns.
    pub n_dim: u32,
    /// Set for chained multiplies so the consumer can skip a transpose.
    pub is_transposed: bool,
    pub cta_layout: CtaLayout,
}

/// Which side of the multiply an operand encoding describes.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum OperandIndex {
    A = 0,
    B = 1,
}

/// Operand layout of a matrix-core instruction.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DotOperandEncoding {
    pub op_idx: OperandIndex,
    /// The owning accumulator encoding; must be an [`Encoding::Mfma`].
    pub parent: Handle<Encoding>,
    /// Contiguous K elements held by one lane per instruction.
    pub k_width: u32,
}

/// A tensor layout encoding.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Encoding {
    Blocked(BlockedEncoding),
    Mfma(MfmaEncoding),
    DotOperand(DotOperandEncoding),
}

impl Encoding {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    pub fn as_mfma(&self) -> Option<&MfmaEncoding> {
        match self {
            Self::Mfma(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_dot_operand(&self) -> Option<&DotOperandEncoding> {
        match self {
            Self::DotOperand(d) => Some(d),
            _ => None,
        }
    }

    /// Short family name used in dumps and diagnostics.
    pub fn family(&self) -> &'static str {
        match self {
            Self::Blocked(_) => "blocked",
            Self::Mfma(_) => "mfma",
            Self::DotOperand(_) => "dot_op",
        }
    }
}
