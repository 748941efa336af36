//! Display implementations and text dump for debugging.

use std::fmt::{self, Write};

use crate::Module;
use crate::arena::Handle;
use crate::encoding::{CtaLayout, Encoding};
use crate::function::Function;
use crate::op::{OpKind, Region};
use crate::types::{Scalar, ScalarKind, TensorType, Type};

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScalarKind::Bool => write!(f, "i1"),
            ScalarKind::Sint => write!(f, "i{}", self.bit_width()),
            ScalarKind::Uint => write!(f, "ui{}", self.bit_width()),
            ScalarKind::Float => write!(f, "f{}", self.bit_width()),
            ScalarKind::BFloat => write!(f, "bf{}", self.bit_width()),
            ScalarKind::Float8E4M3 => write!(f, "f8E4M3"),
            ScalarKind::Float8E5M2 => write!(f, "f8E5M2"),
            ScalarKind::Ptr => write!(f, "!ptr"),
        }
    }
}

struct Dims<'a>(&'a [u32]);

impl fmt::Display for Dims<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('[')?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{d}")?;
        }
        f.write_char(']')
    }
}

fn format_cta(cta: &CtaLayout) -> String {
    format!(
        "CTAsPerCGA = {}, CTASplitNum = {}, CTAOrder = {}",
        Dims(&cta.ctas_per_cga),
        Dims(&cta.cta_split_num),
        Dims(&cta.cta_order)
    )
}

/// Formats one encoding; dot-operand parents are printed as `#eN` aliases.
pub fn format_encoding(encoding: &Encoding) -> String {
    match encoding {
        Encoding::Blocked(b) => format!(
            "#blocked<{{sizePerThread = {}, threadsPerWarp = {}, warpsPerCTA = {}, order = {}, {}}}>",
            Dims(&b.size_per_thread),
            Dims(&b.threads_per_warp),
            Dims(&b.warps_per_cta),
            Dims(&b.order),
            format_cta(&b.cta_layout)
        ),
        Encoding::Mfma(m) => format!(
            "#mfma<{{versionMajor = {}, versionMinor = {}, warpsPerCTA = {}, instrShape = [{}, {}], isTransposed = {}, {}}}>",
            m.version_major,
            m.version_minor,
            Dims(&m.warps_per_cta),
            m.m_dim,
            m.n_dim,
            m.is_transposed,
            format_cta(&m.cta_layout)
        ),
        Encoding::DotOperand(d) => format!(
            "#dot_op<{{opIdx = {}, parent = #e{}, kWidth = {}}}>",
            d.op_idx as u32,
            d.parent.index(),
            d.k_width
        ),
    }
}

/// Formats a tensor type as `tensor<64x32xf16, #e0>`.
pub fn format_tensor_type(ty: &TensorType) -> String {
    let mut s = String::from("tensor<");
    for d in &ty.shape {
        let _ = write!(s, "{d}x");
    }
    let _ = write!(s, "{}", ty.scalar);
    if let Some(enc) = ty.encoding {
        let _ = write!(s, ", #e{}", enc.index());
    }
    s.push('>');
    s
}

pub fn format_type(ty: &Type) -> String {
    match ty {
        Type::Scalar(s) => s.to_string(),
        Type::Tensor(t) => format_tensor_type(t),
    }
}

fn format_attrs(kind: &OpKind) -> String {
    match kind {
        OpKind::Dot {
            allow_tf32,
            max_num_imprecise_acc,
        } => format!(
            " {{allowTF32 = {allow_tf32}, maxNumImpreciseAcc = {max_num_imprecise_acc}}}"
        ),
        OpKind::Store { cache, evict } => format!(" {{cache = {cache:?}, evict = {evict:?}}}"),
        OpKind::ExternElementwise { symbol, pure } => {
            format!(" {{symbol = \"{symbol}\", pure = {pure}}}")
        }
        _ => String::new(),
    }
}

fn dump_region(func: &Function, region: Handle<Region>, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for &op in &func.region(region).ops {
        let operation = func.op(op);
        out.push_str(&indent);
        if !operation.results.is_empty() {
            let names: Vec<String> = operation
                .results
                .iter()
                .map(|r| format!("%{}", r.index()))
                .collect();
            let _ = write!(out, "{} = ", names.join(", "));
        }
        out.push_str(operation.kind.name());
        let operands: Vec<String> = operation
            .operands
            .iter()
            .map(|v| format!("%{}", v.index()))
            .collect();
        if !operands.is_empty() {
            let _ = write!(out, " {}", operands.join(", "));
        }
        out.push_str(&format_attrs(&operation.kind));
        let types: Vec<String> = operation
            .operands
            .iter()
            .chain(operation.results.iter())
            .map(|&v| format_type(func.value_type(v)))
            .collect();
        if !types.is_empty() {
            let _ = write!(out, " : {}", types.join(", "));
        }
        for &nested in &operation.regions {
            let args: Vec<String> = func
                .region(nested)
                .arguments
                .iter()
                .map(|&a| format!("%{}: {}", a.index(), format_type(func.value_type(a))))
                .collect();
            let _ = writeln!(out, " ({}) {{", args.join(", "));
            dump_region(func, nested, depth + 1, out);
            out.push_str(&indent);
            out.push('}');
        }
        out.push('\n');
    }
}

/// Dumps a function: encoding aliases first, then the body.
pub fn dump_function(func: &Function) -> String {
    let mut out = String::new();
    for (handle, encoding) in func.encodings().iter() {
        let _ = writeln!(out, "#e{} = {}", handle.index(), format_encoding(encoding));
    }
    let args: Vec<String> = func
        .region(func.body())
        .arguments
        .iter()
        .map(|&a| format!("%{}: {}", a.index(), format_type(func.value_type(a))))
        .collect();
    let _ = writeln!(out, "func @{}({}) {{", func.name, args.join(", "));
    dump_region(func, func.body(), 1, &mut out);
    out.push_str("}\n");
    out
}

/// Dumps every function of a module.
pub fn dump_module(module: &Module) -> String {
    let mut out = format!(
        "module attributes {{num-warps = {}, threads-per-warp = {}}}\n",
        module.num_warps, module.threads_per_warp
    );
    for (_, func) in module.functions.iter() {
        out.push_str(&dump_function(func));
    }
    out
}
