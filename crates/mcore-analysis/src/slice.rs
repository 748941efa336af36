//! Dataflow slices over the operation graph.
//!
//! A backward slice follows operands to their producers, a forward slice
//! follows results to their users. Both are bounded by a filter predicate;
//! ops rejected by the filter are neither included nor traversed through.

use std::collections::HashSet;

use mcore_ir::{Function, Handle, OpFamily, Operation};

/// Ops in the slice, in discovery order and without duplicates.
pub type Slice = Vec<Handle<Operation>>;

fn push_unique(
    op: Handle<Operation>,
    seen: &mut HashSet<Handle<Operation>>,
    out: &mut Slice,
) -> bool {
    if seen.insert(op) {
        out.push(op);
        true
    } else {
        false
    }
}

/// Transitive producers of `root`'s operands. Region arguments have no
/// producer and end the walk. `root` itself is not included.
pub fn backward_slice(
    func: &Function,
    root: Handle<Operation>,
    filter: &dyn Fn(Handle<Operation>) -> bool,
) -> Slice {
    let mut seen = HashSet::from([root]);
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(op) = stack.pop() {
        for &operand in &func.op(op).operands {
            let Some(producer) = func.defining_op(operand) else {
                continue;
            };
            if filter(producer) && push_unique(producer, &mut seen, &mut out) {
                stack.push(producer);
            }
        }
    }
    out
}

/// Transitive users of `root`'s results. `root` itself is not included.
pub fn forward_slice(
    func: &Function,
    root: Handle<Operation>,
    filter: &dyn Fn(Handle<Operation>) -> bool,
) -> Slice {
    let mut seen = HashSet::from([root]);
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(op) = stack.pop() {
        for &result in &func.op(op).results {
            for u in func.uses(result) {
                if filter(u.op) && push_unique(u.op, &mut seen, &mut out) {
                    stack.push(u.op);
                }
            }
        }
    }
    out
}

/// Closure of backward and forward slices starting at `root`: the filtered
/// connected component of `root` (root first).
///
/// Computed as one breadth-first walk over direct producers and users, so
/// each op in the component is expanded once.
pub fn bidirectional_slice(
    func: &Function,
    root: Handle<Operation>,
    filter: &dyn Fn(Handle<Operation>) -> bool,
) -> Slice {
    let mut seen = HashSet::from([root]);
    let mut out = vec![root];
    let mut cursor = 0;
    while cursor < out.len() {
        let current = func.op(out[cursor]);
        for &operand in &current.operands {
            if let Some(producer) = func.defining_op(operand)
                && filter(producer)
            {
                push_unique(producer, &mut seen, &mut out);
            }
        }
        for &result in &current.results {
            for u in func.uses(result) {
                if filter(u.op) {
                    push_unique(u.op, &mut seen, &mut out);
                }
            }
        }
        cursor += 1;
    }
    out
}

/// Accepts only ops living in the same region as `root`.
pub fn same_region_filter(
    func: &Function,
    root: Handle<Operation>,
) -> impl Fn(Handle<Operation>) -> bool + '_ {
    let region = func.parent_region(root);
    move |op| func.parent_region(op) == region
}

/// A multiply is chained when another multiply shares its dataflow slice
/// within the enclosing region.
pub fn is_chain_dot(func: &Function, dot: Handle<Operation>) -> bool {
    let filter = same_region_filter(func, dot);
    bidirectional_slice(func, dot, &filter)
        .into_iter()
        .any(|op| op != dot && func.op(op).kind.family() == OpFamily::Dot)
}
