//! Pattern rewriting: the [`Rewriter`] handed to patterns and the greedy
//! worklist driver that applies them to a fixed point.

use std::cmp::Reverse;
use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;

use mcore_ir::{Encoding, Function, Handle, OpFamily, OpKind, Operation, Type, Value};

use crate::error::RewriteError;

/// A local rewrite rooted at one operation.
pub trait RewritePattern: Debug {
    /// Human-readable name of the pattern.
    fn name(&self) -> &str;

    /// Only ops of this family are offered to the pattern.
    fn root_kind(&self) -> OpFamily;

    /// Patterns with a higher benefit are tried first.
    fn benefit(&self) -> u16 {
        1
    }

    /// Returns `Ok(false)` without touching the graph when the op does not
    /// match, `Ok(true)` after rewriting it.
    fn match_and_rewrite(
        &self,
        op: Handle<Operation>,
        rewriter: &mut Rewriter<'_>,
    ) -> Result<bool, RewriteError>;
}

/// Mutation interface for patterns.
///
/// New ops are inserted immediately before the insertion point, the root
/// op of the rewrite. Every op created or modified is recorded so the driver
/// can revisit it and its neighbours.
pub struct Rewriter<'a> {
    func: &'a mut Function,
    insertion_point: Handle<Operation>,
    touched: Vec<Handle<Operation>>,
}

impl<'a> Rewriter<'a> {
    pub fn new(func: &'a mut Function, root: Handle<Operation>) -> Self {
        Self {
            func,
            insertion_point: root,
            touched: Vec::new(),
        }
    }

    pub fn func(&self) -> &Function {
        self.func
    }

    pub fn intern_encoding(&mut self, encoding: Encoding) -> Handle<Encoding> {
        self.func.intern_encoding(encoding)
    }

    /// Creates an op before the insertion point.
    pub fn create_op(
        &mut self,
        kind: OpKind,
        operands: Vec<Handle<Value>>,
        result_types: Vec<Type>,
    ) -> Result<Handle<Operation>, RewriteError> {
        let op = self
            .func
            .insert_op_before(self.insertion_point, kind, operands, result_types)?;
        self.touched.push(op);
        Ok(op)
    }

    /// Creates a single-result op and returns its result.
    pub fn create_value(
        &mut self,
        kind: OpKind,
        operands: Vec<Handle<Value>>,
        result_type: impl Into<Type>,
    ) -> Result<Handle<Value>, RewriteError> {
        let name = kind.name().to_string();
        let op = self.create_op(kind, operands, vec![result_type.into()])?;
        self.func
            .result(op)
            .ok_or_else(|| RewriteError::InvariantViolation(format!("`{name}` has no result")))
    }

    /// Rewires every use of `op`'s results to `values` and erases `op`.
    pub fn replace_op(
        &mut self,
        op: Handle<Operation>,
        values: &[Handle<Value>],
    ) -> Result<(), RewriteError> {
        let results = self.func.op(op).results.clone();
        if results.len() != values.len() {
            return Err(RewriteError::InvariantViolation(format!(
                "replacing `{}` with {} values for {} results",
                self.func.op(op).kind.name(),
                values.len(),
                results.len()
            )));
        }
        for (&from, &to) in results.iter().zip(values) {
            for u in self.func.uses(from) {
                self.touched.push(u.op);
            }
            self.func.replace_all_uses_with(from, to);
        }
        self.erase_op(op)
    }

    /// Erases an op whose results are unused.
    pub fn erase_op(&mut self, op: Handle<Operation>) -> Result<(), RewriteError> {
        self.record_producers(op);
        self.func.erase_op(op)?;
        self.touched.push(op);
        Ok(())
    }

    pub fn set_operand(
        &mut self,
        op: Handle<Operation>,
        operand: usize,
        value: Handle<Value>,
    ) -> Result<(), RewriteError> {
        self.record_producers(op);
        self.func.set_operand(op, operand, value)?;
        self.touched.push(op);
        Ok(())
    }

    /// Retypes a value in place, keeping its producer and users.
    pub fn set_result_type(&mut self, value: Handle<Value>, ty: impl Into<Type>) {
        self.func.set_value_type(value, ty);
        if let Some(op) = self.func.defining_op(value) {
            self.touched.push(op);
        }
    }

    /// Ops created or modified so far, in order, possibly with repeats.
    pub fn touched(&self) -> &[Handle<Operation>] {
        &self.touched
    }

    fn record_producers(&mut self, op: Handle<Operation>) {
        let producers: Vec<_> = self
            .func
            .op(op)
            .operands
            .iter()
            .filter_map(|&v| self.func.defining_op(v))
            .collect();
        self.touched.extend(producers);
    }

    fn into_touched(self) -> Vec<Handle<Operation>> {
        self.touched
    }
}

/// Limits of the greedy driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GreedyRewriteConfig {
    /// Maximum number of full sweeps over the function.
    pub max_iterations: usize,
    /// Maximum number of successful pattern applications over the whole
    /// run; `None` for no limit.
    pub max_num_rewrites: Option<usize>,
}

impl Default for GreedyRewriteConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_num_rewrites: None,
        }
    }
}

struct Budget {
    limit: Option<usize>,
    used: usize,
}

struct Worklist {
    queue: VecDeque<Handle<Operation>>,
    queued: HashSet<Handle<Operation>>,
}

impl Worklist {
    fn new(ops: Vec<Handle<Operation>>) -> Self {
        let queued = ops.iter().copied().collect();
        Self {
            queue: ops.into(),
            queued,
        }
    }

    fn push(&mut self, op: Handle<Operation>) {
        if self.queued.insert(op) {
            self.queue.push_back(op);
        }
    }

    fn pop(&mut self) -> Option<Handle<Operation>> {
        let op = self.queue.pop_front()?;
        self.queued.remove(&op);
        Some(op)
    }

    /// Enqueues `op` together with the producers of its operands and the
    /// users of its results.
    fn push_with_neighbours(&mut self, func: &Function, op: Handle<Operation>) {
        if !func.is_live(op) {
            return;
        }
        self.push(op);
        let operation = func.op(op);
        for &v in &operation.operands {
            if let Some(producer) = func.defining_op(v) {
                self.push(producer);
            }
        }
        for &r in &operation.results {
            for u in func.uses(r) {
                self.push(u.op);
            }
        }
    }
}

fn is_trivially_dead(func: &Function, op: Handle<Operation>) -> bool {
    let operation = func.op(op);
    operation.kind.is_pure()
        && !operation.results.is_empty()
        && operation.regions.is_empty()
        && func.is_unused(op)
}

/// One pass over the worklist. Returns `true` if anything changed.
fn sweep(
    func: &mut Function,
    patterns: &[&dyn RewritePattern],
    budget: &mut Budget,
    iteration: usize,
) -> Result<bool, RewriteError> {
    let mut worklist = Worklist::new(func.walk());
    let mut changed = false;
    while let Some(op) = worklist.pop() {
        if !func.is_live(op) {
            continue;
        }
        if is_trivially_dead(func, op) {
            let producers: Vec<_> = func
                .op(op)
                .operands
                .iter()
                .filter_map(|&v| func.defining_op(v))
                .collect();
            log::trace!("erasing dead `{}`", func.op(op).kind.name());
            func.erase_op(op)?;
            for p in producers {
                worklist.push(p);
            }
            changed = true;
            continue;
        }

        let family = func.op(op).kind.family();
        for pattern in patterns.iter().filter(|p| p.root_kind() == family) {
            let mut rewriter = Rewriter::new(func, op);
            if !pattern.match_and_rewrite(op, &mut rewriter)? {
                continue;
            }
            log::trace!("{} applied to op {}", pattern.name(), op.index());
            budget.used += 1;
            if budget.limit.is_some_and(|limit| budget.used > limit) {
                return Err(RewriteError::DidNotConverge {
                    iterations: iteration + 1,
                });
            }
            for touched in rewriter.into_touched() {
                worklist.push_with_neighbours(func, touched);
            }
            changed = true;
            break;
        }
    }
    Ok(changed)
}

/// Applies `patterns` until no pattern matches and no dead op remains.
///
/// Returns `true` if the function was modified. Fails with
/// [`RewriteError::DidNotConverge`] if the last allowed sweep still
/// changed something or the rewrite budget ran out; pattern errors abort
/// immediately.
pub fn apply_patterns_greedily(
    func: &mut Function,
    patterns: &[Box<dyn RewritePattern>],
    config: &GreedyRewriteConfig,
) -> Result<bool, RewriteError> {
    let mut ordered: Vec<&dyn RewritePattern> = patterns.iter().map(|p| p.as_ref()).collect();
    ordered.sort_by_key(|p| Reverse(p.benefit()));

    let mut budget = Budget {
        limit: config.max_num_rewrites,
        used: 0,
    };
    let mut changed = false;
    for iteration in 0..config.max_iterations {
        if !sweep(func, &ordered, &mut budget, iteration)? {
            log::trace!("@{} converged after {} sweep(s)", func.name, iteration + 1);
            return Ok(changed);
        }
        changed = true;
    }
    Err(RewriteError::DidNotConverge {
        iterations: config.max_iterations,
    })
}
