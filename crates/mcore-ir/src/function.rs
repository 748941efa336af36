//! The mutable dataflow graph of a single kernel function.

use crate::arena::{Arena, Handle, UniqueArena};
use crate::encoding::{CtaLayout, Encoding};
use crate::error::IrError;
use crate::op::{OpKind, Operation, Region, Value, ValueDef};
use crate::types::{TensorType, Type};

/// A consumer of a value: `op` reads it through operand slot `operand`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Use {
    pub op: Handle<Operation>,
    pub operand: usize,
}

/// A kernel function: a region tree of operations over SSA values.
///
/// Operations are never removed from the arena; erasing one detaches it
/// from its region and every query skips it afterwards. Each value keeps
/// the list of its live uses, maintained by every mutation.
#[derive(Clone, Debug)]
pub struct Function {
    /// Symbol name.
    pub name: String,
    values: Arena<Value>,
    ops: Arena<Operation>,
    regions: Arena<Region>,
    /// Uses of each value, indexed like `values`.
    users: Vec<Vec<Use>>,
    encodings: UniqueArena<Encoding>,
    body: Handle<Region>,
}

impl Function {
    /// Creates a function with an empty body region.
    pub fn new(name: impl Into<String>) -> Self {
        let mut regions = Arena::new();
        let body = regions.append(Region::default());
        Self {
            name: name.into(),
            values: Arena::new(),
            ops: Arena::new(),
            regions,
            users: Vec::new(),
            encodings: UniqueArena::new(),
            body,
        }
    }

    /// The top-level region.
    pub fn body(&self) -> Handle<Region> {
        self.body
    }

    pub fn op(&self, op: Handle<Operation>) -> &Operation {
        &self.ops[op]
    }

    pub fn region(&self, region: Handle<Region>) -> &Region {
        &self.regions[region]
    }

    pub fn value(&self, value: Handle<Value>) -> &Value {
        &self.values[value]
    }

    pub fn is_live(&self, op: Handle<Operation>) -> bool {
        self.ops.try_get(op).is_some_and(|o| !o.is_erased())
    }

    // ---- encodings ----

    /// Interns an encoding, returning the shared handle for equal encodings.
    pub fn intern_encoding(&mut self, encoding: Encoding) -> Handle<Encoding> {
        self.encodings.insert(encoding)
    }

    pub fn encoding(&self, handle: Handle<Encoding>) -> &Encoding {
        &self.encodings[handle]
    }

    pub fn encodings(&self) -> &UniqueArena<Encoding> {
        &self.encodings
    }

    /// CTA layout of an encoding; dot-operand encodings report their parent's.
    pub fn cta_layout(&self, handle: Handle<Encoding>) -> Option<&CtaLayout> {
        match self.encodings.try_get(handle)? {
            Encoding::Blocked(b) => Some(&b.cta_layout),
            Encoding::Mfma(m) => Some(&m.cta_layout),
            Encoding::DotOperand(d) => match self.encodings.try_get(d.parent)? {
                Encoding::Mfma(m) => Some(&m.cta_layout),
                _ => None,
            },
        }
    }

    // ---- construction ----

    /// Adds a block argument to `region` (function arguments live on the body).
    pub fn add_argument(&mut self, region: Handle<Region>, ty: impl Into<Type>) -> Handle<Value> {
        let index = self.regions[region].arguments.len() as u32;
        let value = self.new_value(ty.into(), ValueDef::Argument { region, index });
        self.regions[region].arguments.push(value);
        value
    }

    /// Attaches a new, empty region to `parent_op`.
    pub fn add_region(&mut self, parent_op: Handle<Operation>) -> Handle<Region> {
        let region = self.regions.append(Region {
            parent_op: Some(parent_op),
            ..Region::default()
        });
        self.ops[parent_op].regions.push(region);
        region
    }

    /// Appends a new operation at the end of `region`.
    pub fn append_op(
        &mut self,
        region: Handle<Region>,
        kind: OpKind,
        operands: Vec<Handle<Value>>,
        result_types: Vec<Type>,
    ) -> Handle<Operation> {
        let op = self.allocate_op(region, kind, operands, result_types);
        self.regions[region].ops.push(op);
        op
    }

    /// Inserts a new operation immediately before `anchor`, in the same region.
    pub fn insert_op_before(
        &mut self,
        anchor: Handle<Operation>,
        kind: OpKind,
        operands: Vec<Handle<Value>>,
        result_types: Vec<Type>,
    ) -> Result<Handle<Operation>, IrError> {
        let region = self.ops[anchor].parent.ok_or(IrError::ErasedOp {
            index: anchor.index(),
        })?;
        let position = self.regions[region]
            .ops
            .iter()
            .position(|&o| o == anchor)
            .ok_or(IrError::ErasedOp {
                index: anchor.index(),
            })?;
        let op = self.allocate_op(region, kind, operands, result_types);
        self.regions[region].ops.insert(position, op);
        Ok(op)
    }

    fn new_value(&mut self, ty: Type, def: ValueDef) -> Handle<Value> {
        let value = self.values.append(Value { ty, def });
        self.users.push(Vec::new());
        value
    }

    fn allocate_op(
        &mut self,
        region: Handle<Region>,
        kind: OpKind,
        operands: Vec<Handle<Value>>,
        result_types: Vec<Type>,
    ) -> Handle<Operation> {
        // Arena handles are dense, so the new op's handle is known up front.
        let next = Handle::from_usize(self.ops.len());
        for (operand, &v) in operands.iter().enumerate() {
            self.users[v.index()].push(Use { op: next, operand });
        }
        let op = self.ops.append(Operation {
            kind,
            operands,
            results: Vec::with_capacity(result_types.len()),
            regions: Vec::new(),
            parent: Some(region),
        });
        for (index, ty) in result_types.into_iter().enumerate() {
            let def = ValueDef::Result {
                op,
                index: index as u32,
            };
            let value = self.new_value(ty, def);
            self.ops[op].results.push(value);
        }
        op
    }

    fn drop_use(&mut self, value: Handle<Value>, op: Handle<Operation>, operand: usize) {
        self.users[value.index()].retain(|u| u.op != op || u.operand != operand);
    }

    // ---- queries ----

    /// The single result of `op`.
    pub fn result(&self, op: Handle<Operation>) -> Option<Handle<Value>> {
        self.ops[op].result()
    }

    pub fn value_type(&self, value: Handle<Value>) -> &Type {
        &self.values[value].ty
    }

    pub fn tensor_type(&self, value: Handle<Value>) -> Result<&TensorType, IrError> {
        self.values[value].ty.as_tensor().ok_or(IrError::NotATensor {
            index: value.index(),
        })
    }

    /// The encoding of a tensor value, or `None` for scalars and
    /// unencoded tensors.
    pub fn value_encoding(&self, value: Handle<Value>) -> Option<&Encoding> {
        let handle = self.values[value].ty.as_tensor()?.encoding?;
        Some(&self.encodings[handle])
    }

    /// The live op producing `value`; `None` for region arguments.
    pub fn defining_op(&self, value: Handle<Value>) -> Option<Handle<Operation>> {
        match self.values[value].def {
            ValueDef::Result { op, .. } if self.is_live(op) => Some(op),
            _ => None,
        }
    }

    pub fn parent_region(&self, op: Handle<Operation>) -> Option<Handle<Region>> {
        self.ops[op].parent
    }

    /// All live ops in pre-order: each op before the contents of its regions.
    pub fn walk(&self) -> Vec<Handle<Operation>> {
        let mut out = Vec::with_capacity(self.ops.len());
        self.walk_region(self.body, &mut out);
        out
    }

    fn walk_region(&self, region: Handle<Region>, out: &mut Vec<Handle<Operation>>) {
        for &op in &self.regions[region].ops {
            out.push(op);
            for &nested in &self.ops[op].regions {
                self.walk_region(nested, out);
            }
        }
    }

    /// Every live consumer of `value`, in the order the uses were created.
    pub fn uses(&self, value: Handle<Value>) -> Vec<Use> {
        self.users[value.index()].clone()
    }

    pub fn use_count(&self, value: Handle<Value>) -> usize {
        self.users[value.index()].len()
    }

    pub fn has_one_use(&self, value: Handle<Value>) -> bool {
        self.use_count(value) == 1
    }

    /// `true` if none of the results of `op` are used.
    pub fn is_unused(&self, op: Handle<Operation>) -> bool {
        self.ops[op]
            .results
            .iter()
            .all(|&r| self.use_count(r) == 0)
    }

    // ---- mutation ----

    pub fn set_operand(
        &mut self,
        op: Handle<Operation>,
        operand: usize,
        value: Handle<Value>,
    ) -> Result<(), IrError> {
        let count = self.ops[op].operands.len();
        if operand >= count {
            return Err(IrError::OperandOutOfRange {
                op: self.ops[op].kind.name().to_string(),
                operand,
                count,
            });
        }
        let old = self.ops[op].operands[operand];
        if old != value {
            self.drop_use(old, op, operand);
            self.users[value.index()].push(Use { op, operand });
            self.ops[op].operands[operand] = value;
        }
        Ok(())
    }

    /// Retypes a value in place. Its producer and users are left untouched.
    pub fn set_value_type(&mut self, value: Handle<Value>, ty: impl Into<Type>) {
        self.values[value].ty = ty.into();
    }

    /// Points every use of `from` at `to`.
    pub fn replace_all_uses_with(&mut self, from: Handle<Value>, to: Handle<Value>) {
        if from == to {
            return;
        }
        let moved = std::mem::take(&mut self.users[from.index()]);
        for u in &moved {
            self.ops[u.op].operands[u.operand] = to;
        }
        self.users[to.index()].extend(moved);
    }

    /// Detaches `op` (and everything nested in it) from the graph.
    pub fn erase_op(&mut self, op: Handle<Operation>) -> Result<(), IrError> {
        let region = self.ops[op].parent.ok_or(IrError::ErasedOp { index: op.index() })?;
        for &result in &self.ops[op].results {
            let uses = self.use_count(result);
            if uses > 0 {
                return Err(IrError::EraseWithUses {
                    op: self.ops[op].kind.name().to_string(),
                    index: op.index(),
                    uses,
                });
            }
        }
        self.regions[region].ops.retain(|&o| o != op);
        self.detach(op);
        Ok(())
    }

    fn detach(&mut self, op: Handle<Operation>) {
        self.ops[op].parent = None;
        let operands = self.ops[op].operands.clone();
        for (operand, v) in operands.into_iter().enumerate() {
            self.drop_use(v, op, operand);
        }
        let nested = self.ops[op].regions.clone();
        for region in nested {
            let inner = std::mem::take(&mut self.regions[region].ops);
            for child in inner {
                self.detach(child);
            }
        }
    }

    /// Number of live operations.
    pub fn live_op_count(&self) -> usize {
        self.walk().len()
    }
}
