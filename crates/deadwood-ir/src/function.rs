//! Function: arena-based mutable storage for one function's CFG.
//!
//! All IR entities (instructions, values, blocks) are stored in `PrimaryMap`s
//! owned by the `Function`. Detached instructions stay in the arena so that
//! refs never dangle; they are simply no longer part of any block.

use cranelift_entity::{PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::opcode::Opcode;
use crate::refs::*;

// ============================================================================
// Use-chain
// ============================================================================

/// A single use of a value: which instruction uses it, at which operand index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: InstRef,
    pub operand_index: u32,
}

// ============================================================================
// Entity data types
// ============================================================================

/// Instruction operand: an SSA value or an immediate integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Value(ValueRef),
    Imm(i64),
}

impl Operand {
    /// The referenced value, if this operand is not an immediate.
    pub fn as_value(self) -> Option<ValueRef> {
        match self {
            Operand::Value(v) => Some(v),
            Operand::Imm(_) => None,
        }
    }
}

impl From<ValueRef> for Operand {
    fn from(value: ValueRef) -> Self {
        Operand::Value(value)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Imm(value)
    }
}

/// Data for a single instruction in the arena.
#[derive(Clone, Debug)]
pub struct InstData {
    pub opcode: Opcode,
    pub operands: SmallVec<[Operand; 4]>,
    /// Branch targets, for terminators.
    pub successors: SmallVec<[BlockRef; 2]>,
    /// Incoming blocks of a phi, parallel to `operands`.
    pub phi_blocks: SmallVec<[BlockRef; 2]>,
    /// Callee symbol, for calls.
    pub callee: Option<String>,
    pub parent_block: Option<BlockRef>,
}

impl InstData {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: SmallVec::new(),
            successors: SmallVec::new(),
            phi_blocks: SmallVec::new(),
            callee: None,
            parent_block: None,
        }
    }
}

/// Data for a single SSA value.
#[derive(Clone, Debug)]
pub struct ValueData {
    pub def: ValueDef,
    pub name: Option<String>,
}

/// Data for a basic block.
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    pub label: Option<String>,
    pub insts: Vec<InstRef>,
}

// ============================================================================
// Function
// ============================================================================

/// A single function: parameters, blocks in layout order, and the arena
/// holding every instruction and value ever created for it.
///
/// The first block in layout order is the entry block.
#[derive(Debug)]
pub struct Function {
    name: String,
    insts: PrimaryMap<InstRef, InstData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    layout: Vec<BlockRef>,
    params: Vec<ValueRef>,

    /// Result value of each instruction, if it defines one.
    results: SecondaryMap<InstRef, Option<ValueRef>>,
    /// Use-chain: for each value, the attached or pending instructions using it.
    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,
}

impl Function {
    /// Create a new empty function.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            insts: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            layout: Vec::new(),
            params: Vec::new(),
            results: SecondaryMap::new(),
            uses: SecondaryMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Append a parameter and return its value.
    pub fn add_param(&mut self, name: Option<&str>) -> ValueRef {
        let index = self.params.len() as u32;
        let v = self.values.push(ValueData {
            def: ValueDef::Param(index),
            name: name.map(str::to_owned),
        });
        self.params.push(v);
        v
    }

    pub fn params(&self) -> &[ValueRef] {
        &self.params
    }

    // ========================================================================
    // Instruction
    // ========================================================================

    /// Create a new, unattached instruction.
    ///
    /// The instruction's operands are registered in the use-chain.
    ///
    /// # Panics
    ///
    /// Panics if `data.parent_block` is `Some`; use `append_inst` to attach
    /// the instruction after creation.
    pub fn create_inst(&mut self, data: InstData) -> InstRef {
        assert!(
            data.parent_block.is_none(),
            "create_inst: instruction must not have parent_block set; \
             use append_inst to attach it after creation",
        );
        let operands = data.operands.clone();
        let inst = self.insts.push(data);
        self.register_uses(inst, &operands);
        inst
    }

    /// Allocate the result value of `inst`.
    ///
    /// # Panics
    ///
    /// Panics if the instruction already defines a result.
    pub fn define_result(&mut self, inst: InstRef, name: Option<&str>) -> ValueRef {
        assert!(
            self.results[inst].is_none(),
            "define_result: {inst} already defines a result",
        );
        let v = self.values.push(ValueData {
            def: ValueDef::InstResult(inst),
            name: name.map(str::to_owned),
        });
        self.results[inst] = Some(v);
        v
    }

    /// Get immutable reference to instruction data.
    pub fn inst(&self, inst: InstRef) -> &InstData {
        &self.insts[inst]
    }

    /// The value defined by `inst`, if any.
    pub fn inst_result(&self, inst: InstRef) -> Option<ValueRef> {
        self.results[inst]
    }

    /// Replace the operand list of an instruction, keeping the use-chain in sync.
    pub fn set_operands(&mut self, inst: InstRef, operands: impl IntoIterator<Item = Operand>) {
        self.unregister_uses(inst);
        let operands: SmallVec<[Operand; 4]> = operands.into_iter().collect();
        self.register_uses(inst, &operands);
        self.insts[inst].operands = operands;
    }

    /// Append an instruction to the end of a block.
    ///
    /// # Panics
    ///
    /// Panics if the instruction already belongs to a block.
    pub fn append_inst(&mut self, block: BlockRef, inst: InstRef) {
        assert!(
            self.insts[inst].parent_block.is_none(),
            "append_inst: {inst} already belongs to {:?}; detach it first",
            self.insts[inst].parent_block,
        );
        self.insts[inst].parent_block = Some(block);
        self.blocks[block].insts.push(inst);
    }

    /// Insert an instruction before `before` in the block that holds `before`.
    ///
    /// # Panics
    ///
    /// Panics if the instruction already belongs to a block, or if `before`
    /// is detached.
    pub fn insert_inst_before(&mut self, before: InstRef, inst: InstRef) {
        assert!(
            self.insts[inst].parent_block.is_none(),
            "insert_inst_before: {inst} already belongs to {:?}; detach it first",
            self.insts[inst].parent_block,
        );
        let block = self.insts[before]
            .parent_block
            .expect("insert_inst_before: `before` is not attached to a block");
        let insts = &mut self.blocks[block].insts;
        let pos = insts
            .iter()
            .position(|&i| i == before)
            .expect("insert_inst_before: `before` not found in its block");
        insts.insert(pos, inst);
        self.insts[inst].parent_block = Some(block);
    }

    /// Detach an instruction from its block.
    ///
    /// The instruction stays in the arena, but its operand uses are dropped
    /// from the use-chain. Users of its result are left untouched.
    /// Detaching an unattached instruction is a no-op.
    pub fn detach_inst(&mut self, inst: InstRef) {
        let Some(block) = self.insts[inst].parent_block.take() else {
            return;
        };
        self.blocks[block].insts.retain(|i| *i != inst);
        self.unregister_uses(inst);
    }

    pub fn is_attached(&self, inst: InstRef) -> bool {
        self.insts[inst].parent_block.is_some()
    }

    /// Number of instructions ever created, attached or not.
    pub fn inst_capacity(&self) -> usize {
        self.insts.len()
    }

    // ========================================================================
    // Value
    // ========================================================================

    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    pub fn value_name(&self, v: ValueRef) -> Option<&str> {
        self.values[v].name.as_deref()
    }

    /// Number of values ever created (parameters and results).
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    /// Iterate over every value in creation order.
    pub fn values(&self) -> impl Iterator<Item = ValueRef> + '_ {
        self.values.keys()
    }

    /// Get all uses of a value.
    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    // ========================================================================
    // Block
    // ========================================================================

    /// Create a new block and append it to the layout.
    pub fn create_block(&mut self, label: Option<&str>) -> BlockRef {
        let block = self.blocks.push(BlockData {
            label: label.map(str::to_owned),
            insts: Vec::new(),
        });
        self.layout.push(block);
        block
    }

    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    pub fn block_label(&self, b: BlockRef) -> Option<&str> {
        self.blocks[b].label.as_deref()
    }

    /// Blocks in layout order.
    pub fn layout(&self) -> &[BlockRef] {
        &self.layout
    }

    pub fn entry_block(&self) -> Option<BlockRef> {
        self.layout.first().copied()
    }

    // ========================================================================
    // Use-chain maintenance
    // ========================================================================

    fn register_uses(&mut self, inst: InstRef, operands: &[Operand]) {
        for (idx, operand) in operands.iter().enumerate() {
            if let Some(v) = operand.as_value() {
                self.uses[v].push(Use {
                    user: inst,
                    operand_index: idx as u32,
                });
            }
        }
    }

    fn unregister_uses(&mut self, inst: InstRef) {
        let operands = self.insts[inst].operands.clone();
        for (idx, operand) in operands.iter().enumerate() {
            if let Some(v) = operand.as_value() {
                self.uses[v].retain(|u| !(u.user == inst && u.operand_index == idx as u32));
            }
        }
    }
}

// ============================================================================
// InstBuilder
// ============================================================================

/// Builder for instructions.
///
/// ```
/// use deadwood_ir::{Function, InstBuilder, Opcode};
///
/// let mut func = Function::new("f");
/// let a = func.add_param(Some("a"));
/// let entry = func.create_block(Some("entry"));
/// let add = InstBuilder::new(Opcode::Add)
///     .operand(a)
///     .imm(1)
///     .named_result("x")
///     .append(&mut func, entry);
/// let x = func.inst_result(add).unwrap();
/// InstBuilder::new(Opcode::Ret).operand(x).append(&mut func, entry);
/// ```
pub struct InstBuilder {
    data: InstData,
    result: Option<Option<String>>,
}

impl InstBuilder {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            data: InstData::new(opcode),
            result: None,
        }
    }

    pub fn operand(mut self, operand: impl Into<Operand>) -> Self {
        self.data.operands.push(operand.into());
        self
    }

    pub fn operands<O: Into<Operand>>(mut self, operands: impl IntoIterator<Item = O>) -> Self {
        self.data
            .operands
            .extend(operands.into_iter().map(Into::into));
        self
    }

    pub fn imm(self, value: i64) -> Self {
        self.operand(Operand::Imm(value))
    }

    pub fn successor(mut self, block: BlockRef) -> Self {
        self.data.successors.push(block);
        self
    }

    /// Add a phi incoming pair.
    pub fn incoming(mut self, operand: impl Into<Operand>, block: BlockRef) -> Self {
        self.data.operands.push(operand.into());
        self.data.phi_blocks.push(block);
        self
    }

    pub fn callee(mut self, name: impl Into<String>) -> Self {
        self.data.callee = Some(name.into());
        self
    }

    /// Define an unnamed result value.
    pub fn result(mut self) -> Self {
        self.result = Some(None);
        self
    }

    /// Define a named result value.
    pub fn named_result(mut self, name: impl Into<String>) -> Self {
        self.result = Some(Some(name.into()));
        self
    }

    /// Create the instruction without attaching it.
    pub fn build(self, func: &mut Function) -> InstRef {
        let inst = func.create_inst(self.data);
        if let Some(name) = self.result {
            func.define_result(inst, name.as_deref());
        }
        inst
    }

    /// Create the instruction and append it to `block`.
    pub fn append(self, func: &mut Function, block: BlockRef) -> InstRef {
        let inst = self.build(func);
        func.append_inst(block, inst);
        inst
    }
}
