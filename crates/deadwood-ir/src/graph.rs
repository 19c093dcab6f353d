//! Read-only graph view of a [`Function`].
//!
//! Accessors for instruction order, control-flow edges, operands and effect
//! flags. Nothing here mutates the function.

use std::collections::HashSet;

use cranelift_entity::SecondaryMap;
use smallvec::SmallVec;

use crate::function::{Function, Operand};
use crate::refs::{BlockRef, InstRef, ValueRef};

impl Function {
    /// All attached instructions, blocks in layout order, instructions in
    /// block order.
    pub fn insts(&self) -> impl Iterator<Item = InstRef> + '_ {
        self.layout()
            .iter()
            .flat_map(|&b| self.block(b).insts.iter().copied())
    }

    /// Number of attached instructions.
    pub fn num_insts(&self) -> usize {
        self.layout()
            .iter()
            .map(|&b| self.block(b).insts.len())
            .sum()
    }

    pub fn block_insts(&self, block: BlockRef) -> &[InstRef] {
        &self.block(block).insts
    }

    pub fn first_inst(&self, block: BlockRef) -> Option<InstRef> {
        self.block(block).insts.first().copied()
    }

    pub fn last_inst(&self, block: BlockRef) -> Option<InstRef> {
        self.block(block).insts.last().copied()
    }

    /// The block holding `inst`, or `None` once detached.
    pub fn inst_block(&self, inst: InstRef) -> Option<BlockRef> {
        self.inst(inst).parent_block
    }

    /// The lexically next instruction in the same block.
    pub fn next_inst(&self, inst: InstRef) -> Option<InstRef> {
        let insts = self.block_insts(self.inst_block(inst)?);
        let pos = insts.iter().position(|&i| i == inst)?;
        insts.get(pos + 1).copied()
    }

    /// Branch targets of a terminator; empty for other instructions.
    pub fn successor_blocks(&self, inst: InstRef) -> &[BlockRef] {
        &self.inst(inst).successors
    }

    pub fn operands(&self, inst: InstRef) -> &[Operand] {
        &self.inst(inst).operands
    }

    /// Operands that reference values, skipping immediates.
    pub fn value_operands(&self, inst: InstRef) -> impl Iterator<Item = ValueRef> + '_ {
        self.operands(inst).iter().filter_map(|op| op.as_value())
    }

    /// `(incoming block, incoming operand)` pairs of a phi.
    pub fn phi_incoming(&self, inst: InstRef) -> impl Iterator<Item = (BlockRef, Operand)> + '_ {
        let data = self.inst(inst);
        data.phi_blocks
            .iter()
            .copied()
            .zip(data.operands.iter().copied())
    }

    pub fn is_terminator(&self, inst: InstRef) -> bool {
        self.inst(inst).opcode.is_terminator()
    }

    pub fn may_have_side_effects(&self, inst: InstRef) -> bool {
        self.inst(inst).opcode.may_have_side_effects()
    }

    pub fn is_call(&self, inst: InstRef) -> bool {
        self.inst(inst).opcode.is_call()
    }

    pub fn is_phi(&self, inst: InstRef) -> bool {
        self.inst(inst).opcode.is_phi()
    }

    /// Successor blocks of `block`, read from its terminator.
    pub fn block_successors(&self, block: BlockRef) -> &[BlockRef] {
        match self.last_inst(block) {
            Some(last) if self.is_terminator(last) => self.successor_blocks(last),
            _ => &[],
        }
    }
}

/// Predecessor/successor edges of a function, computed once.
pub struct ControlFlowGraph {
    preds: SecondaryMap<BlockRef, SmallVec<[BlockRef; 4]>>,
    succs: SecondaryMap<BlockRef, SmallVec<[BlockRef; 2]>>,
}

impl ControlFlowGraph {
    pub fn compute(func: &Function) -> Self {
        let mut preds: SecondaryMap<BlockRef, SmallVec<[BlockRef; 4]>> = SecondaryMap::new();
        let mut succs: SecondaryMap<BlockRef, SmallVec<[BlockRef; 2]>> = SecondaryMap::new();
        for &block in func.layout() {
            for &succ in func.block_successors(block) {
                if !succs[block].contains(&succ) {
                    succs[block].push(succ);
                }
                if !preds[succ].contains(&block) {
                    preds[succ].push(block);
                }
            }
        }
        Self { preds, succs }
    }

    pub fn preds(&self, block: BlockRef) -> &[BlockRef] {
        &self.preds[block]
    }

    pub fn succs(&self, block: BlockRef) -> &[BlockRef] {
        &self.succs[block]
    }

    /// Blocks reachable from the entry block, in depth-first preorder.
    pub fn reachable_from_entry(&self, func: &Function) -> Vec<BlockRef> {
        let Some(entry) = func.entry_block() else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![entry];
        while let Some(block) = stack.pop() {
            if !seen.insert(block) {
                continue;
            }
            order.push(block);
            for &succ in self.succs(block).iter().rev() {
                if !seen.contains(&succ) {
                    stack.push(succ);
                }
            }
        }
        order
    }
}
