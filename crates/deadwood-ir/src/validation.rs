//! Structural validation of a [`Function`].
//!
//! The analysis passes assume a well-formed graph and never check it
//! themselves. This module checks those preconditions up front and reports
//! every violation it finds, rather than stopping at the first one.

use std::fmt;

use derive_more::{Display, Error};

use crate::function::Function;
use crate::graph::ControlFlowGraph;
use crate::printer::{block_label, print_inst, value_label};
use crate::refs::{InstRef, ValueDef};

// ============================================================================
// Error types
// ============================================================================

/// A single violated precondition. Instructions, blocks and values are
/// rendered in IR text form so the error outlives the function.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ValidationError {
    #[display("@{function}: function has no blocks")]
    EmptyFunction { function: String },

    #[display("@{function}: block {block} does not end with a terminator")]
    MissingTerminator { function: String, block: String },

    #[display("@{function}: terminator `{inst}` is not the last instruction of {block}")]
    MisplacedTerminator {
        function: String,
        block: String,
        inst: String,
    },

    #[display("@{function}: phi `{inst}` follows a non-phi instruction in {block}")]
    MisplacedPhi {
        function: String,
        block: String,
        inst: String,
    },

    #[display(
        "@{function}: phi `{inst}` names {incoming}, which is not a predecessor of {block}"
    )]
    PhiIncomingNotPredecessor {
        function: String,
        block: String,
        inst: String,
        incoming: String,
    },

    #[display(
        "@{function}: operand #{operand_index} of `{inst}` references {value}, whose definition is no longer attached"
    )]
    DanglingOperand {
        function: String,
        inst: String,
        operand_index: usize,
        value: String,
    },

    #[display("@{function}: `{inst}` {detail}")]
    ArityMismatch {
        function: String,
        inst: String,
        detail: String,
    },

    #[display("@{function}: `{inst}` {detail}")]
    ResultMismatch {
        function: String,
        inst: String,
        detail: String,
    },

    #[display("@{function}: `{inst}` has no callee")]
    MissingCallee { function: String, inst: String },
}

/// Result of validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` if no violations were found, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationResult> {
        if self.is_ok() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "validation passed");
        }
        writeln!(f, "{} validation error(s) found:", self.errors.len())?;
        for err in &self.errors {
            writeln!(f, "  - {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationResult {}

// ============================================================================
// Validation
// ============================================================================

/// Check the structural preconditions of the analysis passes.
pub fn validate_function(func: &Function) -> ValidationResult {
    let mut result = ValidationResult::default();
    let function = func.name().to_owned();

    if func.layout().is_empty() {
        result.errors.push(ValidationError::EmptyFunction { function });
        return result;
    }

    let cfg = ControlFlowGraph::compute(func);
    let reachable = cfg.reachable_from_entry(func);

    for &block in func.layout() {
        let insts = func.block_insts(block);
        let mut seen_non_phi = false;

        for (pos, &inst) in insts.iter().enumerate() {
            let data = func.inst(inst);
            let opcode = data.opcode;
            let is_last = pos + 1 == insts.len();

            if opcode.is_terminator() && !is_last {
                result.errors.push(ValidationError::MisplacedTerminator {
                    function: function.clone(),
                    block: block_label(func, block),
                    inst: print_inst(func, inst),
                });
            }

            if opcode.is_phi() {
                if seen_non_phi {
                    result.errors.push(ValidationError::MisplacedPhi {
                        function: function.clone(),
                        block: block_label(func, block),
                        inst: print_inst(func, inst),
                    });
                }
                for &incoming in &data.phi_blocks {
                    if !cfg.preds(block).contains(&incoming) {
                        result.errors.push(ValidationError::PhiIncomingNotPredecessor {
                            function: function.clone(),
                            block: block_label(func, block),
                            inst: print_inst(func, inst),
                            incoming: block_label(func, incoming),
                        });
                    }
                }
            } else {
                seen_non_phi = true;
            }

            check_shape(func, inst, &function, &mut result);

            for (operand_index, op) in data.operands.iter().enumerate() {
                let Some(v) = op.as_value() else { continue };
                let dangling = match func.value_def(v) {
                    ValueDef::InstResult(def) => !func.is_attached(def),
                    ValueDef::Param(_) => false,
                };
                if dangling {
                    result.errors.push(ValidationError::DanglingOperand {
                        function: function.clone(),
                        inst: print_inst(func, inst),
                        operand_index,
                        value: value_label(func, v),
                    });
                }
            }
        }

        let terminated = func
            .last_inst(block)
            .is_some_and(|last| func.is_terminator(last));
        if !terminated && reachable.contains(&block) {
            result.errors.push(ValidationError::MissingTerminator {
                function: function.clone(),
                block: block_label(func, block),
            });
        }
    }

    result
}

/// Operand, successor, result and callee counts against the opcode.
fn check_shape(
    func: &Function,
    inst: InstRef,
    function: &str,
    result: &mut ValidationResult,
) {
    let data = func.inst(inst);
    let opcode = data.opcode;
    let arity = opcode.arity();

    let mut arity_error = |detail: String| {
        result.errors.push(ValidationError::ArityMismatch {
            function: function.to_owned(),
            inst: print_inst(func, inst),
            detail,
        });
    };

    if !arity.operands.contains(&data.operands.len()) {
        arity_error(format!(
            "has {} operand(s), {opcode} expects {}",
            data.operands.len(),
            describe_range(arity.operands.start(), arity.operands.end()),
        ));
    }
    if data.successors.len() != arity.successors {
        arity_error(format!(
            "has {} successor(s), {opcode} expects {}",
            data.successors.len(),
            arity.successors,
        ));
    }
    if opcode.is_phi() && data.phi_blocks.len() != data.operands.len() {
        arity_error(format!(
            "pairs {} incoming block(s) with {} value(s)",
            data.phi_blocks.len(),
            data.operands.len(),
        ));
    }

    let has_result = func.inst_result(inst).is_some();
    if opcode.requires_result() && !has_result {
        result.errors.push(ValidationError::ResultMismatch {
            function: function.to_owned(),
            inst: print_inst(func, inst),
            detail: format!("{opcode} must define a result"),
        });
    } else if !opcode.can_produce_result() && has_result {
        result.errors.push(ValidationError::ResultMismatch {
            function: function.to_owned(),
            inst: print_inst(func, inst),
            detail: format!("{opcode} cannot define a result"),
        });
    }

    if opcode.is_call() && data.callee.is_none() {
        result.errors.push(ValidationError::MissingCallee {
            function: function.to_owned(),
            inst: print_inst(func, inst),
        });
    }
}

fn describe_range(start: &usize, end: &usize) -> String {
    match (*start, *end) {
        (lo, hi) if lo == hi => lo.to_string(),
        (lo, usize::MAX) => format!("at least {lo}"),
        (lo, hi) => format!("{lo} to {hi}"),
    }
}
