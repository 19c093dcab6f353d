//! Text format printer.
//!
//! Prints functions in the format accepted by [`crate::parser`]:
//!
//! ```text
//! func @main(%a) {
//!   ^entry:
//!     %x = add %a, 1
//!     ret %x
//! }
//! ```
//!
//! Named values and blocks keep their names; unnamed ones print as their
//! arena ref (`%v3`, `^block1`).

use std::fmt::{self, Write};

use crate::function::{Function, Operand};
use crate::opcode::Opcode;
use crate::refs::{BlockRef, InstRef, ValueRef};

// ============================================================================
// Public API
// ============================================================================

/// Print a function as IR text.
pub fn print_function(func: &Function) -> String {
    let mut out = String::new();
    write_function(&mut out, func).expect("fmt::Write to String never fails");
    out
}

/// Print several functions, separated by blank lines.
pub fn print_module(funcs: &[Function]) -> String {
    let mut out = String::new();
    for (i, func) in funcs.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_function(&mut out, func).expect("fmt::Write to String never fails");
    }
    out
}

/// Print a single instruction without indentation or trailing newline.
pub fn print_inst(func: &Function, inst: InstRef) -> String {
    let mut out = String::new();
    write_inst(&mut out, func, inst).expect("fmt::Write to String never fails");
    out
}

/// Operand-style label of a value: `%name` or `%v<N>`.
pub fn value_label(func: &Function, v: ValueRef) -> String {
    match func.value_name(v) {
        Some(name) => format!("%{name}"),
        None => format!("%{v}"),
    }
}

/// Label of a block: `^name` or `^block<N>`.
pub fn block_label(func: &Function, b: BlockRef) -> String {
    match func.block_label(b) {
        Some(label) => format!("^{label}"),
        None => format!("^{b}"),
    }
}

// ============================================================================
// Writers
// ============================================================================

fn write_function(f: &mut impl Write, func: &Function) -> fmt::Result {
    write!(f, "func @{}(", func.name())?;
    for (i, &param) in func.params().iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(&value_label(func, param))?;
    }
    f.write_str(") {\n")?;
    for &block in func.layout() {
        writeln!(f, "  {}:", block_label(func, block))?;
        for &inst in func.block_insts(block) {
            f.write_str("    ")?;
            write_inst(f, func, inst)?;
            f.write_char('\n')?;
        }
    }
    f.write_str("}\n")
}

fn write_operand(f: &mut impl Write, func: &Function, operand: Operand) -> fmt::Result {
    match operand {
        Operand::Value(v) => f.write_str(&value_label(func, v)),
        Operand::Imm(n) => write!(f, "{n}"),
    }
}

fn write_inst(f: &mut impl Write, func: &Function, inst: InstRef) -> fmt::Result {
    let data = func.inst(inst);
    if let Some(result) = func.inst_result(inst) {
        write!(f, "{} = ", value_label(func, result))?;
    }
    f.write_str(data.opcode.name())?;

    if let Some(callee) = &data.callee {
        write!(f, " @{callee}")?;
    }

    if data.opcode == Opcode::Phi {
        for (i, (block, operand)) in func.phi_incoming(inst).enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            f.write_char('[')?;
            write_operand(f, func, operand)?;
            write!(f, ", {}]", block_label(func, block))?;
        }
        return Ok(());
    }

    for (i, &operand) in data.operands.iter().enumerate() {
        f.write_str(if i == 0 { " " } else { ", " })?;
        write_operand(f, func, operand)?;
    }

    if !data.successors.is_empty() {
        f.write_str(" [")?;
        for (i, &succ) in data.successors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&block_label(func, succ))?;
        }
        f.write_char(']')?;
    }
    Ok(())
}
