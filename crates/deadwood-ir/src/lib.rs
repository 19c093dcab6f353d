//! Deadwood IR crate.
//!
//! Arena-based mutable storage for a single function's control-flow graph:
//! basic blocks of instructions over SSA values, with use-chains, a read-only
//! graph view, and a textual format (parser and printer).

// === Arena storage ===
pub mod function;
pub mod opcode;
pub mod refs;

// === Graph view ===
pub mod graph;

// === Text format ===
pub mod parser;
pub mod printer;

// === Host checks ===
pub mod validation;

// Re-export smallvec for downstream crates matching our operand lists
pub use smallvec;

pub use function::{BlockData, Function, InstBuilder, InstData, Operand, Use, ValueData};
pub use graph::ControlFlowGraph;
pub use opcode::{Arity, CmpPred, Opcode};
pub use parser::{ParseError, parse_function, parse_module};
pub use printer::{print_function, print_inst, print_module};
pub use refs::{BlockRef, InstRef, ValueDef, ValueRef};
pub use validation::{ValidationError, ValidationResult, validate_function};
