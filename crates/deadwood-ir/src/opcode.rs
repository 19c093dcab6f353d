//! Instruction opcodes and their static properties.
//!
//! Effect classification lives here so that every consumer (DCE, validation,
//! the printer) agrees on what an opcode may do.

use std::fmt;
use std::ops::RangeInclusive;

/// Integer comparison predicate for `cmp.*` instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpPred {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpPred {
    pub const ALL: [CmpPred; 6] = [
        CmpPred::Eq,
        CmpPred::Ne,
        CmpPred::Lt,
        CmpPred::Le,
        CmpPred::Gt,
        CmpPred::Ge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Lt => "lt",
            CmpPred::Le => "le",
            CmpPred::Gt => "gt",
            CmpPred::Ge => "ge",
        }
    }
}

/// Instruction opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Neg,
    Not,
    Copy,
    Cmp(CmpPred),
    Select,
    Alloca,
    Load,
    Store,
    Call,
    Phi,
    Br,
    CondBr,
    Ret,
    Unreachable,
}

/// Expected operand and successor counts for an opcode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arity {
    pub operands: RangeInclusive<usize>,
    pub successors: usize,
}

impl Opcode {
    /// Every opcode, in printing order. Comparisons are expanded per predicate.
    pub fn all() -> impl Iterator<Item = Opcode> {
        [
            Opcode::Add,
            Opcode::Sub,
            Opcode::Mul,
            Opcode::Div,
            Opcode::Rem,
            Opcode::And,
            Opcode::Or,
            Opcode::Xor,
            Opcode::Shl,
            Opcode::Shr,
            Opcode::Neg,
            Opcode::Not,
            Opcode::Copy,
        ]
        .into_iter()
        .chain(CmpPred::ALL.into_iter().map(Opcode::Cmp))
        .chain([
            Opcode::Select,
            Opcode::Alloca,
            Opcode::Load,
            Opcode::Store,
            Opcode::Call,
            Opcode::Phi,
            Opcode::Br,
            Opcode::CondBr,
            Opcode::Ret,
            Opcode::Unreachable,
        ])
    }

    /// Textual mnemonic.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Rem => "rem",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Neg => "neg",
            Opcode::Not => "not",
            Opcode::Copy => "copy",
            Opcode::Cmp(CmpPred::Eq) => "cmp.eq",
            Opcode::Cmp(CmpPred::Ne) => "cmp.ne",
            Opcode::Cmp(CmpPred::Lt) => "cmp.lt",
            Opcode::Cmp(CmpPred::Le) => "cmp.le",
            Opcode::Cmp(CmpPred::Gt) => "cmp.gt",
            Opcode::Cmp(CmpPred::Ge) => "cmp.ge",
            Opcode::Select => "select",
            Opcode::Alloca => "alloca",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Call => "call",
            Opcode::Phi => "phi",
            Opcode::Br => "br",
            Opcode::CondBr => "condbr",
            Opcode::Ret => "ret",
            Opcode::Unreachable => "unreachable",
        }
    }

    /// Look up an opcode by mnemonic.
    pub fn from_name(name: &str) -> Option<Opcode> {
        Opcode::all().find(|op| op.name() == name)
    }

    /// Control-transfer instruction that must end its block.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Br | Opcode::CondBr | Opcode::Ret | Opcode::Unreachable
        )
    }

    /// Whether executing the instruction may be observable beyond its result.
    ///
    /// Calls count as side-effecting, so this is the only predicate DCE needs.
    pub fn may_have_side_effects(self) -> bool {
        matches!(self, Opcode::Store | Opcode::Call)
    }

    pub fn is_call(self) -> bool {
        self == Opcode::Call
    }

    pub fn is_phi(self) -> bool {
        self == Opcode::Phi
    }

    /// Whether an instruction with this opcode may define a result value.
    ///
    /// For `call` the result is optional.
    pub fn can_produce_result(self) -> bool {
        !matches!(self, Opcode::Store) && !self.is_terminator()
    }

    /// Whether an instruction with this opcode must define a result value.
    pub fn requires_result(self) -> bool {
        self.can_produce_result() && !self.is_call()
    }

    pub fn arity(self) -> Arity {
        let (operands, successors) = match self {
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Rem
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Cmp(_) => (2..=2, 0),
            Opcode::Neg | Opcode::Not | Opcode::Copy | Opcode::Load => (1..=1, 0),
            Opcode::Select => (3..=3, 0),
            Opcode::Alloca => (0..=1, 0),
            Opcode::Store => (2..=2, 0),
            Opcode::Call => (0..=usize::MAX, 0),
            Opcode::Phi => (1..=usize::MAX, 0),
            Opcode::Br => (0..=0, 1),
            Opcode::CondBr => (1..=1, 2),
            Opcode::Ret => (0..=1, 0),
            Opcode::Unreachable => (0..=0, 0),
        };
        Arity {
            operands,
            successors,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
