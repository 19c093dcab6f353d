//! Text format parser.
//!
//! Parses the textual IR produced by [`crate::printer`].
//!
//! # Two-stage parsing
//!
//! 1. **Raw parse**: winnow combinators parse text into `Raw*` structures.
//! 2. **IR build**: `FunctionBuilder` converts `Raw*` into arena refs. Values
//!    and blocks may be referenced before their definition (loop back edges),
//!    so instructions are created first and their operands resolved after.
//!
//! # Grammar
//!
//! ```text
//! module   := function*
//! function := "func" "@" name "(" [%param ("," %param)*] ")" "{" block* "}"
//! block    := "^" name ":" inst*
//! inst     := [%name "="] opcode ["@" callee] [operand ("," operand)*] ["[" ^succ, ... "]"]
//!           | %name "=" "phi" "[" operand "," ^block "]" ("," "[" ... "]")*
//! operand  := %name | integer
//! ```
//!
//! An instruction occupies one line. `;` starts a comment. A function body
//! that does not start with a block label gets an implicit `^entry` block.

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;

use derive_more::{Display, Error};
use winnow::ascii;
use winnow::combinator::{delimited, opt, preceded, separated, terminated};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use crate::function::{Function, InstData, Operand};
use crate::opcode::Opcode;
use crate::refs::{BlockRef, InstRef, ValueRef};

// ============================================================================
// Error type
// ============================================================================

/// Parse error for IR text format.
#[derive(Debug, Clone, Display, Error)]
#[display("parse error at offset {offset}: {message}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

// ============================================================================
// Raw (unresolved) structures
// ============================================================================

/// Offsets are recorded as the remaining input length at the start of the
/// construct and converted to byte offsets once the full input is known.
#[derive(Debug, Clone)]
struct RawFunction<'a> {
    name: &'a str,
    params: Vec<&'a str>,
    blocks: Vec<RawBlock<'a>>,
    at: usize,
}

#[derive(Debug, Clone)]
struct RawBlock<'a> {
    label: &'a str,
    insts: Vec<RawInst<'a>>,
    at: usize,
}

#[derive(Debug, Clone)]
struct RawInst<'a> {
    result: Option<&'a str>,
    opcode: &'a str,
    callee: Option<&'a str>,
    operands: Vec<RawOperand<'a>>,
    incoming: Vec<(RawOperand<'a>, &'a str)>,
    successors: Vec<&'a str>,
    at: usize,
}

#[derive(Debug, Clone, Copy)]
enum RawOperand<'a> {
    Value(&'a str),
    Imm(i64),
}

// ============================================================================
// Winnow parsers
// ============================================================================

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Skip whitespace, newlines and `;` comments.
fn ws(input: &mut &str) -> ModalResult<()> {
    loop {
        take_while(0.., |c: char| c.is_ascii_whitespace())
            .void()
            .parse_next(input)?;
        if input.starts_with(';') {
            take_till(0.., '\n').void().parse_next(input)?;
        } else {
            return Ok(());
        }
    }
}

/// Skip horizontal whitespace only; instructions never span lines.
fn hws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., [' ', '\t']).void().parse_next(input)
}

fn name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., is_name_char).parse_next(input)
}

/// `%name`
fn value_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded('%', name).parse_next(input)
}

/// `^name`
fn block_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded('^', name).parse_next(input)
}

/// `@name`
fn symbol_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded('@', name).parse_next(input)
}

fn opcode_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| is_name_char(c) || c == '.').parse_next(input)
}

fn operand<'a>(input: &mut &'a str) -> ModalResult<RawOperand<'a>> {
    if input.starts_with('%') {
        value_name.map(RawOperand::Value).parse_next(input)
    } else {
        let n: i64 = ascii::dec_int(input)?;
        Ok(RawOperand::Imm(n))
    }
}

fn operand_list<'a>(input: &mut &'a str) -> ModalResult<Vec<RawOperand<'a>>> {
    separated(1.., delimited(hws, operand, hws), ',').parse_next(input)
}

/// `[^a, ^b]`
fn successor_list<'a>(input: &mut &'a str) -> ModalResult<Vec<&'a str>> {
    delimited(
        ('[', hws),
        separated(1.., delimited(hws, block_name, hws), ','),
        (hws, ']'),
    )
    .parse_next(input)
}

/// `[operand, ^block]`
fn phi_pair<'a>(input: &mut &'a str) -> ModalResult<(RawOperand<'a>, &'a str)> {
    (
        ('[', hws),
        operand,
        (hws, ',', hws),
        block_name,
        (hws, ']'),
    )
        .map(|(_, value, _, block, _)| (value, block))
        .parse_next(input)
}

fn raw_inst<'a>(input: &mut &'a str) -> ModalResult<RawInst<'a>> {
    let at = input.len();
    let result = opt(terminated(value_name, (hws, '=', hws))).parse_next(input)?;
    let opcode = opcode_name.parse_next(input)?;
    hws.parse_next(input)?;
    let callee = opt(terminated(symbol_name, hws)).parse_next(input)?;

    let mut operands = Vec::new();
    let mut incoming = Vec::new();
    let mut successors = Vec::new();
    if opcode == Opcode::Phi.name() {
        incoming = separated(1.., delimited(hws, phi_pair, hws), ',').parse_next(input)?;
    } else {
        if input.starts_with('%') || input.starts_with(|c: char| c == '-' || c.is_ascii_digit())
        {
            operands = operand_list.parse_next(input)?;
        }
        hws.parse_next(input)?;
        if input.starts_with('[') {
            successors = successor_list.parse_next(input)?;
        }
    }

    Ok(RawInst {
        result,
        opcode,
        callee,
        operands,
        incoming,
        successors,
        at,
    })
}

/// Instructions until the next block label or the closing brace.
fn raw_insts<'a>(input: &mut &'a str) -> ModalResult<Vec<RawInst<'a>>> {
    let mut insts = Vec::new();
    loop {
        ws.parse_next(input)?;
        if input.starts_with('^') || input.starts_with('}') || input.is_empty() {
            return Ok(insts);
        }
        insts.push(raw_inst.parse_next(input)?);
    }
}

fn raw_block<'a>(input: &mut &'a str) -> ModalResult<RawBlock<'a>> {
    ws.parse_next(input)?;
    let at = input.len();
    let label = terminated(block_name, (hws, ':')).parse_next(input)?;
    let insts = raw_insts.parse_next(input)?;
    Ok(RawBlock { label, insts, at })
}

fn raw_function<'a>(input: &mut &'a str) -> ModalResult<RawFunction<'a>> {
    ws.parse_next(input)?;
    let at = input.len();
    ("func", ws).void().parse_next(input)?;
    let name = symbol_name.parse_next(input)?;
    ws.parse_next(input)?;
    let params: Vec<&str> = delimited(
        ('(', ws),
        separated(0.., delimited(ws, value_name, ws), ','),
        (ws, ')'),
    )
    .parse_next(input)?;
    (ws, '{', ws).void().parse_next(input)?;

    let mut blocks = Vec::new();
    if !input.starts_with('^') && !input.starts_with('}') {
        let block_at = input.len();
        let insts = raw_insts.parse_next(input)?;
        blocks.push(RawBlock {
            label: "entry",
            insts,
            at: block_at,
        });
    }
    loop {
        ws.parse_next(input)?;
        if !input.starts_with('^') {
            break;
        }
        blocks.push(raw_block.parse_next(input)?);
    }
    '}'.parse_next(input)?;

    Ok(RawFunction {
        name,
        params,
        blocks,
        at,
    })
}

// ============================================================================
// FunctionBuilder (Raw -> arena)
// ============================================================================

struct FunctionBuilder<'a> {
    func: Function,
    source_len: usize,
    /// Maps value name (without %) -> ValueRef
    values: HashMap<&'a str, ValueRef>,
    /// Maps block label (without ^) -> BlockRef
    blocks: HashMap<&'a str, BlockRef>,
}

impl<'a> FunctionBuilder<'a> {
    fn new(name: &str, source_len: usize) -> Self {
        Self {
            func: Function::new(name),
            source_len,
            values: HashMap::new(),
            blocks: HashMap::new(),
        }
    }

    fn error(&self, at: usize, message: String) -> ParseError {
        ParseError {
            message,
            offset: self.source_len - at,
        }
    }

    fn declare_value(&mut self, name: &'a str, v: ValueRef, at: usize) -> Result<(), ParseError> {
        match self.values.entry(name) {
            Entry::Occupied(_) => Err(self.error(at, format!("duplicate value name '%{name}'"))),
            Entry::Vacant(slot) => {
                slot.insert(v);
                Ok(())
            }
        }
    }

    fn resolve_block(&self, label: &str, at: usize) -> Result<BlockRef, ParseError> {
        self.blocks
            .get(label)
            .copied()
            .ok_or_else(|| self.error(at, format!("undefined block '^{label}'")))
    }

    fn resolve_operand(&self, raw: RawOperand<'_>, at: usize) -> Result<Operand, ParseError> {
        match raw {
            RawOperand::Imm(n) => Ok(Operand::Imm(n)),
            RawOperand::Value(name) => self
                .values
                .get(name)
                .copied()
                .map(Operand::Value)
                .ok_or_else(|| self.error(at, format!("undefined value '%{name}'"))),
        }
    }

    fn build(mut self, raw: &RawFunction<'a>) -> Result<Function, ParseError> {
        for &param in &raw.params {
            let v = self.func.add_param(Some(param));
            self.declare_value(param, v, raw.at)?;
        }

        // --- Pass 1: create all blocks so successors can refer forward ---
        for block in &raw.blocks {
            if self.blocks.contains_key(block.label) {
                return Err(self.error(
                    block.at,
                    format!("duplicate block label '^{}'", block.label),
                ));
            }
            let b = self.func.create_block(Some(block.label));
            self.blocks.insert(block.label, b);
        }

        // --- Pass 2: create instructions and their results ---
        let mut created: Vec<(InstRef, &RawInst<'a>)> = Vec::new();
        for block in &raw.blocks {
            let b = self.blocks[block.label];
            for inst in &block.insts {
                let opcode = Opcode::from_name(inst.opcode).ok_or_else(|| {
                    self.error(inst.at, format!("unknown opcode '{}'", inst.opcode))
                })?;
                let mut data = InstData::new(opcode);
                data.callee = inst.callee.map(str::to_owned);
                for &succ in &inst.successors {
                    data.successors.push(self.resolve_block(succ, inst.at)?);
                }
                for &(_, pred) in &inst.incoming {
                    data.phi_blocks.push(self.resolve_block(pred, inst.at)?);
                }
                let i = self.func.create_inst(data);
                if let Some(result) = inst.result {
                    let v = self.func.define_result(i, Some(result));
                    self.declare_value(result, v, inst.at)?;
                }
                self.func.append_inst(b, i);
                created.push((i, inst));
            }
        }

        // --- Pass 3: resolve operands now that every value exists ---
        for (i, inst) in created {
            let operands = if inst.incoming.is_empty() {
                inst.operands
                    .iter()
                    .map(|&op| self.resolve_operand(op, inst.at))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                inst.incoming
                    .iter()
                    .map(|&(op, _)| self.resolve_operand(op, inst.at))
                    .collect::<Result<Vec<_>, _>>()?
            };
            self.func.set_operands(i, operands);
        }

        Ok(self.func)
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Parse a module: zero or more functions.
pub fn parse_module(input: &str) -> Result<Vec<Function>, ParseError> {
    let mut remaining = input;
    let mut raws = Vec::new();
    loop {
        ws.parse_next(&mut remaining).map_err(|e| ParseError {
            message: format!("lexer error: {e}"),
            offset: input.len() - remaining.len(),
        })?;
        if remaining.is_empty() {
            break;
        }
        let raw = raw_function
            .parse_next(&mut remaining)
            .map_err(|e| ParseError {
                message: format!("expected function: {e}"),
                offset: input.len() - remaining.len(),
            })?;
        raws.push(raw);
    }

    let mut names = HashSet::new();
    let mut funcs = Vec::with_capacity(raws.len());
    for raw in &raws {
        if !names.insert(raw.name) {
            return Err(ParseError {
                message: format!("duplicate function '@{}'", raw.name),
                offset: input.len() - raw.at,
            });
        }
        funcs.push(FunctionBuilder::new(raw.name, input.len()).build(raw)?);
    }
    Ok(funcs)
}

/// Parse exactly one function.
pub fn parse_function(input: &str) -> Result<Function, ParseError> {
    let mut funcs = parse_module(input)?;
    match funcs.len() {
        1 => Ok(funcs.remove(0)),
        n => Err(ParseError {
            message: format!("expected exactly one function, found {n}"),
            offset: 0,
        }),
    }
}

/// Parse a single function, panicking with context on failure.
pub fn parse_test_function(input: &str) -> Function {
    parse_function(input).unwrap_or_else(|e| {
        panic!(
            "Failed to parse test IR at offset {}:\n  {}\n\nInput:\n{}",
            e.offset, e.message, input
        );
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_module;
    use proptest::prelude::*;

    #[test]
    fn parses_forward_references() {
        let func = parse_test_function(
            r#"
func @loop(%n) {
  ^entry:
    br [^head]
  ^head:
    %i = phi [0, ^entry], [%next, ^head]   ; %next is defined below
    %next = add %i, 1
    %done = cmp.eq %next, %n
    condbr %done [^exit, ^head]
  ^exit:
    ret
}
"#,
        );

        let head = func.layout()[1];
        let phi = func.first_inst(head).unwrap();
        let next = func.next_inst(phi).unwrap();
        let next_value = func.inst_result(next).unwrap();

        assert_eq!(func.inst(phi).operands[1], Operand::Value(next_value));
        assert_eq!(func.inst(phi).phi_blocks.as_slice(), &[func.layout()[0], head]);
        assert_eq!(func.uses(next_value).len(), 2);
    }

    #[test]
    fn implicit_entry_block() {
        let func = parse_test_function("func @f(%a) { %b = neg %a\n ret %b }");
        assert_eq!(func.layout().len(), 1);
        assert_eq!(func.block_label(func.layout()[0]), Some("entry"));
        assert_eq!(func.num_insts(), 2);
    }

    #[test]
    fn call_with_callee_and_negative_immediate() {
        let func = parse_test_function("func @f() {\n  %r = call @g -3, 4\n  ret\n}");
        let call = func.insts().next().unwrap();
        let data = func.inst(call);
        assert_eq!(data.opcode, Opcode::Call);
        assert_eq!(data.callee.as_deref(), Some("g"));
        assert_eq!(data.operands.as_slice(), &[Operand::Imm(-3), Operand::Imm(4)]);
    }

    #[test]
    fn operands_do_not_spill_onto_next_line() {
        let func = parse_test_function("func @f(%a) {\n  ^entry:\n    ret\n  ^dead:\n    %x = copy %a\n    ret %x\n}");
        let entry = func.entry_block().unwrap();
        let ret = func.first_inst(entry).unwrap();
        assert!(func.operands(ret).is_empty());
    }

    #[test]
    fn reports_undefined_value() {
        let err = parse_function("func @f() {\n  ret %nope\n}").unwrap_err();
        assert!(err.message.contains("undefined value '%nope'"), "{err}");
        assert_eq!(err.offset, 14);
    }

    #[test]
    fn reports_unknown_opcode() {
        let err = parse_function("func @f() {\n  %x = frob 1\n  ret\n}").unwrap_err();
        assert!(err.message.contains("unknown opcode 'frob'"), "{err}");
    }

    #[test]
    fn reports_duplicates() {
        let err = parse_function("func @f(%a) {\n  %a = copy 1\n  ret\n}").unwrap_err();
        assert!(err.message.contains("duplicate value name '%a'"), "{err}");

        let err = parse_function("func @f() {\n ^b:\n  ret\n ^b:\n  ret\n}").unwrap_err();
        assert!(err.message.contains("duplicate block label '^b'"), "{err}");

        let err = parse_module("func @f() { ret }\nfunc @f() { ret }").unwrap_err();
        assert!(err.message.contains("duplicate function '@f'"), "{err}");
    }

    #[test]
    fn parse_function_requires_exactly_one() {
        assert!(parse_function("").is_err());
        assert!(parse_function("func @a() { ret }\nfunc @b() { ret }").is_err());
        assert!(parse_module("  ; just a comment\n").unwrap().is_empty());
    }

    fn seed_corpus() -> Vec<&'static str> {
        vec![
            "func @f(%a, %b) {\n  ^entry:\n    %x = add %a, %b\n    ret %x\n}\n",
            concat!(
                "func @g(%c) {\n",
                "  ^entry:\n",
                "    condbr %c [^l, ^r]\n",
                "  ^l:\n",
                "    br [^j]\n",
                "  ^r:\n",
                "    br [^j]\n",
                "  ^j:\n",
                "    %p = phi [1, ^l], [2, ^r]\n",
                "    store %p, %c\n",
                "    ret %p\n",
                "}\n",
            ),
        ]
    }

    #[test]
    fn seed_corpus_round_trips() {
        for seed in seed_corpus() {
            let funcs = parse_module(seed).unwrap();
            let printed = print_module(&funcs);
            assert_eq!(printed, seed);
            let reparsed = parse_module(&printed).unwrap();
            assert_eq!(print_module(&reparsed), printed);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Completely random strings must not panic the parser.
        #[test]
        fn parser_handles_random_strings(input in "\\PC{0,200}") {
            let _ = parse_module(&input);
        }

        /// Truncated seeds must not panic the parser.
        #[test]
        fn parser_handles_truncated_input(seed_idx in 0..2usize, cut in 0..200usize) {
            let seed = seed_corpus()[seed_idx];
            let cut = cut.min(seed.len());
            let _ = parse_module(&seed[..cut]);
        }
    }
}
