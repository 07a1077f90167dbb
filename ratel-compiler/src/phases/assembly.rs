//! Assembly generation
//!
//! Flattens IR into a list of [`AsmItem`]s with symbolic jump labels. Control
//! flow (`seq`, `if`, `repeat`) is lowered here; every other operation maps to
//! one opcode with its arguments pushed in reverse order.

use crate::error::{CompileResult, CompilerError, CompilerWarning};
use crate::phases::bytecode::{self, check_available};
use crate::phases::codegen::HASH_SCRATCH;
use crate::phases::context::hex;
use crate::phases::ir::{IrNode, IrValue};
use crate::settings::CompilerSettings;
use lazy_static::lazy_static;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use ratel_parser::Span;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum AsmItem {
    Op(String),
    Push(Vec<u8>),
    PushLabel(String),
    /// Byte length of the subprogram defined under the label
    PushSubSize(String),
    /// Byte length of the code being assembled, subprograms included
    PushCodeSize,
    /// Jump destination
    Label(String),
    /// Subprogram laid out independently and placed at its label
    Sub(String, Vec<AsmItem>),
    /// Source position of the instructions that follow
    Mark(Span),
}

lazy_static! {
    static ref WORD_LIMIT: BigInt = BigInt::one() << 256usize;
    static ref SIGNED_MIN: BigInt = -(BigInt::one() << 255usize);
}

/// Operations the assembler lowers itself instead of mapping to one opcode
const CONTROL_OPS: &[&str] = &[
    "seq", "pass", "if", "assert", "repeat", "break", "continue", "deploy", "codelen", "sha3_64",
    "debugger",
];

/// Whether evaluating `node` leaves a word on the stack
pub fn produces_value(node: &IrNode) -> bool {
    match &node.value {
        IrValue::Int(_) => true,
        IrValue::Op(name) => match name.as_str() {
            "seq" => node.args.last().is_some_and(produces_value),
            "if" => node.args.len() == 3 && node.args[1..].iter().all(produces_value),
            "codelen" | "sha3_64" => true,
            op if CONTROL_OPS.contains(&op) => false,
            op => bytecode::opcode(op).is_some_and(|info| info.outputs > 0),
        },
    }
}

/// Two's complement big-endian bytes of a literal, shortest form
pub fn literal_bytes(value: &BigInt) -> CompileResult<Vec<u8>> {
    if *value >= *WORD_LIMIT || *value < *SIGNED_MIN {
        return Err(CompilerError::LiteralOutOfRange {
            value: value.to_string(),
            span: None,
        });
    }
    let unsigned = if value.is_negative() {
        &*WORD_LIMIT + value
    } else {
        value.clone()
    };
    if unsigned.is_zero() {
        return Ok(vec![0]);
    }
    let (_, bytes) = unsigned.to_bytes_be();
    Ok(bytes)
}

struct LoopLabels {
    resume: String,
    exit: String,
}

struct Assembler<'s> {
    settings: &'s CompilerSettings,
    next_label: usize,
    loops: Vec<LoopLabels>,
    subs: Vec<AsmItem>,
}

/// Assemble an IR tree; subprograms from `deploy` are appended at the end
pub fn assemble(ir: &IrNode, settings: &CompilerSettings) -> CompileResult<Vec<AsmItem>> {
    let mut assembler = Assembler {
        settings,
        next_label: 0,
        loops: Vec::new(),
        subs: Vec::new(),
    };
    let mut items = Vec::new();
    if assembler.node(ir, &mut items)? {
        items.push(AsmItem::Op("POP".to_string()));
    }
    items.append(&mut assembler.subs);

    let occurrences = debug_occurrences(&items);
    if occurrences > 0 {
        tracing::warn!(occurrences, "assembly contains DEBUG opcodes");
    }
    Ok(items)
}

/// Number of `DEBUG` instructions, subprograms included
pub fn debug_occurrences(items: &[AsmItem]) -> usize {
    items
        .iter()
        .map(|item| match item {
            AsmItem::Op(op) if op == "DEBUG" => 1,
            AsmItem::Sub(_, sub) => debug_occurrences(sub),
            _ => 0,
        })
        .sum()
}

pub fn debug_warnings(items: &[AsmItem]) -> Vec<CompilerWarning> {
    match debug_occurrences(items) {
        0 => Vec::new(),
        occurrences => vec![CompilerWarning::DebugOpcode { occurrences }],
    }
}

fn op(mnemonic: &str) -> AsmItem {
    AsmItem::Op(mnemonic.to_string())
}

fn push(value: u64) -> AsmItem {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    AsmItem::Push(bytes[first..].to_vec())
}

impl Assembler<'_> {
    fn label(&mut self, kind: &str) -> String {
        let label = format!("{}{}", kind, self.next_label);
        self.next_label += 1;
        label
    }

    /// Emit `node` and report whether it left a value on the stack
    fn node(&mut self, node: &IrNode, out: &mut Vec<AsmItem>) -> CompileResult<bool> {
        if let Some(span) = node.pos {
            out.push(AsmItem::Mark(span));
        }
        let name = match &node.value {
            IrValue::Int(value) => {
                out.push(AsmItem::Push(literal_bytes(value)?));
                return Ok(true);
            }
            IrValue::Op(name) => name.as_str(),
        };

        match (name, node.args.as_slice()) {
            ("seq", children) => {
                let mut valued = false;
                for (i, child) in children.iter().enumerate() {
                    valued = self.node(child, out)?;
                    if valued && i + 1 < children.len() {
                        out.push(op("POP"));
                    }
                }
                Ok(valued)
            }
            ("pass", []) => Ok(false),
            ("if", [test, then]) => {
                let end = self.label("if_end");
                self.value(test, out)?;
                out.push(op("ISZERO"));
                out.push(AsmItem::PushLabel(end.clone()));
                out.push(op("JUMPI"));
                self.statement(then, out)?;
                out.push(AsmItem::Label(end));
                Ok(false)
            }
            ("if", [test, then, orelse]) => {
                let otherwise = self.label("if_else");
                let end = self.label("if_end");
                let valued = produces_value(then) && produces_value(orelse);
                self.value(test, out)?;
                out.push(op("ISZERO"));
                out.push(AsmItem::PushLabel(otherwise.clone()));
                out.push(op("JUMPI"));
                self.branch(then, valued, out)?;
                out.push(AsmItem::PushLabel(end.clone()));
                out.push(op("JUMP"));
                out.push(AsmItem::Label(otherwise));
                self.branch(orelse, valued, out)?;
                out.push(AsmItem::Label(end));
                Ok(valued)
            }
            ("assert", [test]) => {
                let ok = self.label("assert_ok");
                self.value(test, out)?;
                out.push(AsmItem::PushLabel(ok.clone()));
                out.push(op("JUMPI"));
                out.extend([push(0), push(0), op("REVERT")]);
                out.push(AsmItem::Label(ok));
                Ok(false)
            }
            ("repeat", [index, start, rounds, body]) => {
                self.repeat(index, start, rounds, body, out)?;
                Ok(false)
            }
            ("break", []) | ("continue", []) => {
                let Some(labels) = self.loops.last() else {
                    return Err(CompilerError::panic(format!("`{}` outside of a loop", name)));
                };
                let target = if name == "break" {
                    labels.exit.clone()
                } else {
                    labels.resume.clone()
                };
                out.push(AsmItem::PushLabel(target));
                out.push(op("JUMP"));
                Ok(false)
            }
            ("deploy", [runtime]) => {
                let label = self.label("runtime");
                let mut nested = Assembler {
                    settings: self.settings,
                    next_label: 0,
                    loops: Vec::new(),
                    subs: Vec::new(),
                };
                let mut items = Vec::new();
                if nested.node(runtime, &mut items)? {
                    items.push(op("POP"));
                }
                items.append(&mut nested.subs);

                out.extend([
                    AsmItem::PushSubSize(label.clone()),
                    op("DUP1"),
                    AsmItem::PushLabel(label.clone()),
                    push(0),
                    op("CODECOPY"),
                    push(0),
                    op("RETURN"),
                ]);
                self.subs.push(AsmItem::Sub(label, items));
                Ok(false)
            }
            ("codelen", []) => {
                out.push(AsmItem::PushCodeSize);
                Ok(true)
            }
            ("sha3_64", [key, slot]) => {
                self.value(slot, out)?;
                self.value(key, out)?;
                out.extend([
                    push(HASH_SCRATCH),
                    op("MSTORE"),
                    push(HASH_SCRATCH + 32),
                    op("MSTORE"),
                    push(64),
                    push(HASH_SCRATCH),
                    op("SHA3"),
                ]);
                Ok(true)
            }
            ("debugger", []) => {
                out.push(op("DEBUG"));
                Ok(false)
            }
            (control, _) if CONTROL_OPS.contains(&control) => Err(CompilerError::panic(format!(
                "`{}` takes a different number of arguments than {}",
                control,
                node.args.len()
            ))),
            (name, args) => self.opcode(name, args, out),
        }
    }

    fn opcode(&mut self, name: &str, args: &[IrNode], out: &mut Vec<AsmItem>) -> CompileResult<bool> {
        let Some(info) = bytecode::opcode(name) else {
            return Err(CompilerError::panic(format!("unknown IR operation `{}`", name)));
        };
        let reserved = ["JUMP", "JUMPI", "JUMPDEST", "PC", "DEBUG"];
        if reserved.contains(&info.mnemonic.as_str())
            || ["PUSH", "DUP", "SWAP"]
                .iter()
                .any(|prefix| info.mnemonic.starts_with(prefix))
        {
            return Err(CompilerError::panic(format!(
                "`{}` cannot be used directly in IR",
                name
            )));
        }
        if args.len() != usize::from(info.inputs) {
            return Err(CompilerError::panic(format!(
                "`{}` takes {} arguments, {} given",
                name,
                info.inputs,
                args.len()
            )));
        }
        check_available(info, self.settings.evm_version)?;

        for arg in args.iter().rev() {
            self.value(arg, out)?;
        }
        out.push(AsmItem::Op(info.mnemonic.clone()));
        Ok(info.outputs > 0)
    }

    fn value(&mut self, node: &IrNode, out: &mut Vec<AsmItem>) -> CompileResult<()> {
        if !self.node(node, out)? {
            return Err(CompilerError::panic(format!(
                "`{}` is used as a value but produces none",
                node
            )));
        }
        Ok(())
    }

    fn statement(&mut self, node: &IrNode, out: &mut Vec<AsmItem>) -> CompileResult<()> {
        if self.node(node, out)? {
            out.push(op("POP"));
        }
        Ok(())
    }

    fn branch(&mut self, node: &IrNode, valued: bool, out: &mut Vec<AsmItem>) -> CompileResult<()> {
        if valued {
            self.value(node, out)
        } else {
            self.statement(node, out)
        }
    }

    /// `repeat` keeps its remaining round count on the stack; the loop
    /// variable lives in memory at `index`
    fn repeat(
        &mut self,
        index: &IrNode,
        start: &IrNode,
        rounds: &IrNode,
        body: &IrNode,
        out: &mut Vec<AsmItem>,
    ) -> CompileResult<()> {
        let top = self.label("loop");
        let resume = self.label("loop_continue");
        let exit = self.label("loop_exit");

        self.value(start, out)?;
        self.value(index, out)?;
        out.push(op("MSTORE"));
        self.value(rounds, out)?;
        out.push(AsmItem::Label(top.clone()));

        self.loops.push(LoopLabels {
            resume: resume.clone(),
            exit: exit.clone(),
        });
        let result = self.statement(body, out);
        self.loops.pop();
        result?;

        out.push(AsmItem::Label(resume));
        out.push(push(1));
        self.value(index, out)?;
        out.push(op("MLOAD"));
        out.push(op("ADD"));
        self.value(index, out)?;
        out.push(op("MSTORE"));
        out.extend([
            push(1),
            op("SWAP1"),
            op("SUB"),
            op("DUP1"),
            AsmItem::PushLabel(top),
            op("JUMPI"),
        ]);
        out.push(AsmItem::Label(exit));
        out.push(op("POP"));
        Ok(())
    }
}

impl Display for AsmItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AsmItem::Op(mnemonic) => f.write_str(mnemonic),
            AsmItem::Push(bytes) => write!(f, "PUSH{} 0x{}", bytes.len(), hex(bytes)),
            AsmItem::PushLabel(label) => write!(f, "_sym_{}", label),
            AsmItem::PushSubSize(label) => write!(f, "_sym_{}_size", label),
            AsmItem::PushCodeSize => f.write_str("_codesize"),
            AsmItem::Label(label) => write!(f, "_sym_{} JUMPDEST", label),
            AsmItem::Sub(label, items) => write!(f, "_sym_{} {{ {} }}", label, AsmListing(items)),
            AsmItem::Mark(_) => Ok(()),
        }
    }
}

/// Space separated listing of assembly items
pub struct AsmListing<'a>(pub &'a [AsmItem]);

impl Display for AsmListing<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for item in self.0 {
            if matches!(item, AsmItem::Mark(_)) {
                continue;
            }
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}
