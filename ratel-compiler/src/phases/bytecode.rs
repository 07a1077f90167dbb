//! Bytecode emission
//!
//! Resolves labels over an assembly listing in two passes and writes the
//! final bytes. Nested subprograms are laid out on their own so their jump
//! destinations are relative to the start of the subprogram.

use crate::error::{CompileResult, CompilerError};
use crate::phases::assembly::AsmItem;
use crate::phases::context::hex;
use crate::settings::EvmVersion;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub mnemonic: String,
    pub byte: u8,
    pub inputs: u8,
    pub outputs: u8,
    /// First EVM version that provides the opcode
    pub since: EvmVersion,
}

/// Width of every label reference
const LABEL_WIDTH: usize = 2;

lazy_static! {
    static ref OPCODES: IndexMap<String, OpcodeInfo> = opcode_table();
    static ref BY_BYTE: HashMap<u8, &'static OpcodeInfo> =
        OPCODES.values().map(|info| (info.byte, info)).collect();
}

fn opcode_table() -> IndexMap<String, OpcodeInfo> {
    use EvmVersion::{Byzantium as B, Constantinople as C, Istanbul as I};

    const FIXED: &[(&str, u8, u8, u8, EvmVersion)] = &[
        ("STOP", 0x00, 0, 0, B),
        ("ADD", 0x01, 2, 1, B),
        ("MUL", 0x02, 2, 1, B),
        ("SUB", 0x03, 2, 1, B),
        ("DIV", 0x04, 2, 1, B),
        ("SDIV", 0x05, 2, 1, B),
        ("MOD", 0x06, 2, 1, B),
        ("SMOD", 0x07, 2, 1, B),
        ("ADDMOD", 0x08, 3, 1, B),
        ("MULMOD", 0x09, 3, 1, B),
        ("EXP", 0x0a, 2, 1, B),
        ("SIGNEXTEND", 0x0b, 2, 1, B),
        ("LT", 0x10, 2, 1, B),
        ("GT", 0x11, 2, 1, B),
        ("SLT", 0x12, 2, 1, B),
        ("SGT", 0x13, 2, 1, B),
        ("EQ", 0x14, 2, 1, B),
        ("ISZERO", 0x15, 1, 1, B),
        ("AND", 0x16, 2, 1, B),
        ("OR", 0x17, 2, 1, B),
        ("XOR", 0x18, 2, 1, B),
        ("NOT", 0x19, 1, 1, B),
        ("BYTE", 0x1a, 2, 1, B),
        ("SHL", 0x1b, 2, 1, C),
        ("SHR", 0x1c, 2, 1, C),
        ("SAR", 0x1d, 2, 1, C),
        ("SHA3", 0x20, 2, 1, B),
        ("ADDRESS", 0x30, 0, 1, B),
        ("BALANCE", 0x31, 1, 1, B),
        ("ORIGIN", 0x32, 0, 1, B),
        ("CALLER", 0x33, 0, 1, B),
        ("CALLVALUE", 0x34, 0, 1, B),
        ("CALLDATALOAD", 0x35, 1, 1, B),
        ("CALLDATASIZE", 0x36, 0, 1, B),
        ("CALLDATACOPY", 0x37, 3, 0, B),
        ("CODESIZE", 0x38, 0, 1, B),
        ("CODECOPY", 0x39, 3, 0, B),
        ("GASPRICE", 0x3a, 0, 1, B),
        ("EXTCODESIZE", 0x3b, 1, 1, B),
        ("EXTCODECOPY", 0x3c, 4, 0, B),
        ("RETURNDATASIZE", 0x3d, 0, 1, B),
        ("RETURNDATACOPY", 0x3e, 3, 0, B),
        ("EXTCODEHASH", 0x3f, 1, 1, C),
        ("BLOCKHASH", 0x40, 1, 1, B),
        ("COINBASE", 0x41, 0, 1, B),
        ("TIMESTAMP", 0x42, 0, 1, B),
        ("NUMBER", 0x43, 0, 1, B),
        ("DIFFICULTY", 0x44, 0, 1, B),
        ("GASLIMIT", 0x45, 0, 1, B),
        ("CHAINID", 0x46, 0, 1, I),
        ("SELFBALANCE", 0x47, 0, 1, I),
        ("POP", 0x50, 1, 0, B),
        ("MLOAD", 0x51, 1, 1, B),
        ("MSTORE", 0x52, 2, 0, B),
        ("MSTORE8", 0x53, 2, 0, B),
        ("SLOAD", 0x54, 1, 1, B),
        ("SSTORE", 0x55, 2, 0, B),
        ("JUMP", 0x56, 1, 0, B),
        ("JUMPI", 0x57, 2, 0, B),
        ("PC", 0x58, 0, 1, B),
        ("MSIZE", 0x59, 0, 1, B),
        ("GAS", 0x5a, 0, 1, B),
        ("JUMPDEST", 0x5b, 0, 0, B),
        ("DEBUG", 0xa5, 0, 0, B),
        ("CREATE", 0xf0, 3, 1, B),
        ("CALL", 0xf1, 7, 1, B),
        ("CALLCODE", 0xf2, 7, 1, B),
        ("RETURN", 0xf3, 2, 0, B),
        ("DELEGATECALL", 0xf4, 6, 1, B),
        ("CREATE2", 0xf5, 4, 1, C),
        ("STATICCALL", 0xfa, 6, 1, B),
        ("REVERT", 0xfd, 2, 0, B),
        ("INVALID", 0xfe, 0, 0, B),
        ("SELFDESTRUCT", 0xff, 1, 0, B),
    ];

    let mut table = IndexMap::new();
    let mut insert = |mnemonic: String, byte: u8, inputs: u8, outputs: u8, since: EvmVersion| {
        table.insert(
            mnemonic.clone(),
            OpcodeInfo {
                mnemonic,
                byte,
                inputs,
                outputs,
                since,
            },
        );
    };
    for (mnemonic, byte, inputs, outputs, since) in FIXED {
        insert(mnemonic.to_string(), *byte, *inputs, *outputs, *since);
    }
    for n in 1..=32u8 {
        insert(format!("PUSH{}", n), 0x5f + n, 0, 1, B);
    }
    for n in 1..=16u8 {
        insert(format!("DUP{}", n), 0x7f + n, n, n + 1, B);
        insert(format!("SWAP{}", n), 0x8f + n, n + 1, n + 1, B);
    }
    for n in 0..=4u8 {
        insert(format!("LOG{}", n), 0xa0 + n, n + 2, 0, B);
    }
    table
}

/// Opcode by mnemonic, case-insensitive
pub fn opcode(mnemonic: &str) -> Option<&'static OpcodeInfo> {
    OPCODES.get(&mnemonic.to_ascii_uppercase())
}

/// Error unless `info` exists on `target`
pub fn check_available(info: &OpcodeInfo, target: EvmVersion) -> CompileResult<()> {
    if info.since > target {
        return Err(CompilerError::OpcodeUnavailable {
            opcode: info.mnemonic.clone(),
            since: info.since.name().to_string(),
            target: target.name().to_string(),
        });
    }
    Ok(())
}

fn item_size(item: &AsmItem, subs: &HashMap<String, Vec<u8>>) -> usize {
    match item {
        AsmItem::Op(_) | AsmItem::Label(_) => 1,
        AsmItem::Push(bytes) => 1 + bytes.len(),
        AsmItem::PushLabel(_) | AsmItem::PushSubSize(_) | AsmItem::PushCodeSize => {
            1 + LABEL_WIDTH
        }
        AsmItem::Sub(label, _) => subs.get(label).map_or(0, Vec::len),
        AsmItem::Mark(_) => 0,
    }
}

struct Layout {
    labels: HashMap<String, usize>,
    subs: HashMap<String, Vec<u8>>,
    size: usize,
}

fn layout(items: &[AsmItem]) -> CompileResult<Layout> {
    let mut subs = HashMap::new();
    for item in items {
        if let AsmItem::Sub(label, sub_items) = item {
            subs.insert(label.clone(), emit(sub_items)?);
        }
    }

    let mut labels = HashMap::new();
    let mut pc = 0;
    for item in items {
        if let AsmItem::Label(label) | AsmItem::Sub(label, _) = item {
            if labels.insert(label.clone(), pc).is_some() {
                return Err(CompilerError::panic(format!("label `{}` defined twice", label)));
            }
        }
        pc += item_size(item, &subs);
    }
    Ok(Layout {
        labels,
        subs,
        size: pc,
    })
}

fn push_word(out: &mut Vec<u8>, value: usize) -> CompileResult<()> {
    let value = u16::try_from(value)
        .map_err(|_| CompilerError::panic(format!("code offset {} does not fit a label", value)))?;
    out.push(mnemonic_byte("PUSH2")?);
    out.extend_from_slice(&value.to_be_bytes());
    Ok(())
}

fn mnemonic_byte(mnemonic: &str) -> CompileResult<u8> {
    opcode(mnemonic)
        .map(|info| info.byte)
        .ok_or_else(|| CompilerError::panic(format!("unknown opcode `{}`", mnemonic)))
}

/// Bytes for an assembly listing
pub fn emit(items: &[AsmItem]) -> CompileResult<Vec<u8>> {
    let layout = layout(items)?;
    let resolve = |label: &str| {
        layout
            .labels
            .get(label)
            .copied()
            .ok_or_else(|| CompilerError::UndefinedLabel {
                label: label.to_string(),
            })
    };

    let mut out = Vec::with_capacity(layout.size);
    for item in items {
        match item {
            AsmItem::Op(mnemonic) => out.push(mnemonic_byte(mnemonic)?),
            AsmItem::Push(bytes) => {
                let width = bytes.len();
                if !(1..=32).contains(&width) {
                    return Err(CompilerError::panic(format!("cannot push {} bytes", width)));
                }
                out.push(mnemonic_byte(&format!("PUSH{}", width))?);
                out.extend_from_slice(bytes);
            }
            AsmItem::PushLabel(label) => push_word(&mut out, resolve(label)?)?,
            AsmItem::PushSubSize(label) => {
                resolve(label)?;
                let size = layout.subs.get(label).map_or(0, Vec::len);
                push_word(&mut out, size)?;
            }
            AsmItem::PushCodeSize => push_word(&mut out, layout.size)?,
            AsmItem::Label(_) => out.push(mnemonic_byte("JUMPDEST")?),
            AsmItem::Sub(label, _) => {
                if let Some(bytes) = layout.subs.get(label) {
                    out.extend_from_slice(bytes);
                }
            }
            AsmItem::Mark(_) => {}
        }
    }
    Ok(out)
}

/// `0x`-prefixed hex of emitted code
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex(bytes))
}

/// Space separated opcode listing of emitted code
pub fn disassemble(bytes: &[u8]) -> String {
    let mut parts = Vec::new();
    let mut pc = 0;
    while pc < bytes.len() {
        let byte = bytes[pc];
        pc += 1;
        match BY_BYTE.get(&byte) {
            Some(info) if (0x60..=0x7f).contains(&byte) => {
                parts.push(info.mnemonic.clone());
                let width = usize::from(byte - 0x5f);
                let end = (pc + width).min(bytes.len());
                parts.push(format!("0x{}", hex(&bytes[pc..end])));
                pc = end;
            }
            Some(info) => parts.push(info.mnemonic.clone()),
            None => parts.push("INVALID".to_string()),
        }
    }
    parts.join(" ")
}

/// Debugging data for runtime code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceMap {
    /// Program counters of `DEBUG` instructions
    pub breakpoints: Vec<usize>,
    /// Program counter to `[lineno, col, end_lineno, end_col]`
    pub pc_pos_map: IndexMap<String, [usize; 4]>,
    /// Compressed `start:length:source:jump` entries, one per instruction
    pub pc_pos_map_compressed: String,
}

pub fn source_map(items: &[AsmItem], source_id: u32) -> CompileResult<SourceMap> {
    let layout = layout(items)?;
    let mut breakpoints = Vec::new();
    let mut pc_pos_map = IndexMap::new();
    let mut entries = Vec::new();
    let mut previous: Option<[String; 4]> = None;
    let mut mark = None;
    let mut pc = 0;

    for item in items {
        if let AsmItem::Mark(span) = item {
            mark = Some(*span);
            continue;
        }
        let size = item_size(item, &layout.subs);
        if matches!(item, AsmItem::Sub(..)) {
            pc += size;
            continue;
        }
        if matches!(item, AsmItem::Op(op) if op == "DEBUG") {
            breakpoints.push(pc);
        }

        let fields = match mark {
            Some(span) => {
                pc_pos_map.insert(
                    pc.to_string(),
                    [span.lineno, span.col_offset, span.end_lineno, span.end_col_offset],
                );
                [
                    span.start.to_string(),
                    (span.end - span.start).to_string(),
                    source_id.to_string(),
                    jump_kind(item).to_string(),
                ]
            }
            None => [
                "-1".to_string(),
                "-1".to_string(),
                "-1".to_string(),
                jump_kind(item).to_string(),
            ],
        };
        entries.push(compress(&fields, previous.as_ref()));
        previous = Some(fields);
        pc += size;
    }

    Ok(SourceMap {
        breakpoints,
        pc_pos_map,
        pc_pos_map_compressed: entries.join(";"),
    })
}

fn jump_kind(item: &AsmItem) -> &'static str {
    match item {
        AsmItem::Op(op) if op == "JUMP" => "o",
        _ => "-",
    }
}

fn compress(fields: &[String; 4], previous: Option<&[String; 4]>) -> String {
    let mut parts: Vec<&str> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| match previous {
            Some(prev) if prev[i] == *field => "",
            _ => field.as_str(),
        })
        .collect();
    while parts.last() == Some(&"") {
        parts.pop();
    }
    parts.join(":")
}
