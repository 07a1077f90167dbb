//! Output format registry
//!
//! Maps each requestable output name to the builder that produces it from a
//! [`CompilerData`]. Builders only pull the phases they need, so asking for
//! `abi` never assembles and asking for `bytecode_runtime` never assembles
//! the deployment code.

use crate::error::{CompileResult, CompilerError};
use crate::natspec::parse_natspec;
use crate::phases::assembly::AsmListing;
use crate::phases::bytecode::{disassemble, source_map, to_hex};
use crate::phases::context::{FunctionSignature, GlobalContext, Mutability};
use crate::phases::CompilerData;
use crate::types::Type;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde_json::{json, Value};

pub type OutputBuilder = fn(&CompilerData<'_>) -> CompileResult<Value>;

#[derive(Clone)]
pub struct OutputRegistry {
    builders: IndexMap<&'static str, OutputBuilder>,
}

lazy_static! {
    static ref STANDARD: OutputRegistry = OutputRegistry::new()
        .with("ast_dict", build_ast_dict)
        .with("devdoc", build_devdoc)
        .with("userdoc", build_userdoc)
        .with("external_interface", build_external_interface)
        .with("interface", build_interface)
        .with("ir", build_ir)
        .with("method_identifiers", build_method_identifiers)
        .with("abi", build_abi)
        .with("asm", build_asm)
        .with("source_map", build_source_map)
        .with("bytecode", build_bytecode)
        .with("bytecode_runtime", build_bytecode_runtime)
        .with("opcodes", build_opcodes)
        .with("opcodes_runtime", build_opcodes_runtime);
}

impl OutputRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            builders: IndexMap::new(),
        }
    }

    /// The registry of every builtin output format
    pub fn standard() -> &'static OutputRegistry {
        &STANDARD
    }

    /// Add or replace a format
    pub fn with(mut self, name: &'static str, builder: OutputBuilder) -> Self {
        self.builders.insert(name, builder);
        self
    }

    pub fn get(&self, name: &str) -> Option<OutputBuilder> {
        self.builders.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builders.keys().copied()
    }
}

impl Default for OutputRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OutputRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.builders.keys()).finish()
    }
}

fn build_ast_dict(data: &CompilerData<'_>) -> CompileResult<Value> {
    let ast = ratel_parser::ast_to_dict(data.vyper_module()?)?;
    Ok(json!({
        "contract_name": data.contract_name(),
        "ast": ast,
    }))
}

fn build_devdoc(data: &CompilerData<'_>) -> CompileResult<Value> {
    Ok(parse_natspec(data.global_ctx()?)?.devdoc)
}

fn build_userdoc(data: &CompilerData<'_>) -> CompileResult<Value> {
    Ok(parse_natspec(data.global_ctx()?)?.userdoc)
}

/// Interface name derived from a contract path: `contracts/my_token.vy`
/// becomes `MyToken`
pub fn interface_name(contract_name: &str) -> String {
    let file = contract_name.rsplit(['/', '\\']).next().unwrap_or(contract_name);
    let stem = file.split('.').next().unwrap_or(file);
    let name: String = stem
        .split('_')
        .map(|part| {
            let mut chars = part.chars().filter(|c| c.is_ascii_alphanumeric());
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    if name.is_empty() {
        "Contract".to_string()
    } else {
        name
    }
}

fn argument_list(signature: &FunctionSignature) -> String {
    signature
        .args
        .iter()
        .map(|arg| format!("{}: {}", arg.name, arg.typ))
        .collect::<Vec<_>>()
        .join(", ")
}

fn returns_suffix(signature: &FunctionSignature) -> String {
    match &signature.returns {
        Some(typ) => format!(" -> {}", typ),
        None => String::new(),
    }
}

fn build_external_interface(data: &CompilerData<'_>) -> CompileResult<Value> {
    let ctx = data.global_ctx()?;
    let mut out = format!(
        "\n# External Interfaces\ninterface {}:\n",
        interface_name(data.contract_name())
    );
    for function in ctx.external_functions() {
        let signature = &function.signature;
        out.push_str(&format!(
            "    def {}({}){}: {}\n",
            signature.name,
            argument_list(signature),
            returns_suffix(signature),
            signature.mutability
        ));
    }
    Ok(Value::String(out))
}

fn build_interface(data: &CompilerData<'_>) -> CompileResult<Value> {
    let ctx = data.global_ctx()?;
    let mut out = String::new();

    if !ctx.events.is_empty() {
        out.push_str("# Events\n\n");
        for event in ctx.events.values() {
            out.push_str(&format!("event {}:\n", event.name));
            for field in &event.fields {
                if field.indexed {
                    out.push_str(&format!("    {}: indexed({})\n", field.name, field.typ));
                } else {
                    out.push_str(&format!("    {}: {}\n", field.name, field.typ));
                }
            }
            out.push('\n');
        }
    }

    out.push_str("# Functions\n\n");
    for function in ctx.external_functions() {
        let signature = &function.signature;
        if signature.mutability != Mutability::Nonpayable {
            out.push_str(&format!("@{}\n", signature.mutability));
        }
        out.push_str(&format!(
            "@external\ndef {}({}){}:\n    pass\n\n",
            signature.name,
            argument_list(signature),
            returns_suffix(signature)
        ));
    }
    Ok(Value::String(out))
}

fn build_ir(data: &CompilerData<'_>) -> CompileResult<Value> {
    Ok(Value::String(data.ir_nodes()?.to_string()))
}

fn build_method_identifiers(data: &CompilerData<'_>) -> CompileResult<Value> {
    let identifiers: serde_json::Map<String, Value> = data
        .global_ctx()?
        .external_functions()
        .map(|function| {
            (
                function.signature.canonical.clone(),
                Value::String(function.signature.method_id_hex()),
            )
        })
        .collect();
    Ok(Value::Object(identifiers))
}

fn abi_type(typ: &Type) -> CompileResult<&'static str> {
    typ.abi_name()
        .ok_or_else(|| CompilerError::panic(format!("{} has no ABI representation", typ)))
}

fn abi_inputs(signature: &FunctionSignature) -> CompileResult<Vec<Value>> {
    signature
        .args
        .iter()
        .map(|arg| Ok(json!({"name": arg.name, "type": abi_type(&arg.typ)?})))
        .collect()
}

/// ABI entries: constructor, then events, then functions
pub fn abi(ctx: &GlobalContext) -> CompileResult<Vec<Value>> {
    let mut entries = Vec::new();
    if let Some(constructor) = ctx.constructor() {
        let signature = &constructor.signature;
        entries.push(json!({
            "type": "constructor",
            "inputs": abi_inputs(signature)?,
            "outputs": [],
            "stateMutability": signature.mutability.name(),
        }));
    }
    for event in ctx.events.values() {
        let inputs = event
            .fields
            .iter()
            .map(|field| {
                Ok(json!({
                    "name": field.name,
                    "type": abi_type(&field.typ)?,
                    "indexed": field.indexed,
                }))
            })
            .collect::<CompileResult<Vec<_>>>()?;
        entries.push(json!({
            "type": "event",
            "name": event.name,
            "inputs": inputs,
            "anonymous": false,
        }));
    }
    for function in ctx.external_functions() {
        let signature = &function.signature;
        let outputs = match &signature.returns {
            Some(typ) => vec![json!({"name": "", "type": abi_type(typ)?})],
            None => Vec::new(),
        };
        entries.push(json!({
            "type": "function",
            "name": signature.name,
            "inputs": abi_inputs(signature)?,
            "outputs": outputs,
            "stateMutability": signature.mutability.name(),
        }));
    }
    Ok(entries)
}

fn build_abi(data: &CompilerData<'_>) -> CompileResult<Value> {
    Ok(Value::Array(abi(data.global_ctx()?)?))
}

fn build_asm(data: &CompilerData<'_>) -> CompileResult<Value> {
    Ok(Value::String(AsmListing(data.assembly()?).to_string()))
}

fn build_source_map(data: &CompilerData<'_>) -> CompileResult<Value> {
    let map = source_map(data.assembly_runtime()?, data.source_id())?;
    serde_json::to_value(map).map_err(|error| CompilerError::panic(error.to_string()))
}

fn build_bytecode(data: &CompilerData<'_>) -> CompileResult<Value> {
    Ok(Value::String(to_hex(data.bytecode()?)))
}

fn build_bytecode_runtime(data: &CompilerData<'_>) -> CompileResult<Value> {
    Ok(Value::String(to_hex(data.bytecode_runtime()?)))
}

fn build_opcodes(data: &CompilerData<'_>) -> CompileResult<Value> {
    Ok(Value::String(disassemble(data.bytecode()?)))
}

fn build_opcodes_runtime(data: &CompilerData<'_>) -> CompileResult<Value> {
    Ok(Value::String(disassemble(data.bytecode_runtime()?)))
}
