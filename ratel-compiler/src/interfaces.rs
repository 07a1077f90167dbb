// Interface definitions
// Inline interfaces, importable interface codes (source or JSON ABI) and builtins

use crate::error::{CompileResult, CompilerError};
use crate::phases::context::{Argument, FunctionSignature, Mutability, Visibility};
use crate::types::{resolve_type, Type, TypeNamespace};
use indexmap::IndexMap;
use ratel_parser::{ExpressionKind, FunctionDef, ParameterKind, Span, Statement, StatementKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Module path of the interfaces shipped with the compiler
pub const BUILTIN_MODULE: &str = "vyper.interfaces";

const ERC20: &str = r#"
@view
@external
def totalSupply() -> uint256:
    pass

@view
@external
def balanceOf(_owner: address) -> uint256:
    pass

@view
@external
def allowance(_owner: address, _spender: address) -> uint256:
    pass

@external
def transfer(_to: address, _value: uint256) -> bool:
    pass

@external
def transferFrom(_from: address, _to: address, _value: uint256) -> bool:
    pass

@external
def approve(_spender: address, _value: uint256) -> bool:
    pass
"#;

/// Importable interface code, `{"type": "vyper" | "json", "code": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "code", rename_all = "lowercase")]
pub enum InterfaceCode {
    /// Contract-language source
    #[serde(rename = "vyper")]
    Source(String),
    /// ABI description given as a JSON list
    Json(Value),
}

pub type InterfaceCodes = IndexMap<String, InterfaceCode>;

/// Interfaces available to a batch of contracts
#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceSet {
    /// One set shared by every contract
    Shared(InterfaceCodes),
    /// Interfaces organized by contract name
    PerContract(IndexMap<String, InterfaceCodes>),
}

impl InterfaceSet {
    pub fn for_contract(&self, contract_name: &str) -> Option<&InterfaceCodes> {
        match self {
            InterfaceSet::Shared(codes) => Some(codes),
            InterfaceSet::PerContract(by_contract) => by_contract.get(contract_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDef {
    pub name: String,
    pub functions: Vec<FunctionSignature>,
}

struct BuiltinsOnly;

impl TypeNamespace for BuiltinsOnly {
    fn is_struct(&self, _name: &str) -> bool {
        false
    }

    fn is_interface(&self, _name: &str) -> bool {
        false
    }
}

/// Builtin interface importable from `vyper.interfaces`
pub fn builtin(name: &str, bound: &str) -> Option<CompileResult<InterfaceDef>> {
    match name {
        "ERC20" => Some(interface_from_code(
            bound,
            &InterfaceCode::Source(ERC20.to_string()),
        )),
        _ => None,
    }
}

pub fn interface_from_code(name: &str, code: &InterfaceCode) -> CompileResult<InterfaceDef> {
    match code {
        InterfaceCode::Source(source) => {
            let module = ratel_parser::parse_to_ast(source, 0)?;
            collect_functions(name, &module.body, false)
        }
        InterfaceCode::Json(abi) => interface_from_abi(name, abi),
    }
}

/// Interface declared inline with `interface Name:`
pub fn interface_from_body(name: &str, body: &[Statement]) -> CompileResult<InterfaceDef> {
    collect_functions(name, body, true)
}

fn collect_functions(name: &str, body: &[Statement], inline: bool) -> CompileResult<InterfaceDef> {
    let mut functions = Vec::new();
    for stmt in body {
        match &stmt.kind {
            StatementKind::FunctionDef(def) => {
                if let Some(signature) = interface_function(def, &stmt.span)? {
                    functions.push(signature);
                }
            }
            StatementKind::Pass => {}
            _ if !inline => {}
            _ => {
                return Err(CompilerError::structure(
                    "Interfaces may only contain function declarations",
                    &stmt.span,
                ))
            }
        }
    }
    Ok(InterfaceDef {
        name: name.to_string(),
        functions,
    })
}

/// Signature of an interface member; internal functions are skipped
fn interface_function(def: &FunctionDef, span: &Span) -> CompileResult<Option<FunctionSignature>> {
    let mut mutability = None;
    for decorator in &def.decorator_list {
        match decorator.as_name() {
            Some("internal" | "private") => return Ok(None),
            Some("external" | "public") => {}
            Some(other) => {
                if let Some(value) = Mutability::from_name(other) {
                    mutability = Some(value);
                }
            }
            None => {}
        }
    }
    if let [Statement {
        kind: StatementKind::Expr(expr),
        ..
    }] = def.body.as_slice()
    {
        if let ExpressionKind::Name(marker) = &expr.value.kind {
            mutability = Some(Mutability::from_name(&marker.id).ok_or_else(|| {
                CompilerError::structure(
                    format!("Unknown mutability `{}`", marker.id),
                    &expr.value.span,
                )
            })?);
        }
    }

    let mut args = Vec::new();
    for param in &def.args {
        if param.kind != ParameterKind::Positional {
            return Err(CompilerError::unsupported("variadic arguments", &param.span));
        }
        let Some(annotation) = &param.annotation else {
            return Err(CompilerError::structure(
                format!("Argument `{}` needs a type annotation", param.arg),
                &param.span,
            ));
        };
        args.push(Argument {
            name: param.arg.clone(),
            typ: resolve_type(annotation, &BuiltinsOnly)?,
        });
    }
    let returns = def
        .returns
        .as_deref()
        .map(|returns| resolve_type(returns, &BuiltinsOnly))
        .transpose()?;

    FunctionSignature::new(
        def.name.clone(),
        args,
        returns,
        Visibility::External,
        mutability.unwrap_or_default(),
        span,
    )
    .map(Some)
}

fn interface_from_abi(name: &str, abi: &Value) -> CompileResult<InterfaceDef> {
    let Some(entries) = abi.as_array() else {
        return Err(CompilerError::structure(
            format!("JSON interface `{}` must be a list", name),
            &Span::default(),
        ));
    };

    let mut functions = Vec::new();
    for entry in entries {
        if entry.get("type").and_then(Value::as_str) != Some("function") {
            continue;
        }
        let function_name = entry
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| abi_error(name, "function without a name"))?;

        let mut args = Vec::new();
        for (i, input) in entry
            .get("inputs")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .enumerate()
        {
            let arg_name = input
                .get("name")
                .and_then(Value::as_str)
                .filter(|arg| !arg.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("arg{}", i));
            args.push(Argument {
                name: arg_name,
                typ: abi_type(name, input)?,
            });
        }
        let returns = entry
            .get("outputs")
            .and_then(Value::as_array)
            .and_then(|outputs| outputs.first())
            .map(|output| abi_type(name, output))
            .transpose()?;

        let mutability = match entry.get("stateMutability").and_then(Value::as_str) {
            Some(state) => Mutability::from_name(state)
                .ok_or_else(|| abi_error(name, &format!("unknown stateMutability {:?}", state)))?,
            None if entry.get("constant").and_then(Value::as_bool) == Some(true) => {
                Mutability::View
            }
            None if entry.get("payable").and_then(Value::as_bool) == Some(true) => {
                Mutability::Payable
            }
            None => Mutability::Nonpayable,
        };

        functions.push(FunctionSignature::new(
            function_name,
            args,
            returns,
            Visibility::External,
            mutability,
            &Span::default(),
        )?);
    }

    Ok(InterfaceDef {
        name: name.to_string(),
        functions,
    })
}

fn abi_type(interface: &str, param: &Value) -> CompileResult<Type> {
    let name = param
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| abi_error(interface, "parameter without a type"))?;
    Type::builtin(name).ok_or_else(|| CompilerError::unknown_type(name, &Span::default()))
}

fn abi_error(interface: &str, message: &str) -> CompilerError {
    CompilerError::structure(
        format!("Invalid JSON interface `{}`: {}", interface, message),
        &Span::default(),
    )
}
