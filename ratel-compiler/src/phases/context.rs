//! Global context: the sorted, validated view of a folded contract module
//!
//! Collects storage layout, constants, structs, events, interfaces and
//! function signatures, assigning storage slots and method identifiers.

use crate::error::{CompileResult, CompilerError};
use crate::interfaces::{self, InterfaceCodes, InterfaceDef};
use crate::types::{resolve_type, unwrap_call, Type, TypeNamespace};
use indexmap::{IndexMap, IndexSet};
use ratel_parser::{
    ClassDef, ClassKind, Expression, ExpressionKind, FunctionDef, Module, ParameterKind, Span,
    Statement, StatementKind,
};
use sha3::{Digest, Keccak256};
use std::fmt;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// First four bytes of the hash of a canonical signature
pub fn method_id(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    External,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mutability {
    Pure,
    View,
    #[default]
    Nonpayable,
    Payable,
}

impl Mutability {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pure" => Some(Mutability::Pure),
            "view" | "constant" => Some(Mutability::View),
            "nonpayable" | "modifying" => Some(Mutability::Nonpayable),
            "payable" => Some(Mutability::Payable),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mutability::Pure => "pure",
            Mutability::View => "view",
            Mutability::Nonpayable => "nonpayable",
            Mutability::Payable => "payable",
        }
    }
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub typ: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub args: Vec<Argument>,
    pub returns: Option<Type>,
    pub visibility: Visibility,
    pub mutability: Mutability,
    /// Canonical `name(type,...)` form, empty for internal functions
    pub canonical: String,
    pub method_id: [u8; 4],
}

impl FunctionSignature {
    pub fn new(
        name: impl Into<String>,
        args: Vec<Argument>,
        returns: Option<Type>,
        visibility: Visibility,
        mutability: Mutability,
        span: &Span,
    ) -> CompileResult<Self> {
        let name = name.into();
        let mut signature = Self {
            name,
            args,
            returns,
            visibility,
            mutability,
            canonical: String::new(),
            method_id: [0; 4],
        };
        if visibility == Visibility::External {
            let mut types = Vec::with_capacity(signature.args.len());
            for arg in &signature.args {
                types.push(abi_name(&arg.typ, span)?);
            }
            if let Some(returns) = &signature.returns {
                abi_name(returns, span)?;
            }
            signature.canonical = format!("{}({})", signature.name, types.join(","));
            signature.method_id = method_id(&signature.canonical);
        }
        Ok(signature)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "__init__"
    }

    pub fn is_payable(&self) -> bool {
        self.mutability == Mutability::Payable
    }

    pub fn method_id_hex(&self) -> String {
        format!("0x{}", hex(&self.method_id))
    }
}

fn abi_name(typ: &Type, span: &Span) -> CompileResult<&'static str> {
    typ.abi_name().ok_or_else(|| {
        CompilerError::unsupported(format!("{} in an external signature", typ), span)
    })
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionKind {
    Defined {
        body: Vec<Statement>,
        docstring: Option<String>,
    },
    /// Generated accessor for a `public(...)` storage variable
    Getter { variable: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractFunction {
    pub signature: FunctionSignature,
    pub kind: FunctionKind,
    pub span: Span,
}

impl ContractFunction {
    pub fn docstring(&self) -> Option<&str> {
        match &self.kind {
            FunctionKind::Defined { docstring, .. } => docstring.as_deref(),
            FunctionKind::Getter { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageVariable {
    pub name: String,
    pub typ: Type,
    pub slot: u64,
    pub public: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub name: String,
    pub typ: Type,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub typ: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<StructField>,
}

impl StructDef {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventField {
    pub name: String,
    pub typ: Type,
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDef {
    pub name: String,
    pub fields: Vec<EventField>,
    pub signature: String,
    pub topic: [u8; 32],
}

/// Maximum indexed fields per event; the fourth topic is the signature hash
const MAX_INDEXED: usize = 3;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlobalContext {
    pub docstring: Option<String>,
    pub storage: IndexMap<String, StorageVariable>,
    pub constants: IndexMap<String, Constant>,
    pub structs: IndexMap<String, StructDef>,
    pub events: IndexMap<String, EventDef>,
    pub interfaces: IndexMap<String, InterfaceDef>,
    /// Getters first, then defined functions in source order
    pub functions: IndexMap<String, ContractFunction>,
}

impl GlobalContext {
    pub fn constructor(&self) -> Option<&ContractFunction> {
        self.functions.get("__init__")
    }

    /// External entry points reachable through the runtime dispatcher
    pub fn external_functions(&self) -> impl Iterator<Item = &ContractFunction> {
        self.functions.values().filter(|function| {
            function.signature.visibility == Visibility::External
                && !function.signature.is_constructor()
        })
    }

    /// Number of word slots a type occupies in storage
    pub fn storage_size(&self, typ: &Type) -> u64 {
        match typ {
            Type::Struct(name) => self
                .structs
                .get(name)
                .map(|def| def.fields.len() as u64)
                .unwrap_or(1),
            _ => 1,
        }
    }
}

impl TypeNamespace for GlobalContext {
    fn is_struct(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    fn is_interface(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }
}

const DECORATORS: [&str; 8] = [
    "external",
    "internal",
    "public",
    "private",
    "view",
    "pure",
    "payable",
    "nonpayable",
];

/// Build the global context for a folded module
pub fn build_global_context(
    module: &Module,
    interface_codes: &InterfaceCodes,
) -> CompileResult<GlobalContext> {
    let mut builder = ContextBuilder::default();
    builder.declare_names(module)?;
    builder.ctx.docstring = docstring(&module.body);

    for stmt in &module.body {
        match &stmt.kind {
            StatementKind::Import(import) => {
                for alias in &import.names {
                    let bound = alias.asname.as_deref().unwrap_or(&alias.name);
                    let bound = bound.rsplit('.').next().unwrap_or(bound);
                    builder.import_interface(bound, None, interface_codes, &stmt.span)?;
                }
            }
            StatementKind::ImportFrom(import) if import.level > 0 => {
                return Err(CompilerError::structure(
                    "Relative imports are not supported in contracts",
                    &stmt.span,
                ))
            }
            StatementKind::ImportFrom(import) => {
                for alias in &import.names {
                    let bound = alias.asname.as_deref().unwrap_or(&alias.name);
                    builder.import_interface(
                        bound,
                        Some((&import.module, &alias.name)),
                        interface_codes,
                        &stmt.span,
                    )?;
                }
            }
            StatementKind::ClassDef(def) if def.kind == ClassKind::Struct => {
                builder.add_struct(def, &stmt.span)?;
            }
            _ => {}
        }
    }

    for stmt in &module.body {
        match &stmt.kind {
            StatementKind::ClassDef(def) => match def.kind {
                ClassKind::Struct => {}
                ClassKind::Event => builder.add_event(def, &stmt.span)?,
                ClassKind::Interface | ClassKind::Contract => {
                    let interface = interfaces::interface_from_body(&def.name, &def.body)?;
                    builder.ctx.interfaces.insert(def.name.clone(), interface);
                }
                ClassKind::Class => {
                    return Err(CompilerError::structure(
                        format!("Plain class `{}` cannot appear in a contract", def.name),
                        &stmt.span,
                    ))
                }
            },
            StatementKind::AnnAssign(assign) => builder.add_variable(assign, &stmt.span)?,
            StatementKind::FunctionDef(_)
            | StatementKind::Import(_)
            | StatementKind::ImportFrom(_) => {}
            StatementKind::Expr(expr) if matches!(expr.value.kind, ExpressionKind::Str(_)) => {}
            _ => {
                return Err(CompilerError::structure(
                    "Invalid top-level statement",
                    &stmt.span,
                ))
            }
        }
    }

    builder.add_getters()?;

    for stmt in &module.body {
        if let StatementKind::FunctionDef(def) = &stmt.kind {
            builder.add_function(def, &stmt.span)?;
        }
    }

    builder.check_method_ids()?;
    Ok(builder.ctx)
}

#[derive(Default)]
struct ContextBuilder {
    ctx: GlobalContext,
    next_slot: u64,
    struct_names: IndexSet<String>,
    interface_names: IndexSet<String>,
}

impl TypeNamespace for ContextBuilder {
    fn is_struct(&self, name: &str) -> bool {
        self.struct_names.contains(name)
    }

    fn is_interface(&self, name: &str) -> bool {
        self.interface_names.contains(name)
    }
}

impl ContextBuilder {
    /// Register every top-level name, rejecting duplicates
    fn declare_names(&mut self, module: &Module) -> CompileResult<()> {
        let mut seen = IndexSet::new();
        for stmt in &module.body {
            let names: Vec<String> = match &stmt.kind {
                StatementKind::FunctionDef(def) => vec![def.name.clone()],
                StatementKind::ClassDef(def) => {
                    match def.kind {
                        ClassKind::Struct => {
                            self.struct_names.insert(def.name.clone());
                        }
                        ClassKind::Interface | ClassKind::Contract => {
                            self.interface_names.insert(def.name.clone());
                        }
                        _ => {}
                    }
                    vec![def.name.clone()]
                }
                StatementKind::AnnAssign(assign) => assign
                    .target
                    .as_name()
                    .map(|name| vec![name.to_string()])
                    .unwrap_or_default(),
                StatementKind::Import(import) => import
                    .names
                    .iter()
                    .map(|alias| {
                        let bound = alias.asname.as_deref().unwrap_or(&alias.name);
                        bound.rsplit('.').next().unwrap_or(bound).to_string()
                    })
                    .collect(),
                StatementKind::ImportFrom(import) => import
                    .names
                    .iter()
                    .map(|alias| alias.asname.clone().unwrap_or_else(|| alias.name.clone()))
                    .collect(),
                _ => Vec::new(),
            };
            for name in names {
                if matches!(
                    stmt.kind,
                    StatementKind::Import(_) | StatementKind::ImportFrom(_)
                ) {
                    self.interface_names.insert(name.clone());
                }
                if !seen.insert(name.clone()) {
                    return Err(CompilerError::structure(
                        format!("Duplicate name `{}`", name),
                        &stmt.span,
                    ));
                }
            }
        }
        Ok(())
    }

    fn import_interface(
        &mut self,
        bound: &str,
        from: Option<(&str, &str)>,
        interface_codes: &InterfaceCodes,
        span: &Span,
    ) -> CompileResult<()> {
        let interface = match from {
            Some((interfaces::BUILTIN_MODULE, name)) => interfaces::builtin(name, bound)
                .ok_or_else(|| {
                    CompilerError::structure(
                        format!("Unknown builtin interface `{}`", name),
                        span,
                    )
                })??,
            _ => match interface_codes.get(bound) {
                Some(code) => interfaces::interface_from_code(bound, code)?,
                None => {
                    return Err(CompilerError::structure(
                        format!("Unknown interface `{}`", bound),
                        span,
                    ))
                }
            },
        };
        self.ctx.interfaces.insert(bound.to_string(), interface);
        Ok(())
    }

    fn add_struct(&mut self, def: &ClassDef, span: &Span) -> CompileResult<()> {
        let mut fields = Vec::new();
        for stmt in &def.body {
            match &stmt.kind {
                StatementKind::AnnAssign(field) if field.value.is_none() => {
                    let name = field_name(&field.target, &stmt.span)?;
                    let typ = resolve_type(&field.annotation, self)?;
                    if !typ.is_base() {
                        return Err(CompilerError::unsupported(
                            format!("struct field of type {}", typ),
                            &stmt.span,
                        ));
                    }
                    fields.push(StructField { name, typ });
                }
                StatementKind::Pass => {}
                _ => {
                    return Err(CompilerError::structure(
                        "Structs may only contain field declarations",
                        &stmt.span,
                    ))
                }
            }
        }
        if fields.is_empty() {
            return Err(CompilerError::structure(
                format!("Struct `{}` has no fields", def.name),
                span,
            ));
        }
        self.ctx.structs.insert(
            def.name.clone(),
            StructDef {
                name: def.name.clone(),
                fields,
            },
        );
        Ok(())
    }

    fn add_event(&mut self, def: &ClassDef, span: &Span) -> CompileResult<()> {
        let mut fields = Vec::new();
        for stmt in &def.body {
            match &stmt.kind {
                StatementKind::AnnAssign(field) if field.value.is_none() => {
                    let name = field_name(&field.target, &stmt.span)?;
                    let (annotation, indexed) = match unwrap_call(&field.annotation, "indexed") {
                        Some(inner) => (inner, true),
                        None => (&field.annotation, false),
                    };
                    let typ = resolve_type(annotation, self)?;
                    if typ.abi_name().is_none() {
                        return Err(CompilerError::unsupported(
                            format!("event field of type {}", typ),
                            &stmt.span,
                        ));
                    }
                    fields.push(EventField { name, typ, indexed });
                }
                StatementKind::Pass => {}
                _ => {
                    return Err(CompilerError::structure(
                        "Events may only contain field declarations",
                        &stmt.span,
                    ))
                }
            }
        }
        if fields.iter().filter(|field| field.indexed).count() > MAX_INDEXED {
            return Err(CompilerError::structure(
                format!("Event `{}` has more than {} indexed fields", def.name, MAX_INDEXED),
                span,
            ));
        }
        let types: Vec<&str> = fields
            .iter()
            .filter_map(|field| field.typ.abi_name())
            .collect();
        let signature = format!("{}({})", def.name, types.join(","));
        let topic = keccak256(signature.as_bytes());
        self.ctx.events.insert(
            def.name.clone(),
            EventDef {
                name: def.name.clone(),
                fields,
                signature,
                topic,
            },
        );
        Ok(())
    }

    fn add_variable(&mut self, assign: &ratel_parser::AnnAssign, span: &Span) -> CompileResult<()> {
        let name = field_name(&assign.target, span)?;

        if let Some(inner) = unwrap_call(&assign.annotation, "constant") {
            let typ = resolve_type(inner, self)?;
            let value = match &assign.value {
                Some(value @ Expression {
                    kind: ExpressionKind::Int(_) | ExpressionKind::Bool(_),
                    ..
                }) => value.clone(),
                Some(value) => {
                    return Err(CompilerError::structure(
                        format!("Constant `{}` must fold to a literal", name),
                        &value.span,
                    ))
                }
                None => {
                    return Err(CompilerError::structure(
                        format!("Constant `{}` needs a value", name),
                        span,
                    ))
                }
            };
            self.ctx
                .constants
                .insert(name.clone(), Constant { name, typ, value });
            return Ok(());
        }

        if assign.value.is_some() {
            return Err(CompilerError::structure(
                "Storage variables cannot be initialized at declaration",
                span,
            ));
        }
        let (annotation, public) = match unwrap_call(&assign.annotation, "public") {
            Some(inner) => (inner, true),
            None => (&assign.annotation, false),
        };
        let typ = resolve_type(annotation, self)?;
        let slot = self.next_slot;
        self.next_slot += self.ctx.storage_size(&typ);
        self.ctx.storage.insert(
            name.clone(),
            StorageVariable {
                name,
                typ,
                slot,
                public,
                span: *span,
            },
        );
        Ok(())
    }

    fn add_getters(&mut self) -> CompileResult<()> {
        let public: Vec<StorageVariable> = self
            .ctx
            .storage
            .values()
            .filter(|var| var.public)
            .cloned()
            .collect();
        for var in public {
            let mut args = Vec::new();
            let mut typ = &var.typ;
            while let Type::HashMap(key, value) = typ {
                args.push(Argument {
                    name: format!("arg{}", args.len()),
                    typ: (**key).clone(),
                });
                typ = value;
            }
            if !typ.is_base() {
                return Err(CompilerError::unsupported(
                    format!("public getter returning {}", typ),
                    &var.span,
                ));
            }
            let signature = FunctionSignature::new(
                var.name.clone(),
                args,
                Some(typ.clone()),
                Visibility::External,
                Mutability::View,
                &var.span,
            )?;
            self.ctx.functions.insert(
                var.name.clone(),
                ContractFunction {
                    signature,
                    kind: FunctionKind::Getter {
                        variable: var.name.clone(),
                    },
                    span: var.span,
                },
            );
        }
        Ok(())
    }

    fn add_function(&mut self, def: &FunctionDef, span: &Span) -> CompileResult<()> {
        if def.is_async {
            return Err(CompilerError::structure(
                format!("Async function `{}` cannot be compiled for the contract", def.name),
                span,
            ));
        }

        let mut visibility = None;
        let mut mutability = None;
        for decorator in &def.decorator_list {
            let Some(name) = decorator.as_name().filter(|name| DECORATORS.contains(name)) else {
                return Err(CompilerError::structure(
                    format!("Unknown decorator `{}`", decorator),
                    &decorator.span,
                ));
            };
            let conflict = match name {
                "external" | "public" => visibility.replace(Visibility::External).is_some(),
                "internal" | "private" => visibility.replace(Visibility::Internal).is_some(),
                _ => Mutability::from_name(name)
                    .and_then(|value| mutability.replace(value))
                    .is_some(),
            };
            if conflict {
                return Err(CompilerError::structure(
                    format!("Conflicting decorator `@{}`", name),
                    &decorator.span,
                ));
            }
        }
        let Some(visibility) = visibility else {
            return Err(CompilerError::structure(
                format!(
                    "Function `{}` must be decorated with @external or @internal",
                    def.name
                ),
                span,
            ));
        };
        let mutability = mutability.unwrap_or_default();

        let mut args = Vec::new();
        for param in &def.args {
            if param.kind != ParameterKind::Positional {
                return Err(CompilerError::unsupported("variadic arguments", &param.span));
            }
            if param.default.is_some() {
                return Err(CompilerError::unsupported("default argument values", &param.span));
            }
            let Some(annotation) = &param.annotation else {
                return Err(CompilerError::structure(
                    format!("Argument `{}` needs a type annotation", param.arg),
                    &param.span,
                ));
            };
            let typ = resolve_type(annotation, self)?;
            if !typ.is_base() {
                return Err(CompilerError::unsupported(
                    format!("argument of type {}", typ),
                    &param.span,
                ));
            }
            args.push(Argument {
                name: param.arg.clone(),
                typ,
            });
        }
        let returns = def
            .returns
            .as_deref()
            .map(|returns| resolve_type(returns, self))
            .transpose()?;

        if def.name == "__init__" {
            if visibility != Visibility::External {
                return Err(CompilerError::structure("__init__ must be @external", span));
            }
            if returns.is_some() {
                return Err(CompilerError::structure("__init__ cannot return a value", span));
            }
        }

        let signature =
            FunctionSignature::new(def.name.clone(), args, returns, visibility, mutability, span)?;
        self.ctx.functions.insert(
            def.name.clone(),
            ContractFunction {
                signature,
                kind: FunctionKind::Defined {
                    body: def.body.clone(),
                    docstring: docstring(&def.body),
                },
                span: *span,
            },
        );
        Ok(())
    }

    fn check_method_ids(&self) -> CompileResult<()> {
        let mut seen: IndexMap<[u8; 4], &str> = IndexMap::new();
        for function in self.ctx.external_functions() {
            if let Some(other) = seen.insert(function.signature.method_id, &function.signature.name) {
                return Err(CompilerError::structure(
                    format!(
                        "Method id collision between `{}` and `{}`",
                        other, function.signature.name
                    ),
                    &function.span,
                ));
            }
        }
        Ok(())
    }
}

fn field_name(target: &Expression, span: &Span) -> CompileResult<String> {
    target
        .as_name()
        .map(str::to_string)
        .ok_or_else(|| CompilerError::structure("Expected a plain name", span))
}

/// Leading string expression of a body
pub(crate) fn docstring(body: &[Statement]) -> Option<String> {
    match body.first().map(|stmt| &stmt.kind) {
        Some(StatementKind::Expr(expr)) => match &expr.value.kind {
            ExpressionKind::Str(string) => Some(string.value.clone()),
            _ => None,
        },
        _ => None,
    }
}
