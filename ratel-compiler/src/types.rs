// Contract value types
// Resolution of annotation expressions into ABI-level types

use crate::error::{CompileResult, CompilerError};
use ratel_parser::{Expression, ExpressionKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Uint256,
    Uint8,
    Int128,
    Int256,
    Address,
    Bool,
    Bytes32,
    HashMap(Box<Type>, Box<Type>),
    Struct(String),
    Interface(String),
}

/// Names usable in annotations without a declaration
pub const BUILTIN_TYPES: [&str; 7] = [
    "uint256", "uint8", "int128", "int256", "address", "bool", "bytes32",
];

impl Type {
    pub fn builtin(name: &str) -> Option<Type> {
        let typ = match name {
            "uint256" => Type::Uint256,
            "uint8" => Type::Uint8,
            "int128" => Type::Int128,
            "int256" => Type::Int256,
            "address" => Type::Address,
            "bool" => Type::Bool,
            "bytes32" => Type::Bytes32,
            _ => return None,
        };
        Some(typ)
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::Int128 | Type::Int256)
    }

    /// Fits in a single stack word
    pub fn is_base(&self) -> bool {
        !matches!(self, Type::HashMap(..) | Type::Struct(_))
    }

    /// Name in canonical ABI signatures, `None` for types that have no
    /// single-word ABI form
    pub fn abi_name(&self) -> Option<&'static str> {
        let name = match self {
            Type::Uint256 => "uint256",
            Type::Uint8 => "uint8",
            Type::Int128 => "int128",
            Type::Int256 => "int256",
            Type::Address | Type::Interface(_) => "address",
            Type::Bool => "bool",
            Type::Bytes32 => "bytes32",
            Type::HashMap(..) | Type::Struct(_) => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::HashMap(key, value) => write!(f, "HashMap[{}, {}]", key, value),
            Type::Struct(name) | Type::Interface(name) => f.write_str(name),
            base => f.write_str(base.abi_name().unwrap_or_default()),
        }
    }
}

/// Names a resolver may consult for user-defined types
pub trait TypeNamespace {
    fn is_struct(&self, name: &str) -> bool;
    fn is_interface(&self, name: &str) -> bool;
}

/// Resolve an annotation such as `uint256`, `HashMap[address, Bid]` or a
/// declared struct name
pub fn resolve_type(annotation: &Expression, names: &dyn TypeNamespace) -> CompileResult<Type> {
    match &annotation.kind {
        ExpressionKind::Name(name) => {
            if let Some(typ) = Type::builtin(&name.id) {
                Ok(typ)
            } else if names.is_struct(&name.id) {
                Ok(Type::Struct(name.id.clone()))
            } else if names.is_interface(&name.id) {
                Ok(Type::Interface(name.id.clone()))
            } else {
                Err(CompilerError::unknown_type(&name.id, &annotation.span))
            }
        }
        ExpressionKind::Subscript(subscript) if subscript.value.as_name() == Some("HashMap") => {
            let ExpressionKind::Tuple(pair) = &subscript.slice.kind else {
                return Err(CompilerError::structure(
                    "HashMap takes a key type and a value type",
                    &annotation.span,
                ));
            };
            let [key, value] = pair.elts.as_slice() else {
                return Err(CompilerError::structure(
                    "HashMap takes a key type and a value type",
                    &annotation.span,
                ));
            };
            let key = resolve_type(key, names)?;
            if !key.is_base() {
                return Err(CompilerError::structure(
                    "HashMap keys must be base types",
                    &annotation.span,
                ));
            }
            let value = resolve_type(value, names)?;
            Ok(Type::HashMap(Box::new(key), Box::new(value)))
        }
        _ => Err(CompilerError::unknown_type(
            annotation.to_string(),
            &annotation.span,
        )),
    }
}

/// Unwrap `wrapper(inner)` annotations such as `public(...)` or `indexed(...)`
pub fn unwrap_call<'a>(annotation: &'a Expression, wrapper: &str) -> Option<&'a Expression> {
    match &annotation.kind {
        ExpressionKind::Call(call) if call.func.as_name() == Some(wrapper) => {
            match call.args.as_slice() {
                [inner] if call.keywords.is_empty() => Some(inner),
                _ => None,
            }
        }
        _ => None,
    }
}
