//! Error types for the Ratel compiler
//!
//! Following the parser's miette patterns. Every error is `Clone` so a failed
//! phase can be memoized alongside successful ones.

use miette::{Diagnostic, SourceSpan};
use ratel_parser::{ParseError, Span};
use std::fmt;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum CompilerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error("Unsupported format type {name:?}")]
    #[diagnostic(
        code(ratel::compile::unsupported_format),
        help("Request one of the registered output formats")
    )]
    UnsupportedFormat { name: String },

    #[error("No output formats requested for contract {contract:?}")]
    #[diagnostic(code(ratel::compile::missing_output_selection))]
    MissingOutputSelection { contract: String },

    #[error("Source ids starting at {initial_id} run out before {contracts} contracts")]
    #[diagnostic(
        code(ratel::compile::source_id_overflow),
        help("Start the batch at a lower initial id")
    )]
    SourceIdOverflow { initial_id: u32, contracts: usize },

    #[error("{message}")]
    #[diagnostic(code(ratel::compile::structure))]
    Structure {
        message: String,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("Unknown type `{name}`")]
    #[diagnostic(
        code(ratel::compile::unknown_type),
        help("Use a builtin type, a declared struct or a declared interface")
    )]
    UnknownType {
        name: String,
        #[label("unknown type")]
        span: Option<SourceSpan>,
    },

    #[error("Division by zero in constant expression")]
    #[diagnostic(code(ratel::compile::zero_division))]
    ZeroDivision {
        #[label("divides by zero")]
        span: Option<SourceSpan>,
    },

    #[error("Integer {value} is outside the 256-bit range")]
    #[diagnostic(code(ratel::compile::literal_out_of_range))]
    LiteralOutOfRange {
        value: String,
        #[label("out of range")]
        span: Option<SourceSpan>,
    },

    #[error("Cannot compile {construct}")]
    #[diagnostic(
        code(ratel::compile::unsupported),
        help("The code generator does not lower this construct")
    )]
    Unsupported {
        construct: String,
        #[label("not supported")]
        span: Option<SourceSpan>,
    },

    #[error("Unknown EVM version {name:?}")]
    #[diagnostic(
        code(ratel::compile::invalid_evm_version),
        help("Valid versions: byzantium, constantinople, petersburg, istanbul, berlin")
    )]
    InvalidEvmVersion { name: String },

    #[error("Opcode {opcode} is not available before {since}, targeting {target}")]
    #[diagnostic(code(ratel::compile::opcode_unavailable))]
    OpcodeUnavailable {
        opcode: String,
        since: String,
        target: String,
    },

    #[error("Assembly references undefined label `{label}`")]
    #[diagnostic(code(ratel::compile::undefined_label))]
    UndefinedLabel { label: String },

    #[error("Compiler panic: {message}")]
    #[diagnostic(
        code(ratel::compile::panic),
        help("This is a bug in the compiler")
    )]
    Panic { message: String },

    #[error("Failed to compile contract {name:?}")]
    #[diagnostic(code(ratel::compile::contract))]
    Contract {
        name: String,
        #[source]
        error: Box<CompilerError>,
    },
}

/// Label span for a node, `None` for synthesized nodes
pub(crate) fn label(span: &Span) -> Option<SourceSpan> {
    if span.is_synthesized() {
        None
    } else {
        Some((span.start..span.end).into())
    }
}

impl CompilerError {
    pub fn structure(message: impl Into<String>, span: &Span) -> Self {
        CompilerError::Structure {
            message: message.into(),
            span: label(span),
        }
    }

    pub fn unsupported(construct: impl Into<String>, span: &Span) -> Self {
        CompilerError::Unsupported {
            construct: construct.into(),
            span: label(span),
        }
    }

    pub fn unknown_type(name: impl Into<String>, span: &Span) -> Self {
        CompilerError::UnknownType {
            name: name.into(),
            span: label(span),
        }
    }

    pub fn panic(message: impl Into<String>) -> Self {
        CompilerError::Panic {
            message: message.into(),
        }
    }

    /// The error underneath any contract wrappers
    pub fn root(&self) -> &CompilerError {
        match self {
            CompilerError::Contract { error, .. } => error.root(),
            other => other,
        }
    }
}

pub type CompileResult<T> = Result<T, CompilerError>;

/// Non-fatal diagnostics collected while compiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerWarning {
    /// Assembly contains `DEBUG` instructions, which halt on chains without a
    /// debugger
    DebugOpcode { occurrences: usize },
}

impl fmt::Display for CompilerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilerWarning::DebugOpcode { occurrences } => write!(
                f,
                "This code contains DEBUG opcodes ({} found). The DEBUG opcode will only work in a supported EVM. It will FAIL on all other nodes!",
                occurrences
            ),
        }
    }
}
