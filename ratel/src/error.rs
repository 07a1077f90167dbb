// Ratel Error Types
// Failures of the split-aware compile path

use miette::Diagnostic;
use ratel_compiler::CompilerError;
use ratel_parser::ParseError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum RatelError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compiler(#[from] CompilerError),

    #[error("Secondary output format {format:?} is not implemented")]
    #[diagnostic(
        code(ratel::split::unsupported_capability),
        help("The secondary domain currently only produces \"src_code\"")
    )]
    UnsupportedCapability { format: String },
}

pub type RatelResult<T> = Result<T, RatelError>;
