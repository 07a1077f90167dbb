// Ratel Parser Library
// Pest-based parser, preprocessor and source regenerator for Ratel contracts

pub mod ast;
mod dict;
mod display;
pub mod error;
pub mod parser;
pub mod preprocess;
pub mod visitor;

pub use ast::*;
pub use dict::{ast_to_dict, dict_to_ast};
pub use error::*;
pub use parser::{RatelParser, Rule};
pub use preprocess::{pre_parse, ClassTypes, OffsetMap, Preprocessed};

#[cfg(test)]
mod tests;

/// Reject source text the parser must never see
pub fn validate_source(source: &str) -> Result<(), ParseError> {
    match source.find('\0') {
        Some(offset) => Err(ParseError::NullByte {
            src: source.to_string(),
            span: (offset, 1).into(),
        }),
        None => Ok(()),
    }
}

/// Parse already normalized text
pub fn parse_module(input: &str) -> Result<Module, ParseError> {
    RatelParser::parse_module(input)
}

/// Parse a preprocessed source, reporting positions against the original
pub fn parse_preprocessed(
    original: &str,
    preprocessed: &Preprocessed,
    source_id: u32,
) -> Result<Module, ParseError> {
    RatelParser::parse_preprocessed(original, preprocessed, source_id)
}

/// Validate, preprocess and parse contract source into a module tagged with
/// `source_id`
pub fn parse_to_ast(source: &str, source_id: u32) -> Result<Module, ParseError> {
    validate_source(source)?;
    let preprocessed = pre_parse(source);
    parse_preprocessed(source, &preprocessed, source_id)
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
