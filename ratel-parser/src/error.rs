// Ratel Parser Error Handling
// miette diagnostics for input validation, syntax and tree conversion errors

use crate::ast::Span;
use crate::parser::Rule;
use crate::preprocess::OffsetMap;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Source contains a null byte")]
    #[diagnostic(
        code(ratel::parse::null_byte),
        help("Remove the NUL (0x00) character from the source text")
    )]
    NullByte {
        #[source_code]
        src: String,
        #[label("null byte")]
        span: SourceSpan,
    },

    #[error("Syntax error at line {line}, column {column}")]
    #[diagnostic(
        code(ratel::parse::syntax),
        help("Check the syntax near the highlighted location")
    )]
    Syntax {
        #[source_code]
        src: String,
        #[label("{message}")]
        span: SourceSpan,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Invalid literal `{found}`")]
    #[diagnostic(code(ratel::parse::invalid_literal))]
    InvalidLiteral {
        #[source_code]
        src: String,
        #[label("invalid literal")]
        span: SourceSpan,
        found: String,
    },

    #[error("Unexpected grammar rule")]
    #[diagnostic(
        code(ratel::parse::unexpected_rule),
        help("Expected rule: {expected}, found {found:?}")
    )]
    UnexpectedRule {
        expected: String,
        found: Rule,
        span: Span,
    },

    #[error("Missing {expected} in parse tree")]
    #[diagnostic(code(ratel::parse::missing_pair))]
    MissingPair { expected: String, span: Span },

    #[error("Malformed tree: {message}")]
    #[diagnostic(
        code(ratel::parse::malformed_tree),
        help("The tree did not come from this parser or was modified into an invalid shape")
    )]
    MalformedTree { message: String },
}

impl ParseError {
    /// Build a syntax error from a pest error on normalized text, reporting
    /// the position in the original source.
    pub fn from_pest_error(
        error: pest::error::Error<Rule>,
        original: &str,
        offsets: &OffsetMap,
    ) -> Self {
        let (start, end) = match error.location {
            pest::error::InputLocation::Pos(pos) => (pos, pos),
            pest::error::InputLocation::Span((start, end)) => (start, end),
        };
        let start = offsets.to_original(start).min(original.len());
        let end = offsets.to_original(end).clamp(start, original.len());
        let (line, column) = line_col(original, start);

        let message = match &error.variant {
            pest::error::ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
                let expected: Vec<&str> = positives.iter().map(describe_rule).collect();
                format!("expected {}", expected.join(", "))
            }
            pest::error::ErrorVariant::ParsingError { .. } => "unexpected input".to_string(),
            pest::error::ErrorVariant::CustomError { message } => message.clone(),
        };

        ParseError::Syntax {
            src: original.to_string(),
            span: SourceSpan::new(start.into(), (end - start).max(1).min(original.len() - start)),
            line,
            column,
            message,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ParseError::MalformedTree {
            message: message.into(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// 1-based line and column of a byte offset
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..floor_char_boundary(source, offset)];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before.len() - newline,
        None => before.len() + 1,
    };
    (line, column)
}

fn floor_char_boundary(source: &str, offset: usize) -> usize {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn describe_rule(rule: &Rule) -> &'static str {
    match rule {
        Rule::statement => "a statement",
        Rule::block => "an indented block",
        Rule::suite => "a statement or an indented block",
        Rule::expression | Rule::operation | Rule::postfix_expr => "an expression",
        Rule::expression_list => "an expression",
        Rule::identifier => "an identifier",
        Rule::integer | Rule::integer_decimal => "an integer",
        Rule::decimal => "a decimal literal",
        Rule::string | Rule::string_basic | Rule::string_multiline => "a string",
        Rule::parameters | Rule::parameter => "a parameter",
        Rule::arguments => "an argument",
        Rule::except_clause => "an except clause",
        Rule::try_finally => "a finally clause",
        Rule::with_item => "a context manager",
        Rule::decorator => "a decorator",
        Rule::aug_op => "an augmented assignment operator",
        Rule::EOI => "end of input",
        rule if format!("{:?}", rule).starts_with("op_") => "an operator",
        rule if format!("{:?}", rule).starts_with("kw_") => "a keyword",
        _ => "valid syntax",
    }
}
