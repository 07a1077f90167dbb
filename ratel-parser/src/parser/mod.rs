// Ratel Parser
// Turns pest pairs into the generic AST

mod expressions;
mod literals;
mod statements;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::*;
use crate::error::*;
use crate::preprocess::{OffsetMap, Preprocessed};
use crate::visitor::{ClassKindAnnotator, SpanResolver, VisitorMut};

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct RatelParser;

impl RatelParser {
    /// Parse text that needs no preprocessing
    pub fn parse_module(input: &str) -> ParseResult<Module> {
        Self::parse_normalized(input, input, &OffsetMap::identity())
    }

    /// Parse preprocessed text, reporting positions against `original` and
    /// restoring the recorded declaration keywords.
    pub fn parse_preprocessed(
        original: &str,
        preprocessed: &Preprocessed,
        source_id: u32,
    ) -> ParseResult<Module> {
        let mut module =
            Self::parse_normalized(&preprocessed.normalized, original, &preprocessed.offsets)?;
        ClassKindAnnotator {
            class_types: &preprocessed.class_types,
        }
        .visit_module(&mut module);
        module.source_id = source_id;
        Ok(module)
    }

    fn parse_normalized(
        normalized: &str,
        original: &str,
        offsets: &OffsetMap,
    ) -> ParseResult<Module> {
        let mut pairs = Self::parse(Rule::module, normalized)
            .map_err(|e| ParseError::from_pest_error(e, original, offsets))?;
        let module_pair = pairs.next().ok_or_else(|| ParseError::MissingPair {
            expected: "module".to_string(),
            span: Span::new(0, normalized.len()),
        })?;

        let span = Self::span_from_pair(&module_pair);
        let mut body = Vec::new();
        for pair in module_pair.into_inner() {
            match pair.as_rule() {
                Rule::statement => body.extend(Self::parse_statements(pair)?),
                Rule::EOI => {}
                _ => return Err(Self::unexpected("statement", &pair)),
            }
        }

        let mut module = Module {
            body,
            source_id: 0,
            span,
        };
        SpanResolver::new(original, offsets).visit_module(&mut module);
        Ok(module)
    }

    pub(crate) fn span_from_pair(pair: &Pair<Rule>) -> Span {
        let span = pair.as_span();
        Span::new(span.start(), span.end())
    }

    pub(crate) fn span_from_range(start: usize, end: usize) -> Span {
        Span::new(start, end)
    }

    /// Inner pairs without keyword and layout tokens
    pub(crate) fn significant<'i>(pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
        pair.into_inner().filter(|p| !Self::is_layout(p.as_rule()))
    }

    fn is_layout(rule: Rule) -> bool {
        matches!(
            rule,
            Rule::same_indent
                | Rule::trailing_comma
                | Rule::kw_and
                | Rule::kw_as
                | Rule::kw_assert
                | Rule::kw_async
                | Rule::kw_await
                | Rule::kw_break
                | Rule::kw_class
                | Rule::kw_continue
                | Rule::kw_def
                | Rule::kw_del
                | Rule::kw_elif
                | Rule::kw_else
                | Rule::kw_except
                | Rule::kw_finally
                | Rule::kw_for
                | Rule::kw_from
                | Rule::kw_global
                | Rule::kw_if
                | Rule::kw_import
                | Rule::kw_in
                | Rule::kw_is
                | Rule::kw_lambda
                | Rule::kw_nonlocal
                | Rule::kw_not
                | Rule::kw_or
                | Rule::kw_pass
                | Rule::kw_raise
                | Rule::kw_return
                | Rule::kw_try
                | Rule::kw_while
                | Rule::kw_with
        )
    }

    pub(crate) fn has_rule(pair: &Pair<Rule>, rule: Rule) -> bool {
        pair.clone().into_inner().any(|p| p.as_rule() == rule)
    }

    pub(crate) fn next_pair<'i>(
        pairs: &mut impl Iterator<Item = Pair<'i, Rule>>,
        expected: &str,
        span: Span,
    ) -> ParseResult<Pair<'i, Rule>> {
        pairs.next().ok_or_else(|| ParseError::MissingPair {
            expected: expected.to_string(),
            span,
        })
    }

    pub(crate) fn unexpected(expected: &str, pair: &Pair<Rule>) -> ParseError {
        ParseError::UnexpectedRule {
            expected: expected.to_string(),
            found: pair.as_rule(),
            span: Self::span_from_pair(pair),
        }
    }
}
