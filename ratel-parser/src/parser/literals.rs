// Literal parsing functions for the Ratel parser
// Handles integers in every radix, with digit separators, and quoted strings

use num_bigint::BigInt;
use pest::iterators::Pair;

use super::{RatelParser, Rule};
use crate::ast::*;
use crate::error::*;

impl RatelParser {
    pub(super) fn parse_integer(pair: Pair<Rule>) -> ParseResult<IntegerLiteral> {
        let span = Self::span_from_pair(&pair);
        let inner = Self::next_pair(&mut pair.into_inner(), "integer digits", span)?;
        let text = inner.as_str();

        let (digits, radix, format) = match inner.as_rule() {
            Rule::integer_decimal => (text, 10, IntegerFormat::Decimal),
            Rule::integer_hexadecimal => (&text[2..], 16, IntegerFormat::Hexadecimal),
            Rule::integer_binary => (&text[2..], 2, IntegerFormat::Binary),
            Rule::integer_octal => (&text[2..], 8, IntegerFormat::Octal),
            _ => return Err(Self::unexpected("integer", &inner)),
        };

        let digits = digits.replace('_', "");
        let value = BigInt::parse_bytes(digits.as_bytes(), radix).ok_or_else(|| {
            ParseError::InvalidLiteral {
                src: inner.get_input().to_string(),
                span: (span.start..span.end).into(),
                found: text.to_string(),
            }
        })?;

        Ok(IntegerLiteral { value, format })
    }

    pub(super) fn parse_string(pair: Pair<Rule>) -> ParseResult<StringLiteral> {
        let span = Self::span_from_pair(&pair);
        let mut parts = pair.into_inner().peekable();
        let prefix = parts
            .next_if(|p| p.as_rule() == Rule::string_prefix)
            .map_or_else(String::new, |p| p.as_str().to_string());
        let inner = Self::next_pair(&mut parts, "string body", span)?;
        let text = inner.as_str();

        let quote = match (inner.as_rule(), text.starts_with('\'')) {
            (Rule::string_multiline, false) => QuoteStyle::TripleDouble,
            (Rule::string_multiline, true) => QuoteStyle::TripleSingle,
            (Rule::string_basic, false) => QuoteStyle::Double,
            (Rule::string_basic, true) => QuoteStyle::Single,
            _ => return Err(Self::unexpected("string", &inner)),
        };

        let delimiter = quote.delimiter().len();
        let value = text
            .get(delimiter..text.len() - delimiter)
            .ok_or_else(|| ParseError::InvalidLiteral {
                src: inner.get_input().to_string(),
                span: (span.start..span.end).into(),
                found: text.to_string(),
            })?
            .to_string();

        Ok(StringLiteral {
            value,
            quote,
            prefix,
        })
    }
}
