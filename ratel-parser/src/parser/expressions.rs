// Expression parsing module
// Handles operator precedence, trailers, displays and comprehensions

use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};

use super::{RatelParser, Rule};
use crate::ast::*;
use crate::error::*;

impl RatelParser {
    /// Operator precedence, lowest first
    fn pratt_parser() -> PrattParser<Rule> {
        PrattParser::new()
            .op(Op::infix(Rule::op_or, Assoc::Left))
            .op(Op::infix(Rule::op_and, Assoc::Left))
            .op(Op::prefix(Rule::op_not))
            .op(Op::infix(Rule::op_equal, Assoc::Left)
                | Op::infix(Rule::op_not_equal, Assoc::Left)
                | Op::infix(Rule::op_less, Assoc::Left)
                | Op::infix(Rule::op_less_equal, Assoc::Left)
                | Op::infix(Rule::op_greater, Assoc::Left)
                | Op::infix(Rule::op_greater_equal, Assoc::Left)
                | Op::infix(Rule::op_in, Assoc::Left)
                | Op::infix(Rule::op_not_in, Assoc::Left)
                | Op::infix(Rule::op_is, Assoc::Left)
                | Op::infix(Rule::op_is_not, Assoc::Left))
            .op(Op::infix(Rule::op_bitwise_or, Assoc::Left))
            .op(Op::infix(Rule::op_bitwise_xor, Assoc::Left))
            .op(Op::infix(Rule::op_bitwise_and, Assoc::Left))
            .op(Op::infix(Rule::op_shift_left, Assoc::Left)
                | Op::infix(Rule::op_shift_right, Assoc::Left))
            .op(Op::infix(Rule::op_add, Assoc::Left) | Op::infix(Rule::op_subtract, Assoc::Left))
            .op(Op::infix(Rule::op_multiply, Assoc::Left)
                | Op::infix(Rule::op_divide, Assoc::Left)
                | Op::infix(Rule::op_floor_divide, Assoc::Left)
                | Op::infix(Rule::op_modulo, Assoc::Left))
            .op(Op::prefix(Rule::op_negate) | Op::prefix(Rule::op_plus) | Op::prefix(Rule::op_invert))
            .op(Op::infix(Rule::op_power, Assoc::Right))
            .op(Op::prefix(Rule::op_await))
    }

    /// Full expression, conditional and lambda forms included, or a
    /// starred item where the grammar allows one
    pub(crate) fn parse_expression(pair: Pair<Rule>) -> ParseResult<Expression> {
        let span = Self::span_from_pair(&pair);
        match pair.as_rule() {
            Rule::expression => {
                let mut inner = Self::significant(pair);
                let first = Self::next_pair(&mut inner, "expression", span)?;
                if first.as_rule() == Rule::lambda_expr {
                    return Self::parse_lambda(first);
                }
                let body = Self::parse_operation(first)?;
                let Some(test) = inner.next() else {
                    return Ok(body);
                };
                let test = Self::parse_operation(test)?;
                let orelse = Self::parse_expression(Self::next_pair(&mut inner, "else value", span)?)?;
                Ok(Expression::new(
                    ExpressionKind::IfExp(IfExp {
                        test: Box::new(test),
                        body: Box::new(body),
                        orelse: Box::new(orelse),
                    }),
                    span,
                ))
            }
            Rule::starred => {
                let value = Self::next_pair(&mut pair.into_inner(), "starred value", span)?;
                Ok(Expression::new(
                    ExpressionKind::Starred(Starred {
                        value: Box::new(Self::parse_operation(value)?),
                    }),
                    span,
                ))
            }
            _ => Err(Self::unexpected("expression", &pair)),
        }
    }

    /// Operator expression without the conditional form
    fn parse_operation(pair: Pair<Rule>) -> ParseResult<Expression> {
        match pair.as_rule() {
            Rule::operation => Self::parse_expression_with_precedence(pair.into_inner()),
            _ => Err(Self::unexpected("expression", &pair)),
        }
    }

    fn parse_lambda(pair: Pair<Rule>) -> ParseResult<Expression> {
        let span = Self::span_from_pair(&pair);
        let mut args = Vec::new();
        let mut body = None;
        for child in Self::significant(pair) {
            match child.as_rule() {
                Rule::lambda_params => {
                    args = child
                        .into_inner()
                        .map(Self::parse_parameter)
                        .collect::<ParseResult<Vec<_>>>()?;
                }
                Rule::expression => body = Some(Self::parse_expression(child)?),
                _ => return Err(Self::unexpected("lambda parameters or body", &child)),
            }
        }
        let body = body.ok_or_else(|| ParseError::MissingPair {
            expected: "lambda body".to_string(),
            span,
        })?;
        Ok(Expression::new(
            ExpressionKind::Lambda(Lambda {
                args,
                body: Box::new(body),
            }),
            span,
        ))
    }

    fn parse_generator(pair: Pair<Rule>) -> ParseResult<Generator> {
        let span = Self::span_from_pair(&pair);
        let is_async = Self::has_rule(&pair, Rule::kw_async);
        let mut inner = Self::significant(pair);
        let target = Self::parse_for_target(Self::next_pair(&mut inner, "loop target", span)?);
        let iter = Self::parse_operation(Self::next_pair(&mut inner, "iterable", span)?)?;
        let ifs = inner
            .map(|cond| {
                let cond_span = Self::span_from_pair(&cond);
                Self::parse_operation(Self::next_pair(
                    &mut Self::significant(cond),
                    "condition",
                    cond_span,
                )?)
            })
            .collect::<ParseResult<Vec<_>>>()?;
        Ok(Generator {
            target,
            iter,
            ifs,
            is_async,
        })
    }

    /// Items of a display and the `for` clauses that follow its first item
    fn parse_items(pair: Pair<Rule>) -> ParseResult<(Vec<Expression>, Vec<Generator>)> {
        let mut elts = Vec::new();
        let mut generators = Vec::new();
        for child in Self::significant(pair) {
            match child.as_rule() {
                Rule::comp_for => generators.push(Self::parse_generator(child)?),
                _ => elts.push(Self::parse_expression(child)?),
            }
        }
        Ok((elts, generators))
    }

    fn comprehension(
        mut elts: Vec<Expression>,
        generators: Vec<Generator>,
        span: Span,
    ) -> ParseResult<Comprehension> {
        let elt = elts.pop().ok_or_else(|| ParseError::MissingPair {
            expected: "comprehension element".to_string(),
            span,
        })?;
        Ok(Comprehension {
            elt: Box::new(elt),
            generators,
        })
    }

    /// A comma-separated list that is a tuple unless it is one bare expression
    pub(crate) fn parse_expression_list(pair: Pair<Rule>) -> ParseResult<Expression> {
        let span = Self::span_from_pair(&pair);
        let trailing_comma = Self::has_rule(&pair, Rule::trailing_comma);
        let mut elts = Self::significant(pair)
            .map(Self::parse_expression)
            .collect::<ParseResult<Vec<_>>>()?;
        if elts.len() == 1 && !trailing_comma {
            return Ok(elts.remove(0));
        }
        Ok(Expression::new(
            ExpressionKind::Tuple(TupleDisplay { elts }),
            span,
        ))
    }

    fn parse_expression_with_precedence(pairs: Pairs<Rule>) -> ParseResult<Expression> {
        Self::pratt_parser()
            .map_primary(Self::parse_postfix_expr)
            .map_prefix(|op, operand| {
                let operand = operand?;
                let span = Self::span_from_range(op.as_span().start(), operand.span.end);
                let kind = match op.as_rule() {
                    Rule::op_await => ExpressionKind::Await(Await {
                        value: Box::new(operand),
                    }),
                    rule => {
                        let op = match rule {
                            Rule::op_not => UnaryOperator::Not,
                            Rule::op_negate => UnaryOperator::USub,
                            Rule::op_plus => UnaryOperator::UAdd,
                            Rule::op_invert => UnaryOperator::Invert,
                            _ => return Err(Self::unexpected("prefix operator", &op)),
                        };
                        ExpressionKind::UnaryOp(UnaryOp {
                            op,
                            operand: Box::new(operand),
                        })
                    }
                };
                Ok(Expression::new(kind, span))
            })
            .map_infix(|left, op, right| {
                let left = left?;
                let right = right?;
                let span = Self::span_from_range(left.span.start, right.span.end);

                if let Some(bool_op) = Self::bool_operator(op.as_rule()) {
                    return Ok(Self::extend_bool_op(left, bool_op, right, span));
                }
                if let Some(cmp_op) = Self::compare_operator(op.as_rule()) {
                    return Ok(Self::extend_compare(left, cmp_op, right, span));
                }

                let operator = match op.as_rule() {
                    Rule::op_bitwise_or => BinaryOperator::BitOr,
                    Rule::op_bitwise_xor => BinaryOperator::BitXor,
                    Rule::op_bitwise_and => BinaryOperator::BitAnd,
                    Rule::op_shift_left => BinaryOperator::LShift,
                    Rule::op_shift_right => BinaryOperator::RShift,
                    Rule::op_add => BinaryOperator::Add,
                    Rule::op_subtract => BinaryOperator::Sub,
                    Rule::op_multiply => BinaryOperator::Mult,
                    Rule::op_divide => BinaryOperator::Div,
                    Rule::op_floor_divide => BinaryOperator::FloorDiv,
                    Rule::op_modulo => BinaryOperator::Mod,
                    Rule::op_power => BinaryOperator::Pow,
                    _ => return Err(Self::unexpected("binary operator", &op)),
                };

                Ok(Expression::new(
                    ExpressionKind::BinOp(BinOp {
                        left: Box::new(left),
                        op: operator,
                        right: Box::new(right),
                    }),
                    span,
                ))
            })
            .parse(pairs)
    }

    fn bool_operator(rule: Rule) -> Option<BoolOperator> {
        match rule {
            Rule::op_and => Some(BoolOperator::And),
            Rule::op_or => Some(BoolOperator::Or),
            _ => None,
        }
    }

    fn compare_operator(rule: Rule) -> Option<CompareOperator> {
        let op = match rule {
            Rule::op_equal => CompareOperator::Eq,
            Rule::op_not_equal => CompareOperator::NotEq,
            Rule::op_less => CompareOperator::Lt,
            Rule::op_less_equal => CompareOperator::LtE,
            Rule::op_greater => CompareOperator::Gt,
            Rule::op_greater_equal => CompareOperator::GtE,
            Rule::op_in => CompareOperator::In,
            Rule::op_not_in => CompareOperator::NotIn,
            Rule::op_is => CompareOperator::Is,
            Rule::op_is_not => CompareOperator::IsNot,
            _ => return None,
        };
        Some(op)
    }

    /// `a or b or c` becomes one operation with three values
    fn extend_bool_op(
        left: Expression,
        op: BoolOperator,
        right: Expression,
        span: Span,
    ) -> Expression {
        let values = match left.kind {
            ExpressionKind::BoolOp(existing) if existing.op == op => {
                let mut values = existing.values;
                values.push(right);
                values
            }
            kind => vec![Expression::new(kind, left.span), right],
        };
        Expression::new(ExpressionKind::BoolOp(BoolOp { op, values }), span)
    }

    /// `a < b < c` becomes one chained comparison
    fn extend_compare(
        left: Expression,
        op: CompareOperator,
        right: Expression,
        span: Span,
    ) -> Expression {
        let compare = match left.kind {
            ExpressionKind::Compare(mut existing) => {
                existing.ops.push(op);
                existing.comparators.push(right);
                existing
            }
            kind => Compare {
                left: Box::new(Expression::new(kind, left.span)),
                ops: vec![op],
                comparators: vec![right],
            },
        };
        Expression::new(ExpressionKind::Compare(compare), span)
    }

    fn parse_postfix_expr(pair: Pair<Rule>) -> ParseResult<Expression> {
        let span = Self::span_from_pair(&pair);
        let mut inner = pair.into_inner();
        let mut expr = Self::parse_atom(Self::next_pair(&mut inner, "atom", span)?)?;

        for trailer in inner {
            let end = trailer.as_span().end();
            let trailer_span = Self::span_from_pair(&trailer);
            let kind = match trailer.as_rule() {
                Rule::call => {
                    let mut args = Vec::new();
                    let mut keywords = Vec::new();
                    let mut generators = Vec::new();
                    let mut arguments_span = trailer_span;
                    if let Some(arguments) = trailer.into_inner().next() {
                        arguments_span = Self::span_from_pair(&arguments);
                        for arg in arguments.into_inner() {
                            match arg.as_rule() {
                                Rule::keyword_argument => keywords.push(Self::parse_keyword(arg)?),
                                Rule::double_starred => {
                                    let arg_span = Self::span_from_pair(&arg);
                                    let value = Self::next_pair(&mut arg.into_inner(), "mapping", arg_span)?;
                                    keywords.push(Keyword {
                                        arg: None,
                                        value: Self::parse_operation(value)?,
                                        span: arg_span,
                                    });
                                }
                                Rule::expression | Rule::starred => {
                                    args.push(Self::parse_expression(arg)?)
                                }
                                Rule::comp_for => generators.push(Self::parse_generator(arg)?),
                                _ => return Err(Self::unexpected("argument", &arg)),
                            }
                        }
                    }
                    // `f(x for x in y)` passes one generator
                    if !generators.is_empty() {
                        let generator = Self::comprehension(args, generators, arguments_span)?;
                        args = vec![Expression::new(
                            ExpressionKind::GeneratorExp(generator),
                            arguments_span,
                        )];
                    }
                    ExpressionKind::Call(Call {
                        func: Box::new(expr),
                        args,
                        keywords,
                    })
                }
                Rule::subscript => {
                    let trailing_comma = Self::has_rule(&trailer, Rule::trailing_comma);
                    let mut elts = Self::significant(trailer)
                        .map(Self::parse_subscript_item)
                        .collect::<ParseResult<Vec<_>>>()?;
                    let slice = if elts.len() == 1 && !trailing_comma {
                        elts.remove(0)
                    } else {
                        let start = elts.first().map_or(trailer_span.start, |e| e.span.start);
                        let stop = elts.last().map_or(trailer_span.end, |e| e.span.end);
                        Expression::new(
                            ExpressionKind::Tuple(TupleDisplay { elts }),
                            Self::span_from_range(start, stop),
                        )
                    };
                    ExpressionKind::Subscript(Subscript {
                        value: Box::new(expr),
                        slice: Box::new(slice),
                    })
                }
                Rule::attribute => {
                    let attr =
                        Self::next_pair(&mut trailer.into_inner(), "attribute name", trailer_span)?;
                    ExpressionKind::Attribute(Attribute {
                        value: Box::new(expr),
                        attr: attr.as_str().to_string(),
                    })
                }
                _ => return Err(Self::unexpected("call, subscript or attribute", &trailer)),
            };
            expr = Expression::new(kind, Self::span_from_range(span.start, end));
        }

        Ok(expr)
    }

    fn parse_keyword(pair: Pair<Rule>) -> ParseResult<Keyword> {
        let span = Self::span_from_pair(&pair);
        let mut inner = pair.into_inner();
        let arg = Self::next_pair(&mut inner, "keyword name", span)?
            .as_str()
            .to_string();
        let value = Self::parse_expression(Self::next_pair(&mut inner, "keyword value", span)?)?;
        Ok(Keyword {
            arg: Some(arg),
            value,
            span,
        })
    }

    /// An index expression or a `lower:upper:step` slice
    fn parse_subscript_item(pair: Pair<Rule>) -> ParseResult<Expression> {
        let span = Self::span_from_pair(&pair);
        let mut inner = pair.into_inner();
        let first = Self::next_pair(&mut inner, "index", span)?;
        let (lower, tail) = match first.as_rule() {
            Rule::slice_tail => (None, first),
            _ => {
                let index = Self::parse_expression(first)?;
                match inner.next() {
                    Some(tail) => (Some(Box::new(index)), tail),
                    None => return Ok(index),
                }
            }
        };

        let mut upper = None;
        let mut step = None;
        for bound in tail.into_inner() {
            let bound_span = Self::span_from_pair(&bound);
            let rule = bound.as_rule();
            let value = Self::next_pair(&mut bound.into_inner(), "slice bound", bound_span)?;
            let value = Some(Box::new(Self::parse_expression(value)?));
            match rule {
                Rule::slice_upper => upper = value,
                Rule::slice_step => step = value,
                _ => return Err(ParseError::malformed("slice bound without a position")),
            }
        }
        Ok(Expression::new(
            ExpressionKind::Slice(Slice { lower, upper, step }),
            span,
        ))
    }

    fn parse_atom(pair: Pair<Rule>) -> ParseResult<Expression> {
        let span = Self::span_from_pair(&pair);
        let kind = match pair.as_rule() {
            Rule::identifier => ExpressionKind::Name(Name {
                id: pair.as_str().to_string(),
            }),
            Rule::integer => ExpressionKind::Int(Self::parse_integer(pair)?),
            Rule::decimal => ExpressionKind::Decimal(DecimalLiteral {
                value: pair.as_str().to_string(),
            }),
            Rule::string => ExpressionKind::Str(Self::parse_string(pair)?),
            Rule::boolean_true => ExpressionKind::Bool(BooleanLiteral { value: true }),
            Rule::boolean_false => ExpressionKind::Bool(BooleanLiteral { value: false }),
            Rule::none_literal => ExpressionKind::NoneLiteral,
            Rule::paren_expr => {
                let trailing_comma = Self::has_rule(&pair, Rule::trailing_comma);
                let (mut elts, generators) = Self::parse_items(pair)?;
                if !generators.is_empty() {
                    ExpressionKind::GeneratorExp(Self::comprehension(elts, generators, span)?)
                } else if elts.len() == 1 && !trailing_comma {
                    return Ok(elts.remove(0));
                } else {
                    ExpressionKind::Tuple(TupleDisplay { elts })
                }
            }
            Rule::list_display => {
                let (elts, generators) = Self::parse_items(pair)?;
                if generators.is_empty() {
                    ExpressionKind::List(ListDisplay { elts })
                } else {
                    ExpressionKind::ListComp(Self::comprehension(elts, generators, span)?)
                }
            }
            Rule::set_display => {
                let (elts, generators) = Self::parse_items(pair)?;
                if generators.is_empty() {
                    ExpressionKind::Set(SetDisplay { elts })
                } else {
                    ExpressionKind::SetComp(Self::comprehension(elts, generators, span)?)
                }
            }
            Rule::dict_display => {
                let mut keys = Vec::new();
                let mut values = Vec::new();
                let mut generators = Vec::new();
                for entry in pair.into_inner() {
                    if entry.as_rule() == Rule::comp_for {
                        generators.push(Self::parse_generator(entry)?);
                        continue;
                    }
                    let entry_span = Self::span_from_pair(&entry);
                    let mut parts = entry.into_inner();
                    keys.push(Self::parse_expression(Self::next_pair(
                        &mut parts,
                        "dict key",
                        entry_span,
                    )?)?);
                    values.push(Self::parse_expression(Self::next_pair(
                        &mut parts,
                        "dict value",
                        entry_span,
                    )?)?);
                }
                if !generators.is_empty() {
                    let (Some(key), Some(value)) = (keys.pop(), values.pop()) else {
                        return Err(ParseError::malformed("dict comprehension without an entry"));
                    };
                    return Ok(Expression::new(
                        ExpressionKind::DictComp(DictComp {
                            key: Box::new(key),
                            value: Box::new(value),
                            generators,
                        }),
                        span,
                    ));
                }
                ExpressionKind::Dict(DictDisplay { keys, values })
            }
            _ => return Err(Self::unexpected("atom", &pair)),
        };
        Ok(Expression::new(kind, span))
    }
}
