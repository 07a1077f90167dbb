// Statement parsing
// Definitions, control flow, imports and assignments

use pest::iterators::Pair;

use super::{RatelParser, Rule};
use crate::ast::*;
use crate::error::*;

impl RatelParser {
    /// One logical line; `a = 1; b = 2` yields two statements
    pub(crate) fn parse_statements(pair: Pair<Rule>) -> ParseResult<Vec<Statement>> {
        let span = Self::span_from_pair(&pair);
        let statements = pair
            .into_inner()
            .map(Self::parse_statement_kind)
            .collect::<ParseResult<Vec<_>>>()?;
        if statements.is_empty() {
            return Err(ParseError::MissingPair {
                expected: "statement body".to_string(),
                span,
            });
        }
        Ok(statements)
    }

    fn parse_statement_kind(pair: Pair<Rule>) -> ParseResult<Statement> {
        let span = Self::span_from_pair(&pair);
        let kind = match pair.as_rule() {
            Rule::decorated => return Self::parse_decorated(pair),
            Rule::function_def => StatementKind::FunctionDef(Self::parse_function_def(pair)?),
            Rule::class_def => StatementKind::ClassDef(Self::parse_class_def(pair)?),
            Rule::if_statement => StatementKind::If(Self::parse_if(pair)?),
            Rule::try_statement => StatementKind::Try(Self::parse_try(pair)?),
            Rule::with_statement => StatementKind::With(Self::parse_with(pair)?),
            Rule::for_statement => StatementKind::For(Self::parse_for(pair)?),
            Rule::while_statement => {
                let mut inner = Self::significant(pair);
                let test = Self::parse_expression(Self::next_pair(&mut inner, "condition", span)?)?;
                let body = Self::parse_suite(Self::next_pair(&mut inner, "loop body", span)?)?;
                StatementKind::While(While { test, body })
            }
            Rule::pass_statement => StatementKind::Pass,
            Rule::break_statement => StatementKind::Break,
            Rule::continue_statement => StatementKind::Continue,
            Rule::return_statement => {
                let value = Self::significant(pair)
                    .next()
                    .map(Self::parse_expression_list)
                    .transpose()?;
                StatementKind::Return(Return { value })
            }
            Rule::raise_statement => {
                let exc = Self::significant(pair)
                    .next()
                    .map(Self::parse_expression)
                    .transpose()?;
                StatementKind::Raise(Raise { exc })
            }
            Rule::assert_statement => {
                let mut inner = Self::significant(pair);
                let test = Self::parse_expression(Self::next_pair(&mut inner, "assertion", span)?)?;
                let msg = inner.next().map(Self::parse_expression).transpose()?;
                StatementKind::Assert(Assert { test, msg })
            }
            Rule::del_statement => StatementKind::Delete(Delete {
                targets: Self::significant(pair)
                    .map(Self::parse_expression)
                    .collect::<ParseResult<Vec<_>>>()?,
            }),
            Rule::global_statement => StatementKind::Global(Global {
                names: Self::significant(pair).map(|p| p.as_str().to_string()).collect(),
            }),
            Rule::nonlocal_statement => StatementKind::Nonlocal(Nonlocal {
                names: Self::significant(pair).map(|p| p.as_str().to_string()).collect(),
            }),
            Rule::import_statement => {
                let names = Self::significant(pair)
                    .map(Self::parse_alias)
                    .collect::<ParseResult<Vec<_>>>()?;
                StatementKind::Import(Import { names })
            }
            Rule::import_from_statement => {
                let mut inner = Self::significant(pair);
                let source = Self::next_pair(&mut inner, "module path", span)?;
                let (module, level) = match source.as_rule() {
                    Rule::relative_module => {
                        let mut parts = source.into_inner();
                        let dots = Self::next_pair(&mut parts, "relative import dots", span)?;
                        let level = u32::try_from(dots.as_str().len())
                            .map_err(|_| Self::unexpected("relative import dots", &dots))?;
                        let module = parts.next().map_or_else(String::new, |p| p.as_str().to_string());
                        (module, level)
                    }
                    _ => (source.as_str().to_string(), 0),
                };
                let names = inner.map(Self::parse_alias).collect::<ParseResult<Vec<_>>>()?;
                StatementKind::ImportFrom(ImportFrom {
                    module,
                    names,
                    level,
                })
            }
            Rule::ann_assign_statement => {
                let mut inner = Self::significant(pair);
                let target = Self::parse_expression(Self::next_pair(&mut inner, "target", span)?)?;
                let annotation =
                    Self::parse_expression(Self::next_pair(&mut inner, "annotation", span)?)?;
                let value = inner.next().map(Self::parse_expression).transpose()?;
                StatementKind::AnnAssign(AnnAssign {
                    target,
                    annotation,
                    value,
                })
            }
            Rule::aug_assign_statement => {
                let mut inner = Self::significant(pair);
                let target = Self::parse_expression(Self::next_pair(&mut inner, "target", span)?)?;
                let op_pair = Self::next_pair(&mut inner, "augmented operator", span)?;
                let op = BinaryOperator::from_augmented(op_pair.as_str())
                    .ok_or_else(|| Self::unexpected("augmented operator", &op_pair))?;
                let value =
                    Self::parse_expression_list(Self::next_pair(&mut inner, "value", span)?)?;
                StatementKind::AugAssign(AugAssign { target, op, value })
            }
            Rule::assign_statement => {
                let mut parts = Self::significant(pair)
                    .map(Self::parse_expression_list)
                    .collect::<ParseResult<Vec<_>>>()?;
                let value = parts.pop().ok_or_else(|| ParseError::MissingPair {
                    expected: "assigned value".to_string(),
                    span,
                })?;
                StatementKind::Assign(Assign {
                    targets: parts,
                    value,
                })
            }
            Rule::expression_statement => {
                let inner = Self::next_pair(&mut pair.into_inner(), "expression", span)?;
                StatementKind::Expr(ExprStatement {
                    value: Self::parse_expression_list(inner)?,
                })
            }
            _ => return Err(Self::unexpected("statement", &pair)),
        };
        Ok(Statement::new(kind, span))
    }

    /// A `suite` is either an indented block or inline simple statements
    pub(crate) fn parse_suite(pair: Pair<Rule>) -> ParseResult<Vec<Statement>> {
        let span = Self::span_from_pair(&pair);
        let mut inner = pair.into_inner();
        let first = Self::next_pair(&mut inner, "suite", span)?;
        match first.as_rule() {
            Rule::block => {
                let mut body = Vec::new();
                for stmt in first.into_inner().filter(|p| p.as_rule() == Rule::statement) {
                    body.extend(Self::parse_statements(stmt)?);
                }
                Ok(body)
            }
            _ => std::iter::once(first)
                .chain(inner)
                .map(Self::parse_statement_kind)
                .collect(),
        }
    }

    fn parse_decorated(pair: Pair<Rule>) -> ParseResult<Statement> {
        let mut decorators = Vec::new();
        for child in Self::significant(pair) {
            match child.as_rule() {
                Rule::decorator => {
                    let span = Self::span_from_pair(&child);
                    let expr = Self::next_pair(&mut Self::significant(child), "decorator", span)?;
                    decorators.push(Self::parse_expression(expr)?);
                }
                Rule::function_def => {
                    let span = Self::span_from_pair(&child);
                    let mut def = Self::parse_function_def(child)?;
                    def.decorator_list = decorators;
                    return Ok(Statement::new(StatementKind::FunctionDef(def), span));
                }
                Rule::class_def => {
                    let span = Self::span_from_pair(&child);
                    let mut def = Self::parse_class_def(child)?;
                    def.decorator_list = decorators;
                    return Ok(Statement::new(StatementKind::ClassDef(def), span));
                }
                _ => return Err(Self::unexpected("decorator or definition", &child)),
            }
        }
        Err(ParseError::malformed("decorators without a definition"))
    }

    fn parse_function_def(pair: Pair<Rule>) -> ParseResult<FunctionDef> {
        let span = Self::span_from_pair(&pair);
        let is_async = Self::has_rule(&pair, Rule::kw_async);
        let mut name = None;
        let mut args = Vec::new();
        let mut returns = None;
        let mut body = None;

        for child in Self::significant(pair) {
            match child.as_rule() {
                Rule::identifier => name = Some(child.as_str().to_string()),
                Rule::parameters => {
                    args = Self::significant(child)
                        .map(Self::parse_parameter)
                        .collect::<ParseResult<Vec<_>>>()?;
                }
                Rule::return_annotation => {
                    let span = Self::span_from_pair(&child);
                    let expr = Self::next_pair(&mut child.into_inner(), "return type", span)?;
                    returns = Some(Box::new(Self::parse_expression(expr)?));
                }
                Rule::suite => body = Some(Self::parse_suite(child)?),
                _ => return Err(Self::unexpected("function definition part", &child)),
            }
        }

        Ok(FunctionDef {
            name: name.ok_or_else(|| ParseError::MissingPair {
                expected: "function name".to_string(),
                span,
            })?,
            args,
            returns,
            decorator_list: Vec::new(),
            body: body.ok_or_else(|| ParseError::MissingPair {
                expected: "function body".to_string(),
                span,
            })?,
            is_async,
        })
    }

    pub(super) fn parse_parameter(pair: Pair<Rule>) -> ParseResult<Parameter> {
        let span = Self::span_from_pair(&pair);
        let mut inner = pair.into_inner().peekable();
        let kind = match inner.next_if(|p| p.as_rule() == Rule::param_star) {
            Some(star) if star.as_str() == "**" => ParameterKind::VarKeyword,
            Some(_) => ParameterKind::VarPositional,
            None => ParameterKind::Positional,
        };
        let arg = Self::next_pair(&mut inner, "parameter name", span)?
            .as_str()
            .to_string();
        let mut annotation = None;
        let mut default = None;
        for child in inner {
            let child_span = Self::span_from_pair(&child);
            let rule = child.as_rule();
            let expr = Self::next_pair(&mut child.into_inner(), "parameter detail", child_span)?;
            match rule {
                Rule::param_annotation => annotation = Some(Self::parse_expression(expr)?),
                Rule::param_default => default = Some(Self::parse_expression(expr)?),
                _ => return Err(Self::unexpected("parameter annotation or default", &expr)),
            }
        }
        Ok(Parameter {
            arg,
            annotation,
            default,
            kind,
            span,
        })
    }

    fn parse_class_def(pair: Pair<Rule>) -> ParseResult<ClassDef> {
        let span = Self::span_from_pair(&pair);
        let mut inner = Self::significant(pair);
        let name = Self::next_pair(&mut inner, "class name", span)?
            .as_str()
            .to_string();
        let mut bases = Vec::new();
        let mut body = Vec::new();
        for child in inner {
            match child.as_rule() {
                Rule::class_bases => {
                    if let Some(arguments) = child.into_inner().next() {
                        for arg in arguments.into_inner() {
                            match arg.as_rule() {
                                Rule::expression => bases.push(Self::parse_expression(arg)?),
                                _ => return Err(Self::unexpected("base class", &arg)),
                            }
                        }
                    }
                }
                Rule::suite => body = Self::parse_suite(child)?,
                _ => return Err(Self::unexpected("class definition part", &child)),
            }
        }
        Ok(ClassDef {
            name,
            kind: ClassKind::Class,
            bases,
            decorator_list: Vec::new(),
            body,
        })
    }

    fn parse_if(pair: Pair<Rule>) -> ParseResult<If> {
        let span = Self::span_from_pair(&pair);
        let mut inner = Self::significant(pair);
        let test = Self::parse_expression(Self::next_pair(&mut inner, "condition", span)?)?;
        let body = Self::parse_suite(Self::next_pair(&mut inner, "if body", span)?)?;

        let mut elifs = Vec::new();
        let mut orelse = Vec::new();
        for clause in inner {
            let clause_span = Self::span_from_pair(&clause);
            match clause.as_rule() {
                Rule::elif_clause => {
                    let mut parts = Self::significant(clause);
                    let test =
                        Self::parse_expression(Self::next_pair(&mut parts, "condition", clause_span)?)?;
                    let body = Self::parse_suite(Self::next_pair(&mut parts, "elif body", clause_span)?)?;
                    elifs.push((test, body, clause_span));
                }
                Rule::else_clause => {
                    let suite = Self::next_pair(&mut Self::significant(clause), "else body", clause_span)?;
                    orelse = Self::parse_suite(suite)?;
                }
                _ => return Err(Self::unexpected("elif or else clause", &clause)),
            }
        }

        for (test, body, clause_span) in elifs.into_iter().rev() {
            let nested = If { test, body, orelse };
            orelse = vec![Statement::new(StatementKind::If(nested), clause_span)];
        }

        Ok(If { test, body, orelse })
    }

    fn parse_for(pair: Pair<Rule>) -> ParseResult<For> {
        let span = Self::span_from_pair(&pair);
        let is_async = Self::has_rule(&pair, Rule::kw_async);
        let mut inner = Self::significant(pair);
        let target = Self::parse_for_target(Self::next_pair(&mut inner, "loop target", span)?);
        let iter = Self::parse_expression(Self::next_pair(&mut inner, "iterable", span)?)?;
        let body = Self::parse_suite(Self::next_pair(&mut inner, "loop body", span)?)?;
        Ok(For {
            target,
            iter,
            body,
            is_async,
        })
    }

    /// Loop names; several names form a tuple target
    pub(super) fn parse_for_target(pair: Pair<Rule>) -> Expression {
        let target_span = Self::span_from_pair(&pair);
        let mut names: Vec<Expression> = pair
            .into_inner()
            .map(|ident| {
                Expression::new(
                    ExpressionKind::Name(Name {
                        id: ident.as_str().to_string(),
                    }),
                    Self::span_from_pair(&ident),
                )
            })
            .collect();
        if names.len() == 1 {
            names.remove(0)
        } else {
            Expression::new(ExpressionKind::Tuple(TupleDisplay { elts: names }), target_span)
        }
    }

    fn parse_try(pair: Pair<Rule>) -> ParseResult<Try> {
        let span = Self::span_from_pair(&pair);
        let mut inner = Self::significant(pair);
        let body = Self::parse_suite(Self::next_pair(&mut inner, "try body", span)?)?;

        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();
        for clause in inner {
            let clause_span = Self::span_from_pair(&clause);
            match clause.as_rule() {
                Rule::except_clause => handlers.push(Self::parse_except(clause)?),
                Rule::try_else => {
                    let suite = Self::next_pair(&mut Self::significant(clause), "else body", clause_span)?;
                    orelse = Self::parse_suite(suite)?;
                }
                Rule::try_finally => {
                    let suite =
                        Self::next_pair(&mut Self::significant(clause), "finally body", clause_span)?;
                    finalbody = Self::parse_suite(suite)?;
                }
                _ => return Err(Self::unexpected("except, else or finally clause", &clause)),
            }
        }

        Ok(Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    fn parse_except(pair: Pair<Rule>) -> ParseResult<ExceptHandler> {
        // the clause starts at the line break before `except`
        let clause_span = Self::span_from_pair(&pair);
        let start = pair
            .clone()
            .into_inner()
            .find(|p| p.as_rule() == Rule::kw_except)
            .map_or(clause_span.start, |kw| kw.as_span().start());
        let span = Self::span_from_range(start, clause_span.end);

        let mut typ = None;
        let mut name = None;
        let mut body = None;
        for child in Self::significant(pair) {
            match child.as_rule() {
                Rule::expression => typ = Some(Self::parse_expression(child)?),
                Rule::identifier => name = Some(child.as_str().to_string()),
                Rule::suite => body = Some(Self::parse_suite(child)?),
                _ => return Err(Self::unexpected("exception type, name or body", &child)),
            }
        }

        Ok(ExceptHandler {
            typ,
            name,
            body: body.ok_or_else(|| ParseError::MissingPair {
                expected: "except body".to_string(),
                span,
            })?,
            span,
        })
    }

    fn parse_with(pair: Pair<Rule>) -> ParseResult<With> {
        let span = Self::span_from_pair(&pair);
        let is_async = Self::has_rule(&pair, Rule::kw_async);
        let mut items = Vec::new();
        let mut body = None;
        for child in Self::significant(pair) {
            match child.as_rule() {
                Rule::with_item => {
                    let item_span = Self::span_from_pair(&child);
                    let mut parts = Self::significant(child);
                    let context_expr =
                        Self::parse_expression(Self::next_pair(&mut parts, "context manager", item_span)?)?;
                    let optional_vars = parts.next().map(Self::parse_expression).transpose()?;
                    items.push(WithItem {
                        context_expr,
                        optional_vars,
                    });
                }
                Rule::suite => body = Some(Self::parse_suite(child)?),
                _ => return Err(Self::unexpected("context manager or body", &child)),
            }
        }

        Ok(With {
            items,
            body: body.ok_or_else(|| ParseError::MissingPair {
                expected: "with body".to_string(),
                span,
            })?,
            is_async,
        })
    }

    fn parse_alias(pair: Pair<Rule>) -> ParseResult<Alias> {
        if pair.as_rule() == Rule::import_star {
            return Ok(Alias {
                name: "*".to_string(),
                asname: None,
            });
        }
        let span = Self::span_from_pair(&pair);
        let mut inner = Self::significant(pair);
        let name = Self::next_pair(&mut inner, "imported name", span)?
            .as_str()
            .to_string();
        let asname = inner.next().map(|p| p.as_str().to_string());
        Ok(Alias { name, asname })
    }
}
