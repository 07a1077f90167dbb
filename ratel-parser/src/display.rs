// Source regeneration
// Display impls that print a tree back to parseable source text

use std::fmt::{self, Display, Formatter, Write};

use num_traits::Signed;

use crate::ast::*;

const INDENT: &str = "    ";

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.body.iter().enumerate() {
            if i > 0 && (stmt.is_definition() || self.body[i - 1].is_definition()) {
                writeln!(f)?;
            }
            write_statement(f, stmt, 0)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_statement(f, self, 0)
    }
}

fn write_indent(f: &mut Formatter<'_>, level: usize) -> fmt::Result {
    for _ in 0..level {
        f.write_str(INDENT)?;
    }
    Ok(())
}

fn write_body(f: &mut Formatter<'_>, body: &[Statement], level: usize) -> fmt::Result {
    if body.is_empty() {
        writeln!(f)?;
        write_indent(f, level)?;
        return f.write_str("pass");
    }
    for stmt in body {
        writeln!(f)?;
        write_statement(f, stmt, level)?;
    }
    Ok(())
}

fn write_decorators(f: &mut Formatter<'_>, decorators: &[Expression], level: usize) -> fmt::Result {
    for decorator in decorators {
        write_indent(f, level)?;
        writeln!(f, "@{}", decorator)?;
    }
    Ok(())
}

fn write_statement(f: &mut Formatter<'_>, stmt: &Statement, level: usize) -> fmt::Result {
    match &stmt.kind {
        StatementKind::FunctionDef(def) => {
            write_decorators(f, &def.decorator_list, level)?;
            write_indent(f, level)?;
            if def.is_async {
                f.write_str("async ")?;
            }
            write!(f, "def {}(", def.name)?;
            for (i, param) in def.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", param)?;
            }
            f.write_char(')')?;
            if let Some(returns) = &def.returns {
                write!(f, " -> {}", returns)?;
            }
            f.write_char(':')?;
            write_body(f, &def.body, level + 1)
        }
        StatementKind::ClassDef(def) => {
            write_decorators(f, &def.decorator_list, level)?;
            write_indent(f, level)?;
            write!(f, "{} {}", def.kind.keyword(), def.name)?;
            if !def.bases.is_empty() {
                write!(f, "({})", comma_separated(&def.bases))?;
            }
            f.write_char(':')?;
            write_body(f, &def.body, level + 1)
        }
        StatementKind::If(if_stmt) => {
            write_indent(f, level)?;
            write_if(f, if_stmt, level)
        }
        StatementKind::For(for_stmt) => {
            write_indent(f, level)?;
            if for_stmt.is_async {
                f.write_str("async ")?;
            }
            write!(f, "for {} in {}:", Target(&for_stmt.target), for_stmt.iter)?;
            write_body(f, &for_stmt.body, level + 1)
        }
        StatementKind::Try(try_stmt) => {
            write_indent(f, level)?;
            f.write_str("try:")?;
            write_body(f, &try_stmt.body, level + 1)?;
            for handler in &try_stmt.handlers {
                writeln!(f)?;
                write_indent(f, level)?;
                f.write_str("except")?;
                if let Some(typ) = &handler.typ {
                    write!(f, " {}", typ)?;
                }
                if let Some(name) = &handler.name {
                    write!(f, " as {}", name)?;
                }
                f.write_char(':')?;
                write_body(f, &handler.body, level + 1)?;
            }
            if !try_stmt.orelse.is_empty() {
                writeln!(f)?;
                write_indent(f, level)?;
                f.write_str("else:")?;
                write_body(f, &try_stmt.orelse, level + 1)?;
            }
            if !try_stmt.finalbody.is_empty() || try_stmt.handlers.is_empty() {
                writeln!(f)?;
                write_indent(f, level)?;
                f.write_str("finally:")?;
                write_body(f, &try_stmt.finalbody, level + 1)?;
            }
            Ok(())
        }
        StatementKind::With(with) => {
            write_indent(f, level)?;
            if with.is_async {
                f.write_str("async ")?;
            }
            f.write_str("with ")?;
            for (i, item) in with.items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", item.context_expr)?;
                if let Some(vars) = &item.optional_vars {
                    write!(f, " as {}", vars)?;
                }
            }
            f.write_char(':')?;
            write_body(f, &with.body, level + 1)
        }
        StatementKind::While(while_stmt) => {
            write_indent(f, level)?;
            write!(f, "while {}:", while_stmt.test)?;
            write_body(f, &while_stmt.body, level + 1)
        }
        kind => {
            write_indent(f, level)?;
            write_simple_statement(f, kind)
        }
    }
}

fn write_if(f: &mut Formatter<'_>, if_stmt: &If, level: usize) -> fmt::Result {
    write!(f, "if {}:", if_stmt.test)?;
    write_body(f, &if_stmt.body, level + 1)?;
    match if_stmt.orelse.as_slice() {
        [] => Ok(()),
        [Statement {
            kind: StatementKind::If(elif),
            ..
        }] => {
            writeln!(f)?;
            write_indent(f, level)?;
            f.write_str("el")?;
            write_if(f, elif, level)
        }
        orelse => {
            writeln!(f)?;
            write_indent(f, level)?;
            f.write_str("else:")?;
            write_body(f, orelse, level + 1)
        }
    }
}

fn write_simple_statement(f: &mut Formatter<'_>, kind: &StatementKind) -> fmt::Result {
    match kind {
        StatementKind::Import(import) => {
            f.write_str("import ")?;
            write_aliases(f, &import.names)
        }
        StatementKind::ImportFrom(import) => {
            f.write_str("from ")?;
            for _ in 0..import.level {
                f.write_char('.')?;
            }
            write!(f, "{} import ", import.module)?;
            write_aliases(f, &import.names)
        }
        StatementKind::Assign(assign) => {
            for target in &assign.targets {
                write!(f, "{} = ", ExpressionList(target))?;
            }
            write!(f, "{}", ExpressionList(&assign.value))
        }
        StatementKind::AugAssign(assign) => {
            write!(
                f,
                "{} {}= {}",
                assign.target,
                assign.op.symbol(),
                ExpressionList(&assign.value)
            )
        }
        StatementKind::AnnAssign(assign) => {
            write!(f, "{}: {}", assign.target, assign.annotation)?;
            if let Some(value) = &assign.value {
                write!(f, " = {}", value)?;
            }
            Ok(())
        }
        StatementKind::Return(ret) => match &ret.value {
            Some(value) => write!(f, "return {}", ExpressionList(value)),
            None => f.write_str("return"),
        },
        StatementKind::Assert(assert) => {
            write!(f, "assert {}", assert.test)?;
            if let Some(msg) = &assert.msg {
                write!(f, ", {}", msg)?;
            }
            Ok(())
        }
        StatementKind::Raise(raise) => match &raise.exc {
            Some(exc) => write!(f, "raise {}", exc),
            None => f.write_str("raise"),
        },
        StatementKind::Delete(delete) => write!(f, "del {}", comma_separated(&delete.targets)),
        StatementKind::Global(global) => write!(f, "global {}", global.names.join(", ")),
        StatementKind::Nonlocal(nonlocal) => write!(f, "nonlocal {}", nonlocal.names.join(", ")),
        StatementKind::Pass => f.write_str("pass"),
        StatementKind::Break => f.write_str("break"),
        StatementKind::Continue => f.write_str("continue"),
        StatementKind::Expr(expr) => write!(f, "{}", expr.value),
        StatementKind::FunctionDef(_)
        | StatementKind::ClassDef(_)
        | StatementKind::If(_)
        | StatementKind::For(_)
        | StatementKind::While(_)
        | StatementKind::Try(_)
        | StatementKind::With(_) => Err(fmt::Error),
    }
}

fn write_aliases(f: &mut Formatter<'_>, names: &[Alias]) -> fmt::Result {
    for (i, alias) in names.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(&alias.name)?;
        if let Some(asname) = &alias.asname {
            write!(f, " as {}", asname)?;
        }
    }
    Ok(())
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.arg)?;
        if let Some(annotation) = &self.annotation {
            write!(f, ": {}", annotation)?;
        }
        if let Some(default) = &self.default {
            match self.annotation {
                Some(_) => write!(f, " = {}", default)?,
                None => write!(f, "={}", default)?,
            }
        }
        Ok(())
    }
}

/// Tuples in statement position print without their parentheses
struct ExpressionList<'a>(&'a Expression);

impl Display for ExpressionList<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            ExpressionKind::Tuple(tuple) if tuple.elts.len() == 1 => write!(f, "{},", tuple.elts[0]),
            ExpressionKind::Tuple(tuple) if !tuple.elts.is_empty() => {
                f.write_str(&comma_separated(&tuple.elts))
            }
            _ => write!(f, "{}", self.0),
        }
    }
}

/// Loop targets print their names without tuple parentheses
struct Target<'a>(&'a Expression);

impl Display for Target<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            ExpressionKind::Tuple(tuple) if !tuple.elts.is_empty() => {
                f.write_str(&comma_separated(&tuple.elts))
            }
            _ => write!(f, "{}", self.0),
        }
    }
}

fn write_generators(f: &mut Formatter<'_>, generators: &[Generator]) -> fmt::Result {
    for generator in generators {
        if generator.is_async {
            f.write_str(" async")?;
        }
        write!(
            f,
            " for {} in {}",
            Target(&generator.target),
            operand(&generator.iter, PREC_OR)
        )?;
        for cond in &generator.ifs {
            write!(f, " if {}", operand(cond, PREC_OR))?;
        }
    }
    Ok(())
}

fn write_slice_bound(f: &mut Formatter<'_>, bound: &Option<Box<Expression>>) -> fmt::Result {
    match bound {
        Some(bound) => write!(f, "{}", bound),
        None => Ok(()),
    }
}

fn comma_separated(exprs: &[Expression]) -> String {
    exprs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// Binding strength, higher binds tighter
const PREC_LAMBDA: u8 = 1;
const PREC_IF_EXP: u8 = 2;
const PREC_OR: u8 = 3;
const PREC_AND: u8 = 4;
const PREC_NOT: u8 = 5;
const PREC_COMPARE: u8 = 6;
const PREC_UNARY: u8 = 13;
const PREC_POW: u8 = 14;
const PREC_AWAIT: u8 = 15;
const PREC_ATOM: u8 = 16;

fn binary_precedence(op: BinaryOperator) -> u8 {
    match op {
        BinaryOperator::BitOr => 7,
        BinaryOperator::BitXor => 8,
        BinaryOperator::BitAnd => 9,
        BinaryOperator::LShift | BinaryOperator::RShift => 10,
        BinaryOperator::Add | BinaryOperator::Sub => 11,
        BinaryOperator::Mult | BinaryOperator::Div | BinaryOperator::FloorDiv | BinaryOperator::Mod => 12,
        BinaryOperator::Pow => PREC_POW,
    }
}

fn precedence(expr: &Expression) -> u8 {
    match &expr.kind {
        ExpressionKind::BoolOp(op) => match op.op {
            BoolOperator::Or => PREC_OR,
            BoolOperator::And => PREC_AND,
        },
        ExpressionKind::UnaryOp(op) if op.op == UnaryOperator::Not => PREC_NOT,
        ExpressionKind::UnaryOp(_) => PREC_UNARY,
        ExpressionKind::Compare(_) => PREC_COMPARE,
        ExpressionKind::BinOp(op) => binary_precedence(op.op),
        ExpressionKind::Await(_) => PREC_AWAIT,
        ExpressionKind::IfExp(_) => PREC_IF_EXP,
        ExpressionKind::Lambda(_) => PREC_LAMBDA,
        ExpressionKind::Int(int) if int.value.is_negative() => PREC_UNARY,
        _ => PREC_ATOM,
    }
}

/// Operand that needs parentheses when weaker than `min`
struct Operand<'a> {
    expr: &'a Expression,
    min: u8,
}

impl Display for Operand<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if precedence(self.expr) < self.min {
            write!(f, "({})", self.expr)
        } else {
            write!(f, "{}", self.expr)
        }
    }
}

fn operand(expr: &Expression, min: u8) -> Operand<'_> {
    Operand { expr, min }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExpressionKind::Name(name) => f.write_str(&name.id),
            ExpressionKind::Int(int) => write!(f, "{}", int),
            ExpressionKind::Decimal(decimal) => f.write_str(&decimal.value),
            ExpressionKind::Str(string) => {
                let quote = string.quote.delimiter();
                write!(f, "{}{}{}{}", string.prefix, quote, string.value, quote)
            }
            ExpressionKind::Bool(boolean) => {
                f.write_str(if boolean.value { "True" } else { "False" })
            }
            ExpressionKind::NoneLiteral => f.write_str("None"),
            ExpressionKind::List(list) => write!(f, "[{}]", comma_separated(&list.elts)),
            ExpressionKind::Tuple(tuple) => match tuple.elts.as_slice() {
                [single] => write!(f, "({},)", single),
                elts => write!(f, "({})", comma_separated(elts)),
            },
            ExpressionKind::Set(set) => write!(f, "{{{}}}", comma_separated(&set.elts)),
            ExpressionKind::ListComp(comp) => {
                write!(f, "[{}", comp.elt)?;
                write_generators(f, &comp.generators)?;
                f.write_char(']')
            }
            ExpressionKind::SetComp(comp) => {
                write!(f, "{{{}", comp.elt)?;
                write_generators(f, &comp.generators)?;
                f.write_char('}')
            }
            ExpressionKind::GeneratorExp(comp) => {
                write!(f, "({}", comp.elt)?;
                write_generators(f, &comp.generators)?;
                f.write_char(')')
            }
            ExpressionKind::DictComp(comp) => {
                write!(f, "{{{}: {}", comp.key, comp.value)?;
                write_generators(f, &comp.generators)?;
                f.write_char('}')
            }
            ExpressionKind::Dict(dict) => {
                f.write_char('{')?;
                for (i, (key, value)) in dict.keys.iter().zip(&dict.values).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_char('}')
            }
            ExpressionKind::Attribute(attr) => {
                write!(f, "{}.{}", operand(&attr.value, PREC_ATOM), attr.attr)
            }
            ExpressionKind::Subscript(sub) => {
                write!(f, "{}[", operand(&sub.value, PREC_ATOM))?;
                match &sub.slice.kind {
                    ExpressionKind::Tuple(tuple) if tuple.elts.len() == 1 => {
                        write!(f, "{},", tuple.elts[0])?
                    }
                    ExpressionKind::Tuple(tuple) if !tuple.elts.is_empty() => {
                        write!(f, "{}", comma_separated(&tuple.elts))?
                    }
                    _ => write!(f, "{}", sub.slice)?,
                }
                f.write_char(']')
            }
            ExpressionKind::Call(call) => {
                if let ([generator], true) = (call.args.as_slice(), call.keywords.is_empty()) {
                    if let ExpressionKind::GeneratorExp(comp) = &generator.kind {
                        write!(f, "{}({}", operand(&call.func, PREC_ATOM), comp.elt)?;
                        write_generators(f, &comp.generators)?;
                        return f.write_char(')');
                    }
                }
                write!(f, "{}(", operand(&call.func, PREC_ATOM))?;
                let mut first = true;
                for arg in &call.args {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{}", arg)?;
                }
                for keyword in &call.keywords {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    match &keyword.arg {
                        Some(arg) => write!(f, "{}={}", arg, keyword.value)?,
                        None => write!(f, "**{}", operand(&keyword.value, PREC_ATOM))?,
                    }
                }
                f.write_char(')')
            }
            ExpressionKind::BinOp(op) => {
                let prec = binary_precedence(op.op);
                let (left_min, right_min) = if op.op == BinaryOperator::Pow {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                write!(
                    f,
                    "{} {} {}",
                    operand(&op.left, left_min),
                    op.op.symbol(),
                    operand(&op.right, right_min)
                )
            }
            ExpressionKind::UnaryOp(op) => match op.op {
                UnaryOperator::Not => write!(f, "not {}", operand(&op.operand, PREC_NOT)),
                UnaryOperator::USub => write!(f, "-{}", operand(&op.operand, PREC_UNARY)),
                UnaryOperator::UAdd => write!(f, "+{}", operand(&op.operand, PREC_UNARY)),
                UnaryOperator::Invert => write!(f, "~{}", operand(&op.operand, PREC_UNARY)),
            },
            ExpressionKind::BoolOp(op) => {
                let (prec, word) = match op.op {
                    BoolOperator::Or => (PREC_OR, " or "),
                    BoolOperator::And => (PREC_AND, " and "),
                };
                for (i, value) in op.values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(word)?;
                    }
                    write!(f, "{}", operand(value, prec + 1))?;
                }
                Ok(())
            }
            ExpressionKind::Compare(cmp) => {
                write!(f, "{}", operand(&cmp.left, PREC_COMPARE + 1))?;
                for (op, comparator) in cmp.ops.iter().zip(&cmp.comparators) {
                    write!(f, " {} {}", op.symbol(), operand(comparator, PREC_COMPARE + 1))?;
                }
                Ok(())
            }
            ExpressionKind::Await(await_expr) => {
                write!(f, "await {}", operand(&await_expr.value, PREC_AWAIT))
            }
            ExpressionKind::IfExp(if_exp) => write!(
                f,
                "{} if {} else {}",
                operand(&if_exp.body, PREC_OR),
                operand(&if_exp.test, PREC_OR),
                if_exp.orelse
            ),
            ExpressionKind::Lambda(lambda) => {
                f.write_str("lambda")?;
                for (i, param) in lambda.args.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { ", " })?;
                    write!(f, "{}", param)?;
                }
                write!(f, ": {}", lambda.body)
            }
            ExpressionKind::Slice(slice) => {
                write_slice_bound(f, &slice.lower)?;
                f.write_char(':')?;
                write_slice_bound(f, &slice.upper)?;
                if slice.step.is_some() {
                    f.write_char(':')?;
                    write_slice_bound(f, &slice.step)?;
                }
                Ok(())
            }
            ExpressionKind::Starred(starred) => {
                write!(f, "*{}", operand(&starred.value, PREC_ATOM))
            }
        }
    }
}

impl Display for IntegerLiteral {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.value.is_negative() {
            return write!(f, "{}", self.value);
        }
        match self.format {
            IntegerFormat::Decimal => write!(f, "{}", self.value),
            IntegerFormat::Hexadecimal => write!(f, "0x{:x}", self.value),
            IntegerFormat::Binary => write!(f, "0b{:b}", self.value),
            IntegerFormat::Octal => write!(f, "0o{:o}", self.value),
        }
    }
}
