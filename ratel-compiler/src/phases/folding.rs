//! Constant folding
//!
//! Works on a deep copy of the parsed module. Names of `constant(...)`
//! declarations are replaced by their folded values, then literal
//! arithmetic, comparisons and boolean logic are evaluated. Assignment
//! targets and type annotations are left alone.

use crate::error::{label, CompileResult, CompilerError};
use crate::types::unwrap_call;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use ratel_parser::{
    BinaryOperator, BoolOperator, CompareOperator, Expression, ExpressionKind, IntegerFormat,
    IntegerLiteral, Module, Span, Statement, StatementKind, UnaryOperator,
};

lazy_static! {
    static ref WORD_MAX: BigInt = (BigInt::one() << 256usize) - 1;
    static ref WORD_MIN: BigInt = -(BigInt::one() << 255usize);
}

/// Largest shift or exponent that can still produce an in-range value
const MAX_BITS: u32 = 256;

pub fn fold_module(module: &Module) -> CompileResult<Module> {
    let mut folded = module.clone();
    let mut folder = Folder::default();

    for stmt in &mut folded.body {
        let StatementKind::AnnAssign(assign) = &mut stmt.kind else {
            continue;
        };
        if unwrap_call(&assign.annotation, "constant").is_none() {
            continue;
        }
        if let (Some(name), Some(value)) = (assign.target.as_name(), assign.value.as_mut()) {
            folder.fold_expression(value)?;
            folder.constants.insert(name.to_string(), value.clone());
        }
    }

    folder.fold_body(&mut folded.body)?;
    Ok(folded)
}

#[derive(Default)]
struct Folder {
    constants: IndexMap<String, Expression>,
}

impl Folder {
    fn fold_body(&self, body: &mut [Statement]) -> CompileResult<()> {
        for stmt in body {
            self.fold_statement(stmt)?;
        }
        Ok(())
    }

    fn fold_statement(&self, stmt: &mut Statement) -> CompileResult<()> {
        match &mut stmt.kind {
            StatementKind::FunctionDef(def) => {
                for param in &mut def.args {
                    if let Some(default) = &mut param.default {
                        self.fold_expression(default)?;
                    }
                }
                self.fold_body(&mut def.body)
            }
            StatementKind::ClassDef(_)
            | StatementKind::Import(_)
            | StatementKind::ImportFrom(_)
            | StatementKind::Global(_)
            | StatementKind::Nonlocal(_)
            | StatementKind::Pass
            | StatementKind::Break
            | StatementKind::Continue => Ok(()),
            // code generation rejects these; their bodies are left as written
            StatementKind::Try(_) | StatementKind::With(_) | StatementKind::Delete(_) => Ok(()),
            StatementKind::Assign(assign) => {
                for target in &mut assign.targets {
                    self.fold_target(target)?;
                }
                self.fold_expression(&mut assign.value)
            }
            StatementKind::AugAssign(assign) => {
                self.fold_target(&mut assign.target)?;
                self.fold_expression(&mut assign.value)
            }
            StatementKind::AnnAssign(assign) => {
                self.fold_target(&mut assign.target)?;
                match &mut assign.value {
                    Some(value) => self.fold_expression(value),
                    None => Ok(()),
                }
            }
            StatementKind::Return(ret) => match &mut ret.value {
                Some(value) => self.fold_expression(value),
                None => Ok(()),
            },
            StatementKind::If(if_stmt) => {
                self.fold_expression(&mut if_stmt.test)?;
                self.fold_body(&mut if_stmt.body)?;
                self.fold_body(&mut if_stmt.orelse)
            }
            StatementKind::For(for_stmt) => {
                self.fold_expression(&mut for_stmt.iter)?;
                self.fold_body(&mut for_stmt.body)
            }
            StatementKind::While(while_stmt) => {
                self.fold_expression(&mut while_stmt.test)?;
                self.fold_body(&mut while_stmt.body)
            }
            StatementKind::Assert(assert) => {
                self.fold_expression(&mut assert.test)?;
                match &mut assert.msg {
                    Some(msg) => self.fold_expression(msg),
                    None => Ok(()),
                }
            }
            StatementKind::Raise(raise) => match &mut raise.exc {
                Some(exc) => self.fold_expression(exc),
                None => Ok(()),
            },
            StatementKind::Expr(expr) => self.fold_expression(&mut expr.value),
        }
    }

    /// Targets keep their root names; only index expressions are folded
    fn fold_target(&self, target: &mut Expression) -> CompileResult<()> {
        match &mut target.kind {
            ExpressionKind::Name(_) => Ok(()),
            ExpressionKind::Attribute(attr) => self.fold_target(&mut attr.value),
            ExpressionKind::Subscript(subscript) => {
                self.fold_target(&mut subscript.value)?;
                self.fold_expression(&mut subscript.slice)
            }
            ExpressionKind::Tuple(tuple) => {
                for elt in &mut tuple.elts {
                    self.fold_target(elt)?;
                }
                Ok(())
            }
            _ => self.fold_expression(target),
        }
    }

    fn fold_expression(&self, expr: &mut Expression) -> CompileResult<()> {
        let span = expr.span;
        match &mut expr.kind {
            ExpressionKind::Name(name) => {
                if let Some(value) = self.constants.get(&name.id) {
                    *expr = Expression::new(value.kind.clone(), span);
                }
                return Ok(());
            }
            ExpressionKind::Int(int) => return check_range(&int.value, &span),
            ExpressionKind::Decimal(_)
            | ExpressionKind::Str(_)
            | ExpressionKind::Bool(_)
            | ExpressionKind::NoneLiteral => return Ok(()),
            ExpressionKind::List(list) => {
                for elt in &mut list.elts {
                    self.fold_expression(elt)?;
                }
                return Ok(());
            }
            ExpressionKind::Tuple(tuple) => {
                for elt in &mut tuple.elts {
                    self.fold_expression(elt)?;
                }
                return Ok(());
            }
            ExpressionKind::Dict(dict) => {
                for value in dict.keys.iter_mut().chain(dict.values.iter_mut()) {
                    self.fold_expression(value)?;
                }
                return Ok(());
            }
            ExpressionKind::Attribute(attr) => return self.fold_target(&mut attr.value),
            ExpressionKind::Subscript(subscript) => {
                self.fold_expression(&mut subscript.value)?;
                return self.fold_expression(&mut subscript.slice);
            }
            ExpressionKind::Call(call) => {
                if call.func.as_name().is_none() {
                    self.fold_expression(&mut call.func)?;
                }
                for arg in &mut call.args {
                    self.fold_expression(arg)?;
                }
                for keyword in &mut call.keywords {
                    self.fold_expression(&mut keyword.value)?;
                }
                return Ok(());
            }
            ExpressionKind::Await(await_expr) => return self.fold_expression(&mut await_expr.value),
            ExpressionKind::Set(set) => {
                for elt in &mut set.elts {
                    self.fold_expression(elt)?;
                }
                return Ok(());
            }
            // comprehension and lambda names shadow module constants
            ExpressionKind::ListComp(_)
            | ExpressionKind::SetComp(_)
            | ExpressionKind::GeneratorExp(_)
            | ExpressionKind::DictComp(_)
            | ExpressionKind::Lambda(_) => return Ok(()),
            ExpressionKind::Slice(slice) => {
                for bound in [&mut slice.lower, &mut slice.upper, &mut slice.step]
                    .into_iter()
                    .flatten()
                {
                    self.fold_expression(bound)?;
                }
                return Ok(());
            }
            ExpressionKind::Starred(starred) => return self.fold_expression(&mut starred.value),
            ExpressionKind::IfExp(if_exp) => {
                self.fold_expression(&mut if_exp.test)?;
                self.fold_expression(&mut if_exp.body)?;
                self.fold_expression(&mut if_exp.orelse)?;
            }
            ExpressionKind::BinOp(binop) => {
                self.fold_expression(&mut binop.left)?;
                self.fold_expression(&mut binop.right)?;
            }
            ExpressionKind::UnaryOp(unary) => self.fold_expression(&mut unary.operand)?,
            ExpressionKind::BoolOp(boolop) => {
                for value in &mut boolop.values {
                    self.fold_expression(value)?;
                }
            }
            ExpressionKind::Compare(compare) => {
                self.fold_expression(&mut compare.left)?;
                for comparator in &mut compare.comparators {
                    self.fold_expression(comparator)?;
                }
            }
        }

        if let Some(kind) = evaluate(&expr.kind, &span)? {
            *expr = Expression::new(kind, span);
        }
        Ok(())
    }
}

fn int_kind(value: BigInt, span: &Span) -> CompileResult<Option<ExpressionKind>> {
    check_range(&value, span)?;
    Ok(Some(ExpressionKind::Int(IntegerLiteral {
        value,
        format: IntegerFormat::Decimal,
    })))
}

fn bool_kind(value: bool) -> Option<ExpressionKind> {
    Some(ExpressionKind::Bool(ratel_parser::BooleanLiteral { value }))
}

fn check_range(value: &BigInt, span: &Span) -> CompileResult<()> {
    if *value > *WORD_MAX || *value < *WORD_MIN {
        return Err(CompilerError::LiteralOutOfRange {
            value: value.to_string(),
            span: label(span),
        });
    }
    Ok(())
}

/// Literal result of an operator node whose operands are already folded
fn evaluate(kind: &ExpressionKind, span: &Span) -> CompileResult<Option<ExpressionKind>> {
    match kind {
        ExpressionKind::BinOp(binop) => match (binop.left.as_int(), binop.right.as_int()) {
            (Some(left), Some(right)) => binary(binop.op, left, right, span),
            _ => Ok(None),
        },
        ExpressionKind::UnaryOp(unary) => match (&unary.op, &unary.operand.kind) {
            (UnaryOperator::Not, ExpressionKind::Bool(value)) => Ok(bool_kind(!value.value)),
            (UnaryOperator::USub, ExpressionKind::Int(int)) => int_kind(-&int.value, span),
            (UnaryOperator::UAdd, ExpressionKind::Int(int)) => int_kind(int.value.clone(), span),
            (UnaryOperator::Invert, ExpressionKind::Int(int)) => {
                if int.value.is_negative() {
                    return Err(CompilerError::LiteralOutOfRange {
                        value: format!("~{}", int.value),
                        span: label(span),
                    });
                }
                int_kind(&*WORD_MAX - &int.value, span)
            }
            _ => Ok(None),
        },
        ExpressionKind::BoolOp(boolop) => {
            let mut values = Vec::with_capacity(boolop.values.len());
            for value in &boolop.values {
                match &value.kind {
                    ExpressionKind::Bool(literal) => values.push(literal.value),
                    _ => return Ok(None),
                }
            }
            Ok(bool_kind(match boolop.op {
                BoolOperator::And => values.iter().all(|value| *value),
                BoolOperator::Or => values.iter().any(|value| *value),
            }))
        }
        ExpressionKind::Compare(compare) => {
            let operands: Vec<&Expression> = std::iter::once(&*compare.left)
                .chain(compare.comparators.iter())
                .collect();
            let mut result = true;
            for (op, pair) in compare.ops.iter().zip(operands.windows(2)) {
                match compare_pair(*op, pair[0], pair[1]) {
                    Some(outcome) => result &= outcome,
                    None => return Ok(None),
                }
            }
            Ok(bool_kind(result))
        }
        ExpressionKind::IfExp(if_exp) => match &if_exp.test.kind {
            ExpressionKind::Bool(test) if test.value => Ok(Some(if_exp.body.kind.clone())),
            ExpressionKind::Bool(_) => Ok(Some(if_exp.orelse.kind.clone())),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

fn compare_pair(op: CompareOperator, left: &Expression, right: &Expression) -> Option<bool> {
    match (&left.kind, &right.kind) {
        (ExpressionKind::Int(l), ExpressionKind::Int(r)) => match op {
            CompareOperator::Eq => Some(l.value == r.value),
            CompareOperator::NotEq => Some(l.value != r.value),
            CompareOperator::Lt => Some(l.value < r.value),
            CompareOperator::LtE => Some(l.value <= r.value),
            CompareOperator::Gt => Some(l.value > r.value),
            CompareOperator::GtE => Some(l.value >= r.value),
            _ => None,
        },
        (ExpressionKind::Bool(l), ExpressionKind::Bool(r)) => match op {
            CompareOperator::Eq => Some(l.value == r.value),
            CompareOperator::NotEq => Some(l.value != r.value),
            _ => None,
        },
        _ => None,
    }
}

fn binary(
    op: BinaryOperator,
    left: &BigInt,
    right: &BigInt,
    span: &Span,
) -> CompileResult<Option<ExpressionKind>> {
    let value = match op {
        BinaryOperator::Add => left + right,
        BinaryOperator::Sub => left - right,
        BinaryOperator::Mult => left * right,
        BinaryOperator::Div | BinaryOperator::FloorDiv | BinaryOperator::Mod => {
            if right.is_zero() {
                return Err(CompilerError::ZeroDivision { span: label(span) });
            }
            if op == BinaryOperator::Mod {
                left % right
            } else {
                left / right
            }
        }
        BinaryOperator::Pow => {
            if right.is_negative() {
                return Err(CompilerError::structure(
                    "Negative exponent in constant expression",
                    span,
                ));
            }
            let exponent = right.to_u32().filter(|exp| *exp <= MAX_BITS);
            match exponent {
                Some(exponent) => left.pow(exponent),
                None if left.abs() <= BigInt::one() => {
                    if left.is_negative() && (right % 2u32).is_one() {
                        -BigInt::one()
                    } else if left.is_zero() {
                        BigInt::zero()
                    } else {
                        BigInt::one()
                    }
                }
                None => {
                    return Err(CompilerError::LiteralOutOfRange {
                        value: format!("{} ** {}", left, right),
                        span: label(span),
                    })
                }
            }
        }
        BinaryOperator::LShift | BinaryOperator::RShift => {
            let Some(shift) = right.to_u32().filter(|shift| *shift <= MAX_BITS) else {
                return Err(CompilerError::LiteralOutOfRange {
                    value: format!("shift by {}", right),
                    span: label(span),
                });
            };
            if op == BinaryOperator::LShift {
                left << shift as usize
            } else {
                left >> shift as usize
            }
        }
        BinaryOperator::BitAnd => left & right,
        BinaryOperator::BitOr => left | right,
        BinaryOperator::BitXor => left ^ right,
    };
    int_kind(value, span)
}
