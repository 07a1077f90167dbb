//! IR generation
//!
//! Lowers the global context into deployment and runtime IR in one pass.
//! The runtime is a selector dispatcher over every external function and
//! public getter; the deployment code runs the constructor and then copies
//! the runtime into place.
//!
//! Memory layout:
//!
//! | offset | use                         |
//! |--------|-----------------------------|
//! | 0      | method selector             |
//! | 192    | hash scratch (two words)    |
//! | 256    | return buffer               |
//! | 320    | function frame (locals)     |

use crate::error::{CompileResult, CompilerError};
use crate::phases::context::{
    ContractFunction, EventDef, FunctionKind, GlobalContext, Mutability, StorageVariable,
};
use crate::phases::ir::IrNode;
use crate::settings::{CompilerSettings, EvmVersion};
use crate::types::{resolve_type, Type};
use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::One;
use ratel_parser::{
    BinaryOperator, BoolOperator, CompareOperator, Expression, ExpressionKind, Span, Statement,
    StatementKind, UnaryOperator,
};

pub const SELECTOR_SLOT: u64 = 0;
pub const HASH_SCRATCH: u64 = 192;
pub const RETURN_BUFFER: u64 = 256;
pub const FRAME_START: u64 = 320;
const WORD: u64 = 32;
/// Calldata offset of the first argument, after the four selector bytes
const ARGS_OFFSET: u64 = 4;

/// Generate `(deploy, runtime)` IR for a contract
pub fn generate_ir(
    ctx: &GlobalContext,
    settings: &CompilerSettings,
) -> CompileResult<(IrNode, IrNode)> {
    let runtime = runtime_ir(ctx, settings)?;

    let mut deploy = Vec::new();
    if let Some(constructor) = ctx.constructor() {
        let mut frame = Frame::new(ctx, constructor, settings);
        deploy.extend(frame.prologue()?);
        if let FunctionKind::Defined { body, .. } = &constructor.kind {
            deploy.push(frame.body(body)?);
        }
    }
    deploy.push(IrNode::op("deploy", vec![runtime.clone()]));

    Ok((IrNode::seq(deploy), runtime))
}

fn runtime_ir(ctx: &GlobalContext, settings: &CompilerSettings) -> CompileResult<IrNode> {
    let selector_shift = BigInt::one() << 224usize;
    let mut dispatch = vec![IrNode::op(
        "mstore",
        vec![
            IrNode::int(SELECTOR_SLOT),
            IrNode::op(
                "div",
                vec![
                    IrNode::op("calldataload", vec![IrNode::int(0)]),
                    IrNode::int(selector_shift),
                ],
            ),
        ],
    )];

    for function in ctx.external_functions() {
        let mut frame = Frame::new(ctx, function, settings);
        let mut body = frame.prologue()?;
        match &function.kind {
            FunctionKind::Defined { body: stmts, .. } => {
                body.push(frame.body(stmts)?);
                body.push(IrNode::op("stop", Vec::new()));
            }
            FunctionKind::Getter { variable } => body.push(frame.getter(variable)?),
        }
        let selector = BigInt::from_bytes_be(
            num_bigint::Sign::Plus,
            &function.signature.method_id,
        );
        dispatch.push(
            IrNode::op(
                "if",
                vec![
                    IrNode::op(
                        "eq",
                        vec![
                            IrNode::op("mload", vec![IrNode::int(SELECTOR_SLOT)]),
                            IrNode::int(selector),
                        ],
                    ),
                    IrNode::seq(body),
                ],
            )
            .with_pos(function.span),
        );
    }

    dispatch.push(IrNode::op("revert", vec![IrNode::int(0), IrNode::int(0)]));
    Ok(IrNode::seq(dispatch))
}

/// Where a name lives inside a function
#[derive(Debug, Clone)]
enum Binding {
    Memory(u64),
    Calldata(u64),
}

struct Frame<'a> {
    ctx: &'a GlobalContext,
    function: &'a ContractFunction,
    settings: &'a CompilerSettings,
    variables: IndexMap<String, (Binding, Type)>,
    next_offset: u64,
    loop_depth: usize,
}

impl<'a> Frame<'a> {
    fn new(
        ctx: &'a GlobalContext,
        function: &'a ContractFunction,
        settings: &'a CompilerSettings,
    ) -> Self {
        Self {
            ctx,
            function,
            settings,
            variables: IndexMap::new(),
            next_offset: FRAME_START,
            loop_depth: 0,
        }
    }

    fn allocate(&mut self, words: u64) -> u64 {
        let offset = self.next_offset;
        self.next_offset += words * WORD;
        offset
    }

    /// Payment check and argument bindings
    fn prologue(&mut self) -> CompileResult<Vec<IrNode>> {
        let signature = &self.function.signature;
        let mut nodes = Vec::new();
        if !signature.is_payable() {
            nodes.push(IrNode::op(
                "assert",
                vec![IrNode::op(
                    "iszero",
                    vec![IrNode::op("callvalue", Vec::new())],
                )],
            ));
        }

        let count = signature.args.len() as u64;
        if signature.is_constructor() && count > 0 {
            let start = self.allocate(count);
            nodes.push(IrNode::op(
                "codecopy",
                vec![
                    IrNode::int(start),
                    IrNode::op("codelen", Vec::new()),
                    IrNode::int(count * WORD),
                ],
            ));
            for (i, arg) in signature.args.iter().enumerate() {
                self.variables.insert(
                    arg.name.clone(),
                    (Binding::Memory(start + i as u64 * WORD), arg.typ.clone()),
                );
            }
        } else {
            for (i, arg) in signature.args.iter().enumerate() {
                self.variables.insert(
                    arg.name.clone(),
                    (
                        Binding::Calldata(ARGS_OFFSET + i as u64 * WORD),
                        arg.typ.clone(),
                    ),
                );
            }
        }
        Ok(nodes)
    }

    fn getter(&mut self, variable: &str) -> CompileResult<IrNode> {
        let var = self.storage_variable(variable, &self.function.span)?;
        let mut slot = IrNode::int(var.slot);
        for i in 0..self.function.signature.args.len() as u64 {
            let key = IrNode::op(
                "calldataload",
                vec![IrNode::int(ARGS_OFFSET + i * WORD)],
            );
            slot = IrNode::op("sha3_64", vec![key, slot]);
        }
        Ok(return_word(IrNode::op("sload", vec![slot])))
    }

    fn storage_variable(&self, name: &str, span: &Span) -> CompileResult<&'a StorageVariable> {
        self.ctx.storage.get(name).ok_or_else(|| {
            CompilerError::structure(format!("Unknown storage variable `{}`", name), span)
        })
    }

    fn body(&mut self, stmts: &[Statement]) -> CompileResult<IrNode> {
        let mut nodes = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            nodes.push(self.statement(stmt)?.with_pos(stmt.span));
        }
        Ok(IrNode::seq(nodes))
    }

    fn statement(&mut self, stmt: &Statement) -> CompileResult<IrNode> {
        let span = &stmt.span;
        match &stmt.kind {
            StatementKind::Pass => Ok(IrNode::pass()),
            StatementKind::Expr(expr) => self.expression_statement(&expr.value),
            StatementKind::AnnAssign(assign) => {
                let Some(name) = assign.target.as_name() else {
                    return Err(CompilerError::structure(
                        "Variable declarations need a plain name",
                        span,
                    ));
                };
                if self.variables.contains_key(name) || self.ctx.constants.contains_key(name) {
                    return Err(CompilerError::structure(
                        format!("Variable `{}` is already declared", name),
                        span,
                    ));
                }
                let typ = resolve_type(&assign.annotation, self.ctx)?;
                if !typ.is_base() {
                    return Err(CompilerError::unsupported(
                        format!("local variable of type {}", typ),
                        span,
                    ));
                }
                let value = match &assign.value {
                    Some(value) => self.expression(value)?,
                    None => IrNode::int(0),
                };
                let offset = self.allocate(1);
                self.variables
                    .insert(name.to_string(), (Binding::Memory(offset), typ));
                Ok(IrNode::op("mstore", vec![IrNode::int(offset), value]))
            }
            StatementKind::Assign(assign) => {
                let value = self.expression(&assign.value)?;
                let mut stores = Vec::with_capacity(assign.targets.len());
                for target in &assign.targets {
                    stores.push(self.store(target, value.clone())?);
                }
                Ok(match stores.len() {
                    1 => stores.remove(0),
                    _ => IrNode::seq(stores),
                })
            }
            StatementKind::AugAssign(assign) => {
                let current = self.expression(&assign.target)?;
                let typ = self.type_of(&assign.target);
                let value = self.expression(&assign.value)?;
                let combined = binary(assign.op, current, value, &typ, span)?;
                self.store(&assign.target, combined)
            }
            StatementKind::Return(ret) => self.return_statement(ret.value.as_ref(), span),
            StatementKind::If(if_stmt) => {
                let mut args = vec![self.expression(&if_stmt.test)?, self.body(&if_stmt.body)?];
                if !if_stmt.orelse.is_empty() {
                    args.push(self.body(&if_stmt.orelse)?);
                }
                Ok(IrNode::op("if", args))
            }
            StatementKind::For(for_stmt) if for_stmt.is_async => Err(CompilerError::structure(
                "`async for` cannot appear in a contract",
                span,
            )),
            StatementKind::For(for_stmt) => self.for_loop(for_stmt, span),
            StatementKind::Break | StatementKind::Continue if self.loop_depth == 0 => Err(
                CompilerError::structure("`break` and `continue` must be inside a loop", span),
            ),
            StatementKind::Break => Ok(IrNode::op("break", Vec::new())),
            StatementKind::Continue => Ok(IrNode::op("continue", Vec::new())),
            StatementKind::Assert(assert) => {
                Ok(IrNode::op("assert", vec![self.expression(&assert.test)?]))
            }
            StatementKind::Raise(_) => {
                Ok(IrNode::op("revert", vec![IrNode::int(0), IrNode::int(0)]))
            }
            StatementKind::While(_) => Err(CompilerError::unsupported("while loops", span)),
            StatementKind::Try(_) => Err(CompilerError::unsupported("try statements", span)),
            StatementKind::With(_) => Err(CompilerError::unsupported("with statements", span)),
            StatementKind::Delete(_) => Err(CompilerError::unsupported("del statements", span)),
            StatementKind::Global(_) | StatementKind::Nonlocal(_) => Err(
                CompilerError::structure("Contract functions cannot rebind outer names", span),
            ),
            StatementKind::FunctionDef(_) | StatementKind::ClassDef(_) => Err(
                CompilerError::structure("Definitions cannot be nested inside functions", span),
            ),
            StatementKind::Import(_) | StatementKind::ImportFrom(_) => Err(
                CompilerError::structure("Imports must be at module level", span),
            ),
        }
    }

    fn return_statement(&mut self, value: Option<&Expression>, span: &Span) -> CompileResult<IrNode> {
        let signature = &self.function.signature;
        if signature.is_constructor() {
            return Err(CompilerError::structure("__init__ cannot return", span));
        }
        match (value, &signature.returns) {
            (Some(value), Some(_)) => Ok(return_word(self.expression(value)?)),
            (None, None) => Ok(IrNode::op("stop", Vec::new())),
            (Some(_), None) => Err(CompilerError::structure(
                format!("Function `{}` does not return a value", signature.name),
                span,
            )),
            (None, Some(_)) => Err(CompilerError::structure(
                format!("Function `{}` must return a value", signature.name),
                span,
            )),
        }
    }

    fn for_loop(&mut self, for_stmt: &ratel_parser::For, span: &Span) -> CompileResult<IrNode> {
        let Some(name) = for_stmt.target.as_name() else {
            return Err(CompilerError::unsupported("tuple loop targets", span));
        };
        let ExpressionKind::Call(call) = &for_stmt.iter.kind else {
            return Err(CompilerError::unsupported("iteration over values", span));
        };
        if call.func.as_name() != Some("range") {
            return Err(CompilerError::unsupported("iteration over values", span));
        }
        let bounds: Option<Vec<&BigInt>> = call.args.iter().map(Expression::as_int).collect();
        let (start, end) = match bounds.as_deref() {
            Some([end]) => (BigInt::from(0), (*end).clone()),
            Some([start, end]) => ((*start).clone(), (*end).clone()),
            _ => {
                return Err(CompilerError::unsupported(
                    "range() bounds that are not constant",
                    span,
                ))
            }
        };
        if end < start {
            return Err(CompilerError::structure("range() end is before its start", span));
        }
        if self.variables.contains_key(name) {
            return Err(CompilerError::structure(
                format!("Variable `{}` is already declared", name),
                span,
            ));
        }
        let rounds = &end - &start;
        let typ = if start < BigInt::from(0) {
            Type::Int128
        } else {
            Type::Uint256
        };
        let offset = self.allocate(1);
        self.variables
            .insert(name.to_string(), (Binding::Memory(offset), typ));

        self.loop_depth += 1;
        let body = self.body(&for_stmt.body);
        self.loop_depth -= 1;
        self.variables.shift_remove(name);

        if rounds == BigInt::from(0) {
            return Ok(IrNode::pass());
        }
        Ok(IrNode::op(
            "repeat",
            vec![
                IrNode::int(offset),
                IrNode::int(start),
                IrNode::int(rounds),
                body?,
            ],
        ))
    }

    fn expression_statement(&mut self, value: &Expression) -> CompileResult<IrNode> {
        let span = &value.span;
        match &value.kind {
            ExpressionKind::Str(_) => Ok(IrNode::pass()),
            ExpressionKind::Name(name) if name.id == "vdb" => {
                Ok(IrNode::op("debugger", Vec::new()))
            }
            ExpressionKind::Call(call) => {
                if let ExpressionKind::Attribute(attr) = &call.func.kind {
                    if attr.value.as_name() == Some("log") {
                        let Some(event) = self.ctx.events.get(&attr.attr) else {
                            return Err(CompilerError::structure(
                                format!("Unknown event `{}`", attr.attr),
                                span,
                            ));
                        };
                        return self.log(event, &call.args, span);
                    }
                    if attr.value.as_name() == Some("self") {
                        return Err(CompilerError::unsupported("internal function calls", span));
                    }
                }
                match (call.func.as_name(), call.args.as_slice()) {
                    (Some("send"), [to, amount]) => {
                        self.require_mutable(span)?;
                        let call = IrNode::op(
                            "call",
                            vec![
                                IrNode::op("gas", Vec::new()),
                                self.expression(to)?,
                                self.expression(amount)?,
                                IrNode::int(0),
                                IrNode::int(0),
                                IrNode::int(0),
                                IrNode::int(0),
                            ],
                        );
                        Ok(IrNode::op("assert", vec![call]))
                    }
                    (Some("selfdestruct"), [to]) => {
                        self.require_mutable(span)?;
                        Ok(IrNode::op("selfdestruct", vec![self.expression(to)?]))
                    }
                    _ => Err(CompilerError::unsupported(format!("call `{}`", call.func), span)),
                }
            }
            _ => Err(CompilerError::structure(
                "Expression statement has no effect",
                span,
            )),
        }
    }

    fn log(&mut self, event: &EventDef, args: &[Expression], span: &Span) -> CompileResult<IrNode> {
        self.require_mutable(span)?;
        if args.len() != event.fields.len() {
            return Err(CompilerError::structure(
                format!(
                    "Event `{}` takes {} arguments, {} given",
                    event.name,
                    event.fields.len(),
                    args.len()
                ),
                span,
            ));
        }

        let mut topics = vec![IrNode::int(BigInt::from_bytes_be(
            num_bigint::Sign::Plus,
            &event.topic,
        ))];
        let mut data = Vec::new();
        for (field, arg) in event.fields.iter().zip(args) {
            let value = self.expression(arg)?;
            if field.indexed {
                topics.push(value);
            } else {
                data.push(value);
            }
        }

        let words = data.len() as u64;
        let offset = if words > 0 { self.allocate(words) } else { 0 };
        let mut nodes: Vec<IrNode> = data
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                IrNode::op("mstore", vec![IrNode::int(offset + i as u64 * WORD), value])
            })
            .collect();

        let opcode = format!("log{}", topics.len());
        let mut log_args = vec![IrNode::int(offset), IrNode::int(words * WORD)];
        log_args.extend(topics);
        nodes.push(IrNode::op(&opcode, log_args));
        Ok(IrNode::seq(nodes))
    }

    fn require_mutable(&self, span: &Span) -> CompileResult<()> {
        match self.function.signature.mutability {
            Mutability::View | Mutability::Pure => Err(CompilerError::structure(
                format!(
                    "Function `{}` is {} and cannot change state",
                    self.function.signature.name, self.function.signature.mutability
                ),
                span,
            )),
            Mutability::Nonpayable | Mutability::Payable => Ok(()),
        }
    }

    fn store(&mut self, target: &Expression, value: IrNode) -> CompileResult<IrNode> {
        let span = &target.span;
        if let Some(name) = target.as_name() {
            return match self.variables.get(name) {
                Some((Binding::Memory(offset), _)) => {
                    Ok(IrNode::op("mstore", vec![IrNode::int(*offset), value]))
                }
                Some((Binding::Calldata(_), _)) => Err(CompilerError::structure(
                    format!("Cannot assign to argument `{}`", name),
                    span,
                )),
                None if self.ctx.constants.contains_key(name) => Err(CompilerError::structure(
                    format!("Cannot modify constant `{}`", name),
                    span,
                )),
                None => Err(CompilerError::structure(
                    format!("Undeclared variable `{}`", name),
                    span,
                )),
            };
        }
        match self.storage_ref(target)? {
            Some((slot, typ)) if typ.is_base() => {
                self.require_mutable(span)?;
                Ok(IrNode::op("sstore", vec![slot, value]))
            }
            Some((_, typ)) => Err(CompilerError::unsupported(
                format!("assignment of a whole {}", typ),
                span,
            )),
            None => Err(CompilerError::unsupported("this assignment target", span)),
        }
    }

    /// Slot expression and type for storage references such as `self.x`,
    /// `self.m[k]` or `self.s.field`
    fn storage_ref(&mut self, expr: &Expression) -> CompileResult<Option<(IrNode, Type)>> {
        match &expr.kind {
            ExpressionKind::Attribute(attr) if attr.value.as_name() == Some("self") => Ok(self
                .ctx
                .storage
                .get(&attr.attr)
                .map(|var| (IrNode::int(var.slot), var.typ.clone()))),
            ExpressionKind::Attribute(attr) => match self.storage_ref(&attr.value)? {
                Some((slot, Type::Struct(name))) => {
                    let Some((index, field)) = self.ctx.structs.get(&name).and_then(|def| {
                        def.field_index(&attr.attr)
                            .map(|index| (index, def.fields[index].typ.clone()))
                    }) else {
                        return Err(CompilerError::structure(
                            format!("Struct `{}` has no field `{}`", name, attr.attr),
                            &expr.span,
                        ));
                    };
                    let slot = IrNode::op("add", vec![slot, IrNode::int(index as u64)]);
                    Ok(Some((slot, field)))
                }
                Some((_, typ)) => Err(CompilerError::structure(
                    format!("{} has no field `{}`", typ, attr.attr),
                    &expr.span,
                )),
                None => Ok(None),
            },
            ExpressionKind::Subscript(subscript) => match self.storage_ref(&subscript.value)? {
                Some((slot, Type::HashMap(_, value))) => {
                    let key = self.expression(&subscript.slice)?;
                    Ok(Some((IrNode::op("sha3_64", vec![key, slot]), *value)))
                }
                Some((_, typ)) => Err(CompilerError::structure(
                    format!("{} is not subscriptable", typ),
                    &expr.span,
                )),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn expression(&mut self, expr: &Expression) -> CompileResult<IrNode> {
        let span = &expr.span;
        match &expr.kind {
            ExpressionKind::Int(int) => Ok(IrNode::int(int.value.clone())),
            ExpressionKind::Bool(value) => Ok(IrNode::int(u8::from(value.value))),
            ExpressionKind::Name(name) => match self.variables.get(&name.id) {
                Some((Binding::Memory(offset), _)) => {
                    Ok(IrNode::op("mload", vec![IrNode::int(*offset)]))
                }
                Some((Binding::Calldata(offset), _)) => {
                    Ok(IrNode::op("calldataload", vec![IrNode::int(*offset)]))
                }
                None if name.id == "self" => Ok(IrNode::op("address", Vec::new())),
                None => match self.ctx.constants.get(&name.id) {
                    Some(constant) => self.expression(&constant.value.clone()),
                    None => Err(CompilerError::structure(
                        format!("Undeclared variable `{}`", name.id),
                        span,
                    )),
                },
            },
            ExpressionKind::Attribute(attr) => {
                if let Some(node) = self.environment(expr)? {
                    return Ok(node);
                }
                self.storage_load(expr, &format!("attribute `{}`", attr.attr))
            }
            ExpressionKind::Subscript(_) => self.storage_load(expr, "subscript"),
            ExpressionKind::Call(call) => match (call.func.as_name(), call.args.as_slice()) {
                (Some("convert"), [value, _]) => self.expression(value),
                _ => {
                    if let ExpressionKind::Attribute(attr) = &call.func.kind {
                        if attr.value.as_name() == Some("self") {
                            return Err(CompilerError::unsupported(
                                "internal function calls",
                                span,
                            ));
                        }
                    }
                    Err(CompilerError::unsupported(format!("call `{}`", call.func), span))
                }
            },
            ExpressionKind::BinOp(binop) => {
                let typ = self.operand_type(&binop.left, &binop.right);
                let left = self.expression(&binop.left)?;
                let right = self.expression(&binop.right)?;
                binary(binop.op, left, right, &typ, span)
            }
            ExpressionKind::UnaryOp(unary) => {
                let operand = self.expression(&unary.operand)?;
                Ok(match unary.op {
                    UnaryOperator::Not => IrNode::op("iszero", vec![operand]),
                    UnaryOperator::USub => IrNode::op("sub", vec![IrNode::int(0), operand]),
                    UnaryOperator::UAdd => operand,
                    UnaryOperator::Invert => IrNode::op("not", vec![operand]),
                })
            }
            ExpressionKind::BoolOp(boolop) => {
                let op = match boolop.op {
                    BoolOperator::And => "and",
                    BoolOperator::Or => "or",
                };
                let mut values = boolop.values.iter();
                let Some(first) = values.next() else {
                    return Err(CompilerError::panic("boolean operation without operands"));
                };
                let mut node = self.expression(first)?;
                for value in values {
                    node = IrNode::op(op, vec![node, self.expression(value)?]);
                }
                Ok(node)
            }
            ExpressionKind::Compare(compare) => {
                let mut left_expr: &Expression = &compare.left;
                let mut result: Option<IrNode> = None;
                for (op, right_expr) in compare.ops.iter().zip(&compare.comparators) {
                    let typ = self.operand_type(left_expr, right_expr);
                    let left = self.expression(left_expr)?;
                    let right = self.expression(right_expr)?;
                    let node = comparison(*op, left, right, &typ, span)?;
                    result = Some(match result {
                        Some(previous) => IrNode::op("and", vec![previous, node]),
                        None => node,
                    });
                    left_expr = right_expr;
                }
                result.ok_or_else(|| CompilerError::panic("comparison without operators"))
            }
            ExpressionKind::Str(_) => Err(CompilerError::unsupported("string values", span)),
            ExpressionKind::Decimal(_) => Err(CompilerError::unsupported("decimal values", span)),
            ExpressionKind::NoneLiteral => Err(CompilerError::unsupported("None", span)),
            ExpressionKind::List(_)
            | ExpressionKind::Tuple(_)
            | ExpressionKind::Set(_)
            | ExpressionKind::Dict(_) => Err(CompilerError::unsupported("collection values", span)),
            ExpressionKind::ListComp(_)
            | ExpressionKind::SetComp(_)
            | ExpressionKind::GeneratorExp(_)
            | ExpressionKind::DictComp(_) => Err(CompilerError::unsupported("comprehensions", span)),
            ExpressionKind::IfExp(_) => {
                Err(CompilerError::unsupported("conditional expressions", span))
            }
            ExpressionKind::Lambda(_) => Err(CompilerError::unsupported("lambda functions", span)),
            ExpressionKind::Slice(_) => Err(CompilerError::unsupported("slices", span)),
            ExpressionKind::Starred(_) => {
                Err(CompilerError::unsupported("starred expressions", span))
            }
            ExpressionKind::Await(_) => Err(CompilerError::structure(
                "`await` cannot appear in a contract",
                span,
            )),
        }
    }

    fn storage_load(&mut self, expr: &Expression, what: &str) -> CompileResult<IrNode> {
        match self.storage_ref(expr)? {
            Some((slot, typ)) if typ.is_base() => Ok(IrNode::op("sload", vec![slot])),
            Some((_, typ)) => Err(CompilerError::unsupported(
                format!("loading a whole {}", typ),
                &expr.span,
            )),
            None => Err(CompilerError::unsupported(what.to_string(), &expr.span)),
        }
    }

    /// Environment values such as `msg.sender` or `block.number`
    fn environment(&self, expr: &Expression) -> CompileResult<Option<IrNode>> {
        let Some(path) = expr.dotted_path() else {
            return Ok(None);
        };
        let node = match path.as_str() {
            "msg.sender" => IrNode::op("caller", Vec::new()),
            "msg.value" => {
                if !self.function.signature.is_payable() {
                    return Err(CompilerError::structure(
                        "msg.value can only be used in payable functions",
                        &expr.span,
                    ));
                }
                IrNode::op("callvalue", Vec::new())
            }
            "msg.gas" => IrNode::op("gas", Vec::new()),
            "block.timestamp" => IrNode::op("timestamp", Vec::new()),
            "block.number" => IrNode::op("number", Vec::new()),
            "block.coinbase" => IrNode::op("coinbase", Vec::new()),
            "tx.origin" => IrNode::op("origin", Vec::new()),
            "chain.id" => IrNode::op("chainid", Vec::new()),
            "self.balance" if self.settings.evm_version >= EvmVersion::Istanbul => {
                IrNode::op("selfbalance", Vec::new())
            }
            "self.balance" => IrNode::op("balance", vec![IrNode::op("address", Vec::new())]),
            _ => return Ok(None),
        };
        Ok(Some(node))
    }

    /// Type deciding signedness of an operation; literals adopt the other side
    fn operand_type(&self, left: &Expression, right: &Expression) -> Type {
        if left.as_int().is_some() {
            self.type_of(right)
        } else {
            self.type_of(left)
        }
    }

    fn type_of(&self, expr: &Expression) -> Type {
        match &expr.kind {
            ExpressionKind::Int(int) if int.value < BigInt::from(0) => Type::Int128,
            ExpressionKind::Bool(_) | ExpressionKind::Compare(_) | ExpressionKind::BoolOp(_) => {
                Type::Bool
            }
            ExpressionKind::UnaryOp(unary) => match unary.op {
                UnaryOperator::Not => Type::Bool,
                UnaryOperator::USub if unary.operand.as_int().is_some() => Type::Int128,
                _ => self.type_of(&unary.operand),
            },
            ExpressionKind::Name(name) => match self.variables.get(&name.id) {
                Some((_, typ)) => typ.clone(),
                None if name.id == "self" => Type::Address,
                None => self
                    .ctx
                    .constants
                    .get(&name.id)
                    .map(|constant| constant.typ.clone())
                    .unwrap_or(Type::Uint256),
            },
            ExpressionKind::Attribute(_) | ExpressionKind::Subscript(_) => {
                match expr.dotted_path().as_deref() {
                    Some("msg.sender" | "tx.origin" | "block.coinbase") => Type::Address,
                    _ => self.storage_type(expr).unwrap_or(Type::Uint256),
                }
            }
            ExpressionKind::BinOp(binop) => self.operand_type(&binop.left, &binop.right),
            ExpressionKind::Call(call) => match (call.func.as_name(), call.args.as_slice()) {
                (Some("convert"), [_, target]) => {
                    resolve_type(target, self.ctx).unwrap_or(Type::Uint256)
                }
                _ => Type::Uint256,
            },
            _ => Type::Uint256,
        }
    }

    /// Type of a storage reference without generating code for it
    fn storage_type(&self, expr: &Expression) -> Option<Type> {
        match &expr.kind {
            ExpressionKind::Attribute(attr) if attr.value.as_name() == Some("self") => {
                self.ctx.storage.get(&attr.attr).map(|var| var.typ.clone())
            }
            ExpressionKind::Attribute(attr) => match self.storage_type(&attr.value)? {
                Type::Struct(name) => {
                    let def = self.ctx.structs.get(&name)?;
                    def.field_index(&attr.attr)
                        .map(|index| def.fields[index].typ.clone())
                }
                _ => None,
            },
            ExpressionKind::Subscript(subscript) => match self.storage_type(&subscript.value)? {
                Type::HashMap(_, value) => Some(*value),
                _ => None,
            },
            _ => None,
        }
    }
}

fn return_word(value: IrNode) -> IrNode {
    IrNode::seq(vec![
        IrNode::op("mstore", vec![IrNode::int(RETURN_BUFFER), value]),
        IrNode::op(
            "return",
            vec![IrNode::int(RETURN_BUFFER), IrNode::int(WORD)],
        ),
    ])
}

fn binary(
    op: BinaryOperator,
    left: IrNode,
    right: IrNode,
    typ: &Type,
    span: &Span,
) -> CompileResult<IrNode> {
    let bitwise = matches!(
        op,
        BinaryOperator::BitAnd | BinaryOperator::BitOr | BinaryOperator::BitXor
    );
    if matches!(typ, Type::Bool | Type::Address) && !bitwise {
        return Err(CompilerError::structure(
            format!("Operator `{}` is not defined for {}", op.symbol(), typ),
            span,
        ));
    }
    let signed = typ.is_signed();
    let node = match op {
        BinaryOperator::Add => IrNode::op("add", vec![left, right]),
        BinaryOperator::Sub => IrNode::op("sub", vec![left, right]),
        BinaryOperator::Mult => IrNode::op("mul", vec![left, right]),
        BinaryOperator::Div | BinaryOperator::FloorDiv => {
            IrNode::op(if signed { "sdiv" } else { "div" }, vec![left, right])
        }
        BinaryOperator::Mod => IrNode::op(if signed { "smod" } else { "mod" }, vec![left, right]),
        BinaryOperator::Pow => IrNode::op("exp", vec![left, right]),
        BinaryOperator::BitAnd => IrNode::op("and", vec![left, right]),
        BinaryOperator::BitOr => IrNode::op("or", vec![left, right]),
        BinaryOperator::BitXor => IrNode::op("xor", vec![left, right]),
        BinaryOperator::LShift => IrNode::op("shl", vec![right, left]),
        BinaryOperator::RShift => {
            IrNode::op(if signed { "sar" } else { "shr" }, vec![right, left])
        }
    };
    Ok(node)
}

fn comparison(
    op: CompareOperator,
    left: IrNode,
    right: IrNode,
    typ: &Type,
    span: &Span,
) -> CompileResult<IrNode> {
    let signed = typ.is_signed();
    let (lt, gt) = if signed { ("slt", "sgt") } else { ("lt", "gt") };
    let node = match op {
        CompareOperator::Eq => IrNode::op("eq", vec![left, right]),
        CompareOperator::NotEq => {
            IrNode::op("iszero", vec![IrNode::op("eq", vec![left, right])])
        }
        CompareOperator::Lt => IrNode::op(lt, vec![left, right]),
        CompareOperator::Gt => IrNode::op(gt, vec![left, right]),
        CompareOperator::LtE => IrNode::op("iszero", vec![IrNode::op(gt, vec![left, right])]),
        CompareOperator::GtE => IrNode::op("iszero", vec![IrNode::op(lt, vec![left, right])]),
        CompareOperator::In
        | CompareOperator::NotIn
        | CompareOperator::Is
        | CompareOperator::IsNot => {
            return Err(CompilerError::unsupported(
                format!("`{}` comparisons", op.symbol()),
                span,
            ))
        }
    };
    Ok(node)
}
