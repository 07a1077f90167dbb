//! Mutable visitor over the Ratel AST
//!
//! Default methods perform a depth-first walk. Implementors override the
//! hooks they care about and call the matching `walk_*` function to keep
//! descending.

use crate::ast::*;

pub trait VisitorMut: Sized {
    fn visit_module(&mut self, module: &mut Module) {
        walk_module(self, module)
    }

    fn visit_statement(&mut self, stmt: &mut Statement) {
        walk_statement(self, stmt)
    }

    fn visit_function_def(&mut self, def: &mut FunctionDef) {
        walk_function_def(self, def)
    }

    fn visit_class_def(&mut self, def: &mut ClassDef) {
        walk_class_def(self, def)
    }

    fn visit_expression(&mut self, expr: &mut Expression) {
        walk_expression(self, expr)
    }

    /// Called for every span in the tree, including the module's own
    fn visit_span(&mut self, _span: &mut Span) {}
}

pub fn walk_module<V: VisitorMut>(visitor: &mut V, module: &mut Module) {
    visitor.visit_span(&mut module.span);
    walk_body(visitor, &mut module.body);
}

pub fn walk_body<V: VisitorMut>(visitor: &mut V, body: &mut [Statement]) {
    for stmt in body {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_statement<V: VisitorMut>(visitor: &mut V, stmt: &mut Statement) {
    visitor.visit_span(&mut stmt.span);
    match &mut stmt.kind {
        StatementKind::FunctionDef(def) => visitor.visit_function_def(def),
        StatementKind::ClassDef(def) => visitor.visit_class_def(def),
        StatementKind::Import(_) | StatementKind::ImportFrom(_) => {}
        StatementKind::Assign(assign) => {
            for target in &mut assign.targets {
                visitor.visit_expression(target);
            }
            visitor.visit_expression(&mut assign.value);
        }
        StatementKind::AugAssign(assign) => {
            visitor.visit_expression(&mut assign.target);
            visitor.visit_expression(&mut assign.value);
        }
        StatementKind::AnnAssign(assign) => {
            visitor.visit_expression(&mut assign.target);
            visitor.visit_expression(&mut assign.annotation);
            if let Some(value) = &mut assign.value {
                visitor.visit_expression(value);
            }
        }
        StatementKind::Return(ret) => {
            if let Some(value) = &mut ret.value {
                visitor.visit_expression(value);
            }
        }
        StatementKind::If(if_stmt) => {
            visitor.visit_expression(&mut if_stmt.test);
            walk_body(visitor, &mut if_stmt.body);
            walk_body(visitor, &mut if_stmt.orelse);
        }
        StatementKind::For(for_stmt) => {
            visitor.visit_expression(&mut for_stmt.target);
            visitor.visit_expression(&mut for_stmt.iter);
            walk_body(visitor, &mut for_stmt.body);
        }
        StatementKind::While(while_stmt) => {
            visitor.visit_expression(&mut while_stmt.test);
            walk_body(visitor, &mut while_stmt.body);
        }
        StatementKind::Assert(assert) => {
            visitor.visit_expression(&mut assert.test);
            if let Some(msg) = &mut assert.msg {
                visitor.visit_expression(msg);
            }
        }
        StatementKind::Raise(raise) => {
            if let Some(exc) = &mut raise.exc {
                visitor.visit_expression(exc);
            }
        }
        StatementKind::Try(try_stmt) => {
            walk_body(visitor, &mut try_stmt.body);
            for handler in &mut try_stmt.handlers {
                visitor.visit_span(&mut handler.span);
                if let Some(typ) = &mut handler.typ {
                    visitor.visit_expression(typ);
                }
                walk_body(visitor, &mut handler.body);
            }
            walk_body(visitor, &mut try_stmt.orelse);
            walk_body(visitor, &mut try_stmt.finalbody);
        }
        StatementKind::With(with) => {
            for item in &mut with.items {
                visitor.visit_expression(&mut item.context_expr);
                if let Some(vars) = &mut item.optional_vars {
                    visitor.visit_expression(vars);
                }
            }
            walk_body(visitor, &mut with.body);
        }
        StatementKind::Delete(delete) => {
            for target in &mut delete.targets {
                visitor.visit_expression(target);
            }
        }
        StatementKind::Global(_)
        | StatementKind::Nonlocal(_)
        | StatementKind::Pass
        | StatementKind::Break
        | StatementKind::Continue => {}
        StatementKind::Expr(expr) => visitor.visit_expression(&mut expr.value),
    }
}

pub fn walk_function_def<V: VisitorMut>(visitor: &mut V, def: &mut FunctionDef) {
    for decorator in &mut def.decorator_list {
        visitor.visit_expression(decorator);
    }
    walk_parameters(visitor, &mut def.args);
    if let Some(returns) = &mut def.returns {
        visitor.visit_expression(returns);
    }
    walk_body(visitor, &mut def.body);
}

pub fn walk_parameters<V: VisitorMut>(visitor: &mut V, params: &mut [Parameter]) {
    for param in params {
        visitor.visit_span(&mut param.span);
        if let Some(annotation) = &mut param.annotation {
            visitor.visit_expression(annotation);
        }
        if let Some(default) = &mut param.default {
            visitor.visit_expression(default);
        }
    }
}

fn walk_generators<V: VisitorMut>(visitor: &mut V, generators: &mut [Generator]) {
    for generator in generators {
        visitor.visit_expression(&mut generator.target);
        visitor.visit_expression(&mut generator.iter);
        for cond in &mut generator.ifs {
            visitor.visit_expression(cond);
        }
    }
}

pub fn walk_class_def<V: VisitorMut>(visitor: &mut V, def: &mut ClassDef) {
    for decorator in &mut def.decorator_list {
        visitor.visit_expression(decorator);
    }
    for base in &mut def.bases {
        visitor.visit_expression(base);
    }
    walk_body(visitor, &mut def.body);
}

pub fn walk_expression<V: VisitorMut>(visitor: &mut V, expr: &mut Expression) {
    visitor.visit_span(&mut expr.span);
    match &mut expr.kind {
        ExpressionKind::Name(_)
        | ExpressionKind::Int(_)
        | ExpressionKind::Decimal(_)
        | ExpressionKind::Str(_)
        | ExpressionKind::Bool(_)
        | ExpressionKind::NoneLiteral => {}
        ExpressionKind::List(list) => {
            for elt in &mut list.elts {
                visitor.visit_expression(elt);
            }
        }
        ExpressionKind::Tuple(tuple) => {
            for elt in &mut tuple.elts {
                visitor.visit_expression(elt);
            }
        }
        ExpressionKind::Set(set) => {
            for elt in &mut set.elts {
                visitor.visit_expression(elt);
            }
        }
        ExpressionKind::ListComp(comp)
        | ExpressionKind::SetComp(comp)
        | ExpressionKind::GeneratorExp(comp) => {
            visitor.visit_expression(&mut comp.elt);
            walk_generators(visitor, &mut comp.generators);
        }
        ExpressionKind::DictComp(comp) => {
            visitor.visit_expression(&mut comp.key);
            visitor.visit_expression(&mut comp.value);
            walk_generators(visitor, &mut comp.generators);
        }
        ExpressionKind::Dict(dict) => {
            for (key, value) in dict.keys.iter_mut().zip(dict.values.iter_mut()) {
                visitor.visit_expression(key);
                visitor.visit_expression(value);
            }
        }
        ExpressionKind::Attribute(attr) => visitor.visit_expression(&mut attr.value),
        ExpressionKind::Subscript(sub) => {
            visitor.visit_expression(&mut sub.value);
            visitor.visit_expression(&mut sub.slice);
        }
        ExpressionKind::Call(call) => {
            visitor.visit_expression(&mut call.func);
            for arg in &mut call.args {
                visitor.visit_expression(arg);
            }
            for keyword in &mut call.keywords {
                visitor.visit_span(&mut keyword.span);
                visitor.visit_expression(&mut keyword.value);
            }
        }
        ExpressionKind::BinOp(op) => {
            visitor.visit_expression(&mut op.left);
            visitor.visit_expression(&mut op.right);
        }
        ExpressionKind::UnaryOp(op) => visitor.visit_expression(&mut op.operand),
        ExpressionKind::BoolOp(op) => {
            for value in &mut op.values {
                visitor.visit_expression(value);
            }
        }
        ExpressionKind::Compare(cmp) => {
            visitor.visit_expression(&mut cmp.left);
            for comparator in &mut cmp.comparators {
                visitor.visit_expression(comparator);
            }
        }
        ExpressionKind::Await(await_expr) => visitor.visit_expression(&mut await_expr.value),
        ExpressionKind::IfExp(if_exp) => {
            visitor.visit_expression(&mut if_exp.test);
            visitor.visit_expression(&mut if_exp.body);
            visitor.visit_expression(&mut if_exp.orelse);
        }
        ExpressionKind::Lambda(lambda) => {
            walk_parameters(visitor, &mut lambda.args);
            visitor.visit_expression(&mut lambda.body);
        }
        ExpressionKind::Slice(slice) => {
            for bound in [&mut slice.lower, &mut slice.upper, &mut slice.step]
                .into_iter()
                .flatten()
            {
                visitor.visit_expression(bound);
            }
        }
        ExpressionKind::Starred(starred) => visitor.visit_expression(&mut starred.value),
    }
}

/// Maps normalized byte offsets back to the original text and fills in
/// line and column positions.
pub(crate) struct SpanResolver<'a> {
    line_starts: Vec<usize>,
    offsets: &'a crate::preprocess::OffsetMap,
}

impl<'a> SpanResolver<'a> {
    pub(crate) fn new(original: &str, offsets: &'a crate::preprocess::OffsetMap) -> Self {
        let line_starts = std::iter::once(0)
            .chain(original.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            line_starts,
            offsets,
        }
    }

    fn position(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|start| *start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        (line.max(1), offset - line_start)
    }
}

impl VisitorMut for SpanResolver<'_> {
    fn visit_span(&mut self, span: &mut Span) {
        let start = self.offsets.to_original(span.start);
        let end = self.offsets.to_original(span.end);
        let (lineno, col_offset) = self.position(start);
        let (end_lineno, end_col_offset) = self.position(end);
        *span = Span {
            start,
            end,
            lineno,
            col_offset,
            end_lineno,
            end_col_offset,
        };
    }
}

/// Restores declaration keywords recorded by the preprocessor
pub(crate) struct ClassKindAnnotator<'a> {
    pub(crate) class_types: &'a crate::preprocess::ClassTypes,
}

impl VisitorMut for ClassKindAnnotator<'_> {
    fn visit_class_def(&mut self, def: &mut ClassDef) {
        if let Some(kind) = self.class_types.get(&def.name) {
            def.kind = *kind;
        }
        walk_class_def(self, def)
    }
}

struct SpanEraser;

impl VisitorMut for SpanEraser {
    fn visit_span(&mut self, span: &mut Span) {
        *span = Span::default();
    }
}

impl Module {
    /// Copy of the module with every span reset, for structural comparison
    pub fn without_spans(&self) -> Module {
        let mut module = self.clone();
        SpanEraser.visit_module(&mut module);
        module
    }
}

impl Statement {
    pub fn without_spans(&self) -> Statement {
        let mut stmt = self.clone();
        SpanEraser.visit_statement(&mut stmt);
        stmt
    }
}
