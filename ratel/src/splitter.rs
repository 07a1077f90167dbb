//! Tree splitter
//!
//! Moves marker-tagged definitions out of a module into a second module.
//! Both results are fully owned; the splitter consumes its input, so callers
//! that need the original tree clone it first.
//!
//! Function and class definitions are both split targets, `async def`
//! included. Definitions are visited bottom-up:
//!
//! - a tagged definition nested inside a primary definition is hoisted into
//!   the secondary module, and an emptied body is refilled with `pass`
//! - inside a tagged definition nothing moves; nested markers are dropped
//! - every marker occurrence is removed from an extracted definition, other
//!   decorators keep their order

use crate::marker::{domain_of, strip_markers, Domain};
use ratel_parser::{Module, Span, Statement, StatementKind};

/// The two trees produced from one module
#[derive(Debug, Clone, PartialEq)]
pub struct SplitResult {
    /// Everything that was not marker-tagged, in source order
    pub primary: Module,
    /// The marker-free tagged definitions, in encounter order
    pub secondary: Module,
}

impl SplitResult {
    pub fn has_secondary(&self) -> bool {
        !self.secondary.body.is_empty()
    }
}

/// Partition `module` by domain marker
pub fn split(module: Module) -> SplitResult {
    let Module {
        body,
        source_id,
        span,
    } = module;

    let mut splitter = Splitter::default();
    let primary_body = splitter.split_body(body);
    tracing::debug!(
        extracted = splitter.extracted.len(),
        remaining = primary_body.len(),
        "split module"
    );

    SplitResult {
        primary: Module {
            body: primary_body,
            source_id,
            span,
        },
        secondary: Module {
            body: splitter.extracted,
            source_id,
            span: Span::default(),
        },
    }
}

#[derive(Default)]
struct Splitter {
    extracted: Vec<Statement>,
}

impl Splitter {
    /// Keep the primary statements of `body`, collecting tagged ones
    fn split_body(&mut self, body: Vec<Statement>) -> Vec<Statement> {
        let mut kept = Vec::with_capacity(body.len());
        for mut stmt in body {
            if tagged(&stmt) {
                strip_tree(&mut stmt);
                self.extracted.push(stmt);
            } else {
                self.descend(&mut stmt);
                kept.push(stmt);
            }
        }
        kept
    }

    /// Split the bodies nested in a primary statement
    fn descend(&mut self, stmt: &mut Statement) {
        match &mut stmt.kind {
            StatementKind::FunctionDef(def) => self.split_nested(&mut def.body),
            StatementKind::ClassDef(def) => self.split_nested(&mut def.body),
            StatementKind::If(if_stmt) => {
                self.split_nested(&mut if_stmt.body);
                let orelse = std::mem::take(&mut if_stmt.orelse);
                if_stmt.orelse = self.split_body(orelse);
            }
            StatementKind::For(for_stmt) => self.split_nested(&mut for_stmt.body),
            StatementKind::While(while_stmt) => self.split_nested(&mut while_stmt.body),
            StatementKind::Try(try_stmt) => {
                self.split_nested(&mut try_stmt.body);
                for handler in &mut try_stmt.handlers {
                    self.split_nested(&mut handler.body);
                }
                let orelse = std::mem::take(&mut try_stmt.orelse);
                try_stmt.orelse = self.split_body(orelse);
                self.split_nested(&mut try_stmt.finalbody);
            }
            StatementKind::With(with) => self.split_nested(&mut with.body),
            _ => {}
        }
    }

    fn split_nested(&mut self, body: &mut Vec<Statement>) {
        let had_statements = !body.is_empty();
        *body = self.split_body(std::mem::take(body));
        if had_statements && body.is_empty() {
            body.push(Statement::pass());
        }
    }
}

fn tagged(stmt: &Statement) -> bool {
    let decorators = match &stmt.kind {
        StatementKind::FunctionDef(def) => &def.decorator_list,
        StatementKind::ClassDef(def) => &def.decorator_list,
        _ => return false,
    };
    domain_of(decorators) == Domain::Secondary
}

/// Remove markers from a definition and everything nested in it
fn strip_tree(stmt: &mut Statement) {
    match &mut stmt.kind {
        StatementKind::FunctionDef(def) => {
            strip_markers(&mut def.decorator_list);
            def.body.iter_mut().for_each(strip_tree);
        }
        StatementKind::ClassDef(def) => {
            strip_markers(&mut def.decorator_list);
            def.body.iter_mut().for_each(strip_tree);
        }
        StatementKind::If(if_stmt) => {
            if_stmt.body.iter_mut().for_each(strip_tree);
            if_stmt.orelse.iter_mut().for_each(strip_tree);
        }
        StatementKind::For(for_stmt) => for_stmt.body.iter_mut().for_each(strip_tree),
        StatementKind::While(while_stmt) => while_stmt.body.iter_mut().for_each(strip_tree),
        StatementKind::Try(try_stmt) => {
            try_stmt.body.iter_mut().for_each(strip_tree);
            for handler in &mut try_stmt.handlers {
                handler.body.iter_mut().for_each(strip_tree);
            }
            try_stmt.orelse.iter_mut().for_each(strip_tree);
            try_stmt.finalbody.iter_mut().for_each(strip_tree);
        }
        StatementKind::With(with) => with.body.iter_mut().for_each(strip_tree),
        _ => {}
    }
}
