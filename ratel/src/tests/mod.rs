//! Unit tests for the split-aware compiler

mod test_compiler;
mod test_splitter;

use ratel_parser::{parse_to_ast, Module, Statement, StatementKind};

/// Contract with two `@mpc` definitions
pub(crate) const MPC_CONTRACT: &str = include_str!("../../tests/fixtures/mpc.vy");

pub(crate) fn parse(source: &str) -> Module {
    parse_to_ast(source, 0).unwrap()
}

/// Names of the top-level definitions, in order
pub(crate) fn definition_names(module: &Module) -> Vec<&str> {
    module
        .body
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            StatementKind::FunctionDef(def) => Some(def.name.as_str()),
            StatementKind::ClassDef(def) => Some(def.name.as_str()),
            _ => None,
        })
        .collect()
}

/// True when any definition in `body` still carries the marker
pub(crate) fn carries_marker(body: &[Statement]) -> bool {
    body.iter().any(|stmt| match &stmt.kind {
        StatementKind::FunctionDef(def) => {
            def.decorator_list.iter().any(|d| d.as_name() == Some("mpc"))
                || carries_marker(&def.body)
        }
        StatementKind::ClassDef(def) => {
            def.decorator_list.iter().any(|d| d.as_name() == Some("mpc"))
                || carries_marker(&def.body)
        }
        StatementKind::If(if_stmt) => {
            carries_marker(&if_stmt.body) || carries_marker(&if_stmt.orelse)
        }
        StatementKind::For(for_stmt) => carries_marker(&for_stmt.body),
        StatementKind::While(while_stmt) => carries_marker(&while_stmt.body),
        StatementKind::Try(try_stmt) => {
            carries_marker(&try_stmt.body)
                || try_stmt.handlers.iter().any(|h| carries_marker(&h.body))
                || carries_marker(&try_stmt.orelse)
                || carries_marker(&try_stmt.finalbody)
        }
        StatementKind::With(with) => carries_marker(&with.body),
        _ => false,
    })
}
