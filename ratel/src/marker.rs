// Domain markers
// Decorators that route a definition out of the contract

use ratel_parser::Expression;
use std::fmt;

/// Execution domain a definition belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// The on-chain contract
    Primary,
    /// The auxiliary protocol extracted from the same file
    Secondary,
}

/// Closed set of recognized marker identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainMarker {
    Mpc,
}

impl DomainMarker {
    pub const ALL: [DomainMarker; 1] = [DomainMarker::Mpc];

    pub fn identifier(&self) -> &'static str {
        match self {
            DomainMarker::Mpc => "mpc",
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            DomainMarker::Mpc => Domain::Secondary,
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|marker| marker.identifier() == identifier)
    }

    /// The marker a decorator names, if any.
    ///
    /// Only a bare identifier counts: `@mpc()` and `@lib.mpc` are ordinary
    /// decorators.
    pub fn of_decorator(decorator: &Expression) -> Option<Self> {
        decorator.as_name().and_then(Self::from_identifier)
    }
}

impl fmt::Display for DomainMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.identifier())
    }
}

/// Domain selected by a decorator list
pub fn domain_of(decorators: &[Expression]) -> Domain {
    decorators
        .iter()
        .find_map(DomainMarker::of_decorator)
        .map_or(Domain::Primary, |marker| marker.domain())
}

/// Drop every marker from `decorators`, keeping the others in order.
/// Returns whether anything was removed.
pub fn strip_markers(decorators: &mut Vec<Expression>) -> bool {
    let before = decorators.len();
    decorators.retain(|decorator| DomainMarker::of_decorator(decorator).is_none());
    decorators.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratel_parser::{Attribute, Call, ExpressionKind, Span};

    #[test]
    fn test_exact_identifier_only() {
        assert_eq!(
            DomainMarker::of_decorator(&Expression::name("mpc")),
            Some(DomainMarker::Mpc)
        );
        assert_eq!(DomainMarker::of_decorator(&Expression::name("MPC")), None);
        assert_eq!(DomainMarker::of_decorator(&Expression::name("external")), None);

        let call = Expression::new(
            ExpressionKind::Call(Call {
                func: Box::new(Expression::name("mpc")),
                args: Vec::new(),
                keywords: Vec::new(),
            }),
            Span::default(),
        );
        assert_eq!(DomainMarker::of_decorator(&call), None);

        let attribute = Expression::new(
            ExpressionKind::Attribute(Attribute {
                value: Box::new(Expression::name("lib")),
                attr: "mpc".to_string(),
            }),
            Span::default(),
        );
        assert_eq!(DomainMarker::of_decorator(&attribute), None);
    }

    #[test]
    fn test_strip_keeps_other_decorators() {
        let mut decorators = vec![
            Expression::name("external"),
            Expression::name("mpc"),
            Expression::name("view"),
            Expression::name("mpc"),
        ];
        assert_eq!(domain_of(&decorators), Domain::Secondary);
        assert!(strip_markers(&mut decorators));
        assert_eq!(
            decorators,
            vec![Expression::name("external"), Expression::name("view")]
        );
        assert_eq!(domain_of(&decorators), Domain::Primary);
        assert!(!strip_markers(&mut decorators));
    }
}
