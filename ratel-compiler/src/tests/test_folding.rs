use crate::error::CompilerError;
use crate::phases::folding::fold_module;
use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use ratel_parser::{parse_to_ast, Expression, ExpressionKind, Module, StatementKind};

fn fold(source: &str) -> Result<Module, CompilerError> {
    fold_module(&parse_to_ast(source, 0)?)
}

/// Value returned by the first statement of the function at `index`
fn returned(module: &Module, index: usize) -> Expression {
    let StatementKind::FunctionDef(def) = &module.body[index].kind else {
        panic!("expected a function at {}", index);
    };
    let StatementKind::Return(ret) = &def.body[0].kind else {
        panic!("expected a return statement");
    };
    ret.value.clone().expect("return value")
}

#[test]
fn test_constants_are_substituted_and_folded() {
    let module = fold(
        "X: constant(uint256) = 2 * 3\n\n@external\ndef f() -> uint256:\n    return X + 1\n",
    )
    .unwrap();
    assert_eq!(returned(&module, 1).as_int(), Some(&BigInt::from(7)));
}

#[test]
fn test_folding_leaves_the_input_untouched() {
    let module = parse_to_ast("@external\ndef f() -> uint256:\n    return 1 + 2\n", 0).unwrap();
    let folded = fold_module(&module).unwrap();
    assert!(matches!(
        returned(&module, 0).kind,
        ExpressionKind::BinOp(_)
    ));
    assert_eq!(returned(&folded, 0).as_int(), Some(&BigInt::from(3)));
}

#[test]
fn test_chained_comparison_folds_to_bool() {
    let module = fold("@external\ndef f() -> bool:\n    return 1 < 2 < 3\n").unwrap();
    assert!(matches!(
        returned(&module, 0).kind,
        ExpressionKind::Bool(ref literal) if literal.value
    ));
}

#[test]
fn test_boolean_logic_folds() {
    let module = fold("@external\ndef f() -> bool:\n    return True and not False\n").unwrap();
    assert!(matches!(
        returned(&module, 0).kind,
        ExpressionKind::Bool(ref literal) if literal.value
    ));
}

#[test]
fn test_non_constant_operands_are_kept() {
    let module = fold("@external\ndef f(x: uint256) -> uint256:\n    return x + 1\n").unwrap();
    assert!(matches!(returned(&module, 0).kind, ExpressionKind::BinOp(_)));
}

#[test]
fn test_division_by_zero() {
    let error = fold("@external\ndef f() -> uint256:\n    return 1 / 0\n").unwrap_err();
    assert!(matches!(error, CompilerError::ZeroDivision { .. }));
}

#[test]
fn test_out_of_range_result() {
    let error = fold("@external\ndef f() -> uint256:\n    return 2 ** 256\n").unwrap_err();
    assert!(matches!(error, CompilerError::LiteralOutOfRange { .. }));
}

#[test]
fn test_word_boundaries_are_in_range() {
    let module = fold("@external\ndef f() -> uint256:\n    return 2 ** 255 - 1 + 2 ** 255\n").unwrap();
    let expected = (BigInt::from(1) << 256usize) - 1;
    assert_eq!(returned(&module, 0).as_int(), Some(&expected));
}

#[test]
fn test_literal_conditionals_pick_a_branch() {
    let module = fold(
        "FLAG: constant(bool) = True\n\n@external\ndef f() -> uint256:\n    return 1 if FLAG else 2\n\n\
         @external\ndef g(a: uint256) -> uint256:\n    return 3 if a > 0 else 4\n",
    )
    .unwrap();
    assert_eq!(returned(&module, 1).as_int(), Some(&BigInt::from(1)));
    assert!(matches!(
        returned(&module, 2).kind,
        ExpressionKind::IfExp(_)
    ));
}
