// Tests for expression parsing and operator precedence

use crate::*;
use num_bigint::BigInt;

fn parse_value(input: &str) -> Expression {
    let module = parse_module(&format!("x = {}\n", input)).unwrap();
    match &module.body[0].kind {
        StatementKind::Assign(assign) => assign.value.clone(),
        other => panic!("Expected assignment, got: {:?}", other),
    }
}

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    let expr = parse_value("a + b * c");
    match expr.kind {
        ExpressionKind::BinOp(op) => {
            assert_eq!(op.op, BinaryOperator::Add);
            assert_eq!(op.left.as_name(), Some("a"));
            match op.right.kind {
                ExpressionKind::BinOp(inner) => assert_eq!(inner.op, BinaryOperator::Mult),
                other => panic!("Expected multiplication, got: {:?}", other),
            }
        }
        other => panic!("Expected binary operation, got: {:?}", other),
    }
}

#[test]
fn test_power_is_right_associative() {
    let expr = parse_value("a ** b ** c");
    match expr.kind {
        ExpressionKind::BinOp(op) => {
            assert_eq!(op.op, BinaryOperator::Pow);
            assert_eq!(op.left.as_name(), Some("a"));
            assert!(matches!(op.right.kind, ExpressionKind::BinOp(_)));
        }
        other => panic!("Expected power, got: {:?}", other),
    }
}

#[test]
fn test_negation_applies_to_power() {
    let expr = parse_value("-y ** 2");
    match expr.kind {
        ExpressionKind::UnaryOp(op) => {
            assert_eq!(op.op, UnaryOperator::USub);
            assert!(matches!(op.operand.kind, ExpressionKind::BinOp(_)));
        }
        other => panic!("Expected unary minus, got: {:?}", other),
    }
}

#[test]
fn test_chained_comparison_is_flattened() {
    let expr = parse_value("a < b <= c");
    match expr.kind {
        ExpressionKind::Compare(cmp) => {
            assert_eq!(cmp.left.as_name(), Some("a"));
            assert_eq!(cmp.ops, vec![CompareOperator::Lt, CompareOperator::LtE]);
            assert_eq!(cmp.comparators.len(), 2);
        }
        other => panic!("Expected comparison, got: {:?}", other),
    }
}

#[test]
fn test_word_comparison_operators() {
    match parse_value("a not in b").kind {
        ExpressionKind::Compare(cmp) => assert_eq!(cmp.ops, vec![CompareOperator::NotIn]),
        other => panic!("Expected comparison, got: {:?}", other),
    }
    match parse_value("a is not None").kind {
        ExpressionKind::Compare(cmp) => {
            assert_eq!(cmp.ops, vec![CompareOperator::IsNot]);
            assert_eq!(cmp.comparators[0].kind, ExpressionKind::NoneLiteral);
        }
        other => panic!("Expected comparison, got: {:?}", other),
    }
}

#[test]
fn test_boolean_chain_is_flattened() {
    match parse_value("a or b or c").kind {
        ExpressionKind::BoolOp(op) => {
            assert_eq!(op.op, BoolOperator::Or);
            assert_eq!(op.values.len(), 3);
        }
        other => panic!("Expected boolean operation, got: {:?}", other),
    }
}

#[test]
fn test_and_binds_tighter_than_or() {
    match parse_value("a or b and c").kind {
        ExpressionKind::BoolOp(op) => {
            assert_eq!(op.op, BoolOperator::Or);
            assert_eq!(op.values.len(), 2);
            assert!(matches!(
                &op.values[1].kind,
                ExpressionKind::BoolOp(inner) if inner.op == BoolOperator::And
            ));
        }
        other => panic!("Expected boolean operation, got: {:?}", other),
    }
}

#[test]
fn test_not_wraps_comparison() {
    match parse_value("not a == b").kind {
        ExpressionKind::UnaryOp(op) => {
            assert_eq!(op.op, UnaryOperator::Not);
            assert!(matches!(op.operand.kind, ExpressionKind::Compare(_)));
        }
        other => panic!("Expected not, got: {:?}", other),
    }
}

#[test]
fn test_call_with_keyword_arguments() {
    match parse_value("f(1, y=2)").kind {
        ExpressionKind::Call(call) => {
            assert_eq!(call.func.as_name(), Some("f"));
            assert_eq!(call.args.len(), 1);
            assert_eq!(call.keywords.len(), 1);
            assert_eq!(call.keywords[0].arg.as_deref(), Some("y"));
        }
        other => panic!("Expected call, got: {:?}", other),
    }
}

#[test]
fn test_equality_argument_is_not_a_keyword() {
    match parse_value("f(a == b)").kind {
        ExpressionKind::Call(call) => {
            assert!(call.keywords.is_empty());
            assert!(matches!(call.args[0].kind, ExpressionKind::Compare(_)));
        }
        other => panic!("Expected call, got: {:?}", other),
    }
}

#[test]
fn test_attribute_and_subscript_trailers() {
    let expr = parse_value("self.balances[owner]");
    match expr.kind {
        ExpressionKind::Subscript(sub) => {
            assert_eq!(sub.value.dotted_path().as_deref(), Some("self.balances"));
            assert_eq!(sub.slice.as_name(), Some("owner"));
        }
        other => panic!("Expected subscript, got: {:?}", other),
    }
}

#[test]
fn test_subscript_with_several_indices_is_a_tuple() {
    match parse_value("HashMap[address, uint256]").kind {
        ExpressionKind::Subscript(sub) => match sub.slice.kind {
            ExpressionKind::Tuple(tuple) => assert_eq!(tuple.elts.len(), 2),
            other => panic!("Expected tuple index, got: {:?}", other),
        },
        other => panic!("Expected subscript, got: {:?}", other),
    }
}

#[test]
fn test_parenthesized_forms() {
    assert!(matches!(parse_value("(1)").kind, ExpressionKind::Int(_)));
    match parse_value("(1,)").kind {
        ExpressionKind::Tuple(tuple) => assert_eq!(tuple.elts.len(), 1),
        other => panic!("Expected tuple, got: {:?}", other),
    }
    match parse_value("()").kind {
        ExpressionKind::Tuple(tuple) => assert!(tuple.elts.is_empty()),
        other => panic!("Expected empty tuple, got: {:?}", other),
    }
}

#[test]
fn test_collection_displays() {
    match parse_value("[1, 2, 3]").kind {
        ExpressionKind::List(list) => assert_eq!(list.elts.len(), 3),
        other => panic!("Expected list, got: {:?}", other),
    }
    match parse_value("{\"a\": 1, \"b\": 2}").kind {
        ExpressionKind::Dict(dict) => {
            assert_eq!(dict.keys.len(), 2);
            assert_eq!(dict.values.len(), 2);
        }
        other => panic!("Expected dict, got: {:?}", other),
    }
}

#[test]
fn test_integer_formats() {
    let cases = [
        ("255", IntegerFormat::Decimal),
        ("0xff", IntegerFormat::Hexadecimal),
        ("0b11111111", IntegerFormat::Binary),
        ("0o377", IntegerFormat::Octal),
    ];
    for (input, format) in cases {
        match parse_value(input).kind {
            ExpressionKind::Int(int) => {
                assert_eq!(int.value, BigInt::from(255), "value of {}", input);
                assert_eq!(int.format, format, "format of {}", input);
            }
            other => panic!("Expected integer for {}, got: {:?}", input, other),
        }
    }
}

#[test]
fn test_integer_beyond_machine_width() {
    let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
    match parse_value(max).kind {
        ExpressionKind::Int(int) => assert_eq!(int.value.to_string(), max),
        other => panic!("Expected integer, got: {:?}", other),
    }
}

#[test]
fn test_literals() {
    assert_eq!(
        parse_value("1.5").kind,
        ExpressionKind::Decimal(DecimalLiteral {
            value: "1.5".to_string()
        })
    );
    assert_eq!(
        parse_value("'hi'").kind,
        ExpressionKind::Str(StringLiteral {
            value: "hi".to_string(),
            quote: QuoteStyle::Single,
            prefix: String::new(),
        })
    );
    assert_eq!(
        parse_value("True").kind,
        ExpressionKind::Bool(BooleanLiteral { value: true })
    );
    assert_eq!(parse_value("None").kind, ExpressionKind::NoneLiteral);
}

#[test]
fn test_await_expression() {
    let module = parse_module("async def f():\n    x = await g()\n").unwrap();
    let StatementKind::FunctionDef(def) = &module.body[0].kind else {
        panic!("Expected function definition");
    };
    assert!(def.is_async);
    match &def.body[0].kind {
        StatementKind::Assign(assign) => {
            assert!(matches!(assign.value.kind, ExpressionKind::Await(_)))
        }
        other => panic!("Expected assignment, got: {:?}", other),
    }
}

#[test]
fn test_keyword_prefixed_identifiers() {
    for name in ["int128", "is_owner", "notify", "orders", "asserted", "define"] {
        assert_eq!(parse_value(name).as_name(), Some(name));
    }
}

#[test]
fn test_conditional_expression() {
    match parse_value("a if b else c").kind {
        ExpressionKind::IfExp(if_exp) => {
            assert_eq!(if_exp.body.as_name(), Some("a"));
            assert_eq!(if_exp.test.as_name(), Some("b"));
            assert_eq!(if_exp.orelse.as_name(), Some("c"));
        }
        other => panic!("Expected conditional, got: {:?}", other),
    }
}

#[test]
fn test_lambda_parameters() {
    match parse_value("lambda x, *rest, y=1: x").kind {
        ExpressionKind::Lambda(lambda) => {
            let kinds: Vec<_> = lambda.args.iter().map(|p| p.kind).collect();
            assert_eq!(
                kinds,
                vec![
                    ParameterKind::Positional,
                    ParameterKind::VarPositional,
                    ParameterKind::Positional
                ]
            );
            assert!(lambda.args[2].default.is_some());
            assert_eq!(lambda.body.as_name(), Some("x"));
        }
        other => panic!("Expected lambda, got: {:?}", other),
    }
}

#[test]
fn test_slices() {
    match parse_value("a[1:2]").kind {
        ExpressionKind::Subscript(sub) => match sub.slice.kind {
            ExpressionKind::Slice(slice) => {
                assert_eq!(slice.lower.and_then(|e| e.as_int().cloned()), Some(BigInt::from(1)));
                assert_eq!(slice.upper.and_then(|e| e.as_int().cloned()), Some(BigInt::from(2)));
                assert!(slice.step.is_none());
            }
            other => panic!("Expected slice, got: {:?}", other),
        },
        other => panic!("Expected subscript, got: {:?}", other),
    }
    match parse_value("a[::3]").kind {
        ExpressionKind::Subscript(sub) => match sub.slice.kind {
            ExpressionKind::Slice(slice) => {
                assert!(slice.lower.is_none());
                assert!(slice.upper.is_none());
                assert!(slice.step.is_some());
            }
            other => panic!("Expected slice, got: {:?}", other),
        },
        other => panic!("Expected subscript, got: {:?}", other),
    }
}

#[test]
fn test_unpacked_call_arguments() {
    match parse_value("f(a, *b, **c)").kind {
        ExpressionKind::Call(call) => {
            assert_eq!(call.args.len(), 2);
            match &call.args[1].kind {
                ExpressionKind::Starred(starred) => assert_eq!(starred.value.as_name(), Some("b")),
                other => panic!("Expected starred argument, got: {:?}", other),
            }
            assert_eq!(call.keywords.len(), 1);
            assert_eq!(call.keywords[0].arg, None);
            assert_eq!(call.keywords[0].value.as_name(), Some("c"));
        }
        other => panic!("Expected call, got: {:?}", other),
    }
}

#[test]
fn test_comprehensions() {
    match parse_value("[i for i in y if i if j]").kind {
        ExpressionKind::ListComp(comp) => {
            assert_eq!(comp.elt.as_name(), Some("i"));
            assert_eq!(comp.generators.len(), 1);
            assert_eq!(comp.generators[0].iter.as_name(), Some("y"));
            assert_eq!(comp.generators[0].ifs.len(), 2);
        }
        other => panic!("Expected list comprehension, got: {:?}", other),
    }
    match parse_value("{k: v for k, v in d for z in k}").kind {
        ExpressionKind::DictComp(comp) => {
            assert_eq!(comp.generators.len(), 2);
            assert!(matches!(comp.generators[0].target.kind, ExpressionKind::Tuple(_)));
        }
        other => panic!("Expected dict comprehension, got: {:?}", other),
    }
    assert!(matches!(parse_value("{i for i in y}").kind, ExpressionKind::SetComp(_)));
    assert!(matches!(parse_value("(i for i in y)").kind, ExpressionKind::GeneratorExp(_)));
    assert!(matches!(parse_value("{1, 2}").kind, ExpressionKind::Set(_)));

    match parse_value("sum(i for i in y)").kind {
        ExpressionKind::Call(call) => {
            assert_eq!(call.args.len(), 1);
            assert!(matches!(call.args[0].kind, ExpressionKind::GeneratorExp(_)));
        }
        other => panic!("Expected call, got: {:?}", other),
    }
}

#[test]
fn test_string_prefixes_and_digit_separators() {
    match parse_value("rb'\\x00'").kind {
        ExpressionKind::Str(string) => {
            assert_eq!(string.prefix, "rb");
            assert_eq!(string.value, "\\x00");
        }
        other => panic!("Expected string, got: {:?}", other),
    }
    assert_eq!(parse_value("1_000_000").as_int(), Some(&BigInt::from(1_000_000)));
    match parse_value("1.5e-3").kind {
        ExpressionKind::Decimal(decimal) => assert_eq!(decimal.value, "1.5e-3"),
        other => panic!("Expected decimal, got: {:?}", other),
    }
}
