// IR optimizer
// Constant folding over 256-bit words and structural cleanup of sequences

use crate::phases::assembly::produces_value;
use crate::phases::ir::{IrNode, IrValue};
use lazy_static::lazy_static;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

lazy_static! {
    static ref MODULUS: BigInt = BigInt::one() << 256usize;
    static ref SIGN_BIT: BigInt = BigInt::one() << 255usize;
}

/// Optimize a tree bottom-up. Source positions are preserved on the nodes
/// that survive.
pub fn optimize(node: &IrNode) -> IrNode {
    let args: Vec<IrNode> = node.args.iter().map(optimize).collect();
    let Some(name) = node.op_name() else {
        return node.clone();
    };
    let optimized = match name {
        "seq" => simplify_seq(args),
        "if" => simplify_if(args),
        "assert" if args.first().and_then(constant).is_some_and(|v| !v.is_zero()) => {
            IrNode::pass()
        }
        _ => match fold(name, &args) {
            Some(value) => IrNode::int(value),
            None => IrNode {
                value: node.value.clone(),
                args,
                pos: None,
            },
        },
    };
    keep_pos(optimized, node.pos)
}

fn keep_pos(mut node: IrNode, pos: Option<ratel_parser::Span>) -> IrNode {
    if node.pos.is_none() {
        node.pos = pos;
    }
    node
}

fn constant(node: &IrNode) -> Option<BigInt> {
    match &node.value {
        IrValue::Int(value) => Some(to_word(value)),
        IrValue::Op(_) => None,
    }
}

fn to_word(value: &BigInt) -> BigInt {
    let word = value % &*MODULUS;
    if word.is_negative() {
        word + &*MODULUS
    } else {
        word
    }
}

/// Results with the sign bit set are written as negative literals
fn from_word(word: BigInt) -> BigInt {
    if word >= *SIGN_BIT {
        word - &*MODULUS
    } else {
        word
    }
}

fn fold(name: &str, args: &[IrNode]) -> Option<BigInt> {
    let values: Vec<BigInt> = args.iter().map(constant).collect::<Option<_>>()?;
    let bool_word = |value: bool| if value { BigInt::one() } else { BigInt::zero() };
    let word = match (name, values.as_slice()) {
        ("add", [a, b]) => a + b,
        ("sub", [a, b]) => a - b,
        ("mul", [a, b]) => a * b,
        ("div", [a, b]) if b.is_zero() => BigInt::zero(),
        ("div", [a, b]) => a / b,
        ("mod", [a, b]) if b.is_zero() => BigInt::zero(),
        ("mod", [a, b]) => a % b,
        ("and", [a, b]) => a & b,
        ("or", [a, b]) => a | b,
        ("xor", [a, b]) => a ^ b,
        ("iszero", [a]) => bool_word(a.is_zero()),
        ("eq", [a, b]) => bool_word(a == b),
        ("lt", [a, b]) => bool_word(a < b),
        ("gt", [a, b]) => bool_word(a > b),
        _ => return None,
    };
    Some(from_word(to_word(&word)))
}

fn simplify_if(mut args: Vec<IrNode>) -> IrNode {
    match args.first().and_then(constant) {
        Some(test) if !test.is_zero() => args.swap_remove(1),
        Some(_) if args.len() == 3 => args.swap_remove(2),
        Some(_) => IrNode::pass(),
        None => IrNode::op("if", args),
    }
}

fn simplify_seq(args: Vec<IrNode>) -> IrNode {
    let count = args.len();
    let mut children = Vec::with_capacity(count);
    for (i, child) in args.into_iter().enumerate() {
        let last = i + 1 == count;
        if child.is_op("seq") {
            let pos = child.pos;
            let mut inner = child.args.into_iter();
            if let Some(first) = inner.next() {
                children.push(keep_pos(first, pos));
            }
            children.extend(inner);
        } else if !child.is_op("pass") || (last && children.last().is_some_and(produces_value)) {
            children.push(child);
        }
    }

    match children.len() {
        0 => IrNode::pass(),
        1 => children.remove(0),
        _ => IrNode::seq(children),
    }
}
