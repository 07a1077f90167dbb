// Regenerated source parses back to the same tree

use pretty_assertions::assert_eq;
use ratel_parser::{parse_module, parse_to_ast};

const CONTRACT: &str = r#"# Simple storage with an auction flavour
from vyper.interfaces import ERC20

struct Bid:
    bidder: address
    amount: uint256

event Placed:
    bidder: indexed(address)
    amount: uint256

interface Oracle:
    def price() -> uint256: view

MAX_BIDS: constant(uint256) = 10
bids: public(HashMap[address, Bid])
total: uint256

@external
def __init__():
    self.total = 0

@external
@payable
def bid():
    """
    @notice Place a bid
    """
    assert msg.value > 0, "empty bid"
    self.bids[msg.sender] = Bid({bidder: msg.sender, amount: msg.value})
    self.total += msg.value
    log.Placed(msg.sender, msg.value)

@view
@external
def spread(a: int128, b: int128) -> int128:
    if a > b and not (a == 0 or b == 0):
        return a - b
    elif a < b:
        return -(b - a) ** 2
    else:
        return (a + b) // 2 % 3

@mpc
async def multiply(a, b):
    for i in range(3):
        continue
    return await (a * b), (a, b)
"#;

#[test]
fn test_parse_unparse_parse_is_structurally_stable() {
    let first = parse_to_ast(CONTRACT, 0).unwrap();
    let regenerated = first.to_string();
    let second = parse_to_ast(&regenerated, 0).unwrap();
    assert_eq!(second.without_spans(), first.without_spans());
}

#[test]
fn test_regeneration_is_a_fixed_point() {
    let first = parse_to_ast(CONTRACT, 0).unwrap().to_string();
    let second = parse_to_ast(&first, 0).unwrap().to_string();
    assert_eq!(second, first);
}

#[test]
fn test_plain_python_round_trip() {
    let source = "def f(x, y=2):\n    while x:\n        x -= 1\n    return [x, y]\n";
    let first = parse_module(source).unwrap();
    let second = parse_module(&first.to_string()).unwrap();
    assert_eq!(second.without_spans(), first.without_spans());
}

const PYTHON_FORMS: &str = r#"from . import sibling
from ..pkg.mod import *

async def main(ctx, *args, **kwargs):
    squares = [i * i for i in args if i]
    evens = {i for i in range(10) if i % 2 == 0}
    index = {k: v for k, v in kwargs.items()}
    total = sum(x for x in squares)
    pairs = [(a, b) for a in xs for b in ys]
    pick = a if b else c
    scale = lambda x, y=2: x * y
    head = args[1:2]
    tail = args[::2]
    column = grid[:, 0]
    result = f(a, *b, **c)
    first, *rest = args
    ratio = 1.5e3
    raw = b'bytes'
    global counter
    del cache[0], scratch
    try:
        x = 1
    except ValueError as err:
        raise
    except (KeyError, IndexError):
        pass
    else:
        y = 2
    finally:
        z = 3
    with open(path) as handle, lock:
        data = handle.read()
    async with ctx.session() as session:
        await session.run()
    async for item in stream:
        continue
    return await ctx.done() if pick else None
"#;

fn assert_round_trip(source: &str, regenerated: &str) {
    let first = parse_module(source).unwrap();
    assert_eq!(first.to_string(), regenerated);
    let second = parse_module(regenerated).unwrap();
    assert_eq!(second.without_spans(), first.without_spans());
    assert_eq!(second.to_string(), regenerated);
}

#[test]
fn test_python_forms_round_trip() {
    assert_round_trip(PYTHON_FORMS, PYTHON_FORMS);
}

#[test]
fn test_comprehensions_round_trip() {
    assert_round_trip("x = [i for i in y]", "x = [i for i in y]\n");
    assert_round_trip(
        "x = [i for i in y\n     if i > 1]",
        "x = [i for i in y if i > 1]\n",
    );
    assert_round_trip("x = {k: v for k, v in d}", "x = {k: v for k, v in d}\n");
    assert_round_trip("x = {i for i in y}", "x = {i for i in y}\n");
    assert_round_trip("x = (i for i in y)", "x = (i for i in y)\n");
    assert_round_trip("x = any(i for i in y)", "x = any(i for i in y)\n");
    assert_round_trip(
        "x = [(i if i else 0) for i in (a or b)]",
        "x = [i if i else 0 for i in a or b]\n",
    );
}

#[test]
fn test_conditional_expressions_round_trip() {
    assert_round_trip("x = a if b else c", "x = a if b else c\n");
    assert_round_trip("x = a if b else c if d else e", "x = a if b else c if d else e\n");
    assert_round_trip("x = (a if b else c) + 1", "x = (a if b else c) + 1\n");
    assert_round_trip("x = (a if b else c) if d else e", "x = (a if b else c) if d else e\n");
    assert_round_trip("f = lambda: 0", "f = lambda: 0\n");
}

#[test]
fn test_slices_round_trip() {
    assert_round_trip("x = a[1:2]", "x = a[1:2]\n");
    assert_round_trip("x = a[1:]", "x = a[1:]\n");
    assert_round_trip("x = a[:-1]", "x = a[:-1]\n");
    assert_round_trip("x = a[::2]", "x = a[::2]\n");
    assert_round_trip("x = a[1:2:3]", "x = a[1:2:3]\n");
    assert_round_trip("x = a[:, 0]", "x = a[:, 0]\n");
}

#[test]
fn test_starred_arguments_round_trip() {
    assert_round_trip("x = f(a, *b, **c)", "x = f(a, *b, **c)\n");
    assert_round_trip("x = f(*b, key=1, **c)", "x = f(*b, key=1, **c)\n");
    assert_round_trip("def f(a, *args, **kwargs):\n    pass", "def f(a, *args, **kwargs):\n    pass\n");
    assert_round_trip("a, *b = c", "a, *b = c\n");
}

#[test]
fn test_try_and_with_round_trip() {
    assert_round_trip("try:\n    pass\nexcept:\n    pass", "try:\n    pass\nexcept:\n    pass\n");
    assert_round_trip(
        "try:\n    f()\nfinally:\n    g()\n",
        "try:\n    f()\nfinally:\n    g()\n",
    );
    assert_round_trip(
        "def f():\n    try:\n        return 1\n    except E as e:\n        return 2\n    else:\n        pass\n",
        "def f():\n    try:\n        return 1\n    except E as e:\n        return 2\n    else:\n        pass\n",
    );
    assert_round_trip("with a as b, c:\n    pass", "with a as b, c:\n    pass\n");
    assert_round_trip(
        "with (\n    a as b,\n    c,\n):\n    pass",
        "with a as b, c:\n    pass\n",
    );
}

#[test]
fn test_simple_statement_forms_round_trip() {
    assert_round_trip("x = 1; y = 2", "x = 1\ny = 2\n");
    assert_round_trip("if x: a = 1; b = 2", "if x:\n    a = 1\n    b = 2\n");
    assert_round_trip("del a[0], b", "del a[0], b\n");
    assert_round_trip(
        "def f():\n    global a, b\n    nonlocal c",
        "def f():\n    global a, b\n    nonlocal c\n",
    );
    assert_round_trip("from .a.b import c", "from .a.b import c\n");
    assert_round_trip("from ... import (\n    c,\n    d,\n)", "from ... import c, d\n");
}

#[test]
fn test_literal_spellings() {
    assert_round_trip("x = 1_000", "x = 1000\n");
    assert_round_trip("x = 0xff_ff", "x = 0xffff\n");
    assert_round_trip("x = 1.5e3", "x = 1.5e3\n");
    assert_round_trip("x = .5", "x = .5\n");
    assert_round_trip("x = b''", "x = b''\n");
    assert_round_trip("x = rb\"\\d\"", "x = rb\"\\d\"\n");
}
