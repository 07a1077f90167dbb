use crate::*;
use pretty_assertions::assert_eq;

fn reconstruct(input: &str) -> String {
    format!("{}", parse_module(input).unwrap())
}

#[test]
fn test_source_reconstruction_is_stable_for_canonical_text() {
    let inputs = [
        "x = 1\n",
        "x = a + b * c\n",
        "x = (a + b) * c\n",
        "x = a - (b - c)\n",
        "x = (a ** b) ** c\n",
        "x = -a ** 2\n",
        "x = (-a) ** 2\n",
        "x = not (a or b)\n",
        "x = a < b <= c\n",
        "x = a not in b and c is not None\n",
        "x = f(1, key=2)\n",
        "x = m[a, b]\n",
        "x = (1,)\n",
        "x = [1, 2]\n",
        "x = {1: 2}\n",
        "x = 0xff\n",
        "x = 'single'\n",
        "a, b = b, a\n",
        "self.total += 1\n",
        "owner: public(address)\n",
        "from vyper.interfaces import ERC20 as Token\n",
        "assert x > 0, \"negative\"\n",
    ];

    for input in &inputs {
        assert_eq!(reconstruct(input), *input, "reconstruction of {:?}", input);
    }
}

#[test]
fn test_source_reconstruction_of_definitions() {
    let input = "storedData: public(int128)\n\n@external\ndef __init__(_x: int128):\n    self.storedData = _x\n\n@external\ndef set(_x: int128) -> bool:\n    if _x > 0:\n        self.storedData = _x\n    elif _x == 0:\n        pass\n    else:\n        return False\n    return True\n";
    assert_eq!(reconstruct(input), input);
}

#[test]
fn test_source_reconstruction_normalizes_layout() {
    assert_eq!(reconstruct("def f(): pass"), "def f():\n    pass\n");
    assert_eq!(reconstruct("x = ( 1 )  # note\n"), "x = 1\n");
    assert_eq!(reconstruct("x=y\n\n\n\nz=1"), "x = y\nz = 1\n");
}

#[test]
fn test_class_keyword_comes_from_kind() {
    let module = parse_to_ast("struct Point:\n    x: int128\n", 0).unwrap();
    assert_eq!(format!("{}", module), "struct Point:\n    x: int128\n");
}

#[test]
fn test_empty_body_is_printed_as_pass() {
    let mut module = parse_module("def f():\n    x = 1\n").unwrap();
    if let StatementKind::FunctionDef(def) = &mut module.body[0].kind {
        def.body.clear();
    }
    assert_eq!(format!("{}", module), "def f():\n    pass\n");
}
