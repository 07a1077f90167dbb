use super::{context, STORAGE};
use crate::error::CompilerError;
use crate::phases::codegen::generate_ir;
use crate::phases::ir::IrNode;
use crate::settings::{CompilerSettings, EvmVersion};
use num_bigint::BigInt;

fn lower_with(source: &str, settings: CompilerSettings) -> Result<(IrNode, IrNode), CompilerError> {
    generate_ir(&context(source)?, &settings)
}

fn lower(source: &str) -> Result<(IrNode, IrNode), CompilerError> {
    lower_with(source, CompilerSettings::default())
}

/// True when some subtree prints exactly as `expected`
fn has_node(ir: &IrNode, expected: &str) -> bool {
    ir.walk().any(|node| node.to_string() == expected)
}

#[test]
fn test_runtime_dispatch() {
    let (_, runtime) = lower(STORAGE).unwrap();
    let IrNode { args, .. } = &runtime;
    assert!(runtime.is_op("seq"));
    let selector = &args[0];
    assert!(selector.is_op("mstore"));
    assert_eq!(selector.args[1].args[0].to_string(), "(calldataload 0)");
    assert_eq!(
        selector.args[1].args[1].as_int(),
        Some(&(BigInt::from(1) << 224usize))
    );
    assert_eq!(args.last().unwrap().to_string(), "(revert 0 0)");
    // one branch per external function, constructor excluded
    let branches = args.iter().filter(|node| node.is_op("if")).count();
    assert_eq!(branches, 2);
    assert!(has_node(&runtime, "(sstore 0 (calldataload 4))"));
    assert!(has_node(&runtime, "(assert (iszero callvalue))"));
}

#[test]
fn test_getter_returns_the_stored_word() {
    let (_, runtime) = lower(STORAGE).unwrap();
    assert!(has_node(&runtime, "(mstore 256 (sload 0))"));
    assert!(has_node(&runtime, "(return 256 32)"));
}

#[test]
fn test_deploy_runs_constructor_then_deploys_runtime() {
    let (deploy, runtime) = lower(STORAGE).unwrap();
    assert!(has_node(&deploy, "(codecopy 320 codelen 32)"));
    assert!(has_node(&deploy, "(sstore 0 (mload 320))"));
    let last = deploy.args.last().unwrap();
    assert!(last.is_op("deploy"));
    assert_eq!(last.args[0], runtime);
}

#[test]
fn test_payable_functions_skip_the_value_check() {
    let (_, runtime) = lower("@external\n@payable\ndef fund():\n    pass\n").unwrap();
    assert!(!has_node(&runtime, "(assert (iszero callvalue))"));
}

#[test]
fn test_mapping_and_struct_slots() {
    let source = "\
struct Point:
    x: uint256
    y: uint256

balances: HashMap[address, uint256]
origin: Point

@external
def deposit(amount: uint256):
    self.balances[msg.sender] = amount
    self.origin.y = amount
";
    let (_, runtime) = lower(source).unwrap();
    assert!(has_node(&runtime, "(sstore (sha3_64 caller 0) (calldataload 4))"));
    assert!(has_node(&runtime, "(sstore (add 1 1) (calldataload 4))"));
}

#[test]
fn test_mapping_getter_hashes_each_key() {
    let (_, runtime) = lower("allowed: public(HashMap[address, HashMap[address, bool]])\n").unwrap();
    assert!(has_node(
        &runtime,
        "(sload (sha3_64 (calldataload 36) (sha3_64 (calldataload 4) 0)))"
    ));
}

#[test]
fn test_signed_operations() {
    let source = "\
@external
@pure
def below(a: int128, b: int128) -> bool:
    return a < b

@external
@pure
def half(a: int128) -> int128:
    return a / 2
";
    let (_, runtime) = lower(source).unwrap();
    assert!(has_node(&runtime, "(slt (calldataload 4) (calldataload 36))"));
    assert!(has_node(&runtime, "(sdiv (calldataload 4) 2)"));
}

#[test]
fn test_unsigned_shift_operand_order() {
    let (_, runtime) =
        lower("@external\n@pure\ndef f(a: uint256) -> uint256:\n    return a >> 3\n").unwrap();
    assert!(has_node(&runtime, "(shr 3 (calldataload 4))"));
}

#[test]
fn test_range_loop() {
    let source = "\
total: uint256

@external
def accumulate():
    for i in range(3):
        self.total += i
";
    let (_, runtime) = lower(source).unwrap();
    assert!(has_node(
        &runtime,
        "(repeat 320 0 3 (seq (sstore 0 (add (sload 0) (mload 320)))))"
    ));
}

#[test]
fn test_event_log() {
    let source = "\
event Sent:
    receiver: indexed(address)
    value: uint256

@external
def notify(value: uint256):
    log.Sent(msg.sender, value)
";
    let (_, runtime) = lower(source).unwrap();
    let log = runtime
        .walk()
        .find(|node| node.is_op("log2"))
        .expect("log2 node");
    assert_eq!(log.args[0].to_string(), "320");
    assert_eq!(log.args[1].to_string(), "32");
    assert_eq!(log.args[3].to_string(), "caller");
    assert!(has_node(&runtime, "(mstore 320 (calldataload 4))"));
}

#[test]
fn test_self_balance_depends_on_evm_version() {
    let source = "@external\n@view\ndef funds() -> uint256:\n    return self.balance\n";
    let (_, istanbul) = lower(source).unwrap();
    assert!(has_node(&istanbul, "selfbalance"));

    let settings = CompilerSettings::default().with_evm_version(EvmVersion::Petersburg);
    let (_, petersburg) = lower_with(source, settings).unwrap();
    assert!(has_node(&petersburg, "(balance address)"));
}

#[test]
fn test_vdb_lowers_to_debugger() {
    let (_, runtime) = lower("@external\ndef f():\n    vdb\n").unwrap();
    assert!(has_node(&runtime, "debugger"));
}

#[test]
fn test_unsupported_constructs() {
    let cases = [
        "@external\ndef f():\n    while True:\n        pass\n",
        "@internal\ndef g():\n    pass\n\n@external\ndef f():\n    self.g()\n",
        "@external\n@pure\ndef f() -> uint256:\n    return 1.5\n",
    ];
    for source in cases {
        let error = lower(source).unwrap_err();
        assert!(
            matches!(error, CompilerError::Unsupported { .. }),
            "{:?} gave {:?}",
            source,
            error
        );
    }
}

#[test]
fn test_semantic_errors() {
    let cases = [
        "@external\n@pure\ndef f() -> uint256:\n    return y\n",
        "x: uint256\n\n@external\n@view\ndef f():\n    self.x = 1\n",
        "@external\n@view\ndef f() -> uint256:\n    return msg.value\n",
        "@external\ndef f():\n    break\n",
        "@external\ndef f() -> uint256:\n    return\n",
        "@external\ndef f(a: uint256):\n    a = 2\n",
        "@external\n@pure\ndef f(a: bool, b: bool) -> bool:\n    return a + b\n",
    ];
    for source in cases {
        let error = lower(source).unwrap_err();
        assert!(
            matches!(error, CompilerError::Structure { .. }),
            "{:?} gave {:?}",
            source,
            error
        );
    }
}

#[test]
fn test_python_only_forms_are_rejected() {
    let unsupported = [
        "@external\n@pure\ndef f(a: uint256, b: uint256) -> uint256:\n    return a if a > b else b\n",
        "@external\n@pure\ndef f(a: uint256) -> uint256:\n    return [a for i in range(a)]\n",
        "x: HashMap[uint256, uint256]\n\n@external\n@view\ndef f() -> uint256:\n    return self.x[1:2]\n",
        "@external\ndef f(*values):\n    pass\n",
        "@external\ndef f():\n    try:\n        pass\n    except:\n        pass\n",
        "@external\ndef f():\n    with self as s:\n        pass\n",
        "x: uint256\n\n@external\ndef f():\n    del self.x\n",
    ];
    for source in unsupported {
        let error = lower(source).unwrap_err();
        assert!(
            matches!(error, CompilerError::Unsupported { .. }),
            "{:?} gave {:?}",
            source,
            error
        );
    }

    let misplaced = [
        "@external\ndef f():\n    global x\n",
        "from .sibling import Oracle\n\n@external\ndef f():\n    pass\n",
    ];
    for source in misplaced {
        let error = lower(source).unwrap_err();
        assert!(
            matches!(error, CompilerError::Structure { .. }),
            "{:?} gave {:?}",
            source,
            error
        );
    }
}
