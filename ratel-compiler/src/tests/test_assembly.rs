use crate::error::{CompilerError, CompilerWarning};
use crate::phases::assembly::{
    assemble, debug_occurrences, debug_warnings, literal_bytes, AsmItem, AsmListing,
};
use crate::phases::bytecode::{disassemble, emit, to_hex};
use crate::phases::ir::IrNode;
use crate::phases::optimizer::optimize;
use crate::settings::{CompilerSettings, EvmVersion};
use num_bigint::BigInt;
use pretty_assertions::assert_eq;

fn op(name: &str, args: Vec<IrNode>) -> IrNode {
    IrNode::op(name, args)
}

fn int(value: i64) -> IrNode {
    IrNode::int(value)
}

fn mstore(offset: i64, value: i64) -> IrNode {
    op("mstore", vec![int(offset), int(value)])
}

fn bytes_of(ir: &IrNode) -> Vec<u8> {
    let items = assemble(ir, &CompilerSettings::default()).unwrap();
    emit(&items).unwrap()
}

#[test]
fn test_literal_bytes() {
    assert_eq!(literal_bytes(&BigInt::from(0)).unwrap(), vec![0]);
    assert_eq!(literal_bytes(&BigInt::from(256)).unwrap(), vec![1, 0]);
    assert_eq!(literal_bytes(&BigInt::from(-1)).unwrap(), vec![0xff; 32]);

    let too_big = BigInt::from(1) << 256usize;
    assert!(matches!(
        literal_bytes(&too_big),
        Err(CompilerError::LiteralOutOfRange { .. })
    ));
}

#[test]
fn test_arguments_are_pushed_in_reverse() {
    let ir = op("seq", vec![mstore(0, 1), op("return", vec![int(0), int(32)])]);
    let code = bytes_of(&ir);
    assert_eq!(
        code,
        vec![0x60, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3]
    );
    assert_eq!(
        disassemble(&code),
        "PUSH1 0x01 PUSH1 0x00 MSTORE PUSH1 0x20 PUSH1 0x00 RETURN"
    );
    assert_eq!(to_hex(&code), "0x600160005260206000f3");
}

#[test]
fn test_if_jumps_past_the_branch() {
    let ir = op("if", vec![int(1), mstore(0, 1)]);
    assert_eq!(
        bytes_of(&ir),
        vec![0x60, 0x01, 0x15, 0x61, 0x00, 0x0c, 0x57, 0x60, 0x01, 0x60, 0x00, 0x52, 0x5b]
    );
}

#[test]
fn test_deploy_copies_the_runtime_subprogram() {
    let ir = op("deploy", vec![op("stop", Vec::new())]);
    let items = assemble(&ir, &CompilerSettings::default()).unwrap();
    assert_eq!(
        AsmListing(&items).to_string(),
        "_sym_runtime0_size DUP1 _sym_runtime0 PUSH1 0x00 CODECOPY PUSH1 0x00 RETURN _sym_runtime0 { STOP }"
    );
    assert_eq!(
        emit(&items).unwrap(),
        vec![0x61, 0x00, 0x01, 0x80, 0x61, 0x00, 0x0d, 0x60, 0x00, 0x39, 0x60, 0x00, 0xf3, 0x00]
    );
}

#[test]
fn test_codelen_is_the_total_size() {
    let ir = op(
        "codecopy",
        vec![int(0), op("codelen", Vec::new()), int(32)],
    );
    assert_eq!(
        bytes_of(&ir),
        vec![0x60, 0x20, 0x61, 0x00, 0x08, 0x60, 0x00, 0x39]
    );
}

#[test]
fn test_repeat_listing() {
    let ir = op("repeat", vec![int(320), int(0), int(2), mstore(0, 1)]);
    let items = assemble(&ir, &CompilerSettings::default()).unwrap();
    assert_eq!(
        AsmListing(&items).to_string(),
        "PUSH1 0x00 PUSH2 0x0140 MSTORE PUSH1 0x02 _sym_loop0 JUMPDEST \
         PUSH1 0x01 PUSH1 0x00 MSTORE _sym_loop_continue1 JUMPDEST \
         PUSH1 0x01 PUSH2 0x0140 MLOAD ADD PUSH2 0x0140 MSTORE \
         PUSH1 0x01 SWAP1 SUB DUP1 _sym_loop0 JUMPI _sym_loop_exit2 JUMPDEST POP"
    );
    assert!(emit(&items).is_ok());
}

#[test]
fn test_valued_top_level_is_popped() {
    let items = assemble(&op("mload", vec![int(0)]), &CompilerSettings::default()).unwrap();
    assert_eq!(AsmListing(&items).to_string(), "PUSH1 0x00 MLOAD POP");
}

#[test]
fn test_undefined_label() {
    let error = emit(&[AsmItem::PushLabel("nowhere".to_string())]).unwrap_err();
    assert_eq!(
        error,
        CompilerError::UndefinedLabel {
            label: "nowhere".to_string()
        }
    );
}

#[test]
fn test_opcode_availability() {
    let ir = op("shl", vec![int(1), int(2)]);
    let byzantium = CompilerSettings::default().with_evm_version(EvmVersion::Byzantium);
    assert_eq!(
        assemble(&ir, &byzantium).unwrap_err(),
        CompilerError::OpcodeUnavailable {
            opcode: "SHL".to_string(),
            since: "constantinople".to_string(),
            target: "byzantium".to_string(),
        }
    );

    let constantinople = CompilerSettings::default().with_evm_version(EvmVersion::Constantinople);
    assert!(assemble(&ir, &constantinople).is_ok());
}

#[test]
fn test_wrong_arity_is_a_panic() {
    let error = assemble(&op("mstore", vec![int(0)]), &CompilerSettings::default()).unwrap_err();
    assert!(matches!(error, CompilerError::Panic { .. }));
}

#[test]
fn test_debugger_occurrences() {
    let ir = op(
        "seq",
        vec![
            op("debugger", Vec::new()),
            op("deploy", vec![op("debugger", Vec::new())]),
        ],
    );
    let items = assemble(&ir, &CompilerSettings::default()).unwrap();
    assert_eq!(debug_occurrences(&items), 2);
    assert_eq!(
        debug_warnings(&items),
        vec![CompilerWarning::DebugOpcode { occurrences: 2 }]
    );
    let plain = assemble(&mstore(0, 1), &CompilerSettings::default()).unwrap();
    assert!(debug_warnings(&plain).is_empty());
}

#[test]
fn test_disassemble_unknown_bytes() {
    assert_eq!(disassemble(&[0x0c, 0x00]), "INVALID STOP");
    assert_eq!(disassemble(&[0x61, 0x01]), "PUSH2 0x01");
}

#[test]
fn test_optimizer_folds_arithmetic() {
    assert_eq!(optimize(&op("add", vec![int(1), int(2)])), int(3));
    assert_eq!(optimize(&op("sub", vec![int(0), int(5)])), int(-5));
    assert_eq!(optimize(&op("div", vec![int(7), int(0)])), int(0));
    assert_eq!(optimize(&op("mod", vec![int(7), int(0)])), int(0));
    assert_eq!(
        optimize(&op("mul", vec![op("add", vec![int(1), int(1)]), int(4)])),
        int(8)
    );
    assert_eq!(optimize(&op("lt", vec![int(-1), int(1)])), int(0));

    let dynamic = op("add", vec![op("mload", vec![int(0)]), int(1)]);
    assert_eq!(optimize(&dynamic), dynamic);
}

#[test]
fn test_optimizer_resolves_static_branches() {
    assert_eq!(optimize(&op("if", vec![int(0), mstore(0, 1)])), IrNode::pass());
    assert_eq!(optimize(&op("if", vec![int(7), mstore(0, 1)])), mstore(0, 1));
    assert_eq!(
        optimize(&op("if", vec![int(0), mstore(0, 1), mstore(0, 2)])),
        mstore(0, 2)
    );
    assert_eq!(optimize(&op("assert", vec![int(1)])), IrNode::pass());
    assert_eq!(
        optimize(&op("assert", vec![int(0)])),
        op("assert", vec![int(0)])
    );
}

#[test]
fn test_optimizer_flattens_sequences() {
    let nested = op(
        "seq",
        vec![
            op("seq", vec![mstore(0, 1), mstore(0, 2)]),
            IrNode::pass(),
            mstore(0, 3),
        ],
    );
    assert_eq!(
        optimize(&nested).to_string(),
        "(seq (mstore 0 1) (mstore 0 2) (mstore 0 3))"
    );
    assert_eq!(
        optimize(&op("seq", vec![IrNode::pass(), mstore(0, 1)])),
        mstore(0, 1)
    );
    assert_eq!(optimize(&op("seq", vec![IrNode::pass()])), IrNode::pass());
}

#[test]
fn test_optimizer_keeps_trailing_pass_after_a_value() {
    let valued = op("seq", vec![op("mload", vec![int(0)]), IrNode::pass()]);
    assert_eq!(optimize(&valued), valued);
}
