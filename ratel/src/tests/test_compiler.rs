use super::{parse, MPC_CONTRACT};
use crate::compiler::{RatelCompiler, RatelOptions, SecondaryFormat};
use crate::error::RatelError;
use pretty_assertions::assert_eq;
use ratel_compiler::{CompilerError, ContractCompiler, EvmVersion};
use ratel_parser::{parse_module, ClassKind, ParseError, StatementKind};
use serde_json::json;

const PRIMARY: &str = "storedData: public(uint256)\n\n\
                       @external\ndef __init__(_x: uint256):\n    self.storedData = _x\n\n\
                       @external\ndef set(_x: uint256):\n    self.storedData = _x\n";

const SECONDARY: &str = "def multiply(a, b):\n    return a * b\n\n\
                         async def prog(ctx, x):\n    share = await ctx.preprocessing.get_share(x)\n    \
                         opened = await share.open()\n    return multiply(opened, 2)\n";

#[test]
fn test_extract_codes() {
    let artifacts = RatelCompiler::new().extract_codes(MPC_CONTRACT).unwrap();
    assert_eq!(artifacts.primary_source, PRIMARY);
    assert_eq!(artifacts.secondary_source, SECONDARY);
    // the parsed tree is kept unsplit
    assert_eq!(artifacts.tree, parse(MPC_CONTRACT));
}

#[test]
fn test_regenerated_sources_parse_on_their_own() {
    let artifacts = RatelCompiler::new().extract_codes(MPC_CONTRACT).unwrap();
    for text in [&artifacts.primary_source, &artifacts.secondary_source] {
        assert_eq!(&parse(text).to_string(), text);
    }
}

#[test]
fn test_class_types_are_partitioned() {
    let source = "struct Point:\n    x: uint256\n\nevent Moved:\n    to: uint256\n\n\
                  @mpc\nstruct Share:\n    value: uint256\n";
    let artifacts = RatelCompiler::new().extract_codes(source).unwrap();

    let primary: Vec<(&str, ClassKind)> = artifacts
        .class_types
        .primary
        .iter()
        .map(|(name, kind)| (name.as_str(), *kind))
        .collect();
    assert_eq!(
        primary,
        vec![("Point", ClassKind::Struct), ("Moved", ClassKind::Event)]
    );
    assert_eq!(artifacts.class_types.secondary.len(), 1);
    assert_eq!(
        artifacts.class_types.secondary.get("Share"),
        Some(&ClassKind::Struct)
    );
    assert!(artifacts.primary_source.starts_with("struct Point:\n"));
    assert_eq!(artifacts.secondary_source, "class Share:\n    value: uint256\n");
}

#[test]
fn test_secondary_classes_are_plain_python() {
    let source = "@mpc\nstruct S:\n    a: uint256\nstruct T:\n    b: uint256\n";
    let artifacts = RatelCompiler::new().extract_codes(source).unwrap();

    assert_eq!(artifacts.secondary_source, "class S:\n    a: uint256\n");
    assert_eq!(artifacts.primary_source, "struct T:\n    b: uint256\n");
    assert_eq!(
        artifacts.class_types.secondary.get("S"),
        Some(&ClassKind::Struct)
    );
    assert_eq!(
        artifacts.class_types.primary.get("T"),
        Some(&ClassKind::Struct)
    );

    // no Ratel-only keyword is left for a Python reader to trip over
    let reparsed = parse_module(&artifacts.secondary_source).unwrap();
    assert_eq!(reparsed.to_string(), artifacts.secondary_source);
}

#[test]
fn test_nested_tagged_definitions_stay_runnable() {
    let source = "@mpc\nasync def prog(ctx):\n    @mpc\n    def helper(x):\n        return x\n    \
                  @mpc\n    struct Pair:\n        a: uint256\n    return helper(ctx)\n";
    let artifacts = RatelCompiler::new().extract_codes(source).unwrap();

    assert_eq!(artifacts.primary_source, "");
    assert_eq!(
        artifacts.secondary_source,
        "async def prog(ctx):\n    def helper(x):\n        return x\n    \
         class Pair:\n        a: uint256\n    return helper(ctx)\n"
    );
    assert!(!artifacts.secondary_source.contains("@mpc"));

    // the helper is defined before it is called, inside the same function
    let reparsed = parse_module(&artifacts.secondary_source).unwrap();
    match &reparsed.body[..] {
        [stmt] => match &stmt.kind {
            StatementKind::FunctionDef(def) => {
                assert!(matches!(def.body[0].kind, StatementKind::FunctionDef(_)));
                assert!(matches!(def.body[1].kind, StatementKind::ClassDef(_)));
                assert!(matches!(def.body[2].kind, StatementKind::Return(_)));
            }
            other => panic!("expected a function, got {:?}", other),
        },
        other => panic!("expected one definition, got {:?}", other),
    }

    // splitting the regenerated text again changes nothing
    let again = RatelCompiler::new()
        .extract_codes(&artifacts.secondary_source)
        .unwrap();
    assert_eq!(again.primary_source, artifacts.secondary_source);
    assert_eq!(again.secondary_source, "");
}

#[test]
fn test_input_errors() {
    let error = RatelCompiler::new().extract_codes("x: uint256\0\n").unwrap_err();
    assert!(matches!(error, RatelError::Parse(ParseError::NullByte { .. })));

    let error = RatelCompiler::new().extract_codes("def (:\n").unwrap_err();
    assert!(matches!(error, RatelError::Parse(ParseError::Syntax { .. })));
}

#[test]
fn test_compile_both_domains() {
    let options = RatelOptions::default().with_output_formats(&["abi", "bytecode"]);
    let output = RatelCompiler::new().compile(MPC_CONTRACT, &options).unwrap();

    let formats: Vec<&str> = output
        .primary_domain
        .outputs
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(formats, vec!["abi", "bytecode"]);
    assert_eq!(
        output.secondary_domain.get("src_code"),
        Some(&json!(SECONDARY))
    );
}

#[test]
fn test_unsplit_source_is_not_a_contract() {
    // async definitions only make sense on the secondary side
    let error = ContractCompiler::default()
        .compile_code(MPC_CONTRACT, &["abi"], None)
        .unwrap_err();
    assert!(matches!(error.root(), CompilerError::Structure { .. }));
}

#[test]
fn test_unsupported_secondary_format_fails_before_compiling() {
    let options = RatelOptions::default().with_secondary_formats(&["src_code", "ast_dict"]);
    // the source is invalid too; the format check comes first
    let error = RatelCompiler::new()
        .compile("x: uint256\0\n", &options)
        .unwrap_err();
    assert_eq!(
        error,
        RatelError::UnsupportedCapability {
            format: "ast_dict".to_string()
        }
    );
}

#[test]
fn test_secondary_format_names() {
    assert_eq!("src_code".parse::<SecondaryFormat>(), Ok(SecondaryFormat::SourceCode));
    assert_eq!(SecondaryFormat::SourceCode.to_string(), "src_code");
    assert!(matches!(
        "str".parse::<SecondaryFormat>(),
        Err(RatelError::UnsupportedCapability { .. })
    ));

    let empty = RatelOptions::default().with_secondary_formats(&[]);
    let output = RatelCompiler::new().compile(MPC_CONTRACT, &empty).unwrap();
    assert_eq!(
        output.secondary_domain.keys().collect::<Vec<_>>(),
        vec!["src_code"]
    );
}

#[test]
fn test_primary_errors_propagate() {
    let source = "x: uint7\n\n@mpc\ndef f():\n    pass\n";
    let error = RatelCompiler::new()
        .compile(source, &RatelOptions::default())
        .unwrap_err();
    match error {
        RatelError::Compiler(error) => {
            assert!(matches!(error.root(), CompilerError::UnknownType { .. }))
        }
        other => panic!("expected a compiler error, got {:?}", other),
    }
}

#[test]
fn test_evm_version_reaches_the_contract_compiler() {
    let source = "@external\n@view\ndef which_chain() -> uint256:\n    return chain.id\n\n\
                  @mpc\ndef off_chain():\n    pass\n";
    let istanbul = RatelOptions::default();
    assert!(RatelCompiler::new().compile(source, &istanbul).is_ok());

    let byzantium = RatelOptions {
        evm_version: EvmVersion::Byzantium,
        ..RatelOptions::default()
    };
    let error = RatelCompiler::new().compile(source, &byzantium).unwrap_err();
    assert!(matches!(
        error,
        RatelError::Compiler(ref inner)
            if matches!(inner.root(), CompilerError::OpcodeUnavailable { .. })
    ));
}

#[test]
fn test_output_serialization() {
    let options = RatelOptions::default().with_output_formats(&["method_identifiers"]);
    let output = RatelCompiler::new().compile(MPC_CONTRACT, &options).unwrap();
    let value = serde_json::to_value(&output).unwrap();

    assert_eq!(
        value.as_object().unwrap().keys().collect::<Vec<_>>(),
        vec!["primary_domain", "secondary_domain"]
    );
    assert_eq!(value["secondary_domain"], json!({ "src_code": SECONDARY }));
    let identifiers = value["primary_domain"]["method_identifiers"]
        .as_object()
        .unwrap();
    assert!(identifiers.contains_key("storedData()"));
    assert!(identifiers.contains_key("set(uint256)"));
}
