// Tests for declaration keyword normalization

use crate::*;
use pretty_assertions::assert_eq;

#[test]
fn test_declarations_are_rewritten_to_class() {
    let source = "struct Point:\n    x: int128\n\nevent Transfer:\n    value: uint256\n";
    let pre = pre_parse(source);
    assert_eq!(
        pre.normalized,
        "class Point:\n    x: int128\n\nclass Transfer:\n    value: uint256\n"
    );
    assert_eq!(pre.class_types.get("Point"), Some(&ClassKind::Struct));
    assert_eq!(pre.class_types.get("Transfer"), Some(&ClassKind::Event));
}

#[test]
fn test_preprocessing_is_idempotent_on_normalized_text() {
    let source = "interface Token:\n    def transfer(to: address, amount: uint256) -> bool: view\n\ncontract Other:\n    pass\n";
    let once = pre_parse(source).normalized;
    let twice = pre_parse(&once);
    assert_eq!(twice.normalized, once);
    assert!(twice.offsets.is_identity());
}

#[test]
fn test_strings_and_comments_are_untouched() {
    let source = "\"\"\"\nstruct Inside:\n\"\"\"\n# struct Commented:\nx = 'struct S:'\n";
    let pre = pre_parse(source);
    assert_eq!(pre.normalized, source);
    assert!(pre.class_types.is_empty());
}

#[test]
fn test_keyword_used_as_name_is_untouched() {
    let source = "event: uint256\ncontract = 1\n";
    let pre = pre_parse(source);
    assert_eq!(pre.normalized, source);
}

#[test]
fn test_offsets_map_back_to_original() {
    let source = "interface Token:\n    pass\n";
    let pre = pre_parse(source);
    let normalized_pass = pre.normalized.find("pass").unwrap();
    let original_pass = source.find("pass").unwrap();
    assert_eq!(pre.offsets.to_original(normalized_pass), original_pass);
    assert_eq!(pre.offsets.to_original(0), 0);
}

#[test]
fn test_parse_to_ast_restores_kinds_and_positions() {
    let source = "interface Token:\n    def balanceOf(a: address) -> uint256: view\n\nx: int128\n";
    let module = parse_to_ast(source, 7).unwrap();
    assert_eq!(module.source_id, 7);
    match &module.body[0].kind {
        StatementKind::ClassDef(def) => assert_eq!(def.kind, ClassKind::Interface),
        other => panic!("Expected class definition, got: {:?}", other),
    }
    let ann = &module.body[1];
    assert_eq!(ann.span.lineno, 4);
    assert_eq!(&source[ann.span.start..ann.span.end], "x: int128");
}
