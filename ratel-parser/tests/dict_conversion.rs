// Tree/dict conversion

use pretty_assertions::assert_eq;
use ratel_parser::{ast_to_dict, dict_to_ast, parse_to_ast, ParseError};
use serde_json::json;

const SOURCE: &str = "struct Point:\n    x: int128\n\n@external\ndef big() -> uint256:\n    return 115792089237316195423570985008687907853269984665640564039457584007913129639935\n";

#[test]
fn test_dict_round_trip_preserves_the_tree() {
    let module = parse_to_ast(SOURCE, 3).unwrap();
    let dict = ast_to_dict(&module).unwrap();
    assert_eq!(dict_to_ast(&dict).unwrap(), module);
}

#[test]
fn test_dict_shape_is_tagged() {
    let module = parse_to_ast(SOURCE, 3).unwrap();
    let dict = ast_to_dict(&module).unwrap();
    assert_eq!(dict["ast_type"], json!("Module"));
    assert_eq!(dict["source_id"], json!(3));
    assert_eq!(dict["body"][0]["ast_type"], json!("ClassDef"));
    assert_eq!(dict["body"][0]["kind"], json!("struct"));
    assert_eq!(dict["body"][1]["name"], json!("big"));
}

#[test]
fn test_malformed_dicts_are_internal_errors() {
    let missing_tag = json!({"body": [], "start": 0, "end": 0});
    assert!(matches!(
        dict_to_ast(&missing_tag),
        Err(ParseError::MalformedTree { .. })
    ));

    let unknown_node = json!({
        "ast_type": "Module",
        "body": [{"ast_type": "Lambda", "start": 0, "end": 0}],
        "start": 0,
        "end": 0
    });
    assert!(matches!(
        dict_to_ast(&unknown_node),
        Err(ParseError::MalformedTree { .. })
    ));
}
