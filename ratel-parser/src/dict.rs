// Tree/dict conversion
// JSON form of the tree, tagged with `ast_type` on every node

use serde_json::{Map, Value};

use crate::ast::Module;
use crate::error::{ParseError, ParseResult};

const MODULE_TAG: &str = "Module";

/// Convert a module to its JSON dictionary form
pub fn ast_to_dict(module: &Module) -> ParseResult<Value> {
    let value = serde_json::to_value(module).map_err(|e| ParseError::malformed(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(ParseError::malformed("module did not serialize to an object"));
    };
    let mut tagged = Map::with_capacity(fields.len() + 1);
    tagged.insert("ast_type".to_string(), Value::String(MODULE_TAG.to_string()));
    tagged.extend(fields);
    Ok(Value::Object(tagged))
}

/// Rebuild a module from its dictionary form
///
/// Any shape this crate would not have produced is an internal error.
pub fn dict_to_ast(dict: &Value) -> ParseResult<Module> {
    match dict.get("ast_type").and_then(Value::as_str) {
        Some(MODULE_TAG) => {}
        Some(other) => {
            return Err(ParseError::malformed(format!(
                "expected a Module node, found {}",
                other
            )))
        }
        None => return Err(ParseError::malformed("node without ast_type")),
    }
    serde_json::from_value(dict.clone()).map_err(|e| ParseError::malformed(e.to_string()))
}
