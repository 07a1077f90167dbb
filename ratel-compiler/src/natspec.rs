// NatSpec documentation
// User and developer documentation extracted from contract and function docstrings

use crate::error::{CompileResult, CompilerError};
use crate::phases::context::{ContractFunction, GlobalContext};
use indexmap::IndexMap;
use ratel_parser::Span;
use serde_json::{Map, Value};

const CONTRACT_TAGS: [&str; 5] = ["title", "license", "author", "notice", "dev"];
const FUNCTION_TAGS: [&str; 4] = ["notice", "dev", "param", "return"];

#[derive(Debug, Clone, PartialEq)]
pub struct NatSpec {
    pub userdoc: Value,
    pub devdoc: Value,
}

/// One `@tag value` entry; untagged leading text is a notice
#[derive(Debug, Clone, PartialEq)]
struct DocTag {
    tag: String,
    value: String,
}

fn split_tags(docstring: &str) -> Vec<DocTag> {
    let mut tags: Vec<DocTag> = Vec::new();
    let mut untagged = Vec::new();
    for line in docstring.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if let Some(rest) = line.strip_prefix('@') {
            let (tag, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            tags.push(DocTag {
                tag: tag.to_string(),
                value: value.trim().to_string(),
            });
        } else if let Some(current) = tags.last_mut() {
            if !current.value.is_empty() {
                current.value.push(' ');
            }
            current.value.push_str(line);
        } else {
            untagged.push(line);
        }
    }
    if !untagged.is_empty() {
        tags.insert(
            0,
            DocTag {
                tag: "notice".to_string(),
                value: untagged.join(" "),
            },
        );
    }
    tags
}

fn check_tags(tags: &[DocTag], allowed: &[&str], span: &Span) -> CompileResult<()> {
    let mut seen = Vec::new();
    for tag in tags {
        if !allowed.contains(&tag.tag.as_str()) {
            return Err(CompilerError::structure(
                format!("Unknown NatSpec field '@{}'", tag.tag),
                span,
            ));
        }
        if tag.tag != "param" {
            if seen.contains(&tag.tag.as_str()) {
                return Err(CompilerError::structure(
                    format!("Duplicate NatSpec field '@{}'", tag.tag),
                    span,
                ));
            }
            seen.push(tag.tag.as_str());
        }
        if tag.value.is_empty() {
            return Err(CompilerError::structure(
                format!("No description given for tag '@{}'", tag.tag),
                span,
            ));
        }
    }
    Ok(())
}

/// Collect user and developer documentation for a contract
pub fn parse_natspec(ctx: &GlobalContext) -> CompileResult<NatSpec> {
    let mut userdoc = Map::new();
    let mut devdoc = Map::new();

    if let Some(docstring) = &ctx.docstring {
        let tags = split_tags(docstring);
        check_tags(&tags, &CONTRACT_TAGS, &Span::default())?;
        for tag in tags {
            match tag.tag.as_str() {
                "notice" => userdoc.insert("notice".to_string(), Value::String(tag.value)),
                "dev" => devdoc.insert("details".to_string(), Value::String(tag.value)),
                other => devdoc.insert(other.to_string(), Value::String(tag.value)),
            };
        }
    }

    let mut user_methods = Map::new();
    let mut dev_methods = Map::new();
    for function in ctx.functions.values() {
        let Some(docstring) = function.docstring() else {
            continue;
        };
        let (user, dev) = function_docs(function, docstring)?;
        let key = function.signature.canonical.clone();
        if !user.is_empty() {
            user_methods.insert(key.clone(), Value::Object(user));
        }
        if !dev.is_empty() {
            dev_methods.insert(key, Value::Object(dev));
        }
    }
    if !user_methods.is_empty() {
        userdoc.insert("methods".to_string(), Value::Object(user_methods));
    }
    if !dev_methods.is_empty() {
        devdoc.insert("methods".to_string(), Value::Object(dev_methods));
    }

    Ok(NatSpec {
        userdoc: Value::Object(userdoc),
        devdoc: Value::Object(devdoc),
    })
}

fn function_docs(
    function: &ContractFunction,
    docstring: &str,
) -> CompileResult<(Map<String, Value>, Map<String, Value>)> {
    let span = &function.span;
    let tags = split_tags(docstring);
    check_tags(&tags, &FUNCTION_TAGS, span)?;

    let signature = &function.signature;
    let mut user = Map::new();
    let mut dev = Map::new();
    let mut params = IndexMap::new();
    for tag in tags {
        match tag.tag.as_str() {
            "notice" => {
                user.insert("notice".to_string(), Value::String(tag.value));
            }
            "dev" => {
                dev.insert("details".to_string(), Value::String(tag.value));
            }
            "param" => {
                let (name, description) = tag
                    .value
                    .split_once(char::is_whitespace)
                    .map(|(name, description)| (name, description.trim()))
                    .unwrap_or((tag.value.as_str(), ""));
                if !signature.args.iter().any(|arg| arg.name == name) {
                    return Err(CompilerError::structure(
                        format!("Method has no parameter '{}'", name),
                        span,
                    ));
                }
                if description.is_empty() {
                    return Err(CompilerError::structure(
                        format!("No description given for parameter '{}'", name),
                        span,
                    ));
                }
                if params
                    .insert(name.to_string(), Value::String(description.to_string()))
                    .is_some()
                {
                    return Err(CompilerError::structure(
                        format!("Parameter '{}' documented more than once", name),
                        span,
                    ));
                }
            }
            "return" => {
                if signature.returns.is_none() {
                    return Err(CompilerError::structure(
                        "Method does not return any values",
                        span,
                    ));
                }
                let mut returns = Map::new();
                returns.insert("_0".to_string(), Value::String(tag.value));
                dev.insert("returns".to_string(), Value::Object(returns));
            }
            _ => {}
        }
    }
    if !params.is_empty() {
        dev.insert(
            "params".to_string(),
            Value::Object(params.into_iter().collect()),
        );
    }
    Ok((user, dev))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_untagged_text_is_a_notice() {
        let tags = split_tags("\n    Stores a number\n    for later\n    @dev uses one slot\n");
        assert_eq!(
            tags,
            vec![
                DocTag {
                    tag: "notice".to_string(),
                    value: "Stores a number for later".to_string()
                },
                DocTag {
                    tag: "dev".to_string(),
                    value: "uses one slot".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_tag_values_continue_over_lines() {
        let tags = split_tags("@notice first\n  second");
        assert_eq!(tags[0].value, "first second");
    }

    #[test]
    fn test_unknown_and_duplicate_tags() {
        let span = Span::default();
        let unknown = split_tags("@since today");
        assert!(check_tags(&unknown, &CONTRACT_TAGS, &span).is_err());

        let duplicate = split_tags("@dev one\n@dev two");
        assert!(check_tags(&duplicate, &CONTRACT_TAGS, &span).is_err());

        let params = split_tags("@param a first\n@param b second");
        assert!(check_tags(&params, &FUNCTION_TAGS, &span).is_ok());
    }
}
