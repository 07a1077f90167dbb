//! Unit tests for the Ratel compiler

mod test_assembly;
mod test_codegen;
mod test_folding;

use crate::error::CompileResult;
use crate::interfaces::InterfaceCodes;
use crate::phases::context::{build_global_context, GlobalContext};
use crate::phases::folding::fold_module;

/// Storage contract with a constructor, a public getter and a setter
pub(crate) const STORAGE: &str = r#"
stored: public(uint256)

@external
def __init__(x: uint256):
    self.stored = x

@external
def set(x: uint256):
    self.stored = x
"#;

pub(crate) fn context(source: &str) -> CompileResult<GlobalContext> {
    let module = ratel_parser::parse_to_ast(source, 0)?;
    let folded = fold_module(&module)?;
    build_global_context(&folded, &InterfaceCodes::new())
}
