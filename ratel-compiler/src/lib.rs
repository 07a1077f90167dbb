//! Ratel Compiler
//!
//! Staged, memoized compilation of contract source into EVM bytecode and the
//! other requestable output formats.
//!
//! ## Architecture
//!
//! - **Phases**: parse, constant folding, global context, IR generation,
//!   optimization, assembly and bytecode emission, each behind the
//!   [`PhaseBackend`] trait
//! - **Compiler data**: per-contract memo cells computed on first access
//! - **Output registry**: immutable map from format name to builder
//! - **Driver**: per-contract format dispatch and sorted batch compilation

#![allow(clippy::uninlined_format_args)]

pub mod driver;
pub mod error;
pub mod interfaces;
pub mod natspec;
pub mod output;
pub mod phases;
pub mod settings;
pub mod types;

pub use driver::{
    CompilationResult, CompileOptions, ContractCompiler, ContractOutput, ContractSources,
    ErrorMode, FormatFailure, OutputSelection, UNKNOWN_CONTRACT_NAME,
};
pub use error::{CompileResult, CompilerError, CompilerWarning};
pub use interfaces::{InterfaceCode, InterfaceCodes, InterfaceSet};
pub use output::{OutputBuilder, OutputRegistry};
pub use phases::assembly::AsmItem;
pub use phases::context::{method_id, GlobalContext};
pub use phases::ir::IrNode;
pub use phases::{CompilerData, Memo, Phase, PhaseBackend, PhaseState, StandardBackend};
pub use settings::{CompilerSettings, EvmVersion};

#[cfg(test)]
mod tests;
