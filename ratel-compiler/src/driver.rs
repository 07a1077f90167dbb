//! Contract compiler driver
//!
//! Dispatches requested output formats over a [`CompilerData`] for one
//! contract, and compiles batches of contracts with deterministic source ids.

use crate::error::{CompileResult, CompilerError};
use crate::interfaces::{InterfaceCodes, InterfaceSet};
use crate::output::OutputRegistry;
use crate::phases::{CompilerData, PhaseBackend, STANDARD_BACKEND};
use crate::settings::CompilerSettings;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;

/// Contract name used by [`ContractCompiler::compile_code`]
pub const UNKNOWN_CONTRACT_NAME: &str = "<unknown>";

/// Contract name to source text
pub type ContractSources = IndexMap<String, String>;

/// Contract name to its outputs, in sorted name order
pub type CompilationResult = IndexMap<String, ContractOutput>;

/// How producer failures are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Abort at the first failure
    #[default]
    FailFast,
    /// Record failures and keep producing the remaining formats
    Collect,
}

/// A format that could not be produced in [`ErrorMode::Collect`]
#[derive(Debug, Clone, PartialEq)]
pub struct FormatFailure {
    pub format: String,
    pub error: CompilerError,
}

/// Outputs of one contract; serializes as the bare format map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractOutput {
    #[serde(skip)]
    pub source_id: u32,
    #[serde(flatten)]
    pub outputs: IndexMap<String, Value>,
    #[serde(skip)]
    pub failures: Vec<FormatFailure>,
}

impl ContractOutput {
    pub fn get(&self, format: &str) -> Option<&Value> {
        self.outputs.get(format)
    }
}

/// Output formats requested for a batch
#[derive(Debug, Clone, PartialEq)]
pub enum OutputSelection {
    /// The same formats for every contract
    Shared(Vec<String>),
    /// Formats chosen per contract name
    PerContract(IndexMap<String, Vec<String>>),
}

impl Default for OutputSelection {
    fn default() -> Self {
        OutputSelection::Shared(vec!["bytecode".to_string()])
    }
}

impl OutputSelection {
    pub fn for_contract(&self, contract_name: &str) -> CompileResult<&[String]> {
        match self {
            OutputSelection::Shared(formats) => Ok(formats),
            OutputSelection::PerContract(by_contract) => by_contract
                .get(contract_name)
                .map(Vec::as_slice)
                .ok_or_else(|| CompilerError::MissingOutputSelection {
                    contract: contract_name.to_string(),
                }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompileOptions {
    pub output_formats: OutputSelection,
    pub interface_codes: Option<InterfaceSet>,
    /// Source id of the first contract in sorted order
    pub initial_id: u32,
    pub error_mode: ErrorMode,
}

/// Compiles contracts against an output registry
pub struct ContractCompiler<'r> {
    registry: &'r OutputRegistry,
    settings: CompilerSettings,
    backend: &'r dyn PhaseBackend,
}

impl ContractCompiler<'static> {
    /// Compiler using the standard registry and phase backend
    pub fn new(settings: CompilerSettings) -> Self {
        Self {
            registry: OutputRegistry::standard(),
            settings,
            backend: &STANDARD_BACKEND,
        }
    }
}

impl Default for ContractCompiler<'static> {
    fn default() -> Self {
        Self::new(CompilerSettings::default())
    }
}

impl<'r> ContractCompiler<'r> {
    pub fn with_registry(mut self, registry: &'r OutputRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_backend(mut self, backend: &'r dyn PhaseBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn registry(&self) -> &OutputRegistry {
        self.registry
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Produce the requested formats for one contract, in the order given
    #[tracing::instrument(level = "debug", skip(self, source_code, formats, interface_codes))]
    pub fn get_outputs(
        &self,
        contract_name: &str,
        source_code: &str,
        formats: &[impl AsRef<str>],
        interface_codes: Option<&InterfaceCodes>,
        source_id: u32,
        error_mode: ErrorMode,
    ) -> CompileResult<ContractOutput> {
        if error_mode == ErrorMode::FailFast {
            if let Some(unknown) = formats
                .iter()
                .map(AsRef::as_ref)
                .find(|format| !self.registry.contains(format))
            {
                return Err(CompilerError::UnsupportedFormat {
                    name: unknown.to_string(),
                });
            }
        }

        let data = CompilerData::with_backend(contract_name, source_code, self.backend)
            .with_interface_codes(interface_codes.cloned())
            .with_source_id(source_id)
            .with_settings(self.settings);

        let mut output = ContractOutput {
            source_id,
            outputs: IndexMap::new(),
            failures: Vec::new(),
        };
        for format in formats.iter().map(AsRef::as_ref) {
            let result = match self.registry.get(format) {
                Some(builder) => builder(&data),
                None => Err(CompilerError::UnsupportedFormat {
                    name: format.to_string(),
                }),
            };
            match (result, error_mode) {
                (Ok(value), _) => {
                    output.outputs.insert(format.to_string(), value);
                }
                (Err(error), ErrorMode::FailFast) => return Err(error),
                (Err(error), ErrorMode::Collect) => {
                    tracing::warn!(contract = contract_name, format, %error, "output format failed");
                    output.failures.push(FormatFailure {
                        format: format.to_string(),
                        error,
                    });
                }
            }
        }
        Ok(output)
    }

    /// Compile a batch. Contracts are processed in sorted name order and
    /// numbered from `options.initial_id`.
    pub fn compile_codes(
        &self,
        sources: &ContractSources,
        options: &CompileOptions,
    ) -> CompileResult<CompilationResult> {
        let mut names: Vec<&String> = sources.keys().collect();
        names.sort();
        tracing::debug!(contracts = names.len(), parallel = self.settings.parallel, "compiling batch");

        let overflow = CompilerError::SourceIdOverflow {
            initial_id: options.initial_id,
            contracts: names.len(),
        };
        let jobs: Vec<(&String, u32)> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                u32::try_from(i)
                    .ok()
                    .and_then(|offset| options.initial_id.checked_add(offset))
                    .map(|source_id| (name, source_id))
                    .ok_or_else(|| overflow.clone())
            })
            .collect::<CompileResult<_>>()?;
        let compile = |&(name, source_id): &(&String, u32)| {
            self.compile_one(name, &sources[name.as_str()], source_id, options)
        };

        let results: Vec<CompileResult<ContractOutput>> = if self.settings.parallel {
            jobs.par_iter().map(compile).collect()
        } else {
            let mut results = Vec::with_capacity(jobs.len());
            for job in &jobs {
                let result = compile(job);
                let failed = result.is_err();
                results.push(result);
                if failed {
                    break;
                }
            }
            results
        };

        let mut compiled = CompilationResult::new();
        for ((name, _), result) in jobs.iter().zip(results) {
            compiled.insert((*name).clone(), result?);
        }
        Ok(compiled)
    }

    fn compile_one(
        &self,
        name: &str,
        source: &str,
        source_id: u32,
        options: &CompileOptions,
    ) -> CompileResult<ContractOutput> {
        let wrap = |error: CompilerError| CompilerError::Contract {
            name: name.to_string(),
            error: Box::new(error),
        };
        let formats = options.output_formats.for_contract(name).map_err(wrap)?;
        let interface_codes = options
            .interface_codes
            .as_ref()
            .and_then(|set| set.for_contract(name));
        let source = format!("{}\n", source);
        self.get_outputs(
            name,
            &source,
            formats,
            interface_codes,
            source_id,
            options.error_mode,
        )
        .map_err(wrap)
    }

    /// Compile a single unnamed contract
    pub fn compile_code(
        &self,
        source_code: &str,
        formats: &[impl AsRef<str>],
        interface_codes: Option<&InterfaceCodes>,
    ) -> CompileResult<ContractOutput> {
        let mut sources = ContractSources::new();
        sources.insert(UNKNOWN_CONTRACT_NAME.to_string(), source_code.to_string());
        let options = CompileOptions {
            output_formats: OutputSelection::Shared(
                formats.iter().map(|f| f.as_ref().to_string()).collect(),
            ),
            interface_codes: interface_codes.cloned().map(InterfaceSet::Shared),
            ..CompileOptions::default()
        };
        let mut result = self.compile_codes(&sources, &options)?;
        result
            .shift_remove(UNKNOWN_CONTRACT_NAME)
            .ok_or_else(|| CompilerError::panic("compiled batch lost its only contract"))
    }
}
