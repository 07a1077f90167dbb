//! Split-aware compiler
//!
//! Preprocesses and parses one source file, splits the tree by domain and
//! regenerates source text for each half. The primary text goes through the
//! contract compiler; the secondary text is returned as is. Secondary classes
//! are rendered with a plain `class` keyword so the text runs as Python; their
//! declared kinds stay available in [`PartitionedClassTypes`].

use crate::error::{RatelError, RatelResult};
use crate::splitter::split;
use indexmap::IndexMap;
use ratel_compiler::{
    CompilerSettings, ContractCompiler, ContractOutput, EvmVersion, InterfaceCodes,
};
use ratel_parser::visitor::{walk_class_def, VisitorMut};
use ratel_parser::{
    parse_preprocessed, pre_parse, validate_source, ClassDef, ClassKind, ClassTypes, Module,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Output formats of the secondary domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryFormat {
    /// Regenerated source text
    SourceCode,
}

impl SecondaryFormat {
    pub const DEFAULT: [SecondaryFormat; 1] = [SecondaryFormat::SourceCode];

    pub fn name(&self) -> &'static str {
        match self {
            SecondaryFormat::SourceCode => "src_code",
        }
    }
}

impl fmt::Display for SecondaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecondaryFormat {
    type Err = RatelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "src_code" => Ok(SecondaryFormat::SourceCode),
            _ => Err(RatelError::UnsupportedCapability {
                format: s.to_string(),
            }),
        }
    }
}

/// Declared class kinds, split by the tree each class landed in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionedClassTypes {
    pub primary: ClassTypes,
    pub secondary: ClassTypes,
}

impl PartitionedClassTypes {
    fn partition(class_types: ClassTypes, secondary_names: &[String]) -> Self {
        let mut partitioned = Self::default();
        for (name, kind) in class_types {
            if secondary_names.contains(&name) {
                partitioned.secondary.insert(name, kind);
            } else {
                partitioned.primary.insert(name, kind);
            }
        }
        partitioned
    }
}

/// Resets every class in a tree to `class`, remembering the names it saw
#[derive(Default)]
struct PlainClasses {
    names: Vec<String>,
}

impl VisitorMut for PlainClasses {
    fn visit_class_def(&mut self, def: &mut ClassDef) {
        def.kind = ClassKind::Class;
        self.names.push(def.name.clone());
        walk_class_def(self, def)
    }
}

/// Everything produced by splitting one source file
#[derive(Debug, Clone, PartialEq)]
pub struct SplitArtifacts {
    /// Contract source without the tagged definitions
    pub primary_source: String,
    /// Tagged definitions, markers removed, classes declared with `class`
    pub secondary_source: String,
    pub class_types: PartitionedClassTypes,
    /// The parsed tree before splitting
    pub tree: Module,
}

/// Options for [`RatelCompiler::compile`]
#[derive(Debug, Clone, PartialEq)]
pub struct RatelOptions {
    pub output_formats: Vec<String>,
    pub interface_codes: Option<InterfaceCodes>,
    pub evm_version: EvmVersion,
    /// `None` selects the default secondary formats
    pub secondary_formats: Option<Vec<String>>,
}

impl Default for RatelOptions {
    fn default() -> Self {
        Self {
            output_formats: vec!["bytecode".to_string()],
            interface_codes: None,
            evm_version: EvmVersion::default(),
            secondary_formats: None,
        }
    }
}

impl RatelOptions {
    pub fn with_output_formats(mut self, formats: &[&str]) -> Self {
        self.output_formats = formats.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_secondary_formats(mut self, formats: &[&str]) -> Self {
        self.secondary_formats = Some(formats.iter().map(|f| f.to_string()).collect());
        self
    }

    fn resolved_secondary_formats(&self) -> RatelResult<Vec<SecondaryFormat>> {
        match &self.secondary_formats {
            None => Ok(SecondaryFormat::DEFAULT.to_vec()),
            Some(names) if names.is_empty() => Ok(SecondaryFormat::DEFAULT.to_vec()),
            Some(names) => names.iter().map(|name| name.parse()).collect(),
        }
    }
}

/// Outputs of both domains
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatelOutput {
    pub primary_domain: ContractOutput,
    pub secondary_domain: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct RatelCompiler {
    settings: CompilerSettings,
}

impl RatelCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings handed to the contract compiler; the EVM version is taken
    /// from [`RatelOptions`] on each call
    pub fn with_settings(settings: CompilerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Split `source` into regenerated primary and secondary source texts
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn extract_codes(&self, source: &str) -> RatelResult<SplitArtifacts> {
        validate_source(source)?;
        let preprocessed = pre_parse(source);
        let tree = parse_preprocessed(source, &preprocessed, 0)?;

        let mut result = split(tree.clone());
        let mut plain = PlainClasses::default();
        plain.visit_module(&mut result.secondary);
        let primary_source = result.primary.to_string();
        let secondary_source = result.secondary.to_string();
        let class_types = PartitionedClassTypes::partition(preprocessed.class_types, &plain.names);

        tracing::debug!(
            secondary_definitions = result.secondary.body.len(),
            "extracted domain sources"
        );
        Ok(SplitArtifacts {
            primary_source,
            secondary_source,
            class_types,
            tree,
        })
    }

    /// Split `source`, compile the primary half and render the secondary half
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn compile(&self, source: &str, options: &RatelOptions) -> RatelResult<RatelOutput> {
        let secondary_formats = options.resolved_secondary_formats()?;
        let artifacts = self.extract_codes(source)?;

        let settings = self.settings.with_evm_version(options.evm_version);
        let primary_domain = ContractCompiler::new(settings).compile_code(
            &artifacts.primary_source,
            options.output_formats.as_slice(),
            options.interface_codes.as_ref(),
        )?;

        let secondary_domain = secondary_formats
            .into_iter()
            .map(|format| {
                let value = match format {
                    SecondaryFormat::SourceCode => {
                        Value::String(artifacts.secondary_source.clone())
                    }
                };
                (format.name().to_string(), value)
            })
            .collect();

        Ok(RatelOutput {
            primary_domain,
            secondary_domain,
        })
    }
}
