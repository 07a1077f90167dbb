// Compiler settings
// Target EVM ruleset and pipeline switches shared by every phase

use crate::error::CompilerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EVM rulesets in chronological order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EvmVersion {
    Byzantium,
    Constantinople,
    Petersburg,
    #[default]
    Istanbul,
    Berlin,
}

impl EvmVersion {
    pub const ALL: [EvmVersion; 5] = [
        EvmVersion::Byzantium,
        EvmVersion::Constantinople,
        EvmVersion::Petersburg,
        EvmVersion::Istanbul,
        EvmVersion::Berlin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EvmVersion::Byzantium => "byzantium",
            EvmVersion::Constantinople => "constantinople",
            EvmVersion::Petersburg => "petersburg",
            EvmVersion::Istanbul => "istanbul",
            EvmVersion::Berlin => "berlin",
        }
    }
}

impl fmt::Display for EvmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EvmVersion {
    type Err = CompilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EvmVersion::ALL
            .into_iter()
            .find(|version| version.name() == s)
            .ok_or_else(|| CompilerError::InvalidEvmVersion {
                name: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerSettings {
    pub evm_version: EvmVersion,
    /// Run the IR optimizer before assembly
    pub optimize: bool,
    /// Compile the contracts of a batch on the rayon pool
    pub parallel: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            evm_version: EvmVersion::default(),
            optimize: true,
            parallel: false,
        }
    }
}

impl CompilerSettings {
    pub fn with_evm_version(mut self, evm_version: EvmVersion) -> Self {
        self.evm_version = evm_version;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }
}
