//! Pipeline Configuration (tern.toml)
//!
//! Settings consumed by the bytecode evaluator and the x86 backend.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Pipeline configuration from tern.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// Bytecode evaluator settings
    pub vm: VmConfig,

    /// x86 backend settings
    pub x86: X86Config,
}

/// Bytecode evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, default)]
pub struct VmConfig {
    /// Emit a `trace` event for every executed instruction
    pub trace: bool,
}

/// x86 backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct X86Config {
    /// Registers the virtual value stack may claim before spilling to the frame
    pub scratch_registers: Vec<ScratchRegister>,

    /// Check that every `pushl` has a matching `popl` after compilation
    pub verify_stack_balance: bool,
}

impl Default for X86Config {
    fn default() -> Self {
        Self {
            scratch_registers: vec![
                ScratchRegister::Ebx,
                ScratchRegister::Esi,
                ScratchRegister::Edi,
            ],
            verify_stack_balance: true,
        }
    }
}

/// Callee-saved registers usable as scratch space.
///
/// `%eax` and `%edx` are reserved for arithmetic and call results and `%ecx`
/// is clobbered by external calls, so only these three are accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScratchRegister {
    Ebx,
    Esi,
    Edi,
}

impl ScratchRegister {
    pub fn name(self) -> &'static str {
        match self {
            ScratchRegister::Ebx => "ebx",
            ScratchRegister::Esi => "esi",
            ScratchRegister::Edi => "edi",
        }
    }
}

impl fmt::Display for ScratchRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScratchRegister {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('%').to_ascii_lowercase().as_str() {
            "ebx" => Ok(ScratchRegister::Ebx),
            "esi" => Ok(ScratchRegister::Esi),
            "edi" => Ok(ScratchRegister::Edi),
            other => Err(ConfigError::InvalidValue {
                field: "x86.scratch_registers".to_string(),
                reason: format!("'{}' is not one of ebx, esi, edi", other),
            }),
        }
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path.to_path_buf())
    }

    /// Parse pipeline configuration from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Self::parse(content, PathBuf::from("<string>"))
    }

    fn parse(content: &str, file: PathBuf) -> ConfigResult<Self> {
        let config: PipelineConfig = toml::from_str(content)
            .map_err(|error| ConfigError::TomlParseError { file, error })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        let registers = &self.x86.scratch_registers;
        for (idx, reg) in registers.iter().enumerate() {
            if registers[..idx].contains(reg) {
                return Err(ConfigError::InvalidValue {
                    field: "x86.scratch_registers".to_string(),
                    reason: format!("register '{}' listed more than once", reg),
                });
            }
        }
        Ok(())
    }

    /// Serialize configuration to TOML text
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            field: "<root>".to_string(),
            reason: e.to_string(),
        })
    }
}
