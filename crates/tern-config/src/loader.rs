//! Configuration Loader
//!
//! Handles loading configuration from a file and applying environment overrides.

use crate::pipeline::{PipelineConfig, ScratchRegister};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up by [`ConfigLoader::load_from_directory`]
pub const CONFIG_FILE_NAME: &str = "tern.toml";

/// Configuration loader
///
/// Loads configuration with the following precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Pipeline config (./tern.toml) - overrides defaults
/// 3. Environment variables (TERN_*) - overrides file
pub struct ConfigLoader {
    /// Skip environment overrides (used by tests and embedders)
    ignore_env: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { ignore_env: false }
    }

    /// Create a loader that never consults `TERN_*` variables
    pub fn without_env() -> Self {
        Self { ignore_env: true }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find tern.toml. Falls back to defaults
    /// when none exists.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<PipelineConfig> {
        let config = match self.find_config_file(start_dir) {
            Some(path) => PipelineConfig::load_from_file(&path)?,
            None => PipelineConfig::default(),
        };
        self.apply_env_overrides(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<PipelineConfig> {
        let config = PipelineConfig::load_from_file(config_path)?;
        self.apply_env_overrides(config)
    }

    fn find_config_file(&self, start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);
        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Some(candidate);
            }
            current = dir.parent();
        }
        None
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables follow the pattern: TERN_<SECTION>_<KEY>
    /// Example: TERN_VM_TRACE=true
    fn apply_env_overrides(&self, mut config: PipelineConfig) -> ConfigResult<PipelineConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        if let Ok(trace) = env::var("TERN_VM_TRACE") {
            config.vm.trace = parse_bool(&trace);
        }

        if let Ok(verify) = env::var("TERN_X86_VERIFY_STACK_BALANCE") {
            config.x86.verify_stack_balance = parse_bool(&verify);
        }

        if let Ok(registers) = env::var("TERN_X86_SCRATCH_REGISTERS") {
            config.x86.scratch_registers = registers
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(str::parse::<ScratchRegister>)
                .collect::<Result<Vec<_>, ConfigError>>()?;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}
