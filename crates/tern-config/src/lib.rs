//! Tern Configuration System
//!
//! Configuration for the compilation pipeline:
//! - VM evaluator tracing
//! - x86 backend scratch register pool and stack balance verification
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Pipeline config file (tern.toml)
//! 3. Environment variables (TERN_*)
//!
//! # Example
//!
//! ```no_run
//! use tern_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_file(Path::new("tern.toml")).unwrap();
//! ```

pub mod loader;
pub mod pipeline;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::ConfigLoader;
pub use pipeline::{PipelineConfig, ScratchRegister, VmConfig, X86Config};
