//! Pipeline configuration.
//!
//! Configuration can be built in code with the `with_*` setters on
//! [`PipelineConfig`] or loaded from an INI file:
//!
//! ```ini
//! [workers]
//! count = 2
//!
//! [cache]
//! capacity = 32MB
//!
//! [proxy]
//! ancestor_levels = 2
//! use_descendants = true
//! request_descendants = false
//!
//! [tiles]
//! fade_ms = 300
//! ```

mod parser;
mod settings;
mod size;

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

pub use settings::{
    PipelineConfig, ProxyConfig, DEFAULT_CACHE_CAPACITY_BYTES, DEFAULT_FADE_DURATION,
    DEFAULT_PROXY_ANCESTOR_LEVELS, DEFAULT_WORKER_COUNT, MAX_WORKER_COUNT,
};
pub use size::{format_size, parse_size, SizeParseError};

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or is not valid INI.
    #[error("failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// The text is not valid INI.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value was present but unusable.
    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl PipelineConfig {
    /// Load configuration from an INI file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        parser::parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        parser::parse_ini(&ini)
    }
}
