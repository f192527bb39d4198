//! CLI error handling with user-friendly messages.
//!
//! Every command returns [`CliError`]; `main` prints it and exits with
//! status 1.

use std::fmt;
use std::process;

use tilestream::{ConfigError, PipelineError, TileError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration file could not be loaded
    Config(ConfigError),
    /// Pipeline could not be started
    Pipeline(PipelineError),
    /// A benchmark tile failed to load or build
    Tile(TileError),
    /// Ctrl-C handler could not be installed
    Signal(String),
    /// Invalid command-line value
    InvalidArgument(String),
}

impl CliError {
    /// Exit the process with an error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(_) = self {
            eprintln!();
            eprintln!("The config file is INI with [workers], [cache], [proxy] and [tiles] sections.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Pipeline(e) => write!(f, "Failed to start tile pipeline: {}", e),
            CliError::Tile(e) => write!(f, "Tile build failed: {}", e),
            CliError::Signal(msg) => write!(f, "Failed to install Ctrl-C handler: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            CliError::Tile(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

impl From<TileError> for CliError {
    fn from(e: TileError) -> Self {
        CliError::Tile(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilestream::{SourceId, TileId};

    #[test]
    fn test_display_wraps_library_error() {
        let err = CliError::from(TileError::parse(TileId::new(0, 0, 0, SourceId(0)), "bad"));
        assert!(err.to_string().starts_with("Tile build failed: "));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_argument_has_no_source() {
        let err = CliError::InvalidArgument("zoom".to_string());
        assert_eq!(err.to_string(), "Invalid argument: zoom");
        assert!(std::error::Error::source(&err).is_none());
    }
}
