//! Error types for the context optimizer

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ContextError>;

/// Context optimizer errors
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("No applicable plugin found for project at {}", path.display())]
    NoApplicablePlugin { path: PathBuf },

    #[error("Plugin already registered: {name}")]
    DuplicatePlugin { name: String },

    #[error("Optimization failed in {technique}: {reason}")]
    Optimization { technique: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ContextError {
    /// True for errors caused by a programming or setup mistake rather than input
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ContextError::DuplicatePlugin { .. } | ContextError::Configuration(_)
        )
    }
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::Configuration(err.to_string())
    }
}
