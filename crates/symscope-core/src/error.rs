//! Error types for symscope
//!
//! Findings about the analyzed C code are never errors; they are
//! [`Diagnostic`](crate::Diagnostic)s. This type covers failures of the
//! analyzer's own inputs.

use thiserror::Error;

/// symscope error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Result type alias for symscope
pub type Result<T> = std::result::Result<T, Error>;
