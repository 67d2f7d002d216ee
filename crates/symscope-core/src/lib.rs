//! Symscope Core
//!
//! Core types and interfaces for the symscope C symbol analyzer: the
//! code-object catalogue model, diagnostics, and configuration.

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod location;
pub mod types;

pub use config::{AnalyzerConfig, ConfigError, Configuration, ConfigurationSet};
pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{Error, Result};
pub use location::Location;
pub use types::*;
