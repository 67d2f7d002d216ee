//! Header resolution for `#include`
//!
//! The analyzer never touches the filesystem on its own. An
//! [`IncludeResolver`] supplies the text of included headers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use symscope_core::AnalyzerConfig;
use tracing::{debug, warn};

/// Text of a resolved header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedSource {
    /// Path used in locations of the header's tokens
    pub path: String,
    pub text: String,
}

/// Supplies included headers
pub trait IncludeResolver: Send + Sync {
    /// Resolve `header` as written in the directive. `angled` is true for
    /// `<...>` includes.
    fn resolve(&self, header: &str, angled: bool, including_file: &str) -> Option<IncludedSource>;
}

/// Resolver that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIncludes;

impl IncludeResolver for NoIncludes {
    fn resolve(&self, _header: &str, _angled: bool, _including_file: &str) -> Option<IncludedSource> {
        None
    }
}

/// Headers held in memory, keyed by the name used in the directive
#[derive(Debug, Clone, Default)]
pub struct MemoryIncludes {
    headers: HashMap<String, String>,
}

impl MemoryIncludes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.headers.insert(name.into(), text.into());
    }
}

impl IncludeResolver for MemoryIncludes {
    fn resolve(&self, header: &str, _angled: bool, _including_file: &str) -> Option<IncludedSource> {
        self.headers.get(header).map(|text| IncludedSource {
            path: header.to_string(),
            text: text.clone(),
        })
    }
}

/// Headers read from disk. Quoted includes are looked up next to the
/// including file first, then in the search path.
#[derive(Debug, Clone, Default)]
pub struct FileSystemIncludes {
    include_paths: Vec<PathBuf>,
}

impl FileSystemIncludes {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self { include_paths }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.include_paths.clone())
    }

    /// Add an include path
    pub fn add_include_path(&mut self, path: PathBuf) {
        if !self.include_paths.contains(&path) {
            self.include_paths.push(path);
        }
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    /// Find the file a directive refers to
    pub fn locate(&self, header: &str, angled: bool, including_file: &str) -> Option<PathBuf> {
        if !angled {
            if let Some(parent) = Path::new(including_file).parent() {
                let relative_path = parent.join(header);
                if relative_path.is_file() {
                    debug!("Resolved {} relative to {}", header, including_file);
                    return Some(relative_path);
                }
            }
        }

        for include_path in &self.include_paths {
            let full_path = include_path.join(header);
            if full_path.is_file() {
                debug!("Resolved {} in {:?}", header, include_path);
                return Some(full_path);
            }
        }

        debug!("Failed to resolve header: {}", header);
        None
    }

    pub fn read(&self, path: &Path) -> symscope_core::Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }
}

impl IncludeResolver for FileSystemIncludes {
    fn resolve(&self, header: &str, angled: bool, including_file: &str) -> Option<IncludedSource> {
        let path = self.locate(header, angled, including_file)?;
        match self.read(&path) {
            Ok(text) => Some(IncludedSource {
                path: path.display().to_string(),
                text,
            }),
            Err(e) => {
                warn!("Cannot read header {:?}: {}", path, e);
                None
            }
        }
    }
}
