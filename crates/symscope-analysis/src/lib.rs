//! Symscope Analysis
//!
//! Drives the per-unit pipeline of `symscope-parser`:
//! - Single translation units, from text or from disk
//! - Many independent units in parallel
//! - One unit under a set of configurations, with a report of how the
//!   catalogue changes between them

pub mod parallel;
pub mod variants;

pub use parallel::{ParallelAnalyzer, ProgressCallback, ProgressEvent, ProgressPhase};
pub use variants::{SymbolVariance, VarianceReport};

use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use symscope_core::{AnalyzerConfig, Configuration, ConfigurationSet, Result};
use symscope_parser::{analyze_unit, FileSystemIncludes, IncludeResolver, SourceUnit, UnitAnalysis};
use tracing::info;

/// Analyzer for C translation units
#[derive(Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    resolver: Arc<dyn IncludeResolver>,
}

impl Analyzer {
    /// Analyzer resolving `#include` against `config.include_paths`
    pub fn new(config: AnalyzerConfig) -> Self {
        let resolver = Arc::new(FileSystemIncludes::from_config(&config));
        Self { config, resolver }
    }

    /// Replace the include resolver
    pub fn with_resolver(mut self, resolver: impl IncludeResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze a unit under the base defines only
    pub fn analyze(&self, unit: &SourceUnit) -> UnitAnalysis {
        analyze_unit(unit, &self.config, None, self.resolver.as_ref())
    }

    /// Analyze a unit under one configuration
    pub fn analyze_with(&self, unit: &SourceUnit, configuration: &Configuration) -> UnitAnalysis {
        analyze_unit(unit, &self.config, Some(configuration), self.resolver.as_ref())
    }

    /// Read and analyze a file
    pub fn analyze_file(&self, path: &Path) -> Result<UnitAnalysis> {
        let unit = SourceUnit::from_file(path)?;
        Ok(self.analyze(&unit))
    }

    /// Analyze a unit once per configuration. Each run is independent, so
    /// the runs execute in parallel; results keep the order of `set`.
    pub fn analyze_configurations(&self, unit: &SourceUnit, set: &ConfigurationSet) -> Vec<UnitAnalysis> {
        info!(
            "Analyzing {} under {} configurations",
            unit.path,
            set.len()
        );
        set.configurations
            .par_iter()
            .map(|configuration| self.analyze_with(unit, configuration))
            .collect()
    }

    /// Analyze under every configuration and compare the catalogues
    pub fn variance(&self, unit: &SourceUnit, set: &ConfigurationSet) -> VarianceReport {
        VarianceReport::from_analyses(&self.analyze_configurations(unit, set))
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

#[cfg(test)]
mod tests;
