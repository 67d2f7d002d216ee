//! Parallel analysis of independent translation units using rayon
//!
//! Units share nothing while they run; each gets its own context.

use crate::Analyzer;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use symscope_core::Result;
use symscope_parser::{SourceUnit, UnitAnalysis};
use tracing::{debug, info};

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Progress event for tracking a batch
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// Batch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Reading,
    Analyzing,
    Complete,
}

/// Runs an [`Analyzer`] over many units at once
pub struct ParallelAnalyzer {
    analyzer: Analyzer,
    progress_callback: Option<Arc<ProgressCallback>>,
}

impl ParallelAnalyzer {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer,
            progress_callback: None,
        }
    }

    /// Set progress callback
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Analyze units in parallel; results keep the input order
    pub fn analyze_units(&self, units: &[SourceUnit]) -> Vec<UnitAnalysis> {
        let total = units.len();
        let processed = AtomicUsize::new(0);

        self.emit_progress(ProgressPhase::Analyzing, 0, total, "Starting parallel analysis...");

        let results: Vec<_> = units
            .par_iter()
            .map(|unit| {
                let analysis = self.analyzer.analyze(unit);
                let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
                if current % 10 == 0 || current == total {
                    self.emit_progress(
                        ProgressPhase::Analyzing,
                        current,
                        total,
                        format!("Analyzed {}/{} units", current, total),
                    );
                }
                analysis
            })
            .collect();

        self.emit_progress(ProgressPhase::Complete, total, total, "Analysis complete");
        info!("Analyzed {} units", total);
        results
    }

    /// Read and analyze files in parallel. A file that cannot be read
    /// yields an error for that file only.
    pub fn analyze_files(&self, paths: &[PathBuf]) -> Vec<(PathBuf, Result<UnitAnalysis>)> {
        let total = paths.len();
        self.emit_progress(ProgressPhase::Reading, 0, total, format!("Reading {} files", total));

        let processed = AtomicUsize::new(0);
        let results: Vec<_> = paths
            .par_iter()
            .map(|path| {
                debug!("Analyzing {:?}", path);
                let result = self.analyzer.analyze_file(path);
                let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
                if current % 10 == 0 || current == total {
                    self.emit_progress(
                        ProgressPhase::Analyzing,
                        current,
                        total,
                        format!("Analyzed {}/{} files", current, total),
                    );
                }
                (path.clone(), result)
            })
            .collect();

        self.emit_progress(ProgressPhase::Complete, total, total, "Analysis complete");
        results
    }

    fn emit_progress<S: Into<String>>(&self, phase: ProgressPhase, current: usize, total: usize, message: S) {
        if let Some(ref callback) = self.progress_callback {
            callback(ProgressEvent {
                phase,
                current,
                total,
                message: message.into(),
            });
        }
    }
}

impl Default for ParallelAnalyzer {
    fn default() -> Self {
        Self::new(Analyzer::default())
    }
}
