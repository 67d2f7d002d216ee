//! Symscope Parser
//!
//! Single-pass analysis of one C translation unit: lexing, conditional
//! compilation, macro expansion and typedef-aware declaration parsing,
//! all feeding one symbol table.
//!
//! ## Modules
//!
//! - `lexer` - Source text to tokens
//! - `preprocessor` - Directives, conditional regions, macros, includes
//! - `parser` - Declarations and statements, resolved against live typedefs
//! - `symbols` - Scoped catalogue of code objects and references
//! - `context` - Per-run state threaded through the pipeline

pub mod context;
pub mod lexer;
pub mod parser;
pub mod preprocessor;
pub mod symbols;
pub mod token;

pub use context::AnalysisContext;
pub use lexer::{LexError, Lexer};
pub use parser::{Parser, SyntaxError};
pub use preprocessor::{
    BranchRecord, FileSystemIncludes, IncludeResolver, IncludedSource, MemoryIncludes, NoIncludes, Preprocessor,
};
pub use symbols::{Reference, SymbolTable};

use serde::{Deserialize, Serialize};
use std::path::Path;
use symscope_core::{
    AnalyzerConfig, CodeObject, Configuration, DeclaratorKind, Diagnostic, DiagnosticKind, ObjectId, Result,
};
use tracing::{debug, info};

/// One translation unit's source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path.to_string_lossy(), text))
    }
}

/// Catalogue and findings of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitAnalysis {
    pub path: String,
    /// Configuration the unit was analyzed under, if any
    pub configuration: Option<String>,
    pub objects: Vec<CodeObject>,
    pub references: Vec<Reference>,
    /// Sorted by location
    pub diagnostics: Vec<Diagnostic>,
    /// Every conditional branch seen, in source order
    pub branches: Vec<BranchRecord>,
    /// A structural failure stopped the unit early
    pub aborted: bool,
}

impl UnitAnalysis {
    pub fn get(&self, id: ObjectId) -> Option<&CodeObject> {
        self.objects.get(id.0)
    }

    /// First object with this name
    pub fn find(&self, name: &str) -> Option<&CodeObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn find_kind(&self, name: &str, kind: DeclaratorKind) -> Option<&CodeObject> {
        self.objects.iter().find(|o| o.name == name && o.kind == kind)
    }

    pub fn objects_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CodeObject> + 'a {
        self.objects.iter().filter(move |o| o.name == name)
    }

    pub fn references_to<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Reference> + 'a {
        self.references.iter().filter(move |r| r.name == name)
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// Branches whose text was active
    pub fn active_branches(&self) -> impl Iterator<Item = &BranchRecord> {
        self.branches.iter().filter(|b| b.taken)
    }
}

/// Analyze one translation unit under an optional configuration.
///
/// Always returns the catalogue and diagnostics gathered so far; a
/// structural failure sets `aborted` and adds one fatal diagnostic.
pub fn analyze_unit(
    unit: &SourceUnit,
    config: &AnalyzerConfig,
    configuration: Option<&Configuration>,
    resolver: &dyn IncludeResolver,
) -> UnitAnalysis {
    let configuration_name = configuration.map(|c| c.name.clone());
    info!(
        "Analyzing {} ({})",
        unit.path,
        configuration_name.as_deref().unwrap_or("base configuration")
    );

    let mut ctx = AnalysisContext::new(config, configuration);
    let (ctx, aborted) = match Lexer::new(&unit.text, unit.path.as_str()).tokenize() {
        Ok(tokens) => {
            debug!("{} tokens in {}", tokens.len(), unit.path);
            let preprocessor = Preprocessor::new(unit.path.as_str(), tokens, resolver);
            let mut parser = Parser::new(preprocessor, ctx);
            parser.parse_translation_unit();
            let aborted = parser.aborted();
            (parser.into_context(), aborted)
        }
        Err(e) => {
            ctx.diagnostics
                .report(DiagnosticKind::StructuralFatal, e.location, e.message);
            (ctx, true)
        }
    };

    let (objects, references) = ctx.symbols.into_parts();
    let diagnostics = ctx.diagnostics.into_sorted();
    info!(
        "{}: {} objects, {} diagnostics{}",
        unit.path,
        objects.len(),
        diagnostics.len(),
        if aborted { ", aborted" } else { "" }
    );

    UnitAnalysis {
        path: unit.path.clone(),
        configuration: configuration_name,
        objects,
        references,
        diagnostics,
        branches: ctx.conditions.into_branches(),
        aborted,
    }
}

#[cfg(test)]
mod tests;
