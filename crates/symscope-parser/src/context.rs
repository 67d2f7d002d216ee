//! Per-run analysis state
//!
//! Everything the preprocessor and parser mutate while walking one
//! translation unit lives in one [`AnalysisContext`] that is passed down
//! explicitly. Two runs never share a context.

use crate::preprocessor::conditional::ConditionalStack;
use crate::preprocessor::macros::MacroTable;
use crate::symbols::SymbolTable;
use symscope_core::{AnalyzerConfig, Configuration, Diagnostics};

#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub macros: MacroTable,
    pub conditions: ConditionalStack,
    pub symbols: SymbolTable,
    pub diagnostics: Diagnostics,
    pub config: AnalyzerConfig,
}

impl AnalysisContext {
    /// Fresh context with the base defines of `config` and, if given, the
    /// values of one configuration on top
    pub fn new(config: &AnalyzerConfig, configuration: Option<&Configuration>) -> Self {
        let mut macros = MacroTable::new(config.max_expansion_passes);
        let environment = match configuration {
            Some(c) => config.environment_for(c),
            None => config.defines.clone(),
        };
        for (name, value) in &environment {
            macros.define_value(name, *value);
        }

        Self {
            macros,
            conditions: ConditionalStack::new(),
            symbols: SymbolTable::new(),
            diagnostics: Diagnostics::new(),
            config: config.clone(),
        }
    }
}
