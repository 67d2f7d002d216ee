//! Configuration variance
//!
//! Compares the file-scope catalogues and active regions that one unit
//! produces under several configurations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use symscope_core::{DeclaratorKind, Location, Scope};
use symscope_parser::UnitAnalysis;

/// Name used for a run without a configuration
const BASE: &str = "<base>";

/// How one symbol fares across configurations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolVariance {
    pub name: String,
    /// Kinds of the symbol's file-scope objects, per configuration where
    /// it exists
    pub kinds: BTreeMap<String, Vec<DeclaratorKind>>,
    /// Configurations without the symbol
    pub absent_from: Vec<String>,
}

impl SymbolVariance {
    pub fn present_in(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// The symbol is read as different kinds in different configurations
    pub fn kind_varies(&self) -> bool {
        let mut kinds = self.kinds.values();
        match kinds.next() {
            Some(first) => kinds.any(|k| k != first),
            None => false,
        }
    }

    pub fn is_uniform(&self) -> bool {
        self.absent_from.is_empty() && !self.kind_varies()
    }

    pub fn kinds_in(&self, configuration: &str) -> Option<&[DeclaratorKind]> {
        self.kinds.get(configuration).map(Vec::as_slice)
    }
}

/// Per-symbol and per-region comparison of configuration runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VarianceReport {
    /// Configuration names in run order
    pub configurations: Vec<String>,
    /// Every file-scope symbol seen in any run, sorted by name
    pub symbols: Vec<SymbolVariance>,
    /// Start of every active conditional branch, per configuration
    pub active_regions: BTreeMap<String, Vec<Location>>,
}

impl VarianceReport {
    pub fn from_analyses(analyses: &[UnitAnalysis]) -> Self {
        let configurations: Vec<String> = analyses.iter().map(configuration_name).collect();

        let mut kinds: BTreeMap<String, BTreeMap<String, Vec<DeclaratorKind>>> = BTreeMap::new();
        for (analysis, configuration) in analyses.iter().zip(&configurations) {
            for object in analysis.objects.iter().filter(|o| o.scope != Scope::Local) {
                let seen = kinds
                    .entry(object.name.clone())
                    .or_default()
                    .entry(configuration.clone())
                    .or_default();
                if !seen.contains(&object.kind) {
                    seen.push(object.kind);
                }
            }
        }

        let symbols = kinds
            .into_iter()
            .map(|(name, kinds)| {
                let absent_from = configurations
                    .iter()
                    .filter(|c| !kinds.contains_key(*c))
                    .cloned()
                    .collect();
                SymbolVariance {
                    name,
                    kinds,
                    absent_from,
                }
            })
            .collect();

        let active_regions = analyses
            .iter()
            .zip(&configurations)
            .map(|(analysis, configuration)| {
                let starts = analysis.active_branches().map(|b| b.location.clone()).collect();
                (configuration.clone(), starts)
            })
            .collect();

        Self {
            configurations,
            symbols,
            active_regions,
        }
    }

    pub fn symbol(&self, name: &str) -> Option<&SymbolVariance> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Symbols whose presence or kind depends on the configuration
    pub fn varying(&self) -> impl Iterator<Item = &SymbolVariance> {
        self.symbols.iter().filter(|s| !s.is_uniform())
    }

    pub fn is_uniform(&self) -> bool {
        self.varying().next().is_none()
    }

    /// Configurations grouped by identical active regions, in run order
    pub fn region_groups(&self) -> Vec<Vec<String>> {
        let mut groups: Vec<(&Vec<Location>, Vec<String>)> = Vec::new();
        for configuration in &self.configurations {
            let Some(regions) = self.active_regions.get(configuration) else {
                continue;
            };
            match groups.iter_mut().find(|(r, _)| *r == regions) {
                Some((_, names)) => names.push(configuration.clone()),
                None => groups.push((regions, vec![configuration.clone()])),
            }
        }
        groups.into_iter().map(|(_, names)| names).collect()
    }
}

fn configuration_name(analysis: &UnitAnalysis) -> String {
    analysis
        .configuration
        .clone()
        .unwrap_or_else(|| BASE.to_string())
}
