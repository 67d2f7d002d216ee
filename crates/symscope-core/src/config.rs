//! Configuration types
//!
//! A [`Configuration`] is one named macro environment used to evaluate
//! conditional compilation. A [`ConfigurationSet`] drives the
//! multi-configuration mode. [`AnalyzerConfig`] holds the knobs of a run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while building configurations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid define argument: {0}")]
    InvalidDefine(String),

    #[error("Invalid config line: {0}")]
    InvalidLine(String),

    #[error("Macro {name} has non-integer value `{value}`")]
    InvalidValue { name: String, value: String },

    #[error("Duplicate configuration name: {0}")]
    DuplicateName(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// Analyzer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Macros defined for every run, below any configuration's values
    pub defines: BTreeMap<String, i64>,

    /// Search path for the filesystem include resolver
    pub include_paths: Vec<PathBuf>,

    /// Maximum `#include` nesting
    pub max_include_depth: usize,

    /// Maximum rescans of one macro expansion
    pub max_expansion_passes: usize,

    /// Promote the last tentative definition when no real one exists
    pub promote_tentative: bool,

    /// Report void variables and unknown type names
    pub report_suspicious: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            defines: BTreeMap::new(),
            include_paths: Vec::new(),
            max_include_depth: 64,
            max_expansion_passes: 32,
            promote_tentative: true,
            report_suspicious: true,
        }
    }
}

impl AnalyzerConfig {
    /// Base defines overlaid with a configuration's values
    pub fn environment_for(&self, configuration: &Configuration) -> BTreeMap<String, i64> {
        let mut env = self.defines.clone();
        env.extend(configuration.values.iter().map(|(k, v)| (k.clone(), *v)));
        env
    }
}

/// A named mapping from macro name to integer value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    #[serde(default)]
    pub values: BTreeMap<String, i64>,
}

impl Configuration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style define
    pub fn with(mut self, name: impl Into<String>, value: i64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Build from compiler-style arguments: `-DNAME`, `-DNAME=VALUE`, `-UNAME`
    pub fn from_define_args<S: AsRef<str>>(name: &str, args: &[S]) -> Result<Self, ConfigError> {
        let define_re = Regex::new(r"^-D([A-Za-z_]\w*)(?:=(.*))?$").unwrap();
        let undef_re = Regex::new(r"^-U([A-Za-z_]\w*)$").unwrap();

        let mut config = Self::new(name);
        for arg in args {
            let arg = arg.as_ref().trim();
            if let Some(cap) = define_re.captures(arg) {
                let macro_name = cap[1].to_string();
                let value = match cap.get(2) {
                    None => 1,
                    Some(v) => parse_int(v.as_str()).ok_or_else(|| ConfigError::InvalidValue {
                        name: macro_name.clone(),
                        value: v.as_str().to_string(),
                    })?,
                };
                config.values.insert(macro_name, value);
            } else if let Some(cap) = undef_re.captures(arg) {
                config.values.remove(&cap[1]);
            } else {
                return Err(ConfigError::InvalidDefine(arg.to_string()));
            }
        }
        Ok(config)
    }

    /// Build from `.config`-style content: `NAME=VALUE` lines, `y`/`m`
    /// meaning 1, `n` and `# NAME is not set` meaning undefined.
    /// Non-integer values (strings) cannot take part in `#if` arithmetic
    /// and are skipped.
    pub fn from_dot_config(name: &str, content: &str) -> Result<Self, ConfigError> {
        let line_re = Regex::new(r"^([A-Za-z_]\w*)\s*=\s*(.*)$").unwrap();
        let not_set_re = Regex::new(r"^#\s*([A-Za-z_]\w*) is not set$").unwrap();

        let mut config = Self::new(name);
        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                if let Some(cap) = not_set_re.captures(line) {
                    config.values.remove(&cap[1]);
                }
                continue;
            }

            let cap = line_re
                .captures(line)
                .ok_or_else(|| ConfigError::InvalidLine(line.to_string()))?;
            let key = cap[1].to_string();
            match cap[2].trim() {
                "y" | "m" => {
                    config.values.insert(key, 1);
                }
                "n" => {
                    config.values.remove(&key);
                }
                value => {
                    if let Some(n) = parse_int(value) {
                        config.values.insert(key, n);
                    }
                }
            }
        }
        Ok(config)
    }
}

/// Parse a C-style integer: decimal, `0x` hex, `0b` binary, leading-zero octal
pub fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}

/// Ordered set of configurations for multi-configuration analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSet {
    pub configurations: Vec<Configuration>,
}

impl ConfigurationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration; names must be unique
    pub fn push(&mut self, configuration: Configuration) -> Result<(), ConfigError> {
        if self.configurations.iter().any(|c| c.name == configuration.name) {
            return Err(ConfigError::DuplicateName(configuration.name));
        }
        self.configurations.push(configuration);
        Ok(())
    }

    /// One configuration per value `0..2^bits` of a bitmask-style macro,
    /// named `MACRO=value`.
    pub fn bitmask(macro_name: &str, bits: u32) -> Self {
        let configurations = (0..(1i64 << bits))
            .map(|v| Configuration::new(format!("{}={}", macro_name, v)).with(macro_name, v))
            .collect();
        Self { configurations }
    }

    pub fn from_yaml_str(content: &str) -> crate::Result<Self> {
        let set: ConfigurationSet = serde_yaml::from_str(content)?;
        set.validate()?;
        Ok(set)
    }

    pub fn from_json_str(content: &str) -> crate::Result<Self> {
        let set: ConfigurationSet = serde_json::from_str(content)?;
        set.validate()?;
        Ok(set)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(crate::Error::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for c in &self.configurations {
            if !seen.insert(c.name.as_str()) {
                return Err(ConfigError::DuplicateName(c.name.clone()));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Configuration> {
        self.configurations.iter()
    }
}
