//! Diagnostics collector
//!
//! Findings about the analyzed code accumulate here; reporting one never
//! interrupts the analysis. Only [`Severity::Fatal`] findings mean the
//! translation unit was abandoned early.

use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// `#else`, `#elif` or `#endif` without an open `#if`
    UnmatchedConditional,
    /// `#if` group still open at end of input
    UnterminatedConditional,
    /// `#define` of an existing macro with a different body
    MacroRedefinition,
    /// Redeclaration disagreeing in kind, type or linkage
    RedeclarationConflict,
    /// Second definition of the same name in the same scope
    MultipleDefinitions,
    /// Array bound and brace initializer length disagree
    ArraySizeMismatch,
    /// `#if`/`#elif` expression that could not be evaluated
    UnresolvedConditionalExpression,
    /// Construct skipped up to the next resync point
    UnparseableConstruct,
    /// Declaration that is accepted but probably wrong
    SuspiciousDeclaration,
    /// `#include` the resolver could not supply
    IncludeNotFound,
    /// `#error` in an active region
    ErrorDirective,
    /// Directive name not recognized
    UnknownDirective,
    /// Function-like macro invoked with a bad argument list
    MacroArguments,
    /// Unterminated comment or literal, unbalanced braces at end of input
    StructuralFatal,
}

/// How bad a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Note,
    Warning,
    Error,
    Fatal,
}

impl DiagnosticKind {
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticKind::StructuralFatal => Severity::Fatal,
            DiagnosticKind::UnparseableConstruct
            | DiagnosticKind::MultipleDefinitions
            | DiagnosticKind::ErrorDirective
            | DiagnosticKind::MacroArguments => Severity::Error,
            DiagnosticKind::IncludeNotFound => Severity::Note,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    /// Where parsing picked up again after skipping
    pub resync: Option<Location>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)?;
        if let Some(resync) = &self.resync {
            write!(f, " (resumed at {})", resync)?;
        }
        Ok(())
    }
}

/// Accumulates findings for one analysis pass
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding with the kind's default severity
    pub fn report(&mut self, kind: DiagnosticKind, location: Location, message: impl Into<String>) {
        self.push(kind, kind.default_severity(), location, message.into(), None);
    }

    /// Record a finding with an explicit severity
    pub fn report_with_severity(
        &mut self,
        kind: DiagnosticKind,
        severity: Severity,
        location: Location,
        message: impl Into<String>,
    ) {
        self.push(kind, severity, location, message.into(), None);
    }

    /// Record a skipped construct together with the point parsing resumed at
    pub fn report_with_resync(
        &mut self,
        kind: DiagnosticKind,
        location: Location,
        message: impl Into<String>,
        resync: Location,
    ) {
        self.push(kind, kind.default_severity(), location, message.into(), Some(resync));
    }

    fn push(
        &mut self,
        kind: DiagnosticKind,
        severity: Severity,
        location: Location,
        message: String,
        resync: Option<Location>,
    ) {
        self.entries.push(Diagnostic {
            kind,
            severity,
            location,
            message,
            resync,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Fatal)
    }

    /// Findings ordered by location; findings at the same location keep
    /// the order they were reported in.
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.entries.sort_by(|a, b| a.location.cmp(&b.location));
        self.entries
    }
}
