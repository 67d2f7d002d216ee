//! Source code location types

use serde::{Deserialize, Serialize};

/// Represents a location in source code
///
/// Ordering is by file, then line, then column, which is the order
/// diagnostics are reported in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File path
    pub file: String,
    /// Line (1-based)
    pub line: u32,
    /// Column (1-based)
    pub column: u32,
}

impl Location {
    /// Create a new location
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location used for entities that do not come from a source file,
    /// e.g. macros supplied by a configuration.
    pub fn builtin() -> Self {
        Self::new("<builtin>", 0, 0)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_file_line_column() {
        let mut locs = vec![
            Location::new("b.c", 1, 1),
            Location::new("a.c", 3, 9),
            Location::new("a.c", 3, 2),
            Location::new("a.c", 1, 40),
        ];
        locs.sort();
        assert_eq!(locs[0], Location::new("a.c", 1, 40));
        assert_eq!(locs[1], Location::new("a.c", 3, 2));
        assert_eq!(locs[3].file, "b.c");
    }

    #[test]
    fn test_display() {
        assert_eq!(Location::new("x.c", 4, 2).to_string(), "x.c:4:2");
    }
}
