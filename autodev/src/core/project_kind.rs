//! Project kind detection from the file names in a project directory.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Python,
    Node,
    Rust,
    Go,
    C,
    Shell,
}

/// Marker files, or `*.ext` suffixes, per kind. Order is detection order.
const INDICATORS: &[(ProjectKind, &[&str])] = &[
    (
        ProjectKind::Python,
        &["setup.py", "pyproject.toml", "requirements.txt", "*.py"],
    ),
    (ProjectKind::Node, &["package.json", "node_modules"]),
    (ProjectKind::Rust, &["Cargo.toml"]),
    (ProjectKind::Go, &["go.mod"]),
    (ProjectKind::C, &["Makefile", "*.c", "*.h"]),
    (ProjectKind::Shell, &["*.sh"]),
];

/// Fallback syntax check when a goal has no test command.
pub const PYTHON_SYNTAX_CHECK: &str = "python3 -m py_compile *.py 2>&1";

impl ProjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectKind::Python => "python",
            ProjectKind::Node => "node",
            ProjectKind::Rust => "rust",
            ProjectKind::Go => "go",
            ProjectKind::C => "c",
            ProjectKind::Shell => "shell",
        }
    }

    /// Default verification command, if the kind has one.
    pub fn check_command(self) -> Option<&'static str> {
        match self {
            ProjectKind::Python => {
                Some("python3 -m unittest discover -s . -v 2>&1 || python3 -m py_compile *.py 2>&1")
            }
            ProjectKind::Node => Some("npm test 2>&1"),
            ProjectKind::Rust => Some("cargo test 2>&1"),
            ProjectKind::Go => Some("go test ./... 2>&1"),
            ProjectKind::C => Some("make test 2>&1"),
            ProjectKind::Shell => None,
        }
    }

    /// Command run by the `test` tool for this kind.
    pub fn test_command(self) -> Option<&'static str> {
        match self {
            ProjectKind::Python => {
                Some("python3 -m pytest -x 2>/dev/null || python3 -m unittest discover -s . 2>&1")
            }
            ProjectKind::C => Some("make test 2>&1 || make && ./a.out 2>&1"),
            other => other.check_command(),
        }
    }
}

fn marker_matches(marker: &str, files: &[String]) -> bool {
    match marker.strip_prefix('*') {
        Some(ext) => files.iter().any(|f| f.ends_with(ext)),
        None => files.iter().any(|f| f == marker),
    }
}

/// Detect every kind whose markers appear in `files` (directory entry names).
pub fn detect(files: &[String]) -> Vec<ProjectKind> {
    INDICATORS
        .iter()
        .filter(|(_, markers)| markers.iter().any(|m| marker_matches(m, files)))
        .map(|(kind, _)| *kind)
        .collect()
}

/// Comma-separated kind names, or `unknown`.
pub fn describe(kinds: &[ProjectKind]) -> String {
    if kinds.is_empty() {
        return "unknown".to_string();
    }
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn detects_python_by_extension() {
        assert_eq!(detect(&names(&["main.py", "README.md"])), vec![ProjectKind::Python]);
    }

    #[test]
    fn detects_multiple_kinds_in_order() {
        let kinds = detect(&names(&["Makefile", "run.sh", "Cargo.toml"]));
        assert_eq!(kinds, vec![ProjectKind::Rust, ProjectKind::C, ProjectKind::Shell]);
    }

    #[test]
    fn empty_directory_is_unknown() {
        assert!(detect(&[]).is_empty());
        assert_eq!(describe(&[]), "unknown");
    }

    #[test]
    fn shell_has_no_default_check() {
        assert_eq!(ProjectKind::Shell.check_command(), None);
    }
}
