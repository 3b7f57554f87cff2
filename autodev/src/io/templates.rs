//! Embedded goal catalog and file templates.
//!
//! The catalog is compiled into the binary and parsed once on first use. It
//! is read-only for the lifetime of the process.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::types::Goal;

const CATALOG_TOML: &str = include_str!("../../templates/catalog.toml");

/// Server module written by the `create_api` plan.
pub const API_SERVER_PY: &str = include_str!("../../templates/api_server/server.py");
/// Test module written by the `create_api` plan.
pub const API_SERVER_TEST_PY: &str = include_str!("../../templates/api_server/test_server.py");

/// Goal catalog split by tier.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoalCatalog {
    pub basic: Vec<Goal>,
    pub advanced: Vec<Goal>,
}

static CATALOG: LazyLock<GoalCatalog> = LazyLock::new(|| {
    GoalCatalog::parse(CATALOG_TOML).expect("embedded goal catalog should parse")
});

/// The process-wide embedded catalog.
pub fn catalog() -> &'static GoalCatalog {
    &CATALOG
}

impl GoalCatalog {
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("parse goal catalog")
    }

    /// Every goal, basic tier first.
    pub fn all(&self) -> impl Iterator<Item = &Goal> {
        self.basic.iter().chain(&self.advanced)
    }

    /// First goal whose keyword appears in `description` (case-insensitive).
    pub fn find_by_keyword(&self, description: &str) -> Option<&Goal> {
        let lower = description.to_lowercase();
        self.all().find(|goal| {
            goal.keywords
                .iter()
                .any(|kw| lower.contains(&kw.to_lowercase()))
        })
    }

    /// Goal whose description matches exactly. Used to map archived patterns back to names.
    pub fn by_description(&self, description: &str) -> Option<&Goal> {
        self.all().find(|goal| goal.description == description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_has_both_tiers_with_tests() {
        let catalog = catalog();
        assert!(!catalog.basic.is_empty());
        assert!(!catalog.advanced.is_empty());
        for goal in catalog.all() {
            assert!(!goal.files.is_empty(), "{} has no files", goal.name);
            assert!(goal.test_cmd.is_some(), "{} has no test command", goal.name);
        }
    }

    #[test]
    fn goal_names_are_unique() {
        let mut names: Vec<&str> = catalog().all().map(|g| g.name.as_str()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn keyword_lookup_is_case_insensitive() {
        let goal = catalog().find_by_keyword("a JSON thing").expect("match");
        assert_eq!(goal.name, "json_parser");
        assert!(catalog().find_by_keyword("zzz qqq").is_none());
    }

    #[test]
    fn parse_accepts_inline_catalog() {
        let catalog = GoalCatalog::parse(
            "[[basic]]\nname = \"a\"\ndescription = \"A\"\nkeywords = [\"x\"]\n[basic.files]\n\"a.py\" = \"print(1)\"\n",
        )
        .expect("parse");
        assert_eq!(catalog.basic[0].files["a.py"], "print(1)");
        assert!(catalog.advanced.is_empty());
        assert_eq!(catalog.by_description("A").map(|g| g.name.as_str()), Some("a"));
    }
}
