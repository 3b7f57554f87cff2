//! Durable agent memory.
//!
//! Four collections live side by side in the memory directory:
//!
//! - `state.json`: counters and the active project.
//! - `history.jsonl`: append-only audit log, one JSON object per line.
//! - `projects.json`: project registry keyed by name.
//! - `patterns.json`: capped archive of successful and failed approaches.
//!
//! Absent or corrupt files load as defaults (corruption is logged). Every
//! mutation rewrites the affected collection in full; there is no transaction
//! across collections.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::core::text::truncate_chars;
use crate::io::fsutil::write_atomic;

/// Most recent entries kept per pattern list.
pub const PATTERN_CAP: usize = 100;
/// Longest failure error kept in a pattern record.
pub const PATTERN_ERROR_CHARS: usize = 500;
/// History entries rendered in the context summary.
pub const SUMMARY_HISTORY: usize = 5;
const SUMMARY_DETAIL_CHARS: usize = 80;

const STATE_FILE: &str = "state.json";
const HISTORY_FILE: &str = "history.jsonl";
const PROJECTS_FILE: &str = "projects.json";
const PATTERNS_FILE: &str = "patterns.json";

/// Current time as UNIX epoch seconds.
pub fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryState {
    pub boot_count: u64,
    pub total_goals_completed: u64,
    pub total_goals_failed: u64,
    pub total_commands_executed: u64,
    pub last_active_project: Option<String>,
    pub last_boot: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub path: String,
    pub description: String,
    pub language: String,
    pub created: f64,
    pub last_modified: f64,
    pub commit_count: u32,
    pub test_pass: Option<bool>,
}

/// Fields to merge into a project record; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectUpdate {
    pub path: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub commit_count: Option<u32>,
    pub test_pass: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub goal: String,
    pub approach: Vec<String>,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternArchive {
    pub successful_patterns: Vec<PatternRecord>,
    pub failed_patterns: Vec<PatternRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub details: Value,
    pub success: bool,
}

impl HistoryEntry {
    fn details_text(&self) -> String {
        match &self.details {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Persistent memory for one agent process. Single writer.
#[derive(Debug)]
pub struct MemoryStore {
    dir: PathBuf,
    state: MemoryState,
    projects: BTreeMap<String, ProjectRecord>,
    patterns: PatternArchive,
}

impl MemoryStore {
    /// Load all collections from `dir` and count a boot.
    ///
    /// Fails only if the directory cannot be created or the boot cannot be persisted.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create memory dir {}", dir.display()))?;
        let mut store = Self::inspect(dir);
        store.state.boot_count += 1;
        store.state.last_boot = Some(now_epoch());
        store.save_state()?;
        info!(
            boot = store.state.boot_count,
            projects = store.projects.len(),
            "memory loaded"
        );
        Ok(store)
    }

    /// Load without counting a boot or writing anything. Missing files read as defaults.
    pub fn inspect(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            state: load_or_default(&dir.join(STATE_FILE)),
            projects: load_or_default(&dir.join(PROJECTS_FILE)),
            patterns: load_or_default(&dir.join(PATTERNS_FILE)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    pub fn projects(&self) -> &BTreeMap<String, ProjectRecord> {
        &self.projects
    }

    pub fn patterns(&self) -> &PatternArchive {
        &self.patterns
    }

    pub fn active_project(&self) -> Option<&str> {
        self.state.last_active_project.as_deref()
    }

    /// Append one history line and count the command.
    pub fn record_action(
        &mut self,
        kind: &str,
        details: impl Into<Value>,
        success: bool,
    ) -> Result<()> {
        let entry = HistoryEntry {
            timestamp: now_epoch(),
            kind: kind.to_string(),
            details: details.into(),
            success,
        };
        let mut line = serde_json::to_string(&entry).context("serialize history entry")?;
        line.push('\n');
        let path = self.dir.join(HISTORY_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append {}", path.display()))?;

        self.state.total_commands_executed += 1;
        self.save_state()
    }

    /// Insert a fresh project record and make it the active project.
    pub fn register_project(&mut self, name: &str, path: &str, description: &str) -> Result<()> {
        let now = now_epoch();
        self.projects.insert(
            name.to_string(),
            ProjectRecord {
                path: path.to_string(),
                description: description.to_string(),
                language: "python".to_string(),
                created: now,
                last_modified: now,
                commit_count: 0,
                test_pass: None,
            },
        );
        self.state.last_active_project = Some(name.to_string());
        self.save_projects()?;
        self.save_state()?;
        info!(project = name, path, "registered project");
        Ok(())
    }

    /// Merge `update` into the record for `name`, creating it if needed.
    pub fn update_project(&mut self, name: &str, update: ProjectUpdate) -> Result<()> {
        let now = now_epoch();
        let record = self
            .projects
            .entry(name.to_string())
            .or_insert_with(|| ProjectRecord {
                path: String::new(),
                description: String::new(),
                language: "python".to_string(),
                created: now,
                last_modified: now,
                commit_count: 0,
                test_pass: None,
            });
        if let Some(path) = update.path {
            record.path = path;
        }
        if let Some(description) = update.description {
            record.description = description;
        }
        if let Some(language) = update.language {
            record.language = language;
        }
        if let Some(count) = update.commit_count {
            record.commit_count = count;
        }
        if update.test_pass.is_some() {
            record.test_pass = update.test_pass;
        }
        record.last_modified = now;
        self.state.last_active_project = Some(name.to_string());
        self.save_projects()?;
        self.save_state()
    }

    pub fn record_success(&mut self, goal: &str, approach: Vec<String>) -> Result<()> {
        push_capped(
            &mut self.patterns.successful_patterns,
            PatternRecord {
                goal: goal.to_string(),
                approach,
                timestamp: now_epoch(),
                error: None,
            },
        );
        self.state.total_goals_completed += 1;
        self.save_patterns()?;
        self.save_state()
    }

    pub fn record_failure(&mut self, goal: &str, approach: Vec<String>, error: &str) -> Result<()> {
        push_capped(
            &mut self.patterns.failed_patterns,
            PatternRecord {
                goal: goal.to_string(),
                approach,
                timestamp: now_epoch(),
                error: Some(truncate_chars(error, PATTERN_ERROR_CHARS)),
            },
        );
        self.state.total_goals_failed += 1;
        self.save_patterns()?;
        self.save_state()
    }

    /// Last `count` parseable history entries, oldest first.
    pub fn recent_history(&self, count: usize) -> Vec<HistoryEntry> {
        let path = self.dir.join(HISTORY_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(_) => return Vec::new(),
        };
        let lines: Vec<&str> = contents.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(count);
        lines[start..]
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Human-readable digest of counters, projects and recent actions.
    pub fn context_summary(&self) -> String {
        let mut lines = vec![
            format!("Boot #{}", self.state.boot_count),
            format!("Goals completed: {}", self.state.total_goals_completed),
            format!("Goals failed: {}", self.state.total_goals_failed),
            format!("Commands executed: {}", self.state.total_commands_executed),
        ];
        if !self.projects.is_empty() {
            let names: Vec<&str> = self.projects.keys().map(String::as_str).collect();
            lines.push(format!("Projects: {}", names.join(", ")));
        }
        if let Some(active) = self.active_project() {
            lines.push(format!("Last active: {active}"));
        }
        let recent = self.recent_history(SUMMARY_HISTORY);
        if !recent.is_empty() {
            lines.push("Recent actions:".to_string());
            for entry in recent {
                let status = if entry.success { "OK" } else { "FAIL" };
                lines.push(format!(
                    "  [{status}] {}: {}",
                    entry.kind,
                    truncate_chars(&entry.details_text(), SUMMARY_DETAIL_CHARS)
                ));
            }
        }
        lines.join("\n")
    }

    fn save_state(&self) -> Result<()> {
        save_json(&self.dir.join(STATE_FILE), &self.state)
    }

    fn save_projects(&self) -> Result<()> {
        save_json(&self.dir.join(PROJECTS_FILE), &self.projects)
    }

    fn save_patterns(&self) -> Result<()> {
        save_json(&self.dir.join(PATTERNS_FILE), &self.patterns)
    }
}

fn push_capped(list: &mut Vec<PatternRecord>, record: PatternRecord) {
    list.push(record);
    if list.len() > PATTERN_CAP {
        let excess = list.len() - PATTERN_CAP;
        list.drain(..excess);
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(path = %path.display(), err = %e, "unreadable memory file, using defaults");
            return T::default();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), err = %e, "corrupt memory file, using defaults");
            T::default()
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    write_atomic(path, &payload)
}
