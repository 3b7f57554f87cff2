//! Agent configuration stored as TOML (default `autodev.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Upper bound for any network-dependent process.
pub const MAX_NETWORK_TIMEOUT_SECS: u64 = 300;

/// Agent configuration (TOML).
///
/// Missing fields fall back to the defaults below, so an empty or absent file
/// is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory under which every project lives.
    pub project_root: PathBuf,

    /// Directory holding the memory store files.
    pub memory_dir: PathBuf,

    /// Seconds hybrid mode waits for operator input before a self-directed cycle.
    pub idle_timeout_secs: u64,

    /// Pause after a cycle error.
    pub cycle_backoff_secs: u64,

    /// Pause after each self-directed cycle.
    pub cycle_pause_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Extra path prefixes that tools must never write or delete.
    pub protected_paths: Vec<String>,

    pub timeouts: TimeoutConfig,

    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// General shell commands and git calls.
    pub command_secs: u64,
    /// Goal verification.
    pub verify_secs: u64,
    /// Each repair check.
    pub repair_secs: u64,
    /// The `test` tool.
    pub test_tool_secs: u64,
    /// Network operations (pip install, git clone, downloads).
    pub network_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            command_secs: 60,
            verify_secs: 60,
            repair_secs: 30,
            test_tool_secs: 120,
            network_secs: MAX_NETWORK_TIMEOUT_SECS,
        }
    }
}

impl TimeoutConfig {
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn verify(&self) -> Duration {
        Duration::from_secs(self.verify_secs)
    }

    pub fn repair(&self) -> Duration {
        Duration::from_secs(self.repair_secs)
    }

    pub fn test_tool(&self) -> Duration {
        Duration::from_secs(self.test_tool_secs)
    }

    pub fn network(&self) -> Duration {
        Duration::from_secs(self.network_secs)
    }
}

/// External generation backend. An empty command disables generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Program and arguments; the prompt is written to its stdin.
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 300,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("projects"),
            memory_dir: PathBuf::from(".autodev/memory"),
            idle_timeout_secs: 10,
            cycle_backoff_secs: 3,
            cycle_pause_secs: 2,
            output_limit_bytes: 100_000,
            protected_paths: Vec::new(),
            timeouts: TimeoutConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.project_root.as_os_str().is_empty() {
            return Err(anyhow!("project_root must not be empty"));
        }
        if self.memory_dir.as_os_str().is_empty() {
            return Err(anyhow!("memory_dir must not be empty"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        let t = &self.timeouts;
        for (name, value) in [
            ("timeouts.command_secs", t.command_secs),
            ("timeouts.verify_secs", t.verify_secs),
            ("timeouts.repair_secs", t.repair_secs),
            ("timeouts.test_tool_secs", t.test_tool_secs),
            ("timeouts.network_secs", t.network_secs),
        ] {
            if value == 0 {
                return Err(anyhow!("{name} must be > 0"));
            }
        }
        if t.network_secs > MAX_NETWORK_TIMEOUT_SECS {
            return Err(anyhow!(
                "timeouts.network_secs must be <= {MAX_NETWORK_TIMEOUT_SECS}"
            ));
        }
        if !self.backend.command.is_empty() && self.backend.command[0].trim().is_empty() {
            return Err(anyhow!("backend.command must start with a program name"));
        }
        if !self.backend.command.is_empty() && self.backend.timeout_secs == 0 {
            return Err(anyhow!("backend.timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn cycle_backoff(&self) -> Duration {
        Duration::from_secs(self.cycle_backoff_secs)
    }

    pub fn cycle_pause(&self) -> Duration {
        Duration::from_secs(self.cycle_pause_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    crate::io::fsutil::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("autodev.toml");
        let mut cfg = AgentConfig::default();
        cfg.backend.command = vec!["llm".to_string(), "--quiet".to_string()];
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("autodev.toml");
        fs::write(&path, "idle_timeout_secs = 2\n[timeouts]\nrepair_secs = 5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.idle_timeout_secs, 2);
        assert_eq!(cfg.timeouts.repair_secs, 5);
        assert_eq!(cfg.timeouts.verify_secs, 60);
    }

    #[test]
    fn network_timeout_is_capped() {
        let mut cfg = AgentConfig::default();
        cfg.timeouts.network_secs = 301;
        assert!(cfg.validate().is_err());
    }
}
