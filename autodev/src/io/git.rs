//! Git adapter for project repositories.
//!
//! Every project the agent touches is its own repository. The wrapper keeps
//! the handful of operations it needs explicit and bounds each call with the
//! command timeout.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::io::process::{CommandOutput, run_command_with_timeout};

const AUTHOR_EMAIL: &str = "autodev@autonomous.local";
const AUTHOR_NAME: &str = "autodev-agent";
const GIT_OUTPUT_LIMIT: usize = 200_000;

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    timeout: Duration,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// True if the working directory is already a repository root.
    pub fn is_repo(&self) -> bool {
        self.workdir.join(".git").exists()
    }

    /// Initialize a repository on branch `main`. Re-running is harmless.
    #[instrument(skip_all, fields(workdir = %self.workdir.display()))]
    pub fn init(&self) -> Result<String> {
        std::fs::create_dir_all(&self.workdir)
            .with_context(|| format!("create repository dir {}", self.workdir.display()))?;
        let out = self.run_capture(&["init", "--initial-branch=main"])?;
        self.configure_identity()?;
        debug!("repository initialized");
        Ok(out)
    }

    /// Set a local author identity so commits work without global config.
    pub fn configure_identity(&self) -> Result<()> {
        self.run_checked(&["config", "user.email", AUTHOR_EMAIL])?;
        self.run_checked(&["config", "user.name", AUTHOR_NAME])?;
        Ok(())
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    /// Stage everything and commit. Returns false when there was nothing to commit.
    pub fn commit_all(&self, message: &str) -> Result<bool> {
        if !self.is_repo() {
            self.init()?;
        }
        self.configure_identity()?;
        self.add_all()?;
        self.commit_staged(message)
    }

    pub fn status_short(&self) -> Result<String> {
        self.run_capture(&["status", "--short"])
    }

    pub fn log_oneline(&self, count: u32) -> Result<String> {
        let count = count.to_string();
        self.run_capture(&["log", "--oneline", "-n", &count])
    }

    pub fn diff(&self) -> Result<String> {
        self.run_capture(&["diff"])
    }

    /// Number of commits reachable from HEAD (0 for an empty repository).
    pub fn commit_count(&self) -> Result<u32> {
        let out = self.run(&["rev-list", "--count", "HEAD"])?;
        if !out.status.success() {
            return Ok(0);
        }
        let text = String::from_utf8_lossy(&out.stdout);
        text.trim()
            .parse()
            .map_err(|e| anyhow!("parse commit count '{}': {e}", text.trim()))
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args)?;
        if output.timed_out {
            return Err(anyhow!(
                "git {} timed out after {}s",
                args.join(" "),
                self.timeout.as_secs()
            ));
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        run_command_with_timeout(cmd, None, self.timeout, GIT_OUTPUT_LIMIT)
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}
