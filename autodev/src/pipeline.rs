//! Goal execution pipeline: setup, code generation, verification, bounded
//! self-repair and commit.
//!
//! File system and git work goes through the [`ToolRegistry`] so the same
//! safety checks apply as for operator commands. Check commands run directly
//! so their full output and timeout state reach the failure classifier.

use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::core::classifier::is_test_failure;
use crate::core::project_kind::{self, PYTHON_SYNTAX_CHECK};
use crate::core::repair_rules::{self, RepairDiagnosis};
use crate::core::safety::is_safe_command;
use crate::core::text::truncate_chars;
use crate::core::types::{Action, Goal, PipelineReport, StageName, StageReport, StageStatus};
use crate::io::backend::GenerationBackend;
use crate::io::fsutil::entry_names;
use crate::io::process::run_shell;
use crate::io::tools::ToolRegistry;

pub const MAX_REPAIR_ATTEMPTS: u32 = 3;
pub const VERIFY_DETAIL_CHARS: usize = 300;
pub const COMMIT_DETAIL_CHARS: usize = 200;
pub const NO_TESTS_DETAIL: &str = "no tests configured, syntax check only";

/// Result of one check command.
#[derive(Debug)]
struct CheckRun {
    passed: bool,
    text: String,
}

pub struct ExecutionPipeline<'a> {
    tools: &'a ToolRegistry,
    backend: &'a dyn GenerationBackend,
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn placeholder_main(description: &str) -> String {
    format!(
        "#!/usr/bin/env python3\n\"\"\"{description}\"\"\"\n\ndef main():\n    print(\"{description}\")\n\nif __name__ == \"__main__\":\n    main()\n"
    )
}

impl<'a> ExecutionPipeline<'a> {
    pub fn new(tools: &'a ToolRegistry, backend: &'a dyn GenerationBackend) -> Self {
        Self { tools, backend }
    }

    /// Build `goal` in `path`. A test command supplied by the backend's plan
    /// is stored on the goal. Never fails; problems end up in the report.
    #[instrument(skip_all, fields(goal = %goal.name, path = %path.display()))]
    pub fn execute_goal(&self, goal: &mut Goal, path: &Path) -> PipelineReport {
        let mut report = PipelineReport::new(&goal.description, &path_text(path));
        if let Err(err) = self.run_stages(goal, path, &mut report, true) {
            warn!(err = %format!("{err:#}"), "pipeline error");
            report.push(StageReport::fail(StageName::Error, format!("{err:#}")));
            report.success = false;
        }
        report
    }

    /// Verify, repair and commit an existing project without generating code.
    #[instrument(skip_all, fields(goal = %goal.name, path = %path.display()))]
    pub fn repair_existing(&self, goal: &Goal, path: &Path) -> PipelineReport {
        let mut report = PipelineReport::new(&goal.description, &path_text(path));
        let mut goal = goal.clone();
        let result = if path.is_dir() {
            self.run_stages(&mut goal, path, &mut report, false)
        } else {
            Err(anyhow::anyhow!("project not found: {}", path.display()))
        };
        if let Err(err) = result {
            warn!(err = %format!("{err:#}"), "repair error");
            report.push(StageReport::fail(StageName::Error, format!("{err:#}")));
            report.success = false;
        }
        report
    }

    fn run_stages(
        &self,
        goal: &mut Goal,
        path: &Path,
        report: &mut PipelineReport,
        generate: bool,
    ) -> Result<()> {
        if generate {
            report.push(self.setup(path));
            report.push(self.codegen(goal, path)?);
        }

        let verify = self.verify(goal, path)?;
        let mut passed = verify.status == StageStatus::Ok;
        report.push(verify);

        if !passed {
            let (stage, attempts) = self.repair(goal, path)?;
            passed = stage.status == StageStatus::Ok;
            report.repair_attempts = attempts;
            report.push(stage);
        }

        if passed {
            report.push(self.commit(goal, path));
            report.success = true;
        }
        Ok(())
    }

    /// Invoke a tool and turn a failed outcome into an error.
    fn call(&self, tool: &str, args: serde_json::Value) -> Result<String> {
        let outcome = self.tools.invoke(&Action::new(tool, args));
        if !outcome.success {
            bail!("{tool}: {}", outcome.output);
        }
        Ok(outcome.output)
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        self.call("write", json!({ "path": path_text(path), "content": content }))?;
        Ok(())
    }

    /// Tool failures are noted in the detail; later stages surface their effects.
    fn setup(&self, path: &Path) -> StageReport {
        info!(stage = "setup", path = %path.display());
        if path.exists() {
            return StageReport::ok(StageName::Setup, "exists");
        }
        let dir = path_text(path);
        let problems: Vec<String> = ["mkdir", "git_init"]
            .into_iter()
            .filter_map(|tool| {
                let outcome = self.tools.invoke(&Action::new(tool, json!({ "path": dir })));
                (!outcome.success).then(|| format!("{tool}: {}", outcome.output))
            })
            .collect();
        if problems.is_empty() {
            return StageReport::ok(StageName::Setup, "created");
        }
        warn!(problems = ?problems, "setup incomplete");
        StageReport::ok(
            StageName::Setup,
            format!("created with errors: {}", problems.join("; ")),
        )
    }

    fn codegen(&self, goal: &mut Goal, path: &Path) -> Result<StageReport> {
        info!(stage = "codegen", "writing files");
        let mut written = Vec::new();

        if !goal.files.is_empty() {
            for (name, content) in &goal.files {
                self.write(&path.join(name), content)?;
                info!(file = %name, "write");
                written.push(name.clone());
            }
        } else if self.backend.is_available() {
            written = self.generated_files(goal, path)?;
        }

        if written.is_empty() {
            self.write(&path.join("main.py"), &placeholder_main(&goal.description))?;
            written.push("main.py".to_string());
        }

        Ok(StageReport::ok(
            StageName::Codegen,
            format!("wrote {} files: {}", written.len(), written.join(", ")),
        ))
    }

    fn generated_files(&self, goal: &mut Goal, path: &Path) -> Result<Vec<String>> {
        let mut written = Vec::new();
        match self.backend.plan(&goal.description) {
            Some(plan) => {
                for (name, purpose) in &plan.files {
                    if let Some(code) = self.backend.code(purpose, name) {
                        self.write(&path.join(name), &code)?;
                        info!(file = %name, "generated");
                        written.push(name.clone());
                    }
                }
                if plan.test_cmd.is_some() {
                    goal.test_cmd = plan.test_cmd;
                }
            }
            None => {
                if let Some(code) = self.backend.code(&goal.description, "main.py") {
                    self.write(&path.join("main.py"), &code)?;
                    written.push("main.py".to_string());
                }
            }
        }
        Ok(written)
    }

    fn check(&self, command: &str, path: &Path, timeout: Duration) -> Result<CheckRun> {
        if !is_safe_command(command) {
            bail!("check command blocked by safety filter: {command}");
        }
        let ctx = self.tools.context();
        let output = run_shell(command, Some(path), timeout, ctx.output_limit_bytes)?;
        if output.timed_out {
            return Ok(CheckRun {
                passed: false,
                text: output.to_tool_text(),
            });
        }
        let mut text = output.stdout_text();
        text.push_str(&output.stderr_text());
        Ok(CheckRun {
            passed: !is_test_failure(Some(&text)),
            text,
        })
    }

    fn verify(&self, goal: &Goal, path: &Path) -> Result<StageReport> {
        info!(stage = "verify", "running checks");
        let timeout = self.tools.context().timeouts.verify();

        let command = match &goal.test_cmd {
            Some(cmd) => Some(cmd.clone()),
            None => {
                let kinds = project_kind::detect(&entry_names(path)?);
                kinds
                    .iter()
                    .find_map(|kind| kind.check_command())
                    .map(str::to_string)
            }
        };
        let Some(command) = command else {
            return Ok(StageReport::ok(StageName::Verify, NO_TESTS_DETAIL));
        };

        let run = self.check(&command, path, timeout)?;
        let detail = truncate_chars(&run.text, VERIFY_DETAIL_CHARS);
        let stage = if run.passed {
            StageReport::ok(StageName::Verify, detail)
        } else {
            StageReport::fail(StageName::Verify, detail)
        };
        Ok(stage.with_command(&command))
    }

    /// Returns the single repair stage and the number of checks that ran.
    fn repair(&self, goal: &Goal, path: &Path) -> Result<(StageReport, u32)> {
        info!(stage = "repair", "attempting self-repair");
        let timeout = self.tools.context().timeouts.repair();
        let command = goal.test_cmd.as_deref().unwrap_or(PYTHON_SYNTAX_CHECK);

        let mut attempts = 0;
        while attempts < MAX_REPAIR_ATTEMPTS {
            attempts += 1;
            info!(attempt = attempts, max = MAX_REPAIR_ATTEMPTS, "repair attempt");
            let run = self.check(command, path, timeout)?;
            if run.passed {
                return Ok((
                    StageReport::ok(StageName::Repair, format!("fixed on attempt {attempts}")),
                    attempts,
                ));
            }
            let fixed = if self.backend.is_available() {
                self.backend_fix(path, &run.text)?
            } else {
                self.rule_fix(path, &run.text)?
            };
            if !fixed {
                break;
            }
        }
        Ok((
            StageReport::fail(StageName::Repair, format!("failed after {attempts} attempts")),
            attempts,
        ))
    }

    /// Ask the backend to fix each Python file; stop at the first change.
    fn backend_fix(&self, path: &Path, error: &str) -> Result<bool> {
        for name in entry_names(path)?.iter().filter(|n| n.ends_with(".py")) {
            let file = path.join(name);
            let outcome = self
                .tools
                .invoke(&Action::new("read", json!({ "path": path_text(&file) })));
            if !outcome.success {
                continue;
            }
            let Some(fixed) = self.backend.fix(&outcome.output, error, name) else {
                continue;
            };
            if fixed != outcome.output {
                self.write(&file, &fixed)?;
                info!(file = %name, "backend fix applied");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn rule_fix(&self, path: &Path, error: &str) -> Result<bool> {
        let diagnosis = repair_rules::diagnose(error);
        match &diagnosis {
            RepairDiagnosis::MissingModule { module } => {
                info!(rule = diagnosis.rule(), module = ?module, "cannot install at this stage");
                Ok(false)
            }
            RepairDiagnosis::Syntax { file, line } => {
                info!(rule = diagnosis.rule(), file = ?file, line = ?line, "syntax error");
                Ok(false)
            }
            RepairDiagnosis::Indentation { file: Some(file) } => {
                let file = path.join(file);
                let outcome = self
                    .tools
                    .invoke(&Action::new("read", json!({ "path": path_text(&file) })));
                if !outcome.success {
                    return Ok(false);
                }
                let Some(fixed) = repair_rules::expand_tabs(&outcome.output) else {
                    return Ok(false);
                };
                self.write(&file, &fixed)?;
                info!(rule = diagnosis.rule(), file = %file.display(), "fixed indentation");
                Ok(true)
            }
            _ => {
                info!(rule = diagnosis.rule(), "no automatic fix");
                Ok(false)
            }
        }
    }

    fn commit(&self, goal: &Goal, path: &Path) -> StageReport {
        info!(stage = "commit", "committing");
        let outcome = self.tools.invoke(&Action::new(
            "git_commit",
            json!({ "path": path_text(path), "message": format!("feat: {}", goal.description) }),
        ));
        StageReport::ok(
            StageName::Commit,
            truncate_chars(&outcome.output, COMMIT_DETAIL_CHARS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_embeds_description() {
        let main = placeholder_main("adds numbers");
        assert!(main.starts_with("#!/usr/bin/env python3\n\"\"\"adds numbers\"\"\""));
        assert!(main.contains("print(\"adds numbers\")"));
    }
}
