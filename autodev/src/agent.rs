//! The agent loop: operator commands, self-directed goals and the memory
//! bookkeeping around both.

use std::fmt;
use std::io::{BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::core::goal_select::{GoalLedger, select_goal};
use crate::core::safety::sanitize_input;
use crate::core::text::truncate_chars;
use crate::core::types::{Action, ActionPlan, Goal, IntentTag, PipelineReport};
use crate::interpreter::CommandInterpreter;
use crate::io::backend::{CommandBackend, GenerationBackend, NoBackend};
use crate::io::config::AgentConfig;
use crate::io::git::Git;
use crate::io::memory::{MemoryStore, ProjectUpdate};
use crate::io::templates::catalog;
use crate::io::tools::{ToolErrorKind, ToolOutcome, ToolRegistry};
use crate::pipeline::ExecutionPipeline;

/// Environment variable that selects the mode when no CLI flag is given.
pub const MODE_ENV: &str = "AUTODEV_MODE";
/// Project name used by generation requests that carry none.
pub const DEFAULT_GENERATED_NAME: &str = "generated";
const RESULT_LOG_CHARS: usize = 300;
const STAGE_LOG_CHARS: usize = 100;
const EOF_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Execute operator commands only.
    Operator,
    /// Pick and build goals without input.
    Autonomous,
    /// Operator commands when they arrive, goals while idle.
    Hybrid,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Operator => "operator",
            Mode::Autonomous => "autonomous",
            Mode::Hybrid => "hybrid",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "operator" => Some(Mode::Operator),
            "autonomous" => Some(Mode::Autonomous),
            "hybrid" => Some(Mode::Hybrid),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode from an env value, else hybrid on a terminal, else autonomous.
pub fn resolve_mode(env_value: Option<&str>, stdin_is_terminal: bool) -> Mode {
    if let Some(mode) = env_value.and_then(Mode::parse) {
        return mode;
    }
    if stdin_is_terminal {
        Mode::Hybrid
    } else {
        Mode::Autonomous
    }
}

pub fn detect_mode() -> Mode {
    let env_value = std::env::var(MODE_ENV).ok();
    resolve_mode(env_value.as_deref(), std::io::stdin().is_terminal())
}

/// Forward stdin lines to a channel from a background thread.
pub fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(err = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

pub struct Agent {
    config: AgentConfig,
    memory: MemoryStore,
    interpreter: CommandInterpreter,
    tools: ToolRegistry,
    backend: Box<dyn GenerationBackend>,
    ledger: GoalLedger,
    current_goal: Option<Goal>,
    rng: StdRng,
}

impl Agent {
    /// Agent with the backend named in `config`, if any.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let backend: Box<dyn GenerationBackend> = match CommandBackend::from_config(&config) {
            Some(backend) => Box::new(backend),
            None => Box::new(NoBackend),
        };
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: AgentConfig, backend: Box<dyn GenerationBackend>) -> Result<Self> {
        std::fs::create_dir_all(&config.project_root).with_context(|| {
            format!("create project root {}", config.project_root.display())
        })?;
        let memory = MemoryStore::open(&config.memory_dir)?;
        let ledger = seed_ledger(&memory);
        if backend.is_available() {
            info!("generation backend configured");
        } else {
            info!("no generation backend, using templates");
        }
        Ok(Self {
            interpreter: CommandInterpreter::new(&config.project_root),
            tools: ToolRegistry::with_builtin_tools(&config),
            config,
            memory,
            backend,
            ledger,
            current_goal: None,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn ledger(&self) -> &GoalLedger {
        &self.ledger
    }

    pub fn interpreter(&self) -> &CommandInterpreter {
        &self.interpreter
    }

    fn project_path(&self, name: &str) -> PathBuf {
        self.config.project_root.join(name)
    }

    fn pipeline(&self) -> ExecutionPipeline<'_> {
        ExecutionPipeline::new(&self.tools, self.backend.as_ref())
    }

    /// Interpret and run one operator command. Returns one outcome per action.
    pub fn execute_operator_command(&mut self, text: &str) -> Result<Vec<ToolOutcome>> {
        let command = sanitize_input(text);
        let command = command.trim();
        if command.is_empty() {
            return Ok(Vec::new());
        }
        info!(input = %command, "operator command");
        self.memory.record_action("operator_input", command, true)?;

        let Some(plan) = self.interpreter.parse(command) else {
            warn!("no actionable plan");
            return Ok(Vec::new());
        };
        info!(intent = %plan.intent, actions = plan.actions.len(), "plan");
        if let Some(note) = &plan.error {
            warn!(note = %note, "plan note");
        }

        let mut outcomes = Vec::with_capacity(plan.actions.len());
        for action in &plan.actions {
            outcomes.push(self.invoke_recorded(action)?);
        }

        // Free text that failed as a shell command goes to the backend for tool calls.
        let shell_failed = plan.intent == IntentTag::Shell
            && outcomes
                .iter()
                .any(|o| o.kind == Some(ToolErrorKind::Failed));
        if shell_failed && self.backend.is_available() {
            let actions = self.backend.tool_calls(command);
            info!(actions = actions.len(), "backend tool calls");
            for action in &actions {
                outcomes.push(self.invoke_recorded(action)?);
            }
        }

        if plan.requires_generation {
            self.handle_generation(&plan)?;
        }
        Ok(outcomes)
    }

    fn invoke_recorded(&mut self, action: &Action) -> Result<ToolOutcome> {
        let outcome = self.tools.invoke(action);
        if outcome.success {
            info!(tool = %action.tool, result = %truncate_chars(&outcome.output, RESULT_LOG_CHARS), "result");
        } else {
            warn!(tool = %action.tool, result = %truncate_chars(&outcome.output, RESULT_LOG_CHARS), "tool failed");
        }
        self.memory.record_action(
            &format!("tool:{}", action.tool),
            Value::Object(action.args.clone()),
            outcome.success,
        )?;
        Ok(outcome)
    }

    fn handle_generation(&mut self, plan: &ActionPlan) -> Result<()> {
        let description = plan
            .description
            .clone()
            .or_else(|| plan.feature.clone())
            .unwrap_or_else(|| plan.intent.to_string());

        if plan.intent == IntentTag::Fix {
            return self.fix_project(plan.path.as_deref(), &description);
        }

        let name = plan
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_GENERATED_NAME.to_string());
        let path = plan
            .path
            .as_ref()
            .map_or_else(|| self.project_path(&name), PathBuf::from);

        if self.backend.is_available() {
            self.run_goal(Goal::bare(&name, &description), &path)?;
        } else if let Some(template) = catalog().find_by_keyword(&description) {
            info!(template = %template.name, name = %name, "using template");
            let mut goal = template.clone();
            goal.name = name;
            self.run_goal(goal, &path)?;
        } else {
            info!(description = %description, "no template, creating skeleton");
            self.create_skeleton(&name, &path, &description)?;
        }
        Ok(())
    }

    fn fix_project(&mut self, path: Option<&str>, description: &str) -> Result<()> {
        let Some(path) = path.map(Path::new).filter(|p| p.is_dir()) else {
            warn!("no project to fix");
            self.memory.record_action("fix", description, false)?;
            return Ok(());
        };
        let name = project_name(path);
        let goal = Goal::bare(&name, description);
        let report = self.pipeline().repair_existing(&goal, path);
        log_report(&report);
        self.memory.record_action(
            "fix",
            json!({ "project": name, "stages": report.stages.len() }),
            report.success,
        )?;
        self.memory.update_project(
            &name,
            ProjectUpdate {
                test_pass: Some(report.success),
                ..ProjectUpdate::default()
            },
        )
    }

    /// Run the active goal, or pick a new one. A goal whose cycle errored
    /// before its outcome was recorded stays active and is retried next cycle.
    pub fn autonomous_cycle(&mut self) -> Result<PipelineReport> {
        let goal = match &self.current_goal {
            Some(goal) => {
                info!(goal = %goal.description, "resuming goal");
                goal.clone()
            }
            None => {
                let goals = catalog();
                let goal = select_goal(&goals.basic, &goals.advanced, &mut self.ledger, &mut self.rng)
                    .ok_or_else(|| anyhow!("goal catalog is empty"))?;
                info!(goal = %goal.description, "new goal");
                self.current_goal = Some(goal.clone());
                goal
            }
        };
        let path = self.project_path(&goal.name);
        let report = self.run_goal(goal, &path)?;
        self.current_goal = None;
        Ok(report)
    }

    /// Goal picked by an autonomous cycle that has not finished yet.
    pub fn current_goal(&self) -> Option<&Goal> {
        self.current_goal.as_ref()
    }

    fn run_goal(&mut self, mut goal: Goal, path: &Path) -> Result<PipelineReport> {
        let path_str = path.to_string_lossy().into_owned();
        if !path.exists() {
            self.memory
                .register_project(&goal.name, &path_str, &goal.description)?;
        }

        let report = self.pipeline().execute_goal(&mut goal, path);
        log_report(&report);

        let approach = goal.file_names();
        if report.success {
            info!(goal = %goal.name, "complete");
            self.ledger.mark_completed(&goal.name);
            self.memory.record_success(&goal.description, approach)?;
        } else {
            warn!(goal = %goal.name, "failed");
            self.ledger.mark_failed(&goal.name);
            self.memory
                .record_failure(&goal.description, approach, "Pipeline failed")?;
        }
        let commit_count = Git::new(path, self.config.timeouts.command())
            .commit_count()
            .ok();
        self.memory.update_project(
            &goal.name,
            ProjectUpdate {
                path: Some(path_str),
                commit_count,
                test_pass: Some(report.success),
                ..ProjectUpdate::default()
            },
        )?;
        Ok(report)
    }

    fn create_skeleton(&mut self, name: &str, path: &Path, description: &str) -> Result<()> {
        let dir = path.to_string_lossy().into_owned();
        let actions = [
            Action::new("mkdir", json!({ "path": dir })),
            Action::new("git_init", json!({ "path": dir })),
            Action::new(
                "write",
                json!({
                    "path": format!("{dir}/main.py"),
                    "content": format!(
                        "#!/usr/bin/env python3\n\"\"\"{description}\"\"\"\n\ndef main():\n    pass\n\nif __name__ == \"__main__\":\n    main()\n"
                    ),
                }),
            ),
            Action::new(
                "write",
                json!({
                    "path": format!("{dir}/README.md"),
                    "content": format!("# {name}\n\n{description}\n"),
                }),
            ),
            Action::new(
                "git_commit",
                json!({ "path": dir, "message": format!("init: {name} skeleton") }),
            ),
        ];
        for action in &actions {
            let outcome = self.tools.invoke(action);
            if !outcome.success {
                warn!(tool = %action.tool, result = %truncate_chars(&outcome.output, RESULT_LOG_CHARS), "skeleton step failed");
            }
        }
        self.memory.register_project(name, &dir, description)
    }

    fn run_cycle(&mut self, mode: Mode, input: &Receiver<String>) -> Result<()> {
        match mode {
            Mode::Operator => match input.recv_timeout(self.config.idle_timeout()) {
                Ok(line) => {
                    self.execute_operator_command(&line)?;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(EOF_WAIT),
            },
            Mode::Hybrid => match input.recv_timeout(self.config.idle_timeout()) {
                Ok(line) => {
                    self.execute_operator_command(&line)?;
                }
                Err(_) => {
                    self.autonomous_cycle()?;
                    thread::sleep(self.config.cycle_pause());
                }
            },
            Mode::Autonomous => {
                self.autonomous_cycle()?;
                thread::sleep(self.config.cycle_pause());
            }
        }
        Ok(())
    }

    /// Run cycles until `stop` is set. Cycle errors are recorded and retried.
    pub fn run_loop(&mut self, mode: Mode, stop: &AtomicBool, input: &Receiver<String>) {
        info!(mode = %mode, "starting agent loop");
        info!("memory context:\n{}", self.memory.context_summary());
        while !stop.load(Ordering::SeqCst) {
            if let Err(err) = self.run_cycle(mode, input) {
                error!(err = %format!("{err:#}"), "cycle error");
                if let Err(record_err) =
                    self.memory
                        .record_action("cycle_error", format!("{err:#}"), false)
                {
                    warn!(err = %format!("{record_err:#}"), "could not record cycle error");
                }
                thread::sleep(self.config.cycle_backoff());
            }
        }
        info!("shutdown signal received");
    }
}

/// Mark catalog goals that earlier runs already finished or failed.
fn seed_ledger(memory: &MemoryStore) -> GoalLedger {
    let mut ledger = GoalLedger::default();
    let goals = catalog();
    let patterns = memory.patterns();
    for record in &patterns.failed_patterns {
        if let Some(goal) = goals.by_description(&record.goal) {
            ledger.mark_failed(&goal.name);
        }
    }
    for record in &patterns.successful_patterns {
        if let Some(goal) = goals.by_description(&record.goal) {
            ledger.mark_completed(&goal.name);
        }
    }
    ledger
}

fn project_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_GENERATED_NAME.to_string())
}

fn log_report(report: &PipelineReport) {
    for stage in &report.stages {
        info!(
            "[{}] {}: {}",
            stage.status.as_str().to_uppercase(),
            stage.name.as_str(),
            truncate_chars(&stage.detail, STAGE_LOG_CHARS)
        );
    }
}
