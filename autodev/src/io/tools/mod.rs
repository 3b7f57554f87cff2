//! Name-indexed tool registry.
//!
//! Tools are trait objects registered once at startup. [`ToolRegistry::invoke`]
//! is the only way the interpreter, pipeline and agent reach the outside
//! world: it applies the safety checks before dispatch and turns every error
//! into a failed [`ToolOutcome`], so nothing propagates to the caller.

mod fs;
mod net;
mod shell;
mod vcs;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::safety::{PathAccess, is_safe_command, is_safe_path_with};
use crate::core::text::truncate_chars;
use crate::core::types::{Action, ToolArgs};
use crate::io::config::{AgentConfig, TimeoutConfig};
use crate::io::network::NetworkGate;
use crate::io::process::CommandOutput;

const LOG_RESULT_CHARS: usize = 300;

/// What a tool may do; decides which safety checks apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Read,
    Write,
    Exec,
    Net,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Exec => "exec",
            Capability::Net => "net",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    UnknownTool,
    Blocked,
    InvalidArgs,
    Failed,
    TimedOut,
}

/// Result of one tool invocation. Failed outputs start with `ERROR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub success: bool,
    pub kind: Option<ToolErrorKind>,
    pub output: String,
}

impl ToolOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            kind: None,
            output: output.into(),
        }
    }

    pub fn error(kind: ToolErrorKind, message: impl fmt::Display) -> Self {
        Self {
            success: false,
            kind: Some(kind),
            output: format!("ERROR: {message}"),
        }
    }

    /// Map a finished process onto the tool text convention.
    pub fn from_command(output: &CommandOutput) -> Self {
        let kind = if output.timed_out {
            Some(ToolErrorKind::TimedOut)
        } else if !output.status.success() {
            Some(ToolErrorKind::Failed)
        } else {
            None
        };
        Self {
            success: kind.is_none(),
            kind,
            output: output.to_tool_text(),
        }
    }
}

/// Argument problem reported by a tool. The registry maps it to
/// [`ToolErrorKind::InvalidArgs`].
#[derive(Debug)]
pub struct InvalidArgs(pub String);

impl fmt::Display for InvalidArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvalidArgs {}

/// Required string argument.
pub fn str_arg<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(InvalidArgs(format!("argument `{key}` must be a string")).into()),
        None => Err(InvalidArgs(format!("missing argument `{key}`")).into()),
    }
}

/// Optional string argument; empty strings count as absent.
pub fn opt_str_arg<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub fn bool_arg(args: &ToolArgs, key: &str) -> bool {
    match args.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

/// Optional non-negative integer, given as a number or a numeric string.
pub fn u64_arg(args: &ToolArgs, key: &str) -> Result<Option<u64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| InvalidArgs(format!("argument `{key}` must be a non-negative integer")).into()),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| InvalidArgs(format!("argument `{key}` must be an integer")).into()),
        Some(_) => Err(InvalidArgs(format!("argument `{key}` must be an integer")).into()),
    }
}

/// Shared limits handed to every tool.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub timeouts: TimeoutConfig,
    pub output_limit_bytes: usize,
    pub network: NetworkGate,
}

impl ToolContext {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            timeouts: config.timeouts.clone(),
            output_limit_bytes: config.output_limit_bytes,
            network: NetworkGate::new(config.timeouts.network(), config.output_limit_bytes),
        }
    }
}

pub trait Tool {
    fn name(&self) -> &'static str;

    fn capability(&self) -> Capability;

    /// Paths this call would modify, checked against the protected list before dispatch.
    fn guarded_paths<'a>(&self, _args: &'a ToolArgs) -> Vec<(&'a str, PathAccess)> {
        Vec::new()
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome>;
}

/// Registry of tools by name.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Box<dyn Tool>>,
    ctx: ToolContext,
    protected: Vec<String>,
}

impl ToolRegistry {
    /// Empty registry. `protected` extends the built-in protected path prefixes.
    pub fn new(ctx: ToolContext, protected: Vec<String>) -> Self {
        Self {
            tools: BTreeMap::new(),
            ctx,
            protected,
        }
    }

    /// Registry with every built-in tool. The memory directory is protected.
    pub fn with_builtin_tools(config: &AgentConfig) -> Self {
        let mut protected = config.protected_paths.clone();
        protected.push(path_prefix(&config.memory_dir));
        if let Ok(abs) = std::path::absolute(&config.memory_dir) {
            protected.push(path_prefix(&abs));
        }
        let mut registry = Self::new(ToolContext::from_config(config), protected);
        for tool in builtin_tools() {
            registry.register(tool);
        }
        registry
    }

    /// Add or replace a tool.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Safety-check and run one action. Never fails; problems become outcomes.
    pub fn invoke(&self, action: &Action) -> ToolOutcome {
        let Some(tool) = self.tools.get(action.tool.as_str()) else {
            warn!(tool = %action.tool, "unknown tool");
            return ToolOutcome::error(
                ToolErrorKind::UnknownTool,
                format!("Unknown tool: {}", action.tool),
            );
        };
        if let Some(blocked) = self.check(tool.as_ref(), &action.args) {
            return blocked;
        }

        info!(tool = %action.tool, capability = tool.capability().as_str(), "invoking tool");
        let outcome = match tool.invoke(&action.args, &self.ctx) {
            Ok(outcome) => outcome,
            Err(err) if err.is::<InvalidArgs>() => {
                ToolOutcome::error(ToolErrorKind::InvalidArgs, format!("{err}"))
            }
            Err(err) => ToolOutcome::error(ToolErrorKind::Failed, format!("{err:#}")),
        };
        debug!(
            tool = %action.tool,
            success = outcome.success,
            output = %truncate_chars(&outcome.output, LOG_RESULT_CHARS),
            "tool finished"
        );
        outcome
    }

    fn check(&self, tool: &dyn Tool, args: &ToolArgs) -> Option<ToolOutcome> {
        let command = args.get("command").and_then(Value::as_str);
        if command.is_some_and(|cmd| !is_safe_command(cmd)) {
            return Some(ToolOutcome::error(
                ToolErrorKind::Blocked,
                "Command blocked by safety filter.",
            ));
        }
        for (path, access) in tool.guarded_paths(args) {
            if !self.is_allowed(path, access) {
                return Some(ToolOutcome::error(
                    ToolErrorKind::Blocked,
                    format!("Cannot modify protected path: {path}"),
                ));
            }
        }
        None
    }

    fn is_allowed(&self, path: &str, access: PathAccess) -> bool {
        if !is_safe_path_with(path, access, &self.protected) {
            return false;
        }
        match std::path::absolute(path) {
            Ok(abs) => is_safe_path_with(&path_prefix(&abs), access, &self.protected),
            Err(_) => true,
        }
    }
}

/// Path rendered with a trailing separator, so `dir/` also covers `dir` itself.
fn path_prefix(path: &Path) -> String {
    let text = path.to_string_lossy();
    if text.ends_with('/') {
        text.into_owned()
    } else {
        format!("{text}/")
    }
}

fn builtin_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(shell::RunTool),
        Box::new(fs::WriteTool),
        Box::new(fs::ReadTool),
        Box::new(fs::AppendTool),
        Box::new(fs::DeleteTool),
        Box::new(fs::ListTool),
        Box::new(fs::FindTool),
        Box::new(fs::ExistsTool),
        Box::new(fs::MkdirTool),
        Box::new(fs::CopyTool),
        Box::new(fs::MoveTool),
        Box::new(vcs::GitInitTool),
        Box::new(vcs::GitCommitTool),
        Box::new(vcs::GitStatusTool),
        Box::new(vcs::GitLogTool),
        Box::new(vcs::GitDiffTool),
        Box::new(shell::PsTool),
        Box::new(shell::KillTool),
        Box::new(shell::SysinfoTool),
        Box::new(shell::DetectTypeTool),
        Box::new(shell::TestTool),
        Box::new(net::PipInstallTool),
        Box::new(net::GitCloneTool),
    ]
}
