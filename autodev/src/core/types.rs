//! Shared deterministic types for the agent core.
//!
//! These types are the contracts between the interpreter, the tool registry,
//! the pipeline and the memory store. They carry no I/O.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat argument mapping passed to a tool.
pub type ToolArgs = Map<String, Value>;

/// One tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub tool: String,
    #[serde(default)]
    pub args: ToolArgs,
}

impl Action {
    /// Build an action from a JSON object literal; non-object values yield empty args.
    pub fn new(tool: &str, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            tool: tool.to_string(),
            args,
        }
    }
}

/// Tag identifying what an action plan was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTag {
    ToolCall,
    CreateProject,
    CreateApi,
    CreateTool,
    AddFeature,
    RunTests,
    Build,
    Dockerize,
    GitCommit,
    GitStatus,
    GitLog,
    GitOp,
    List,
    ReadFile,
    Fix,
    Shell,
}

impl IntentTag {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentTag::ToolCall => "tool_call",
            IntentTag::CreateProject => "create_project",
            IntentTag::CreateApi => "create_api",
            IntentTag::CreateTool => "create_tool",
            IntentTag::AddFeature => "add_feature",
            IntentTag::RunTests => "run_tests",
            IntentTag::Build => "build",
            IntentTag::Dockerize => "dockerize",
            IntentTag::GitCommit => "git_commit",
            IntentTag::GitStatus => "git_status",
            IntentTag::GitLog => "git_log",
            IntentTag::GitOp => "git_op",
            IntentTag::List => "list",
            IntentTag::ReadFile => "read_file",
            IntentTag::Fix => "fix",
            IntentTag::Shell => "shell",
        }
    }
}

impl fmt::Display for IntentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of interpreting one input. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub intent: IntentTag,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub requires_generation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionPlan {
    pub fn new(intent: IntentTag, actions: Vec<Action>) -> Self {
        Self {
            intent,
            actions,
            requires_generation: false,
            name: None,
            path: None,
            description: None,
            feature: None,
            error: None,
        }
    }
}

/// A unit of work: a project to build, optionally with literal file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cmd: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Goal {
    /// Goal with no literal files; code generation decides what gets written.
    pub fn bare(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            files: BTreeMap::new(),
            test_cmd: None,
            keywords: Vec::new(),
        }
    }

    /// File names this goal writes, used as the "approach" in the pattern archive.
    pub fn file_names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Setup,
    Codegen,
    Verify,
    Repair,
    Commit,
    Error,
}

impl StageName {
    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Setup => "setup",
            StageName::Codegen => "codegen",
            StageName::Verify => "verify",
            StageName::Repair => "repair",
            StageName::Commit => "commit",
            StageName::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Ok,
    Fail,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Ok => "ok",
            StageStatus::Fail => "fail",
        }
    }
}

/// Outcome of one pipeline phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub name: StageName,
    pub status: StageStatus,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl StageReport {
    pub fn ok(name: StageName, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: StageStatus::Ok,
            detail: detail.into(),
            command: None,
        }
    }

    pub fn fail(name: StageName, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: StageStatus::Fail,
            detail: detail.into(),
            command: None,
        }
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.command = Some(command.to_string());
        self
    }
}

/// Ordered stage outcomes for one goal execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub goal: String,
    pub path: String,
    pub stages: Vec<StageReport>,
    pub success: bool,
    /// Number of repair checks that ran (0 when verify passed).
    pub repair_attempts: u32,
}

impl PipelineReport {
    pub fn new(goal: &str, path: &str) -> Self {
        Self {
            goal: goal.to_string(),
            path: path.to_string(),
            stages: Vec::new(),
            success: false,
            repair_attempts: 0,
        }
    }

    pub fn push(&mut self, stage: StageReport) {
        self.stages.push(stage);
    }

    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.name).collect()
    }
}
