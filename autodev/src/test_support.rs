//! Test-only helpers: an isolated workspace, goal builders and a scripted
//! generation backend.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::types::{Action, Goal};
use crate::io::backend::{GenerationBackend, ProjectPlan};
use crate::io::config::{AgentConfig, TimeoutConfig};
use crate::io::tools::ToolRegistry;

/// Temp directory with a project root and a memory directory inside it.
pub struct TestWorkspace {
    pub temp: TempDir,
    pub config: AgentConfig,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = AgentConfig {
            project_root: temp.path().join("projects"),
            memory_dir: temp.path().join("memory"),
            idle_timeout_secs: 0,
            cycle_backoff_secs: 0,
            cycle_pause_secs: 0,
            timeouts: TimeoutConfig {
                command_secs: 20,
                verify_secs: 20,
                repair_secs: 20,
                test_tool_secs: 30,
                network_secs: 5,
            },
            ..AgentConfig::default()
        };
        std::fs::create_dir_all(&config.project_root).expect("create project root");
        Self { temp, config }
    }

    pub fn project_root(&self) -> &Path {
        &self.config.project_root
    }

    pub fn project(&self, name: &str) -> PathBuf {
        self.config.project_root.join(name)
    }

    pub fn registry(&self) -> ToolRegistry {
        ToolRegistry::with_builtin_tools(&self.config)
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Goal with literal files and a test command.
pub fn literal_goal(name: &str, files: &[(&str, &str)], test_cmd: Option<&str>) -> Goal {
    Goal {
        name: name.to_string(),
        description: format!("{name} goal"),
        files: files
            .iter()
            .map(|(file, content)| (file.to_string(), content.to_string()))
            .collect(),
        test_cmd: test_cmd.map(str::to_string),
        keywords: Vec::new(),
    }
}

/// Backend that answers from fixed scripts and records what it was asked.
#[derive(Default)]
pub struct ScriptedBackend {
    pub plan: Option<ProjectPlan>,
    /// Code per filename; missing names get `default_code`.
    pub code: BTreeMap<String, String>,
    pub default_code: Option<String>,
    /// Fixes handed out in order, one per `fix` call.
    pub fixes: RefCell<VecDeque<String>>,
    pub tool_calls: Vec<Action>,
    pub calls: RefCell<Vec<String>>,
}

impl ScriptedBackend {
    pub fn with_plan(files: &[(&str, &str)], test_cmd: Option<&str>) -> Self {
        Self {
            plan: Some(ProjectPlan {
                files: files
                    .iter()
                    .map(|(file, purpose)| (file.to_string(), purpose.to_string()))
                    .collect(),
                test_cmd: test_cmd.map(str::to_string),
            }),
            ..Self::default()
        }
    }

    pub fn code_for(mut self, filename: &str, code: &str) -> Self {
        self.code.insert(filename.to_string(), code.to_string());
        self
    }

    pub fn fix_with(self, code: &str) -> Self {
        self.fixes.borrow_mut().push_back(code.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl GenerationBackend for ScriptedBackend {
    fn is_available(&self) -> bool {
        true
    }

    fn plan(&self, description: &str) -> Option<ProjectPlan> {
        self.record(format!("plan:{description}"));
        self.plan.clone()
    }

    fn code(&self, _description: &str, filename: &str) -> Option<String> {
        self.record(format!("code:{filename}"));
        self.code
            .get(filename)
            .cloned()
            .or_else(|| self.default_code.clone())
    }

    fn fix(&self, _code: &str, _error: &str, filename: &str) -> Option<String> {
        self.record(format!("fix:{filename}"));
        self.fixes.borrow_mut().pop_front()
    }

    fn tool_calls(&self, task: &str) -> Vec<Action> {
        self.record(format!("tool_calls:{task}"));
        self.tool_calls.clone()
    }
}
