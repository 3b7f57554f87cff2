//! Operator command interpreter.
//!
//! Turns one line of operator text into an [`ActionPlan`]: either a direct
//! `TOOL:` call, a plan built from the matched [`Intent`], or a raw shell
//! command when nothing matches. The only file system access is the lookup
//! of the most recently modified project.

use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, warn};

use crate::core::intent::{self, Intent, sanitize_name};
use crate::core::protocol::parse_tool_call;
use crate::core::types::{Action, ActionPlan, IntentTag};
use crate::io::projects::latest_project_dir;
use crate::io::templates::{API_SERVER_PY, API_SERVER_TEST_PY};

/// Name used when a create-project command carries no usable name.
pub const DEFAULT_PROJECT_NAME: &str = "new_project";
/// Fixed project created by the API intent.
pub const API_PROJECT_NAME: &str = "api_server";
pub const CHECKPOINT_MESSAGE: &str = "auto: checkpoint commit";
pub const BUILD_COMMAND: &str =
    "python3 -m py_compile *.py 2>&1 || make 2>&1 || echo 'No build system detected'";

#[derive(Debug, Clone)]
pub struct CommandInterpreter {
    project_root: PathBuf,
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl CommandInterpreter {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Interpret `text`. `None` for empty input or a malformed `TOOL:` call.
    pub fn parse(&self, text: &str) -> Option<ActionPlan> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if text.starts_with("TOOL:") {
            let Some(action) = parse_tool_call(text) else {
                warn!("malformed TOOL command");
                return None;
            };
            return Some(ActionPlan::new(IntentTag::ToolCall, vec![action]));
        }

        let plan = match intent::classify(text) {
            Some(intent) => self.build_plan(intent, text),
            None => shell_plan(IntentTag::Shell, text),
        };
        debug!(intent = %plan.intent, actions = plan.actions.len(), "parsed command");
        Some(plan)
    }

    fn build_plan(&self, intent: Intent, text: &str) -> ActionPlan {
        match intent {
            Intent::CreateProject { name } => {
                let name = name.map_or_else(|| DEFAULT_PROJECT_NAME.to_string(), |n| sanitize_name(&n));
                self.plan_create_project(&name)
            }
            Intent::CreateApi => self.plan_create_api(),
            Intent::CreateTool { description } => self.plan_create_tool(&description),
            Intent::AddFeature { feature } => {
                let mut plan = ActionPlan::new(IntentTag::AddFeature, Vec::new());
                plan.requires_generation = true;
                plan.feature = Some(feature);
                plan
            }
            Intent::RunTests => self.plan_run_tests(),
            Intent::Build => self.plan_build(),
            Intent::Dockerize => self.plan_dockerize(),
            Intent::GitOp => self.plan_git_op(text),
            Intent::List { target } => {
                let path = target.unwrap_or_else(|| path_text(&self.project_root));
                ActionPlan::new(IntentTag::List, vec![Action::new("ls", json!({ "path": path }))])
            }
            Intent::ReadFile { path } => {
                ActionPlan::new(IntentTag::ReadFile, vec![Action::new("read", json!({ "path": path }))])
            }
            Intent::Fix { description } => {
                let mut plan = ActionPlan::new(IntentTag::Fix, Vec::new());
                plan.requires_generation = true;
                plan.description = Some(description);
                plan.path = self.latest_project().map(|p| path_text(&p));
                plan
            }
            Intent::Shell => shell_plan(IntentTag::Shell, text),
        }
    }

    fn latest_project(&self) -> Option<PathBuf> {
        latest_project_dir(&self.project_root)
    }

    fn plan_create_project(&self, name: &str) -> ActionPlan {
        let path = path_text(&self.project_root.join(name));
        let actions = vec![
            Action::new("mkdir", json!({ "path": path })),
            Action::new("git_init", json!({ "path": path })),
            Action::new(
                "write",
                json!({
                    "path": format!("{path}/README.md"),
                    "content": format!("# {name}\n\nAuto-generated project.\n"),
                }),
            ),
            Action::new(
                "git_commit",
                json!({ "path": path, "message": format!("init: {name}") }),
            ),
        ];
        let mut plan = ActionPlan::new(IntentTag::CreateProject, actions);
        plan.name = Some(name.to_string());
        plan.path = Some(path);
        plan
    }

    fn plan_create_api(&self) -> ActionPlan {
        let path = path_text(&self.project_root.join(API_PROJECT_NAME));
        let actions = vec![
            Action::new("mkdir", json!({ "path": path })),
            Action::new("git_init", json!({ "path": path })),
            Action::new(
                "write",
                json!({ "path": format!("{path}/server.py"), "content": API_SERVER_PY }),
            ),
            Action::new(
                "write",
                json!({ "path": format!("{path}/test_server.py"), "content": API_SERVER_TEST_PY }),
            ),
            Action::new("test", json!({ "path": path })),
            Action::new(
                "git_commit",
                json!({ "path": path, "message": "feat: REST API server with CRUD and tests" }),
            ),
        ];
        let mut plan = ActionPlan::new(IntentTag::CreateApi, actions);
        plan.name = Some(API_PROJECT_NAME.to_string());
        plan.path = Some(path);
        plan
    }

    fn plan_create_tool(&self, description: &str) -> ActionPlan {
        let name = sanitize_name(description);
        let path = path_text(&self.project_root.join(&name));
        let actions = vec![
            Action::new("mkdir", json!({ "path": path })),
            Action::new("git_init", json!({ "path": path })),
        ];
        let mut plan = ActionPlan::new(IntentTag::CreateTool, actions);
        plan.requires_generation = true;
        plan.name = Some(name);
        plan.path = Some(path);
        plan.description = Some(description.to_string());
        plan
    }

    fn plan_run_tests(&self) -> ActionPlan {
        match self.latest_project() {
            Some(latest) => {
                let path = path_text(&latest);
                let mut plan = ActionPlan::new(
                    IntentTag::RunTests,
                    vec![Action::new("test", json!({ "path": path }))],
                );
                plan.path = Some(path);
                plan
            }
            None => {
                let mut plan = ActionPlan::new(
                    IntentTag::RunTests,
                    vec![Action::new("ls", json!({ "path": path_text(&self.project_root) }))],
                );
                plan.error = Some("No projects found".to_string());
                plan
            }
        }
    }

    fn plan_build(&self) -> ActionPlan {
        let Some(latest) = self.latest_project() else {
            return error_plan(IntentTag::Build, "No project found");
        };
        let path = path_text(&latest);
        let mut plan = ActionPlan::new(
            IntentTag::Build,
            vec![Action::new("run", json!({ "command": BUILD_COMMAND, "cwd": path }))],
        );
        plan.path = Some(path);
        plan
    }

    fn plan_dockerize(&self) -> ActionPlan {
        let Some(latest) = self.latest_project() else {
            return error_plan(IntentTag::Dockerize, "No project found");
        };
        let name = latest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = path_text(&latest);
        let actions = vec![
            Action::new(
                "write",
                json!({ "path": format!("{path}/Dockerfile"), "content": dockerfile() }),
            ),
            Action::new(
                "write",
                json!({ "path": format!("{path}/docker-compose.yml"), "content": compose_file(&name) }),
            ),
            Action::new(
                "git_commit",
                json!({ "path": path, "message": "feat: add Docker support" }),
            ),
        ];
        let mut plan = ActionPlan::new(IntentTag::Dockerize, actions);
        plan.path = Some(path);
        plan
    }

    fn plan_git_op(&self, text: &str) -> ActionPlan {
        let path = self
            .latest_project()
            .map_or_else(|| path_text(&self.project_root), |p| path_text(&p));
        let lower = text.to_lowercase();
        if lower.contains("commit") || lower.contains("kaydet") {
            ActionPlan::new(
                IntentTag::GitCommit,
                vec![Action::new(
                    "git_commit",
                    json!({ "path": path, "message": CHECKPOINT_MESSAGE }),
                )],
            )
        } else if lower.contains("status") {
            ActionPlan::new(
                IntentTag::GitStatus,
                vec![Action::new("git_status", json!({ "path": path }))],
            )
        } else if lower.contains("log") {
            ActionPlan::new(
                IntentTag::GitLog,
                vec![Action::new("git_log", json!({ "path": path }))],
            )
        } else {
            shell_plan(IntentTag::GitOp, text)
        }
    }
}

fn shell_plan(intent: IntentTag, text: &str) -> ActionPlan {
    ActionPlan::new(intent, vec![Action::new("run", json!({ "command": text }))])
}

fn error_plan(intent: IntentTag, error: &str) -> ActionPlan {
    let mut plan = ActionPlan::new(intent, Vec::new());
    plan.error = Some(error.to_string());
    plan
}

fn dockerfile() -> &'static str {
    "FROM python:3.12-alpine\n\
     WORKDIR /app\n\
     COPY . .\n\
     RUN pip install --no-cache-dir -r requirements.txt 2>/dev/null || true\n\
     EXPOSE 8080\n\
     CMD [\"python3\", \"main.py\"]\n"
}

fn compose_file(name: &str) -> String {
    format!(
        "version: '3.8'\nservices:\n  {name}:\n    build: .\n    ports:\n      - \"8080:8080\"\n    restart: unless-stopped\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter() -> (tempfile::TempDir, CommandInterpreter) {
        let temp = tempfile::tempdir().expect("tempdir");
        let interp = CommandInterpreter::new(temp.path());
        (temp, interp)
    }

    fn tools(plan: &ActionPlan) -> Vec<&str> {
        plan.actions.iter().map(|a| a.tool.as_str()).collect()
    }

    #[test]
    fn empty_input_has_no_plan() {
        let (_temp, interp) = interpreter();
        assert!(interp.parse("   \n").is_none());
    }

    #[test]
    fn malformed_tool_call_has_no_plan() {
        let (_temp, interp) = interpreter();
        assert!(interp.parse("TOOL: write ARGS: {broken").is_none());
        assert!(interp.parse("TOOL: write ARGS: \"string\"").is_none());
    }

    #[test]
    fn create_project_without_name_uses_default() {
        let (_temp, interp) = interpreter();
        let plan = interp.parse("yeni proje oluştur").expect("plan");
        assert_eq!(plan.intent, IntentTag::CreateProject);
        assert_eq!(plan.name.as_deref(), Some(DEFAULT_PROJECT_NAME));
    }

    #[test]
    fn create_tool_names_project_from_description() {
        let (temp, interp) = interpreter();
        let plan = interp.parse("write Log Parser tool").expect("plan");
        assert_eq!(plan.intent, IntentTag::CreateTool);
        assert!(plan.requires_generation);
        assert_eq!(plan.name.as_deref(), Some("log_parser"));
        assert_eq!(tools(&plan), vec!["mkdir", "git_init"]);
        assert_eq!(
            plan.path.as_deref(),
            Some(temp.path().join("log_parser").to_string_lossy().as_ref())
        );
    }

    #[test]
    fn create_api_writes_server_and_tests() {
        let (_temp, interp) = interpreter();
        let plan = interp.parse("create api").expect("plan");
        assert_eq!(plan.intent, IntentTag::CreateApi);
        assert_eq!(
            tools(&plan),
            vec!["mkdir", "git_init", "write", "write", "test", "git_commit"]
        );
        assert!(plan.actions[2].args["content"]
            .as_str()
            .is_some_and(|c| c.contains("PORT = 8080")));
    }

    #[test]
    fn run_tests_without_projects_lists_root_with_error() {
        let (_temp, interp) = interpreter();
        let plan = interp.parse("run tests").expect("plan");
        assert_eq!(plan.intent, IntentTag::RunTests);
        assert_eq!(tools(&plan), vec!["ls"]);
        assert_eq!(plan.error.as_deref(), Some("No projects found"));
    }

    #[test]
    fn build_and_dockerize_need_a_project() {
        let (temp, interp) = interpreter();
        let plan = interp.parse("build").expect("plan");
        assert!(plan.actions.is_empty());
        assert_eq!(plan.error.as_deref(), Some("No project found"));

        std::fs::create_dir(temp.path().join("demo")).expect("mkdir");
        let plan = interp.parse("dockerize").expect("plan");
        assert_eq!(plan.intent, IntentTag::Dockerize);
        assert_eq!(tools(&plan), vec!["write", "write", "git_commit"]);
        assert!(plan.actions[1].args["content"]
            .as_str()
            .is_some_and(|c| c.contains("  demo:\n")));
    }

    #[test]
    fn git_op_variants() {
        let (_temp, interp) = interpreter();
        assert_eq!(interp.parse("commit").expect("plan").intent, IntentTag::GitCommit);
        assert_eq!(interp.parse("git status").expect("plan").intent, IntentTag::GitStatus);
        assert_eq!(interp.parse("git log").expect("plan").intent, IntentTag::GitLog);
        let plan = interp.parse("git push").expect("plan");
        assert_eq!(plan.intent, IntentTag::GitOp);
        assert_eq!(plan.actions[0].args["command"], "git push");
    }

    #[test]
    fn list_defaults_to_project_root() {
        let (temp, interp) = interpreter();
        let plan = interp.parse("projects list").expect("plan");
        assert_eq!(plan.intent, IntentTag::List);
        assert_eq!(
            plan.actions[0].args["path"],
            temp.path().to_string_lossy().as_ref()
        );
    }

    #[test]
    fn fix_targets_latest_project() {
        let (temp, interp) = interpreter();
        std::fs::create_dir(temp.path().join("demo")).expect("mkdir");
        let plan = interp.parse("fix the import error").expect("plan");
        assert_eq!(plan.intent, IntentTag::Fix);
        assert!(plan.requires_generation);
        assert_eq!(plan.description.as_deref(), Some("the import error"));
        assert_eq!(
            plan.path.as_deref(),
            Some(temp.path().join("demo").to_string_lossy().as_ref())
        );
    }

    #[test]
    fn unmatched_text_becomes_shell_command() {
        let (_temp, interp) = interpreter();
        let plan = interp.parse("uptime").expect("plan");
        assert_eq!(plan.intent, IntentTag::Shell);
        assert_eq!(plan.actions[0].args["command"], "uptime");
    }
}
