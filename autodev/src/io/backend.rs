//! Optional code generation backend.
//!
//! The [`GenerationBackend`] trait decouples the pipeline from whatever
//! produces code. [`CommandBackend`] pipes a rendered prompt to an external
//! program and reads its stdout; [`NoBackend`] is used when none is
//! configured. Every call may come back empty and callers fall back to the
//! rule table or literal templates.

use std::collections::BTreeMap;
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use jsonschema::Validator;
use minijinja::{Environment, context};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::output_filter;
use crate::core::protocol::parse_tool_calls;
use crate::core::text::truncate_chars;
use crate::core::types::Action;
use crate::io::config::AgentConfig;
use crate::io::process::run_command_with_timeout;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const CODE_TEMPLATE: &str = include_str!("prompts/code.md");
const FIX_TEMPLATE: &str = include_str!("prompts/fix.md");

/// Longest source excerpt sent with a fix request.
pub const FIX_CODE_CHARS: usize = 2000;
/// Longest error excerpt sent with a fix request.
pub const FIX_ERROR_CHARS: usize = 500;

static PLAN_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("plan regex should compile"));
static CODE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:python|py)?\s*\n(.*?)```").expect("code block regex should compile")
});
static PLAN_SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    let schema = json!({
        "type": "object",
        "required": ["files"],
        "properties": {
            "files": {
                "type": "object",
                "additionalProperties": {"type": "string"}
            },
            "test_cmd": {"type": "string"}
        }
    });
    jsonschema::validator_for(&schema).expect("plan schema should be valid")
});

/// File plan returned by a backend: filename to purpose, plus a test command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectPlan {
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub test_cmd: Option<String>,
}

pub trait GenerationBackend {
    fn is_available(&self) -> bool;

    fn plan(&self, description: &str) -> Option<ProjectPlan>;

    fn code(&self, description: &str, filename: &str) -> Option<String>;

    fn fix(&self, code: &str, error: &str, filename: &str) -> Option<String>;

    fn tool_calls(&self, task: &str) -> Vec<Action>;
}

/// Backend used when nothing is configured. Always unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackend;

impl GenerationBackend for NoBackend {
    fn is_available(&self) -> bool {
        false
    }

    fn plan(&self, _description: &str) -> Option<ProjectPlan> {
        None
    }

    fn code(&self, _description: &str, _filename: &str) -> Option<String> {
        None
    }

    fn fix(&self, _code: &str, _error: &str, _filename: &str) -> Option<String> {
        None
    }

    fn tool_calls(&self, _task: &str) -> Vec<Action> {
        Vec::new()
    }
}

/// Pull the outermost `{...}` span out of `raw` and validate it as a plan.
pub fn extract_plan(raw: &str) -> Option<ProjectPlan> {
    let span = PLAN_JSON_RE.find(raw)?.as_str();
    let value: Value = match serde_json::from_str(span) {
        Ok(value) => value,
        Err(e) => {
            debug!(err = %e, "plan is not valid JSON");
            return None;
        }
    };
    if !PLAN_SCHEMA.is_valid(&value) {
        let messages: Vec<String> = PLAN_SCHEMA.iter_errors(&value).map(|e| e.to_string()).collect();
        warn!(errors = %messages.join("; "), "plan failed schema validation");
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Body of the first fenced code block, else the trimmed text.
pub fn extract_code(raw: &str) -> String {
    match CODE_BLOCK_RE.captures(raw) {
        Some(caps) => caps[1].trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("plan", PLAN_TEMPLATE)
            .expect("plan template should be valid");
        env.add_template("code", CODE_TEMPLATE)
            .expect("code template should be valid");
        env.add_template("fix", FIX_TEMPLATE)
            .expect("fix template should be valid");
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let task = self.env.get_template(name)?.render(ctx)?;
        self.frame(&task)
    }

    /// Wrap a task in the system prompt.
    fn frame(&self, task: &str) -> Result<String> {
        let full = self
            .env
            .get_template("system")?
            .render(context! { task => task.trim() })?;
        Ok(full)
    }
}

/// Runs an external program per request, prompt on stdin, answer on stdout.
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
    prompts: PromptEngine,
}

impl CommandBackend {
    /// `None` when no backend command is configured.
    pub fn from_config(config: &AgentConfig) -> Option<Self> {
        let (program, args) = config.backend.command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: Duration::from_secs(config.backend.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
            prompts: PromptEngine::new(),
        })
    }

    fn prompt(&self, template: &str, ctx: minijinja::Value) -> Option<String> {
        match self.prompts.render(template, ctx) {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                warn!(template, err = %e, "prompt render failed");
                None
            }
        }
    }

    #[instrument(skip_all, fields(program = %self.program))]
    fn generate(&self, prompt: &str) -> Option<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        let output = match run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        ) {
            Ok(output) => output,
            Err(e) => {
                warn!(err = %format!("{e:#}"), "backend launch failed");
                return None;
            }
        };
        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "backend timed out");
            return None;
        }
        if !output.status.success() {
            warn!(
                exit_code = ?output.status.code(),
                stderr = %truncate_chars(output.stderr_text().trim(), 300),
                "backend failed"
            );
            return None;
        }
        let text = output.stdout_text().trim().to_string();
        if text.is_empty() {
            return None;
        }
        info!(chars = text.chars().count(), "backend generated output");
        Some(text)
    }
}

impl GenerationBackend for CommandBackend {
    fn is_available(&self) -> bool {
        true
    }

    fn plan(&self, description: &str) -> Option<ProjectPlan> {
        let prompt = self.prompt("plan", context! { description => description })?;
        let raw = self.generate(&prompt)?;
        extract_plan(&raw)
    }

    fn code(&self, description: &str, filename: &str) -> Option<String> {
        let prompt = self.prompt(
            "code",
            context! { language => "python", description => description, filename => filename },
        )?;
        let raw = self.generate(&prompt)?;
        Some(extract_code(&raw))
    }

    fn fix(&self, code: &str, error: &str, filename: &str) -> Option<String> {
        let prompt = self.prompt(
            "fix",
            context! {
                filename => filename,
                code => truncate_chars(code, FIX_CODE_CHARS),
                error => truncate_chars(error, FIX_ERROR_CHARS),
            },
        )?;
        let raw = self.generate(&prompt)?;
        Some(extract_code(&raw))
    }

    fn tool_calls(&self, task: &str) -> Vec<Action> {
        let prompt = match self.prompts.frame(task) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(err = %e, "prompt render failed");
                return Vec::new();
            }
        };
        let Some(raw) = self.generate(&prompt) else {
            return Vec::new();
        };
        match output_filter::enforce(&raw) {
            Some(filtered) => parse_tool_calls(&filtered),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_plan_finds_json_inside_chatter() {
        let raw = "Sure:\n{\"files\": {\"main.py\": \"entry\"}, \"test_cmd\": \"python3 main.py\"}\nDone";
        let plan = extract_plan(raw).expect("plan");
        assert_eq!(plan.files["main.py"], "entry");
        assert_eq!(plan.test_cmd.as_deref(), Some("python3 main.py"));
    }

    #[test]
    fn extract_plan_rejects_schema_violations() {
        assert!(extract_plan("{\"files\": [\"main.py\"]}").is_none());
        assert!(extract_plan("{\"test_cmd\": \"x\"}").is_none());
        assert!(extract_plan("no json here").is_none());
    }

    #[test]
    fn extract_code_prefers_fenced_block() {
        assert_eq!(
            extract_code("Here:\n```python\nprint(1)\n```\nbye"),
            "print(1)"
        );
        assert_eq!(extract_code("  print(2)  \n"), "print(2)");
    }

    #[test]
    fn prompts_render_inside_system_frame() {
        let engine = PromptEngine::new();
        let prompt = engine
            .render(
                "code",
                context! { language => "python", description => "adder", filename => "add.py" },
            )
            .expect("render");
        assert!(prompt.starts_with("You are an autonomous code execution engine."));
        assert!(prompt.contains("TASK: Write python code for: adder\nFilename: add.py"));
        assert!(prompt.trim_end().ends_with("OUTPUT:"));
    }

    #[test]
    fn command_backend_reads_stdout() {
        let mut config = AgentConfig::default();
        config.backend.command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat >/dev/null; printf '```\\nprint(42)\\n```\\n'".to_string(),
        ];
        let backend = CommandBackend::from_config(&config).expect("backend");
        assert!(backend.is_available());
        assert_eq!(backend.code("x", "main.py").as_deref(), Some("print(42)"));
    }

    #[test]
    fn failing_command_yields_none() {
        let mut config = AgentConfig::default();
        config.backend.command = vec!["sh".to_string(), "-c".to_string(), "exit 1".to_string()];
        let backend = CommandBackend::from_config(&config).expect("backend");
        assert!(backend.plan("x").is_none());
    }

    #[test]
    fn no_backend_without_command() {
        assert!(CommandBackend::from_config(&AgentConfig::default()).is_none());
        assert!(!NoBackend.is_available());
    }
}
