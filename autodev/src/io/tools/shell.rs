//! Process, system and build tools.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tracing::info;

use super::{
    Capability, InvalidArgs, Tool, ToolContext, ToolErrorKind, ToolOutcome, opt_str_arg, str_arg,
    u64_arg,
};
use crate::core::project_kind::{self, ProjectKind};
use crate::core::types::ToolArgs;
use crate::io::config::MAX_NETWORK_TIMEOUT_SECS;
use crate::io::fsutil::entry_names;
use crate::io::network::is_network_operation;
use crate::io::process::run_shell;

pub struct RunTool;

impl Tool for RunTool {
    fn name(&self) -> &'static str {
        "run"
    }

    fn capability(&self) -> Capability {
        Capability::Exec
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        let command = str_arg(args, "command")?;
        let cwd = opt_str_arg(args, "cwd").map(Path::new);
        if is_network_operation(command) {
            return Ok(match ctx.network.run(command, cwd)? {
                Ok(output) => ToolOutcome::from_command(&output),
                Err(refusal) => ToolOutcome::error(ToolErrorKind::Blocked, refusal),
            });
        }
        let timeout = match u64_arg(args, "timeout")? {
            Some(secs) => Duration::from_secs(secs.clamp(1, MAX_NETWORK_TIMEOUT_SECS)),
            None => ctx.timeouts.command(),
        };
        info!(command, "exec");
        let output = run_shell(command, cwd, timeout, ctx.output_limit_bytes)?;
        Ok(ToolOutcome::from_command(&output))
    }
}

pub struct PsTool;

impl Tool for PsTool {
    fn name(&self) -> &'static str {
        "ps"
    }

    fn capability(&self) -> Capability {
        Capability::Exec
    }

    fn invoke(&self, _args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        let output = run_shell("ps aux", None, ctx.timeouts.command(), ctx.output_limit_bytes)?;
        Ok(ToolOutcome::from_command(&output))
    }
}

pub struct KillTool;

impl Tool for KillTool {
    fn name(&self) -> &'static str {
        "kill"
    }

    fn capability(&self) -> Capability {
        Capability::Exec
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        let pid = u64_arg(args, "pid")?
            .ok_or_else(|| InvalidArgs("missing argument `pid`".to_string()))?;
        info!(pid, "kill");
        let output = run_shell(
            &format!("kill {pid}"),
            None,
            ctx.timeouts.command(),
            ctx.output_limit_bytes,
        )?;
        Ok(ToolOutcome::from_command(&output))
    }
}

pub struct SysinfoTool;

impl SysinfoTool {
    fn probe(command: &str, ctx: &ToolContext) -> String {
        run_shell(command, None, ctx.timeouts.command(), ctx.output_limit_bytes)
            .map(|out| out.to_tool_text().trim().to_string())
            .unwrap_or_else(|e| format!("ERROR: {e:#}"))
    }
}

impl Tool for SysinfoTool {
    fn name(&self) -> &'static str {
        "sysinfo"
    }

    fn capability(&self) -> Capability {
        Capability::Exec
    }

    fn invoke(&self, _args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        let info = json!({
            "hostname": Self::probe("hostname", ctx),
            "uptime": Self::probe("uptime", ctx),
            "memory": Self::probe("free -m 2>/dev/null || head -5 /proc/meminfo", ctx),
            "disk": Self::probe("df -h / 2>/dev/null", ctx),
            "python": Self::probe("python3 --version", ctx),
        });
        Ok(ToolOutcome::ok(serde_json::to_string_pretty(&info)?))
    }
}

fn detect_kinds(path: &str) -> Vec<ProjectKind> {
    entry_names(Path::new(path))
        .map(|names| project_kind::detect(&names))
        .unwrap_or_default()
}

pub struct DetectTypeTool;

impl Tool for DetectTypeTool {
    fn name(&self) -> &'static str {
        "detect_type"
    }

    fn capability(&self) -> Capability {
        Capability::Read
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = str_arg(args, "path")?;
        Ok(ToolOutcome::ok(project_kind::describe(&detect_kinds(path))))
    }
}

/// Runs every detected test runner; succeeds only if at least one ran and all passed.
pub struct TestTool;

impl Tool for TestTool {
    fn name(&self) -> &'static str {
        "test"
    }

    fn capability(&self) -> Capability {
        Capability::Exec
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = str_arg(args, "path")?;
        let kinds = detect_kinds(path);
        info!(path, kinds = %project_kind::describe(&kinds), "running tests");

        let mut sections = Vec::new();
        let mut all_passed = true;
        for kind in kinds {
            let Some(command) = kind.test_command() else {
                continue;
            };
            let output = run_shell(
                command,
                Some(Path::new(path)),
                ctx.timeouts.test_tool(),
                ctx.output_limit_bytes,
            )?;
            all_passed &= output.success();
            sections.push(format!("[{}] {}", kind.as_str(), output.to_tool_text()));
        }
        if sections.is_empty() {
            return Ok(ToolOutcome {
                success: false,
                kind: Some(ToolErrorKind::Failed),
                output: "[unknown] No test runner detected".to_string(),
            });
        }
        let output = sections.join("\n");
        Ok(if all_passed {
            ToolOutcome::ok(output)
        } else {
            ToolOutcome {
                success: false,
                kind: Some(ToolErrorKind::Failed),
                output,
            }
        })
    }
}
