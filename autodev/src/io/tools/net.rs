//! Tools that download code or packages. Both go through the network gate.

use anyhow::Result;
use serde_json::Value;

use super::{
    Capability, InvalidArgs, Tool, ToolContext, ToolErrorKind, ToolOutcome, opt_str_arg, str_arg,
};
use crate::core::safety::PathAccess;
use crate::core::types::ToolArgs;
use crate::io::network::Refusal;
use crate::io::process::CommandOutput;

pub struct PipInstallTool;

/// `packages` as a space-separated string or an array of names, one argv entry each.
fn packages(args: &ToolArgs) -> Result<Vec<String>> {
    let names: Vec<String> = match args.get("packages") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect(),
        _ => str_arg(args, "packages")?
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    };
    if names.is_empty() {
        return Err(InvalidArgs("argument `packages` is empty".to_string()).into());
    }
    Ok(names)
}

fn gated(result: std::result::Result<CommandOutput, Refusal>) -> ToolOutcome {
    match result {
        Ok(output) => ToolOutcome::from_command(&output),
        Err(refusal) => ToolOutcome::error(ToolErrorKind::Blocked, refusal),
    }
}

impl Tool for PipInstallTool {
    fn name(&self) -> &'static str {
        "pip_install"
    }

    fn capability(&self) -> Capability {
        Capability::Net
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        let packages = packages(args)?;
        Ok(gated(ctx.network.pip_install(&packages)?))
    }
}

pub struct GitCloneTool;

impl Tool for GitCloneTool {
    fn name(&self) -> &'static str {
        "git_clone"
    }

    fn capability(&self) -> Capability {
        Capability::Net
    }

    fn guarded_paths<'a>(&self, args: &'a ToolArgs) -> Vec<(&'a str, PathAccess)> {
        opt_str_arg(args, "dest")
            .map(|dest| vec![(dest, PathAccess::Write)])
            .unwrap_or_default()
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        let url = str_arg(args, "url")?;
        Ok(gated(ctx.network.git_clone(url, opt_str_arg(args, "dest"))?))
    }
}
