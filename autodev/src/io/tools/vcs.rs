//! Version-control tools backed by [`Git`].

use anyhow::Result;

use super::{Capability, Tool, ToolContext, ToolOutcome, str_arg, u64_arg};
use crate::core::safety::PathAccess;
use crate::core::types::ToolArgs;
use crate::io::git::Git;

const DEFAULT_LOG_COUNT: u64 = 10;

fn repo(args: &ToolArgs, ctx: &ToolContext) -> Result<Git> {
    Ok(Git::new(str_arg(args, "path")?, ctx.timeouts.command()))
}

pub struct GitInitTool;

impl Tool for GitInitTool {
    fn name(&self) -> &'static str {
        "git_init"
    }

    fn capability(&self) -> Capability {
        Capability::Write
    }

    fn guarded_paths<'a>(&self, args: &'a ToolArgs) -> Vec<(&'a str, PathAccess)> {
        str_arg(args, "path")
            .map(|path| vec![(path, PathAccess::Write)])
            .unwrap_or_default()
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        let out = repo(args, ctx)?.init()?;
        Ok(ToolOutcome::ok(out))
    }
}

pub struct GitCommitTool;

impl Tool for GitCommitTool {
    fn name(&self) -> &'static str {
        "git_commit"
    }

    fn capability(&self) -> Capability {
        Capability::Write
    }

    fn guarded_paths<'a>(&self, args: &'a ToolArgs) -> Vec<(&'a str, PathAccess)> {
        str_arg(args, "path")
            .map(|path| vec![(path, PathAccess::Write)])
            .unwrap_or_default()
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        let git = repo(args, ctx)?;
        let message = str_arg(args, "message")?;
        if git.commit_all(message)? {
            Ok(ToolOutcome::ok(git.log_oneline(1)?))
        } else {
            Ok(ToolOutcome::ok("OK: nothing to commit"))
        }
    }
}

pub struct GitStatusTool;

impl Tool for GitStatusTool {
    fn name(&self) -> &'static str {
        "git_status"
    }

    fn capability(&self) -> Capability {
        Capability::Read
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        Ok(ToolOutcome::ok(repo(args, ctx)?.status_short()?))
    }
}

pub struct GitLogTool;

impl Tool for GitLogTool {
    fn name(&self) -> &'static str {
        "git_log"
    }

    fn capability(&self) -> Capability {
        Capability::Read
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        let count = u64_arg(args, "count")?.unwrap_or(DEFAULT_LOG_COUNT);
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        Ok(ToolOutcome::ok(repo(args, ctx)?.log_oneline(count)?))
    }
}

pub struct GitDiffTool;

impl Tool for GitDiffTool {
    fn name(&self) -> &'static str {
        "git_diff"
    }

    fn capability(&self) -> Capability {
        Capability::Read
    }

    fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutcome> {
        Ok(ToolOutcome::ok(repo(args, ctx)?.diff()?))
    }
}
