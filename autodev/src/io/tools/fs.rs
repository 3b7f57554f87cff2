//! File system tools.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::info;
use walkdir::WalkDir;

use super::{
    Capability, InvalidArgs, Tool, ToolContext, ToolErrorKind, ToolOutcome, bool_arg, str_arg,
};
use crate::core::safety::PathAccess;
use crate::core::types::ToolArgs;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    Ok(())
}

fn guarded<'a>(args: &'a ToolArgs, key: &str, access: PathAccess) -> Vec<(&'a str, PathAccess)> {
    str_arg(args, key)
        .map(|path| vec![(path, access)])
        .unwrap_or_default()
}

pub struct WriteTool;

impl Tool for WriteTool {
    fn name(&self) -> &'static str {
        "write"
    }

    fn capability(&self) -> Capability {
        Capability::Write
    }

    fn guarded_paths<'a>(&self, args: &'a ToolArgs) -> Vec<(&'a str, PathAccess)> {
        guarded(args, "path", PathAccess::Write)
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = str_arg(args, "path")?;
        let content = str_arg(args, "content")?;
        ensure_parent(Path::new(path))?;
        fs::write(path, content).with_context(|| format!("write {path}"))?;
        info!(path, bytes = content.len(), "wrote file");
        Ok(ToolOutcome::ok(format!(
            "OK: Written {} bytes to {path}",
            content.len()
        )))
    }
}

pub struct ReadTool;

impl Tool for ReadTool {
    fn name(&self) -> &'static str {
        "read"
    }

    fn capability(&self) -> Capability {
        Capability::Read
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = str_arg(args, "path")?;
        match fs::read_to_string(path) {
            Ok(content) => Ok(ToolOutcome::ok(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ToolOutcome::error(
                ToolErrorKind::Failed,
                format!("File not found: {path}"),
            )),
            Err(e) => Err(e).with_context(|| format!("read {path}")),
        }
    }
}

pub struct AppendTool;

impl Tool for AppendTool {
    fn name(&self) -> &'static str {
        "append"
    }

    fn capability(&self) -> Capability {
        Capability::Write
    }

    fn guarded_paths<'a>(&self, args: &'a ToolArgs) -> Vec<(&'a str, PathAccess)> {
        guarded(args, "path", PathAccess::Write)
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = str_arg(args, "path")?;
        let content = str_arg(args, "content")?;
        ensure_parent(Path::new(path))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open {path}"))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("append {path}"))?;
        Ok(ToolOutcome::ok(format!(
            "OK: Appended {} bytes to {path}",
            content.len()
        )))
    }
}

pub struct DeleteTool;

impl Tool for DeleteTool {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn capability(&self) -> Capability {
        Capability::Write
    }

    fn guarded_paths<'a>(&self, args: &'a ToolArgs) -> Vec<(&'a str, PathAccess)> {
        guarded(args, "path", PathAccess::Delete)
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = str_arg(args, "path")?;
        fs::remove_file(path).with_context(|| format!("delete {path}"))?;
        info!(path, "deleted file");
        Ok(ToolOutcome::ok(format!("OK: Deleted {path}")))
    }
}

pub struct ListTool;

impl Tool for ListTool {
    fn name(&self) -> &'static str {
        "ls"
    }

    fn capability(&self) -> Capability {
        Capability::Read
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = str_arg(args, "path")?;
        let listing = if bool_arg(args, "recursive") {
            list_tree(Path::new(path))?
        } else {
            list_flat(Path::new(path))?
        };
        Ok(ToolOutcome::ok(listing))
    }
}

/// One `d name` / `f name` line per entry, sorted by name.
fn list_flat(dir: &Path) -> Result<String> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let entry = entry.with_context(|| format!("list {}", dir.display()))?;
        let prefix = if entry.path().is_dir() { "d" } else { "f" };
        entries.push((entry.file_name().to_string_lossy().into_owned(), prefix));
    }
    entries.sort();
    Ok(entries
        .into_iter()
        .map(|(name, prefix)| format!("{prefix} {name}"))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Indented tree; directories end with `/`.
fn list_tree(dir: &Path) -> Result<String> {
    let mut lines = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
        let indent = "  ".repeat(entry.depth());
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            lines.push(format!("{indent}{name}/"));
        } else {
            lines.push(format!("{indent}{name}"));
        }
    }
    Ok(lines.join("\n"))
}

pub struct FindTool;

impl Tool for FindTool {
    fn name(&self) -> &'static str {
        "find"
    }

    fn capability(&self) -> Capability {
        Capability::Read
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = str_arg(args, "path")?;
        let pattern = glob_regex(str_arg(args, "pattern")?)?;
        let matches: Vec<String> = WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| pattern.is_match(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path().display().to_string())
            .collect();
        Ok(ToolOutcome::ok(matches.join("\n")))
    }
}

/// Translate a shell file-name glob (`*`, `?`) to an anchored regex.
fn glob_regex(glob: &str) -> Result<Regex> {
    let mut pattern = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| InvalidArgs(format!("bad pattern `{glob}`: {e}")).into())
}

pub struct ExistsTool;

impl Tool for ExistsTool {
    fn name(&self) -> &'static str {
        "exists"
    }

    fn capability(&self) -> Capability {
        Capability::Read
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = str_arg(args, "path")?;
        let p = Path::new(path);
        let kind = if p.is_dir() {
            "directory"
        } else if p.exists() {
            "file"
        } else {
            "missing"
        };
        Ok(ToolOutcome::ok(format!("{kind}: {path}")))
    }
}

pub struct MkdirTool;

impl Tool for MkdirTool {
    fn name(&self) -> &'static str {
        "mkdir"
    }

    fn capability(&self) -> Capability {
        Capability::Write
    }

    fn guarded_paths<'a>(&self, args: &'a ToolArgs) -> Vec<(&'a str, PathAccess)> {
        guarded(args, "path", PathAccess::Write)
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = str_arg(args, "path")?;
        fs::create_dir_all(path).with_context(|| format!("create directory {path}"))?;
        Ok(ToolOutcome::ok(format!("OK: Directory created: {path}")))
    }
}

pub struct CopyTool;

impl Tool for CopyTool {
    fn name(&self) -> &'static str {
        "cp"
    }

    fn capability(&self) -> Capability {
        Capability::Write
    }

    fn guarded_paths<'a>(&self, args: &'a ToolArgs) -> Vec<(&'a str, PathAccess)> {
        guarded(args, "dst", PathAccess::Write)
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let src = str_arg(args, "src")?;
        let dst = str_arg(args, "dst")?;
        let src_path = Path::new(src);
        if src_path.is_dir() {
            copy_tree(src_path, Path::new(dst))?;
        } else {
            ensure_parent(Path::new(dst))?;
            fs::copy(src, dst).with_context(|| format!("copy {src} -> {dst}"))?;
        }
        Ok(ToolOutcome::ok(format!("OK: Copied {src} -> {dst}")))
    }
}

/// Copy a directory tree, merging into an existing destination.
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.with_context(|| format!("walk {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("create directory {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

pub struct MoveTool;

impl Tool for MoveTool {
    fn name(&self) -> &'static str {
        "mv"
    }

    fn capability(&self) -> Capability {
        Capability::Write
    }

    fn guarded_paths<'a>(&self, args: &'a ToolArgs) -> Vec<(&'a str, PathAccess)> {
        let mut paths = guarded(args, "src", PathAccess::Delete);
        paths.extend(guarded(args, "dst", PathAccess::Write));
        paths
    }

    fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let src = str_arg(args, "src")?;
        let dst = str_arg(args, "dst")?;
        ensure_parent(Path::new(dst))?;
        fs::rename(src, dst).with_context(|| format!("move {src} -> {dst}"))?;
        Ok(ToolOutcome::ok(format!("OK: Moved {src} -> {dst}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::AgentConfig;
    use serde_json::json;

    fn ctx() -> ToolContext {
        ToolContext::from_config(&AgentConfig::default())
    }

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn write_creates_parents_then_read_returns_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("a").join("b.txt");
        let path = path.to_string_lossy();
        let out = WriteTool
            .invoke(&args(json!({"path": path, "content": "hello"})), &ctx())
            .expect("write");
        assert_eq!(out.output, format!("OK: Written 5 bytes to {path}"));
        let out = ReadTool
            .invoke(&args(json!({"path": path})), &ctx())
            .expect("read");
        assert_eq!(out.output, "hello");
    }

    #[test]
    fn read_missing_file_is_failed_outcome() {
        let out = ReadTool
            .invoke(&args(json!({"path": "/definitely/not/here.txt"})), &ctx())
            .expect("read");
        assert!(!out.success);
        assert_eq!(out.output, "ERROR: File not found: /definitely/not/here.txt");
    }

    #[test]
    fn flat_listing_marks_dirs_and_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("sub")).expect("mkdir");
        fs::write(temp.path().join("a.py"), "").expect("write");
        let out = ListTool
            .invoke(&args(json!({"path": temp.path().to_string_lossy()})), &ctx())
            .expect("ls");
        assert_eq!(out.output, "f a.py\nd sub");
    }

    #[test]
    fn recursive_listing_indents_by_depth() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("sub")).expect("mkdir");
        fs::write(temp.path().join("sub").join("x.py"), "").expect("write");
        let out = ListTool
            .invoke(
                &args(json!({"path": temp.path().to_string_lossy(), "recursive": true})),
                &ctx(),
            )
            .expect("ls");
        let lines: Vec<&str> = out.output.lines().collect();
        assert_eq!(lines[1..], ["  sub/", "    x.py"]);
    }

    #[test]
    fn find_matches_globs() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a.py"), "").expect("write");
        fs::write(temp.path().join("b.txt"), "").expect("write");
        let out = FindTool
            .invoke(
                &args(json!({"path": temp.path().to_string_lossy(), "pattern": "*.py"})),
                &ctx(),
            )
            .expect("find");
        assert!(out.output.ends_with("a.py"));
        assert!(!out.output.contains("b.txt"));
    }

    #[test]
    fn exists_reports_kind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().to_string_lossy().into_owned();
        let out = ExistsTool
            .invoke(&args(json!({"path": dir})), &ctx())
            .expect("exists");
        assert_eq!(out.output, format!("directory: {dir}"));
        let missing = format!("{dir}/nope");
        let out = ExistsTool
            .invoke(&args(json!({"path": missing})), &ctx())
            .expect("exists");
        assert_eq!(out.output, format!("missing: {missing}"));
    }

    #[test]
    fn copy_and_move_directory_trees() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("inner")).expect("mkdir");
        fs::write(src.join("inner").join("f.txt"), "x").expect("write");
        let dst = temp.path().join("dst");
        CopyTool
            .invoke(
                &args(json!({"src": src.to_string_lossy(), "dst": dst.to_string_lossy()})),
                &ctx(),
            )
            .expect("cp");
        assert_eq!(
            fs::read_to_string(dst.join("inner").join("f.txt")).expect("read"),
            "x"
        );

        let moved = temp.path().join("moved");
        MoveTool
            .invoke(
                &args(json!({"src": dst.to_string_lossy(), "dst": moved.to_string_lossy()})),
                &ctx(),
            )
            .expect("mv");
        assert!(moved.join("inner").join("f.txt").exists());
        assert!(!dst.exists());
    }

    #[test]
    fn glob_escapes_regex_metacharacters() {
        let re = glob_regex("a.b*").expect("glob");
        assert!(re.is_match("a.bcd"));
        assert!(!re.is_match("axbcd"));
    }
}
