//! Pipeline runs against real directories, git and shell checks.

use std::fs;

use anyhow::Result;
use autodev::core::types::{Goal, StageName, StageStatus, ToolArgs};
use autodev::io::backend::NoBackend;
use autodev::io::tools::{Capability, Tool, ToolContext, ToolErrorKind, ToolOutcome};
use autodev::pipeline::{ExecutionPipeline, MAX_REPAIR_ATTEMPTS};
use autodev::test_support::{ScriptedBackend, TestWorkspace, literal_goal};

const INDENT_CHECK: &str = "if grep -q \"$(printf '\\t')\" main.py; then printf 'File \"main.py\", line 2\\nIndentationError: unexpected indent\\n'; else echo OK; fi";

#[test]
fn passing_literal_goal_has_four_stages() {
    let ws = TestWorkspace::new();
    let tools = ws.registry();
    let pipeline = ExecutionPipeline::new(&tools, &NoBackend);
    let mut goal = literal_goal("hello", &[("main.py", "print('hi')\n")], Some("echo OK"));
    let path = ws.project("hello");

    let report = pipeline.execute_goal(&mut goal, &path);

    assert!(report.success);
    assert_eq!(
        report.stage_names(),
        vec![StageName::Setup, StageName::Codegen, StageName::Verify, StageName::Commit]
    );
    assert_eq!(report.stages[0].detail, "created");
    assert_eq!(report.stages[1].detail, "wrote 1 files: main.py");
    assert_eq!(report.stages[2].command.as_deref(), Some("echo OK"));
    assert_eq!(report.repair_attempts, 0);
    assert_eq!(
        fs::read_to_string(path.join("main.py")).expect("read main.py"),
        "print('hi')\n"
    );
}

#[test]
fn existing_directory_is_reused() {
    let ws = TestWorkspace::new();
    let tools = ws.registry();
    let pipeline = ExecutionPipeline::new(&tools, &NoBackend);
    let path = ws.project("again");
    fs::create_dir_all(&path).expect("mkdir");
    let mut goal = literal_goal("again", &[("a.txt", "x")], Some("echo OK"));

    let report = pipeline.execute_goal(&mut goal, &path);

    assert_eq!(report.stages[0].detail, "exists");
}

struct BrokenGitInit;

impl Tool for BrokenGitInit {
    fn name(&self) -> &'static str {
        "git_init"
    }

    fn capability(&self) -> Capability {
        Capability::Exec
    }

    fn invoke(&self, _args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutcome> {
        Ok(ToolOutcome::error(ToolErrorKind::Failed, "git: command not found"))
    }
}

#[test]
fn setup_survives_git_init_failure() {
    let ws = TestWorkspace::new();
    let mut tools = ws.registry();
    tools.register(Box::new(BrokenGitInit));
    let pipeline = ExecutionPipeline::new(&tools, &NoBackend);
    let path = ws.project("nogit");
    let mut goal = literal_goal("nogit", &[("main.py", "print('hi')\n")], Some("echo OK"));

    let report = pipeline.execute_goal(&mut goal, &path);

    assert_eq!(report.stages[0].name, StageName::Setup);
    assert_eq!(report.stages[0].status, StageStatus::Ok);
    assert!(
        report.stages[0].detail.starts_with("created with errors: git_init: ERROR"),
        "{}",
        report.stages[0].detail
    );
    assert_eq!(report.stages[1].name, StageName::Codegen);
    assert!(path.join("main.py").exists());
}

#[test]
fn persistent_traceback_ends_with_one_repair_failure() {
    let ws = TestWorkspace::new();
    let tools = ws.registry();
    let pipeline = ExecutionPipeline::new(&tools, &NoBackend);
    let mut goal = literal_goal(
        "broken",
        &[("main.py", "print('hi')\n")],
        Some("echo 'Traceback (most recent call last)'"),
    );

    let report = pipeline.execute_goal(&mut goal, &ws.project("broken"));

    assert!(!report.success);
    let repairs: Vec<_> = report
        .stages
        .iter()
        .filter(|s| s.name == StageName::Repair)
        .collect();
    assert_eq!(repairs.len(), 1);
    assert_eq!(repairs[0].status, StageStatus::Fail);
    assert!(report.repair_attempts >= 1 && report.repair_attempts <= MAX_REPAIR_ATTEMPTS);
    assert!(!report.stage_names().contains(&StageName::Commit));
}

#[test]
fn indentation_rule_expands_tabs_and_recovers() {
    let ws = TestWorkspace::new();
    let tools = ws.registry();
    let pipeline = ExecutionPipeline::new(&tools, &NoBackend);
    let path = ws.project("tabs");
    let mut goal = literal_goal("tabs", &[("main.py", "def f():\n\treturn 1\n")], Some(INDENT_CHECK));

    let report = pipeline.execute_goal(&mut goal, &path);

    assert!(report.success, "stages: {:?}", report.stages);
    let repair = report
        .stages
        .iter()
        .find(|s| s.name == StageName::Repair)
        .expect("repair stage");
    assert_eq!(repair.status, StageStatus::Ok);
    assert_eq!(repair.detail, "fixed on attempt 2");
    assert_eq!(report.repair_attempts, 2);
    assert_eq!(
        fs::read_to_string(path.join("main.py")).expect("read"),
        "def f():\n    return 1\n"
    );
    assert_eq!(report.stage_names().last(), Some(&StageName::Commit));
}

#[test]
fn backend_plan_writes_files_and_attaches_test_command() {
    let ws = TestWorkspace::new();
    let tools = ws.registry();
    let backend = ScriptedBackend::with_plan(&[("app.py", "entry point")], Some("cat app.py"))
        .code_for("app.py", "print('OK')\n");
    let pipeline = ExecutionPipeline::new(&tools, &backend);
    let mut goal = Goal::bare("gen", "generated app");

    let report = pipeline.execute_goal(&mut goal, &ws.project("gen"));

    assert!(report.success, "stages: {:?}", report.stages);
    assert_eq!(report.stages[1].detail, "wrote 1 files: app.py");
    assert_eq!(goal.test_cmd.as_deref(), Some("cat app.py"));
    assert_eq!(backend.calls(), vec!["plan:generated app", "code:app.py"]);
}

#[test]
fn backend_fix_is_written_back() {
    let ws = TestWorkspace::new();
    let tools = ws.registry();
    let backend = ScriptedBackend::default().fix_with("fixed = True\n");
    let pipeline = ExecutionPipeline::new(&tools, &backend);
    let path = ws.project("fixme");
    let mut goal = literal_goal(
        "fixme",
        &[("main.py", "broken(\n")],
        Some("grep -q fixed main.py && echo OK || echo 'Traceback (most recent call last)'"),
    );

    let report = pipeline.execute_goal(&mut goal, &path);

    assert!(report.success, "stages: {:?}", report.stages);
    assert!(backend.calls().contains(&"fix:main.py".to_string()));
    assert_eq!(
        fs::read_to_string(path.join("main.py")).expect("read"),
        "fixed = True\n"
    );
}

#[test]
fn placeholder_written_without_backend_or_files() {
    let ws = TestWorkspace::new();
    let tools = ws.registry();
    let pipeline = ExecutionPipeline::new(&tools, &NoBackend);
    let path = ws.project("empty");
    let mut goal = Goal::bare("empty", "prints a greeting");

    let report = pipeline.execute_goal(&mut goal, &path);

    assert_eq!(report.stages[1].detail, "wrote 1 files: main.py");
    let main = fs::read_to_string(path.join("main.py")).expect("read");
    assert!(main.contains("\"\"\"prints a greeting\"\"\""));
}

#[test]
fn unsafe_check_command_aborts_with_error_stage() {
    let ws = TestWorkspace::new();
    let tools = ws.registry();
    let pipeline = ExecutionPipeline::new(&tools, &NoBackend);
    let mut goal = literal_goal("danger", &[("a.txt", "x")], Some("rm -rf /"));

    let report = pipeline.execute_goal(&mut goal, &ws.project("danger"));

    assert!(!report.success);
    assert_eq!(report.stage_names().last(), Some(&StageName::Error));
}

#[test]
fn repair_existing_requires_a_directory() {
    let ws = TestWorkspace::new();
    let tools = ws.registry();
    let pipeline = ExecutionPipeline::new(&tools, &NoBackend);
    let goal = Goal::bare("ghost", "fix ghost");

    let report = pipeline.repair_existing(&goal, &ws.project("ghost"));

    assert!(!report.success);
    assert_eq!(report.stage_names(), vec![StageName::Error]);
}

#[test]
fn repair_existing_skips_generation() {
    let ws = TestWorkspace::new();
    let tools = ws.registry();
    let pipeline = ExecutionPipeline::new(&tools, &NoBackend);
    let path = ws.project("kept");
    fs::create_dir_all(&path).expect("mkdir");
    fs::write(path.join("notes.txt"), "keep me").expect("write");
    let mut goal = Goal::bare("kept", "fix kept");
    goal.test_cmd = Some("echo OK".to_string());

    let report = pipeline.repair_existing(&goal, &path);

    assert!(report.success);
    assert_eq!(report.stage_names(), vec![StageName::Verify, StageName::Commit]);
    assert!(!path.join("main.py").exists());
}
