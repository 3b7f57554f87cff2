//! Child process execution with timeouts and bounded output.
//!
//! Every process the agent launches goes through here, so no call can hang
//! the control loop: the child is killed once its timeout expires and the
//! pipes are drained on background threads to avoid deadlocks.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    pub timeout: Duration,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Render in the tool text convention.
    ///
    /// stdout on success, `ERROR [code]: stderr` on a non-zero exit and
    /// `ERROR: Command timed out after Ns` on timeout.
    pub fn to_tool_text(&self) -> String {
        if self.timed_out {
            return format!(
                "ERROR: Command timed out after {}s",
                self.timeout.as_secs()
            );
        }
        if self.status.success() {
            return self.stdout_text();
        }
        let code = self
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        format!("ERROR [{code}]: {}", self.stderr_text().trim())
    }
}

/// Run `command` through `sh -c` in `cwd`.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
pub fn run_shell(
    command: &str,
    cwd: Option<&Path>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    debug!(command, "running shell command");
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    run_command_with_timeout(cmd, None, timeout, output_limit_bytes)
        .with_context(|| format!("run `{command}`"))
}

/// Run `program` with `args` directly, without a shell.
#[instrument(skip_all, fields(program, timeout_secs = timeout.as_secs()))]
pub fn run_program(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    debug!(program, ?args, "running program");
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    run_command_with_timeout(cmd, None, timeout, output_limit_bytes)
        .with_context(|| format!("run `{program}`"))
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr kept in memory (bytes beyond this are discarded while still draining the pipe).
/// On unix the child leads its own process group, and a timeout kills the whole group so
/// grandchildren holding the pipes die with it.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    // Fed from a thread so a child that never reads stdin still hits the timeout,
    // and a failed write leaves the child to be reaped below.
    let stdin_handle = match stdin {
        Some(input) => match child.stdin.take() {
            Some(mut child_stdin) => {
                let input = input.to_vec();
                Some(thread::spawn(move || child_stdin.write_all(&input)))
            }
            None => {
                kill_tree(&mut child)?;
                child.wait().context("wait command after kill")?;
                return Err(anyhow!("stdin was not piped"));
            }
        },
        None => None,
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            kill_tree(&mut child)?;
            child.wait().context("wait command after kill")?
        }
    };

    if let Some(handle) = stdin_handle {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(err = %e, "child closed stdin early"),
            Err(_) => warn!("stdin writer thread panicked"),
        }
    }

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
        timeout,
    })
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_tree(child: &mut Child) -> Result<()> {
    let pgid = i32::try_from(child.id()).context("child pid out of range")?;
    // SAFETY: kill(2) with a negative pid only signals the group; no memory is shared.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        // The group may already be gone; fall back to the direct child.
        child.kill().context("kill command")?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 10_000;

    #[test]
    fn successful_command_renders_stdout() {
        let out = run_shell("echo hello", None, Duration::from_secs(5), LIMIT).expect("run");
        assert!(out.success());
        assert_eq!(out.to_tool_text(), "hello\n");
    }

    #[test]
    fn failing_command_renders_error_prefix() {
        let out = run_shell("echo boom >&2; exit 3", None, Duration::from_secs(5), LIMIT)
            .expect("run");
        assert_eq!(out.to_tool_text(), "ERROR [3]: boom");
    }

    #[test]
    fn timeout_kills_child() {
        let out = run_shell("sleep 5", None, Duration::from_millis(200), LIMIT).expect("run");
        assert!(out.timed_out);
        assert!(out.to_tool_text().starts_with("ERROR: Command timed out after"));
    }

    #[test]
    fn timeout_kills_compound_command_children() {
        let start = std::time::Instant::now();
        let out = run_shell("sleep 5; echo done", None, Duration::from_millis(200), LIMIT)
            .expect("run");
        assert!(out.timed_out);
        assert!(!out.stdout_text().contains("done"));
        assert!(start.elapsed() < Duration::from_secs(3), "took {:?}", start.elapsed());
    }

    #[test]
    fn program_arguments_are_not_shell_parsed() {
        let args = vec!["a; echo injected".to_string()];
        let out = run_program("echo", &args, None, Duration::from_secs(5), LIMIT).expect("run");
        assert_eq!(out.stdout_text(), "a; echo injected\n");
    }

    #[test]
    fn child_ignoring_stdin_is_still_reaped() {
        let cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg("exit 4");
            cmd
        };
        let input = vec![b'x'; 1 << 20];
        let out = run_command_with_timeout(cmd, Some(&input), Duration::from_secs(5), LIMIT)
            .expect("run");
        assert_eq!(out.status.code(), Some(4));
        assert!(!out.timed_out);
    }

    #[test]
    fn runs_in_working_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("marker.txt"), "x").expect("write");
        let out = run_shell("ls", Some(temp.path()), Duration::from_secs(5), LIMIT).expect("run");
        assert!(out.stdout_text().contains("marker.txt"));
    }

    #[test]
    fn output_beyond_limit_is_counted_not_kept() {
        let out = run_shell("printf 'abcdef'", None, Duration::from_secs(5), 3).expect("run");
        assert_eq!(out.stdout, b"abc");
        assert_eq!(out.stdout_truncated, 3);
    }
}
