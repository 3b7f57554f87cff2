//! Unattended development agent.
//!
//! `autodev run` starts the agent loop; `exec`, `parse` and `status` are
//! one-shot commands against the same configuration and memory store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result, bail};
use autodev::agent::{Agent, Mode, detect_mode, spawn_stdin_reader};
use autodev::exit_codes;
use autodev::interpreter::CommandInterpreter;
use autodev::io::config::{AgentConfig, load_config};
use autodev::io::memory::MemoryStore;
use autodev::logging;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "autodev", version, about = "Unattended development agent")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "autodev.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the agent loop.
    Run {
        /// Operating mode. Defaults to `AUTODEV_MODE`, then terminal detection.
        #[arg(long, value_enum)]
        mode: Option<Mode>,
    },
    /// Interpret and execute one operator command.
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print the action plan for a command as JSON without executing it.
    Parse {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Print the memory context summary.
    Status,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init();
    let config = load_config(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;
    match cli.command {
        Command::Run { mode } => cmd_run(config, mode),
        Command::Exec { command } => cmd_exec(config, &command.join(" ")),
        Command::Parse { text } => cmd_parse(&config, &text.join(" ")),
        Command::Status => cmd_status(&config.memory_dir),
    }
}

fn cmd_run(config: AgentConfig, mode: Option<Mode>) -> Result<i32> {
    let mode = mode.unwrap_or_else(detect_mode);
    info!(mode = %mode, pid = std::process::id(), "starting");
    let stop = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(Arc::clone(&stop))?;

    let mut agent = Agent::new(config)?;
    let input = match mode {
        Mode::Autonomous => mpsc::channel().1,
        Mode::Operator | Mode::Hybrid => spawn_stdin_reader(),
    };
    agent.run_loop(mode, &stop, &input);
    Ok(exit_codes::OK)
}

fn cmd_exec(config: AgentConfig, command: &str) -> Result<i32> {
    let mut agent = Agent::new(config)?;
    let outcomes = agent.execute_operator_command(command)?;
    for outcome in &outcomes {
        println!("{}", outcome.output.trim_end());
    }
    if outcomes.iter().all(|o| o.success) {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::ACTION_FAILED)
    }
}

fn cmd_parse(config: &AgentConfig, text: &str) -> Result<i32> {
    let interpreter = CommandInterpreter::new(&config.project_root);
    let Some(plan) = interpreter.parse(text) else {
        bail!("no actionable plan for {text:?}");
    };
    let json = serde_json::to_string_pretty(&plan).context("serialize plan")?;
    println!("{json}");
    Ok(exit_codes::OK)
}

fn cmd_status(memory_dir: &Path) -> Result<i32> {
    let memory = MemoryStore::inspect(memory_dir);
    println!("{}", memory.context_summary());
    Ok(exit_codes::OK)
}

/// First Ctrl-C sets `stop`; the loop exits after the current cycle. A second one exits at once.
fn install_interrupt_handler(stop: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;
    thread::spawn(move || {
        runtime.block_on(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(err = %e, "cannot listen for interrupts");
                return;
            }
            info!("interrupt received, stopping after the current cycle");
            stop.store(true, Ordering::SeqCst);
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(exit_codes::ERROR);
            }
        });
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_mode() {
        let cli = Cli::parse_from(["autodev", "run", "--mode", "operator"]);
        assert!(matches!(
            cli.command,
            Command::Run {
                mode: Some(Mode::Operator)
            }
        ));
        assert_eq!(cli.config, PathBuf::from("autodev.toml"));
    }

    #[test]
    fn parse_exec_joins_words() {
        let cli = Cli::parse_from(["autodev", "--config", "x.toml", "exec", "create", "project", "foo"]);
        let Command::Exec { command } = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(command.join(" "), "create project foo");
        assert_eq!(cli.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn parse_status() {
        let cli = Cli::parse_from(["autodev", "status", "--config", "y.toml"]);
        assert!(matches!(cli.command, Command::Status));
        assert_eq!(cli.config, PathBuf::from("y.toml"));
    }
}
