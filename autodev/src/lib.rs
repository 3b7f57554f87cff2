//! Unattended development agent.
//!
//! The agent turns one-line operator commands or self-selected goals into
//! tool invocations, verifies the result, repairs simple failures and records
//! everything in a persistent memory store.
//!
//! - **[`core`]**: Pure, deterministic logic (intent matching, safety checks,
//!   failure classification, repair rules, goal selection). No I/O.
//! - **[`io`]**: Side-effecting adapters (processes, git, tools, memory store,
//!   generation backend, configuration).
//!
//! Orchestration modules ([`interpreter`], [`pipeline`], [`agent`]) combine
//! the two to implement the CLI commands.

pub mod agent;
pub mod core;
pub mod exit_codes;
pub mod interpreter;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
