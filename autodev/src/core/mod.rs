//! Deterministic, pure logic shared by the agent.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (command text, check output, file names) and return deterministic
//! results suitable for tests.

pub mod classifier;
pub mod goal_select;
pub mod intent;
pub mod output_filter;
pub mod project_kind;
pub mod protocol;
pub mod repair_rules;
pub mod safety;
pub mod text;
pub mod types;
