//! Side-effecting adapters: processes, git, the file system and persisted state.

pub mod backend;
pub mod config;
pub mod fsutil;
pub mod git;
pub mod memory;
pub mod network;
pub mod process;
pub mod projects;
pub mod templates;
pub mod tools;
