//! Stable exit codes for the autodev CLI.

/// Command succeeded.
pub const OK: i32 = 0;
/// Startup failed (unreadable config, unavailable memory directory) or the
/// command reported an error.
pub const ERROR: i32 = 1;
/// `autodev exec` ran but at least one action failed.
pub const ACTION_FAILED: i32 = 2;
