//! Stable exit codes for the `gamebench` CLI.

/// Every item finished with no failure (skips count as success), or the batch was a dry run.
pub const OK: i32 = 0;
/// At least one item failed, or the batch could not start (bad args/config, missing binary,
/// spawn failure).
pub const FAILED: i32 = 1;
