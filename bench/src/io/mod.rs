//! I/O helpers for harness runs.

pub mod config;
pub mod output;
pub mod preflight;
pub mod process;
pub mod prompt;
pub mod record;
