//! Benchmark harness that runs coding-agent CLIs against a catalog of game
//! tasks and validates what they produce.
//!
//! The crate keeps the same split throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (matrix resolution, slugs, failure
//!   classification, the timeout state machine). No I/O.
//! - **[`io`]**: Side-effecting operations (config/prompt loading, subprocesses,
//!   output directory lifecycle, artifact recording).
//!
//! [`agents`] maps a matrix item onto a concrete CLI invocation, [`validate`]
//! checks the produced project, and [`batch`] drives one sequential pass over
//! the matrix.

pub mod agents;
pub mod batch;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
