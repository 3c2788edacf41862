//! Deterministic, pure logic shared by the harness.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod classify;
pub mod lifecycle;
pub mod matrix;
pub mod slug;
pub mod types;
