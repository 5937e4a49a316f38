#![forbid(unsafe_code)]
//! Regression harness for a command-line HEIC converter
//!
//! The harness builds the converter on demand, checks that known-invalid
//! inputs are rejected, converts every paired fixture and scores the result
//! against a trusted reference with structural similarity (SSIM).
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `harness` modules
//!   enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod harness;
pub mod version;

pub use harness::{Driver, HarnessConfig, HarnessError, TestRun};
