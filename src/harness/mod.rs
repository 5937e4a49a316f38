//! Regression harness components
//!
//! ## Modules
//!
//! - `config` - Immutable run configuration
//! - `build` - On-demand converter build
//! - `fixtures` - Fixture discovery and pairing
//! - `convert` - Converter invocation
//! - `similarity` - Perceptual similarity scoring
//! - `negative` - Rejection checks for invalid inputs
//! - `driver` - Run sequencing and failure policy
//! - `report` - Progress reporting
//! - `interfaces` - Traits at the process and algorithm boundaries
//!
//! ## Design
//!
//! Components return `HarnessResult<T>` and never exit the process. The
//! driver collects per-fixture outcomes into a `TestRun`; only the CLI turns
//! that into an exit status.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod build;
pub mod config;
pub mod convert;
pub mod driver;
pub mod error;
pub mod fixtures;
pub mod interfaces;
pub mod negative;
pub mod report;
pub mod similarity;

pub use build::{BinaryHandle, BuildOrchestrator, BuildOutcome};
pub use config::{BuildStep, FailurePolicy, HarnessConfig, PairingStrategy, SIMILARITY_THRESHOLD};
pub use convert::{ConversionResult, ConversionRunner};
pub use driver::{Driver, FixtureOutcome, FixtureReport, RunOutcome, RunPhase, TestRun};
pub use error::{HarnessError, HarnessResult, ScoringError};
pub use fixtures::{FixtureKind, FixtureRegistry, TestFixture};
pub use negative::NegativeCaseValidator;
pub use report::{ConsoleReporter, HarnessReporter, JsonReporter, RunSummary};
pub use similarity::{SimilarityScore, SimilarityScorer};
