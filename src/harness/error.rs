//! Harness error taxonomy
//!
//! Every variant is terminal for the fixture it came from. The driver decides
//! whether a failure ends the run (see [`FailurePolicy`](super::config::FailurePolicy)).

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while running the harness
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("build step `{step}` failed with exit code {exit_code} in {}", .build_dir.display())]
    #[diagnostic(
        code(harness::build_failure),
        help("run the build step by hand in the build directory to see its full output")
    )]
    BuildFailure {
        step: String,
        exit_code: i32,
        build_dir: PathBuf,
    },

    #[error("converter binary {} is missing after a successful build", .path.display())]
    #[diagnostic(
        code(harness::binary_missing),
        help("check the binary name (--binary-name) or the build output location")
    )]
    BinaryMissing { path: PathBuf },

    #[error("converting {} failed with exit code {exit_code}", .input.display())]
    #[diagnostic(code(harness::conversion_failure))]
    ConversionFailure {
        fixture: String,
        input: PathBuf,
        exit_code: i32,
    },

    #[error("converter accepted invalid input {fixture}")]
    #[diagnostic(
        code(harness::negative_case_regression),
        help("inputs in the negatives directory must be rejected with a nonzero exit code")
    )]
    NegativeCaseRegression { fixture: String, input: PathBuf },

    #[error("scoring {fixture} failed")]
    #[diagnostic(code(harness::scoring_failure))]
    Scoring {
        fixture: String,
        #[source]
        source: ScoringError,
    },

    #[error("similarity of {fixture} is {:.1}%, below the acceptance rate of {threshold:.2}", .score * 100.0)]
    #[diagnostic(code(harness::similarity_below_threshold))]
    SimilarityBelowThreshold {
        fixture: String,
        score: f64,
        threshold: f64,
    },

    #[error("failed to spawn {}", .program.display())]
    #[diagnostic(code(harness::spawn))]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read fixture directory {}", .path.display())]
    #[diagnostic(code(harness::discovery))]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("positional pairing needs a reference directory separate from {}", .fixtures_dir.display())]
    #[diagnostic(
        code(harness::positional_references),
        help("pass --references with the directory holding the reference images")
    )]
    PositionalReferences { fixtures_dir: PathBuf },

    #[error("fixture id `{0}` appears more than once")]
    #[diagnostic(code(harness::duplicate_fixture), help("rename one of the fixture files"))]
    DuplicateFixtureId(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(harness::io))]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Short kind label used by reporters.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::BuildFailure { .. } | HarnessError::BinaryMissing { .. } => "BuildFailure",
            HarnessError::ConversionFailure { .. } => "ConversionFailure",
            HarnessError::NegativeCaseRegression { .. } => "NegativeCaseRegression",
            HarnessError::Scoring { .. } => "ScoringFailure",
            HarnessError::SimilarityBelowThreshold { .. } => "SimilarityBelowThreshold",
            HarnessError::Spawn { .. } => "SpawnFailure",
            HarnessError::Discovery { .. }
            | HarnessError::PositionalReferences { .. }
            | HarnessError::DuplicateFixtureId(_) => "DiscoveryFailure",
            HarnessError::Io(_) => "IoFailure",
        }
    }
}

/// Reasons a similarity score could not be produced
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image dimensions differ: reference is {reference:?}, converted is {converted:?}")]
    DimensionMismatch {
        reference: (u32, u32),
        converted: (u32, u32),
    },

    #[error("similarity algorithm returned a non-finite score ({0})")]
    NonFinite(f64),

    #[error("similarity algorithm failed: {0}")]
    Compare(String),
}

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
