//! Harness I/O boundary interfaces
//!
//! This module defines trait-based abstractions for the harness operations
//! that leave the process:
//! - Build commands (configure + compile)
//! - Converter invocation
//! - The similarity algorithm
//!
//! The `Default*` implementations are what the CLI uses. Tests swap in fakes
//! so the driver can be exercised without a real converter or toolchain.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use image::{DynamicImage, GrayImage};
use image_compare::Algorithm;

use super::error::ScoringError;

/// Exit code reported for a child terminated without one (killed by a signal).
pub const SIGNAL_EXIT_CODE: i32 = -1;

pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNAL_EXIT_CODE)
}

// ============================================================================
// Build Command Interface
// ============================================================================

/// Run one external build command to completion.
pub trait CommandRunner {
    /// Spawn `program args...` with `cwd` as the child's working directory.
    /// Returns the exit code.
    fn run(&self, program: &OsStr, args: &[OsString], cwd: &Path) -> io::Result<i32>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, program: &OsStr, args: &[OsString], cwd: &Path) -> io::Result<i32> {
        (**self).run(program, args, cwd)
    }
}

/// Spawns the command with inherited stdio (current behavior).
pub struct DefaultCommandRunner;

impl CommandRunner for DefaultCommandRunner {
    fn run(&self, program: &OsStr, args: &[OsString], cwd: &Path) -> io::Result<i32> {
        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(exit_code(status))
    }
}

// ============================================================================
// Converter Interface
// ============================================================================

/// Invoke the converter under test on one input.
pub trait Converter {
    /// Convert `input` into `output` with `binary`. Blocks until the converter
    /// exits and returns its exit code.
    fn convert(&self, binary: &Path, input: &Path, output: &Path) -> io::Result<i32>;
}

impl<T: Converter + ?Sized> Converter for &T {
    fn convert(&self, binary: &Path, input: &Path, output: &Path) -> io::Result<i32> {
        (**self).convert(binary, input, output)
    }
}

/// `<binary> -v <input> <output>` with inherited stdio (current behavior).
///
/// No timeout: a converter that never exits blocks the harness.
pub struct DefaultConverter;

impl Converter for DefaultConverter {
    fn convert(&self, binary: &Path, input: &Path, output: &Path) -> io::Result<i32> {
        let status = Command::new(binary)
            .arg("-v")
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(exit_code(status))
    }
}

// ============================================================================
// Similarity Algorithm Interface
// ============================================================================

/// Raw output of a similarity algorithm, before normalization.
pub struct Comparison {
    pub score: f64,
    /// Visual similarity map, only produced when asked for
    pub heatmap: Option<DynamicImage>,
}

/// Structural similarity between two same-sized grayscale images.
pub trait SimilarityAlgorithm {
    fn compare(
        &self,
        reference: &GrayImage,
        converted: &GrayImage,
        want_heatmap: bool,
    ) -> Result<Comparison, ScoringError>;
}

impl<T: SimilarityAlgorithm + ?Sized> SimilarityAlgorithm for &T {
    fn compare(
        &self,
        reference: &GrayImage,
        converted: &GrayImage,
        want_heatmap: bool,
    ) -> Result<Comparison, ScoringError> {
        (**self).compare(reference, converted, want_heatmap)
    }
}

/// Mean SSIM from `image-compare` (current behavior).
pub struct DefaultSimilarity;

impl SimilarityAlgorithm for DefaultSimilarity {
    fn compare(
        &self,
        reference: &GrayImage,
        converted: &GrayImage,
        want_heatmap: bool,
    ) -> Result<Comparison, ScoringError> {
        let similarity = image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, reference, converted)
            .map_err(|e| ScoringError::Compare(e.to_string()))?;

        let heatmap = want_heatmap.then(|| similarity.image.to_color_map());

        Ok(Comparison {
            score: similarity.score,
            heatmap,
        })
    }
}
