//! Converter invocation

use std::path::{Path, PathBuf};

use super::build::BinaryHandle;
use super::error::{HarnessError, HarnessResult};
use super::interfaces::Converter;

/// Outcome of one converter run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub fixture_id: String,
    pub exit_code: i32,
    pub output_path: PathBuf,
}

impl ConversionResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs the converter under test, one fixture at a time
pub struct ConversionRunner<'a, C: Converter> {
    binary: &'a BinaryHandle,
    converter: C,
}

impl<'a, C: Converter> ConversionRunner<'a, C> {
    pub fn new(binary: &'a BinaryHandle, converter: C) -> Self {
        Self { binary, converter }
    }

    /// Convert `input` to `output` and report the exit code.
    ///
    /// A nonzero exit code is not an error here; whether it is a failure
    /// depends on the fixture kind. Only a converter that cannot be spawned is.
    #[tracing::instrument(skip_all, fields(fixture = fixture_id))]
    pub fn convert(&self, fixture_id: &str, input: &Path, output: &Path) -> HarnessResult<ConversionResult> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let exit_code = self
            .converter
            .convert(self.binary.path(), input, output)
            .map_err(|source| HarnessError::Spawn {
                program: self.binary.path().to_path_buf(),
                source,
            })?;
        tracing::debug!(exit_code, "converter exited");

        Ok(ConversionResult {
            fixture_id: fixture_id.to_string(),
            exit_code,
            output_path: output.to_path_buf(),
        })
    }
}
