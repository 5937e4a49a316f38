//! On-demand converter build
//!
//! The cache policy is presence-only: if a file exists at the expected binary
//! path it is used as is, however old it is. Otherwise the build directory is
//! created and the configured steps run in order. A build counts as successful
//! only if every step exits with 0 *and* the binary exists afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use super::config::HarnessConfig;
use super::error::{HarnessError, HarnessResult};
use super::interfaces::CommandRunner;

/// A converter binary known to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryHandle {
    path: PathBuf,
}

impl BinaryHandle {
    /// Handle to `path` if a file exists there.
    pub fn existing(path: &Path) -> Option<Self> {
        path.is_file().then(|| Self { path: path.to_path_buf() })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// How the binary was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Already present, nothing ran
    Cached,
    Built,
}

pub struct BuildOrchestrator<'a, R: CommandRunner> {
    config: &'a HarnessConfig,
    runner: R,
}

impl<'a, R: CommandRunner> BuildOrchestrator<'a, R> {
    pub fn new(config: &'a HarnessConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Return a handle to the configured binary, building it first if absent.
    ///
    /// `on_build_start` is called with the expected binary path only when a
    /// build actually starts.
    #[tracing::instrument(skip_all, fields(binary = %self.config.binary.display()))]
    pub fn ensure_binary(&self, on_build_start: impl FnOnce(&Path)) -> HarnessResult<(BinaryHandle, BuildOutcome)> {
        let expected = &self.config.binary;
        if let Some(handle) = BinaryHandle::existing(expected) {
            tracing::debug!("binary present, skipping build");
            return Ok((handle, BuildOutcome::Cached));
        }
        on_build_start(expected);

        let build_dir = &self.config.build_dir;
        fs::create_dir_all(build_dir)?;

        for step in &self.config.build_steps {
            tracing::debug!(step = %step.name, program = ?step.program, "running build step");
            let exit_code = self
                .runner
                .run(&step.program, &step.args, build_dir)
                .map_err(|source| HarnessError::Spawn {
                    program: PathBuf::from(&step.program),
                    source,
                })?;

            if exit_code != 0 {
                return Err(HarnessError::BuildFailure {
                    step: step.name.clone(),
                    exit_code,
                    build_dir: build_dir.clone(),
                });
            }
        }

        // Both steps can exit 0 without producing the binary.
        let handle = BinaryHandle::existing(expected).ok_or_else(|| HarnessError::BinaryMissing {
            path: expected.clone(),
        })?;
        Ok((handle, BuildOutcome::Built))
    }
}
