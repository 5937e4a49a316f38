//! Negative-case validation
//!
//! Inputs in the negatives directory are known to be malformed or
//! unsupported. The converter must reject each one with a nonzero exit code;
//! exiting 0 means it accepted input it should not have, which is a defect in
//! the converter rather than in the harness.

use std::fs;
use std::path::Path;

use super::convert::ConversionRunner;
use super::error::{HarnessError, HarnessResult};
use super::fixtures::{FixtureKind, TestFixture};
use super::interfaces::Converter;

pub struct NegativeCaseValidator<'r, 'a, C: Converter> {
    runner: &'r ConversionRunner<'a, C>,
    scratch_output: &'r Path,
}

impl<'r, 'a, C: Converter> NegativeCaseValidator<'r, 'a, C> {
    /// Every negative conversion writes to the same `scratch_output`.
    pub fn new(runner: &'r ConversionRunner<'a, C>, scratch_output: &'r Path) -> Self {
        Self { runner, scratch_output }
    }

    /// Require that the converter rejects `fixture`. Returns the exit code it
    /// rejected with.
    pub fn validate(&self, fixture: &TestFixture) -> HarnessResult<i32> {
        debug_assert_eq!(fixture.kind, FixtureKind::Negative);

        let result = self
            .runner
            .convert(&fixture.id, &fixture.input_path, self.scratch_output)?;
        self.discard_output();

        if result.succeeded() {
            return Err(HarnessError::NegativeCaseRegression {
                fixture: fixture.id.clone(),
                input: fixture.input_path.clone(),
            });
        }
        Ok(result.exit_code)
    }

    fn discard_output(&self) {
        if self.scratch_output.exists() {
            if let Err(e) = fs::remove_file(self.scratch_output) {
                tracing::debug!(error = %e, "could not remove negative scratch output");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::harness::convert::tests::{FixedConverter, handle};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn negatives() -> Vec<TestFixture> {
        vec![
            TestFixture::negative("corrupt.heic", PathBuf::from("/n/corrupt.heic")),
            TestFixture::negative("empty.heic", PathBuf::from("/n/empty.heic")),
        ]
    }

    #[test]
    fn test_rejection_passes() {
        let tmp = TempDir::new().unwrap();
        let binary = handle("/bin/tifig");
        let converter = FixedConverter::new(1);
        let runner = ConversionRunner::new(&binary, &converter);
        let scratch = tmp.path().join("negative_output.png");

        let validator = NegativeCaseValidator::new(&runner, &scratch);
        for fixture in &negatives() {
            assert_eq!(validator.validate(fixture).unwrap(), 1);
        }

        let calls = converter.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, _, out)| out == &scratch));
    }

    #[test]
    fn test_acceptance_is_regression() {
        let tmp = TempDir::new().unwrap();
        let binary = handle("/bin/tifig");
        let converter = FixedConverter::new(0);
        let runner = ConversionRunner::new(&binary, &converter);
        let scratch = tmp.path().join("negative_output.png");

        let validator = NegativeCaseValidator::new(&runner, &scratch);
        let err = validator.validate(&negatives()[0]).unwrap_err();

        assert!(matches!(err, HarnessError::NegativeCaseRegression { ref fixture, .. } if fixture == "corrupt.heic"));
        assert_eq!(converter.calls.borrow().len(), 1);
    }

    #[test]
    fn test_scratch_output_removed() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("negative_output.png");
        fs::write(&scratch, b"partial").unwrap();

        let binary = handle("/bin/tifig");
        let runner = ConversionRunner::new(&binary, FixedConverter::new(1));
        let code = NegativeCaseValidator::new(&runner, &scratch)
            .validate(&negatives()[0])
            .unwrap();

        assert_eq!(code, 1);
        assert!(!scratch.exists());
    }
}
