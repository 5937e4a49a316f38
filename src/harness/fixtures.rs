//! Fixture discovery and pairing
//!
//! Positive fixtures pair a `.heic` input with a trusted reference image.
//! Three pairing strategies are supported (see [`PairingStrategy`]):
//!
//! - **ref-suffix**: `leaf.heic` + `leaf_ref.jpg`
//! - **same-stem**: `leaf.heic` + `leaf.jpg`
//! - **positional**: the sorted input listing is zipped with the sorted
//!   reference listing. Nothing checks that the two listings correspond; a
//!   missing or extra file on either side shifts every later pair.
//!
//! Basename pairing silently drops orphans (an input without a reference or a
//! reference without an input). That is an inclusion filter applied before
//! anything runs, not a skip.
//!
//! Output is always sorted by id, so repeated discovery over an unchanged
//! directory yields the same list.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::config::{HarnessConfig, INPUT_EXTENSION, PairingStrategy};
use super::error::{HarnessError, HarnessResult};

/// Whether a fixture must convert cleanly or must be rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    Positive,
    Negative,
}

/// A discovered test asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFixture {
    pub id: String,
    pub input_path: PathBuf,
    /// Always `None` for negative fixtures
    pub reference_path: Option<PathBuf>,
    pub kind: FixtureKind,
}

impl TestFixture {
    pub fn positive(id: impl Into<String>, input_path: PathBuf, reference_path: PathBuf) -> Self {
        Self {
            id: id.into(),
            input_path,
            reference_path: Some(reference_path),
            kind: FixtureKind::Positive,
        }
    }

    pub fn negative(id: impl Into<String>, input_path: PathBuf) -> Self {
        Self {
            id: id.into(),
            input_path,
            reference_path: None,
            kind: FixtureKind::Negative,
        }
    }

    /// File name of the input, for display.
    pub fn input_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Discovers fixtures for one configuration
pub struct FixtureRegistry<'a> {
    config: &'a HarnessConfig,
}

impl<'a> FixtureRegistry<'a> {
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    /// Discover positive fixtures using the configured pairing strategy.
    #[tracing::instrument(skip_all, fields(pairing = self.config.pairing.as_str()))]
    pub fn discover(&self) -> HarnessResult<Vec<TestFixture>> {
        let fixtures = match self.config.pairing {
            PairingStrategy::RefSuffix | PairingStrategy::SameStem => self.pair_by_basename()?,
            PairingStrategy::Positional => self.pair_by_position()?,
        };
        ensure_unique_ids(&fixtures)?;
        tracing::debug!(count = fixtures.len(), "discovered positive fixtures");
        Ok(fixtures)
    }

    /// Discover negative fixtures. Empty when no negatives directory is configured.
    #[tracing::instrument(skip_all)]
    pub fn discover_negatives(&self) -> HarnessResult<Vec<TestFixture>> {
        let Some(dir) = &self.config.negatives_dir else {
            return Ok(Vec::new());
        };

        let fixtures: Vec<TestFixture> = list_files(dir)?
            .into_iter()
            .map(|name| TestFixture::negative(name.clone(), dir.join(name)))
            .collect();
        tracing::debug!(count = fixtures.len(), "discovered negative fixtures");
        Ok(fixtures)
    }

    fn pair_by_basename(&self) -> HarnessResult<Vec<TestFixture>> {
        let fixtures_dir = &self.config.fixtures_dir;
        let reference_dir = self.config.reference_root();

        let inputs: HashSet<String> = list_files(fixtures_dir)?.into_iter().collect();
        let references: HashSet<String> = if reference_dir == fixtures_dir.as_path() {
            inputs.clone()
        } else {
            list_files(reference_dir)?.into_iter().collect()
        };

        let basenames: BTreeSet<String> = inputs.iter().map(|name| file_stem(name)).collect();

        let mut fixtures = Vec::new();
        for stem in basenames {
            let input_name = format!("{stem}.{INPUT_EXTENSION}");
            let Some(reference_name) = self.config.pairing.reference_name(&stem) else {
                continue;
            };
            if inputs.contains(&input_name) && references.contains(&reference_name) {
                fixtures.push(TestFixture::positive(
                    stem,
                    fixtures_dir.join(input_name),
                    reference_dir.join(reference_name),
                ));
            } else if inputs.contains(&input_name) {
                tracing::debug!(input = %input_name, "no reference, excluded");
            }
        }
        Ok(fixtures)
    }

    fn pair_by_position(&self) -> HarnessResult<Vec<TestFixture>> {
        let fixtures_dir = &self.config.fixtures_dir;
        // Listing one directory twice would pair every file with itself.
        let reference_dir = match self.config.references_dir.as_deref() {
            Some(dir) if dir != fixtures_dir.as_path() => dir,
            _ => {
                return Err(HarnessError::PositionalReferences {
                    fixtures_dir: fixtures_dir.clone(),
                });
            }
        };

        let inputs = list_files(fixtures_dir)?;
        let references = list_files(reference_dir)?;

        if inputs.len() != references.len() {
            tracing::warn!(
                inputs = inputs.len(),
                references = references.len(),
                "positional pairing over directories of different sizes; unmatched entries are dropped"
            );
        }

        let mut fixtures: Vec<TestFixture> = inputs
            .into_iter()
            .zip(references)
            .map(|(input, reference)| {
                TestFixture::positive(file_stem(&input), fixtures_dir.join(&input), reference_dir.join(reference))
            })
            .collect();
        // Ids are stems of an already sorted listing, but `a.heic` / `a-b.heic`
        // style names can sort differently once the extension is gone.
        fixtures.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(fixtures)
    }
}

/// Sorted names of the regular, non-hidden files directly inside `dir`.
pub fn list_files(dir: &Path) -> HarnessResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|source| HarnessError::Discovery {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| HarnessError::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.path().is_file() {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// File name minus its last extension.
fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Fail on the first id that appears twice.
pub fn ensure_unique_ids<'f>(fixtures: impl IntoIterator<Item = &'f TestFixture>) -> HarnessResult<()> {
    let mut seen = HashSet::new();
    for fixture in fixtures {
        if !seen.insert(fixture.id.as_str()) {
            return Err(HarnessError::DuplicateFixtureId(fixture.id.clone()));
        }
    }
    Ok(())
}
