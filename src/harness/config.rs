//! Harness configuration
//!
//! A single immutable [`HarnessConfig`] is built at startup and threaded by
//! reference into every component. All paths it hands out are absolute,
//! resolved against the anchor directory, so no component depends on the
//! process working directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Minimum similarity a converted image must reach against its reference.
pub const SIMILARITY_THRESHOLD: f64 = 0.90;

/// Extension of converter inputs.
pub const INPUT_EXTENSION: &str = "heic";

/// How positive fixtures are paired with their references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingStrategy {
    /// `<name>.heic` pairs with `<name>_ref.jpg`
    #[default]
    RefSuffix,
    /// `<name>.heic` pairs with `<name>.jpg`
    SameStem,
    /// Sorted inputs pair with sorted references by index
    Positional,
}

impl PairingStrategy {
    /// Reference file name for a base name, for the basename strategies.
    pub fn reference_name(self, stem: &str) -> Option<String> {
        match self {
            PairingStrategy::RefSuffix => Some(format!("{stem}_ref.jpg")),
            PairingStrategy::SameStem => Some(format!("{stem}.jpg")),
            PairingStrategy::Positional => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PairingStrategy::RefSuffix => "ref-suffix",
            PairingStrategy::SameStem => "same-stem",
            PairingStrategy::Positional => "positional",
        }
    }
}

/// What the driver does after a fixture fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failure
    #[default]
    FailFast,
    /// Run every fixture and report all failures at the end
    KeepGoing,
}

/// One external build command, spawned with the build directory as its
/// working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    /// Short label used in diagnostics (`configure`, `compile`)
    pub name: String,
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl BuildStep {
    pub fn new(name: impl Into<String>, program: impl Into<OsString>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Harness configuration
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Anchor directory every relative path is resolved against
    pub root: PathBuf,
    /// Directory holding the compiled converter
    pub build_dir: PathBuf,
    /// Converter binary; defaults to `build_dir/binary_name`
    pub binary: PathBuf,
    /// Paired positive fixtures
    pub fixtures_dir: PathBuf,
    /// Separate reference directory. Required for positional pairing;
    /// optional for basename pairing with references stored elsewhere
    pub references_dir: Option<PathBuf>,
    /// Inputs the converter must reject
    pub negatives_dir: Option<PathBuf>,
    /// Where converted images are written before scoring
    pub scratch_dir: PathBuf,
    /// Where similarity heatmaps are saved, if anywhere
    pub heatmap_dir: Option<PathBuf>,
    pub pairing: PairingStrategy,
    pub policy: FailurePolicy,
    /// Extension of converted outputs (`png`, `tiff`)
    pub output_extension: String,
    pub threshold: f64,
    /// Configure step followed by compile step
    pub build_steps: Vec<BuildStep>,
}

impl HarnessConfig {
    /// Create a config with the default layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let build_dir = root.join("build");
        Self {
            binary: build_dir.join("tifig"),
            build_steps: default_build_steps(&root, "cmake", "make"),
            fixtures_dir: root.join("fixtures"),
            references_dir: None,
            negatives_dir: None,
            scratch_dir: root.join("target").join("heic-harness"),
            heatmap_dir: None,
            pairing: PairingStrategy::default(),
            policy: FailurePolicy::default(),
            output_extension: "png".to_string(),
            threshold: SIMILARITY_THRESHOLD,
            build_dir,
            root,
        }
    }

    /// Make every path absolute against `root`.
    ///
    /// `root` itself is made absolute against `cwd` first.
    pub fn resolve(mut self, cwd: &Path) -> Self {
        self.root = absolutize(cwd, &self.root);
        let root = self.root.clone();
        self.build_dir = absolutize(&root, &self.build_dir);
        self.binary = absolutize(&root, &self.binary);
        self.fixtures_dir = absolutize(&root, &self.fixtures_dir);
        self.references_dir = self.references_dir.map(|p| absolutize(&root, &p));
        self.negatives_dir = self.negatives_dir.map(|p| absolutize(&root, &p));
        self.scratch_dir = absolutize(&root, &self.scratch_dir);
        self.heatmap_dir = self.heatmap_dir.map(|p| absolutize(&root, &p));
        self
    }

    pub fn with_build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = dir.into();
        self
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = dir.into();
        self
    }

    pub fn with_references_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.references_dir = Some(dir.into());
        self
    }

    pub fn with_negatives_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.negatives_dir = Some(dir.into());
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_heatmap_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.heatmap_dir = Some(dir.into());
        self
    }

    pub fn with_pairing(mut self, pairing: PairingStrategy) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_output_extension(mut self, ext: impl Into<String>) -> Self {
        self.output_extension = ext.into();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_build_steps(mut self, steps: Vec<BuildStep>) -> Self {
        self.build_steps = steps;
        self
    }

    /// Directory basename pairing looks references up in.
    pub fn reference_root(&self) -> &Path {
        self.references_dir.as_deref().unwrap_or(&self.fixtures_dir)
    }

    /// Scratch output path for a positive fixture.
    pub fn converted_path(&self, fixture_id: &str) -> PathBuf {
        self.scratch_dir
            .join(format!("{}_converted.{}", fixture_id, self.output_extension))
    }

    /// Shared scratch output path for every negative fixture.
    pub fn negative_scratch_path(&self) -> PathBuf {
        self.scratch_dir
            .join(format!("negative_output.{}", self.output_extension))
    }

    pub fn heatmap_path(&self, fixture_id: &str) -> Option<PathBuf> {
        self.heatmap_dir
            .as_ref()
            .map(|dir| dir.join(format!("{fixture_id}_heatmap.png")))
    }
}

/// `cmake <source_dir>` then `make`.
pub fn default_build_steps(
    source_dir: &Path,
    cmake: impl Into<OsString>,
    make: impl Into<OsString>,
) -> Vec<BuildStep> {
    vec![
        BuildStep::new("configure", cmake).arg(source_dir.as_os_str()),
        BuildStep::new("compile", make),
    ]
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = HarnessConfig::new("/work");
        assert_eq!(config.build_dir, PathBuf::from("/work/build"));
        assert_eq!(config.binary, PathBuf::from("/work/build/tifig"));
        assert_eq!(config.fixtures_dir, PathBuf::from("/work/fixtures"));
        assert_eq!(config.threshold, SIMILARITY_THRESHOLD);
        assert_eq!(config.pairing, PairingStrategy::RefSuffix);
        assert_eq!(config.policy, FailurePolicy::FailFast);
    }

    #[test]
    fn test_default_build_steps() {
        let config = HarnessConfig::new("/work");
        assert_eq!(config.build_steps.len(), 2);
        assert_eq!(config.build_steps[0].name, "configure");
        assert_eq!(config.build_steps[0].program, OsString::from("cmake"));
        assert_eq!(config.build_steps[0].args, vec![OsString::from("/work")]);
        assert_eq!(config.build_steps[1].name, "compile");
        assert!(config.build_steps[1].args.is_empty());
    }

    #[test]
    fn test_resolve_makes_paths_absolute() {
        let config = HarnessConfig::new("project")
            .with_fixtures_dir("assets")
            .with_negatives_dir("assets/bad")
            .with_binary("/opt/tifig")
            .resolve(Path::new("/home/ci"));

        assert_eq!(config.root, PathBuf::from("/home/ci/project"));
        assert_eq!(config.fixtures_dir, PathBuf::from("/home/ci/project/assets"));
        assert_eq!(config.negatives_dir, Some(PathBuf::from("/home/ci/project/assets/bad")));
        assert_eq!(config.binary, PathBuf::from("/opt/tifig"));
        assert!(config.scratch_dir.is_absolute());
    }

    #[test]
    fn test_reference_names() {
        assert_eq!(PairingStrategy::RefSuffix.reference_name("leaf").as_deref(), Some("leaf_ref.jpg"));
        assert_eq!(PairingStrategy::SameStem.reference_name("leaf").as_deref(), Some("leaf.jpg"));
        assert_eq!(PairingStrategy::Positional.reference_name("leaf"), None);
    }

    #[test]
    fn test_reference_root_falls_back_to_fixtures() {
        let config = HarnessConfig::new("/work");
        assert_eq!(config.reference_root(), Path::new("/work/fixtures"));

        let config = config.with_references_dir("/refs");
        assert_eq!(config.reference_root(), Path::new("/refs"));
    }

    #[test]
    fn test_scratch_paths_use_output_extension() {
        let config = HarnessConfig::new("/work").with_output_extension("tiff");
        assert_eq!(
            config.converted_path("cat"),
            PathBuf::from("/work/target/heic-harness/cat_converted.tiff")
        );
        assert_eq!(
            config.negative_scratch_path(),
            PathBuf::from("/work/target/heic-harness/negative_output.tiff")
        );
        assert_eq!(config.heatmap_path("cat"), None);
    }
}
