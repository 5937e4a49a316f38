//! Perceptual similarity scoring
//!
//! Both images are decoded with the `image` crate, reduced to luma and handed
//! to a [`SimilarityAlgorithm`]. The raw score is normalized into `[0, 1]`
//! and compared against the configured threshold.

use std::path::Path;

use image::{GrayImage, ImageReader};

use super::error::ScoringError;
use super::interfaces::SimilarityAlgorithm;

/// A normalized similarity score and its verdict
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScore {
    /// Always within `[0, 1]`
    pub value: f64,
    pub threshold: f64,
}

impl SimilarityScore {
    pub fn new(value: f64, threshold: f64) -> Self {
        Self { value, threshold }
    }

    pub fn passed(&self) -> bool {
        self.value >= self.threshold
    }

    pub fn percent(&self) -> f64 {
        self.value * 100.0
    }
}

/// Clamp a finite score into `[0, 1]`. Non-finite scores mean the
/// algorithm misbehaved and are rejected.
pub fn normalize_score(raw: f64) -> Result<f64, ScoringError> {
    if !raw.is_finite() {
        return Err(ScoringError::NonFinite(raw));
    }
    Ok(raw.clamp(0.0, 1.0))
}

pub struct SimilarityScorer<A: SimilarityAlgorithm> {
    algorithm: A,
    threshold: f64,
}

impl<A: SimilarityAlgorithm> SimilarityScorer<A> {
    pub fn new(algorithm: A, threshold: f64) -> Self {
        Self { algorithm, threshold }
    }

    /// Score `converted` against `reference`.
    ///
    /// When `heatmap` is given, the similarity map is saved there for human
    /// inspection. Failing to save it is logged and otherwise ignored.
    #[tracing::instrument(skip_all, fields(reference = %reference.display()))]
    pub fn score(
        &self,
        reference: &Path,
        converted: &Path,
        heatmap: Option<&Path>,
    ) -> Result<SimilarityScore, ScoringError> {
        let reference_img = decode_luma(reference)?;
        let converted_img = decode_luma(converted)?;

        if reference_img.dimensions() != converted_img.dimensions() {
            return Err(ScoringError::DimensionMismatch {
                reference: reference_img.dimensions(),
                converted: converted_img.dimensions(),
            });
        }

        let comparison = self
            .algorithm
            .compare(&reference_img, &converted_img, heatmap.is_some())?;
        let value = normalize_score(comparison.score)?;
        tracing::debug!(raw = comparison.score, value, "scored");

        if let (Some(path), Some(map)) = (heatmap, comparison.heatmap) {
            if let Err(e) = save_heatmap(path, &map) {
                tracing::warn!(path = %path.display(), error = %e, "could not save heatmap");
            }
        }

        Ok(SimilarityScore::new(value, self.threshold))
    }
}

/// Decode by content rather than extension; converters are free to pick
/// whatever file name suffix they were given.
fn decode_luma(path: &Path) -> Result<GrayImage, ScoringError> {
    let decode_err = |source| ScoringError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let image = ImageReader::open(path)
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_err)?;
    Ok(image.to_luma8())
}

fn save_heatmap(path: &Path, map: &image::DynamicImage) -> image::ImageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    map.to_rgb8().save(path)
}
