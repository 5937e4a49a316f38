//! Integration tests for the harness library surface
//!
//! These drive `Driver` through its public seams: a converter implemented
//! outside the crate, the real SSIM scorer and the JSON reporter.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use heic_harness::harness::interfaces::Converter;
use heic_harness::harness::{
    Driver, FailurePolicy, FixtureOutcome, HarnessConfig, HarnessError, JsonReporter, PairingStrategy, RunOutcome,
    RunPhase,
};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

/// Renders the reference for an input, with every channel shifted by
/// `offset`. Inputs hold the path of the image to render.
struct RenderingConverter {
    offset: u8,
}

impl Converter for RenderingConverter {
    fn convert(&self, _binary: &Path, input: &Path, output: &Path) -> io::Result<i32> {
        let source = PathBuf::from(fs::read_to_string(input)?.trim());
        let Ok(image) = image::open(&source) else {
            return Ok(1);
        };
        let mut rgb = image.to_rgb8();
        for pixel in rgb.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = channel.saturating_add(self.offset);
            }
        }
        rgb.save_with_format(output, image::ImageFormat::Png)
            .map_err(io::Error::other)?;
        Ok(0)
    }
}

fn gradient(seed: u32) -> RgbImage {
    RgbImage::from_fn(48, 48, |x, y| Rgb([((x * 5 + seed) % 256) as u8, ((y * 5) % 256) as u8, 90]))
}

/// `root/fixtures/<name>.jpg` references with `<name>.heic` inputs pointing at them.
fn layout(names: &[&str]) -> (TempDir, HarnessConfig) {
    let tmp = TempDir::new().unwrap();
    let fixtures = tmp.path().join("fixtures");
    fs::create_dir_all(&fixtures).unwrap();
    for (seed, name) in names.iter().enumerate() {
        let reference = fixtures.join(format!("{name}.jpg"));
        gradient(seed as u32 * 17).save(&reference).unwrap();
        fs::write(fixtures.join(format!("{name}.heic")), reference.display().to_string()).unwrap();
    }
    let binary = tmp.path().join("tifig");
    fs::write(&binary, b"").unwrap();

    let config = HarnessConfig::new(tmp.path())
        .with_binary(&binary)
        .with_pairing(PairingStrategy::SameStem)
        .with_output_extension("tiff");
    (tmp, config)
}

fn json_lines(bytes: Vec<u8>) -> Vec<serde_json::Value> {
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_faithful_conversion_passes_with_real_ssim() {
    let (_tmp, config) = layout(&["beach", "forest"]);
    let mut reporter = JsonReporter::new(Vec::new());

    let run = Driver::new(&config)
        .with_converter(RenderingConverter { offset: 0 })
        .run(&mut reporter);

    assert_eq!(run.outcome(), RunOutcome::Pass);
    assert_eq!(run.phase(), RunPhase::Passed);
    assert_eq!(run.summary().passed, 2);
    for report in run.fixtures() {
        match &report.outcome {
            FixtureOutcome::Similar(score) => assert!(score.value > 0.99, "{}: {}", report.fixture.id, score.value),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    let events = json_lines(reporter.into_inner());
    assert_eq!(events.first().unwrap()["event"], "run_start");
    assert_eq!(events.first().unwrap()["pairing"], "same-stem");
    assert_eq!(events.last().unwrap()["outcome"], "pass");
}

#[test]
fn test_raised_threshold_fails_every_shifted_fixture_with_keep_going() {
    let (_tmp, config) = layout(&["beach", "forest", "snow"]);
    let config = config.with_threshold(1.0).with_policy(FailurePolicy::KeepGoing);
    let mut reporter = JsonReporter::new(Vec::new());

    let run = Driver::new(&config)
        .with_converter(RenderingConverter { offset: 40 })
        .run(&mut reporter);

    assert_eq!(run.outcome(), RunOutcome::Fail);
    assert_eq!(run.exit_code(), 1);
    let failed: Vec<&str> = run.failures().map(|(fixture, _)| fixture.id.as_str()).collect();
    assert_eq!(failed, ["beach", "forest", "snow"]);
    assert!(
        run.failures()
            .all(|(_, err)| matches!(err, HarnessError::SimilarityBelowThreshold { .. }))
    );
    assert_eq!(run.failing_fixture_id(), Some("beach"));
    assert_eq!(run.summary().not_run, 0);

    // Failed conversions are left behind for inspection.
    assert!(config.converted_path("beach").is_file());
}

#[test]
fn test_unreadable_input_is_conversion_failure() {
    let (tmp, config) = layout(&["beach"]);
    fs::write(tmp.path().join("fixtures").join("beach.heic"), "/nonexistent.jpg").unwrap();
    let mut reporter = JsonReporter::new(Vec::new());

    let run = Driver::new(&config)
        .with_converter(RenderingConverter { offset: 0 })
        .run(&mut reporter);

    assert!(matches!(
        run.first_error(),
        Some(HarnessError::ConversionFailure { exit_code: 1, .. })
    ));
    let events = json_lines(reporter.into_inner());
    let fixture = events.iter().find(|e| e["event"] == "fixture").unwrap();
    assert_eq!(fixture["error"]["kind"], "ConversionFailure");
}

#[test]
fn test_heatmaps_saved_per_fixture() {
    let (tmp, config) = layout(&["beach"]);
    let maps = tmp.path().join("maps");
    let config = config.with_heatmap_dir(&maps);
    let mut reporter = JsonReporter::new(Vec::new());

    let run = Driver::new(&config)
        .with_converter(RenderingConverter { offset: 0 })
        .run(&mut reporter);

    assert_eq!(run.outcome(), RunOutcome::Pass);
    assert!(maps.join("beach_heatmap.png").is_file());
}
