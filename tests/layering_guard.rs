//! Layering guardrails for the harness crate.
//!
//! - Test tooling (`insta`, `proptest`, `tempfile`) may only be a **dev-dependency**.
//! - Only the CLI may terminate the process; the `harness` module returns values.

use std::fs;
use std::path::Path;

const TEST_ONLY_CRATES: &[&str] = &["insta", "proptest", "tempfile"];

#[test]
fn test_tooling_stays_out_of_main_dependencies() {
    let manifest = include_str!("../Cargo.toml");
    let mut in_dependencies = false;

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        // Track when we enter/exit the `[dependencies]` table.
        if line.starts_with('[') {
            if line == "[dependencies]" {
                in_dependencies = true;
                continue;
            }
            if in_dependencies {
                break;
            }
        }

        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }

        let name = line.split(['=', ' ']).next().unwrap_or("");
        if TEST_ONLY_CRATES.contains(&name) {
            panic!("`{name}` must not appear in [dependencies]; use [dev-dependencies] instead");
        }
    }
}

#[test]
fn harness_module_never_exits_the_process() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join("harness");
    let mut checked = 0;

    for entry in fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_none_or(|ext| ext != "rs") {
            continue;
        }
        let source = fs::read_to_string(&path).unwrap();
        assert!(
            !source.contains("process::exit"),
            "{} calls process::exit; return a HarnessError instead",
            path.display()
        );
        checked += 1;
    }
    assert!(checked > 0, "no sources found under {}", dir.display());
}
