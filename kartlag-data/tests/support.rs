//! Shared helpers for the behavioural tests.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::{fs, io::Write};

use base64::{Engine as _, engine::general_purpose};
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, TempPath};

/// Epsilon for coordinate comparisons.
const COORDINATE_EPSILON: f64 = 1.0e-7;

/// Directory holding the fixture files.
pub fn fixtures_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Decode `{stem}{suffix}.b64` into a temporary file ending in `suffix`.
pub fn decode_fixture(dir: &Utf8Path, stem: &str, suffix: &str) -> TempPath {
    let encoded_path = dir.join(format!("{stem}{suffix}.b64"));
    let encoded = fs::read_to_string(&encoded_path)
        .unwrap_or_else(|err| panic!("failed to read base64 fixture {encoded_path}: {err}"));
    let cleaned: String = encoded
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    let decoded = general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .unwrap_or_else(|err| panic!("failed to decode base64 fixture {encoded_path}: {err}"));
    let mut tempfile = Builder::new()
        .prefix(stem)
        .suffix(suffix)
        .tempfile()
        .unwrap_or_else(|err| panic!("failed to create temporary fixture for {stem}: {err}"));
    tempfile
        .write_all(&decoded)
        .unwrap_or_else(|err| panic!("failed to write decoded fixture for {stem}: {err}"));
    tempfile
        .flush()
        .unwrap_or_else(|err| panic!("failed to flush decoded fixture for {stem}: {err}"));
    tempfile.into_temp_path()
}

/// UTF-8 view of a temporary path.
pub fn utf8_path(path: &TempPath) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf())
        .unwrap_or_else(|path| panic!("temporary path {path:?} is not UTF-8"))
}

/// Compare coordinates within a small epsilon.
pub fn assert_close(actual: f64, expected: f64) {
    let delta = (actual - expected).abs();
    assert!(
        delta <= COORDINATE_EPSILON,
        "expected {expected}, got {actual} (|Δ| = {delta})"
    );
}

/// Read the `Scenario:` titles of a feature file in order.
pub fn scenario_titles(feature: &str) -> Vec<String> {
    let path = Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(feature);
    let contents = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read feature file {path}: {err}"));
    contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .map(str::to_owned)
        .collect()
}
