//! Test helpers for laying out CLI workspaces and reading bulk output.

use std::fs;

use base64::{Engine as _, engine::general_purpose};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tempfile::TempDir;

/// A temporary directory with a UTF-8 path.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn output_dir(&self) -> Utf8PathBuf {
        self.root.join("bulk")
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").field("root", &self.root).finish()
    }
}

/// A fixture shared with the data crate's tests.
pub(super) fn fixture_path(name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../kartlag-data/tests/fixtures")
        .join(name)
}

/// Decode the base64 PBF fixture `{stem}.osm.pbf.b64` into `workspace`.
pub(super) fn decode_pbf_fixture(workspace: &Utf8Path, stem: &str) -> Utf8PathBuf {
    let encoded = fs::read_to_string(fixture_path(&format!("{stem}.osm.pbf.b64")))
        .expect("read base64 fixture");
    let cleaned: String = encoded
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    let decoded = general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .expect("decode base64 fixture");
    let path = workspace.join(format!("{stem}.osm.pbf"));
    write_utf8(&path, &decoded);
    path
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path, contents).unwrap_or_else(|err| panic!("failed to write {path}: {err}"));
}

/// Parse every line of a bulk file as JSON.
pub(super) fn read_bulk(path: &Utf8Path) -> Vec<Value> {
    let text =
        fs::read_to_string(path).unwrap_or_else(|err| panic!("failed to read {path}: {err}"));
    text.lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect()
}

/// Document bodies of a bulk file, skipping the action headers.
pub(super) fn bodies(path: &Utf8Path) -> Vec<Value> {
    read_bulk(path).into_iter().skip(1).step_by(2).collect()
}
