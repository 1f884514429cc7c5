//! Shared fixture and scratch-file helpers for workspace tests.

use std::fs;
use std::path::{Path, PathBuf};

/// Resolve the workspace root path.
pub fn workspace_root() -> PathBuf {
	let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
	manifest_dir
		.join("..")
		.join("..")
		.canonicalize()
		.unwrap_or_else(|_| manifest_dir.join("..").join(".."))
}

/// Resolve a memory-image fixture under `<workspace>/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
	workspace_root().join("fixtures").join(name)
}

/// Parse a fixture as JSON.
///
/// Panics when the fixture is missing or malformed; only meant for tests.
pub fn fixture_json(name: &str) -> serde_json::Value {
	let path = fixture_path(name);
	let bytes = fs::read(&path).unwrap_or_else(|err| panic!("read fixture {}: {err}", path.display()));
	serde_json::from_slice(&bytes).unwrap_or_else(|err| panic!("parse fixture {}: {err}", path.display()))
}

/// Resolve the workspace target directory.
pub fn target_dir() -> PathBuf {
	std::env::var_os("CARGO_TARGET_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|| workspace_root().join("target"))
}

/// Write a scratch image under the target directory and return its path.
///
/// `name` should be unique per test so parallel tests do not collide.
pub fn scratch_image(name: &str, image: &serde_json::Value) -> PathBuf {
	let dir = target_dir().join("varcodec-scratch");
	fs::create_dir_all(&dir).unwrap_or_else(|err| panic!("create {}: {err}", dir.display()));
	let path = dir.join(name);
	let text = serde_json::to_vec_pretty(image).unwrap_or_else(|err| panic!("render {name}: {err}"));
	fs::write(&path, text).unwrap_or_else(|err| panic!("write {}: {err}", path.display()));
	path
}
