use std::path::PathBuf;

use aviary_store::PathProvider;

/// Resolves `<dir>/<base>_latest.<ext>`, the same file on every export.
#[derive(Debug, Clone)]
pub struct LatestPathProvider {
	dir: PathBuf,
}

impl LatestPathProvider {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}
}

impl PathProvider for LatestPathProvider {
	fn latest_path(&self, base_name: &str, extension: &str) -> PathBuf {
		let extension = extension.trim_start_matches('.');
		self.dir.join(format!("{base_name}_latest.{extension}"))
	}
}
