//! Application settings.
//!
//! Settings are read from TOML. Every field has a default, so an absent file
//! or a partial one is valid:
//!
//! ```toml
//! data_dir = "/home/me/.local/share/aviary"
//! export_dir = "/home/me/exports"
//!
//! [loader]
//! label = "birds"
//!
//! [loader.retry]
//! kind = "exponential"
//! max_attempts = 4
//! initial_delay_ms = 200
//! max_delay_ms = 5000
//!
//! [loader.export]
//! enabled = true
//! base_name = "birds"
//! extension = "json"
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use aviary_store::{ExportConfig, LoaderConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR: &str = "aviary";
const CONFIG_FILE: &str = "config.toml";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },

	#[error("invalid config {path}: {error}")]
	Parse { path: PathBuf, error: toml::de::Error },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
	/// Directory holding `birds.json`.
	pub data_dir: PathBuf,
	/// Directory receiving the latest export after each load.
	pub export_dir: PathBuf,
	/// Name of the thread that owns the in-memory collection.
	pub owner_thread: String,
	pub loader: LoaderConfig,
}

impl Default for AppConfig {
	fn default() -> Self {
		let data_dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir).join(APP_DIR);
		Self {
			export_dir: data_dir.join("exports"),
			data_dir,
			owner_thread: "aviary-owner".to_string(),
			loader: LoaderConfig {
				label: "birds".to_string(),
				export: ExportConfig {
					base_name: "birds".to_string(),
					..ExportConfig::default()
				},
				..LoaderConfig::default()
			},
		}
	}
}

impl AppConfig {
	/// `<config_dir>/aviary/config.toml`, when the platform has a config dir.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
	}

	/// Reads settings from `path`.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		toml::from_str(&text).map_err(|error| ConfigError::Parse {
			path: path.to_path_buf(),
			error,
		})
	}

	/// Reads settings from `path`, falling back to defaults when it does not
	/// exist.
	pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
		match Self::load(path) {
			Err(ConfigError::Io { error, .. }) if error.kind() == ErrorKind::NotFound => {
				tracing::debug!(path = %path.display(), "config.default");
				Ok(Self::default())
			}
			other => other,
		}
	}

	/// Loads the explicit `path` if given, else the default location.
	///
	/// An explicit path must exist; the default location may be absent.
	pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
		match path {
			Some(path) => Self::load(path),
			None => match Self::default_path() {
				Some(path) => Self::load_or_default(&path),
				None => Ok(Self::default()),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use aviary_worker::RetryPolicy;
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn partial_file_keeps_defaults() {
		let config: AppConfig = toml::from_str(
			r#"
			data_dir = "/srv/birds"

			[loader.retry]
			kind = "fixed"
			max_attempts = 3
			delay_ms = 50
			"#,
		)
		.unwrap();

		assert_eq!(config.data_dir, PathBuf::from("/srv/birds"));
		assert_eq!(
			config.loader.retry,
			RetryPolicy::Fixed {
				max_attempts: 3,
				delay_ms: 50
			}
		);
		assert_eq!(config.loader.label, "birds");
		assert_eq!(config.loader.export.base_name, "birds");
		assert_eq!(config.owner_thread, "aviary-owner");
	}

	#[test]
	fn missing_default_file_uses_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let config = AppConfig::load_or_default(&dir.path().join(CONFIG_FILE)).unwrap();
		assert_eq!(config, AppConfig::default());
	}

	#[test]
	fn explicit_missing_file_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nope.toml");
		assert!(matches!(AppConfig::resolve(Some(&path)), Err(ConfigError::Io { .. })));
	}

	#[test]
	fn malformed_file_reports_path() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join(CONFIG_FILE);
		std::fs::write(&path, "loader = 3").unwrap();

		let err = AppConfig::load(&path).unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
		assert!(err.to_string().contains(CONFIG_FILE));
	}
}
