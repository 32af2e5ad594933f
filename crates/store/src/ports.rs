//! Collaborators consumed by the loader and the coordinator.
//!
//! Persistence, command execution, user feedback and export live outside the
//! store. Each is a narrow trait so hosts and tests can plug in their own.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::record::Record;

/// Failure reported by a collaborator.
///
/// The store never inspects the cause; the message is logged and, for
/// rejected commands, handed back to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PortError {
	message: String,
}

impl PortError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn into_message(self) -> String {
		self.message
	}
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
	Info,
	Success,
	Warning,
	Error,
}

impl Level {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Info => "info",
			Self::Success => "success",
			Self::Warning => "warning",
			Self::Error => "error",
		}
	}
}

/// User-facing feedback channel, distinct from the tracing log.
///
/// Fire-and-forget: implementations swallow their own failures.
pub trait Notifier: Send + Sync {
	fn notify(&self, level: Level, message: &str);

	fn info(&self, message: &str) {
		self.notify(Level::Info, message);
	}

	fn success(&self, message: &str) {
		self.notify(Level::Success, message);
	}

	fn warning(&self, message: &str) {
		self.notify(Level::Warning, message);
	}

	fn error(&self, message: &str) {
		self.notify(Level::Error, message);
	}
}

/// Notifier that drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
	fn notify(&self, _level: Level, _message: &str) {}
}

/// Source of the full record set.
#[async_trait]
pub trait Fetch<R: Record>: Send + Sync {
	async fn fetch_all(&self, cancel: &CancellationToken) -> Result<Vec<R>, PortError>;
}

/// Validates and persists one mutation per call.
///
/// The coordinator applies the matching in-memory change only after a call
/// returns `Ok`.
#[async_trait]
pub trait RequestExecutor<R: Record>: Send + Sync {
	type Create: Send + 'static;
	type Update: Send + 'static;

	async fn create(&self, request: Self::Create, cancel: &CancellationToken) -> Result<R, PortError>;

	async fn update(&self, request: Self::Update, cancel: &CancellationToken) -> Result<R, PortError>;

	async fn delete(&self, key: R::Key, cancel: &CancellationToken) -> Result<(), PortError>;
}

/// Writes a snapshot of the records somewhere outside the store.
#[async_trait]
pub trait Exporter<R: Record>: Send + Sync {
	async fn export(&self, records: &[R], destination: &Path, cancel: &CancellationToken) -> Result<(), PortError>;
}

/// Resolves the stable destination an export overwrites.
pub trait PathProvider: Send + Sync {
	fn latest_path(&self, base_name: &str, extension: &str) -> PathBuf;
}
