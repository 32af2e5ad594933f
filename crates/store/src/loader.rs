//! Retrying bootstrap of the shared collection.
//!
//! [`BootstrapLoader::start`] drives `Uninitialized | Failed -> Loading ->
//! Loaded | Failed`. The fetch runs under a [`RetryPolicy`]; the loaded
//! contents are applied on the owning context, after which a best-effort
//! export is spawned onto the loader's task tracker so [`BootstrapLoader::stop`]
//! can wait for it.

use std::path::PathBuf;
use std::sync::Arc;

use aviary_worker::{RetryOutcome, RetryPolicy, ThreadMarshal, retry, run_on_owner};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::collection::SharedCollection;
use crate::ports::{Exporter, Fetch, NoopNotifier, Notifier, PathProvider};
use crate::record::Record;
use crate::state::LoadState;

/// Export settings applied after each successful load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
	pub enabled: bool,
	/// Base file name handed to the [`PathProvider`].
	pub base_name: String,
	pub extension: String,
}

impl Default for ExportConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			base_name: "records".to_string(),
			extension: "json".to_string(),
		}
	}
}

/// Loader settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
	pub retry: RetryPolicy,
	/// Plural noun used in user-facing messages ("Loaded 3 birds").
	pub label: String,
	pub export: ExportConfig,
}

impl Default for LoaderConfig {
	fn default() -> Self {
		Self {
			retry: RetryPolicy::default(),
			label: "records".to_string(),
			export: ExportConfig::default(),
		}
	}
}

/// Result of one [`BootstrapLoader::start`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
	/// Contents were replaced and the collection entered `Loaded`.
	Loaded { count: usize, attempts: usize },
	/// Retries were exhausted, or the contents could not be applied.
	Failed { attempts: usize, error: String },
	/// The token fired first. State is left where it was.
	Cancelled,
}

impl LoadOutcome {
	pub fn is_loaded(&self) -> bool {
		matches!(self, Self::Loaded { .. })
	}
}

struct ExportSink<R: Record> {
	exporter: Arc<dyn Exporter<R>>,
	paths: Arc<dyn PathProvider>,
}

/// Populates a [`SharedCollection`] from a [`Fetch`] source.
pub struct BootstrapLoader<R: Record> {
	collection: Arc<SharedCollection<R>>,
	fetch: Arc<dyn Fetch<R>>,
	marshal: Arc<dyn ThreadMarshal>,
	notifier: Arc<dyn Notifier>,
	export: Option<ExportSink<R>>,
	config: LoaderConfig,
	tasks: TaskTracker,
}

impl<R: Record> std::fmt::Debug for BootstrapLoader<R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BootstrapLoader")
			.field("collection", &self.collection)
			.field("config", &self.config)
			.field("exports", &self.export.is_some())
			.field("tasks", &self.tasks.len())
			.finish()
	}
}

impl<R: Record> BootstrapLoader<R> {
	/// Creates a loader with no notifier, no exporter and default settings.
	pub fn new(collection: Arc<SharedCollection<R>>, fetch: Arc<dyn Fetch<R>>, marshal: Arc<dyn ThreadMarshal>) -> Self {
		Self {
			collection,
			fetch,
			marshal,
			notifier: Arc::new(NoopNotifier),
			export: None,
			config: LoaderConfig::default(),
			tasks: TaskTracker::new(),
		}
	}

	#[must_use]
	pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = notifier;
		self
	}

	/// Exports each freshly loaded snapshot to the path `paths` resolves.
	#[must_use]
	pub fn with_exporter(mut self, exporter: Arc<dyn Exporter<R>>, paths: Arc<dyn PathProvider>) -> Self {
		self.export = Some(ExportSink { exporter, paths });
		self
	}

	#[must_use]
	pub fn with_config(mut self, config: LoaderConfig) -> Self {
		self.config = config;
		self
	}

	pub fn collection(&self) -> &Arc<SharedCollection<R>> {
		&self.collection
	}

	pub fn marshal(&self) -> &Arc<dyn ThreadMarshal> {
		&self.marshal
	}

	pub fn notifier(&self) -> &Arc<dyn Notifier> {
		&self.notifier
	}

	/// Loads the collection, retrying the fetch per the configured policy.
	///
	/// Always starts a fresh load, even while another one runs. A token that
	/// is already cancelled makes this a no-op. The call is tracked so
	/// [`Self::stop`] waits for it.
	pub async fn start(&self, cancel: &CancellationToken) -> LoadOutcome {
		self.tasks
			.track_future(async {
				if cancel.is_cancelled() {
					tracing::debug!("store.load.skipped");
					return LoadOutcome::Cancelled;
				}
				self.collection.set_state(LoadState::Loading);
				self.load(cancel).await
			})
			.await
	}

	/// Like [`Self::start`], but only when the collection is `Uninitialized`
	/// or `Failed`.
	///
	/// Returns `None` without fetching when another load is running or has
	/// already succeeded; callers then wait on the collection instead.
	pub async fn start_if_idle(&self, cancel: &CancellationToken) -> Option<LoadOutcome> {
		self.tasks
			.track_future(async {
				if cancel.is_cancelled() {
					tracing::debug!("store.load.skipped");
					return Some(LoadOutcome::Cancelled);
				}
				if !self.collection.begin_load() {
					tracing::debug!(state = %self.collection.state(), "store.load.already_running");
					return None;
				}
				Some(self.load(cancel).await)
			})
			.await
	}

	/// Waits for in-flight loads and exports without cancelling them.
	///
	/// Work started afterwards is still tracked, so the loader stays usable.
	pub async fn stop(&self) {
		self.tasks.close();
		tracing::debug!(pending = self.tasks.len(), "store.load.stopping");
		self.tasks.wait().await;
		tracing::debug!("store.load.stopped");
	}

	/// Runs one load; the collection is already `Loading`.
	async fn load(&self, cancel: &CancellationToken) -> LoadOutcome {
		let label = self.config.label.as_str();
		tracing::info!(label, "store.load.start");
		self.notifier.info(&format!("Loading {label}..."));

		let fetch = &self.fetch;
		let outcome = retry(
			&self.config.retry,
			cancel,
			move |attempt| {
				tracing::trace!(attempt, "store.load.attempt");
				fetch.fetch_all(cancel)
			},
			|failed| {
				tracing::warn!(
					attempt = failed.attempt,
					delay_ms = u64::try_from(failed.delay.as_millis()).unwrap_or(u64::MAX),
					error = %failed.error,
					"store.load.attempt_failed"
				);
			},
		)
		.await;

		match outcome {
			RetryOutcome::Succeeded { value, attempts } => self.finish_loaded(value, attempts, cancel).await,
			RetryOutcome::Exhausted { error, attempts } => self.finish_failed(attempts, error.into_message()),
			RetryOutcome::Cancelled { attempts } => {
				tracing::info!(attempts, "store.load.cancelled");
				LoadOutcome::Cancelled
			}
		}
	}

	async fn finish_loaded(&self, items: Vec<R>, attempts: usize, cancel: &CancellationToken) -> LoadOutcome {
		let items = Arc::new(items);
		let count = items.len();

		let collection = Arc::clone(&self.collection);
		let applied = Arc::clone(&items);
		if let Err(error) = run_on_owner(self.marshal.as_ref(), move || collection.complete_load(applied)).await {
			tracing::error!(error = %error, "store.load.apply_failed");
			return self.finish_failed(attempts, error.to_string());
		}

		tracing::info!(count, attempts, "store.load.complete");
		self.notifier.success(&format!("Loaded {count} {}", self.config.label));
		self.spawn_export(items, cancel.clone());
		LoadOutcome::Loaded { count, attempts }
	}

	fn finish_failed(&self, attempts: usize, error: String) -> LoadOutcome {
		self.collection.set_state(LoadState::Failed);
		tracing::error!(attempts, error = %error, "store.load.failed");
		self.notifier
			.error(&format!("Unable to load {} after {attempts} attempt(s): {error}", self.config.label));
		LoadOutcome::Failed { attempts, error }
	}

	fn spawn_export(&self, items: Arc<Vec<R>>, cancel: CancellationToken) {
		let Some(sink) = &self.export else {
			return;
		};
		let settings = &self.config.export;
		if !settings.enabled {
			tracing::debug!("store.export.disabled");
			return;
		}

		let destination: PathBuf = sink.paths.latest_path(&settings.base_name, &settings.extension);
		let exporter = Arc::clone(&sink.exporter);
		self.tasks.spawn(async move {
			match exporter.export(&items, &destination, &cancel).await {
				Ok(()) => tracing::debug!(path = %destination.display(), count = items.len(), "store.export.complete"),
				// Export is best-effort; the load already succeeded.
				Err(error) => tracing::warn!(path = %destination.display(), error = %error, "store.export.failed"),
			}
		});
	}
}
