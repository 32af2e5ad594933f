#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use aviary_store::{
	BootstrapLoader, ExportConfig, Exporter, Fetch, Level, LoadState, LoaderConfig, Notifier, PathProvider, PortError, Record, RequestExecutor, SharedCollection,
};
use aviary_worker::{InlineMarshal, Job, MarshalError, RetryPolicy, ThreadMarshal};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
	pub id: u32,
	pub label: String,
}

impl Record for Tag {
	type Key = u32;

	fn key(&self) -> u32 {
		self.id
	}
}

pub fn tag(id: u32, label: &str) -> Tag {
	Tag { id, label: label.to_string() }
}

/// Fetch source answering from a script, then repeating a fallback.
pub struct ScriptedFetch {
	script: Mutex<VecDeque<Result<Vec<Tag>, PortError>>>,
	fallback: Result<Vec<Tag>, PortError>,
	delay: Duration,
	calls: AtomicUsize,
}

impl ScriptedFetch {
	pub fn succeeding_after(failures: usize, items: Vec<Tag>) -> Self {
		let script = (0..failures).map(|n| Err(PortError::new(format!("offline #{}", n + 1)))).collect();
		Self {
			script: Mutex::new(script),
			fallback: Ok(items),
			delay: Duration::ZERO,
			calls: AtomicUsize::new(0),
		}
	}

	pub fn always_failing(message: &str) -> Self {
		Self {
			script: Mutex::new(VecDeque::new()),
			fallback: Err(PortError::new(message)),
			delay: Duration::ZERO,
			calls: AtomicUsize::new(0),
		}
	}

	/// Sleeps before answering each call.
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Fetch<Tag> for ScriptedFetch {
	async fn fetch_all(&self, _cancel: &CancellationToken) -> Result<Vec<Tag>, PortError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}
		let next = self.script.lock().pop_front();
		next.unwrap_or_else(|| self.fallback.clone())
	}
}

#[derive(Default)]
pub struct RecordingNotifier {
	messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingNotifier {
	pub fn messages(&self) -> Vec<(Level, String)> {
		self.messages.lock().clone()
	}

	pub fn count(&self, level: Level) -> usize {
		self.messages.lock().iter().filter(|(l, _)| *l == level).count()
	}

	pub fn texts(&self, level: Level) -> Vec<String> {
		self.messages.lock().iter().filter(|(l, _)| *l == level).map(|(_, m)| m.clone()).collect()
	}
}

impl Notifier for RecordingNotifier {
	fn notify(&self, level: Level, message: &str) {
		self.messages.lock().push((level, message.to_string()));
	}
}

/// Exporter that records every call, optionally failing or holding until
/// released.
#[derive(Default)]
pub struct RecordingExporter {
	exports: Mutex<Vec<(Vec<Tag>, PathBuf)>>,
	fail: AtomicBool,
	hold: Option<Arc<Notify>>,
}

impl RecordingExporter {
	pub fn failing() -> Self {
		Self {
			fail: AtomicBool::new(true),
			..Self::default()
		}
	}

	/// Blocks each export until `release` is notified.
	pub fn held(release: Arc<Notify>) -> Self {
		Self {
			hold: Some(release),
			..Self::default()
		}
	}

	pub fn exports(&self) -> Vec<(Vec<Tag>, PathBuf)> {
		self.exports.lock().clone()
	}
}

#[async_trait]
impl Exporter<Tag> for RecordingExporter {
	async fn export(&self, records: &[Tag], destination: &Path, _cancel: &CancellationToken) -> Result<(), PortError> {
		if let Some(release) = &self.hold {
			release.notified().await;
		}
		if self.fail.load(Ordering::SeqCst) {
			return Err(PortError::new("disk full"));
		}
		self.exports.lock().push((records.to_vec(), destination.to_path_buf()));
		Ok(())
	}
}

pub struct FixedPaths;

impl PathProvider for FixedPaths {
	fn latest_path(&self, base_name: &str, extension: &str) -> PathBuf {
		PathBuf::from(format!("/exports/{base_name}_latest.{extension}"))
	}
}

/// Executor that echoes requests back, recording the collection state it
/// observed at each call.
pub struct FakeExecutor {
	collection: Arc<SharedCollection<Tag>>,
	rejection: Mutex<Option<String>>,
	seen: Mutex<Vec<LoadState>>,
}

impl FakeExecutor {
	pub fn watching(collection: Arc<SharedCollection<Tag>>) -> Self {
		Self {
			collection,
			rejection: Mutex::new(None),
			seen: Mutex::new(Vec::new()),
		}
	}

	pub fn reject_with(&self, message: &str) {
		*self.rejection.lock() = Some(message.to_string());
	}

	pub fn calls(&self) -> usize {
		self.seen.lock().len()
	}

	pub fn seen_states(&self) -> Vec<LoadState> {
		self.seen.lock().clone()
	}

	fn observe(&self) -> Result<(), PortError> {
		self.seen.lock().push(self.collection.state());
		match self.rejection.lock().as_deref() {
			Some(message) => Err(PortError::new(message)),
			None => Ok(()),
		}
	}
}

#[async_trait]
impl RequestExecutor<Tag> for FakeExecutor {
	type Create = Tag;
	type Update = Tag;

	async fn create(&self, request: Tag, _cancel: &CancellationToken) -> Result<Tag, PortError> {
		self.observe()?;
		Ok(request)
	}

	async fn update(&self, request: Tag, _cancel: &CancellationToken) -> Result<Tag, PortError> {
		self.observe()?;
		Ok(request)
	}

	async fn delete(&self, _key: u32, _cancel: &CancellationToken) -> Result<(), PortError> {
		self.observe()
	}
}

/// Inline owner that can be switched off to simulate a torn-down context.
#[derive(Default)]
pub struct SwitchMarshal {
	closed: AtomicBool,
}

impl SwitchMarshal {
	pub fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
	}
}

impl ThreadMarshal for SwitchMarshal {
	fn is_owner(&self) -> bool {
		false
	}

	fn dispatch(&self, job: Job) -> Result<(), MarshalError> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(MarshalError::Closed);
		}
		job();
		Ok(())
	}
}

pub fn fast_config(max_attempts: usize) -> LoaderConfig {
	LoaderConfig {
		retry: RetryPolicy::Fixed { max_attempts, delay_ms: 5 },
		label: "tags".to_string(),
		export: ExportConfig {
			base_name: "tags".to_string(),
			..ExportConfig::default()
		},
	}
}

/// Wiring shared by the loader and coordinator tests.
pub struct Harness {
	pub collection: Arc<SharedCollection<Tag>>,
	pub fetch: Arc<ScriptedFetch>,
	pub notifier: Arc<RecordingNotifier>,
	pub exporter: Arc<RecordingExporter>,
	pub loader: Arc<BootstrapLoader<Tag>>,
}

impl Harness {
	pub fn new(fetch: ScriptedFetch) -> Self {
		Self::build(fetch, RecordingExporter::default(), Arc::new(InlineMarshal), fast_config(4))
	}

	pub fn build(fetch: ScriptedFetch, exporter: RecordingExporter, marshal: Arc<dyn ThreadMarshal>, config: LoaderConfig) -> Self {
		let collection = Arc::new(SharedCollection::new());
		let fetch = Arc::new(fetch);
		let notifier = Arc::new(RecordingNotifier::default());
		let exporter = Arc::new(exporter);
		let loader = BootstrapLoader::new(Arc::clone(&collection), fetch.clone(), marshal)
			.with_notifier(notifier.clone())
			.with_exporter(exporter.clone(), Arc::new(FixedPaths))
			.with_config(config);
		Self {
			collection,
			fetch,
			notifier,
			exporter,
			loader: Arc::new(loader),
		}
	}
}
