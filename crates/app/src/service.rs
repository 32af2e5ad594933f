//! Wiring of the shared store to its concrete collaborators.

use std::sync::Arc;

use aviary_store::{AccessCoordinator, BootstrapLoader, Notifier, SharedCollection};
use aviary_worker::OwnerThread;

use crate::bird::Bird;
use crate::config::AppConfig;
use crate::export::JsonExporter;
use crate::paths::LatestPathProvider;
use crate::repository::JsonRepository;

pub type BirdStore = AccessCoordinator<Bird, JsonRepository>;

/// A running store: the owner thread plus the coordinator bound to it.
#[derive(Debug)]
pub struct Aviary {
	owner: Arc<OwnerThread>,
	store: BirdStore,
}

impl Aviary {
	/// Spawns the owner thread and assembles loader and coordinator.
	///
	/// Nothing is fetched until the first command or reload.
	pub fn open(config: &AppConfig, notifier: Arc<dyn Notifier>) -> std::io::Result<Self> {
		let owner = Arc::new(OwnerThread::spawn(config.owner_thread.clone())?);
		let repository = Arc::new(JsonRepository::new(&config.data_dir));
		tracing::debug!(
			data = %repository.path().display(),
			exports = %config.export_dir.display(),
			"aviary.open"
		);

		let loader = BootstrapLoader::new(Arc::new(SharedCollection::new()), repository.clone(), owner.clone())
			.with_notifier(notifier)
			.with_exporter(Arc::new(JsonExporter), Arc::new(LatestPathProvider::new(&config.export_dir)))
			.with_config(config.loader.clone());

		Ok(Self {
			owner,
			store: AccessCoordinator::new(Arc::new(loader), repository),
		})
	}

	pub fn store(&self) -> &BirdStore {
		&self.store
	}

	/// Waits for in-flight loads and exports, then stops the owner thread.
	pub async fn shutdown(self) {
		self.store.loader().stop().await;
		let owner = self.owner;
		if let Err(error) = tokio::task::spawn_blocking(move || owner.shutdown()).await {
			tracing::error!(error = %error, "aviary.owner_shutdown_failed");
		}
	}
}
