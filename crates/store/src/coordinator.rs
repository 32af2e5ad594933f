//! Readiness-gated mutations.
//!
//! Every command first makes sure the collection is `Loaded`, reloading it
//! when needed. The command then goes to the [`RequestExecutor`], and only a
//! confirmed result is mirrored into memory, on the owning context.

use std::sync::Arc;

use aviary_worker::run_on_owner;
use tokio_util::sync::CancellationToken;

use crate::collection::SharedCollection;
use crate::error::{Result, StoreError};
use crate::loader::{BootstrapLoader, LoadOutcome};
use crate::ports::{PortError, RequestExecutor};
use crate::record::Record;
use crate::state::LoadState;

/// Applies commands to persisted state and mirrors them into the collection.
pub struct AccessCoordinator<R: Record, X> {
	loader: Arc<BootstrapLoader<R>>,
	executor: Arc<X>,
}

impl<R: Record, X> std::fmt::Debug for AccessCoordinator<R, X> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AccessCoordinator").field("loader", &self.loader).finish_non_exhaustive()
	}
}

impl<R, X> AccessCoordinator<R, X>
where
	R: Record,
	X: RequestExecutor<R>,
{
	pub fn new(loader: Arc<BootstrapLoader<R>>, executor: Arc<X>) -> Self {
		Self { loader, executor }
	}

	/// Read access for presentation layers.
	pub fn collection(&self) -> &Arc<SharedCollection<R>> {
		self.loader.collection()
	}

	pub fn loader(&self) -> &Arc<BootstrapLoader<R>> {
		&self.loader
	}

	/// Reloads the collection unconditionally.
	pub async fn reload(&self, cancel: &CancellationToken) -> LoadOutcome {
		self.loader.start(cancel).await
	}

	/// Creates a record and appends it to the collection.
	pub async fn add(&self, request: X::Create, cancel: &CancellationToken) -> Result<R> {
		self.ensure_ready(cancel).await?;
		let record = self.executor.create(request, cancel).await.map_err(|error| self.rejected("create", error))?;

		let collection = Arc::clone(self.collection());
		let added = record.clone();
		self.apply("create", move || collection.add(added)).await?;
		Ok(record)
	}

	/// Updates a record and overwrites its in-memory copy, appending it when
	/// absent.
	pub async fn update(&self, request: X::Update, cancel: &CancellationToken) -> Result<R> {
		self.ensure_ready(cancel).await?;
		let record = self.executor.update(request, cancel).await.map_err(|error| self.rejected("update", error))?;

		let collection = Arc::clone(self.collection());
		let updated = record.clone();
		self.apply("update", move || {
			collection.upsert(updated);
		})
		.await?;
		Ok(record)
	}

	/// Deletes the record with `key` and drops it from the collection.
	pub async fn delete(&self, key: R::Key, cancel: &CancellationToken) -> Result<()> {
		self.ensure_ready(cancel).await?;
		self.executor
			.delete(key.clone(), cancel)
			.await
			.map_err(|error| self.rejected("delete", error))?;

		let collection = Arc::clone(self.collection());
		self.apply("delete", move || {
			if collection.remove_key(&key).is_none() {
				tracing::debug!(key = ?key, "store.command.delete_absent");
			}
		})
		.await
	}

	/// Brings the collection to `Loaded` or fails without side effects.
	async fn ensure_ready(&self, cancel: &CancellationToken) -> Result<()> {
		match self.collection().state() {
			LoadState::Loaded => return Ok(()),
			LoadState::Uninitialized | LoadState::Failed => {
				tracing::warn!(state = %self.collection().state(), "store.command.reloading");
				self.loader.notifier().warning("Store is not loaded, reloading...");
				match self.loader.start_if_idle(cancel).await {
					Some(LoadOutcome::Cancelled) => return Err(StoreError::Cancelled),
					Some(_) => {}
					None => {
						tracing::debug!("store.command.awaiting_load");
						self.collection().wait_until_settled(cancel).await?;
					}
				}
			}
			LoadState::Loading => {
				tracing::debug!("store.command.awaiting_load");
				self.collection().wait_until_settled(cancel).await?;
			}
		}

		if self.collection().state() == LoadState::Loaded {
			Ok(())
		} else {
			tracing::warn!(state = %self.collection().state(), "store.command.not_loaded");
			Err(StoreError::NotLoaded)
		}
	}

	fn rejected(&self, command: &'static str, error: PortError) -> StoreError {
		tracing::warn!(command, error = %error, "store.command.rejected");
		self.loader.notifier().error(error.message());
		StoreError::Rejected(error.into_message())
	}

	async fn apply<F>(&self, command: &'static str, mutation: F) -> Result<()>
	where
		F: FnOnce() + Send + 'static,
	{
		run_on_owner(self.loader.marshal().as_ref(), mutation).await.map_err(|error| {
			tracing::error!(command, error = %error, "store.command.apply_failed");
			StoreError::from(error)
		})
	}
}
