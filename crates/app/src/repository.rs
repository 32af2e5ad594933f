//! Bird persistence in a single JSON file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aviary_store::{Fetch, PortError, RequestExecutor};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bird::{Bird, BirdUpdate, NewBird};

pub const FILE_NAME: &str = "birds.json";

/// Birds stored as a pretty-printed JSON array in `<data_dir>/birds.json`.
///
/// A missing file reads as an empty list. Writes replace the file through a
/// temporary sibling so a crash never leaves it half written.
#[derive(Debug)]
pub struct JsonRepository {
	path: PathBuf,
	/// Serializes read-modify-write cycles.
	write_lock: Mutex<()>,
}

impl JsonRepository {
	pub fn new(data_dir: impl AsRef<Path>) -> Self {
		Self {
			path: data_dir.as_ref().join(FILE_NAME),
			write_lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn read(&self) -> Result<Vec<Bird>, PortError> {
		let bytes = match tokio::fs::read(&self.path).await {
			Ok(bytes) => bytes,
			Err(error) if error.kind() == ErrorKind::NotFound => {
				tracing::debug!(path = %self.path.display(), "repository.missing");
				return Ok(Vec::new());
			}
			Err(error) => return Err(PortError::new(format!("cannot read {}: {error}", self.path.display()))),
		};
		serde_json::from_slice(&bytes).map_err(|error| PortError::new(format!("cannot parse {}: {error}", self.path.display())))
	}

	async fn write(&self, birds: &[Bird]) -> Result<(), PortError> {
		let io_error = |error: std::io::Error| PortError::new(format!("cannot write {}: {error}", self.path.display()));
		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
		}
		let json = serde_json::to_vec_pretty(birds).map_err(|error| PortError::new(format!("cannot encode birds: {error}")))?;
		let staging = self.path.with_extension("json.tmp");
		tokio::fs::write(&staging, json).await.map_err(io_error)?;
		tokio::fs::rename(&staging, &self.path).await.map_err(io_error)?;
		tracing::debug!(path = %self.path.display(), count = birds.len(), "repository.saved");
		Ok(())
	}
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), PortError> {
	if cancel.is_cancelled() {
		return Err(PortError::new("request cancelled"));
	}
	Ok(())
}

fn validate(bird: &Bird) -> Result<(), PortError> {
	if bird.name.trim().is_empty() {
		return Err(PortError::new("bird name must not be blank"));
	}
	if bird.species.trim().is_empty() {
		return Err(PortError::new("species must not be blank"));
	}
	Ok(())
}

fn unknown(id: Uuid) -> PortError {
	PortError::new(format!("no bird with id {id}"))
}

#[async_trait]
impl Fetch<Bird> for JsonRepository {
	async fn fetch_all(&self, cancel: &CancellationToken) -> Result<Vec<Bird>, PortError> {
		ensure_live(cancel)?;
		self.read().await
	}
}

#[async_trait]
impl RequestExecutor<Bird> for JsonRepository {
	type Create = NewBird;
	type Update = BirdUpdate;

	async fn create(&self, request: NewBird, cancel: &CancellationToken) -> Result<Bird, PortError> {
		ensure_live(cancel)?;
		let bird = request.into_bird(Uuid::new_v4());
		validate(&bird)?;

		let _guard = self.write_lock.lock().await;
		let mut birds = self.read().await?;
		birds.push(bird.clone());
		self.write(&birds).await?;
		Ok(bird)
	}

	async fn update(&self, request: BirdUpdate, cancel: &CancellationToken) -> Result<Bird, PortError> {
		ensure_live(cancel)?;
		let _guard = self.write_lock.lock().await;
		let mut birds = self.read().await?;
		let id = request.id;
		let slot = birds.iter_mut().find(|b| b.id == id).ok_or_else(|| unknown(id))?;

		let mut updated = slot.clone();
		request.apply_to(&mut updated);
		validate(&updated)?;
		*slot = updated.clone();

		self.write(&birds).await?;
		Ok(updated)
	}

	async fn delete(&self, id: Uuid, cancel: &CancellationToken) -> Result<(), PortError> {
		ensure_live(cancel)?;
		let _guard = self.write_lock.lock().await;
		let mut birds = self.read().await?;
		let before = birds.len();
		birds.retain(|b| b.id != id);
		if birds.len() == before {
			return Err(unknown(id));
		}
		self.write(&birds).await
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn repo() -> (tempfile::TempDir, JsonRepository) {
		let dir = tempfile::tempdir().unwrap();
		let repo = JsonRepository::new(dir.path().join("data"));
		(dir, repo)
	}

	#[tokio::test]
	async fn missing_file_reads_as_empty() {
		let (_dir, repo) = repo();
		assert_eq!(repo.fetch_all(&CancellationToken::new()).await, Ok(Vec::new()));
	}

	#[tokio::test]
	async fn create_update_delete_round_trip_through_the_file() {
		let (_dir, repo) = repo();
		let cancel = CancellationToken::new();

		let robin = repo.create(NewBird::new("Rusty", "Robin"), &cancel).await.unwrap();
		let wren = repo.create(NewBird::new("Pip", "Wren"), &cancel).await.unwrap();
		assert!(repo.path().exists());

		let mut rename = BirdUpdate::new(robin.id);
		rename.name = Some("Red".into());
		let renamed = repo.update(rename, &cancel).await.unwrap();
		assert_eq!(renamed.name, "Red");

		repo.delete(wren.id, &cancel).await.unwrap();

		let reopened = JsonRepository::new(repo.path().parent().unwrap());
		assert_eq!(reopened.fetch_all(&cancel).await.unwrap(), vec![renamed]);
	}

	#[tokio::test]
	async fn blank_fields_are_rejected() {
		let (_dir, repo) = repo();
		let cancel = CancellationToken::new();

		let err = repo.create(NewBird::new("  ", "Robin"), &cancel).await.unwrap_err();
		assert_eq!(err.message(), "bird name must not be blank");

		let robin = repo.create(NewBird::new("Rusty", "Robin"), &cancel).await.unwrap();
		let mut blank = BirdUpdate::new(robin.id);
		blank.species = Some(String::new());
		let err = repo.update(blank, &cancel).await.unwrap_err();
		assert_eq!(err.message(), "species must not be blank");

		assert_eq!(repo.fetch_all(&cancel).await.unwrap(), vec![robin]);
	}

	#[tokio::test]
	async fn unknown_ids_are_rejected() {
		let (_dir, repo) = repo();
		let cancel = CancellationToken::new();
		let id = Uuid::new_v4();

		assert_eq!(repo.delete(id, &cancel).await, Err(unknown(id)));
		assert_eq!(repo.update(BirdUpdate::new(id), &cancel).await, Err(unknown(id)));
	}

	#[tokio::test]
	async fn corrupt_file_is_a_fetch_error() {
		let (dir, repo) = repo();
		std::fs::create_dir_all(dir.path().join("data")).unwrap();
		std::fs::write(repo.path(), b"not json").unwrap();

		let err = repo.fetch_all(&CancellationToken::new()).await.unwrap_err();
		assert!(err.message().starts_with("cannot parse"), "{err}");
	}

	#[tokio::test]
	async fn cancelled_requests_do_nothing() {
		let (_dir, repo) = repo();
		let cancel = CancellationToken::new();
		cancel.cancel();

		assert!(repo.create(NewBird::new("Pip", "Wren"), &cancel).await.is_err());
		assert!(!repo.path().exists());
	}
}
