//! JSON snapshot export.

use std::path::Path;

use async_trait::async_trait;
use aviary_store::{Exporter, PortError, Record};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Writes the records as a pretty JSON array, overwriting the destination.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExporter;

#[async_trait]
impl<R> Exporter<R> for JsonExporter
where
	R: Record + Serialize,
{
	async fn export(&self, records: &[R], destination: &Path, cancel: &CancellationToken) -> Result<(), PortError> {
		if cancel.is_cancelled() {
			return Err(PortError::new("export cancelled"));
		}
		let json = serde_json::to_vec_pretty(records).map_err(|error| PortError::new(format!("cannot encode export: {error}")))?;
		if let Some(parent) = destination.parent() {
			tokio::fs::create_dir_all(parent)
				.await
				.map_err(|error| PortError::new(format!("cannot create {}: {error}", parent.display())))?;
		}
		tokio::fs::write(destination, json)
			.await
			.map_err(|error| PortError::new(format!("cannot write {}: {error}", destination.display())))?;
		tracing::debug!(path = %destination.display(), count = records.len(), "export.written");
		Ok(())
	}
}
