//! Error types for store access.

use aviary_worker::MarshalError;
use thiserror::Error;

/// Failure of a coordinated store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
	/// The collection could not be brought to `Loaded`.
	#[error("store cannot be loaded")]
	NotLoaded,

	/// The caller's token fired while waiting.
	#[error("operation cancelled")]
	Cancelled,

	/// The request executor refused the command; carries its message verbatim.
	#[error("{0}")]
	Rejected(String),

	/// Applying the confirmed mutation on the owning context failed.
	#[error(transparent)]
	Marshal(#[from] MarshalError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
