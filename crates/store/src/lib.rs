//! Shared record store: load-state machine, retrying bootstrap and
//! readiness-gated mutations.
//!
//! * [`SharedCollection`] holds the records and the [`LoadState`] gate that
//!   readiness waiters park on.
//! * [`BootstrapLoader`] fills the collection from a [`Fetch`] source under a
//!   retry policy, then exports the snapshot.
//! * [`AccessCoordinator`] runs create, update and delete commands once the
//!   collection is loaded and mirrors confirmed results into memory.
//!
//! Content mutations always run on the owning context supplied as an
//! [`aviary_worker::ThreadMarshal`].

mod collection;
mod coordinator;
mod error;
mod loader;
pub mod ports;
mod record;
mod state;

pub use collection::{CollectionEvent, SharedCollection};
pub use coordinator::AccessCoordinator;
pub use error::{Result, StoreError};
pub use loader::{BootstrapLoader, ExportConfig, LoadOutcome, LoaderConfig};
pub use ports::{Exporter, Fetch, Level, NoopNotifier, Notifier, PathProvider, PortError, RequestExecutor};
pub use record::Record;
pub use state::LoadState;
