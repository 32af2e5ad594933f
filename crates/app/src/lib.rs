//! Bird sighting tracker.
//!
//! Birds live in a JSON file and are mirrored into an
//! [`aviary_store::SharedCollection`] owned by a dedicated thread. Commands go
//! through an [`aviary_store::AccessCoordinator`], so the file is always
//! written before memory changes.

pub mod bird;
pub mod config;
pub mod export;
pub mod notify;
pub mod paths;
pub mod repository;
pub mod service;

pub use bird::{Bird, BirdUpdate, NewBird};
pub use config::{AppConfig, ConfigError};
pub use export::JsonExporter;
pub use notify::ConsoleNotifier;
pub use paths::LatestPathProvider;
pub use repository::JsonRepository;
pub use service::{Aviary, BirdStore};
