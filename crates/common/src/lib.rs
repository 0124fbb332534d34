//! Shared types, config, error, and collaborator traits for event-map.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::Error;
pub use traits::{GeocodeJobApi, RecordProvider, SnapshotStore};
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
