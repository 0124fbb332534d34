//! Snapshot persistence.
//!
//! Two [`SnapshotStore`] implementations: a JSON-file-backed store for
//! running the service, and an in-memory store for tests and local
//! experiments. Both serialize refresh admission behind their own lock, so
//! `try_begin_refresh` is a genuine check-and-set.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
