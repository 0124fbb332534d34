//! JSON-file-backed snapshot store.
//!
//! All rows live in one JSON document (map id → snapshot row). Every
//! operation takes the store's async mutex, reads the document, mutates its
//! row, and writes the whole document back — which makes
//! `try_begin_refresh` an atomic check-and-set within this process.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EnrichedRecord, Error, Result, Snapshot, SnapshotStore};
use tokio::sync::Mutex;
use tracing::debug;

/// Snapshot store persisted as a single JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load all rows; a missing file is an empty store.
    async fn load(&self) -> Result<HashMap<String, Snapshot>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Snapshot file {} not found; starting empty", self.path.display());
                return Ok(HashMap::new());
            }
            Err(e) => {
                return Err(Error::Store(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        serde_json::from_slice(&raw).map_err(|e| {
            Error::Store(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    async fn persist(&self, rows: &HashMap<String, Snapshot>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Store(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let raw = serde_json::to_vec_pretty(rows)
            .map_err(|e| Error::Store(format!("failed to serialize snapshot rows: {}", e)))?;
        tokio::fs::write(&self.path, raw).await.map_err(|e| {
            Error::Store(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn read(&self, id: &str) -> Result<Snapshot> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        match rows.get(id) {
            Some(row) => Ok(row.clone()),
            None => {
                // Pre-provision the row so refreshes have something to
                // mutate, mirroring an out-of-band INSERT.
                let row = Snapshot::empty(id);
                rows.insert(id.to_string(), row.clone());
                self.persist(&rows).await?;
                Ok(row)
            }
        }
    }

    async fn try_begin_refresh(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        let row = rows
            .entry(id.to_string())
            .or_insert_with(|| Snapshot::empty(id));
        if row.refresh_in_flight() {
            return Ok(false);
        }
        row.refresh_started_at = Some(now);
        self.persist(&rows).await?;
        Ok(true)
    }

    async fn mark_refresh_failed(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        let row = rows
            .entry(id.to_string())
            .or_insert_with(|| Snapshot::empty(id));
        row.refresh_failed_at = Some(now);
        self.persist(&rows).await
    }

    async fn complete_refresh(
        &self,
        id: &str,
        data: Vec<EnrichedRecord>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        let row = rows
            .entry(id.to_string())
            .or_insert_with(|| Snapshot::empty(id));
        row.data = data;
        row.updated_at = Some(now);
        self.persist(&rows).await
    }
}
