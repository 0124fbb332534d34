//! In-memory snapshot store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EnrichedRecord, Error, Result, Snapshot, SnapshotStore};

/// Mutex-guarded map of snapshot rows. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<HashMap<String, Snapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a row.
    pub fn insert(&self, snapshot: Snapshot) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.insert(snapshot.id.clone(), snapshot);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Snapshot>>> {
        self.rows
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn read(&self, id: &str) -> Result<Snapshot> {
        let mut rows = self.lock()?;
        Ok(rows
            .entry(id.to_string())
            .or_insert_with(|| Snapshot::empty(id))
            .clone())
    }

    async fn try_begin_refresh(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut rows = self.lock()?;
        let row = rows
            .entry(id.to_string())
            .or_insert_with(|| Snapshot::empty(id));
        if row.refresh_in_flight() {
            return Ok(false);
        }
        row.refresh_started_at = Some(now);
        Ok(true)
    }

    async fn mark_refresh_failed(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut rows = self.lock()?;
        let row = rows
            .entry(id.to_string())
            .or_insert_with(|| Snapshot::empty(id));
        row.refresh_failed_at = Some(now);
        Ok(())
    }

    async fn complete_refresh(
        &self,
        id: &str,
        data: Vec<EnrichedRecord>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut rows = self.lock()?;
        let row = rows
            .entry(id.to_string())
            .or_insert_with(|| Snapshot::empty(id));
        row.data = data;
        row.updated_at = Some(now);
        Ok(())
    }
}
