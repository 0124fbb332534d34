//! One background refresh cycle: admission, fetch, diff, geocode, persist.
//!
//! The coordinator runs detached from the read path that launched it. It
//! never returns anything to its caller — the outcome of a cycle is only
//! visible through the persisted snapshot row.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::{
    EnrichedRecord, GeocodeJobApi, GeocodeResult, RecordProvider, Result, SnapshotStore,
};
use tracing::{debug, error, info};

use crate::diff::{diff, DiffOutcome};
use crate::poller::JobPoller;

/// Orchestrates refresh cycles for one snapshot row.
pub struct RefreshCoordinator<P, G, S> {
    provider: P,
    poller: JobPoller<G>,
    store: S,
    map_id: String,
}

impl<P, G, S> RefreshCoordinator<P, G, S>
where
    P: RecordProvider,
    G: GeocodeJobApi,
    S: SnapshotStore,
{
    pub fn new(provider: P, poller: JobPoller<G>, store: S, map_id: impl Into<String>) -> Self {
        Self {
            provider,
            poller,
            store,
            map_id: map_id.into(),
        }
    }

    /// Run one refresh cycle against the previous snapshot payload.
    ///
    /// Never fails: every error is absorbed here and recorded as a
    /// `refresh_failed_at` write, so a detached cycle cannot leak a panic
    /// or an error into the read path. `data`/`updated_at` are untouched on
    /// any failure — readers keep the last good snapshot.
    pub async fn refresh(&self, previous: Vec<EnrichedRecord>) {
        if let Err(e) = self.run_cycle(previous).await {
            error!("Refresh of map {} failed: {}", self.map_id, e);
            if let Err(write_err) = self.store.mark_refresh_failed(&self.map_id, Utc::now()).await
            {
                // Nothing left to do for this cycle; the next stale read
                // re-triggers once the start marker stops looking live.
                error!(
                    "Could not record refresh failure for map {}: {}",
                    self.map_id, write_err
                );
            }
        }
    }

    /// Run one refresh cycle, retiring a live in-flight marker first.
    ///
    /// Operator entrypoint for foreground runs: a row left "in flight" by
    /// a crashed cycle would otherwise refuse admission forever. A live
    /// start marker is recorded as a failure before the cycle begins, so
    /// this call always ends with a terminal write on the row.
    pub async fn refresh_forced(&self, previous: Vec<EnrichedRecord>) {
        match self.store.read(&self.map_id).await {
            Ok(row) if row.refresh_in_flight() => {
                info!(
                    "Map {} has a live refresh marker; retiring it before the cycle",
                    self.map_id
                );
                if let Err(e) = self.store.mark_refresh_failed(&self.map_id, Utc::now()).await {
                    error!(
                        "Could not retire the refresh marker for map {}: {}",
                        self.map_id, e
                    );
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("Could not read map {} before refresh: {}", self.map_id, e);
                return;
            }
        }
        self.refresh(previous).await;
    }

    async fn run_cycle(&self, previous: Vec<EnrichedRecord>) -> Result<()> {
        // Store-side conditional transition: exactly one concurrent caller
        // gets admitted, everyone else sees an in-flight row.
        if !self.store.try_begin_refresh(&self.map_id, Utc::now()).await? {
            debug!("Refresh already in flight for map {}; skipping", self.map_id);
            return Ok(());
        }

        info!("Refreshing map {}", self.map_id);
        let fetched = self.provider.fetch_records().await?;
        let DiffOutcome {
            mut merged,
            keys_to_enrich,
        } = diff(&previous, fetched);

        if keys_to_enrich.is_empty() {
            self.store
                .complete_refresh(&self.map_id, merged, Utc::now())
                .await?;
            info!("Map {} refreshed; no geocoding needed", self.map_id);
            return Ok(());
        }

        info!(
            "Geocoding {} postal code(s) for map {}",
            keys_to_enrich.len(),
            self.map_id
        );
        let keys: Vec<String> = keys_to_enrich.into_iter().collect();
        let results = self.poller.run(&keys).await?;
        apply_results(&mut merged, &results);

        let record_count = merged.len();
        self.store
            .complete_refresh(&self.map_id, merged, Utc::now())
            .await?;
        info!(
            "Map {} refreshed: {} records, {} geocoding results applied",
            self.map_id,
            record_count,
            results.len()
        );
        Ok(())
    }
}

impl<P, G, S> RefreshCoordinator<P, G, S>
where
    P: RecordProvider + 'static,
    G: GeocodeJobApi + 'static,
    S: SnapshotStore + 'static,
{
    /// Launch a refresh cycle as a detached task, fire-and-forget.
    ///
    /// The caller never awaits the cycle; `refresh` carries its own error
    /// boundary so the task cannot fail loudly.
    pub fn spawn_refresh(self: &Arc<Self>, previous: Vec<EnrichedRecord>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.refresh(previous).await;
        });
    }
}

/// Join geocoding results back onto the merged records by correlation key.
/// One result applies to every record sharing its key; results without a
/// location never erase carried-forward coordinates.
fn apply_results(merged: &mut [EnrichedRecord], results: &[GeocodeResult]) {
    let by_key: HashMap<&str, &GeocodeResult> = results
        .iter()
        .map(|r| (r.query.text.as_str(), r))
        .collect();

    for entry in merged.iter_mut() {
        let Some(key) = entry.enrichment_key() else {
            continue;
        };
        if let Some(coords) = by_key.get(key).and_then(|r| r.coordinates()) {
            entry.coordinates = Some(coords);
        }
    }
}
