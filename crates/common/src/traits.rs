//! Collaborator seams for the refresh engine.
//!
//! The core never talks to Airtable, Geoapify, or the store directly; it is
//! generic over these traits so tests can script every failure mode.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{EnrichedRecord, PollStatus, RawRecord, Snapshot};
use crate::Result;

/// Upstream source of the raw record set.
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Fetch the current record set.
    ///
    /// Fails with `Error::Provider` on transport failure or a malformed
    /// payload (a response without a record list is malformed, not empty).
    async fn fetch_records(&self) -> Result<Vec<RawRecord>>;
}

/// Transport for the asynchronous batch geocoding job.
///
/// The retry/timing protocol lives in `refresh::poller`; this trait is one
/// request each way.
#[async_trait]
pub trait GeocodeJobApi: Send + Sync {
    /// Submit a batch of enrichment keys. Returns the job id on acceptance,
    /// `Error::SubmissionRejected` otherwise.
    async fn submit(&self, keys: &[String]) -> Result<String>;

    /// Check job status once. `Err(Error::JobFailed)` covers any terminal
    /// non-pending failure, including transport and parse errors.
    async fn poll_status(&self, job_id: &str) -> Result<PollStatus>;
}

/// Persistence for the snapshot row.
///
/// Writes are partial by design: a refresh start, a failure marker, and a
/// completed payload each touch only their own fields.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn read(&self, id: &str) -> Result<Snapshot>;

    /// Atomically set `refresh_started_at = now` iff no refresh is
    /// currently in flight. Returns whether this caller won admission.
    ///
    /// This is the store-side replacement for a timestamp-compare lock:
    /// two readers racing past the staleness gate still produce one refresh.
    async fn try_begin_refresh(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Write `refresh_failed_at = now`, leaving data and `updated_at` alone.
    async fn mark_refresh_failed(&self, id: &str, now: DateTime<Utc>) -> Result<()>;

    /// Write the refreshed payload and `updated_at = now` together.
    async fn complete_refresh(
        &self,
        id: &str,
        data: Vec<EnrichedRecord>,
        now: DateTime<Utc>,
    ) -> Result<()>;
}
