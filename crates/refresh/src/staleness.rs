//! Staleness gate, evaluated synchronously on every read.

use chrono::{DateTime, Duration, Utc};
use common::Snapshot;

/// Whether the snapshot is older than `max_age`. A snapshot that has never
/// completed a refresh is always stale.
pub fn is_stale(snapshot: &Snapshot, now: DateTime<Utc>, max_age: Duration) -> bool {
    match snapshot.updated_at {
        Some(updated_at) => now - updated_at > max_age,
        None => true,
    }
}

/// Whether the read path should launch a background refresh: stale and no
/// refresh currently in flight.
///
/// This is only the trigger decision — admission itself is the store's
/// atomic `try_begin_refresh`, so two readers racing through here still
/// produce a single refresh.
pub fn should_trigger_refresh(snapshot: &Snapshot, now: DateTime<Utc>, max_age: Duration) -> bool {
    is_stale(snapshot, now, max_age) && !snapshot.refresh_in_flight()
}
