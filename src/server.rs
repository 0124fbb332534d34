//! HTTP read boundary.
//!
//! One route: GET /map returns the current snapshot plus a staleness flag,
//! always 200. A stale snapshot with no refresh in flight launches a
//! detached refresh on the way out; the reader never waits on it and never
//! sees its errors.

use std::sync::Arc;

use airtable_client::AirtableClient;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use common::{Snapshot, SnapshotStore};
use geocode_client::GeoapifyClient;
use refresh::{is_stale, should_trigger_refresh, RefreshCoordinator};
use serde::Serialize;
use snapshot_store::JsonFileStore;
use tracing::error;

/// The concrete coordinator wiring used by the service.
pub type Coordinator = RefreshCoordinator<AirtableClient, GeoapifyClient, JsonFileStore>;

#[derive(Clone)]
pub struct AppState {
    pub store: JsonFileStore,
    pub coordinator: Arc<Coordinator>,
    pub map_id: String,
    pub max_age_secs: u64,
}

#[derive(Debug, Serialize)]
struct MapResponse {
    map: Snapshot,
    stale: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/map", get(get_map)).with_state(state)
}

async fn get_map(State(state): State<AppState>) -> Result<Json<MapResponse>, StatusCode> {
    let snapshot = state.store.read(&state.map_id).await.map_err(|e| {
        error!("Snapshot read failed for map {}: {}", state.map_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let now = Utc::now();
    let max_age = Duration::seconds(state.max_age_secs as i64);
    let stale = is_stale(&snapshot, now, max_age);

    if should_trigger_refresh(&snapshot, now, max_age) {
        // Fire-and-forget; the coordinator owns its error handling.
        state.coordinator.spawn_refresh(snapshot.data.clone());
    }

    Ok(Json(MapResponse {
        map: snapshot,
        stale,
    }))
}
