//! Domain types shared across the workspace.
//!
//! The persisted snapshot payload keeps the upstream record shape
//! (id + opaque fields) and adds the geocoded coordinates, so the read
//! boundary can serve it without another mapping step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// (latitude, longitude), serialized as a 2-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates(pub f64, pub f64);

impl Coordinates {
    pub fn lat(&self) -> f64 {
        self.0
    }

    pub fn lon(&self) -> f64 {
        self.1
    }
}

/// One record as fetched from the upstream provider, already normalized:
/// the provider extracts `enrichment_key` (the postal-code-like field used
/// as geocoding input) so downstream code never touches field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,

    /// Opaque upstream fields, passed through to readers untouched.
    #[serde(default)]
    pub fields: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_key: Option<String>,
}

/// A raw record plus (optionally) its geocoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: RawRecord,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl EnrichedRecord {
    /// Wrap a freshly fetched record that has no coordinates yet.
    pub fn from_raw(record: RawRecord) -> Self {
        Self {
            record,
            coordinates: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn enrichment_key(&self) -> Option<&str> {
        self.record.enrichment_key.as_deref()
    }
}

/// The persisted cache row for one map id.
///
/// A refresh is in flight iff `refresh_started_at > updated_at` and
/// `refresh_started_at > refresh_failed_at`, with `None` comparing less
/// than any timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,

    #[serde(default)]
    pub data: Vec<EnrichedRecord>,

    /// Last successful refresh completion; `None` before the first one.
    pub updated_at: Option<DateTime<Utc>>,

    /// When the most recent refresh attempt began.
    pub refresh_started_at: Option<DateTime<Utc>>,

    /// When the most recent refresh attempt failed. Only written on the
    /// failure path; a later success supersedes it by timestamp order.
    pub refresh_failed_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// A pre-provisioned row: no data, no refresh history.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: Vec::new(),
            updated_at: None,
            refresh_started_at: None,
            refresh_failed_at: None,
        }
    }

    /// Whether a refresh attempt has started and not yet terminated.
    ///
    /// Derived purely from timestamp order: the last start must postdate
    /// both the last success and the last failure. Stores use this for
    /// refresh admission; the read path uses it through the staleness gate.
    pub fn refresh_in_flight(&self) -> bool {
        let Some(started) = self.refresh_started_at else {
            return false;
        };
        let after_success = match self.updated_at {
            Some(updated) => started > updated,
            None => true,
        };
        let after_failure = match self.refresh_failed_at {
            Some(failed) => started > failed,
            None => true,
        };
        after_success && after_failure
    }
}

/// Echo of the submitted text in a batch geocoding result row.
/// `text` is the correlation key joining the result back to its records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeQuery {
    #[serde(default)]
    pub text: String,
}

/// One row of a completed batch geocoding job.
///
/// The upstream payload carries many more fields; only the ones the
/// snapshot needs are kept, everything else is ignored on parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub query: GeocodeQuery,

    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
}

impl GeocodeResult {
    /// Coordinates if the geocoder actually found a location.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates(lat, lon)),
            _ => None,
        }
    }
}

/// Outcome of one status check against the batch geocoding job.
#[derive(Debug, Clone)]
pub enum PollStatus {
    /// Job finished; results are parsed and ready to join.
    Ready(Vec<GeocodeResult>),
    /// Job still running server-side. The only retryable outcome.
    Pending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_serialize_as_pair() {
        let json = serde_json::to_string(&Coordinates(45.0, -73.0)).expect("serialize");
        assert_eq!(json, "[45.0,-73.0]");

        let back: Coordinates = serde_json::from_str("[46.5, -72.25]").expect("deserialize");
        assert_eq!(back, Coordinates(46.5, -72.25));
    }

    #[test]
    fn test_enriched_record_flattens_raw_fields() {
        let mut fields = Map::new();
        fields.insert("Code postal".into(), Value::String("H0H0H0".into()));
        let enriched = EnrichedRecord {
            record: RawRecord {
                id: "rec1".into(),
                created_time: None,
                fields,
                enrichment_key: Some("H0H0H0".into()),
            },
            coordinates: Some(Coordinates(45.0, -73.0)),
        };

        let value = serde_json::to_value(&enriched).expect("serialize");
        assert_eq!(value["id"], "rec1");
        assert_eq!(value["fields"]["Code postal"], "H0H0H0");
        assert_eq!(value["coordinates"][0], 45.0);

        let back: EnrichedRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, enriched);
    }

    #[test]
    fn test_geocode_result_without_location_has_no_coordinates() {
        let parsed: GeocodeResult = serde_json::from_str(
            r#"{"query": {"text": "H9H9H9"}, "result_type": "unknown"}"#,
        )
        .expect("deserialize");
        assert!(parsed.coordinates().is_none());
        assert_eq!(parsed.query.text, "H9H9H9");
    }
}
