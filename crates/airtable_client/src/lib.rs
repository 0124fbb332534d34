//! Airtable record provider.
//!
//! Fetches the raw record set for the map and normalizes it into
//! [`RawRecord`]s, extracting the postal-code field as the geocoding key so
//! nothing downstream has to know Airtable field names.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::AirtableConfig;
use common::{Error, RawRecord, RecordProvider, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Airtable REST client for one app/table pair.
#[derive(Debug, Clone)]
pub struct AirtableClient {
    client: reqwest::Client,
    cfg: AirtableConfig,
}

/// Response from the list-records endpoint. `records` is optional on
/// purpose: Airtable error payloads are valid JSON without it, and a
/// missing list must be treated as malformed, not as empty.
#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    records: Option<Vec<AirtableRecord>>,
}

/// One record as Airtable serializes it.
#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(rename = "createdTime", default)]
    created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl AirtableClient {
    pub fn new(cfg: AirtableConfig) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build Airtable HTTP client");

        Self { client, cfg }
    }

    fn records_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.app_id,
            self.cfg.table_id
        )
    }
}

#[async_trait]
impl RecordProvider for AirtableClient {
    async fn fetch_records(&self) -> Result<Vec<RawRecord>> {
        let url = self.records_url();
        debug!("Fetching records from {}", url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.cfg.api_key)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("record fetch failed: {e}")))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Provider(format!("record fetch body unreadable: {e}")))?;

        if status != 200 {
            return Err(Error::Provider(format!(
                "record fetch returned status {status}: {}",
                summarize_body(&body)
            )));
        }

        parse_records(&body, &self.cfg.postal_code_field)
    }
}

/// Parse and normalize a list-records payload.
fn parse_records(body: &str, postal_code_field: &str) -> Result<Vec<RawRecord>> {
    let parsed: RecordsResponse = serde_json::from_str(body)
        .map_err(|e| Error::Provider(format!("record payload unparseable: {e}")))?;

    let Some(records) = parsed.records else {
        return Err(Error::Provider(format!(
            "record payload missing records list: {}",
            summarize_body(body)
        )));
    };

    Ok(records
        .into_iter()
        .map(|r| {
            let enrichment_key = extract_key(&r.fields, postal_code_field);
            RawRecord {
                id: r.id,
                created_time: r.created_time,
                fields: r.fields,
                enrichment_key,
            }
        })
        .collect())
}

/// Postal-code field value, if usable. Blank strings count as absent.
fn extract_key(fields: &Map<String, Value>, field: &str) -> Option<String> {
    fields
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn summarize_body(raw: &str) -> String {
    const MAX_CHARS: usize = 400;
    let compact = raw.replace(['\n', '\r'], " ");
    if compact.len() > MAX_CHARS {
        format!("{}…", &compact[..MAX_CHARS])
    } else {
        compact
    }
}
