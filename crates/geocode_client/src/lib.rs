//! Geoapify batch geocoding transport.
//!
//! One request each way: submit a batch of address keys, check the job
//! status once. The deferred-first-check/bounded-retry protocol on top of
//! this lives in `refresh::poller`.

use async_trait::async_trait;
use common::config::GeocodingConfig;
use common::{Error, GeocodeJobApi, GeocodeResult, PollStatus, Result};
use serde::Deserialize;
use tracing::debug;

/// Client for Geoapify's asynchronous batch geocoding API.
#[derive(Debug, Clone)]
pub struct GeoapifyClient {
    client: reqwest::Client,
    cfg: GeocodingConfig,
}

/// Accepted-submission body: `{"id": "...", ...}`.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

impl GeoapifyClient {
    pub fn new(cfg: GeocodingConfig) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build Geoapify HTTP client");

        Self { client, cfg }
    }
}

#[async_trait]
impl GeocodeJobApi for GeoapifyClient {
    async fn submit(&self, keys: &[String]) -> Result<String> {
        debug!("Submitting {} keys for batch geocoding", keys.len());
        let country_filter = format!("countrycode:{}", self.cfg.country_filter);
        let resp = self
            .client
            .post(&self.cfg.batch_url)
            .query(&[
                ("lang", self.cfg.lang.as_str()),
                ("filter", country_filter.as_str()),
                ("apiKey", self.cfg.api_key.as_str()),
            ])
            .json(keys)
            .send()
            .await
            .map_err(|e| Error::SubmissionRejected {
                status: 0,
                message: format!("submission transport error: {e}"),
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();

        // Only 202 Accepted starts a job; anything else is a refusal.
        if status != 202 {
            return Err(Error::SubmissionRejected {
                status,
                message: summarize_body(&body),
            });
        }

        let parsed: SubmitResponse = serde_json::from_str(&body).map_err(|e| {
            Error::SubmissionRejected {
                status,
                message: format!("accepted response without job id: {e}"),
            }
        })?;
        Ok(parsed.id)
    }

    async fn poll_status(&self, job_id: &str) -> Result<PollStatus> {
        let resp = self
            .client
            .get(&self.cfg.batch_url)
            .query(&[
                ("id", job_id),
                ("apiKey", self.cfg.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| Error::JobFailed(format!("status check transport error: {e}")))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::JobFailed(format!("status check body unreadable: {e}")))?;

        match status {
            200 => {
                let results = parse_results(&body)?;
                Ok(PollStatus::Ready(results))
            }
            202 => Ok(PollStatus::Pending),
            _ => Err(Error::JobFailed(format!(
                "job {job_id} returned status {status}: {}",
                summarize_body(&body)
            ))),
        }
    }
}

/// Parse a completed job's result rows.
fn parse_results(body: &str) -> Result<Vec<GeocodeResult>> {
    serde_json::from_str(body)
        .map_err(|e| Error::JobFailed(format!("result payload unparseable: {e}")))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_results() -> &'static str {
        r#"[
            {
                "query": {
                    "text": "H2J 3K4",
                    "parsed": {"postcode": "h2j 3k4", "country": "canada", "expected_type": "postcode"}
                },
                "datasource": {"sourcename": "openstreetmap", "attribution": "© OpenStreetMap contributors"},
                "lon": -73.5794,
                "lat": 45.5335,
                "postcode": "H2J 3K4",
                "city": "Montréal",
                "country": "Canada",
                "country_code": "ca",
                "formatted": "H2J 3K4, Montréal, QC, Canada",
                "result_type": "postcode",
                "rank": {"importance": 0.225, "confidence": 1, "match_type": "full_match"},
                "place_id": "51e2..."
            },
            {
                "query": {"text": "X9X 9X9"},
                "datasource": {"sourcename": "openstreetmap"},
                "result_type": "unknown"
            }
        ]"#
    }

    #[test]
    fn test_parse_results_keeps_correlation_key_and_location() {
        let results = parse_results(sample_results()).expect("parse");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].query.text, "H2J 3K4");
        let coords = results[0].coordinates().expect("located");
        assert!((coords.lat() - 45.5335).abs() < 1e-9);
        assert!((coords.lon() - -73.5794).abs() < 1e-9);
        assert_eq!(results[0].city.as_deref(), Some("Montréal"));

        // No-match row: key echoed, no coordinates.
        assert_eq!(results[1].query.text, "X9X 9X9");
        assert!(results[1].coordinates().is_none());
    }

    #[test]
    fn test_submit_response_carries_job_id() {
        let parsed: SubmitResponse =
            serde_json::from_str(r#"{"id": "f1f8bcca", "status": "pending", "url": "..."}"#)
                .expect("parse");
        assert_eq!(parsed.id, "f1f8bcca");
    }

    #[test]
    fn test_error_payload_fails_result_parse() {
        let err = parse_results(r#"{"error": "Invalid apiKey"}"#).expect_err("must fail");
        assert!(matches!(err, Error::JobFailed(_)));
    }
}
