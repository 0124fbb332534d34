//! Service configuration types.
//!
//! Values only — the merge of defaults, config.toml, and environment
//! happens in the binary's loader.

use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream record provider (Airtable).
    #[serde(default)]
    pub airtable: AirtableConfig,

    /// Batch geocoding job API (Geoapify).
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Refresh cadence and snapshot identity.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Snapshot persistence.
    #[serde(default)]
    pub store: StoreConfig,

    /// Read boundary.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Airtable connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirtableConfig {
    /// API base URL.
    #[serde(default = "default_airtable_base_url")]
    pub base_url: String,

    /// Airtable app (base) id.
    #[serde(default)]
    pub app_id: String,

    /// Table id within the app.
    #[serde(default)]
    pub table_id: String,

    /// Bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Name of the field holding the geocoding input.
    #[serde(default = "default_postal_code_field")]
    pub postal_code_field: String,
}

/// Geoapify batch geocoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Batch geocoding endpoint URL.
    #[serde(default = "default_batch_url")]
    pub batch_url: String,

    /// API key.
    #[serde(default)]
    pub api_key: String,

    /// Result language.
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Country code restriction for matches.
    #[serde(default = "default_country_filter")]
    pub country_filter: String,

    /// Expected server-side processing time per address (ms); sizes the
    /// delay before the first status check.
    #[serde(default = "default_ms_per_address")]
    pub ms_per_address: u64,

    /// Fixed delay between status checks (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Status checks allowed before giving up on a pending job.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Refresh cadence and snapshot identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Snapshot row id.
    #[serde(default = "default_map_id")]
    pub map_id: String,

    /// Snapshot age beyond which a read triggers a background refresh (s).
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON snapshot file.
    #[serde(default = "default_store_path")]
    pub path: String,
}

/// Read boundary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the HTTP server.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_airtable_base_url() -> String {
    "https://api.airtable.com/v0".into()
}
fn default_postal_code_field() -> String {
    "Code postal".into()
}
fn default_batch_url() -> String {
    "https://api.geoapify.com/v1/batch/geocode/search".into()
}
fn default_lang() -> String {
    "fr".into()
}
fn default_country_filter() -> String {
    "ca".into()
}
fn default_ms_per_address() -> u64 {
    250
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_max_attempts() -> u32 {
    10
}
fn default_map_id() -> String {
    "1".into()
}
fn default_max_age_secs() -> u64 {
    300
}
fn default_store_path() -> String {
    "data/maps.json".into()
}
fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            base_url: default_airtable_base_url(),
            app_id: String::new(),
            table_id: String::new(),
            api_key: String::new(),
            postal_code_field: default_postal_code_field(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            batch_url: default_batch_url(),
            api_key: String::new(),
            lang: default_lang(),
            country_filter: default_country_filter(),
            ms_per_address: default_ms_per_address(),
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            map_id: default_map_id(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}
