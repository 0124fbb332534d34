//! Configuration loader — merges env vars, .env file, and config.toml.

use common::config::AppConfig;
use common::Error;
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_positive_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    let parsed = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &AppConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.airtable.app_id.trim().is_empty() {
        issues.push("AIRTABLE_APP_ID is required".into());
    }
    if config.airtable.table_id.trim().is_empty() {
        issues.push("AIRTABLE_TABLE_ID is required".into());
    }
    if config.airtable.api_key.trim().is_empty() {
        issues.push("AIRTABLE_API_KEY is required".into());
    }
    if config.airtable.base_url.trim().is_empty() {
        issues.push("airtable.base_url must not be empty".into());
    }
    if config.airtable.postal_code_field.trim().is_empty() {
        issues.push("airtable.postal_code_field must not be empty".into());
    }

    if config.geocoding.api_key.trim().is_empty() {
        issues.push("GEOAPIFY_API_KEY is required".into());
    }
    if config.geocoding.batch_url.trim().is_empty() {
        issues.push("geocoding.batch_url must not be empty".into());
    }
    if config.geocoding.ms_per_address == 0 {
        issues.push("geocoding.ms_per_address must be > 0".into());
    }
    if config.geocoding.poll_interval_ms == 0 {
        issues.push("geocoding.poll_interval_ms must be > 0".into());
    }
    if config.geocoding.max_attempts == 0 {
        issues.push("geocoding.max_attempts must be > 0".into());
    }

    if config.refresh.map_id.trim().is_empty() {
        issues.push("refresh.map_id must not be empty".into());
    }
    if config.refresh.max_age_secs == 0 {
        issues.push("refresh.max_age_secs must be > 0".into());
    }

    if config.store.path.trim().is_empty() {
        issues.push("store.path must not be empty".into());
    }
    if config.server.listen_addr.parse::<std::net::SocketAddr>().is_err() {
        issues.push("server.listen_addr must be a valid socket address".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load service configuration from environment and optional config file.
pub fn load_config() -> Result<AppConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = AppConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(v) = std::env::var("AIRTABLE_APP_ID") {
        config.airtable.app_id = v;
    }
    if let Ok(v) = std::env::var("AIRTABLE_TABLE_ID") {
        config.airtable.table_id = v;
    }
    if let Ok(v) = std::env::var("AIRTABLE_API_KEY") {
        config.airtable.api_key = v;
    }
    if let Ok(v) = std::env::var("AIRTABLE_BASE_URL") {
        config.airtable.base_url = v;
    }
    if let Ok(v) = std::env::var("POSTAL_CODE_FIELD") {
        config.airtable.postal_code_field = v;
    }
    if let Ok(v) = std::env::var("GEOAPIFY_API_KEY") {
        config.geocoding.api_key = v;
    }
    if let Ok(v) = std::env::var("GEOAPIFY_BATCH_GEOCODING_URL") {
        config.geocoding.batch_url = v;
    }
    if let Ok(v) = std::env::var("MS_PER_ADDRESS") {
        config.geocoding.ms_per_address = parse_positive_u64(&v, "MS_PER_ADDRESS")?;
    }
    if let Ok(v) = std::env::var("POLL_INTERVAL_MS") {
        config.geocoding.poll_interval_ms = parse_positive_u64(&v, "POLL_INTERVAL_MS")?;
    }
    if let Ok(v) = std::env::var("MAX_ATTEMPTS") {
        config.geocoding.max_attempts = parse_positive_u32(&v, "MAX_ATTEMPTS")?;
    }
    if let Ok(v) = std::env::var("MAP_ID") {
        config.refresh.map_id = v;
    }
    if let Ok(v) = std::env::var("MAX_AGE_SECS") {
        config.refresh.max_age_secs = parse_positive_u64(&v, "MAX_AGE_SECS")?;
    }
    if let Ok(v) = std::env::var("SNAPSHOT_PATH") {
        config.store.path = v;
    }
    if let Ok(v) = std::env::var("LISTEN_ADDR") {
        config.server.listen_addr = v;
    }

    // 5. Validate.
    validate_config(&config)?;

    Ok(config)
}
