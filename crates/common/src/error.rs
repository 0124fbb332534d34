//! Unified error type for event-map.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Record provider error: {0}")]
    Provider(String),

    #[error("Geocoding batch submission rejected (status={status}): {message}")]
    SubmissionRejected { status: u16, message: String },

    #[error("Geocoding job still pending after {attempts} poll attempts")]
    PollExhausted { attempts: u32 },

    #[error("Geocoding job failed: {0}")]
    JobFailed(String),

    #[error("Snapshot store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
