//! Error Types
//!
//! Failures of the data, persistence, scenario and config layers.
//! Player-facing quest rejections live in `quest::engine::Rejection`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading quest and level data
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {source_name}: {source}")]
    Parse {
        source_name: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid data in {source_name}: {reason}")]
    Invalid { source_name: String, reason: String },

    #[error("Duplicate level id {0}")]
    DuplicateLevel(u32),
}

/// Errors raised by player-state stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode player state: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Errors raised by scenario providers
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Scenario provider is not configured")]
    NotConfigured,

    #[error("Failed to read scenarios: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode scenarios: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed scenario: {0}")]
    Malformed(String),
}

/// Errors raised while reading the engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
