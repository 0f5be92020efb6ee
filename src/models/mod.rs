use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Where a request's result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Cache,
    Appliance,
}

// One processed request, logged as JSON at debug level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub key: String,
    pub source: ResultSource,
    pub connection_id: Option<u64>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ProcessingRecord {
    pub fn cache_hit(key: &str, duration_ms: u64) -> Self {
        Self {
            key: key.to_string(),
            source: ResultSource::Cache,
            connection_id: None,
            success: true,
            error: None,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn appliance(
        key: &str,
        connection_id: u64,
        error: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            key: key.to_string(),
            source: ResultSource::Appliance,
            connection_id: Some(connection_id),
            success: error.is_none(),
            error,
            duration_ms,
            timestamp: Utc::now(),
        }
    }
}
