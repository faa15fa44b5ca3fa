//! Domain types and collaborator traits for moving activities from Runtastic to Strava,
//! with reqwest-based implementations of both services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub mod config;
pub mod gpx;
pub mod rate_limit;
pub mod runtastic;
pub mod strava;
pub mod utils;

pub use rate_limit::RateLimitState;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("rejected by server: {0}")]
    Validation(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decoding response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ApiError::Auth(body),
            404 => ApiError::NotFound(body),
            429 => ApiError::RateLimited(body),
            400 | 409 | 422 => ApiError::Validation(body),
            _ => ApiError::Status { status, body },
        }
    }
}

/// The service an activity record was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    Runtastic,
    Strava,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivitySummary {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub source: Service,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ActivityType {
    Running,
    Biking,
    Swimming,
    Walking,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackPoint {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub heart_rate: Option<u16>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActivityDetail {
    pub id: String,
    pub activity_type: ActivityType,
    pub notes: Option<String>,
    /// Ordered by time, oldest first.
    pub track_points: Vec<TrackPoint>,
}

impl ActivityDetail {
    /// Time of the first GPS sample, which is what Strava records as the start.
    pub fn first_point_time(&self) -> Option<DateTime<Utc>> {
        self.track_points.first().map(|p| p.time)
    }
}

/// A file submitted to the destination's upload endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadRequest {
    pub data_type: String,
    pub filename: String,
    pub file: Vec<u8>,
    pub activity_type: String,
    pub description: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct UploadReceipt {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub status: Option<String>,
    pub error: Option<String>,
    pub activity_id: Option<u64>,
}

/// Accept ids sent either as JSON strings or numbers.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// An authenticated session against the service activities are copied from.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Every activity summary on the account, newest first.
    async fn list_metadata(&self) -> Result<Vec<ActivitySummary>, ApiError>;
    async fn get_activity(&self, activity_id: &str) -> Result<ActivityDetail, ApiError>;
}

/// The service activities are copied to.
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// One page of the athlete's activities, newest first. Pages start at 1 and an
    /// empty page marks the end of the listing.
    async fn list_activities(&self, page: u32) -> Result<Vec<ActivitySummary>, ApiError>;
    async fn create_upload(&self, upload: UploadRequest) -> Result<UploadReceipt, ApiError>;
    /// Usage counters from the most recent response, if any response carried them.
    fn rate_limit(&self) -> Option<RateLimitState>;
}
