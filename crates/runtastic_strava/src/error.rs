//! Error taxonomy for a transfer run.

use runtastic_strava_client::ApiError;
use runtastic_strava_client::gpx::GpxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("missing or invalid credentials: {0}")]
    Credential(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("upload rejected: {0}")]
    Validation(String),

    #[error("activity not found on source: {0}")]
    NotFound(String),

    #[error("encoding activity {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: GpxError,
    },
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(e) => SyncError::Transport(e.to_string()),
            ApiError::Config(msg) => SyncError::Credential(msg),
            ApiError::Auth(msg) => SyncError::Auth(msg),
            ApiError::NotFound(msg) => SyncError::NotFound(msg),
            ApiError::RateLimited(msg) => SyncError::RateLimited(msg),
            ApiError::Validation(msg) => SyncError::Validation(msg),
            e @ (ApiError::Status { .. } | ApiError::Decode(_)) => {
                SyncError::Transport(e.to_string())
            }
        }
    }
}

/// Result type alias for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
