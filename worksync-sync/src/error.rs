//! Error types for worksync-sync.

use thiserror::Error;

use worksync_core::CoreError;

/// Failures talking to a remote service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was superseded and cancelled by the caller.
    #[error("request aborted")]
    Aborted,

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The configured server URL cannot address endpoints.
    #[error("invalid server URL {0}")]
    InvalidUrl(String),

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// No answer within the configured bound.
    #[error("request timed out")]
    Timeout,

    /// The response body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

/// All errors that can arise from sync and generation operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// A context read or write failed.
    #[error("context service error: {0}")]
    Service(#[from] ServiceError),

    /// A generation request failed; the iteration history is unchanged.
    #[error("generation failed: {0}")]
    GenerationFailed(#[source] ServiceError),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("background task failed: {0}")]
    Join(String),
}
