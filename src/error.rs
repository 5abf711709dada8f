//! Failure taxonomy for a single feed tick.

use thiserror::Error;

/// Everything that can go wrong while polling one feed.
///
/// `Network`, `Http` and `Decode` are absorbed into the tick's metric point
/// as its `error` field. `Write` escapes the tick and is reported at the
/// job boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable response: DNS, connect, body read, or the fetch timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// A complete response arrived with a 4xx/5xx status.
    #[error("HTTP error: status {status} for url {url}")]
    Http { status: u16, url: String },

    /// The payload is not a well-formed GTFS-RT `FeedMessage`.
    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The metrics store was unreachable or rejected the point.
    #[error("Write error: {0}")]
    Write(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        PipelineError::Network(e.to_string())
    }
}
