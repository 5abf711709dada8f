mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use bytes::Bytes;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::PipelineError;

/// Transport-level observables of one feed retrieval.
#[derive(Debug, Clone)]
pub struct FeedResponse {
    pub url: String,
    pub status: u16,
    pub elapsed: Duration,
    pub body: Bytes,
}

impl FeedResponse {
    /// Fails with [`PipelineError::Http`] on a 4xx or 5xx status.
    pub fn error_for_status(&self) -> Result<(), PipelineError> {
        if (400..600).contains(&self.status) {
            return Err(PipelineError::Http {
                status: self.status,
                url: self.url.clone(),
            });
        }
        Ok(())
    }
}

/// Retrieves `url`, reading the whole body within `timeout`.
///
/// `elapsed` stops once the response headers arrive; the body download is
/// bounded by `timeout` but not counted.
///
/// Any response, whatever its status, is returned as `Ok`; callers decide
/// what to do with a failing status via [`FeedResponse::error_for_status`].
///
/// # Errors
///
/// Returns [`PipelineError::Network`] if the URL is invalid, the request
/// fails before a complete response is read, or `timeout` elapses.
pub async fn fetch_feed<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    timeout: Duration,
) -> Result<FeedResponse, PipelineError> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse()
            .map_err(|e| PipelineError::Network(format!("invalid url '{url}': {e}")))?,
    );

    let start = Instant::now();
    let (status, elapsed, body) = tokio::time::timeout(timeout, async {
        let resp = client.execute(req).await?;
        let elapsed = start.elapsed();
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok::<_, reqwest::Error>((status, elapsed, body))
    })
    .await
    .map_err(|_| {
        PipelineError::Network(format!("request timed out after {}ms", timeout.as_millis()))
    })??;

    debug!(status, bytes = body.len(), elapsed_ms = elapsed.as_millis() as u64, "Feed fetched");

    Ok(FeedResponse {
        url: url.to_string(),
        status,
        elapsed,
        body,
    })
}
