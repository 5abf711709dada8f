use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport used to retrieve feeds. Shared by every job, so implementations
/// must tolerate concurrent calls.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
