use async_trait::async_trait;
use tracing::debug;

use super::PointWriter;
use crate::config::InfluxConfig;
use crate::error::PipelineError;
use crate::point::MetricPoint;

/// Writes points with `precision=s` to `/write` on an InfluxDB 1.x server.
///
/// No timeout is set on the client; a hanging store holds up the tick that
/// is writing.
pub struct InfluxWriter {
    client: reqwest::Client,
    write_url: reqwest::Url,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxWriter {
    pub fn new(config: &InfluxConfig) -> anyhow::Result<Self> {
        let scheme = if config.ssl { "https" } else { "http" };
        let mut write_url: reqwest::Url =
            format!("{scheme}://{}:{}/write", config.host, config.port).parse()?;
        write_url
            .query_pairs_mut()
            .append_pair("db", &config.database)
            .append_pair("precision", "s");

        Ok(Self {
            client: reqwest::Client::new(),
            write_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn write_url(&self) -> &reqwest::Url {
        &self.write_url
    }
}

#[async_trait]
impl PointWriter for InfluxWriter {
    async fn write(&self, point: &MetricPoint) -> Result<(), PipelineError> {
        // line protocol has no representation for a field-less point
        if point.fields.is_empty() {
            return Err(PipelineError::Write(format!(
                "point for {}:{} has no fields",
                point.tags.agency_id, point.tags.feed_id
            )));
        }

        let body = point.to_line_protocol();
        debug!(line = %body, "Writing point");

        let mut req = self.client.post(self.write_url.clone()).body(body);
        if let Some(username) = &self.username {
            req = req.basic_auth(username, self.password.as_ref());
        }

        let response = req
            .send()
            .await
            .map_err(|e| PipelineError::Write(format!("metrics store unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Write(format!(
                "metrics store returned status {status}: {}",
                body.trim()
            )));
        }

        Ok(())
    }
}
