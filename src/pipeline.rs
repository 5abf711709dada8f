//! One tick of a feed job: fetch, decode, extract, write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::FeedJob;
use crate::error::PipelineError;
use crate::fetch::{HttpClient, fetch_feed};
use crate::parser::parse_feed;
use crate::point::MetricPoint;
use crate::scheduler::TickRunner;
use crate::stats::FeedStats;
use crate::writer::PointWriter;

/// Polls feeds through a shared transport and writes one point per tick.
pub struct FeedPipeline<C: ?Sized, W: ?Sized> {
    client: Arc<C>,
    writer: Arc<W>,
}

impl<C, W> FeedPipeline<C, W>
where
    C: HttpClient + ?Sized,
    W: PointWriter + ?Sized,
{
    pub fn new(client: Arc<C>, writer: Arc<W>) -> Self {
        Self { client, writer }
    }

    /// Runs fetch, decode and extract for `job`, returning the point built
    /// so far. Fetch and decode failures end up in the point's `error`
    /// field; this never fails.
    pub async fn collect(&self, job: &FeedJob, now: DateTime<Utc>) -> MetricPoint {
        let mut point = MetricPoint::new(job, now);

        if let Err(e) = self.observe(job, now, &mut point).await {
            warn!(
                job = %job,
                feed_url = %job.feed_url,
                error = %e,
                "Feed fetch failed"
            );
            point.record_error(&e);
        }

        point
    }

    async fn observe(
        &self,
        job: &FeedJob,
        now: DateTime<Utc>,
        point: &mut MetricPoint,
    ) -> Result<(), PipelineError> {
        let response = fetch_feed(self.client.as_ref(), &job.feed_url, job.fetch_timeout()).await?;
        point.record_response(&response);
        response.error_for_status()?;

        let feed = parse_feed(&response.body)?;
        debug!(entity_count = feed.entity.len(), "Feed parsed successfully");

        point.record_stats(&FeedStats::from_feed(&feed, now));
        Ok(())
    }

    /// Runs a full tick starting now. Only a write failure is returned.
    pub async fn tick(&self, job: &FeedJob) -> Result<MetricPoint, PipelineError> {
        let point = self.collect(job, Utc::now()).await;
        self.writer.write(&point).await?;
        Ok(point)
    }
}

#[async_trait]
impl<C, W> TickRunner for FeedPipeline<C, W>
where
    C: HttpClient + ?Sized + 'static,
    W: PointWriter + ?Sized + 'static,
{
    async fn run_tick(&self, job: &FeedJob) -> Result<(), PipelineError> {
        let point = self.tick(job).await?;
        debug!(
            error = point.fields.error.is_some(),
            "Point written"
        );
        Ok(())
    }
}
