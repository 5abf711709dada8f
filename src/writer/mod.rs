//! Persistence of metric points.
//!
//! [`PointWriter`] is the async seam between the pipeline and the metrics
//! store. [`InfluxWriter`] implements it over the InfluxDB 1.x HTTP API.

mod influx;

pub use influx::InfluxWriter;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::point::MetricPoint;

/// Hands one completed point to the metrics store.
///
/// Called concurrently from every feed job.
#[async_trait]
pub trait PointWriter: Send + Sync {
    async fn write(&self, point: &MetricPoint) -> Result<(), PipelineError>;
}
