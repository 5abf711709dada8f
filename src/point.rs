//! The time-series record written once per feed tick.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use crate::config::FeedJob;
use crate::error::PipelineError;
use crate::fetch::FeedResponse;
use crate::stats::FeedStats;

/// Measurement name every point is written under.
pub const MEASUREMENT: &str = "feed_fetch";

/// A typed field value in the output schema.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
}

/// Metric fields. `None` means the stage producing the field never ran or
/// had nothing to report; it is never written as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointFields {
    pub status_code: Option<i64>,
    pub response_time_ms: Option<f64>,
    pub response_size_bytes: Option<i64>,
    pub entity_count: Option<i64>,
    pub trip_update_count: Option<i64>,
    pub vehicle_position_count: Option<i64>,
    pub alert_count: Option<i64>,
    pub header_ts_age_ms: Option<f64>,
    pub entity_timestamp_ages_min_ms: Option<f64>,
    pub entity_timestamp_ages_max_ms: Option<f64>,
    pub entity_timestamp_ages_avg_ms: Option<f64>,
    pub error: Option<String>,
}

impl PointFields {
    /// Present fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FieldValue)> + '_ {
        let ints = |name, v: Option<i64>| v.map(|v| (name, FieldValue::Int(v)));
        let floats = |name, v: Option<f64>| v.map(|v| (name, FieldValue::Float(v)));

        [
            ints("status_code", self.status_code),
            floats("response_time_ms", self.response_time_ms),
            ints("response_size_bytes", self.response_size_bytes),
            ints("entity_count", self.entity_count),
            ints("trip_update_count", self.trip_update_count),
            ints("vehicle_position_count", self.vehicle_position_count),
            ints("alert_count", self.alert_count),
            floats("header_ts_age_ms", self.header_ts_age_ms),
            floats("entity_timestamp_ages_min_ms", self.entity_timestamp_ages_min_ms),
            floats("entity_timestamp_ages_max_ms", self.entity_timestamp_ages_max_ms),
            floats("entity_timestamp_ages_avg_ms", self.entity_timestamp_ages_avg_ms),
            self.error
                .as_ref()
                .map(|e| ("error", FieldValue::Str(e.clone()))),
        ]
        .into_iter()
        .flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Tags identifying the feed a point describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointTags {
    pub agency_id: String,
    pub feed_id: String,
    pub feed_url: String,
}

impl PointTags {
    fn iter(&self) -> [(&'static str, &str); 3] {
        [
            ("agency_id", self.agency_id.as_str()),
            ("feed_id", self.feed_id.as_str()),
            ("feed_url", self.feed_url.as_str()),
        ]
    }
}

/// One tick's outcome.
///
/// Built at tick start and extended by each pipeline stage. The `record_*`
/// methods only ever set fields, so the field set reflects exactly how far
/// the tick got.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub measurement: &'static str,
    pub tags: PointTags,
    pub time: DateTime<Utc>,
    pub fields: PointFields,
}

impl MetricPoint {
    pub fn new(job: &FeedJob, time: DateTime<Utc>) -> Self {
        Self {
            measurement: MEASUREMENT,
            tags: PointTags {
                agency_id: job.agency_id.clone(),
                feed_id: job.feed_id.clone(),
                feed_url: job.feed_url.clone(),
            },
            time,
            fields: PointFields::default(),
        }
    }

    /// Records status code, response time and payload size.
    pub fn record_response(&mut self, resp: &FeedResponse) -> &mut Self {
        self.fields.status_code = Some(i64::from(resp.status));
        self.fields.response_time_ms = Some(resp.elapsed.as_secs_f64() * 1_000.0);
        self.fields.response_size_bytes = Some(resp.body.len() as i64);
        self
    }

    /// Records counts and staleness derived from a decoded feed.
    pub fn record_stats(&mut self, stats: &FeedStats) -> &mut Self {
        let f = &mut self.fields;
        f.entity_count = Some(stats.entity_count as i64);
        f.trip_update_count = Some(stats.trip_update_count as i64);
        f.vehicle_position_count = Some(stats.vehicle_position_count as i64);
        f.alert_count = Some(stats.alert_count as i64);

        if let Some(age) = stats.header_ts_age_ms {
            f.header_ts_age_ms = Some(age);
        }
        if let Some(ages) = stats.entity_timestamp_ages {
            f.entity_timestamp_ages_min_ms = Some(ages.min_ms);
            f.entity_timestamp_ages_max_ms = Some(ages.max_ms);
            f.entity_timestamp_ages_avg_ms = Some(ages.avg_ms);
        }
        self
    }

    pub fn record_error(&mut self, error: &PipelineError) -> &mut Self {
        self.fields.error = Some(error.to_string());
        self
    }

    /// Renders the point as one line of InfluxDB line protocol with a
    /// timestamp in whole seconds (sub-second part truncated).
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(self.measurement, &[',', ' ']);

        for (key, value) in self.tags.iter() {
            if value.is_empty() {
                continue;
            }
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            match value {
                FieldValue::Int(v) => {
                    let _ = write!(line, "{v}i");
                }
                FieldValue::Float(v) => {
                    let _ = write!(line, "{v}");
                }
                FieldValue::Str(v) => {
                    line.push('"');
                    line.push_str(&escape(&v, &['"', '\\']));
                    line.push('"');
                }
            }
        }

        let _ = write!(line, " {}", self.time.timestamp());
        line
    }
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        // line protocol is newline-delimited
        if c == '\n' {
            out.push_str("\\n");
            continue;
        }
        out.push(c);
    }
    out
}
