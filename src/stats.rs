//! Health and freshness metrics derived from a decoded feed.

use chrono::{DateTime, Utc};

use crate::gtfs_rt::{FeedEntity, FeedMessage};

/// Min/max/mean of entity timestamp ages, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeSummary {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

impl AgeSummary {
    /// `None` when there are no ages; an empty feed has no staleness to report.
    pub fn from_ages(ages: &[f64]) -> Option<Self> {
        if ages.is_empty() {
            return None;
        }
        let min_ms = ages.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = ages.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg_ms = ages.iter().sum::<f64>() / ages.len() as f64;

        Some(Self {
            min_ms,
            max_ms,
            avg_ms,
        })
    }
}

/// The payload an entity carries, for counting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    TripUpdate,
    VehiclePosition,
    Alert,
}

impl EntityKind {
    /// Classifies an entity. A well-formed entity carries exactly one
    /// payload; if several are set the first of trip update, vehicle,
    /// alert wins.
    pub fn of(entity: &FeedEntity) -> Option<Self> {
        if entity.trip_update.is_some() {
            Some(Self::TripUpdate)
        } else if entity.vehicle.is_some() {
            Some(Self::VehiclePosition)
        } else if entity.alert.is_some() {
            Some(Self::Alert)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedStats {
    pub entity_count: u64,
    pub trip_update_count: u64,
    pub vehicle_position_count: u64,
    pub alert_count: u64,

    pub header_ts_age_ms: Option<f64>,
    pub entity_timestamp_ages: Option<AgeSummary>,
}

impl FeedStats {
    /// Walks `feed` once, measuring staleness relative to `now`.
    ///
    /// Ages are `now - timestamp` and are negative for future-dated feeds.
    /// Trip update and vehicle position timestamps feed the age summary;
    /// alerts have no single timestamp and never do.
    pub fn from_feed(feed: &FeedMessage, now: DateTime<Utc>) -> Self {
        let mut s = FeedStats {
            header_ts_age_ms: feed.header.timestamp.map(|ts| age_ms(now, ts)),
            ..Default::default()
        };

        let mut ages = Vec::new();

        for e in &feed.entity {
            s.entity_count += 1;

            match EntityKind::of(e) {
                Some(EntityKind::TripUpdate) => s.trip_update_count += 1,
                Some(EntityKind::VehiclePosition) => s.vehicle_position_count += 1,
                Some(EntityKind::Alert) => s.alert_count += 1,
                None => {}
            }

            if let Some(ts) = e.trip_update.as_ref().and_then(|t| t.timestamp) {
                ages.push(age_ms(now, ts));
            }

            if let Some(ts) = e.vehicle.as_ref().and_then(|v| v.timestamp) {
                ages.push(age_ms(now, ts));
            }
        }

        s.entity_timestamp_ages = AgeSummary::from_ages(&ages);
        s
    }
}

/// Milliseconds between POSIX-seconds `ts` and `now`, with sub-millisecond
/// precision kept from `now`.
pub fn age_ms(now: DateTime<Utc>, ts: u64) -> f64 {
    let now_us = now.timestamp_micros() as f64;
    let ts_us = ts as f64 * 1_000_000.0;
    (now_us - ts_us) / 1_000.0
}
