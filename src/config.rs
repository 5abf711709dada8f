//! Monitor configuration: polling interval, metrics store, and feed list.
//!
//! The file is JSON:
//! ```json
//! {
//!   "interval": 30,
//!   "influxdb": { "host": "localhost", "database": "gtfs_rt" },
//!   "agencies": {
//!     "mbta": { "vehicle_positions": "https://cdn.mbta.com/realtime/VehiclePositions.pb" }
//!   }
//! }
//! ```
//! It is validated once into an [`AppConfig`] holding one [`FeedJob`] per
//! configured feed.

use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

const DEFAULT_INFLUXDB_PORT: u16 = 8086;
const PASSWORD_ENV: &str = "INFLUXDB_PASSWORD";

/// One feed to poll. Identified by `(agency_id, feed_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedJob {
    pub agency_id: String,
    pub feed_id: String,
    pub feed_url: String,
    pub poll_interval: Duration,
}

impl FeedJob {
    /// Fetches are bounded by half the polling interval.
    pub fn fetch_timeout(&self) -> Duration {
        self.poll_interval / 2
    }
}

impl fmt::Display for FeedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.agency_id, self.feed_id)
    }
}

/// Connection parameters for the InfluxDB 1.x HTTP API.
#[derive(Clone, Deserialize)]
pub struct InfluxConfig {
    pub host: String,
    #[serde(default = "default_influxdb_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub database: String,
    #[serde(default)]
    pub ssl: bool,
}

fn default_influxdb_port() -> u16 {
    DEFAULT_INFLUXDB_PORT
}

impl fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("ssl", &self.ssl)
            .finish()
    }
}

#[derive(Deserialize)]
struct RawConfig {
    interval: u64,
    influxdb: InfluxConfig,
    #[serde(default)]
    agencies: BTreeMap<String, BTreeMap<String, String>>,
}

/// Validated configuration. Nothing downstream sees the raw file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub interval: Duration,
    pub influxdb: InfluxConfig,
    pub jobs: Vec<FeedJob>,
}

impl AppConfig {
    /// Reads and validates the config file at `path`.
    ///
    /// A missing `influxdb.password` falls back to `INFLUXDB_PASSWORD`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let mut config = Self::from_json_str(&content)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;

        if config.influxdb.password.is_none() {
            config.influxdb.password = std::env::var(PASSWORD_ENV).ok();
        }

        Ok(config)
    }

    /// Parses and validates a JSON config document.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(content)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self> {
        ensure!(raw.interval > 0, "interval must be a positive number of seconds");
        ensure!(!raw.influxdb.host.is_empty(), "influxdb.host must not be empty");
        ensure!(
            !raw.influxdb.database.is_empty(),
            "influxdb.database must not be empty"
        );

        let interval = Duration::from_secs(raw.interval);
        let mut jobs = Vec::new();

        for (agency_id, feeds) in raw.agencies {
            ensure!(!agency_id.is_empty(), "agency id must not be empty");

            for (feed_id, feed_url) in feeds {
                ensure!(!feed_id.is_empty(), "feed id in agency '{agency_id}' must not be empty");
                validate_url(&feed_url)
                    .with_context(|| format!("feed '{agency_id}:{feed_id}'"))?;

                jobs.push(FeedJob {
                    agency_id: agency_id.clone(),
                    feed_id,
                    feed_url,
                    poll_interval: interval,
                });
            }
        }

        ensure!(!jobs.is_empty(), "no feeds configured");

        Ok(Self {
            interval,
            influxdb: raw.influxdb,
            jobs,
        })
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("invalid url '{url}'"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => bail!("unsupported url scheme '{other}' in '{url}'"),
    }
}
