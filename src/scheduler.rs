//! Per-feed recurring execution.
//!
//! Every [`FeedJob`] gets its own supervisor task with its own timer. A
//! job never has two ticks in flight: a tick that comes due while the
//! previous one is still running is dropped.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, error, info, warn};

use crate::config::FeedJob;
use crate::error::PipelineError;

/// The work performed on each tick of a job.
#[async_trait]
pub trait TickRunner: Send + Sync + 'static {
    async fn run_tick(&self, job: &FeedJob) -> Result<(), PipelineError>;
}

pub struct FeedJobScheduler<R: ?Sized> {
    runner: Arc<R>,
}

impl<R: TickRunner + ?Sized> FeedJobScheduler<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    /// Spawns one supervisor per job. Each supervisor runs until the
    /// returned set is dropped or aborted.
    pub fn spawn(&self, jobs: Vec<FeedJob>) -> JoinSet<()> {
        let mut set = JoinSet::new();

        for job in jobs {
            let span = tracing::info_span!("feed_job", job = %job);
            set.spawn(supervise(self.runner.clone(), Arc::new(job)).instrument(span));
        }

        set
    }

    /// Runs all jobs until `shutdown` resolves.
    pub async fn run_until<F>(&self, jobs: Vec<FeedJob>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let count = jobs.len();
        let mut set = self.spawn(jobs);
        info!(jobs = count, "Scheduler started");

        shutdown.await;

        info!("Shutdown requested, stopping feed jobs");
        set.shutdown().await;
    }
}

async fn supervise<R: TickRunner + ?Sized>(runner: Arc<R>, job: Arc<FeedJob>) {
    let in_flight = Arc::new(Mutex::new(()));
    // first tick one full interval after start
    let start = tokio::time::Instant::now() + job.poll_interval;
    let mut ticker = tokio::time::interval_at(start, job.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Ok(permit) = in_flight.clone().try_lock_owned() else {
            warn!(
                interval_secs = job.poll_interval.as_secs(),
                "Previous tick still running, skipping this one"
            );
            continue;
        };

        let runner = runner.clone();
        let job = job.clone();
        tokio::spawn(
            async move {
                if let Err(e) = runner.run_tick(&job).await {
                    error!(job = %job, error = %e, "Feed tick failed");
                }
                drop(permit);
            }
            .in_current_span(),
        );
    }
}
