//! Background expiry of published artifacts and finished job records.
//!
//! Each cycle deletes artifacts older than the result store's TTL and drops
//! terminal jobs that completed before the same cutoff.

use std::time::Duration;

use chrono::{DateTime, Utc};
use facecast_worker::JobOrchestrator;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::metrics;

/// Periodic artifact sweeper.
pub struct ArtifactSweeper {
    orchestrator: JobOrchestrator,
    every: Duration,
    enabled: bool,
}

impl ArtifactSweeper {
    pub fn new(orchestrator: JobOrchestrator, every: Duration) -> Self {
        let enabled = std::env::var("ENABLE_ARTIFACT_SWEEP")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Self {
            orchestrator,
            every,
            enabled,
        }
    }

    /// Run until the task is dropped.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Artifact sweeping is disabled");
            return;
        }

        info!("Starting artifact sweeper (interval: {:?})", self.every);
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.sweep_once(Utc::now()).await;
        }
    }

    /// One sweep cycle. Returns (artifacts removed, jobs pruned).
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> (usize, usize) {
        let (artifacts, jobs) = self.orchestrator.expire(now).await;
        metrics::record_expired(artifacts);

        if artifacts > 0 || jobs > 0 {
            info!(artifacts, jobs, "Expired artifacts and job records");
        } else {
            debug!("Sweep found nothing to expire");
        }
        (artifacts, jobs)
    }
}
