//! Per-sub-job progress.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Shared, monotonic progress counter for one sub-job.
///
/// Renderers report into it; the orchestrator reads it when building a
/// status snapshot. Values never decrease and are capped at 99 until the
/// orchestrator records the terminal event.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    current: Arc<AtomicU8>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a percentage. Lower values than already seen are ignored.
    pub fn report(&self, percent: u8) {
        self.current.fetch_max(percent.min(99), Ordering::Relaxed);
    }

    /// Report progress as a fraction of the whole render.
    pub fn report_fraction(&self, fraction: f64) {
        if fraction.is_finite() {
            self.report((fraction.clamp(0.0, 1.0) * 100.0) as u8);
        }
    }

    /// Map a stage-local fraction into `[start, end]` percent.
    pub fn report_stage(&self, start: u8, end: u8, fraction: f64) {
        if !fraction.is_finite() || end < start {
            return;
        }
        let span = (end - start) as f64;
        self.report(start + (fraction.clamp(0.0, 1.0) * span) as u8);
    }

    pub fn current(&self) -> u8 {
        self.current.load(Ordering::Relaxed)
    }
}
