//! Structured job logging.

use facecast_models::{JobId, LayoutId};
use tracing::{error, info, warn, Span};

/// Logs lifecycle events with the job id, operation and (optionally) layout attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
    layout: Option<LayoutId>,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
            layout: None,
        }
    }

    /// Logger for one sub-job of this job.
    pub fn for_layout(&self, layout: LayoutId) -> Self {
        Self {
            layout: Some(layout),
            ..self.clone()
        }
    }

    fn layout_str(&self) -> &'static str {
        self.layout.map(|l| l.as_str()).unwrap_or("-")
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            layout = self.layout_str(),
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            layout = self.layout_str(),
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            layout = self.layout_str(),
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            layout = self.layout_str(),
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            layout = self.layout_str(),
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn layout(&self) -> Option<LayoutId> {
        self.layout
    }

    /// Span carrying the same fields, for instrumenting spawned work.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation,
            layout = self.layout_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_logger_keeps_job() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "render");
        assert_eq!(logger.job_id(), job_id.to_string());
        assert!(logger.layout().is_none());

        let sub = logger.for_layout(LayoutId::Horizontal16x9);
        assert_eq!(sub.job_id(), job_id.to_string());
        assert_eq!(sub.layout(), Some(LayoutId::Horizontal16x9));
    }
}
