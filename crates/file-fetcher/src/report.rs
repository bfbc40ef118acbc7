use std::collections::BTreeMap;

use crate::classify::ErrorReport;
use crate::error::FetchError;
use crate::job::Job;

/// Errors from the job reporting service.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("service returned HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Other(String),
}

/// Receives the outcome of a fetch job.
#[async_trait::async_trait]
pub trait ReportingService: Send + Sync {
    async fn record_update_job_error(&self, report: &ErrorReport) -> Result<(), ReportError>;

    /// Signals that the job is finished. Sent exactly once per run.
    async fn mark_job_as_processed(&self, base_commit_sha: &str) -> Result<(), ReportError>;

    /// Forward an unrecognised failure with enough context to debug it.
    async fn capture_exception(&self, error: &FetchError, job: &Job) -> Result<(), ReportError>;

    async fn record_package_manager_version(
        &self,
        ecosystem: &str,
        package_managers: &BTreeMap<String, String>,
    ) -> Result<(), ReportError>;
}
