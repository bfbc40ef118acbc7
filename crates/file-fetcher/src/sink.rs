use crate::error::FetchError;
use crate::file::FetchResult;
use crate::job::Job;

/// Durable storage for a successful fetch.
#[async_trait::async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, result: &FetchResult, job: &Job) -> Result<(), FetchError>;
}
