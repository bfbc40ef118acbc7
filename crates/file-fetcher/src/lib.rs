pub mod classify;
pub mod error;
pub mod fetcher;
pub mod file;
pub mod job;
pub mod orchestrator;
pub mod probe;
pub mod registry;
pub mod report;
pub mod retry;
pub mod sink;

pub use classify::{Classification, ErrorKind, ErrorReport, Handling, classify, rate_limit_remaining};
pub use error::FetchError;
pub use fetcher::{Fetcher, FetcherArgs, PackageManagerVersion};
pub use file::{
    DependencyFile, EncodedDependencyFile, FetchArtifact, FetchResult, FileContent, JobSnapshot,
    UNKNOWN_COMMIT,
};
pub use job::{Credential, Job, JobError, Source, git_token};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use probe::ConnectivityProbe;
pub use registry::FetcherRegistry;
pub use report::{ReportError, ReportingService};
pub use retry::{MAX_BAD_GATEWAY_RETRIES, retry_bad_gateway};
pub use sink::ResultSink;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
