use std::io;

/// Errors that can occur while fetching dependency files for a job.
///
/// Every variant is a condition the classifier knows how to report.
/// Anything that doesn't fit a known condition lands in `Other`.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("branch not found: {branch_name}")]
    BranchNotFound { branch_name: String },

    #[error("repository not found: {0}")]
    RepoNotFound(String),

    #[error("{file_path} is not parseable: {message}")]
    DependencyFileNotParseable { file_path: String, message: String },

    #[error("dependency file not found: {file_path}")]
    DependencyFileNotFound { file_path: String },

    #[error("out of disk space")]
    OutOfDisk,

    #[error("path dependencies not reachable: {}", dependencies.join(", "))]
    PathDependenciesNotReachable { dependencies: Vec<String> },

    #[error("upstream rejected credentials")]
    Unauthorized,

    /// Rate limited by the hosting provider. `reset` is the epoch second at
    /// which the current window ends, when the response carried one.
    #[error("rate limited by upstream")]
    RateLimited { reset: Option<u64> },

    #[error("upstream returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("base commit SHA not found")]
    MissingCommit,

    #[error("no fetcher registered for package manager: {0}")]
    UnsupportedPackageManager(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// An upstream 502. The only fault eligible for retry.
    pub fn is_bad_gateway(&self) -> bool {
        matches!(self, Self::Upstream { status: 502, .. })
    }

    /// Any upstream 5xx.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Upstream { status, .. } if (500..600).contains(status))
    }
}

impl From<io::Error> for FetchError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::StorageFull {
            Self::OutOfDisk
        } else {
            Self::Io(error)
        }
    }
}
