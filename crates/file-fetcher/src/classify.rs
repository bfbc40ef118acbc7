use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::FetchError;

/// The closed set of failures reported to the job service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    BranchNotFound { branch_name: String },
    JobRepoNotFound,
    DependencyFileNotParseable { message: String, file_path: String },
    DependencyFileNotFound { file_path: String },
    OutOfDisk,
    PathDependenciesNotReachable { dependencies: Vec<String> },
    OctokitUnauthorized,
    OctokitRateLimited { rate_limit_reset: Option<u64> },
    UnknownError,
}

impl ErrorKind {
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BranchNotFound { .. } => "branch_not_found",
            Self::JobRepoNotFound => "job_repo_not_found",
            Self::DependencyFileNotParseable { .. } => "dependency_file_not_parseable",
            Self::DependencyFileNotFound { .. } => "dependency_file_not_found",
            Self::OutOfDisk => "out_of_disk",
            Self::PathDependenciesNotReachable { .. } => "path_dependencies_not_reachable",
            Self::OctokitUnauthorized => "octokit_unauthorized",
            Self::OctokitRateLimited { .. } => "octokit_rate_limited",
            Self::UnknownError => "unknown_error",
        }
    }

    pub fn error_detail(&self) -> Value {
        match self {
            Self::BranchNotFound { branch_name } => json!({ "branch-name": branch_name }),
            Self::DependencyFileNotParseable { message, file_path } => {
                json!({ "message": message, "file-path": file_path })
            }
            Self::DependencyFileNotFound { file_path } => json!({ "file-path": file_path }),
            Self::PathDependenciesNotReachable { dependencies } => {
                json!({ "dependencies": dependencies })
            }
            Self::OctokitRateLimited { rate_limit_reset } => {
                json!({ "rate-limit-reset": rate_limit_reset })
            }
            Self::JobRepoNotFound
            | Self::OutOfDisk
            | Self::OctokitUnauthorized
            | Self::UnknownError => json!({}),
        }
    }
}

/// What gets sent to `record_update_job_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
}

impl ErrorReport {
    pub fn error_type(&self) -> &'static str {
        self.kind.error_type()
    }

    pub fn error_detail(&self) -> Value {
        self.kind.error_detail()
    }
}

impl Serialize for ErrorReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            #[serde(rename = "error-type")]
            error_type: &'a str,
            #[serde(rename = "error-details")]
            error_details: Value,
        }

        Wire {
            error_type: self.error_type(),
            error_details: self.error_detail(),
        }
        .serialize(serializer)
    }
}

/// How loudly a classified failure should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    /// A known failure. Report it.
    Expected,
    /// The hosting provider failed. Report it, log it, nothing more.
    Upstream,
    /// Not recognised. Report it and capture the exception.
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub report: ErrorReport,
    pub handling: Handling,
}

/// Map a fetch failure onto the reported taxonomy.
pub fn classify(error: &FetchError) -> Classification {
    let (kind, handling) = match error {
        FetchError::BranchNotFound { branch_name } => (
            ErrorKind::BranchNotFound {
                branch_name: branch_name.clone(),
            },
            Handling::Expected,
        ),
        // Also covers tokens that can't see the repository.
        FetchError::RepoNotFound(_) => (ErrorKind::JobRepoNotFound, Handling::Expected),
        FetchError::DependencyFileNotParseable { file_path, message } => (
            ErrorKind::DependencyFileNotParseable {
                message: message.clone(),
                file_path: file_path.clone(),
            },
            Handling::Expected,
        ),
        FetchError::DependencyFileNotFound { file_path } => (
            ErrorKind::DependencyFileNotFound {
                file_path: file_path.clone(),
            },
            Handling::Expected,
        ),
        FetchError::OutOfDisk => (ErrorKind::OutOfDisk, Handling::Expected),
        FetchError::PathDependenciesNotReachable { dependencies } => (
            ErrorKind::PathDependenciesNotReachable {
                dependencies: dependencies.clone(),
            },
            Handling::Expected,
        ),
        FetchError::Unauthorized => (ErrorKind::OctokitUnauthorized, Handling::Expected),
        FetchError::RateLimited { reset } => (
            ErrorKind::OctokitRateLimited {
                rate_limit_reset: *reset,
            },
            Handling::Expected,
        ),
        e if e.is_server_error() => (ErrorKind::UnknownError, Handling::Upstream),
        FetchError::Upstream { .. }
        | FetchError::MissingCommit
        | FetchError::UnsupportedPackageManager(_)
        | FetchError::Network(_)
        | FetchError::Io(_)
        | FetchError::Other(_) => (ErrorKind::UnknownError, Handling::Unexpected),
    };

    Classification {
        report: ErrorReport { kind },
        handling,
    }
}

/// Time left until a rate limit window resets. Never negative.
pub fn rate_limit_remaining(reset: Option<u64>, now: SystemTime) -> Duration {
    let reset_at = UNIX_EPOCH + Duration::from_secs(reset.unwrap_or(0));
    reset_at.duration_since(now).unwrap_or(Duration::ZERO)
}
