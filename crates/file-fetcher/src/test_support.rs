use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    ConnectivityProbe, DependencyFile, ErrorReport, FetchError, FetchResult, Fetcher, Job,
    PackageManagerVersion, ReportError, ReportingService, ResultSink, Source,
};

/// Scripted fetcher. Failures queued with `fail_files` are returned one per
/// call before the configured files are.
pub struct StubFetcher {
    commit: Option<String>,
    files: Vec<DependencyFile>,
    version: Option<PackageManagerVersion>,
    clone_error: Mutex<Option<FetchError>>,
    commit_error: Mutex<Option<FetchError>>,
    file_errors: Mutex<VecDeque<FetchError>>,
    clone_calls: AtomicUsize,
    file_calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new(commit: impl Into<String>) -> Self {
        Self::build(Some(commit.into()))
    }

    /// A fetcher that reports no commit at all.
    pub fn without_commit() -> Self {
        Self::build(None)
    }

    fn build(commit: Option<String>) -> Self {
        Self {
            commit,
            files: Vec::new(),
            version: None,
            clone_error: Mutex::new(None),
            commit_error: Mutex::new(None),
            file_errors: Mutex::new(VecDeque::new()),
            clone_calls: AtomicUsize::new(0),
            file_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_files(mut self, files: Vec<DependencyFile>) -> Self {
        self.files = files;
        self
    }

    pub fn with_version(mut self, version: PackageManagerVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn fail_clone(self, error: FetchError) -> Self {
        *self.clone_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_commit(self, error: FetchError) -> Self {
        *self.commit_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_files(self, errors: impl IntoIterator<Item = FetchError>) -> Self {
        self.file_errors.lock().unwrap().extend(errors);
        self
    }

    pub fn clone_calls(&self) -> usize {
        self.clone_calls.load(Ordering::SeqCst)
    }

    pub fn file_calls(&self) -> usize {
        self.file_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn clone_repo_contents(&self) -> Result<(), FetchError> {
        self.clone_calls.fetch_add(1, Ordering::SeqCst);
        match self.clone_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn commit(&self) -> Result<Option<String>, FetchError> {
        match self.commit_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(self.commit.clone()),
        }
    }

    async fn files(&self) -> Result<Vec<DependencyFile>, FetchError> {
        self.file_calls.fetch_add(1, Ordering::SeqCst);
        match self.file_errors.lock().unwrap().pop_front() {
            Some(e) => Err(e),
            None => Ok(self.files.clone()),
        }
    }

    async fn package_manager_version(&self) -> Result<Option<PackageManagerVersion>, FetchError> {
        Ok(self.version.clone())
    }
}

/// A call received by `RecordingReporter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Error(ErrorReport),
    Processed(String),
    Exception(String),
    PackageManagerVersion {
        ecosystem: String,
        package_managers: BTreeMap<String, String>,
    },
}

/// Reporting service that records every call. A failing reporter still
/// records the call before returning an error.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
    failing: bool,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<ErrorReport> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::Error(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn processed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::Processed(sha) => Some(sha),
                _ => None,
            })
            .collect()
    }

    pub fn exceptions(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::Exception(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ReportEvent) -> Result<(), ReportError> {
        self.events.lock().unwrap().push(event);
        if self.failing {
            Err(ReportError::Status(503))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ReportingService for RecordingReporter {
    async fn record_update_job_error(&self, report: &ErrorReport) -> Result<(), ReportError> {
        self.record(ReportEvent::Error(report.clone()))
    }

    async fn mark_job_as_processed(&self, base_commit_sha: &str) -> Result<(), ReportError> {
        self.record(ReportEvent::Processed(base_commit_sha.to_owned()))
    }

    async fn capture_exception(&self, error: &FetchError, _job: &Job) -> Result<(), ReportError> {
        self.record(ReportEvent::Exception(error.to_string()))
    }

    async fn record_package_manager_version(
        &self,
        ecosystem: &str,
        package_managers: &BTreeMap<String, String>,
    ) -> Result<(), ReportError> {
        self.record(ReportEvent::PackageManagerVersion {
            ecosystem: ecosystem.to_owned(),
            package_managers: package_managers.clone(),
        })
    }
}

/// Sink that keeps results in memory.
#[derive(Default)]
pub struct MemorySink {
    results: Mutex<Vec<FetchResult>>,
    error: Mutex<Option<FetchError>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose first write fails with `error`.
    pub fn failing(error: FetchError) -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            error: Mutex::new(Some(error)),
        }
    }

    pub fn results(&self) -> Vec<FetchResult> {
        self.results.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ResultSink for MemorySink {
    async fn persist(&self, result: &FetchResult, _job: &Job) -> Result<(), FetchError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }
}

/// Probe that counts calls and optionally fails.
#[derive(Default)]
pub struct StubProbe {
    failing: bool,
    calls: AtomicUsize,
}

impl StubProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConnectivityProbe for StubProbe {
    async fn check(&self, _source: &Source) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            Err(FetchError::Network("connection timed out".into()))
        } else {
            Ok(())
        }
    }
}
