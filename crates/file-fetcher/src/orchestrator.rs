use std::sync::Arc;
use std::time::SystemTime;

use tracing::Instrument;

use crate::classify::{Classification, ErrorReport, Handling, classify, rate_limit_remaining};
use crate::error::FetchError;
use crate::fetcher::{Fetcher, FetcherArgs};
use crate::file::{FetchResult, UNKNOWN_COMMIT};
use crate::job::Job;
use crate::probe::ConnectivityProbe;
use crate::registry::FetcherRegistry;
use crate::report::ReportingService;
use crate::retry::retry_bad_gateway;
use crate::sink::ResultSink;

/// How a run ended. Failures have already been reported by the time this
/// is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Fetched(FetchResult),
    Failed(ErrorReport),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }
}

/// Runs one fetch job end to end: probe, clone, commit, files, persist.
pub struct Orchestrator {
    registry: Arc<FetcherRegistry>,
    reporter: Arc<dyn ReportingService>,
    sink: Arc<dyn ResultSink>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<FetcherRegistry>,
        reporter: Arc<dyn ReportingService>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            registry,
            reporter,
            sink,
            probe: None,
        }
    }

    /// Check connectivity to the source host before fetching.
    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Fetch the job's dependency files.
    ///
    /// Never fails: errors are classified and sent to the reporting service.
    /// The job is marked as processed exactly once either way.
    pub async fn run(&self, job: &Job) -> RunOutcome {
        let span = tracing::info_span!(
            "fetch_files",
            job_id = job.id(),
            package_manager = job.package_manager(),
        );

        async {
            let mut base_commit_sha = None;

            match self.fetch(job, &mut base_commit_sha).await {
                Ok(result) => {
                    tracing::info!(
                        base_commit_sha = %result.base_commit_sha,
                        files = result.files.len(),
                        "fetched dependency files"
                    );
                    self.mark_processed(&result.base_commit_sha).await;
                    RunOutcome::Fetched(result)
                }
                Err(error) => {
                    let sha = base_commit_sha.unwrap_or_else(|| UNKNOWN_COMMIT.to_owned());

                    if let FetchError::RateLimited { reset } = &error {
                        let remaining = rate_limit_remaining(*reset, SystemTime::now());
                        tracing::error!(
                            "repository is rate limited, attempting to retry in {}s",
                            remaining.as_secs()
                        );
                    } else {
                        tracing::error!(%error, "error during file fetching; aborting");
                    }

                    let report = self.report_failure(&error, job).await;
                    self.mark_processed(&sha).await;
                    RunOutcome::Failed(report)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn fetch(
        &self,
        job: &Job,
        base_commit_sha: &mut Option<String>,
    ) -> Result<FetchResult, FetchError> {
        if let Some(probe) = &self.probe {
            check_connectivity(probe.as_ref(), job).await;
        }

        let clone = job.clone_enabled() || self.registry.always_clones(job.package_manager());
        let already_cloned = job.already_cloned();

        // A mounted checkout is read from disk even when cloning is off.
        let args = FetcherArgs {
            source: job.source().clone(),
            credentials: job.credentials().to_vec(),
            options: job.experiments().clone(),
            repo_contents_path: (clone || already_cloned)
                .then(|| job.repo_contents_path().map(|p| p.to_owned()))
                .flatten(),
        };
        let fetcher = self.registry.build(job.package_manager(), args)?;
        let fetcher: &dyn Fetcher = fetcher.as_ref();

        if clone && already_cloned {
            tracing::info!("repository contents already present; skipping clone");
        } else if clone {
            fetcher.clone_repo_contents().await?;
        }

        let sha = fetcher
            .commit()
            .await?
            .filter(|sha| !sha.is_empty())
            .ok_or(FetchError::MissingCommit)?;
        *base_commit_sha = Some(sha.clone());

        let files = retry_bad_gateway(move || fetcher.files()).await?;

        self.record_version(fetcher).await;

        let result = FetchResult {
            files,
            base_commit_sha: sha,
        };
        self.sink.persist(&result, job).await?;

        Ok(result)
    }

    /// Report the package-manager versions detected in the fetched files.
    ///
    /// Runs after the files are retrieved, since detection reads them.
    /// Telemetry failures are logged and never fail the run.
    async fn record_version(&self, fetcher: &dyn Fetcher) {
        let version = match fetcher.package_manager_version().await {
            Ok(Some(version)) => version,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "could not detect package manager version");
                return;
            }
        };

        if let Err(e) = self
            .reporter
            .record_package_manager_version(&version.ecosystem, &version.package_managers)
            .await
        {
            tracing::warn!(error = %e, "failed to record package manager version");
        }
    }

    async fn report_failure(&self, error: &FetchError, job: &Job) -> ErrorReport {
        let Classification { report, handling } = classify(error);

        match handling {
            Handling::Expected => {}
            Handling::Upstream => {
                tracing::warn!(%error, "upstream server error; nothing to do but report it");
            }
            Handling::Unexpected => {
                tracing::error!(?error, "unexpected error during file fetching");
                if let Err(e) = self.reporter.capture_exception(error, job).await {
                    tracing::warn!(error = %e, "failed to capture exception");
                }
            }
        }

        if let Err(e) = self.reporter.record_update_job_error(&report).await {
            tracing::warn!(error = %e, error_type = report.error_type(), "failed to record job error");
        }

        report
    }

    async fn mark_processed(&self, base_commit_sha: &str) {
        if let Err(e) = self.reporter.mark_job_as_processed(base_commit_sha).await {
            tracing::warn!(error = %e, "failed to mark job as processed");
        }
    }
}

async fn check_connectivity(probe: &dyn ConnectivityProbe, job: &Job) {
    tracing::info!("connectivity check starting");
    match probe.check(job.source()).await {
        Ok(()) => tracing::info!("connectivity check successful"),
        Err(e) => tracing::error!("connectivity check failed: {e}"),
    }
}
