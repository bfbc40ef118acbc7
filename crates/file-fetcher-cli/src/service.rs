use std::collections::BTreeMap;

use file_fetcher::{ErrorReport, FetchError, Job, ReportError, ReportingService};
use reqwest::Method;
use serde_json::{Value, json};

/// Reports job outcomes to the update-job API.
///
/// Every call goes to `{api_url}/update_jobs/{job_id}/{action}` with the job
/// token as the `Authorization` header.
pub struct ApiClient {
    client: reqwest::Client,
    api_url: String,
    job_id: String,
    job_token: String,
}

impl ApiClient {
    pub fn new(
        api_url: impl Into<String>,
        job_id: impl Into<String>,
        job_token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_owned(),
            job_id: job_id.into(),
            job_token: job_token.into(),
        }
    }

    fn url(&self, action: &str) -> String {
        format!("{}/update_jobs/{}/{}", self.api_url, self.job_id, action)
    }

    async fn send(&self, method: Method, action: &str, data: Value) -> Result<(), ReportError> {
        let response = self
            .client
            .request(method, self.url(action))
            .header("Authorization", &self.job_token)
            .json(&json!({ "data": data }))
            .send()
            .await
            .map_err(|e| ReportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Status(status.as_u16()));
        }

        tracing::debug!(action, "reported to job service");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReportingService for ApiClient {
    async fn record_update_job_error(&self, report: &ErrorReport) -> Result<(), ReportError> {
        let data = serde_json::to_value(report).map_err(|e| ReportError::Other(e.to_string()))?;
        self.send(Method::POST, "record_update_job_error", data).await
    }

    async fn mark_job_as_processed(&self, base_commit_sha: &str) -> Result<(), ReportError> {
        self.send(
            Method::PATCH,
            "mark_as_processed",
            json!({ "base-commit-sha": base_commit_sha }),
        )
        .await
    }

    async fn capture_exception(&self, error: &FetchError, job: &Job) -> Result<(), ReportError> {
        tracing::error!(
            error = %error,
            package_manager = job.package_manager(),
            "unexpected fetch failure"
        );

        self.send(
            Method::POST,
            "record_update_job_unknown_error",
            json!({
                "error-type": "file_fetcher_error",
                "error-details": {
                    "error-message": error.to_string(),
                    "job-id": job.id(),
                    "package-manager": job.package_manager(),
                },
            }),
        )
        .await
    }

    async fn record_package_manager_version(
        &self,
        ecosystem: &str,
        package_managers: &BTreeMap<String, String>,
    ) -> Result<(), ReportError> {
        self.send(
            Method::POST,
            "record_package_manager_version",
            json!({
                "ecosystem": ecosystem,
                "package-managers": package_managers,
            }),
        )
        .await
    }
}
