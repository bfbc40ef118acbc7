mod config;
mod ecosystems;
mod logging;
mod service;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use file_fetcher::{Orchestrator, RunOutcome};
use file_fetcher_github::GitHubProbe;
use file_fetcher_store::FileResultSink;

use crate::config::Config;
use crate::service::ApiClient;

/// Run one fetch job end to end. The outcome has already been reported to
/// the job service by the time this returns.
async fn execute(config: &Config) -> Result<RunOutcome> {
    let job = config::load_job(config)?;

    let mut sink = FileResultSink::new(&config.output_path);
    if let Some(path) = config.snapshot_path() {
        sink = sink.with_snapshot(path);
    }

    let service = ApiClient::new(&config.api_url, &config.job_id, &config.job_token);

    let registry = ecosystems::registry();
    tracing::debug!(
        package_managers = ?registry.package_managers().collect::<Vec<_>>(),
        "registered ecosystems"
    );

    let mut orchestrator = Orchestrator::new(
        Arc::new(registry),
        Arc::new(service),
        Arc::new(sink),
    );
    if config.connectivity_check {
        orchestrator = orchestrator.with_probe(Arc::new(GitHubProbe::new()));
    }

    Ok(orchestrator.run(&job).await)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    logging::init(&config.log_level, config.log_json);

    match execute(&config).await? {
        RunOutcome::Fetched(result) => tracing::info!(
            files = result.files.len(),
            base_commit_sha = %result.base_commit_sha,
            "fetched dependency files"
        ),
        RunOutcome::Failed(report) => tracing::warn!(
            error_type = report.error_type(),
            "file fetch failed"
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use base64::Engine;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const SHA: &str = "a3c1e2f9b8d7c6a5b4e3f2d1c0b9a8f7e6d5c4b3";

    fn write_job(dir: &Path, github: &MockServer, package_manager: &str) -> std::path::PathBuf {
        let job_path = dir.join("job.json");
        let definition = json!({
            "job": {
                "package-manager": package_manager,
                "source": {
                    "provider": "github",
                    "repo": "acme/widgets",
                    "branch": "main",
                    "api-endpoint": github.uri()
                }
            },
            "credentials": []
        });
        std::fs::write(&job_path, definition.to_string()).unwrap();
        job_path
    }

    fn config_for(dir: &Path, job_path: std::path::PathBuf, api: &MockServer) -> Config {
        Config {
            job_id: "77".into(),
            job_path,
            output_path: dir.join("output/output.json"),
            snapshot_path: None,
            repo_contents_path: None,
            api_url: api.uri(),
            job_token: "job-t0ken".into(),
            connectivity_check: false,
            one_container: false,
            log_level: "info".into(),
            log_json: false,
        }
    }

    async fn mount_github(github: &MockServer, files: &[(&str, &str)]) {
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "main",
                "commit": { "sha": SHA }
            })))
            .mount(github)
            .await;

        for (name, content) in files {
            Mock::given(method("GET"))
                .and(path(format!("/repos/acme/widgets/contents/{name}")))
                .and(query_param("ref", SHA))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "name": name,
                    "path": name,
                    "sha": "0f3e9f6b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f",
                    "type": "file",
                    "content": base64::engine::general_purpose::STANDARD.encode(content),
                    "encoding": "base64"
                })))
                .mount(github)
                .await;
        }
    }

    async fn accept_reports(api: &MockServer) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(api)
            .await;
    }

    #[tokio::test]
    async fn fetches_and_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let github = MockServer::start().await;
        let api = MockServer::start().await;

        mount_github(
            &github,
            &[
                ("Gemfile", "source 'https://rubygems.org'\ngem 'rake'\n"),
                ("Gemfile.lock", "GEM\n  specs:\n    rake (13.0.6)\n\nBUNDLED WITH\n   2.4.10\n"),
            ],
        )
        .await;
        accept_reports(&api).await;
        Mock::given(method("PATCH"))
            .and(path("/update_jobs/77/mark_as_processed"))
            .and(body_json(json!({ "data": { "base-commit-sha": SHA } })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&api)
            .await;

        let job_path = write_job(dir.path(), &github, "bundler");
        let config = config_for(dir.path(), job_path, &api);

        let outcome = execute(&config).await.unwrap();
        assert!(outcome.is_success());

        let artifact: Value =
            serde_json::from_slice(&std::fs::read(&config.output_path).unwrap()).unwrap();
        assert_eq!(artifact["base_commit_sha"], SHA);
        assert_eq!(artifact["base64_dependency_files"][0]["name"], "Gemfile");
        assert_eq!(artifact["base64_dependency_files"][1]["name"], "Gemfile.lock");

        let requests = api.received_requests().await.unwrap();
        let version_report = requests
            .iter()
            .find(|r| r.url.path().ends_with("record_package_manager_version"))
            .expect("package manager version was reported");
        let body: Value = serde_json::from_slice(&version_report.body).unwrap();
        assert_eq!(body["data"]["ecosystem"], "bundler");
        assert_eq!(body["data"]["package-managers"]["bundler"], "2");
    }

    #[tokio::test]
    async fn single_process_mode_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let github = MockServer::start().await;
        let api = MockServer::start().await;

        mount_github(&github, &[("Cargo.toml", "[package]\nname = \"widgets\"\n")]).await;
        accept_reports(&api).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&api)
            .await;

        let job_path = write_job(dir.path(), &github, "cargo");
        let mut config = config_for(dir.path(), job_path.clone(), &api);
        config.one_container = true;

        assert!(execute(&config).await.unwrap().is_success());

        let snapshot: Value = serde_json::from_slice(&std::fs::read(&job_path).unwrap()).unwrap();
        assert_eq!(snapshot["base_commit_sha"], SHA);
        assert_eq!(snapshot["job"]["package-manager"], "cargo");
        assert_eq!(snapshot["base64_dependency_files"][0]["name"], "Cargo.toml");
    }

    #[tokio::test]
    async fn missing_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let github = MockServer::start().await;
        let api = MockServer::start().await;

        mount_github(&github, &[]).await;
        Mock::given(method("POST"))
            .and(path("/update_jobs/77/record_update_job_error"))
            .and(body_json(json!({
                "data": {
                    "error-type": "dependency_file_not_found",
                    "error-details": { "file-path": "/package.json" }
                }
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&api)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/update_jobs/77/mark_as_processed"))
            .and(body_json(json!({ "data": { "base-commit-sha": SHA } })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&api)
            .await;

        let job_path = write_job(dir.path(), &github, "npm_and_yarn");
        let config = config_for(dir.path(), job_path, &api);

        let outcome = execute(&config).await.unwrap();
        assert!(!outcome.is_success());
        assert!(!config.output_path.exists());
    }

    #[tokio::test]
    async fn unsupported_package_manager_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let github = MockServer::start().await;
        let api = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/update_jobs/77/record_update_job_unknown_error"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&api)
            .await;
        Mock::given(method("POST"))
            .and(path("/update_jobs/77/record_update_job_error"))
            .and(body_json(json!({
                "data": { "error-type": "unknown_error", "error-details": {} }
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&api)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/update_jobs/77/mark_as_processed"))
            .and(body_json(json!({ "data": { "base-commit-sha": "unknown" } })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&api)
            .await;

        let job_path = write_job(dir.path(), &github, "mix");
        let config = config_for(dir.path(), job_path, &api);

        assert!(!execute(&config).await.unwrap().is_success());
    }

    #[tokio::test]
    async fn unreadable_job_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let api = MockServer::start().await;
        let config = config_for(dir.path(), dir.path().join("missing.json"), &api);

        assert!(execute(&config).await.is_err());
        assert!(api.received_requests().await.unwrap().is_empty());
    }
}
