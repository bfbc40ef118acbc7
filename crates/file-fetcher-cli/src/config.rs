use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::FalseyValueParser;
use file_fetcher::Job;

/// Runtime configuration, taken from flags or the job environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "file-fetcher")]
#[command(about = "Fetch the dependency files for an update job")]
#[command(version)]
pub struct Config {
    /// Identifier of the update job
    #[arg(long, env = "DEPENDABOT_JOB_ID")]
    pub job_id: String,

    /// Path of the job definition (JSON)
    #[arg(long, env = "DEPENDABOT_JOB_PATH")]
    pub job_path: PathBuf,

    /// Where the fetch artifact is written
    #[arg(long, env = "DEPENDABOT_OUTPUT_PATH")]
    pub output_path: PathBuf,

    /// Where the job snapshot is written in single-process mode (defaults to the job path)
    #[arg(long, env = "DEPENDABOT_JOB_SNAPSHOT_PATH")]
    pub snapshot_path: Option<PathBuf>,

    /// Working directory for cloned repository contents
    #[arg(long, env = "DEPENDABOT_REPO_CONTENTS_PATH")]
    pub repo_contents_path: Option<PathBuf>,

    /// Base URL of the update-job API
    #[arg(long, env = "DEPENDABOT_API_URL", default_value = "http://localhost:3001")]
    pub api_url: String,

    /// Token authorising calls to the update-job API
    #[arg(long, env = "JOB_TOKEN", hide_env_values = true, default_value = "")]
    pub job_token: String,

    /// Probe the source host before fetching
    #[arg(long, env = "ENABLE_CONNECTIVITY_CHECK", value_parser = FalseyValueParser::new())]
    pub connectivity_check: bool,

    /// Also write a job snapshot for later stages in the same process.
    ///
    /// Falsey environment values (`0`, `false`, `no`, `off`, empty) leave it off.
    #[arg(long, env = "UPDATER_ONE_CONTAINER", value_parser = FalseyValueParser::new())]
    pub one_container: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit JSON log lines
    #[arg(long, env = "LOG_JSON", value_parser = FalseyValueParser::new())]
    pub log_json: bool,
}

impl Config {
    /// Snapshot destination, or `None` outside single-process mode.
    pub fn snapshot_path(&self) -> Option<&Path> {
        if !self.one_container {
            return None;
        }
        Some(self.snapshot_path.as_deref().unwrap_or(self.job_path.as_path()))
    }
}

/// Read and validate the job definition.
pub fn load_job(config: &Config) -> Result<Job> {
    let contents = std::fs::read_to_string(&config.job_path)
        .with_context(|| format!("failed to read job definition: {}", config.job_path.display()))?;

    let definition: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("job definition is not JSON: {}", config.job_path.display()))?;

    Job::from_definition(
        config.job_id.clone(),
        &definition,
        config.repo_contents_path.clone(),
    )
    .with_context(|| format!("invalid job definition: {}", config.job_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let base = [
            "file-fetcher",
            "--job-id",
            "42",
            "--job-path",
            "/tmp/job.json",
            "--output-path",
            "/tmp/output.json",
        ];
        Config::try_parse_from(base.iter().chain(args)).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.job_id, "42");
        assert_eq!(config.api_url, "http://localhost:3001");
        assert_eq!(config.log_level, "info");
        assert!(config.snapshot_path().is_none());
    }

    #[test]
    fn snapshot_defaults_to_job_path() {
        let config = parse(&["--one-container"]);
        assert_eq!(config.snapshot_path(), Some(Path::new("/tmp/job.json")));
    }

    #[test]
    fn explicit_snapshot_path() {
        let config = parse(&["--one-container", "--snapshot-path", "/tmp/snapshot.json"]);
        assert_eq!(config.snapshot_path(), Some(Path::new("/tmp/snapshot.json")));
    }

    #[test]
    fn snapshot_path_ignored_outside_single_process_mode() {
        let config = parse(&["--snapshot-path", "/tmp/snapshot.json"]);
        assert!(config.snapshot_path().is_none());
    }

    #[test]
    fn requires_job_id() {
        let result = Config::try_parse_from([
            "file-fetcher",
            "--job-path",
            "/tmp/job.json",
            "--output-path",
            "/tmp/output.json",
        ]);
        if std::env::var_os("DEPENDABOT_JOB_ID").is_none() {
            assert!(result.is_err());
        }
    }

    #[test]
    fn loads_job_definition() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.json");
        std::fs::write(
            &job_path,
            r#"{
                "job": {
                    "package-manager": "cargo",
                    "source": {
                        "provider": "github",
                        "repo": "acme/widgets",
                        "directory": "/crates/core",
                        "branch": "main"
                    },
                    "vendor-dependencies": true
                },
                "credentials": []
            }"#,
        )
        .unwrap();

        let mut config = parse(&[]);
        config.job_path = job_path;
        config.repo_contents_path = Some(dir.path().join("repo"));

        let job = load_job(&config).unwrap();
        assert_eq!(job.id(), "42");
        assert_eq!(job.package_manager(), "cargo");
        assert_eq!(job.source().directory(), "/crates/core");
        assert!(job.clone_enabled());
        assert!(!job.already_cloned());
    }

    #[test]
    fn missing_job_definition() {
        let mut config = parse(&[]);
        config.job_path = PathBuf::from("/nonexistent/job.json");

        let err = load_job(&config).unwrap_err();
        assert!(err.to_string().contains("failed to read job definition"));
    }

    #[test]
    fn malformed_job_definition() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("job.json");
        std::fs::write(&job_path, r#"{"credentials": []}"#).unwrap();

        let mut config = parse(&[]);
        config.job_path = job_path;

        let err = load_job(&config).unwrap_err();
        assert!(err.to_string().contains("invalid job definition"));
    }
}
