use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

const DEFAULT_API_ENDPOINT: &str = "https://api.github.com";
const DEFAULT_HOSTNAME: &str = "github.com";

/// Errors raised while reading a job definition.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job definition has no `job` object")]
    MissingJob,

    #[error("invalid job definition: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Where the dependency files live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Source {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// `owner/name` on the hosting provider.
    pub repo: String,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    /// Pins the fetch to a specific commit instead of the branch head.
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
}

fn default_provider() -> String {
    "github".into()
}

impl Source {
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            provider: default_provider(),
            repo: repo.into(),
            directory: None,
            branch: None,
            commit: None,
            hostname: None,
            api_endpoint: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(endpoint.into());
        self
    }

    /// API base without a trailing slash.
    pub fn api_endpoint(&self) -> &str {
        self.api_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_API_ENDPOINT)
            .trim_end_matches('/')
    }

    pub fn hostname(&self) -> &str {
        self.hostname.as_deref().unwrap_or(DEFAULT_HOSTNAME)
    }

    /// Directory within the repository, always starting with `/`.
    pub fn directory(&self) -> String {
        match self.directory.as_deref().map(|d| d.trim_matches('/')) {
            None | Some("") => "/".to_owned(),
            Some(dir) => format!("/{dir}"),
        }
    }

    pub fn url(&self) -> String {
        format!("https://{}/{}", self.hostname(), self.repo)
    }
}

/// One credential from the job definition. Contents are opaque and the
/// `Debug` output never includes secrets.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Credential(Map<String, Value>);

impl Credential {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn credential_type(&self) -> Option<&str> {
        self.get("type")
    }

    pub fn host(&self) -> Option<&str> {
        self.get("host")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("type", &self.credential_type())
            .field("host", &self.host())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JobFields {
    package_manager: String,
    source: Source,
    #[serde(default)]
    experiments: BTreeMap<String, Value>,
    #[serde(default)]
    vendor_dependencies: bool,
}

#[derive(Debug, Deserialize)]
struct DefinitionFields {
    #[serde(default)]
    credentials: Vec<Credential>,
}

/// A single fetch job. Built once from the job definition and read-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct Job {
    id: String,
    source: Source,
    credentials: Vec<Credential>,
    package_manager: String,
    experiments: BTreeMap<String, Value>,
    clone: bool,
    repo_contents_path: Option<PathBuf>,
    definition: Value,
}

impl Job {
    /// Build a job from a definition document of the form
    /// `{ "job": { ... }, "credentials": [ ... ] }`.
    pub fn from_definition(
        id: impl Into<String>,
        definition: &Value,
        repo_contents_path: Option<PathBuf>,
    ) -> Result<Self, JobError> {
        let job_value = definition.get("job").ok_or(JobError::MissingJob)?;
        let fields = JobFields::deserialize(job_value)?;
        let extra = DefinitionFields::deserialize(definition)?;

        Ok(Self {
            id: id.into(),
            source: fields.source,
            credentials: extra.credentials,
            package_manager: fields.package_manager,
            experiments: fields.experiments,
            clone: fields.vendor_dependencies,
            repo_contents_path,
            definition: job_value.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn package_manager(&self) -> &str {
        &self.package_manager
    }

    pub fn experiments(&self) -> &BTreeMap<String, Value> {
        &self.experiments
    }

    /// True when the job asks for a full clone of the repository.
    pub fn clone_enabled(&self) -> bool {
        self.clone
    }

    pub fn repo_contents_path(&self) -> Option<&Path> {
        self.repo_contents_path.as_deref()
    }

    /// The original `job` object, as it appeared in the definition.
    pub fn definition(&self) -> &Value {
        &self.definition
    }

    /// True when the working directory already holds a checkout.
    pub fn already_cloned(&self) -> bool {
        self.repo_contents_path
            .as_deref()
            .is_some_and(|path| path.join(".git").exists())
    }

    /// The token of the `git_source` credential for the source host, if any.
    pub fn git_token(&self) -> Option<&str> {
        git_token(&self.credentials, self.source.hostname())
    }
}

/// The password of the first `git_source` credential for `host`.
pub fn git_token<'a>(credentials: &'a [Credential], host: &str) -> Option<&'a str> {
    credentials
        .iter()
        .filter(|c| c.credential_type() == Some("git_source"))
        .find(|c| c.host() == Some(host))
        .and_then(|c| c.get("password"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn definition() -> Value {
        json!({
            "job": {
                "package-manager": "bundler",
                "source": {
                    "provider": "github",
                    "repo": "acme/widgets",
                    "directory": "/ruby/",
                    "branch": "release-1",
                    "api-endpoint": "https://ghe.example.com/api/v3/",
                    "hostname": "ghe.example.com"
                },
                "experiments": { "proxy-cached": true },
                "vendor-dependencies": true
            },
            "credentials": [
                {
                    "type": "git_source",
                    "host": "ghe.example.com",
                    "username": "x-access-token",
                    "password": "s3cret"
                },
                {
                    "type": "rubygems_server",
                    "host": "gems.example.com",
                    "token": "other"
                }
            ]
        })
    }

    #[test]
    fn parses_kebab_case_definition() {
        let job = Job::from_definition("42", &definition(), None).unwrap();

        assert_eq!(job.id(), "42");
        assert_eq!(job.package_manager(), "bundler");
        assert_eq!(job.source().repo, "acme/widgets");
        assert_eq!(job.source().branch.as_deref(), Some("release-1"));
        assert_eq!(job.source().api_endpoint(), "https://ghe.example.com/api/v3");
        assert_eq!(job.source().directory(), "/ruby");
        assert!(job.clone_enabled());
        assert_eq!(job.experiments().get("proxy-cached"), Some(&json!(true)));
        assert_eq!(job.credentials().len(), 2);
    }

    #[test]
    fn keeps_original_job_object() {
        let def = definition();
        let job = Job::from_definition("42", &def, None).unwrap();
        assert_eq!(job.definition(), &def["job"]);
    }

    #[test]
    fn source_defaults() {
        let source = Source::new("acme/widgets");
        assert_eq!(source.api_endpoint(), "https://api.github.com");
        assert_eq!(source.hostname(), "github.com");
        assert_eq!(source.directory(), "/");
        assert_eq!(source.url(), "https://github.com/acme/widgets");
    }

    #[test]
    fn missing_job_object_is_an_error() {
        let result = Job::from_definition("1", &json!({ "credentials": [] }), None);
        assert!(matches!(result, Err(JobError::MissingJob)));
    }

    #[test]
    fn git_token_matches_source_host() {
        let job = Job::from_definition("42", &definition(), None).unwrap();
        assert_eq!(job.git_token(), Some("s3cret"));
    }

    #[test]
    fn credential_debug_hides_secrets() {
        let job = Job::from_definition("42", &definition(), None).unwrap();
        let rendered = format!("{job:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("git_source"));
    }

    #[test]
    fn already_cloned_requires_git_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job::from_definition("42", &definition(), Some(dir.path().to_owned())).unwrap();
        assert!(!job.already_cloned());

        std::fs::create_dir(dir.path().join(".git")).unwrap();
        assert!(job.already_cloned());
    }

    #[test]
    fn no_contents_path_is_never_cloned() {
        let job = Job::from_definition("42", &definition(), None).unwrap();
        assert!(!job.already_cloned());
    }
}
