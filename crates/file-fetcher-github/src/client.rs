use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use file_fetcher::FetchError;

use crate::content::{BlobResponse, BranchResponse, ContentResponse, RepositoryResponse};

const USER_AGENT: &str = "dependabot-file-fetcher";

/// Thin client for the parts of the GitHub REST API the fetchers use.
///
/// Maps HTTP failures onto `FetchError`: 401 is `Unauthorized`, a primary
/// or secondary rate limit is `RateLimited`, anything else is `Upstream`.
/// Callers decide what a 404 means.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            token,
        }
    }

    /// A client that gives up quickly, for probing.
    pub fn with_timeouts(
        api_base: impl Into<String>,
        token: Option<String>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            token,
        })
    }

    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        req
    }

    /// Send a GET. `Ok(None)` means 404.
    async fn get(&self, url: &str) -> Result<Option<reqwest::Response>, FetchError> {
        let response = self
            .build_request(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        Ok(Some(response))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, FetchError> {
        match self.get(url).await? {
            Some(response) => response
                .json()
                .await
                .map(Some)
                .map_err(|e| FetchError::Other(format!("unexpected response from {url}: {e}"))),
            None => Ok(None),
        }
    }

    pub async fn repository(&self, repo: &str) -> Result<RepositoryResponse, FetchError> {
        let url = format!("{}/repos/{}", self.api_base, repo);
        self.get_json(&url)
            .await?
            .ok_or_else(|| FetchError::RepoNotFound(repo.to_owned()))
    }

    /// The commit at the head of `branch`.
    pub async fn branch_head(&self, repo: &str, branch: &str) -> Result<String, FetchError> {
        let url = format!("{}/repos/{}/branches/{}", self.api_base, repo, branch);
        let response: BranchResponse =
            self.get_json(&url)
                .await?
                .ok_or_else(|| FetchError::BranchNotFound {
                    branch_name: branch.to_owned(),
                })?;

        Ok(response.commit.sha)
    }

    /// Raw bytes of the file at `path` as of `git_ref`, or `None` if there is
    /// no such file.
    pub async fn file_contents(
        &self,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<Vec<u8>>, FetchError> {
        let url = format!(
            "{}/repos/{}/contents/{}?ref={}",
            self.api_base,
            repo,
            path.trim_start_matches('/'),
            git_ref,
        );

        let response: ContentResponse = match self.get_json(&url).await? {
            Some(response) => response,
            None => return Ok(None),
        };

        if response.entry_type != "file" {
            return Ok(None);
        }

        match (response.encoding.as_deref(), response.content.as_deref()) {
            (Some("base64"), Some(content)) => decode_content(content).map(Some),
            _ => self.blob(repo, &response.sha).await.map(Some),
        }
    }

    async fn blob(&self, repo: &str, sha: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/repos/{}/git/blobs/{}", self.api_base, repo, sha);
        let blob: BlobResponse = self
            .get_json(&url)
            .await?
            .ok_or_else(|| FetchError::Other(format!("blob {sha} disappeared from {repo}")))?;

        if blob.encoding != "base64" {
            return Err(FetchError::Other(format!(
                "unsupported blob encoding: {}",
                blob.encoding
            )));
        }

        decode_content(&blob.content)
    }
}

fn decode_content(encoded: &str) -> Result<Vec<u8>, FetchError> {
    // GitHub returns base64 with newlines embedded
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

    base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map_err(|e| FetchError::Other(format!("base64 decode failed: {e}")))
}

fn header<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Turn a non-success, non-404 response into an error.
///
/// A 403 is a rate limit when the primary quota is exhausted, or when
/// GitHub's secondary limit kicks in (a `retry-after` header, or a body
/// naming the secondary or abuse limit).
async fn status_error(response: reqwest::Response) -> FetchError {
    let status = response.status().as_u16();
    let exhausted = header(&response, "x-ratelimit-remaining") == Some("0");
    let reset = header(&response, "x-ratelimit-reset").and_then(|v| v.parse().ok());
    let retry_after: Option<u64> =
        header(&response, "retry-after").and_then(|v| v.trim().parse().ok());
    let reset = reset.or_else(|| retry_after.map(seconds_from_now));

    match status {
        401 => return FetchError::Unauthorized,
        429 => return FetchError::RateLimited { reset },
        403 if exhausted || retry_after.is_some() => return FetchError::RateLimited { reset },
        _ => {}
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".into());

    if status == 403 && is_secondary_rate_limit(&message) {
        return FetchError::RateLimited { reset };
    }

    FetchError::Upstream { status, message }
}

fn is_secondary_rate_limit(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("secondary rate limit") || body.contains("abuse")
}

/// Unix timestamp `seconds` from now.
fn seconds_from_now(seconds: u64) -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|now| now.as_secs())
        .unwrap_or_default()
        + seconds
}
