//! Local git operations, run through the `git` binary.
//!
//! Tokens reach git as an `http.extraHeader` set through the environment,
//! so they never appear in the clone URL, the process arguments or the
//! clone's `.git/config`.

use std::path::Path;

use base64::Engine;
use file_fetcher::{FetchError, Source};
use tokio::process::Command;

/// Clone URL for a source.
pub fn clone_url(source: &Source) -> String {
    format!("{}.git", source.url())
}

/// A `git` command that authenticates with `token` and never prompts.
fn git(token: Option<&str>) -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let basic = base64::engine::general_purpose::STANDARD
            .encode(format!("x-access-token:{token}"));
        cmd.env("GIT_CONFIG_COUNT", "1")
            .env("GIT_CONFIG_KEY_0", "http.extraHeader")
            .env("GIT_CONFIG_VALUE_0", format!("Authorization: Basic {basic}"));
    }

    cmd
}

/// Shallow clone of `source` into `path`.
pub async fn clone(source: &Source, token: Option<&str>, path: &Path) -> Result<(), FetchError> {
    clone_from(&clone_url(source), source, token, path).await
}

async fn clone_from(
    url: &str,
    source: &Source,
    token: Option<&str>,
    path: &Path,
) -> Result<(), FetchError> {
    let mut cmd = git(token);
    cmd.args([
        "clone",
        "--no-tags",
        "--depth",
        "1",
        "--recurse-submodules",
        "--shallow-submodules",
    ]);
    if let Some(branch) = &source.branch {
        cmd.args(["--branch", branch.as_str(), "--single-branch"]);
    }
    cmd.arg(url).arg(path);

    tracing::info!(repo = %source.repo, path = %path.display(), "cloning repository");
    let output = cmd.output().await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(clone_failure(&redact(&stderr, token), source));
    }

    if let Some(commit) = &source.commit {
        checkout_commit(path, commit, token).await?;
    }

    Ok(())
}

/// Fetch and check out a single commit in a shallow clone.
async fn checkout_commit(path: &Path, commit: &str, token: Option<&str>) -> Result<(), FetchError> {
    run(path, &["fetch", "--depth", "1", "origin", commit], token).await?;
    run(path, &["checkout", commit], token).await?;
    Ok(())
}

/// The commit checked out in `path`.
pub async fn head_commit(path: &Path) -> Result<String, FetchError> {
    let sha = run(path, &["rev-parse", "HEAD"], None).await?;
    Ok(sha.trim().to_owned())
}

async fn run(path: &Path, args: &[&str], token: Option<&str>) -> Result<String, FetchError> {
    let output = git(token).arg("-C").arg(path).args(args).output().await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No space left on device") {
            return Err(FetchError::OutOfDisk);
        }
        let message = format!("git {} failed: {}", args.join(" "), stderr.trim());
        return Err(FetchError::Other(redact(&message, token)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn redact(message: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if !token.is_empty() => message.replace(token, "***"),
        _ => message.to_owned(),
    }
}

/// Map `git clone` stderr onto a fetch error.
fn clone_failure(stderr: &str, source: &Source) -> FetchError {
    if stderr.contains("No space left on device") {
        return FetchError::OutOfDisk;
    }

    if let Some(branch) = &source.branch
        && stderr.contains("Remote branch")
        && stderr.contains("not found")
    {
        return FetchError::BranchNotFound {
            branch_name: branch.clone(),
        };
    }

    if stderr.contains("Repository not found")
        || stderr.contains("Authentication failed")
        || stderr.contains("could not read Username")
    {
        return FetchError::RepoNotFound(source.repo.clone());
    }

    FetchError::Other(format!("git clone failed: {}", stderr.trim()))
}
