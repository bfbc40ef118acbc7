use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

use file_fetcher::{FetchArtifact, FetchError, FetchResult, Job, JobSnapshot, ResultSink};
use serde::Serialize;
use serde_json::Value;

/// Writes successful fetches as JSON files for later pipeline stages.
///
/// The artifact always goes to the output path. When a snapshot path is set
/// (single-process mode) the artifact is also written there together with
/// the original job.
#[derive(Debug, Clone)]
pub struct FileResultSink {
    output_path: PathBuf,
    snapshot_path: Option<PathBuf>,
}

impl FileResultSink {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            snapshot_path: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot_path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(snapshot_path.into());
        self
    }
}

#[async_trait::async_trait]
impl ResultSink for FileResultSink {
    async fn persist(&self, result: &FetchResult, job: &Job) -> Result<(), FetchError> {
        let artifact = FetchArtifact::from_result(result);
        let files = artifact.base64_dependency_files.len();

        let mut writes = vec![(self.output_path.as_path(), to_json(&self.output_path, &artifact)?)];
        if let Some(path) = &self.snapshot_path {
            let snapshot = JobSnapshot {
                artifact,
                job: job.definition().clone(),
            };
            writes.push((path.as_path(), to_json(path, &snapshot)?));
        }

        write_all(&writes).await?;

        tracing::info!(
            path = %self.output_path.display(),
            files,
            "wrote fetch artifact"
        );
        if let Some(path) = &self.snapshot_path {
            tracing::info!(path = %path.display(), "wrote job snapshot");
        }

        Ok(())
    }
}

fn to_json<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>, FetchError> {
    serde_json::to_vec(value)
        .map_err(|e| FetchError::Other(format!("failed to serialize {}: {e}", path.display())))
}

/// Sibling path the contents are staged in before being renamed into place.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_else(|| OsStr::new("artifact")));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write every file or none of them.
///
/// Each file is staged next to its destination first. Nothing is renamed
/// into place until every file has been staged, and a failed rename removes
/// the destinations already written.
async fn write_all(writes: &[(&Path, Vec<u8>)]) -> Result<(), FetchError> {
    let staged: Vec<PathBuf> = writes.iter().map(|(path, _)| staging_path(path)).collect();

    for ((path, bytes), staging) in writes.iter().zip(&staged) {
        if let Err(e) = stage(path, staging, bytes).await {
            discard(&staged).await;
            return Err(e);
        }
    }

    for (i, ((path, _), staging)) in writes.iter().zip(&staged).enumerate() {
        if let Err(e) = tokio::fs::rename(staging, path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to move staged file into place");
            discard(&staged[i..]).await;
            let written: Vec<PathBuf> = writes[..i].iter().map(|(p, _)| p.to_path_buf()).collect();
            discard(&written).await;
            return Err(e.into());
        }
    }

    Ok(())
}

async fn stage(path: &Path, staging: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(staging, bytes).await?;
    Ok(())
}

async fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to clean up partial write");
        }
    }
}

/// Errors reading a persisted artifact.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("malformed artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed file content: {0}")]
    Decode(#[from] base64::DecodeError),
}

async fn read(path: &Path) -> Result<Vec<u8>, StoreError> {
    tokio::fs::read(path).await.map_err(|source| StoreError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Decode the artifact at `path` back into the files it was written from.
pub async fn read_artifact(path: &Path) -> Result<FetchResult, StoreError> {
    let artifact: FetchArtifact = serde_json::from_slice(&read(path).await?)?;
    Ok(artifact.into_result()?)
}

/// Decode a single-process snapshot into its files and the original job.
pub async fn read_snapshot(path: &Path) -> Result<(FetchResult, Value), StoreError> {
    let snapshot: JobSnapshot = serde_json::from_slice(&read(path).await?)?;
    Ok((snapshot.artifact.into_result()?, snapshot.job))
}
