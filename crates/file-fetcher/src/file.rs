use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commit recorded when a run fails before the base commit is known.
pub const UNKNOWN_COMMIT: &str = "unknown";

/// Raw content of a dependency file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    /// Text when the bytes are valid UTF-8, binary otherwise.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Binary(e.into_bytes()),
        }
    }
}

/// A file produced by a fetcher. `name` is relative to `directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyFile {
    pub name: String,
    pub directory: String,
    pub content: FileContent,
}

impl DependencyFile {
    pub fn text(
        name: impl Into<String>,
        directory: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            content: FileContent::Text(content.into()),
        }
    }

    pub fn binary(name: impl Into<String>, directory: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            content: FileContent::Binary(content),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.content, FileContent::Binary(_))
    }

    /// Path of the file from the repository root, without a leading slash.
    pub fn path(&self) -> String {
        let dir = self.directory.trim_matches('/');
        if dir.is_empty() {
            self.name.clone()
        } else {
            format!("{dir}/{}", self.name)
        }
    }
}

/// Files fetched for a job, all taken from `base_commit_sha`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub files: Vec<DependencyFile>,
    pub base_commit_sha: String,
}

/// Transport form of a dependency file. Binary content is base64 encoded;
/// text content is stored as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedDependencyFile {
    pub name: String,
    pub directory: String,
    pub content: String,
    pub binary: bool,
}

impl EncodedDependencyFile {
    pub fn encode(file: &DependencyFile) -> Self {
        let content = match &file.content {
            FileContent::Text(text) => text.clone(),
            FileContent::Binary(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        };

        Self {
            name: file.name.clone(),
            directory: file.directory.clone(),
            content,
            binary: file.is_binary(),
        }
    }

    pub fn decode(self) -> Result<DependencyFile, base64::DecodeError> {
        let content = if self.binary {
            FileContent::Binary(base64::engine::general_purpose::STANDARD.decode(&self.content)?)
        } else {
            FileContent::Text(self.content)
        };

        Ok(DependencyFile {
            name: self.name,
            directory: self.directory,
            content,
        })
    }
}

/// The artifact written for later pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchArtifact {
    pub base64_dependency_files: Vec<EncodedDependencyFile>,
    pub base_commit_sha: String,
}

impl FetchArtifact {
    pub fn from_result(result: &FetchResult) -> Self {
        Self {
            base64_dependency_files: result.files.iter().map(EncodedDependencyFile::encode).collect(),
            base_commit_sha: result.base_commit_sha.clone(),
        }
    }

    pub fn into_result(self) -> Result<FetchResult, base64::DecodeError> {
        let files = self
            .base64_dependency_files
            .into_iter()
            .map(EncodedDependencyFile::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FetchResult {
            files,
            base_commit_sha: self.base_commit_sha,
        })
    }
}

/// Artifact plus the original job, written in single-process mode so later
/// stages can run without fetching again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub artifact: FetchArtifact,
    pub job: Value,
}
