use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::file::DependencyFile;
use crate::job::{Credential, Source};

/// Everything a fetcher needs to know about the job it serves.
#[derive(Debug, Clone)]
pub struct FetcherArgs {
    pub source: Source,
    pub credentials: Vec<Credential>,
    pub options: BTreeMap<String, Value>,
    /// Set when files come from a local checkout rather than the API.
    pub repo_contents_path: Option<PathBuf>,
}

/// Package manager versions detected for an ecosystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageManagerVersion {
    pub ecosystem: String,
    pub package_managers: BTreeMap<String, String>,
}

/// Retrieves dependency files for one package-manager ecosystem.
///
/// Implementations must return files from the same commit that `commit()`
/// reports, however many times `files()` is called.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Populate the local working directory with the repository contents.
    async fn clone_repo_contents(&self) -> Result<(), FetchError>;

    /// The commit the fetched files reflect.
    async fn commit(&self) -> Result<Option<String>, FetchError>;

    /// The dependency files for the job's directory.
    async fn files(&self) -> Result<Vec<DependencyFile>, FetchError>;

    /// Package manager versions in use, if the ecosystem can tell.
    async fn package_manager_version(&self) -> Result<Option<PackageManagerVersion>, FetchError> {
        Ok(None)
    }
}

#[async_trait::async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn clone_repo_contents(&self) -> Result<(), FetchError> {
        (**self).clone_repo_contents().await
    }

    async fn commit(&self) -> Result<Option<String>, FetchError> {
        (**self).commit().await
    }

    async fn files(&self) -> Result<Vec<DependencyFile>, FetchError> {
        (**self).files().await
    }

    async fn package_manager_version(&self) -> Result<Option<PackageManagerVersion>, FetchError> {
        (**self).package_manager_version().await
    }
}
