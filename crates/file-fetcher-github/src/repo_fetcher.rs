use std::io;
use std::path::Path;
use std::sync::Arc;

use file_fetcher::{
    DependencyFile, FetchError, Fetcher, FetcherArgs, FileContent, PackageManagerVersion,
    git_token,
};
use tokio::sync::OnceCell;

use crate::client::GitHubClient;
use crate::git;
use crate::manifest::{Manifest, ManifestFile, Syntax};

/// Fetches the files named by a `Manifest`.
///
/// Reads from the local checkout when the job provides one, and from the
/// GitHub contents API otherwise. The commit and the file list are each
/// resolved once and reused, so repeated calls agree with each other.
pub struct RepoFetcher {
    manifest: Arc<Manifest>,
    args: FetcherArgs,
    client: GitHubClient,
    commit: OnceCell<String>,
    files: OnceCell<Vec<DependencyFile>>,
}

impl RepoFetcher {
    pub fn new(manifest: Arc<Manifest>, args: FetcherArgs) -> Self {
        let token = git_token(&args.credentials, args.source.hostname()).map(str::to_owned);
        let client = GitHubClient::new(args.source.api_endpoint(), token);

        Self {
            manifest,
            args,
            client,
            commit: OnceCell::new(),
            files: OnceCell::new(),
        }
    }

    fn token(&self) -> Option<&str> {
        git_token(&self.args.credentials, self.args.source.hostname())
    }

    fn local_path(&self) -> Option<&Path> {
        self.args.repo_contents_path.as_deref()
    }

    /// Repository path of a manifest file, with a leading slash.
    fn file_path(&self, file: &ManifestFile) -> String {
        let directory = self.args.source.directory();
        format!("{}/{}", directory.trim_end_matches('/'), file.name)
    }

    async fn resolve_commit(&self) -> Result<String, FetchError> {
        if let Some(path) = self.local_path() {
            return git::head_commit(path).await;
        }

        let source = &self.args.source;
        if let Some(commit) = &source.commit {
            return Ok(commit.clone());
        }

        match &source.branch {
            Some(branch) => match self.client.branch_head(&source.repo, branch).await {
                // A missing repository also 404s on its branches.
                Err(FetchError::BranchNotFound { branch_name }) => {
                    self.client.repository(&source.repo).await?;
                    Err(FetchError::BranchNotFound { branch_name })
                }
                result => result,
            },
            None => {
                let repository = self.client.repository(&source.repo).await?;
                self.client
                    .branch_head(&source.repo, &repository.default_branch)
                    .await
            }
        }
    }

    async fn load_files(&self) -> Result<Vec<DependencyFile>, FetchError> {
        let directory = self.args.source.directory();
        let mut files = Vec::with_capacity(self.manifest.files.len());

        for entry in &self.manifest.files {
            let file_path = self.file_path(entry);

            let bytes = match self.local_path() {
                Some(root) => read_local(&root.join(file_path.trim_start_matches('/'))).await?,
                None => {
                    let sha = self.commit_sha().await?;
                    self.client
                        .file_contents(&self.args.source.repo, &file_path, &sha)
                        .await?
                }
            };

            let Some(bytes) = bytes else {
                if entry.required {
                    return Err(FetchError::DependencyFileNotFound { file_path });
                }
                continue;
            };

            let content = FileContent::from_bytes(bytes);
            match &content {
                FileContent::Text(text) => entry.syntax.check(text).map_err(|message| {
                    FetchError::DependencyFileNotParseable {
                        file_path: file_path.clone(),
                        message,
                    }
                })?,
                FileContent::Binary(_) if entry.syntax != Syntax::Plain => {
                    return Err(FetchError::DependencyFileNotParseable {
                        file_path,
                        message: "file is not valid UTF-8".into(),
                    });
                }
                FileContent::Binary(_) => {}
            }

            tracing::debug!(file = %file_path, "fetched dependency file");
            files.push(DependencyFile {
                name: entry.name.clone(),
                directory: directory.clone(),
                content,
            });
        }

        Ok(files)
    }

    async fn commit_sha(&self) -> Result<String, FetchError> {
        self.commit
            .get_or_try_init(|| self.resolve_commit())
            .await
            .cloned()
    }
}

/// File contents, or `None` when there is no such file.
async fn read_local(path: &Path) -> Result<Option<Vec<u8>>, FetchError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait::async_trait]
impl Fetcher for RepoFetcher {
    async fn clone_repo_contents(&self) -> Result<(), FetchError> {
        let path = self
            .local_path()
            .ok_or_else(|| FetchError::Other("cloning requires a repo contents path".into()))?;

        git::clone(&self.args.source, self.token(), path).await
    }

    async fn commit(&self) -> Result<Option<String>, FetchError> {
        self.commit_sha().await.map(Some)
    }

    async fn files(&self) -> Result<Vec<DependencyFile>, FetchError> {
        self.files
            .get_or_try_init(|| self.load_files())
            .await
            .cloned()
    }

    async fn package_manager_version(&self) -> Result<Option<PackageManagerVersion>, FetchError> {
        let files = self.files().await?;
        let package_managers = (self.manifest.detect_versions)(&files);

        if package_managers.is_empty() {
            return Ok(None);
        }

        Ok(Some(PackageManagerVersion {
            ecosystem: self.manifest.ecosystem.clone(),
            package_managers,
        }))
    }
}
