use serde::Deserialize;

/// Response from GitHub's Contents API.
/// `GET /repos/{owner}/{repo}/contents/{path}?ref={sha}`
///
/// Files over 1 MB come back with an empty `content` and an `encoding` of
/// `none`; those are read through the blobs API instead.
#[derive(Debug, Deserialize)]
pub struct ContentResponse {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub content: Option<String>,
    pub encoding: Option<String>,
}

/// Response from GitHub's Git Blobs API.
/// `GET /repos/{owner}/{repo}/git/blobs/{sha}`
#[derive(Debug, Deserialize)]
pub struct BlobResponse {
    pub content: String,
    pub encoding: String,
}

/// The fields of `GET /repos/{owner}/{repo}` we use.
#[derive(Debug, Deserialize)]
pub struct RepositoryResponse {
    pub full_name: String,
    pub default_branch: String,
}

/// `GET /repos/{owner}/{repo}/branches/{branch}`
#[derive(Debug, Deserialize)]
pub struct BranchResponse {
    pub name: String,
    pub commit: CommitRef,
}

#[derive(Debug, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}
