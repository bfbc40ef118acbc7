pub mod client;
pub mod content;
pub mod git;
pub mod manifest;
pub mod probe;
pub mod repo_fetcher;

pub use client::GitHubClient;
pub use manifest::{Manifest, ManifestFile, Syntax, VersionDetector};
pub use probe::GitHubProbe;
pub use repo_fetcher::RepoFetcher;
