use std::time::Duration;

use file_fetcher::{ConnectivityProbe, FetchError, Source};

use crate::client::GitHubClient;

/// Fetches the source repository's metadata without credentials.
///
/// The first request through some proxies takes 10-15 seconds to establish,
/// so this is worth doing before the real fetch even though its result is
/// ignored.
#[derive(Debug, Clone)]
pub struct GitHubProbe {
    connect_timeout: Duration,
    timeout: Duration,
}

impl GitHubProbe {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeouts(connect_timeout: Duration, timeout: Duration) -> Self {
        Self {
            connect_timeout,
            timeout,
        }
    }
}

impl Default for GitHubProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConnectivityProbe for GitHubProbe {
    async fn check(&self, source: &Source) -> Result<(), FetchError> {
        let client = GitHubClient::with_timeouts(
            source.api_endpoint(),
            None,
            self.connect_timeout,
            self.timeout,
        )?;
        client.repository(&source.repo).await.map(|_| ())
    }
}
