use crate::error::FetchError;
use crate::job::Source;

/// A cheap round trip to the source host, made before any real work so the
/// network path (proxies included) is warm.
#[async_trait::async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn check(&self, source: &Source) -> Result<(), FetchError>;
}
