use std::future::Future;

use crate::error::FetchError;

/// Retries allowed after the first bad gateway response.
pub const MAX_BAD_GATEWAY_RETRIES: u32 = 2;

/// Run `operation`, retrying immediately when it fails with an upstream 502.
///
/// Gives up after `MAX_BAD_GATEWAY_RETRIES` retries. Any other failure is
/// returned on first occurrence.
pub async fn retry_bad_gateway<T, F, Fut>(mut operation: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut retries = 0;

    loop {
        match operation().await {
            Err(e) if e.is_bad_gateway() => {
                retries += 1;
                if retries > MAX_BAD_GATEWAY_RETRIES {
                    return Err(e);
                }
                tracing::warn!(retry = retries, "bad gateway while fetching files, retrying");
            }
            result => return result,
        }
    }
}
