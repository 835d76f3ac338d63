//! The network seam used by `add`/`addAll`.

use async_trait::async_trait;

use crate::Error;
use crate::message::{CacheRequest, CacheResponse};

/// Performs a request and returns the response with its body fully buffered.
///
/// Cancellation is cooperative: the batch protocol drops the returned future
/// once a sibling fetch fails, so implementations must not assume they run to
/// completion. Any status code is returned as a response; deciding whether it
/// is cacheable is the caller's job.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &CacheRequest) -> Result<CacheResponse, Error>;
}
