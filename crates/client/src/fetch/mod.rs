//! HTTP fetch engine behind `Cache::add`/`Cache::add_all`.
//!
//! ### Behaviour
//! - Sends the cached request's method, URL and headers as-is.
//! - Follows up to `max_redirects` redirects.
//! - Buffers the body chunk by chunk and stops once `max_bytes` is exceeded.
//! - Returns every status code as a response; cacheability is decided by the
//!   batch protocol in core.
//!
//! Dropping the future returned by [`HttpFetcher::fetch`] drops the underlying
//! reqwest request, which is how sibling cancellation reaches the network.

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::{Client, ClientBuilder, header};
use std::time::{Duration, Instant};

use cachestorage_core::{AppConfig, CacheRequest, CacheResponse, Error, Fetcher};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "cachestorage/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "cachestorage/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// Client settings derived from `config`.
pub fn client_builder(config: &FetchConfig) -> ClientBuilder {
    Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout)
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .use_rustls_tls()
        .gzip(true)
        .brotli(true)
        .deflate(true)
}

/// reqwest-backed [`Fetcher`].
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = client_builder(&config)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Wrap an already-built client; `config.max_bytes` is still enforced here.
    pub fn with_client(http: Client, config: FetchConfig) -> Self {
        Self { http, config }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<CacheResponse, Error> {
        let start = Instant::now();

        let mut response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Network(format!("timed out fetching {}: {e}", request.url))
                } else {
                    Error::Network(format!("network error fetching {}: {e}", request.url))
                }
            })?;

        let status = response.status();
        let headers = response.headers().clone();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {e}")))?
        {
            if body.len() + chunk.len() > self.config.max_bytes {
                return Err(self.too_large(body.len() + chunk.len()));
            }
            body.extend_from_slice(&chunk);
        }

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes, {})",
            request.url,
            status.as_u16(),
            fetch_ms,
            body.len(),
            headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("no content-type")
        );

        Ok(CacheResponse {
            status,
            status_text: status.canonical_reason().map(str::to_string),
            headers,
            body: Some(body.freeze()),
        })
    }
}
