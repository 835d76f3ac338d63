//! Request and response values stored in and matched against a bucket.
//!
//! Both types are plain owned values: the response body is always a fully
//! buffered [`Bytes`], so it can be persisted and handed back any number of
//! times.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use url::Url;

use crate::Error;

/// A request as seen by the cache: URL, method and header list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
}

impl CacheRequest {
    /// Build a request with an explicit method and no headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self { url, method, headers: HeaderMap::new() }
    }

    /// Parse `url` and build a GET request for it.
    pub fn get(url: &str) -> Result<Self, Error> {
        Ok(Self::new(Method::GET, Url::parse(url)?))
    }

    /// Append a header, keeping any value already present under that name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Whether the URL scheme is one the cache is allowed to store.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }
}

/// A response as stored by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResponse {
    pub status: StatusCode,
    pub status_text: Option<String>,
    pub headers: HeaderMap,
    /// Buffered body; `None` for a headers-only entry.
    pub body: Option<Bytes>,
}

impl CacheResponse {
    /// Build a response with the canonical reason phrase for `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().map(str::to_string),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Status in 200..=299 and not 206 Partial Content.
    pub fn is_cacheable_status(&self) -> bool {
        self.status.is_success() && self.status != StatusCode::PARTIAL_CONTENT
    }
}
