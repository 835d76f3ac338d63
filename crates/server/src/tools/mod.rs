//! MCP tool implementations.
//!
//! This module contains all tools exposed by the cachestorage-mcp server,
//! plus the JSON shapes used to carry requests and responses over the wire.

pub mod buckets;
pub mod entries;

use cachestorage_core::{CacheRequest, CacheResponse, Error};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// A single header line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeaderPair {
    pub name: String,
    pub value: String,
}

/// A request as supplied by a tool caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RequestParams {
    /// Absolute URL.
    pub url: String,

    /// HTTP method (default: "GET").
    #[serde(default)]
    pub method: Option<String>,

    /// Request headers, in order; repeated names are kept.
    #[serde(default)]
    pub headers: Vec<HeaderPair>,
}

/// A response as supplied to `cache_put`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseParams {
    /// HTTP status code.
    pub status: u16,

    /// Reason phrase (default: canonical phrase for `status`).
    #[serde(default)]
    pub status_text: Option<String>,

    #[serde(default)]
    pub headers: Vec<HeaderPair>,

    /// UTF-8 body text.
    #[serde(default)]
    pub body: Option<String>,
}

/// A stored request returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestOutput {
    pub url: String,
    pub method: String,
    pub headers: Vec<HeaderPair>,
}

/// A stored response returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseOutput {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    pub headers: Vec<HeaderPair>,
    /// Body decoded as UTF-8 (lossy).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Body length in bytes.
    pub body_bytes: usize,
}

fn parse_headers(pairs: &[HeaderPair]) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for pair in pairs {
        let name = HeaderName::try_from(pair.name.as_str())
            .map_err(|e| Error::InvalidHeaders(format!("{}: {e}", pair.name)))?;
        let value = HeaderValue::try_from(pair.value.as_str())
            .map_err(|e| Error::InvalidHeaders(format!("{}: {e}", pair.name)))?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn header_pairs(headers: &HeaderMap) -> Vec<HeaderPair> {
    headers
        .iter()
        .map(|(name, value)| HeaderPair {
            name: name.as_str().to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
        .collect()
}

impl TryFrom<RequestParams> for CacheRequest {
    type Error = Error;

    fn try_from(params: RequestParams) -> Result<Self, Error> {
        let url = Url::parse(&params.url)?;
        let method = match params.method.as_deref() {
            None => Method::GET,
            Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .map_err(|_| Error::InvalidInput(format!("invalid method: {m}")))?,
        };

        let mut request = CacheRequest::new(method, url);
        request.headers = parse_headers(&params.headers)?;
        Ok(request)
    }
}

impl TryFrom<ResponseParams> for CacheResponse {
    type Error = Error;

    fn try_from(params: ResponseParams) -> Result<Self, Error> {
        let status = StatusCode::from_u16(params.status)
            .map_err(|_| Error::InvalidInput(format!("invalid status: {}", params.status)))?;

        let mut response = CacheResponse::new(status);
        if params.status_text.is_some() {
            response.status_text = params.status_text;
        }
        response.headers = parse_headers(&params.headers)?;
        response.body = params.body.map(Into::into);
        Ok(response)
    }
}

impl From<&CacheRequest> for RequestOutput {
    fn from(request: &CacheRequest) -> Self {
        Self {
            url: request.url.to_string(),
            method: request.method.to_string(),
            headers: header_pairs(&request.headers),
        }
    }
}

impl From<&CacheResponse> for ResponseOutput {
    fn from(response: &CacheResponse) -> Self {
        Self {
            status: response.status.as_u16(),
            status_text: response.status_text.clone(),
            headers: header_pairs(&response.headers),
            body: response.body.as_ref().map(|b| String::from_utf8_lossy(b).into_owned()),
            body_bytes: response.body.as_ref().map_or(0, |b| b.len()),
        }
    }
}

/// Serialize `output` as the single text item of a successful tool result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Reject blank bucket names before they reach storage.
pub(crate) fn require_name(name: &str) -> Result<&str, Error> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("cache_name cannot be empty".into()));
    }
    Ok(name)
}
