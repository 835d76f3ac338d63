//! Entry-level tools: cache_add, cache_put, cache_match, cache_match_all,
//! cache_entry_delete.

use cachestorage_core::{
    Cache, CacheRequest, CacheResponse, CacheStorage, Error, MatchAllQuery, MultiCacheQueryOptions, QueryOptions,
    validate_request,
};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{RequestParams, ResponseOutput, ResponseParams, json_result, require_name};

/// Parameters for the cache_add tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheAddParams {
    /// Bucket to populate; created if missing.
    pub cache_name: String,

    /// Requests to fetch and store. All succeed or nothing is stored.
    pub requests: Vec<RequestParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheAddOutput {
    pub cache_name: String,
    /// Number of entries committed.
    pub added: usize,
}

/// Parameters for the cache_put tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePutParams {
    /// Bucket to store into; created if missing.
    pub cache_name: String,
    pub request: RequestParams,
    pub response: ResponseParams,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePutOutput {
    pub cache_name: String,
    pub url: String,
}

/// Parameters for the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchParams {
    pub request: RequestParams,

    /// Matching flags; `cache_name` restricts the lookup to one bucket.
    #[serde(default)]
    pub options: MultiCacheQueryOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchOutput {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseOutput>,
}

/// Parameters for the cache_match_all tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchAllParams {
    pub cache_name: String,

    /// Filter request; every entry is returned when absent.
    #[serde(default)]
    pub request: Option<RequestParams>,

    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchAllOutput {
    /// Matching responses, oldest entry first.
    pub responses: Vec<ResponseOutput>,
}

/// Parameters for the cache_entry_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntryDeleteParams {
    pub cache_name: String,
    pub request: RequestParams,
    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntryDeleteOutput {
    /// Whether any entry was removed.
    pub deleted: bool,
}

/// Handle on a bucket that must already exist.
async fn existing(storage: &CacheStorage, name: &str) -> Result<Cache, Error> {
    storage
        .get(require_name(name)?)
        .await?
        .ok_or_else(|| Error::CacheNotFound(name.to_string()))
}

pub async fn add_impl(storage: &CacheStorage, params: CacheAddParams) -> Result<CallToolResult, McpError> {
    let name = require_name(&params.cache_name)?;
    if params.requests.is_empty() {
        return Err(Error::InvalidInput("requests cannot be empty".into()).into());
    }

    let requests = params
        .requests
        .into_iter()
        .map(CacheRequest::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    for request in &requests {
        validate_request(request)?;
    }
    let added = requests.len();

    let cache = storage.open(name).await?;
    cache.add_all(requests).await?;

    json_result(&CacheAddOutput { cache_name: name.to_string(), added })
}

pub async fn put_impl(storage: &CacheStorage, params: CachePutParams) -> Result<CallToolResult, McpError> {
    let name = require_name(&params.cache_name)?;
    let request = CacheRequest::try_from(params.request)?;
    let response = CacheResponse::try_from(params.response)?;
    validate_request(&request)?;
    let url = request.url.to_string();

    let cache = storage.open(name).await?;
    cache.put(request, response).await?;

    json_result(&CachePutOutput { cache_name: name.to_string(), url })
}

pub async fn match_impl(storage: &CacheStorage, params: CacheMatchParams) -> Result<CallToolResult, McpError> {
    let request = CacheRequest::try_from(params.request)?;
    let response = storage.match_one(&request, &params.options).await?;

    json_result(&CacheMatchOutput {
        found: response.is_some(),
        response: response.as_ref().map(ResponseOutput::from),
    })
}

pub async fn match_all_impl(storage: &CacheStorage, params: CacheMatchAllParams) -> Result<CallToolResult, McpError> {
    let cache = existing(storage, &params.cache_name).await?;
    let query = match params.request {
        Some(request) => MatchAllQuery::filtered(CacheRequest::try_from(request)?, params.options),
        None => MatchAllQuery::AllEntries,
    };

    let responses = cache.match_all(&query).await?.iter().map(ResponseOutput::from).collect();
    json_result(&CacheMatchAllOutput { responses })
}

pub async fn entry_delete_impl(
    storage: &CacheStorage, params: CacheEntryDeleteParams,
) -> Result<CallToolResult, McpError> {
    let cache = existing(storage, &params.cache_name).await?;
    let request = CacheRequest::try_from(params.request)?;
    let deleted = cache.delete(request, params.options).await?;

    json_result(&CacheEntryDeleteOutput { deleted })
}
