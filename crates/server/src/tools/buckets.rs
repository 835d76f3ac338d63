//! Registry-level tools: cache_open, cache_has, cache_delete, cache_keys.
//!
//! `cache_keys` doubles as the per-bucket request listing when a
//! `cache_name` is given.

use cachestorage_core::{CacheRequest, CacheStorage, Error, MatchAllQuery, QueryOptions};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{RequestOutput, RequestParams, json_result, require_name};

/// Parameters naming a single bucket.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheNameParams {
    pub cache_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheOpenOutput {
    pub cache_name: String,
    /// Whether this call created the bucket.
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheHasOutput {
    pub cache_name: String,
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteOutput {
    pub cache_name: String,
    /// False when no bucket had that name.
    pub deleted: bool,
}

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// List the stored requests of this bucket instead of bucket names.
    #[serde(default)]
    pub cache_name: Option<String>,

    /// Only list stored requests matching this request.
    #[serde(default)]
    pub request: Option<RequestParams>,

    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    /// Bucket names in creation order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caches: Option<Vec<String>>,

    /// Stored requests of the named bucket, oldest first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<RequestOutput>>,
}

pub async fn open_impl(storage: &CacheStorage, params: CacheNameParams) -> Result<CallToolResult, McpError> {
    let name = require_name(&params.cache_name)?;
    let (_, created) = storage.open_or_create(name).await?;

    json_result(&CacheOpenOutput { cache_name: name.to_string(), created })
}

pub async fn has_impl(storage: &CacheStorage, params: CacheNameParams) -> Result<CallToolResult, McpError> {
    let exists = storage.has(require_name(&params.cache_name)?).await?;
    json_result(&CacheHasOutput { cache_name: params.cache_name, exists })
}

pub async fn delete_impl(storage: &CacheStorage, params: CacheNameParams) -> Result<CallToolResult, McpError> {
    let deleted = storage.delete(require_name(&params.cache_name)?).await?;
    json_result(&CacheDeleteOutput { cache_name: params.cache_name, deleted })
}

pub async fn keys_impl(storage: &CacheStorage, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let Some(name) = params.cache_name else {
        if params.request.is_some() {
            return Err(Error::InvalidInput("request filter requires cache_name".into()).into());
        }
        let caches = storage.keys().await?;
        return json_result(&CacheKeysOutput { caches: Some(caches), requests: None });
    };

    let Some(cache) = storage.get(require_name(&name)?).await? else {
        return Err(Error::CacheNotFound(name.clone()).into());
    };

    let query = match params.request {
        Some(request) => MatchAllQuery::filtered(CacheRequest::try_from(request)?, params.options),
        None => MatchAllQuery::AllEntries,
    };
    let requests = cache.keys(&query).await?.iter().map(RequestOutput::from).collect();

    json_result(&CacheKeysOutput { caches: None, requests: Some(requests) })
}
