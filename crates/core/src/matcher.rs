//! Request-to-entry matching.
//!
//! Decides whether a stored entry answers a query request. The rules run in
//! order and stop at the first decisive one:
//!
//! 1. unless `ignore_method`, only GET entries match
//! 2. URLs are compared without their fragment, and without their query when
//!    `ignore_search` is set
//! 3. with `ignore_vary`, or when the stored response has no `Vary`, a URL
//!    match is enough
//! 4. otherwise every header named by `Vary` must carry the same value on the
//!    stored request and the query request; `Vary: *` never matches

use http::{HeaderMap, HeaderName, Method, header};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::message::{CacheRequest, CacheResponse};
use crate::normalize::{url_equals, without_search};
use crate::storage::StoredEntry;

/// Per-query flags relaxing the default strict match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueryOptions {
    /// Ignore the query string of both URLs.
    #[serde(default)]
    pub ignore_search: bool,
    /// Match entries regardless of method, and allow non-GET queries.
    #[serde(default)]
    pub ignore_method: bool,
    /// Skip `Vary` header comparison.
    #[serde(default)]
    pub ignore_vary: bool,
}

/// Query options for registry-wide lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MultiCacheQueryOptions {
    #[serde(flatten)]
    pub query: QueryOptions,
    /// Restrict the lookup to this bucket.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// What a `match_all`/`keys`/`delete` call is asked to select.
#[derive(Debug, Clone)]
pub enum MatchAllQuery {
    /// Every entry in the bucket, unfiltered.
    AllEntries,
    /// Entries matching `request` under `options`.
    FilteredBy { request: CacheRequest, options: QueryOptions },
}

impl MatchAllQuery {
    pub fn filtered(request: CacheRequest, options: QueryOptions) -> Self {
        Self::FilteredBy { request, options }
    }

    /// A non-GET query without `ignore_method` can never match anything.
    pub fn is_unmatchable(&self) -> bool {
        match self {
            Self::AllEntries => false,
            Self::FilteredBy { request, options } => request.method != Method::GET && !options.ignore_method,
        }
    }
}

/// Header names listed by every `Vary` header on `headers`, trimmed.
pub fn vary_fields(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether any `Vary` value is the `*` wildcard.
pub fn has_vary_star(headers: &HeaderMap) -> bool {
    vary_fields(headers).iter().any(|field| field == "*")
}

/// All values of `name`, joined the way a header list combines them.
fn combined_value(headers: &HeaderMap, name: &HeaderName) -> Option<Vec<u8>> {
    let mut values = headers.get_all(name).iter();
    let first = values.next()?;
    let mut combined = first.as_bytes().to_vec();
    for value in values {
        combined.extend_from_slice(b", ");
        combined.extend_from_slice(value.as_bytes());
    }
    Some(combined)
}

/// Whether the stored `cached` request (with its `response`) answers `query`.
pub fn request_matches_cached_item(
    query: &CacheRequest, cached: &CacheRequest, response: Option<&CacheResponse>, options: &QueryOptions,
) -> bool {
    if !options.ignore_method && cached.method != Method::GET {
        return false;
    }

    let matched = if options.ignore_search {
        url_equals(&without_search(&query.url), &without_search(&cached.url), true)
    } else {
        url_equals(&query.url, &cached.url, true)
    };
    if !matched {
        return false;
    }

    let Some(response) = response else {
        return true;
    };
    if options.ignore_vary {
        return true;
    }

    for field in vary_fields(&response.headers) {
        if field == "*" {
            return false;
        }
        // A name that is not a valid header can be present on neither request.
        let Ok(name) = HeaderName::from_bytes(field.as_bytes()) else {
            continue;
        };
        if combined_value(&cached.headers, &name) != combined_value(&query.headers, &name) {
            return false;
        }
    }

    true
}

/// Select the entries answering `query`, keeping their insertion order.
pub fn query_cache<'a>(query: &MatchAllQuery, entries: &'a [StoredEntry]) -> Vec<&'a StoredEntry> {
    match query {
        MatchAllQuery::AllEntries => entries.iter().collect(),
        MatchAllQuery::FilteredBy { .. } if query.is_unmatchable() => Vec::new(),
        MatchAllQuery::FilteredBy { request, options } => entries
            .iter()
            .filter(|entry| request_matches_cached_item(request, &entry.request, Some(&entry.response), options))
            .collect(),
    }
}
