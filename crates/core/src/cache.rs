//! A handle on one named bucket.
//!
//! Handles are only handed out by [`CacheStorage`](crate::CacheStorage); each
//! carries the bucket id, the shared [`Storage`] and the [`Fetcher`] used by
//! `add`/`add_all`.
//!
//! ### Batch protocol (`add_all`)
//! - Every request is validated before any fetch is issued.
//! - Fetches run concurrently, one task each, all sharing one
//!   [`CancellationToken`].
//! - The first failure (network error, non-2xx or 206 status, `Vary: *`)
//!   cancels the token; sibling tasks resolve to [`Error::Aborted`] and the
//!   whole call fails with the first error once every task has settled.
//! - On success every pair is committed in one transaction.

use std::sync::Arc;

use http::Method;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::fetch::Fetcher;
use crate::matcher::{MatchAllQuery, QueryOptions, has_vary_star, query_cache};
use crate::message::{CacheRequest, CacheResponse};
use crate::storage::{NewEntry, Storage};

/// A named bucket of request/response entries.
#[derive(Clone)]
pub struct Cache {
    id: i64,
    name: String,
    db: Storage,
    fetcher: Arc<dyn Fetcher>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").field("id", &self.id).field("name", &self.name).finish()
    }
}

/// Requests accepted by put/add/addAll: GET over http or https.
pub fn validate_request(request: &CacheRequest) -> Result<(), Error> {
    if !request.is_http() {
        return Err(Error::InvalidRequest(format!("unsupported scheme: {}", request.url.scheme())));
    }
    if request.method != Method::GET {
        return Err(Error::InvalidRequest(format!("method {} is not cacheable", request.method)));
    }
    Ok(())
}

/// Reject responses a bucket must never store.
fn validate_response(request: &CacheRequest, response: &CacheResponse) -> Result<(), Error> {
    if !response.is_cacheable_status() {
        return Err(Error::ResponseError(format!("{} returned status {}", request.url, response.status.as_u16())));
    }
    if has_vary_star(&response.headers) {
        return Err(Error::InvalidVaryHeader(format!("{} responded with Vary: *", request.url)));
    }
    Ok(())
}

/// One fetch of a batch, resolving to `Aborted` if `cancel` fires first.
async fn fetch_one(
    fetcher: Arc<dyn Fetcher>, request: &CacheRequest, cancel: CancellationToken,
) -> Result<CacheResponse, Error> {
    let outcome = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Aborted(request.url.to_string())),
        outcome = fetcher.fetch(request) => outcome,
    };

    let response = outcome.map_err(|e| match e {
        Error::Aborted(_) => e,
        other => Error::ResponseError(format!("{}: {other}", request.url)),
    })?;
    validate_response(request, &response)?;
    Ok(response)
}

impl Cache {
    pub(crate) fn new(id: i64, name: String, db: Storage, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { id, name, db, fetcher }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The first response answering `query`, if any.
    pub async fn match_one(&self, query: &MatchAllQuery) -> Result<Option<CacheResponse>, Error> {
        Ok(self.match_all(query).await?.into_iter().next())
    }

    /// Every response answering `query`, oldest entry first.
    pub async fn match_all(&self, query: &MatchAllQuery) -> Result<Vec<CacheResponse>, Error> {
        if query.is_unmatchable() {
            return Ok(Vec::new());
        }

        let entries = self.db.list_entries(self.id).await?;
        let responses: Vec<_> = query_cache(query, &entries)
            .into_iter()
            .map(|entry| entry.response.clone())
            .collect();

        tracing::debug!(cache = %self.name, matched = responses.len(), total = entries.len(), "match_all");
        Ok(responses)
    }

    /// The stored requests answering `query`, oldest entry first.
    pub async fn keys(&self, query: &MatchAllQuery) -> Result<Vec<CacheRequest>, Error> {
        if query.is_unmatchable() {
            return Ok(Vec::new());
        }

        let entries = self.db.list_entries(self.id).await?;
        Ok(query_cache(query, &entries)
            .into_iter()
            .map(|entry| entry.request.clone())
            .collect())
    }

    /// Store `response` for `request`, replacing any entry for the same URL.
    pub async fn put(&self, request: CacheRequest, response: CacheResponse) -> Result<(), Error> {
        validate_request(&request)?;
        if response.status == http::StatusCode::PARTIAL_CONTENT {
            return Err(Error::ResponseError(format!("{} is a partial response", request.url)));
        }
        if has_vary_star(&response.headers) {
            return Err(Error::InvalidVaryHeader(format!("{} responded with Vary: *", request.url)));
        }

        let entry = NewEntry::from_pair(&request, &response)?;
        self.db.put_entries(self.id, vec![entry]).await?;

        tracing::debug!(cache = %self.name, url = %request.url, status = response.status.as_u16(), "put");
        Ok(())
    }

    /// Fetch `request` and store the result; same rules as [`Cache::add_all`].
    pub async fn add(&self, request: CacheRequest) -> Result<(), Error> {
        self.add_all(vec![request]).await
    }

    /// Fetch every request concurrently and store all results, or none.
    pub async fn add_all(&self, requests: Vec<CacheRequest>) -> Result<(), Error> {
        for request in &requests {
            validate_request(request)?;
        }
        if requests.is_empty() {
            return Ok(());
        }

        let total = requests.len();
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let outcome = fetch_one(fetcher, &request, cancel).await;
                (index, request, outcome)
            });
        }

        let mut fetched: Vec<Option<(CacheRequest, CacheResponse)>> = vec![None; total];
        let mut failure: Option<Error> = None;

        while let Some(joined) = tasks.join_next().await {
            let (url, err) = match joined {
                Ok((index, request, Ok(response))) => {
                    fetched[index] = Some((request, response));
                    continue;
                }
                Ok((_, request, Err(err))) => (request.url.to_string(), err),
                Err(join_err) => (String::from("<task>"), Error::ResponseError(join_err.to_string())),
            };

            if failure.is_none() {
                tracing::warn!(cache = %self.name, %url, error = %err, "add_all failed, cancelling siblings");
                cancel.cancel();
                failure = Some(err);
            } else if err.is_abort() {
                tracing::debug!(cache = %self.name, %url, "fetch aborted");
            } else {
                tracing::debug!(cache = %self.name, %url, error = %err, "additional failure after cancel");
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        let entries = fetched
            .iter()
            .flatten()
            .map(|(request, response)| NewEntry::from_pair(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        self.db.put_entries(self.id, entries).await?;

        tracing::debug!(cache = %self.name, count = total, "add_all committed");
        Ok(())
    }

    /// Remove every entry answering `request`; returns whether any was removed.
    pub async fn delete(&self, request: CacheRequest, options: QueryOptions) -> Result<bool, Error> {
        let query = MatchAllQuery::filtered(request, options);
        if query.is_unmatchable() {
            return Ok(false);
        }

        let entries = self.db.list_entries(self.id).await?;
        let ids: Vec<i64> = query_cache(&query, &entries).iter().map(|entry| entry.id).collect();
        if ids.is_empty() {
            return Ok(false);
        }

        let deleted = self.db.delete_entries(self.id, ids).await?;
        tracing::debug!(cache = %self.name, deleted, "delete");
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Reply, StubFetcher};
    use http::{HeaderName, HeaderValue, StatusCode, header};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    async fn cache_with(fetcher: StubFetcher) -> Cache {
        let db = Storage::open_in_memory().await.unwrap();
        let id = db.upsert_bucket("test").await.unwrap();
        Cache::new(id, "test".into(), db, Arc::new(fetcher))
    }

    fn get(url: &str) -> CacheRequest {
        CacheRequest::get(url).unwrap()
    }

    fn body_of(response: &CacheResponse) -> &[u8] {
        response.body.as_deref().unwrap_or_default()
    }

    fn filtered(url: &str) -> MatchAllQuery {
        MatchAllQuery::filtered(get(url), QueryOptions::default())
    }

    #[tokio::test]
    async fn test_put_then_match() {
        let cache = cache_with(StubFetcher::new()).await;
        cache
            .put(get("https://example.com/a"), CacheResponse::new(StatusCode::OK).with_body("one"))
            .await
            .unwrap();

        let hit = cache.match_one(&filtered("https://example.com/a")).await.unwrap().unwrap();
        assert_eq!(body_of(&hit), b"one");
        assert!(cache.match_one(&filtered("https://example.com/b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_previous_response() {
        let cache = cache_with(StubFetcher::new()).await;
        let request = get("https://example.com/a");
        cache
            .put(request.clone(), CacheResponse::new(StatusCode::OK).with_body("first"))
            .await
            .unwrap();
        cache
            .put(request, CacheResponse::new(StatusCode::OK).with_body("second"))
            .await
            .unwrap();

        let all = cache.match_all(&filtered("https://example.com/a")).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(body_of(&all[0]), b"second");
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_requests() {
        let cache = cache_with(StubFetcher::new()).await;

        let post = CacheRequest::new(Method::POST, url::Url::parse("https://example.com/a").unwrap());
        let result = cache.put(post, CacheResponse::new(StatusCode::OK)).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));

        let ftp = get("ftp://example.com/a");
        let result = cache.put(ftp, CacheResponse::new(StatusCode::OK)).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));

        assert!(cache.match_all(&MatchAllQuery::AllEntries).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_rejects_partial_and_vary_star() {
        let cache = cache_with(StubFetcher::new()).await;

        let result = cache
            .put(get("https://example.com/a"), CacheResponse::new(StatusCode::PARTIAL_CONTENT))
            .await;
        assert!(matches!(result, Err(Error::ResponseError(_))));

        let star = CacheResponse::new(StatusCode::OK).with_header(header::VARY, HeaderValue::from_static("*"));
        let result = cache.put(get("https://example.com/a"), star).await;
        assert!(matches!(result, Err(Error::InvalidVaryHeader(_))));
    }

    #[tokio::test]
    async fn test_failed_put_keeps_prior_entry() {
        let cache = cache_with(StubFetcher::new()).await;
        cache
            .put(get("https://example.com/a"), CacheResponse::new(StatusCode::OK).with_body("kept"))
            .await
            .unwrap();

        let star = CacheResponse::new(StatusCode::OK).with_header(header::VARY, HeaderValue::from_static("*"));
        assert!(cache.put(get("https://example.com/a"), star).await.is_err());

        let hit = cache.match_one(&filtered("https://example.com/a")).await.unwrap().unwrap();
        assert_eq!(body_of(&hit), b"kept");
    }

    #[tokio::test]
    async fn test_match_all_without_request_returns_everything_in_order() {
        let cache = cache_with(StubFetcher::new()).await;
        for path in ["c", "a", "b"] {
            cache
                .put(get(&format!("https://example.com/{path}")), CacheResponse::new(StatusCode::OK).with_body(path))
                .await
                .unwrap();
        }

        let bodies: Vec<_> = cache
            .match_all(&MatchAllQuery::AllEntries)
            .await
            .unwrap()
            .iter()
            .map(|r| body_of(r).to_vec())
            .collect();
        assert_eq!(bodies, vec![b"c".to_vec(), b"a".to_vec(), b"b".to_vec()]);
    }

    #[tokio::test]
    async fn test_method_filtering() {
        let cache = cache_with(StubFetcher::new()).await;
        cache
            .put(get("https://example.com/a"), CacheResponse::new(StatusCode::OK))
            .await
            .unwrap();

        let post = CacheRequest::new(Method::POST, url::Url::parse("https://example.com/a").unwrap());
        let strict = MatchAllQuery::filtered(post.clone(), QueryOptions::default());
        assert!(cache.match_all(&strict).await.unwrap().is_empty());

        let relaxed = MatchAllQuery::filtered(post, QueryOptions { ignore_method: true, ..Default::default() });
        assert_eq!(cache.match_all(&relaxed).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_vary_enforcement() {
        let cache = cache_with(StubFetcher::new()).await;
        let stored_request =
            get("https://example.com/a").with_header(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en"));
        let response = CacheResponse::new(StatusCode::OK)
            .with_header(header::VARY, HeaderValue::from_static("Accept-Language"))
            .with_body("english");
        cache.put(stored_request, response).await.unwrap();

        let fr = get("https://example.com/a").with_header(header::ACCEPT_LANGUAGE, HeaderValue::from_static("fr"));
        let en = get("https://example.com/a").with_header(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en"));

        let miss = MatchAllQuery::filtered(fr.clone(), QueryOptions::default());
        assert!(cache.match_one(&miss).await.unwrap().is_none());

        let hit = MatchAllQuery::filtered(en, QueryOptions::default());
        assert!(cache.match_one(&hit).await.unwrap().is_some());

        let ignored = MatchAllQuery::filtered(fr, QueryOptions { ignore_vary: true, ..Default::default() });
        assert!(cache.match_one(&ignored).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_vary_matches_non_utf8_header_value() {
        let cache = cache_with(StubFetcher::new()).await;
        let latin1 = HeaderValue::from_bytes(b"caf\xE9").unwrap();
        let request = get("https://example.com/menu").with_header(header::ACCEPT_LANGUAGE, latin1.clone());
        let response = CacheResponse::new(StatusCode::OK)
            .with_header(header::VARY, HeaderValue::from_static("Accept-Language"))
            .with_header(HeaderName::from_static("x-label"), latin1.clone())
            .with_body("menu");
        cache.put(request.clone(), response).await.unwrap();

        let hit = cache
            .match_one(&MatchAllQuery::filtered(request, QueryOptions::default()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.headers.get("x-label").unwrap().as_bytes(), b"caf\xE9");

        let stored = cache.keys(&MatchAllQuery::AllEntries).await.unwrap().remove(0);
        assert_eq!(stored.headers.get(header::ACCEPT_LANGUAGE), Some(&latin1));

        let utf8 =
            get("https://example.com/menu").with_header(header::ACCEPT_LANGUAGE, HeaderValue::from_bytes("café".as_bytes()).unwrap());
        assert!(
            cache
                .match_one(&MatchAllQuery::filtered(utf8, QueryOptions::default()))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_ignore_search_hits_bare_url() {
        let cache = cache_with(StubFetcher::new()).await;
        cache
            .put(get("https://example.com/u"), CacheResponse::new(StatusCode::OK))
            .await
            .unwrap();

        let options = QueryOptions { ignore_search: true, ..Default::default() };
        for url in ["https://example.com/u?a=1", "https://example.com/u?b=2"] {
            let query = MatchAllQuery::filtered(get(url), options);
            assert!(cache.match_one(&query).await.unwrap().is_some(), "{url} should hit");
        }
        assert!(cache.match_one(&filtered("https://example.com/u?a=1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_returns_requests() {
        let cache = cache_with(StubFetcher::new()).await;
        cache
            .put(get("https://example.com/a#frag"), CacheResponse::new(StatusCode::OK))
            .await
            .unwrap();

        let keys = cache.keys(&MatchAllQuery::AllEntries).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].url.as_str(), "https://example.com/a");
        assert_eq!(keys[0].method, Method::GET);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = cache_with(StubFetcher::new()).await;
        cache
            .put(get("https://example.com/a?x=1"), CacheResponse::new(StatusCode::OK))
            .await
            .unwrap();
        cache
            .put(get("https://example.com/a?x=2"), CacheResponse::new(StatusCode::OK))
            .await
            .unwrap();
        cache
            .put(get("https://example.com/b"), CacheResponse::new(StatusCode::OK))
            .await
            .unwrap();

        assert!(!cache.delete(get("https://example.com/a"), QueryOptions::default()).await.unwrap());

        let options = QueryOptions { ignore_search: true, ..Default::default() };
        assert!(cache.delete(get("https://example.com/a"), options).await.unwrap());
        assert_eq!(cache.match_all(&MatchAllQuery::AllEntries).await.unwrap().len(), 1);

        let post = CacheRequest::new(Method::POST, url::Url::parse("https://example.com/b").unwrap());
        assert!(!cache.delete(post, QueryOptions::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_fetches_and_stores() {
        let fetcher = StubFetcher::new().route("https://example.com/a", StubFetcher::ok("fetched"));
        let cache = cache_with(fetcher).await;

        cache.add(get("https://example.com/a")).await.unwrap();

        let hit = cache.match_one(&filtered("https://example.com/a")).await.unwrap().unwrap();
        assert_eq!(body_of(&hit), b"fetched");
    }

    #[tokio::test]
    async fn test_add_all_commits_every_entry() {
        let fetcher = StubFetcher::new()
            .route("https://example.com/a", StubFetcher::ok("a"))
            .slow_route("https://example.com/b", Duration::from_millis(20), StubFetcher::ok("b"))
            .route("https://example.com/c", StubFetcher::ok("c"));
        let cache = cache_with(fetcher).await;

        cache
            .add_all(vec![get("https://example.com/a"), get("https://example.com/b"), get("https://example.com/c")])
            .await
            .unwrap();

        let keys: Vec<_> = cache
            .keys(&MatchAllQuery::AllEntries)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(keys, vec!["/a", "/b", "/c"]);
    }

    #[tokio::test]
    async fn test_add_all_validates_before_fetching() {
        let fetcher = StubFetcher::new().route("https://example.com/a", StubFetcher::ok("a"));
        let started = Arc::clone(&fetcher.started);
        let cache = cache_with(fetcher).await;

        let result = cache
            .add_all(vec![get("https://example.com/a"), get("file:///etc/hosts")])
            .await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert!(cache.match_all(&MatchAllQuery::AllEntries).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_all_is_atomic_on_error_status() {
        let fetcher = StubFetcher::new()
            .route("https://example.com/good", StubFetcher::ok("good"))
            .route("https://example.com/bad", StubFetcher::status(StatusCode::INTERNAL_SERVER_ERROR));
        let cache = cache_with(fetcher).await;

        let result = cache
            .add_all(vec![get("https://example.com/good"), get("https://example.com/bad")])
            .await;
        assert!(matches!(result, Err(Error::ResponseError(_))));
        assert!(cache.match_all(&MatchAllQuery::AllEntries).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_all_rejects_partial_content() {
        let fetcher =
            StubFetcher::new().route("https://example.com/range", StubFetcher::status(StatusCode::PARTIAL_CONTENT));
        let cache = cache_with(fetcher).await;

        let result = cache.add(get("https://example.com/range")).await;
        assert!(matches!(result, Err(Error::ResponseError(_))));
    }

    #[tokio::test]
    async fn test_add_all_network_error_is_response_error() {
        let fetcher = StubFetcher::new().route("https://example.com/down", Reply::NetworkError);
        let cache = cache_with(fetcher).await;

        let result = cache.add(get("https://example.com/down")).await;
        assert!(matches!(result, Err(Error::ResponseError(msg)) if msg.contains("NETWORK_ERROR")));
    }

    #[tokio::test]
    async fn test_add_all_vary_star_poisons_batch() {
        let fetcher = StubFetcher::new()
            .route("https://example.com/star", StubFetcher::vary("*"))
            .route("https://example.com/fine", StubFetcher::ok("fine"));
        let cache = cache_with(fetcher).await;

        let result = cache
            .add_all(vec![get("https://example.com/fine"), get("https://example.com/star")])
            .await;
        assert!(matches!(result, Err(Error::InvalidVaryHeader(_))));
        assert!(cache.match_one(&filtered("https://example.com/star")).await.unwrap().is_none());
        assert!(cache.match_one(&filtered("https://example.com/fine")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_all_cancels_in_flight_siblings() {
        let fetcher = StubFetcher::new()
            .route("https://example.com/bad", StubFetcher::status(StatusCode::NOT_FOUND))
            .slow_route("https://example.com/slow", Duration::from_secs(60), StubFetcher::ok("slow"));
        let finished = Arc::clone(&fetcher.finished);
        let cache = cache_with(fetcher).await;

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            cache.add_all(vec![get("https://example.com/slow"), get("https://example.com/bad")]),
        )
        .await
        .expect("add_all should not wait for the cancelled fetch");

        assert!(matches!(result, Err(Error::ResponseError(_))));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(cache.match_all(&MatchAllQuery::AllEntries).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_fetch_resolves_to_abort() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(StubFetcher::new().slow_route(
            "https://example.com/slow",
            Duration::from_secs(60),
            StubFetcher::ok("slow"),
        ));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetch_one(fetcher, &get("https://example.com/slow"), cancel).await;
        assert!(matches!(result, Err(Error::Aborted(_))));
    }

    #[tokio::test]
    async fn test_add_all_empty_is_noop() {
        let cache = cache_with(StubFetcher::new()).await;
        cache.add_all(Vec::new()).await.unwrap();
        assert!(cache.match_all(&MatchAllQuery::AllEntries).await.unwrap().is_empty());
    }
}
