//! Registry of named buckets.
//!
//! The registry owns the [`Storage`] handle and the [`Fetcher`] shared by every
//! bucket; it is the only way to obtain a [`Cache`].

use std::sync::Arc;

use crate::Error;
use crate::cache::Cache;
use crate::fetch::Fetcher;
use crate::matcher::{MatchAllQuery, MultiCacheQueryOptions};
use crate::message::{CacheRequest, CacheResponse};
use crate::storage::Storage;

/// Opens, lists and deletes named caches.
#[derive(Clone)]
pub struct CacheStorage {
    db: Storage,
    fetcher: Arc<dyn Fetcher>,
}

impl CacheStorage {
    pub fn new(db: Storage, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { db, fetcher }
    }

    /// Open the bucket called `name`, creating it on first use.
    pub async fn open(&self, name: &str) -> Result<Cache, Error> {
        Ok(self.open_or_create(name).await?.0)
    }

    /// Like [`CacheStorage::open`], also reporting whether this call created
    /// the bucket.
    pub async fn open_or_create(&self, name: &str) -> Result<(Cache, bool), Error> {
        let (id, created) = self.db.ensure_bucket(name).await?;
        tracing::debug!(cache = name, id, created, "opened cache");
        Ok((self.handle(id, name), created))
    }

    /// Handle on an existing bucket; never creates one.
    pub async fn get(&self, name: &str) -> Result<Option<Cache>, Error> {
        Ok(self.db.find_bucket(name).await?.map(|id| self.handle(id, name)))
    }

    pub async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.db.find_bucket(name).await?.is_some())
    }

    /// Delete the bucket and all of its entries.
    ///
    /// Returns whether the bucket existed.
    pub async fn delete(&self, name: &str) -> Result<bool, Error> {
        let deleted = self.db.delete_bucket(name).await?;
        if deleted {
            tracing::info!(cache = name, "deleted cache");
        }
        Ok(deleted)
    }

    /// Bucket names in creation order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.db.list_buckets().await?.into_iter().map(|b| b.name).collect())
    }

    /// First response answering `request`, across one bucket or all of them.
    ///
    /// With `cache_name` set only that bucket is searched (a missing bucket
    /// yields `None`); otherwise buckets are searched in creation order.
    pub async fn match_one(
        &self, request: &CacheRequest, options: &MultiCacheQueryOptions,
    ) -> Result<Option<CacheResponse>, Error> {
        let query = MatchAllQuery::filtered(request.clone(), options.query);

        if let Some(name) = &options.cache_name {
            let Some(cache) = self.get(name).await? else {
                return Ok(None);
            };
            return cache.match_one(&query).await;
        }

        for bucket in self.db.list_buckets().await? {
            if let Some(response) = self.handle(bucket.id, &bucket.name).match_one(&query).await? {
                tracing::debug!(cache = %bucket.name, url = %request.url, "registry match");
                return Ok(Some(response));
            }
        }

        Ok(None)
    }

    fn handle(&self, id: i64, name: &str) -> Cache {
        Cache::new(id, name.to_string(), self.db.clone(), Arc::clone(&self.fetcher))
    }
}
