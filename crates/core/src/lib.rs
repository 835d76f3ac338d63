//! Core types and shared functionality for cachestorage.
//!
//! This crate provides:
//! - Named buckets of request/response entries with browser-style matching
//! - The atomic fetch-then-commit `add_all` protocol
//! - SQLite storage backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod matcher;
pub mod message;
pub mod normalize;
pub mod registry;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cache::{Cache, validate_request};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use fetch::Fetcher;
pub use matcher::{MatchAllQuery, MultiCacheQueryOptions, QueryOptions};
pub use message::{CacheRequest, CacheResponse};
pub use registry::CacheStorage;
pub use storage::Storage;
