//! Network side of cachestorage.
//!
//! Provides the reqwest-backed [`HttpFetcher`] that `Cache::add` and
//! `Cache::add_all` use to populate buckets.

pub mod fetch;

pub use fetch::{FetchConfig, HttpFetcher, client_builder};
