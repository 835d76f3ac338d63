//! SQLite-backed storage for buckets and their entries.
//!
//! This module provides the durable half of the cache using SQLite with
//! async access via tokio-rusqlite. It supports:
//!
//! - A `buckets` table with unique names
//! - An `entries` table with one row per (bucket, normalized URL), cascading on bucket delete
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Transactional batch writes for `addAll`

pub mod buckets;
pub mod connection;
pub mod entries;
pub mod headers;
pub mod migrations;

pub use crate::Error;

pub use buckets::Bucket;
pub use connection::Storage;
pub use entries::{NewEntry, StoredEntry};
