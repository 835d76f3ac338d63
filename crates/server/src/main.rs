//! cachestorage-mcp server entry point.
//!
//! Boots the cache registry over the configured SQLite database and serves it
//! as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use cachestorage_client::{FetchConfig, HttpFetcher};
use cachestorage_core::{AppConfig, CacheStorage, Storage};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(db_path = %config.db_path.display(), "Starting cachestorage-mcp server on stdio transport");

    let db = Storage::open(&config.db_path).await?;
    let fetcher = HttpFetcher::new(FetchConfig::from(&config))?;
    let storage = CacheStorage::new(db.clone(), Arc::new(fetcher));

    let handler = handler::CacheStorageServer::new(storage);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    let reason = server.waiting().await?;
    tracing::info!(?reason, "MCP session ended");

    db.close().await?;

    Ok(())
}
