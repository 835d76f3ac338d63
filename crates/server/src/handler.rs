//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::{
    buckets::{self, CacheKeysParams, CacheNameParams},
    entries::{self, CacheAddParams, CacheEntryDeleteParams, CacheMatchAllParams, CacheMatchParams, CachePutParams},
};

use cachestorage_core::CacheStorage;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for cachestorage-mcp.
#[derive(Clone)]
pub struct CacheStorageServer {
    storage: CacheStorage,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl CacheStorageServer {
    /// Create a new server handler over an opened registry.
    pub fn new(storage: CacheStorage) -> Self {
        Self { storage, tool_router: Self::tool_router() }
    }

    #[tool(description = "Open a named cache, creating it if it does not exist.")]
    async fn cache_open(&self, params: Parameters<CacheNameParams>) -> Result<CallToolResult, McpError> {
        buckets::open_impl(&self.storage, params.0).await
    }

    #[tool(description = "Check whether a named cache exists.")]
    async fn cache_has(&self, params: Parameters<CacheNameParams>) -> Result<CallToolResult, McpError> {
        buckets::has_impl(&self.storage, params.0).await
    }

    #[tool(description = "Delete a named cache and every entry in it.")]
    async fn cache_delete(&self, params: Parameters<CacheNameParams>) -> Result<CallToolResult, McpError> {
        buckets::delete_impl(&self.storage, params.0).await
    }

    /// List cache names, or the stored requests of one cache when `cache_name` is set.
    #[tool(
        description = "List cache names in creation order. With cache_name, list that cache's stored requests, \
                       optionally filtered by a request."
    )]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        buckets::keys_impl(&self.storage, params.0).await
    }

    /// Fetch every request and store all responses, or store nothing.
    ///
    /// Fetches run concurrently; the first failure cancels the rest.
    #[tool(
        description = "Fetch a list of GET requests and store their responses in a cache. Atomic: if any fetch \
                       fails or returns a non-2xx status, nothing is stored."
    )]
    async fn cache_add(&self, params: Parameters<CacheAddParams>) -> Result<CallToolResult, McpError> {
        entries::add_impl(&self.storage, params.0).await
    }

    #[tool(description = "Store a response for a request in a cache, replacing any entry for the same URL.")]
    async fn cache_put(&self, params: Parameters<CachePutParams>) -> Result<CallToolResult, McpError> {
        entries::put_impl(&self.storage, params.0).await
    }

    #[tool(
        description = "Find the first stored response matching a request, across all caches in creation order \
                       or in one cache."
    )]
    async fn cache_match(&self, params: Parameters<CacheMatchParams>) -> Result<CallToolResult, McpError> {
        entries::match_impl(&self.storage, params.0).await
    }

    #[tool(description = "List every stored response in a cache matching a request, or all of them.")]
    async fn cache_match_all(&self, params: Parameters<CacheMatchAllParams>) -> Result<CallToolResult, McpError> {
        entries::match_all_impl(&self.storage, params.0).await
    }

    #[tool(description = "Delete the entries of a cache matching a request.")]
    async fn cache_entry_delete(&self, params: Parameters<CacheEntryDeleteParams>) -> Result<CallToolResult, McpError> {
        entries::entry_delete_impl(&self.storage, params.0).await
    }
}

impl ServerHandler for CacheStorageServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "cachestorage-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
