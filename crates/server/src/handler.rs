//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    EvictCacheParams, GetThumbnailParams, ListCachedSizesParams, evict_impl, sizes_impl, thumbnail_impl,
};

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
use thumbs_client::ThumbnailService;

/// The main MCP server handler for the thumbnail service.
#[derive(Clone)]
pub struct ThumbsServer {
    service: Arc<ThumbnailService>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ThumbsServer {
    /// Create a new server handler around a ready service.
    pub fn new(service: Arc<ThumbnailService>) -> Self {
        Self { service, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Get a PNG thumbnail of a repository resource. Returns the local file path and response headers; generates and caches the thumbnail on a miss."
    )]
    async fn get_thumbnail(&self, params: Parameters<GetThumbnailParams>) -> Result<CallToolResult, McpError> {
        thumbnail_impl(&self.service, params.0).await
    }

    #[tool(description = "List the thumbnail sizes already cached for a resource, as widths with their heights.")]
    async fn list_cached_sizes(&self, params: Parameters<ListCachedSizesParams>) -> Result<CallToolResult, McpError> {
        sizes_impl(&self.service, params.0).await
    }

    /// Operator maintenance: trims the cache and reports what was removed.
    #[tool(
        description = "Shrink the thumbnail cache to a size budget, removing oldest (mode=time) or largest (mode=size) files first, then empty directories."
    )]
    async fn evict_cache(&self, params: Parameters<EvictCacheParams>) -> Result<CallToolResult, McpError> {
        evict_impl(&self.service, params.0).await
    }
}

impl ServerHandler for ThumbsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "thumbs".into(),
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
