//! MCP tool implementations.
//!
//! This module contains all tools exposed by the thumbnail server.

pub mod cache;
pub mod thumbnail;

pub use cache::{EvictCacheParams, ListCachedSizesParams, evict_impl, sizes_impl};
pub use thumbnail::{GetThumbnailParams, thumbnail_impl};

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use thumbs_core::Error;

/// Wrap `output` as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, Error> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
