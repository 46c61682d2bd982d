//! list_cached_sizes tool implementation.
//!
//! Lists the thumbnail sizes already cached for a resource.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thumbs_client::ThumbnailService;
use thumbs_core::SizeOrder;

use crate::tools::json_result;

/// Parameters for the list_cached_sizes tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListCachedSizesParams {
    /// Repository identifier of the resource.
    pub id: String,

    /// Sort order of widths and heights: "asc" (default) or "desc".
    #[serde(default)]
    pub order: SizeOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachedWidth {
    pub width: u32,
    pub heights: Vec<u32>,
}

/// Output from the list_cached_sizes tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListCachedSizesOutput {
    pub id: String,
    pub sizes: Vec<CachedWidth>,
}

/// Implementation of the list_cached_sizes tool.
pub async fn sizes_impl(service: &ThumbnailService, params: ListCachedSizesParams) -> Result<CallToolResult, McpError> {
    let sizes = service.list_cached_sizes(&params.id, params.order).await?;

    let output = ListCachedSizesOutput {
        id: params.id,
        sizes: sizes
            .into_iter()
            .map(|(width, heights)| CachedWidth { width, heights })
            .collect(),
    };

    Ok(json_result(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{ID, output, service};

    #[tokio::test]
    async fn test_sizes_after_generation() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        service.get_thumbnail(ID, 64, 32, false, None).await.unwrap();
        service.get_thumbnail(ID, 64, 0, false, None).await.unwrap();
        service.get_thumbnail(ID, 128, 64, false, None).await.unwrap();

        let params = ListCachedSizesParams { id: ID.into(), order: SizeOrder::Desc };
        let listed: ListCachedSizesOutput = output(&sizes_impl(&service, params).await.unwrap());
        let flat: Vec<(u32, Vec<u32>)> = listed.sizes.into_iter().map(|c| (c.width, c.heights)).collect();
        assert_eq!(flat, vec![(128, vec![64]), (64, vec![32, 0])]);
    }

    #[tokio::test]
    async fn test_sizes_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;

        let params: ListCachedSizesParams = serde_json::from_str(r#"{"id":"http://12345"}"#).unwrap();
        assert_eq!(params.order, SizeOrder::Asc);
        let listed: ListCachedSizesOutput = output(&sizes_impl(&service, params).await.unwrap());
        assert!(listed.sizes.is_empty());
    }
}
