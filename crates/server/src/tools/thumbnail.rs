//! get_thumbnail tool implementation.
//!
//! Returns the local path of a PNG thumbnail, generating it on a cache miss.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thumbs_client::ThumbnailService;

use super::json_result;

/// Parameters for the get_thumbnail tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetThumbnailParams {
    /// Repository identifier of the resource.
    pub id: String,

    /// Requested width in pixels, at most 9999; 0 derives it from the height.
    #[serde(default)]
    pub width: u32,

    /// Requested height in pixels, at most 9999; 0 derives it from the width.
    #[serde(default)]
    pub height: u32,

    /// Refresh repository metadata even if the local copy is still valid.
    #[serde(default)]
    pub force: bool,

    /// Roles granted to the caller. Defaults to the anonymous roles.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

/// Output from the get_thumbnail tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetThumbnailOutput {
    /// Local path of the PNG file.
    pub path: String,
    pub width: u32,
    pub height: u32,
    /// Headers to send along with the file.
    pub headers: BTreeMap<String, String>,
    /// True when the file was already cached.
    pub cache_hit: bool,
    /// Handler that produced the file on a miss.
    pub handler: Option<String>,
}

/// Implementation of the get_thumbnail tool.
pub async fn thumbnail_impl(
    service: &ThumbnailService, params: GetThumbnailParams,
) -> Result<CallToolResult, McpError> {
    let thumbnail = service
        .get_thumbnail(&params.id, params.width, params.height, params.force, params.roles.as_deref())
        .await?;

    let output = GetThumbnailOutput {
        path: thumbnail.path.display().to_string(),
        width: thumbnail.width,
        height: thumbnail.height,
        headers: thumbnail.headers.iter().cloned().collect(),
        cache_hit: thumbnail.is_cache_hit(),
        handler: thumbnail.generated_by.map(String::from),
    };

    Ok(json_result(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{ID, output, service};

    fn params(roles: Option<Vec<String>>) -> GetThumbnailParams {
        GetThumbnailParams { id: ID.to_string(), width: 100, height: 100, force: false, roles }
    }

    #[tokio::test]
    async fn test_thumbnail_then_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;

        let first: GetThumbnailOutput = output(&thumbnail_impl(&service, params(None)).await.unwrap());
        assert!(!first.cache_hit);
        assert_eq!(first.handler.as_deref(), Some("image"));
        assert!(first.path.ends_with("0100_0100"));
        assert_eq!(first.headers.get("Content-Type").map(String::as_str), Some("image/png"));
        let size = std::fs::metadata(&first.path).unwrap().len();
        assert_eq!(first.headers.get("Content-Size"), Some(&size.to_string()));

        let second: GetThumbnailOutput = output(&thumbnail_impl(&service, params(None)).await.unwrap());
        assert!(second.cache_hit);
        assert_eq!(second.path, first.path);
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_error_code() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;

        let err = thumbnail_impl(&service, params(Some(vec!["restricted".into()])))
            .await
            .unwrap_err();
        assert_eq!(err.code.0, -32003);
        assert!(err.message.starts_with("UNAUTHORIZED"));
    }

    #[tokio::test]
    async fn test_unknown_resource_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;

        let mut missing = params(None);
        missing.id = "http://99999".into();
        let err = thumbnail_impl(&service, missing).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[test]
    fn test_params_defaults() {
        let params: GetThumbnailParams = serde_json::from_str(r#"{"id":"http://12345"}"#).unwrap();
        assert_eq!((params.width, params.height), (0, 0));
        assert!(!params.force);
        assert!(params.roles.is_none());
    }
}
