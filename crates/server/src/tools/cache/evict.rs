//! evict_cache tool implementation.
//!
//! Shrinks the thumbnail cache to a size budget.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thumbs_client::ThumbnailService;

use crate::tools::json_result;

/// Parameters for the evict_cache tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EvictCacheParams {
    /// Cache budget in MB. Defaults to the configured budget.
    pub max_size_mb: Option<u64>,

    /// "time" removes the oldest files first, "size" the largest. Defaults to the configured mode.
    pub mode: Option<String>,
}

/// Implementation of the evict_cache tool.
pub async fn evict_impl(service: &ThumbnailService, params: EvictCacheParams) -> Result<CallToolResult, McpError> {
    let report = service
        .evict_cache(params.max_size_mb, params.mode.as_deref())
        .await?;

    Ok(json_result(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{ID, output, service};
    use thumbs_core::EvictionReport;

    #[tokio::test]
    async fn test_evict_everything() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        service.get_thumbnail(ID, 64, 64, false, None).await.unwrap();

        let params = EvictCacheParams { max_size_mb: Some(0), mode: Some("time".into()) };
        let report: EvictionReport = output(&evict_impl(&service, params).await.unwrap());
        assert_eq!(report.removed_files, 2);
        assert_eq!(report.remaining_bytes, 0);
        assert_eq!(report.removed_dirs, 1);
    }

    #[tokio::test]
    async fn test_within_default_budget() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        service.get_thumbnail(ID, 64, 64, false, None).await.unwrap();

        let report: EvictionReport =
            output(&evict_impl(&service, EvictCacheParams { max_size_mb: None, mode: None }).await.unwrap());
        assert_eq!(report.scanned_files, 2);
        assert_eq!(report.removed_files, 0);
    }

    #[tokio::test]
    async fn test_unknown_mode_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;

        let params = EvictCacheParams { max_size_mb: Some(0), mode: Some("random".into()) };
        let err = evict_impl(&service, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
