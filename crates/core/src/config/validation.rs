//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::cache::Dimensions;
use crate::cache::evict::EvictMode;
use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `default_width` or `default_height` is 0 or above `Dimensions::MAX_SIDE`
    /// - `evict_mode` is neither "time" nor "size"
    /// - a handler entry lists no mime type
    ///
    /// Returns `ConfigError::Missing` if `cache_dir` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_dir".into(),
                hint: "Set THUMBS_CACHE_DIR environment variable".into(),
            });
        }

        if self.default_width == 0 || self.default_height == 0 {
            return Err(ConfigError::Invalid {
                field: "default_width/default_height".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if Dimensions::new(self.default_width, self.default_height).check_bounds().is_err() {
            return Err(ConfigError::Invalid {
                field: "default_width/default_height".into(),
                reason: format!("must not exceed {}", Dimensions::MAX_SIDE),
            });
        }

        if let Err(e) = self.evict_mode.parse::<EvictMode>() {
            return Err(ConfigError::Invalid { field: "evict_mode".into(), reason: e.to_string() });
        }

        if let Some(pos) = self.handlers.iter().position(|h| h.mime_types().is_empty()) {
            return Err(ConfigError::Invalid {
                field: format!("handlers[{pos}].mime"),
                reason: "must list at least one mime type".into(),
            });
        }

        if self.metadata_ttl_secs == 0 {
            tracing::warn!("metadata_ttl_secs is 0; metadata will be refreshed on every request");
        }

        Ok(())
    }
}
