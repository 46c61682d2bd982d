//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and trimming the thumbnail cache.

pub mod evict;
pub mod sizes;

pub use evict::{EvictCacheParams, evict_impl};
pub use sizes::{ListCachedSizesParams, sizes_impl};
