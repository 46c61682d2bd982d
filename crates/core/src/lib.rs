//! Core types and shared functionality for the thumbnail service.
//!
//! This crate provides:
//! - Resource metadata values and their SQLite store
//! - The on-disk thumbnail cache layout and eviction sweep
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod meta;

pub use cache::{CacheDb, CacheEvictor, CacheLookup, Dimensions, EvictMode, EvictionReport, SizeOrder, ThumbnailCache};
pub use config::AppConfig;
pub use error::Error;
pub use meta::ResourceMeta;
