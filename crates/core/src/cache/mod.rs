//! Resource metadata store and on-disk thumbnail cache.
//!
//! - SQLite metadata rows with async access via tokio-rusqlite
//! - Automatic schema migrations and WAL mode
//! - Content-addressed thumbnail directories keyed by canonical URL
//! - Size-budget eviction (oldest-first or largest-first)

pub mod connection;
pub mod evict;
pub mod hash;
pub mod layout;
pub mod migrations;
pub mod resources;

pub use crate::Error;

pub use connection::CacheDb;
pub use evict::{CacheEvictor, EvictMode, EvictionReport};
pub use layout::{CacheLookup, CachedSizes, Dimensions, SizeOrder, ThumbnailCache};
