//! Client code for the thumbnail service.
//!
//! This crate provides the repository transport, metadata resolution,
//! thumbnail handlers and the generation pipeline shared by the server.

pub mod fetch;
pub mod graph;
pub mod handler;
pub mod resolver;
pub mod thumbnail;

pub use fetch::{FetchClient, FetchConfig, RepoResponse, RepoTransport};
pub use graph::Graph;
pub use handler::{HandlerOutcome, HandlerRegistry, ThumbnailHandler, ThumbnailJob};
pub use resolver::RemoteResolver;
pub use thumbnail::{Freshness, GenerationPipeline, MetadataRefresher, Thumbnail, ThumbnailService};
