//! The operations offered to the front layer.
//!
//! [`ThumbnailService`] wires the refresher, the pipeline and the evictor
//! around one metadata store and one cache directory.

pub mod pipeline;
pub mod refresh;

use std::sync::Arc;

use thumbs_core::cache::CachedSizes;
use thumbs_core::{AppConfig, CacheDb, CacheEvictor, EvictMode, EvictionReport, Error, SizeOrder, ThumbnailCache};

use crate::fetch::{FetchClient, FetchConfig, RepoTransport, normalize_identifier};
use crate::handler::HandlerRegistry;
use crate::resolver::RemoteResolver;

pub use pipeline::{GenerationPipeline, PipelineOptions, Thumbnail};
pub use refresh::{Freshness, MetadataRefresher};

pub struct ThumbnailService {
    refresher: MetadataRefresher,
    pipeline: GenerationPipeline,
    cache: ThumbnailCache,
    evictor: CacheEvictor,
    default_roles: Vec<String>,
    cache_max_size_mb: u64,
    evict_mode: EvictMode,
}

impl ThumbnailService {
    /// Build the service around an explicit transport.
    pub fn new(config: &AppConfig, db: CacheDb, transport: Arc<dyn RepoTransport>) -> Result<Self, Error> {
        let cache = ThumbnailCache::new(&config.cache_dir);
        let resolver = Arc::new(RemoteResolver::new(
            transport.clone(),
            config.schema.clone(),
            config.meta_fetch_header.clone(),
        ));
        let refresher = MetadataRefresher::new(db, resolver, cache.clone(), config.metadata_ttl_secs);
        let pipeline = GenerationPipeline::new(
            cache.clone(),
            Arc::new(HandlerRegistry::from_config(config)),
            transport,
            PipelineOptions {
                max_file_size_mb: config.max_file_size_mb,
                default_width: config.default_width,
                default_height: config.default_height,
                allowed_classes: config.access.allowed_classes.clone(),
            },
        );

        Ok(Self {
            refresher,
            pipeline,
            evictor: CacheEvictor::new(&config.cache_dir),
            cache,
            default_roles: config.access.default_roles.clone(),
            cache_max_size_mb: config.cache_max_size_mb,
            evict_mode: config.evict_mode.parse()?,
        })
    }

    /// Open the metadata store and the HTTP client named in `config`.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let db = CacheDb::open(&config.db_path).await?;
        let transport = Arc::new(FetchClient::new(FetchConfig::from(config))?);
        tracing::info!(
            db = %config.db_path.display(),
            cache = %config.cache_dir.display(),
            ttl_secs = config.metadata_ttl_secs,
            "thumbnail service ready"
        );
        Self::new(config, db, transport)
    }

    /// Thumbnail of `id` at `width` x `height`.
    ///
    /// `roles` defaults to the configured anonymous roles. `force` refreshes
    /// metadata even within the TTL.
    pub async fn get_thumbnail(
        &self, id: &str, width: u32, height: u32, force: bool, roles: Option<&[String]>,
    ) -> Result<Thumbnail, Error> {
        let id = normalize_identifier(id).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let (meta, freshness) = self.refresher.ensure_fresh(&id, force).await?;
        tracing::debug!(id = %id, ?freshness, real_url = %meta.real_url, "metadata ready");

        let roles = roles.unwrap_or(&self.default_roles);
        self.pipeline.respond(&meta, width, height, roles).await
    }

    /// Sizes already cached for `id`, keyed by width.
    pub async fn list_cached_sizes(&self, id: &str, order: SizeOrder) -> Result<CachedSizes, Error> {
        let id = normalize_identifier(id).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let (meta, _) = self.refresher.ensure_fresh(&id, false).await?;
        self.cache.list_cached_sizes(&meta.real_url, order).await
    }

    /// Run the eviction sweep; unset arguments fall back to configuration.
    ///
    /// An unknown mode is rejected before the cache is touched.
    pub async fn evict_cache(&self, max_size_mb: Option<u64>, mode: Option<&str>) -> Result<EvictionReport, Error> {
        let mode = match mode {
            Some(raw) => raw.parse::<EvictMode>()?,
            None => self.evict_mode,
        };
        self.evictor
            .clean(max_size_mb.unwrap_or(self.cache_max_size_mb), mode)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::metadata_url;
    use crate::fetch::stub::StubTransport;
    use std::io::Cursor;

    const ID: &str = "http://12345";
    const REAL: &str = "https://repo/api/504945";

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(300, 200, image::Rgba([10, 200, 10, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    async fn service(dir: &std::path::Path, stub: Arc<StubTransport>) -> ThumbnailService {
        let config = AppConfig { cache_dir: dir.to_path_buf(), ..AppConfig::default() };
        let schema = config.schema.clone();
        stub.redirect(ID, REAL);
        stub.respond(
            &metadata_url(REAL),
            200,
            Some("application/n-triples"),
            format!(
                "<{REAL}> <{}> \"h1\" .\n<{REAL}> <{}> \"image/png\" .\n<{REAL}> <{}> \"26214400\" .\n\
                 <{REAL}> <{}> \"2024-01-06T20:45:13\" .\n<{REAL}> <{}> \"public\" .\n",
                schema.hash, schema.mime, schema.size, schema.mod_date, schema.acl_read
            ),
        );
        stub.respond(REAL, 200, Some("image/png"), png_bytes());

        let db = CacheDb::open_in_memory().await.unwrap();
        ThumbnailService::new(&config, db, stub).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_public_request() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubTransport::new());
        let service = service(dir.path(), stub.clone()).await;

        let first = service.get_thumbnail(ID, 100, 100, false, None).await.unwrap();
        let cache = ThumbnailCache::new(dir.path());
        assert_eq!(first.path, cache.file_path(REAL, thumbs_core::Dimensions::new(100, 100)));
        assert!(std::fs::metadata(&first.path).unwrap().len() > 0);
        assert_eq!(first.generated_by, Some("image"));

        let calls = stub.total_calls();
        let second = service.get_thumbnail(ID, 100, 100, false, None).await.unwrap();
        assert!(second.is_cache_hit());
        assert_eq!(std::fs::read(&first.path).unwrap(), std::fs::read(&second.path).unwrap());
        assert_eq!(stub.total_calls(), calls);
    }

    #[tokio::test]
    async fn test_restricted_caller_is_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Arc::new(StubTransport::new())).await;

        let roles = vec!["restricted".to_string()];
        let err = service.get_thumbnail(ID, 100, 100, false, Some(&roles)).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_invalid_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Arc::new(StubTransport::new())).await;
        let err = service.get_thumbnail("   ", 10, 10, false, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_cached_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Arc::new(StubTransport::new())).await;

        service.get_thumbnail(ID, 100, 50, false, None).await.unwrap();
        service.get_thumbnail(ID, 100, 80, false, None).await.unwrap();
        service.get_thumbnail(ID, 40, 0, false, None).await.unwrap();

        let asc = service.list_cached_sizes(ID, SizeOrder::Asc).await.unwrap();
        assert_eq!(asc, vec![(40, vec![0]), (100, vec![50, 80])]);

        let desc = service.list_cached_sizes(ID, SizeOrder::Desc).await.unwrap();
        assert_eq!(desc, vec![(100, vec![80, 50]), (40, vec![0])]);
    }

    #[tokio::test]
    async fn test_evict_cache() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Arc::new(StubTransport::new())).await;
        service.get_thumbnail(ID, 100, 100, false, None).await.unwrap();

        let err = service.evict_cache(Some(0), Some("newest")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(ThumbnailCache::new(dir.path()).entry_dir(REAL).is_dir());

        let report = service.evict_cache(Some(0), Some("size")).await.unwrap();
        assert_eq!(report.removed_files, 2);
        assert_eq!(report.remaining_bytes, 0);
        assert!(!ThumbnailCache::new(dir.path()).entry_dir(REAL).exists());
    }
}
