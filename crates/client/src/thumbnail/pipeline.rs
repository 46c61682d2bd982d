//! Authorization, cache lookup, handler dispatch and atomic write-back.
//!
//! ### Write discipline
//! - Handlers write into a `.tmp*` sibling of the final file
//! - The sibling is renamed into place only if the final path is still absent
//! - At most one generation per (entry, width, height) runs at a time; waiters
//!   re-check the cache once the leader is done

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thumbs_core::cache::layout::TMP_PREFIX;
use thumbs_core::{CacheLookup, Dimensions, Error, ResourceMeta, ThumbnailCache};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::fetch::RepoTransport;
use crate::handler::{HandlerOutcome, HandlerRegistry, ThumbnailHandler, ThumbnailJob};

const PNG: &str = "image/png";

type InFlight = Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>;

/// A servable thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Response headers for the front layer.
    pub headers: Vec<(String, String)>,
    /// Name of the handler that produced the file, `None` on a cache hit.
    pub generated_by: Option<&'static str>,
}

impl Thumbnail {
    pub fn is_cache_hit(&self) -> bool {
        self.generated_by.is_none()
    }
}

/// Pipeline settings taken from configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_file_size_mb: u64,
    pub default_width: u32,
    pub default_height: u32,
    pub allowed_classes: Vec<String>,
}

pub struct GenerationPipeline {
    cache: ThumbnailCache,
    registry: Arc<HandlerRegistry>,
    transport: Arc<dyn RepoTransport>,
    options: PipelineOptions,
    in_flight: InFlight,
}

impl GenerationPipeline {
    pub fn new(
        cache: ThumbnailCache, registry: Arc<HandlerRegistry>, transport: Arc<dyn RepoTransport>,
        options: PipelineOptions,
    ) -> Self {
        Self { cache, registry, transport, options, in_flight: Mutex::new(HashMap::new()) }
    }

    /// Serve `meta` at `width` x `height` for a caller holding `roles`.
    ///
    /// Both dimensions at zero mean the configured default size.
    pub async fn respond<R: AsRef<str>>(
        &self, meta: &ResourceMeta, width: u32, height: u32, roles: &[R],
    ) -> Result<Thumbnail, Error> {
        if !meta.is_readable_by(roles, &self.options.allowed_classes) {
            tracing::info!(url = %meta.url, class = %meta.class, "access denied");
            return Err(Error::Unauthorized(format!("{}: no granted role may read this resource", meta.url)));
        }

        let dims = if width == 0 && height == 0 {
            Dimensions::new(self.options.default_width, self.options.default_height)
        } else {
            Dimensions::new(width, height)
        }
        .check_bounds()?;

        if let CacheLookup::Hit(path) = self.cache.lookup(&meta.real_url, dims, meta.mod_date).await? {
            tracing::debug!(url = %meta.url, path = %path.display(), "thumbnail cache hit");
            return served(path, dims, None).await;
        }

        if meta.size_mb > self.options.max_file_size_mb {
            return Err(Error::FileTooLarge { size_mb: meta.size_mb, limit_mb: self.options.max_file_size_mb });
        }

        let path = self.cache.file_path(&meta.real_url, dims);
        let _slot = self.claim(&path).await;

        match self.cache.lookup(&meta.real_url, dims, meta.mod_date).await? {
            CacheLookup::Hit(path) => {
                tracing::debug!(url = %meta.url, path = %path.display(), "generated by a concurrent request");
                return served(path, dims, None).await;
            }
            CacheLookup::Stale(path) => remove_if_present(&path).await?,
            CacheLookup::Miss(_) => {}
        }

        let handler = self.generate(meta, dims, &path).await?;
        served(path, dims, Some(handler)).await
    }

    /// Run the mime-specific handler, then the default one.
    async fn generate(&self, meta: &ResourceMeta, dims: Dimensions, path: &Path) -> Result<&'static str, Error> {
        let dir = self.cache.ensure_entry_dir(&meta.real_url).await?;

        if let Some(handler) = self.registry.handler_for(&meta.mime) {
            let reference = if handler.needs_reference() { Some(self.acquire_reference(meta).await?) } else { None };

            match self.run(handler.clone(), meta, reference, dims, &dir, path).await? {
                HandlerOutcome::Written => {
                    tracing::info!(url = %meta.url, handler = handler.name(), path = %path.display(), "thumbnail generated");
                    return Ok(handler.name());
                }
                HandlerOutcome::Declined(reason) | HandlerOutcome::Failed(reason) => {
                    tracing::warn!(url = %meta.url, handler = handler.name(), reason = %reason, "handler gave up, using default");
                }
            }
        } else {
            tracing::info!(url = %meta.url, mime = %meta.mime, "no handler for mime type, using default");
        }

        let fallback = self.registry.default_handler();
        let reference = if fallback.needs_reference() { Some(self.acquire_reference(meta).await?) } else { None };
        match self.run(fallback.clone(), meta, reference, dims, &dir, path).await? {
            HandlerOutcome::Written => {
                tracing::info!(url = %meta.url, handler = fallback.name(), path = %path.display(), "thumbnail generated");
                Ok(fallback.name())
            }
            HandlerOutcome::Declined(reason) => Err(Error::NoThumbnail(format!("{}: {reason}", meta.url))),
            HandlerOutcome::Failed(reason) => Err(Error::GenerationFailed(format!("{}: {reason}", meta.url))),
        }
    }

    /// Invoke one handler on the blocking pool and move its output into place.
    async fn run(
        &self, handler: Arc<dyn ThumbnailHandler>, meta: &ResourceMeta, reference: Option<PathBuf>, dims: Dimensions,
        dir: &Path, path: &Path,
    ) -> Result<HandlerOutcome, Error> {
        let (width, height) = if handler.maintains_aspect_ratio() {
            (dims.width, dims.height)
        } else {
            (
                if dims.width > 0 { dims.width } else { self.options.default_width },
                if dims.height > 0 { dims.height } else { self.options.default_height },
            )
        };

        let tmp = tempfile::Builder::new().prefix(TMP_PREFIX).tempfile_in(dir)?;
        let meta = meta.clone();
        let name = handler.name();

        let joined = tokio::task::spawn_blocking(move || {
            let job = ThumbnailJob { meta: &meta, reference: reference.as_deref(), width, height, dest: tmp.path() };
            let outcome = handler.create_thumbnail(&job);
            (outcome, tmp)
        })
        .await;

        let (outcome, tmp) = match joined {
            Ok(pair) => pair,
            Err(e) => return Ok(HandlerOutcome::Failed(format!("{name} handler panicked: {e}"))),
        };

        if !outcome.is_written() {
            return Ok(outcome);
        }
        if tokio::fs::metadata(tmp.path()).await?.len() == 0 {
            return Ok(HandlerOutcome::Failed(format!("{name} handler produced an empty file")));
        }

        persist(tmp, path)?;
        Ok(HandlerOutcome::Written)
    }

    /// Local copy of the original binary, downloaded when missing or stale.
    async fn acquire_reference(&self, meta: &ResourceMeta) -> Result<PathBuf, Error> {
        let path = self.cache.reference_path(&meta.real_url);
        let _slot = self.claim(&path).await;

        match self.cache.lookup(&meta.real_url, Dimensions::REFERENCE, meta.mod_date).await? {
            CacheLookup::Hit(path) => return Ok(path),
            CacheLookup::Stale(path) => remove_if_present(&path).await?,
            CacheLookup::Miss(_) => {}
        }

        let response = self
            .transport
            .get(&meta.real_url, &[])
            .await
            .map_err(|e| Error::ReferenceUnavailable(format!("{}: {e}", meta.real_url)))?;
        if !response.is_success() {
            return Err(Error::ReferenceUnavailable(format!("{}: status {}", meta.real_url, response.status)));
        }

        let received = response.mime().unwrap_or_default();
        if !meta.mime.is_empty() && !received.eq_ignore_ascii_case(&meta.mime) {
            return Err(Error::ReferenceUnavailable(format!(
                "{}: expected {}, got {}",
                meta.real_url,
                meta.mime,
                if received.is_empty() { "no content type" } else { received.as_str() }
            )));
        }

        let dir = self.cache.ensure_entry_dir(&meta.real_url).await?;
        let target = path.clone();
        let bytes = response.bytes;
        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            let mut tmp = tempfile::Builder::new().prefix(TMP_PREFIX).tempfile_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            persist(tmp, &target)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        tracing::debug!(url = %meta.real_url, path = %path.display(), "reference binary cached");
        Ok(path)
    }

    /// Serialize work on `path` with other requests of this process.
    async fn claim(&self, path: &Path) -> Slot<'_> {
        let lock = {
            let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(path.to_path_buf()).or_default().clone()
        };
        let guard = lock.clone().lock_owned().await;
        Slot { map: &self.in_flight, key: path.to_path_buf(), lock, guard: Some(guard) }
    }
}

/// Held while generating one file; forgets the key once nobody waits on it.
struct Slot<'a> {
    map: &'a InFlight,
    key: PathBuf,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        if Arc::strong_count(&self.lock) <= 2 {
            map.remove(&self.key);
        }
    }
}

/// Rename `tmp` to `path` unless `path` already exists; an existing file wins.
fn persist(tmp: tempfile::NamedTempFile, path: &Path) -> Result<(), Error> {
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
            tracing::debug!(path = %path.display(), "file appeared concurrently, keeping it");
            Ok(())
        }
        Err(e) => Err(Error::Io(e.error)),
    }
}

async fn remove_if_present(path: &Path) -> Result<(), Error> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed stale cached file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn served(path: PathBuf, dims: Dimensions, generated_by: Option<&'static str>) -> Result<Thumbnail, Error> {
    let size = tokio::fs::metadata(&path).await?.len();
    Ok(Thumbnail {
        path,
        width: dims.width,
        height: dims.height,
        headers: vec![("Content-Type".into(), PNG.into()), ("Content-Size".into(), size.to_string())],
        generated_by,
    })
}
