//! Metadata staleness policy.
//!
//! A stored row is served while its `check_date` is within the TTL. Past
//! that, the resource is resolved and described again. A failed refresh
//! keeps serving the previous row; only a resource never seen before turns
//! into `NOT_FOUND`.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use thumbs_core::{CacheDb, Error, ResourceMeta, ThumbnailCache};

use crate::resolver::RemoteResolver;

/// How [`MetadataRefresher::ensure_fresh`] obtained its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Stored row was within the TTL.
    Cached,
    /// Row was fetched again; `purged` thumbnails were dropped on a hash change.
    Refreshed { purged: u64 },
    /// Refresh failed, the previous row is served.
    Retained,
}

pub struct MetadataRefresher {
    db: CacheDb,
    resolver: Arc<RemoteResolver>,
    cache: ThumbnailCache,
    ttl_secs: u64,
}

impl MetadataRefresher {
    pub fn new(db: CacheDb, resolver: Arc<RemoteResolver>, cache: ThumbnailCache, ttl_secs: u64) -> Self {
        Self { db, resolver, cache, ttl_secs }
    }

    /// Current metadata of `id`, refreshed from the repository when stale or when `force` is set.
    pub async fn ensure_fresh(&self, id: &str, force: bool) -> Result<(ResourceMeta, Freshness), Error> {
        let stored = self.db.get_resource(id).await?;
        // stored timestamps keep microseconds
        let now = Utc::now().trunc_subsecs(6);

        if let Some(meta) = &stored
            && !force
            && !meta.is_stale(now, self.ttl_secs)
        {
            tracing::debug!(id, age_secs = meta.age_secs(now), "local metadata valid");
            return Ok((meta.clone(), Freshness::Cached));
        }

        tracing::info!(
            id,
            force,
            age_secs = stored.as_ref().and_then(|m| m.age_secs(now)),
            "fetching fresh metadata from the repository"
        );

        let described = match self.resolver.describe(id).await {
            Ok(meta) => meta,
            Err(e) => {
                return match stored {
                    Some(previous) => {
                        tracing::warn!(id, error = %e, "metadata refresh failed, serving last known metadata");
                        Ok((previous, Freshness::Retained))
                    }
                    None => Err(not_found(id, e)),
                };
            }
        };

        let fresh = ResourceMeta { check_date: stored.as_ref().and_then(|m| m.check_date), ..described }
            .with_check_date(now);
        self.db.upsert_resource(&fresh).await?;

        let purged = match &stored {
            Some(previous) if previous.repo_hash != fresh.repo_hash => {
                tracing::info!(
                    id,
                    old_hash = %previous.repo_hash,
                    new_hash = %fresh.repo_hash,
                    "resource has changed, removing cached thumbnails"
                );
                self.cache.purge(&previous.real_url).await?
            }
            _ => 0,
        };

        Ok((fresh, Freshness::Refreshed { purged }))
    }
}

fn not_found(id: &str, cause: Error) -> Error {
    match cause {
        Error::ResolutionFailed(_) | Error::HttpError(_) | Error::GraphParse(_) => {
            Error::NotFound(format!("{id}: {cause}"))
        }
        other => other,
    }
}
