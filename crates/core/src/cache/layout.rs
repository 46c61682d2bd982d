//! On-disk thumbnail layout.
//!
//! `root/<hash(real_url)>/WWWW_HHHH`, where `0000_0000` holds the cached
//! reference binary. A file is valid only while its modification time is
//! newer than the resource's `mod_date`.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hash::compute_cache_key;
use crate::Error;

/// Prefix of in-flight files; never considered cache entries.
pub const TMP_PREFIX: &str = ".tmp";

/// Requested thumbnail size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Slot of the cached reference binary.
    pub const REFERENCE: Dimensions = Dimensions { width: 0, height: 0 };

    /// Largest width or height that still fits the four-digit file name.
    pub const MAX_SIDE: u32 = 9999;

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_reference(&self) -> bool {
        *self == Self::REFERENCE
    }

    /// Reject sizes beyond [`Dimensions::MAX_SIDE`].
    pub fn check_bounds(self) -> Result<Self, Error> {
        if self.width > Self::MAX_SIDE || self.height > Self::MAX_SIDE {
            return Err(Error::InvalidInput(format!(
                "thumbnail size {}x{} exceeds {max}x{max}",
                self.width,
                self.height,
                max = Self::MAX_SIDE
            )));
        }
        Ok(self)
    }

    /// `WWWW_HHHH` file name.
    pub fn file_name(&self) -> String {
        format!("{:04}_{:04}", self.width, self.height)
    }

    /// Inverse of [`Dimensions::file_name`].
    pub fn parse(name: &str) -> Option<Self> {
        let (w, h) = name.split_once('_')?;
        if w.is_empty() || h.is_empty() || !w.bytes().chain(h.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self { width: w.parse().ok()?, height: h.parse().ok()? })
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// File exists and is newer than the resource.
    Hit(PathBuf),
    /// File exists but predates the resource's last modification.
    Stale(PathBuf),
    Miss(PathBuf),
}

impl CacheLookup {
    pub fn path(&self) -> &Path {
        match self {
            CacheLookup::Hit(p) | CacheLookup::Stale(p) | CacheLookup::Miss(p) => p,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Ordering of [`ThumbnailCache::list_cached_sizes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SizeOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SizeOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SizeOrder::Asc),
            "desc" => Ok(SizeOrder::Desc),
            other => Err(Error::InvalidInput(format!("unknown order: {other} (expected asc or desc)"))),
        }
    }
}

/// Widths mapped to the heights cached for each.
pub type CachedSizes = Vec<(u32, Vec<u32>)>;

/// Content-hash keyed, dimension keyed file cache.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    root: PathBuf,
}

impl ThumbnailCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding every cached file of `real_url`.
    pub fn entry_dir(&self, real_url: &str) -> PathBuf {
        self.root.join(compute_cache_key(real_url))
    }

    pub fn file_path(&self, real_url: &str, dims: Dimensions) -> PathBuf {
        self.entry_dir(real_url).join(dims.file_name())
    }

    pub fn reference_path(&self, real_url: &str) -> PathBuf {
        self.file_path(real_url, Dimensions::REFERENCE)
    }

    /// Create the entry directory of `real_url` if missing.
    pub async fn ensure_entry_dir(&self, real_url: &str) -> Result<PathBuf, Error> {
        let dir = self.entry_dir(real_url);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Classify the cached file of `real_url` at `dims` against `mod_date`.
    pub async fn lookup(&self, real_url: &str, dims: Dimensions, mod_date: DateTime<Utc>) -> Result<CacheLookup, Error> {
        let path = self.file_path(real_url, dims);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(CacheLookup::Miss(path)),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CacheLookup::Miss(path)),
            Err(e) => return Err(e.into()),
        };

        let modified: DateTime<Utc> = metadata.modified()?.into();
        if modified > mod_date { Ok(CacheLookup::Hit(path)) } else { Ok(CacheLookup::Stale(path)) }
    }

    /// Delete every regular file cached for `real_url`, keeping the directory.
    ///
    /// Returns the number of deleted files.
    pub async fn purge(&self, real_url: &str) -> Result<u64, Error> {
        let dir = self.entry_dir(real_url);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut deleted = 0u64;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(real_url, dir = %dir.display(), deleted, "purged cached thumbnails");
        Ok(deleted)
    }

    /// List the sizes cached for `real_url`.
    ///
    /// The reference binary slot and in-flight files are not reported.
    pub async fn list_cached_sizes(&self, real_url: &str, order: SizeOrder) -> Result<CachedSizes, Error> {
        let dir = self.entry_dir(real_url);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sizes: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(dims) = name.to_str().and_then(Dimensions::parse) else {
                continue;
            };
            if dims.is_reference() {
                continue;
            }
            sizes.entry(dims.width).or_default().push(dims.height);
        }

        let mut listed: CachedSizes = sizes.into_iter().collect();
        match order {
            SizeOrder::Asc => listed.iter_mut().for_each(|(_, h)| h.sort_unstable()),
            SizeOrder::Desc => {
                listed.reverse();
                listed.iter_mut().for_each(|(_, h)| h.sort_unstable_by_key(|v| Reverse(*v)));
            }
        }
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::{Duration, SystemTime};

    const REAL_URL: &str = "https://repo/api/504945";

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_file_name_padding() {
        assert_eq!(Dimensions::new(100, 100).file_name(), "0100_0100");
        assert_eq!(Dimensions::REFERENCE.file_name(), "0000_0000");
        assert_eq!(Dimensions::new(12345, 7).file_name(), "12345_0007");
    }

    #[test]
    fn test_check_bounds() {
        assert!(Dimensions::new(9999, 9999).check_bounds().is_ok());
        assert!(Dimensions::new(100, 0).check_bounds().is_ok());
        assert!(matches!(Dimensions::new(60000, 60000).check_bounds(), Err(Error::InvalidInput(_))));
        assert!(matches!(Dimensions::new(100, 10000).check_bounds(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(Dimensions::parse("0100_0050"), Some(Dimensions::new(100, 50)));
        assert_eq!(Dimensions::parse(".tmpAb12"), None);
        assert_eq!(Dimensions::parse("0100_"), None);
        assert_eq!(Dimensions::parse("abc_0100"), None);
    }

    #[test]
    fn test_paths_keyed_by_real_url() {
        let cache = ThumbnailCache::new("/cache");
        let path = cache.file_path(REAL_URL, Dimensions::new(100, 100));
        assert_eq!(path.parent().unwrap(), cache.entry_dir(REAL_URL));
        assert!(path.ends_with("0100_0100"));
        assert!(cache.reference_path(REAL_URL).ends_with("0000_0000"));
    }

    #[tokio::test]
    async fn test_lookup_miss_hit_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path());
        let dims = Dimensions::new(100, 100);
        let mod_date = Utc.with_ymd_and_hms(2024, 1, 6, 20, 45, 13).unwrap();

        let lookup = cache.lookup(REAL_URL, dims, mod_date).await.unwrap();
        assert!(matches!(lookup, CacheLookup::Miss(_)));

        touch(lookup.path());
        let lookup = cache.lookup(REAL_URL, dims, mod_date).await.unwrap();
        assert!(lookup.is_hit());

        let future = Utc::now() + chrono::Duration::days(1);
        let lookup = cache.lookup(REAL_URL, dims, future).await.unwrap();
        assert!(matches!(lookup, CacheLookup::Stale(_)));
    }

    #[tokio::test]
    async fn test_lookup_uses_file_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path());
        let dims = Dimensions::new(10, 10);
        let path = cache.file_path(REAL_URL, dims);
        touch(&path);

        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        std::fs::File::options().write(true).open(&path).unwrap().set_modified(old).unwrap();

        let mod_date = Utc.with_ymd_and_hms(2024, 1, 6, 20, 45, 13).unwrap();
        assert!(matches!(cache.lookup(REAL_URL, dims, mod_date).await.unwrap(), CacheLookup::Stale(_)));
    }

    #[tokio::test]
    async fn test_purge_keeps_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path());
        touch(&cache.file_path(REAL_URL, Dimensions::new(100, 100)));
        touch(&cache.file_path(REAL_URL, Dimensions::new(200, 100)));
        touch(&cache.reference_path(REAL_URL));
        std::fs::create_dir_all(cache.entry_dir(REAL_URL).join("nested")).unwrap();

        let deleted = cache.purge(REAL_URL).await.unwrap();
        assert_eq!(deleted, 3);
        assert!(cache.entry_dir(REAL_URL).is_dir());
        assert!(cache.entry_dir(REAL_URL).join("nested").is_dir());
    }

    #[tokio::test]
    async fn test_purge_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path());
        assert_eq!(cache.purge(REAL_URL).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_cached_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path());
        for (w, h) in [(100, 100), (100, 50), (200, 0), (0, 0)] {
            touch(&cache.file_path(REAL_URL, Dimensions::new(w, h)));
        }
        touch(&cache.entry_dir(REAL_URL).join(".tmpXYZ"));

        let asc = cache.list_cached_sizes(REAL_URL, SizeOrder::Asc).await.unwrap();
        assert_eq!(asc, vec![(100, vec![50, 100]), (200, vec![0])]);

        let desc = cache.list_cached_sizes(REAL_URL, SizeOrder::Desc).await.unwrap();
        assert_eq!(desc, vec![(200, vec![0]), (100, vec![100, 50])]);
    }

    #[test]
    fn test_size_order_from_str() {
        assert_eq!("asc".parse::<SizeOrder>().unwrap(), SizeOrder::Asc);
        assert_eq!("desc".parse::<SizeOrder>().unwrap(), SizeOrder::Desc);
        assert!("up".parse::<SizeOrder>().is_err());
    }
}
