//! Out-of-band cache size enforcement.
//!
//! Walks the whole cache tree, removes files until the total size fits the
//! budget, then prunes directories left empty. No ordering is guaranteed
//! against concurrent generation; a file may be evicted right after it was
//! written.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::Error;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Which files go first when the cache is over budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EvictMode {
    /// Oldest modification time first.
    Time,
    /// Largest file first.
    Size,
}

impl FromStr for EvictMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time" => Ok(EvictMode::Time),
            "size" => Ok(EvictMode::Size),
            other => Err(Error::InvalidInput(format!("unknown eviction mode: {other} (expected time or size)"))),
        }
    }
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EvictionReport {
    pub scanned_files: u64,
    pub total_bytes: u64,
    pub removed_files: u64,
    pub bytes_freed: u64,
    pub remaining_bytes: u64,
    pub removed_dirs: u64,
}

struct CachedFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Enforces a total-size budget on a cache directory.
#[derive(Debug, Clone)]
pub struct CacheEvictor {
    root: PathBuf,
}

impl CacheEvictor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Shrink the cache to at most `max_size_mb` and prune empty directories.
    ///
    /// Runs the filesystem walk on the blocking pool.
    pub async fn clean(&self, max_size_mb: u64, mode: EvictMode) -> Result<EvictionReport, Error> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || clean_blocking(&root, max_size_mb, mode))
            .await
            .map_err(|e| Error::Io(io::Error::other(e)))?
    }
}

fn clean_blocking(root: &Path, max_size_mb: u64, mode: EvictMode) -> Result<EvictionReport, Error> {
    let mut report = EvictionReport::default();
    if !root.is_dir() {
        tracing::debug!(root = %root.display(), "cache directory missing, nothing to evict");
        return Ok(report);
    }

    let mut files = collect_files(root)?;
    report.scanned_files = files.len() as u64;
    report.total_bytes = files.iter().map(|f| f.size).sum();

    let budget = max_size_mb.saturating_mul(BYTES_PER_MB);
    let mut remaining = report.total_bytes;

    if remaining > budget {
        match mode {
            EvictMode::Time => files.sort_by_key(|f| f.modified),
            EvictMode::Size => files.sort_by(|a, b| b.size.cmp(&a.size)),
        }

        for file in &files {
            if remaining <= budget {
                break;
            }
            match fs::remove_file(&file.path) {
                Ok(()) => {
                    tracing::debug!(path = %file.path.display(), size = file.size, "evicted");
                    report.removed_files += 1;
                    report.bytes_freed += file.size;
                    remaining -= file.size;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    remaining -= file.size;
                }
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "failed to evict cached file");
                }
            }
        }
    }
    report.remaining_bytes = remaining;
    report.removed_dirs = remove_empty_dirs(root)?;

    tracing::info!(
        scanned = report.scanned_files,
        removed = report.removed_files,
        freed_mb = report.bytes_freed as f64 / BYTES_PER_MB as f64,
        remaining_mb = report.remaining_bytes as f64 / BYTES_PER_MB as f64,
        removed_dirs = report.removed_dirs,
        "cache eviction finished"
    );

    Ok(report)
}

/// Every regular file below `root`. Files removed while walking are skipped.
fn collect_files(root: &Path) -> Result<Vec<CachedFile>, Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if vanished(&e) => continue,
            Err(e) => return Err(Error::Io(e.into())),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(file) = cached_file(entry)? {
            files.push(file);
        }
    }
    Ok(files)
}

/// Size and mtime of a walked file, `None` if it is already gone.
fn cached_file(entry: walkdir::DirEntry) -> Result<Option<CachedFile>, Error> {
    let metadata = match entry.metadata() {
        Ok(metadata) => metadata,
        Err(e) if vanished(&e) => {
            tracing::debug!(path = %entry.path().display(), "file vanished during sweep");
            return Ok(None);
        }
        Err(e) => return Err(Error::Io(e.into())),
    };
    let modified = match metadata.modified() {
        Ok(modified) => modified,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(CachedFile { path: entry.into_path(), size: metadata.len(), modified }))
}

/// Remove empty directories below `root`, deepest first. `root` itself stays.
fn remove_empty_dirs(root: &Path) -> Result<u64, Error> {
    let mut removed = 0u64;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if vanished(&e) => continue,
            Err(e) => return Err(Error::Io(e.into())),
        };
        if !entry.file_type().is_dir() || !is_empty_dir(entry.path())? {
            continue;
        }
        match fs::remove_dir(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %entry.path().display(), error = %e, "failed to remove empty directory"),
        }
    }
    Ok(removed)
}

/// Whether `path` is a directory without entries; a missing path is not.
fn is_empty_dir(path: &Path) -> Result<bool, Error> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn vanished(e: &walkdir::Error) -> bool {
    e.io_error().is_some_and(|err| err.kind() == io::ErrorKind::NotFound)
}
