//! thumbs-evict: out-of-band thumbnail cache sweep.
//!
//! Either reads `cache_dir`, `cache_max_size_mb` and `evict_mode` from a
//! configuration file, or takes them as positional arguments:
//!
//! ```text
//! thumbs-evict --config thumbs.toml
//! thumbs-evict ./thumbs-cache 1024 size
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use thumbs_core::{AppConfig, CacheEvictor, EvictMode, EvictionReport};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "thumbs-evict")]
#[command(about = "Shrink the thumbnail cache to a size budget")]
struct Args {
    /// Configuration file providing cache_dir, cache_max_size_mb and evict_mode
    #[arg(short, long, conflicts_with_all = ["cache_dir", "max_size_mb", "mode"])]
    config: Option<PathBuf>,

    /// Cache directory to sweep
    #[arg(required_unless_present = "config")]
    cache_dir: Option<PathBuf>,

    /// Total size budget in MB
    #[arg(required_unless_present = "config")]
    max_size_mb: Option<u64>,

    /// Removal order: "time" (oldest first) or "size" (largest first)
    #[arg(required_unless_present = "config")]
    mode: Option<String>,
}

/// A fully resolved sweep request.
#[derive(Debug, PartialEq, Eq)]
struct Sweep {
    cache_dir: PathBuf,
    max_size_mb: u64,
    mode: EvictMode,
}

impl Args {
    fn sweep(self) -> Result<Sweep> {
        if let Some(path) = self.config {
            let path_str = path.to_str().context("configuration path is not valid UTF-8")?;
            let config = AppConfig::load_from(Some(path_str))
                .with_context(|| format!("failed to load {}", path.display()))?;
            return Ok(Sweep {
                mode: config.evict_mode.parse()?,
                cache_dir: config.cache_dir,
                max_size_mb: config.cache_max_size_mb,
            });
        }

        match (self.cache_dir, self.max_size_mb, self.mode) {
            (Some(cache_dir), Some(max_size_mb), Some(mode)) => Ok(Sweep { cache_dir, max_size_mb, mode: mode.parse()? }),
            _ => anyhow::bail!("expected --config <file> or <cache_dir> <max_size_mb> <time|size>"),
        }
    }
}

async fn run(sweep: Sweep) -> Result<EvictionReport> {
    tracing::info!(
        cache_dir = %sweep.cache_dir.display(),
        max_size_mb = sweep.max_size_mb,
        mode = ?sweep.mode,
        "starting cache sweep"
    );
    let report = CacheEvictor::new(sweep.cache_dir)
        .clean(sweep.max_size_mb, sweep.mode)
        .await?;
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let sweep = Args::parse().sweep()?;
    let report = run(sweep).await?;

    println!(
        "scanned {} files ({} bytes), removed {} files ({} bytes), {} bytes remain, removed {} empty directories",
        report.scanned_files,
        report.total_bytes,
        report.removed_files,
        report.bytes_freed,
        report.remaining_bytes,
        report.removed_dirs
    );

    Ok(())
}
