//! Thumbnail generation strategies.
//!
//! A handler turns a reference binary into a PNG at a destination path.
//! Handlers are synchronous (pure CPU and local file I/O); the pipeline
//! runs them on the blocking pool and owns the atomic rename.
//!
//! ### Outcomes
//! - `Written`: the destination holds a complete PNG
//! - `Declined`: the handler chose not to produce anything
//! - `Failed`: the handler tried and broke

pub mod fallback;
pub mod image;
mod raster;
pub mod registry;
pub mod text;

use std::path::Path;

use ::image::{DynamicImage, ImageFormat, ImageReader, ImageResult, RgbaImage, imageops};
use thumbs_core::ResourceMeta;

pub use fallback::FallbackHandler;
pub use image::ImageHandler;
pub use registry::HandlerRegistry;
pub use text::TextHandler;

/// Result of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Written,
    Declined(String),
    Failed(String),
}

impl HandlerOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, HandlerOutcome::Written)
    }
}

/// Inputs of one generation.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailJob<'a> {
    pub meta: &'a ResourceMeta,
    /// Local copy of the original binary, absent when the handler does not need one.
    pub reference: Option<&'a Path>,
    /// Requested width; 0 means "derive from the height".
    pub width: u32,
    /// Requested height; 0 means "derive from the width".
    pub height: u32,
    /// Where the PNG must be written.
    pub dest: &'a Path,
}

/// Shared capability of every generation strategy.
pub trait ThumbnailHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handled_mime_types(&self) -> &[String];

    /// Aspect-preserving handlers may receive one zero dimension; the others
    /// always get both dimensions set.
    fn maintains_aspect_ratio(&self) -> bool;

    /// Whether the original binary must be downloaded before invocation.
    fn needs_reference(&self) -> bool {
        true
    }

    fn create_thumbnail(&self, job: &ThumbnailJob<'_>) -> HandlerOutcome;
}

/// Target box for an aspect-preserving render of a `src_w` x `src_h` source.
///
/// A zero dimension is computed from the source ratio; both zero keeps the
/// source size.
pub(crate) fn fit_box(src_w: u32, src_h: u32, width: u32, height: u32) -> (u32, u32) {
    let (src_w, src_h) = (src_w.max(1) as f64, src_h.max(1) as f64);
    let ratio = src_w / src_h;
    match (width, height) {
        (0, 0) => (src_w as u32, src_h as u32),
        (0, h) => (((h as f64) * ratio).round().max(1.0) as u32, h),
        (w, 0) => (w, ((w as f64) / ratio).round().max(1.0) as u32),
        (w, h) => (w, h),
    }
}

/// Scale `src` to fit `width` x `height` and centre it on a transparent canvas of that size.
pub(crate) fn letterbox(src: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let (width, height) = fit_box(src.width(), src.height(), width, height);
    let resized = src.resize(width, height, imageops::FilterType::Lanczos3).to_rgba8();

    let x = (width.saturating_sub(resized.width()) as f64 / 2.0).round() as i64;
    let y = (height.saturating_sub(resized.height()) as f64 / 2.0).round() as i64;

    let mut canvas = RgbaImage::new(width, height);
    imageops::replace(&mut canvas, &resized, x, y);
    canvas
}

/// Decode the image at `path`, sniffing the format from its content.
///
/// Cache entries and reference binaries carry no extension.
pub(crate) fn open_image(path: &Path) -> ImageResult<DynamicImage> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}

/// Encode `img` as PNG at `dest`.
pub(crate) fn write_png(img: &RgbaImage, dest: &Path) -> HandlerOutcome {
    match img.save_with_format(dest, ImageFormat::Png) {
        Ok(()) => HandlerOutcome::Written,
        Err(e) => HandlerOutcome::Failed(format!("failed to write {}: {e}", dest.display())),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeSet;
    use std::path::Path;

    use ::image::{ImageFormat, Rgba, RgbaImage};
    use chrono::{TimeZone, Utc};
    use thumbs_core::ResourceMeta;

    pub(crate) fn meta(mime: &str) -> ResourceMeta {
        ResourceMeta {
            url: "http://12345".into(),
            real_url: "https://repo/api/504945".into(),
            repo_hash: "h1".into(),
            mime: mime.into(),
            size_mb: 25,
            class: "https://vocab#Resource".into(),
            acl_read: BTreeSet::from(["public".to_string()]),
            mod_date: Utc.with_ymd_and_hms(2024, 1, 6, 20, 45, 13).unwrap(),
            check_date: None,
        }
    }

    /// Solid red PNG of the given size.
    pub(crate) fn write_sample_png(path: &Path, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }
}
