//! The mandatory default handler.
//!
//! Serves a configured icon for the resource's mime subtype (or class local
//! name), otherwise draws a generic document icon labelled with that key.
//! Mime types listed as declined produce nothing.

use std::collections::BTreeMap;
use std::path::PathBuf;

use image::{Rgba, RgbaImage, imageops};
use thumbs_core::ResourceMeta;
use thumbs_core::config::FallbackOptions;

use super::raster::{escape_xml, rasterize};
use super::{HandlerOutcome, ThumbnailHandler, ThumbnailJob, letterbox, open_image, write_png};

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const STROKE: f32 = 0.03;
/// Share of the band width the label may use.
const LABEL_WIDTH: f32 = 0.8;
/// Average bold sans-serif advance relative to the font size.
const ADVANCE: f32 = 0.62;

#[derive(Debug, Clone)]
pub struct FallbackHandler {
    icons: BTreeMap<String, PathBuf>,
    declined: Vec<String>,
    label_min_length: usize,
}

impl FallbackHandler {
    pub fn new(options: &FallbackOptions) -> Self {
        Self {
            icons: options.icons.clone(),
            declined: options.declined_mime.clone(),
            label_min_length: options.label_min_length,
        }
    }
}

impl Default for FallbackHandler {
    fn default() -> Self {
        Self::new(&FallbackOptions::default())
    }
}

/// Key used to pick an icon: mime subtype, else the class local name.
pub fn icon_key(meta: &ResourceMeta) -> String {
    let source = if meta.mime.is_empty() {
        meta.class.rsplit(['/', '#']).next().unwrap_or(&meta.class)
    } else {
        meta.mime.as_str()
    };
    match source.split_once('/') {
        Some((_, subtype)) => subtype.to_string(),
        None => source.to_string(),
    }
}

impl ThumbnailHandler for FallbackHandler {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn handled_mime_types(&self) -> &[String] {
        &[]
    }

    fn maintains_aspect_ratio(&self) -> bool {
        false
    }

    fn needs_reference(&self) -> bool {
        false
    }

    fn create_thumbnail(&self, job: &ThumbnailJob<'_>) -> HandlerOutcome {
        if self.declined.iter().any(|m| m.eq_ignore_ascii_case(&job.meta.mime)) {
            return HandlerOutcome::Declined(format!("thumbnails disabled for {}", job.meta.mime));
        }
        if job.width == 0 || job.height == 0 {
            return HandlerOutcome::Failed(format!("fixed-size handler got {}x{}", job.width, job.height));
        }

        let key = icon_key(job.meta);
        if let Some(icon) = self.icons.get(&key) {
            return match open_image(icon) {
                Ok(src) => write_png(&letterbox(&src, job.width, job.height), job.dest),
                Err(e) => HandlerOutcome::Failed(format!("cannot read icon {} for {key}: {e}", icon.display())),
            };
        }

        match document_icon(job.width, job.height, &key, self.label_min_length) {
            Ok(img) => write_png(&img, job.dest),
            Err(e) => HandlerOutcome::Failed(format!("cannot draw icon for {key}: {e}")),
        }
    }
}

/// Band of the generic icon holding the label.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Band {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// Cut `label` to `min_len` characters if it is too wide for `avail` pixels
/// at `max_size`, then pick the largest font size that fits.
fn fit_label(label: &str, avail: f32, max_size: f32, min_len: usize) -> (String, f32) {
    let width_at = |text: &str, size: f32| text.chars().count() as f32 * size * ADVANCE;

    let mut text = label.to_string();
    if width_at(&text, max_size) > avail && text.chars().count() > min_len {
        text = text.chars().take(min_len.max(1)).collect();
    }
    let len = text.chars().count().max(1) as f32;
    let size = max_size.min(avail / (len * ADVANCE)).max(1.0);
    (text, size)
}

/// White `label` centred in `band`, on a transparent canvas.
fn label_svg(width: u32, height: u32, band: Band, label: &str, min_len: usize) -> String {
    let (text, size) = fit_label(label, band.width * LABEL_WIDTH, (band.height / 2.0).round(), min_len);
    let x = band.x + band.width / 2.0;
    let baseline = band.y + (band.height + size * 0.7) / 2.0;
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><text x="{x:.2}" y="{baseline:.2}" font-family="sans-serif" font-weight="bold" font-size="{size:.2}" text-anchor="middle" fill="#ffffff">{}</text></svg>"##,
        escape_xml(&text)
    )
}

/// A page with a folded corner and a dark band carrying `label`, on a transparent canvas.
fn document_icon(width: u32, height: u32, label: &str, min_len: usize) -> Result<RgbaImage, String> {
    let (mut img, band) = document_shape(width, height);
    if !label.is_empty() {
        let text = rasterize(&label_svg(width, height, band, label, min_len), width, height)?;
        imageops::overlay(&mut img, &text, 0, 0);
    }
    Ok(img)
}

fn document_shape(width: u32, height: u32) -> (RgbaImage, Band) {
    let (w, h) = (width as f32, height as f32);

    let (rect_w, rect_h, rect_x, rect_y, band_w, band_x) = if h / w > 1.2 {
        let rect_w = (w * 0.8).round();
        let rect_h = (rect_w * 1.4).round();
        (rect_w, rect_h, (w * 0.1).round(), ((h - rect_h) / 2.0).round(), w, 0.0)
    } else {
        let rect_w = (h / 1.4).round();
        let band_w = rect_w / 0.8;
        (rect_w, h, ((w - rect_w) / 2.0).round(), 0.0, band_w, ((w - band_w) / 2.0).round())
    };
    let band_h = (rect_h / 3.0).round();
    let band_y = rect_y + (rect_h * 0.45).round();
    let corner = (rect_w / 3.0).round();
    let stroke = (STROKE * (rect_w * 1.4).min(rect_h)).max(1.0);

    let mut img = RgbaImage::new(width, height);
    for (px, py, pixel) in img.enumerate_pixels_mut() {
        let (x, y) = (px as f32 + 0.5, py as f32 + 0.5);

        let in_band = x >= band_x && x < band_x + band_w && y >= band_y && y < band_y + band_h;
        if in_band {
            *pixel = INK;
            continue;
        }

        let in_rect = x >= rect_x && x < rect_x + rect_w && y >= rect_y && y < rect_y + rect_h;
        if !in_rect {
            continue;
        }

        // folded corner: the top-right square of side `corner`, split on its diagonal
        let fold_x = rect_x + rect_w - corner;
        let in_corner = x >= fold_x && y < rect_y + corner;
        let above_diagonal = (x - fold_x) > (y - rect_y);
        if in_corner && above_diagonal {
            continue;
        }
        if in_corner {
            *pixel = INK;
            continue;
        }

        let near_edge = x - rect_x < stroke
            || rect_x + rect_w - x < stroke
            || y - rect_y < stroke
            || rect_y + rect_h - y < stroke;
        *pixel = if near_edge { INK } else { PAPER };
    }
    (img, Band { x: band_x, y: band_y, width: band_w, height: band_h })
}
