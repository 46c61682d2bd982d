//! Text layout through resvg: handlers describe what to draw as SVG and get
//! back an RGBA canvas.

use std::sync::{Arc, LazyLock};

use image::{Rgba, RgbaImage};
use resvg::{tiny_skia, usvg};

/// System fonts, loaded once per process.
static FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut fontdb = usvg::fontdb::Database::new();
    fontdb.load_system_fonts();
    if fontdb.len() == 0 {
        tracing::warn!("no system fonts found, thumbnail text will be blank");
    } else {
        tracing::debug!(faces = fontdb.len(), "loaded system fonts");
    }
    Arc::new(fontdb)
});

/// Whether any font face is available for text rendering.
pub(crate) fn has_fonts() -> bool {
    FONTS.len() > 0
}

/// Render an SVG document onto a transparent `width` x `height` canvas.
pub(crate) fn rasterize(svg: &str, width: u32, height: u32) -> Result<RgbaImage, String> {
    let options = usvg::Options { fontdb: FONTS.clone(), ..usvg::Options::default() };
    let tree = usvg::Tree::from_str(svg, &options).map_err(|e| format!("invalid svg: {e}"))?;

    let mut pixmap =
        tiny_skia::Pixmap::new(width, height).ok_or_else(|| format!("cannot allocate a {width}x{height} canvas"))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let mut img = RgbaImage::new(width, height);
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Ok(img)
}

/// Escape `text` as SVG character data, dropping characters XML cannot carry.
pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
