//! Plain-text formats: the first lines of the file typeset on a white page.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use image::RgbaImage;
use thumbs_core::config::TextOptions;

use super::raster::{escape_xml, rasterize};
use super::{HandlerOutcome, ThumbnailHandler, ThumbnailJob, write_png};

const MAX_LINE_BYTES: u64 = 1000;
/// Font size relative to the line height.
const FONT_SCALE: f32 = 0.75;
/// Average monospace advance relative to the font size.
const ADVANCE: f32 = 0.6;
const INK: &str = "#404040";

#[derive(Debug, Clone)]
pub struct TextHandler {
    mime: Vec<String>,
    options: TextOptions,
}

impl TextHandler {
    pub fn new(mime: Vec<String>, options: TextOptions) -> Self {
        Self { mime, options }
    }

    fn line_count(&self, height: u32) -> usize {
        let by_height = height / self.options.line_height.max(1);
        self.options.min_lines.max(by_height).max(1) as usize
    }
}

impl ThumbnailHandler for TextHandler {
    fn name(&self) -> &'static str {
        "text"
    }

    fn handled_mime_types(&self) -> &[String] {
        &self.mime
    }

    fn maintains_aspect_ratio(&self) -> bool {
        false
    }

    fn create_thumbnail(&self, job: &ThumbnailJob<'_>) -> HandlerOutcome {
        let Some(reference) = job.reference else {
            return HandlerOutcome::Declined("no reference binary".into());
        };
        if job.width == 0 || job.height == 0 {
            return HandlerOutcome::Failed(format!("fixed-size handler got {}x{}", job.width, job.height));
        }

        let n_lines = self.line_count(job.height);
        let lines = match read_lines(reference, n_lines) {
            Ok(lines) => lines,
            Err(e) => return HandlerOutcome::Failed(format!("cannot read {}: {e}", reference.display())),
        };

        match render(&lines, n_lines, job.width, job.height, self.options.margin) {
            Ok(img) => write_png(&img, job.dest),
            Err(e) => HandlerOutcome::Failed(format!("cannot render text preview: {e}")),
        }
    }
}

fn read_lines(path: &std::path::Path, n: usize) -> std::io::Result<Vec<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::with_capacity(n);
    let mut buf = Vec::new();
    while lines.len() < n {
        buf.clear();
        let read = reader.by_ref().take(MAX_LINE_BYTES).read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf).replace('\t', "    ");
        lines.push(line.trim_end().to_string());
    }
    Ok(lines)
}

fn render(lines: &[String], n_lines: usize, width: u32, height: u32, margin: f32) -> Result<RgbaImage, String> {
    rasterize(&page_svg(lines, n_lines, width, height, margin), width, height)
}

/// One `<text>` element per line on a white background.
fn page_svg(lines: &[String], n_lines: usize, width: u32, height: u32, margin: f32) -> String {
    let x0 = (width as f32 * margin).round();
    let y0 = x0.min((height as f32 * margin).round());
    let line_height = (height as f32 - 2.0 * y0).max(1.0) / n_lines.max(1) as f32;
    let font_size = (line_height * FONT_SCALE).max(1.0);
    let columns = ((width as f32 - x0) / (font_size * ADVANCE)).ceil().max(1.0) as usize;

    let mut svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><rect width="100%" height="100%" fill="#ffffff"/><g font-family="monospace" font-size="{font_size:.2}" fill="{INK}">"##
    );
    for (n, line) in lines.iter().take(n_lines).enumerate() {
        let visible: String = line.chars().take(columns).collect();
        if visible.trim().is_empty() {
            continue;
        }
        let baseline = y0 + (n + 1) as f32 * line_height;
        let _ = write!(
            svg,
            r#"<text x="{x0}" y="{baseline:.2}" xml:space="preserve">{}</text>"#,
            escape_xml(&visible)
        );
    }
    svg.push_str("</g></svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::open_image;
    use crate::handler::raster::has_fonts;
    use crate::handler::testing::meta;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn handler() -> TextHandler {
        TextHandler::new(vec!["text/plain".into()], TextOptions::default())
    }

    #[test]
    fn test_line_count() {
        let h = handler();
        assert_eq!(h.line_count(100), 10);
        assert_eq!(h.line_count(240), 20);
    }

    #[test]
    fn test_renders_fixed_size() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("0000_0000");
        let dest = dir.path().join("out.png");
        std::fs::write(&reference, "{\n  \"type\": \"FeatureCollection\",\n\t\"features\": []\n}\n").unwrap();

        let meta = meta("application/json");
        let job = ThumbnailJob { meta: &meta, reference: Some(&reference), width: 120, height: 80, dest: &dest };
        assert_eq!(handler().create_thumbnail(&job), HandlerOutcome::Written);

        let out = open_image(&dest).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (120, 80));
        assert_eq!(*out.get_pixel(119, 79), WHITE);
        assert!(out.pixels().all(|p| p[3] == 255));
        if has_fonts() {
            assert!(out.pixels().any(|p| *p != WHITE));
        }
    }

    #[test]
    fn test_page_layout() {
        let lines = vec!["fn main() {".to_string(), String::new(), "    <ok> & done".to_string()];
        let svg = page_svg(&lines, 10, 200, 90, 0.05);

        assert!(svg.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="90">"#));
        assert!(svg.contains(r#"font-size="6.00""#));
        assert!(svg.contains(r#"<text x="10" y="13.00" xml:space="preserve">fn main() {</text>"#));
        assert!(svg.contains(r#"y="29.00" xml:space="preserve">    &lt;ok&gt; &amp; done</text>"#));
        assert_eq!(svg.matches("<text ").count(), 2);
    }

    #[test]
    fn test_long_lines_are_clipped() {
        let lines = vec!["x".repeat(500)];
        let svg = page_svg(&lines, 10, 50, 50, 0.05);
        assert!(svg.contains(&"x".repeat(20)));
        assert!(!svg.contains(&"x".repeat(30)));

        let img = render(&lines, 10, 50, 50, 0.05).unwrap();
        assert_eq!(img.dimensions(), (50, 50));
    }

    #[test]
    fn test_zero_dimension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("0000_0000");
        std::fs::write(&reference, "hello").unwrap();
        let dest = dir.path().join("out.png");

        let meta = meta("text/plain");
        let job = ThumbnailJob { meta: &meta, reference: Some(&reference), width: 0, height: 80, dest: &dest };
        assert!(matches!(handler().create_thumbnail(&job), HandlerOutcome::Failed(_)));
    }

    #[test]
    fn test_missing_reference_fails() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("absent");
        let dest = dir.path().join("out.png");

        let meta = meta("text/plain");
        let job = ThumbnailJob { meta: &meta, reference: Some(&reference), width: 80, height: 80, dest: &dest };
        assert!(matches!(handler().create_thumbnail(&job), HandlerOutcome::Failed(_)));
    }
}
