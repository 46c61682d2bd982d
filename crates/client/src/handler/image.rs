//! Raster images: aspect-preserving rescale centred on a transparent canvas.

use super::{HandlerOutcome, ThumbnailHandler, ThumbnailJob, letterbox, open_image, write_png};

#[derive(Debug, Clone)]
pub struct ImageHandler {
    mime: Vec<String>,
}

impl ImageHandler {
    pub fn new(mime: Vec<String>) -> Self {
        Self { mime }
    }
}

impl ThumbnailHandler for ImageHandler {
    fn name(&self) -> &'static str {
        "image"
    }

    fn handled_mime_types(&self) -> &[String] {
        &self.mime
    }

    fn maintains_aspect_ratio(&self) -> bool {
        true
    }

    fn create_thumbnail(&self, job: &ThumbnailJob<'_>) -> HandlerOutcome {
        let Some(reference) = job.reference else {
            return HandlerOutcome::Declined("no reference binary".into());
        };

        let src = match open_image(reference) {
            Ok(img) => img,
            Err(e) => return HandlerOutcome::Failed(format!("cannot decode {}: {e}", reference.display())),
        };

        write_png(&letterbox(&src, job.width, job.height), job.dest)
    }
}
