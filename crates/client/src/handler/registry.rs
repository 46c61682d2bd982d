//! Mime type to handler mapping, built once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use thumbs_core::AppConfig;
use thumbs_core::config::HandlerSpec;

use super::{FallbackHandler, ImageHandler, TextHandler, ThumbnailHandler};

/// Immutable after construction; shared behind an `Arc` by the pipeline.
pub struct HandlerRegistry {
    by_mime: BTreeMap<String, Arc<dyn ThumbnailHandler>>,
    default: Arc<dyn ThumbnailHandler>,
}

impl HandlerRegistry {
    pub fn new(default: Arc<dyn ThumbnailHandler>) -> Self {
        Self { by_mime: BTreeMap::new(), default }
    }

    /// Build the registry from the declarative handler list.
    ///
    /// Entries are applied in order, so a later entry wins for a mime type
    /// listed twice.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new(Arc::new(FallbackHandler::new(&config.fallback)));
        for spec in &config.handlers {
            let handler: Arc<dyn ThumbnailHandler> = match spec {
                HandlerSpec::Image { mime } => Arc::new(ImageHandler::new(mime.clone())),
                HandlerSpec::Text { mime, options } => Arc::new(TextHandler::new(mime.clone(), options.clone())),
            };
            registry.register(handler);
        }
        registry
    }

    /// Register `handler` for every mime type it declares.
    pub fn register(&mut self, handler: Arc<dyn ThumbnailHandler>) {
        for mime in handler.handled_mime_types() {
            let key = normalize_mime(mime);
            if let Some(previous) = self.by_mime.insert(key.clone(), handler.clone()) {
                tracing::debug!(mime = %key, previous = previous.name(), current = handler.name(), "handler overridden");
            }
        }
    }

    pub fn handler_for(&self, mime: &str) -> Option<Arc<dyn ThumbnailHandler>> {
        self.by_mime.get(&normalize_mime(mime)).cloned()
    }

    pub fn default_handler(&self) -> Arc<dyn ThumbnailHandler> {
        self.default.clone()
    }

    /// Mime types with a dedicated handler, sorted.
    pub fn mime_types(&self) -> Vec<&str> {
        self.by_mime.keys().map(String::as_str).collect()
    }
}

fn normalize_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumbs_core::config::TextOptions;

    #[test]
    fn test_from_default_config() {
        let registry = HandlerRegistry::from_config(&AppConfig::default());
        assert_eq!(registry.handler_for("image/png").unwrap().name(), "image");
        assert_eq!(registry.handler_for("Image/JPEG").unwrap().name(), "image");
        assert_eq!(registry.handler_for("text/plain; charset=utf-8").unwrap().name(), "text");
        assert!(registry.handler_for("application/pdf").is_none());
        assert_eq!(registry.default_handler().name(), "fallback");
    }

    #[test]
    fn test_later_entry_wins() {
        let config = AppConfig {
            handlers: vec![
                HandlerSpec::Image { mime: vec!["image/svg+xml".into(), "image/png".into()] },
                HandlerSpec::Text { mime: vec!["image/svg+xml".into()], options: TextOptions::default() },
            ],
            ..AppConfig::default()
        };
        let registry = HandlerRegistry::from_config(&config);
        assert_eq!(registry.handler_for("image/svg+xml").unwrap().name(), "text");
        assert_eq!(registry.handler_for("image/png").unwrap().name(), "image");
        assert_eq!(registry.mime_types(), vec!["image/png", "image/svg+xml"]);
    }
}
