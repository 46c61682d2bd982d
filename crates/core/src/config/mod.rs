//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (THUMBS_*)
//! 2. TOML config file (if THUMBS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (THUMBS_*)
/// 2. TOML config file (if THUMBS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite metadata database.
    ///
    /// Set via THUMBS_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root of the on-disk thumbnail cache.
    ///
    /// Set via THUMBS_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// User-Agent string for repository requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects followed while resolving an identifier.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Seconds a stored metadata row stays valid before a refresh is attempted.
    #[serde(default = "default_metadata_ttl_secs")]
    pub metadata_ttl_secs: u64,

    /// Largest original binary (in MB) the service will download.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Total cache budget used by the eviction sweep.
    #[serde(default = "default_cache_max_size_mb")]
    pub cache_max_size_mb: u64,

    /// Eviction order: "time" (oldest first) or "size" (largest first).
    #[serde(default = "default_evict_mode")]
    pub evict_mode: String,

    /// Width used when a request leaves it unspecified.
    #[serde(default = "default_dimension")]
    pub default_width: u32,

    /// Height used when a request leaves it unspecified.
    #[serde(default = "default_dimension")]
    pub default_height: u32,

    /// Metadata property URIs.
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Header asking the repository to return resource-only metadata.
    #[serde(default)]
    pub meta_fetch_header: MetaFetchHeader,

    /// Authorization policy.
    #[serde(default)]
    pub access: AccessConfig,

    /// Mime-specific handlers. Later entries win for a repeated mime type.
    #[serde(default = "default_handlers")]
    pub handlers: Vec<HandlerSpec>,

    /// Options of the mandatory default handler.
    #[serde(default)]
    pub fallback: FallbackOptions,
}

/// Property URIs looked up in the metadata graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub hash: String,
    pub mime: String,
    pub size: String,
    pub mod_date: String,
    pub class: String,
    pub title_image: String,
    pub acl_read: String,
    pub search_match: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            hash: "https://vocabs.acdh.oeaw.ac.at/schema#hasHash".into(),
            mime: "https://vocabs.acdh.oeaw.ac.at/schema#hasFormat".into(),
            size: "https://vocabs.acdh.oeaw.ac.at/schema#hasBinarySize".into(),
            mod_date: "https://vocabs.acdh.oeaw.ac.at/schema#hasBinaryUpdatedDate".into(),
            class: "http://www.w3.org/1999/02/22-rdf-syntax-ns#type".into(),
            title_image: "https://vocabs.acdh.oeaw.ac.at/schema#isTitleImageOf".into(),
            acl_read: "https://vocabs.acdh.oeaw.ac.at/schema#aclRead".into(),
            search_match: "search://match".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFetchHeader {
    pub name: String,
    pub value: String,
}

impl Default for MetaFetchHeader {
    fn default() -> Self {
        Self { name: "X-METADATA-READ-MODE".into(), value: "resource".into() }
    }
}

/// Who may see a thumbnail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Resource classes served regardless of ACL.
    #[serde(default)]
    pub allowed_classes: Vec<String>,

    /// Roles assumed for a caller that presents none.
    #[serde(default = "default_roles")]
    pub default_roles: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self { allowed_classes: Vec::new(), default_roles: default_roles() }
    }
}

/// One entry of the declarative handler list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum HandlerSpec {
    /// Aspect-preserving raster rescale.
    Image { mime: Vec<String> },
    /// Fixed-size preview of the first lines of a text file.
    Text {
        mime: Vec<String>,
        #[serde(default)]
        options: TextOptions,
    },
}

impl HandlerSpec {
    pub fn mime_types(&self) -> &[String] {
        match self {
            HandlerSpec::Image { mime } | HandlerSpec::Text { mime, .. } => mime,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOptions {
    /// Lines rendered even for very small thumbnails.
    pub min_lines: u32,
    /// Target line height in pixels.
    pub line_height: u32,
    /// Margin as a fraction of the thumbnail width.
    pub margin: f32,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self { min_lines: 10, line_height: 12, margin: 0.05 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackOptions {
    /// Icon files keyed by mime subtype (e.g. "pdf") or class local name.
    #[serde(default)]
    pub icons: BTreeMap<String, PathBuf>,

    /// Mime types for which no thumbnail is produced at all.
    #[serde(default)]
    pub declined_mime: Vec<String>,

    /// Labels too wide for the icon band are cut to this many characters
    /// before the font is shrunk.
    #[serde(default = "default_label_min_length")]
    pub label_min_length: usize,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self { icons: BTreeMap::new(), declined_mime: Vec::new(), label_min_length: default_label_min_length() }
    }
}

fn default_label_min_length() -> usize {
    4
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./thumbs-meta.sqlite")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./thumbs-cache")
}

fn default_user_agent() -> String {
    "thumbs/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    10
}

fn default_metadata_ttl_secs() -> u64 {
    86_400
}

fn default_max_file_size_mb() -> u64 {
    100
}

fn default_cache_max_size_mb() -> u64 {
    1024
}

fn default_evict_mode() -> String {
    "time".into()
}

fn default_dimension() -> u32 {
    100
}

fn default_roles() -> Vec<String> {
    vec!["public".into()]
}

fn default_handlers() -> Vec<HandlerSpec> {
    vec![
        HandlerSpec::Image {
            mime: ["image/png", "image/jpeg", "image/tiff", "image/gif", "image/webp", "image/bmp"]
                .into_iter()
                .map(String::from)
                .collect(),
        },
        HandlerSpec::Text {
            mime: ["application/json", "application/vnd.geo+json", "application/xml", "text/xml", "text/plain"]
                .into_iter()
                .map(String::from)
                .collect(),
            options: TextOptions::default(),
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_dir: default_cache_dir(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            metadata_ttl_secs: default_metadata_ttl_secs(),
            max_file_size_mb: default_max_file_size_mb(),
            cache_max_size_mb: default_cache_max_size_mb(),
            evict_mode: default_evict_mode(),
            default_width: default_dimension(),
            default_height: default_dimension(),
            schema: SchemaConfig::default(),
            meta_fetch_header: MetaFetchHeader::default(),
            access: AccessConfig::default(),
            handlers: default_handlers(),
            fallback: FallbackOptions::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Metadata time-to-live as Duration.
    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `THUMBS_`
    /// 2. TOML file from `THUMBS_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if loading or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("THUMBS_CONFIG_FILE").ok();
        Self::load_from(path.as_deref())
    }

    /// Load configuration using an explicit TOML file instead of `THUMBS_CONFIG_FILE`.
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_path) = config_path {
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(
            Env::prefixed("THUMBS_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
