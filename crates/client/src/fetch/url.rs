//! Repository URL helpers.

/// Error type for malformed resource identifiers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Normalize a resource identifier before it is used as a metadata key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require an http(s) scheme
/// 3. Remove fragment (#...)
///
/// The host is left as written: repository identifiers such as
/// `http://12345` are opaque and must not be rewritten.
pub fn normalize_identifier(input: &str) -> Result<String, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return Err(UrlError::InvalidUrl(format!("missing scheme: {trimmed}")));
    };

    match scheme.to_ascii_lowercase().as_str() {
        "http" | "https" => {}
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    }

    if rest.is_empty() {
        return Err(UrlError::InvalidUrl(format!("missing host: {trimmed}")));
    }

    let without_fragment = trimmed.split_once('#').map_or(trimmed, |(head, _)| head);
    Ok(without_fragment.to_string())
}

/// Drop a trailing `/metadata` segment the repository appends on redirect.
pub fn strip_metadata_suffix(url: &str) -> &str {
    let trimmed = url.strip_suffix('/').unwrap_or(url);
    trimmed.strip_suffix("/metadata").unwrap_or(url)
}

/// Everything up to (not including) the last `/` of `real_url`.
pub fn repo_base(real_url: &str) -> &str {
    real_url.rsplit_once('/').map_or(real_url, |(base, _)| base)
}

/// Relation search asking which resource declares `property` pointing at `value`.
pub fn relation_search_url(real_url: &str, property: &str, value: &str) -> Result<url::Url, UrlError> {
    let mut search = url::Url::parse(&format!("{}/search", repo_base(real_url)))
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    search
        .query_pairs_mut()
        .append_pair("property[0]", property)
        .append_pair("value[0]", value)
        .append_pair("type[0]", "relation");
    Ok(search)
}

/// Location of the resource-only metadata of `real_url`.
pub fn metadata_url(real_url: &str) -> String {
    format!("{}/metadata", real_url.trim_end_matches('/'))
}
