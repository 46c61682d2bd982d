//! Building a [`ResourceMeta`] from a metadata graph.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thumbs_core::config::SchemaConfig;
use thumbs_core::meta::{NO_CLASS, NO_HASH};
use thumbs_core::ResourceMeta;

use super::{Graph, Term};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Extract the descriptive fields of `real_url` from `graph`.
///
/// Missing properties fall back to placeholders rather than failing. The
/// returned value has no `check_date`; the caller stamps it.
pub fn describe_resource(graph: &Graph, schema: &SchemaConfig, url: &str, real_url: &str) -> ResourceMeta {
    let mod_date_raw = graph.object_value(&schema.mod_date);
    let repo_hash = graph
        .object_value(&schema.hash)
        .or(mod_date_raw)
        .unwrap_or(NO_HASH)
        .to_string();

    let mod_date = mod_date_raw.and_then(parse_timestamp).unwrap_or(DateTime::UNIX_EPOCH);

    let size_mb = graph
        .object_value(&schema.size)
        .and_then(parse_size)
        .map_or(0, |bytes| bytes >> 20);

    ResourceMeta {
        url: url.to_string(),
        real_url: real_url.to_string(),
        repo_hash,
        mime: graph.object_value(&schema.mime).unwrap_or_default().to_string(),
        size_mb,
        class: graph.object_value(&schema.class).unwrap_or(NO_CLASS).to_string(),
        acl_read: graph.objects(&schema.acl_read).map(Term::value).map(String::from).collect(),
        mod_date,
        check_date: None,
    }
}

/// RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM:SS` read as UTC, or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_size(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}
