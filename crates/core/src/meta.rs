//! Last-known descriptive metadata of a repository resource.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder stored when the repository reports neither a hash nor a modification date.
pub const NO_HASH: &str = "__no hash__";

/// Placeholder stored when the repository reports no class.
pub const NO_CLASS: &str = "__no class__";

/// One row per requested resource identifier.
///
/// Values are immutable once built; the `with_*` methods return a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// The identifier as requested.
    pub url: String,
    /// Canonical binary location, possibly the title image of `url`.
    pub real_url: String,
    /// Content fingerprint reported by the repository.
    pub repo_hash: String,
    pub mime: String,
    pub size_mb: u64,
    pub class: String,
    pub acl_read: BTreeSet<String>,
    /// Repository-reported last modification time.
    pub mod_date: DateTime<Utc>,
    /// Local time of the last successful refresh.
    pub check_date: Option<DateTime<Utc>>,
}

impl ResourceMeta {
    /// Copy of this value stamped with a new refresh time.
    ///
    /// The stamp never moves backwards.
    pub fn with_check_date(&self, now: DateTime<Utc>) -> Self {
        let check_date = match self.check_date {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        Self { check_date: Some(check_date), ..self.clone() }
    }

    /// Seconds elapsed since the last refresh, `None` if never refreshed.
    pub fn age_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.check_date.map(|d| (now - d).num_seconds())
    }

    /// True when the row must be refreshed under the given TTL.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl_secs: u64) -> bool {
        match self.age_secs(now) {
            None => true,
            Some(diff) => diff > ttl_secs as i64,
        }
    }

    /// True when the caller may see this resource.
    ///
    /// Access is granted when the class is allow-listed or when the caller
    /// holds at least one of the ACL-read roles.
    pub fn is_readable_by<R: AsRef<str>>(&self, roles: &[R], allowed_classes: &[String]) -> bool {
        if allowed_classes.iter().any(|c| c == &self.class) {
            return true;
        }
        roles.iter().any(|r| self.acl_read.contains(r.as_ref()))
    }
}
