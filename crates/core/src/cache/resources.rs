//! Resource metadata rows.
//!
//! One row per requested identifier. A missing row is a normal miss, not an
//! error, and writes are single-statement upserts keyed by `url`.

use std::collections::BTreeSet;

use super::connection::CacheDb;
use crate::{Error, ResourceMeta};
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Fixed-width UTC timestamps so that SQLite string comparison orders them.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

impl CacheDb {
    /// Fetch the stored metadata of `url`.
    ///
    /// Returns None if the identifier was never refreshed.
    pub async fn get_resource(&self, url: &str) -> Result<Option<ResourceMeta>, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ResourceMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, real_url, repo_hash, mime, size_mb, class, acl_read, mod_date, check_date
                    FROM resources WHERE url = ?1",
                )?;

                let result = stmt.query_row(params![url], |row| {
                    let acl_json: String = row.get(6)?;
                    let acl_read: BTreeSet<String> = serde_json::from_str(&acl_json).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
                    })?;
                    let mod_date: String = row.get(7)?;
                    let check_date: String = row.get(8)?;
                    Ok(ResourceMeta {
                        url: row.get(0)?,
                        real_url: row.get(1)?,
                        repo_hash: row.get(2)?,
                        mime: row.get(3)?,
                        size_mb: row.get::<_, i64>(4)?.max(0) as u64,
                        class: row.get(5)?,
                        acl_read,
                        mod_date: parse_ts(7, &mod_date)?,
                        check_date: Some(parse_ts(8, &check_date)?),
                    })
                });

                match result {
                    Ok(meta) => Ok(Some(meta)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or update the metadata row of `meta.url`.
    ///
    /// A single UPSERT statement; `check_date` never moves backwards even if
    /// two refreshes race.
    pub async fn upsert_resource(&self, meta: &ResourceMeta) -> Result<(), Error> {
        let check_date = meta
            .check_date
            .ok_or_else(|| Error::InvalidInput(format!("metadata of {} has no check date", meta.url)))?;
        let acl_json = serde_json::to_string(&meta.acl_read)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize ACL of {}: {e}", meta.url)))?;
        let url = meta.url.clone();
        let real_url = meta.real_url.clone();
        let repo_hash = meta.repo_hash.clone();
        let mime = meta.mime.clone();
        let size_mb = meta.size_mb as i64;
        let class = meta.class.clone();
        let mod_date = format_ts(&meta.mod_date);
        let check_date = format_ts(&check_date);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO resources (url, real_url, repo_hash, mime, size_mb, class, acl_read, mod_date, check_date)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(url) DO UPDATE SET
                        real_url = excluded.real_url,
                        repo_hash = excluded.repo_hash,
                        mime = excluded.mime,
                        size_mb = excluded.size_mb,
                        class = excluded.class,
                        acl_read = excluded.acl_read,
                        mod_date = excluded.mod_date,
                        check_date = MAX(resources.check_date, excluded.check_date)",
                    params![url, real_url, repo_hash, mime, size_mb, class, acl_json, mod_date, check_date],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
