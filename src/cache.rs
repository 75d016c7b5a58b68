use std::path::Path;

use chrono::{Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Cache TTL in days before an entry is treated as absent.
pub const DEFAULT_TTL_DAYS: i64 = 180;

/// Persistent HTTP response cache shared by all sources.
///
/// Entries are keyed by request signature and outlive a single run. Writes
/// are single-statement INSERT OR REPLACE, so concurrent runs against the
/// same store degrade to last-writer-wins.
pub struct CacheStore {
    pub conn: Connection,
}

impl CacheStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        // WAL mode for better concurrent read performance
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version < 1 {
            self.migrate_v1()?;
        }

        self.conn.pragma_update(None, "user_version", 1)?;
        Ok(())
    }

    /// V1: response cache keyed by request signature
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS http_cache (
                signature   TEXT PRIMARY KEY,
                status      INTEGER NOT NULL,
                body        TEXT NOT NULL,
                fetched_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_http_cache_fetched ON http_cache(fetched_at);
            ",
        )?;
        Ok(())
    }

    /// Expiry cutoff in the same UTC text format SQLite's datetime('now') writes.
    fn cutoff(ttl_days: i64) -> String {
        (Utc::now() - Duration::days(ttl_days))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    /// Look up a cached response. Entries older than `ttl_days` are treated
    /// as absent (but not removed; see [`purge_expired`](Self::purge_expired)).
    pub fn get(&self, signature: &str, ttl_days: i64) -> Result<Option<(u16, String)>> {
        let row = self
            .conn
            .query_row(
                "SELECT status, body FROM http_cache
                 WHERE signature = ?1
                   AND fetched_at > ?2",
                params![signature, Self::cutoff(ttl_days)],
                |row| {
                    let status: i64 = row.get(0)?;
                    let body: String = row.get(1)?;
                    Ok((status as u16, body))
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Store a response, replacing any previous entry for the signature.
    pub fn put(&self, signature: &str, status: u16, body: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO http_cache (signature, status, body, fetched_at)
             VALUES (?1, ?2, ?3, datetime('now'))",
            params![signature, status as i64, body],
        )?;
        Ok(())
    }

    /// Delete entries older than `ttl_days`. Returns the number removed.
    pub fn purge_expired(&self, ttl_days: i64) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM http_cache WHERE fetched_at <= ?1",
            params![Self::cutoff(ttl_days)],
        )?;
        Ok(removed)
    }

    /// Total number of cached entries.
    pub fn entry_count(&self) -> Result<i64> {
        let count =
            self.conn
                .query_row("SELECT COUNT(*) FROM http_cache", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let store = CacheStore::open_in_memory().unwrap();
        store.put("GET http://x?a=1", 200, "{\"ok\":true}").unwrap();
        let hit = store.get("GET http://x?a=1", DEFAULT_TTL_DAYS).unwrap();
        assert_eq!(hit, Some((200, "{\"ok\":true}".to_string())));
    }

    #[test]
    fn test_miss_on_unknown_signature() {
        let store = CacheStore::open_in_memory().unwrap();
        assert!(store.get("GET http://nope", DEFAULT_TTL_DAYS).unwrap().is_none());
    }

    #[test]
    fn test_replace_is_last_writer_wins() {
        let store = CacheStore::open_in_memory().unwrap();
        store.put("sig", 200, "old").unwrap();
        store.put("sig", 404, "new").unwrap();
        assert_eq!(
            store.get("sig", DEFAULT_TTL_DAYS).unwrap(),
            Some((404, "new".to_string()))
        );
        assert_eq!(store.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let store = CacheStore::open_in_memory().unwrap();
        store.put("sig", 200, "body").unwrap();
        // Backdate the entry past the TTL.
        store
            .conn
            .execute(
                "UPDATE http_cache SET fetched_at = datetime('now', '-200 days')",
                [],
            )
            .unwrap();
        assert!(store.get("sig", DEFAULT_TTL_DAYS).unwrap().is_none());
        // A generous TTL still sees it.
        assert!(store.get("sig", 400).unwrap().is_some());
    }

    #[test]
    fn test_purge_expired() {
        let store = CacheStore::open_in_memory().unwrap();
        store.put("old", 200, "a").unwrap();
        store
            .conn
            .execute(
                "UPDATE http_cache SET fetched_at = datetime('now', '-200 days')",
                [],
            )
            .unwrap();
        store.put("fresh", 200, "b").unwrap();

        let removed = store.purge_expired(DEFAULT_TTL_DAYS).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.entry_count().unwrap(), 1);
        assert!(store.get("fresh", DEFAULT_TTL_DAYS).unwrap().is_some());
    }
}
