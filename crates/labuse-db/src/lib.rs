//! Result cache for computed occupancy timelines.
//!
//! Building a timeline is deterministic in its inputs, so a finished
//! [`Timeline`] can be stored under a fingerprint of the sessions, the area
//! registry and the grid parameters, and reused by later runs over the same
//! dataset. The cache is a pure memoization layer: a miss only costs a
//! recomputation.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Invalidation
//!
//! Any change to the input changes the fingerprint, so stale entries are never
//! served. Entries written by an older payload layout carry an older
//! `schema_version` and are treated as misses.
//!
//! Entries are never replaced by newer inputs, only added, so callers bound
//! the table with [`Database::prune`].

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use labuse_core::{AreaRegistry, MinuteGrid, Session, Timeline};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Version of the stored payload layout.
const PAYLOAD_SCHEMA_VERSION: i64 = 2;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to serialize cache input or payload.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for cache entry {key}: {timestamp}")]
    TimestampParse {
        key: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Content fingerprint of one engine input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    version: i64,
    sessions: Vec<&'a Session>,
    registry: &'a AreaRegistry,
    grid: Option<&'a MinuteGrid>,
}

/// Fingerprints the engine input.
///
/// Session order does not affect the timeline, so it does not affect the key
/// either. `grid` is the caller-supplied grid, or `None` when the grid is
/// derived from the sessions.
pub fn fingerprint(
    sessions: &[Session],
    registry: &AreaRegistry,
    grid: Option<&MinuteGrid>,
) -> Result<CacheKey, DbError> {
    let mut sorted: Vec<&Session> = sessions.iter().collect();
    sorted.sort_by(|a, b| {
        (a.area(), a.start(), a.duration_minutes()).cmp(&(
            b.area(),
            b.start(),
            b.duration_minutes(),
        ))
    });

    let input = FingerprintInput {
        version: PAYLOAD_SCHEMA_VERSION,
        sessions: sorted,
        registry,
        grid,
    };
    let bytes = serde_json::to_vec(&input)?;
    Ok(CacheKey(
        Uuid::new_v5(&Uuid::NAMESPACE_OID, &bytes).to_string(),
    ))
}

/// Summary of the cache contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub payload_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- key: v5 UUID fingerprint of sessions, registry and grid
            -- created_at: ISO 8601 format (e.g., '2024-01-15T10:30:00.000Z')
            -- payload: JSON-serialized timeline
            CREATE TABLE IF NOT EXISTS timeline_cache (
                key TEXT PRIMARY KEY,
                schema_version INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                session_count INTEGER NOT NULL,
                payload TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_timeline_cache_created ON timeline_cache(created_at);
            ",
        )?;
        Ok(())
    }

    /// Looks up a cached timeline.
    ///
    /// Entries from another payload version, or that no longer decode, are
    /// reported as misses.
    pub fn get_timeline(&self, key: &CacheKey) -> Result<Option<Timeline>, DbError> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT schema_version, payload FROM timeline_cache WHERE key = ?",
                params![key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((version, payload)) = row else {
            tracing::debug!(%key, "timeline cache miss");
            return Ok(None);
        };

        if version != PAYLOAD_SCHEMA_VERSION {
            tracing::debug!(%key, version, "ignoring cache entry from another schema version");
            return Ok(None);
        }

        match serde_json::from_str(&payload) {
            Ok(timeline) => {
                tracing::debug!(%key, "timeline cache hit");
                Ok(Some(timeline))
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "ignoring undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Stores a timeline, replacing any entry under the same key.
    pub fn put_timeline(
        &mut self,
        key: &CacheKey,
        timeline: &Timeline,
        session_count: usize,
    ) -> Result<(), DbError> {
        let payload = serde_json::to_string(timeline)?;
        let session_count = i64::try_from(session_count).unwrap_or(i64::MAX);
        self.conn.execute(
            "
            INSERT OR REPLACE INTO timeline_cache
            (key, schema_version, created_at, session_count, payload)
            VALUES (?, ?, ?, ?, ?)
            ",
            params![
                key.as_str(),
                PAYLOAD_SCHEMA_VERSION,
                format_timestamp(Utc::now()),
                session_count,
                payload,
            ],
        )?;
        tracing::debug!(%key, bytes = payload.len(), "stored timeline in cache");
        Ok(())
    }

    /// Removes every entry. Returns the number removed.
    pub fn clear(&mut self) -> Result<usize, DbError> {
        Ok(self.conn.execute("DELETE FROM timeline_cache", [])?)
    }

    /// Drops all but the `keep` most recently written entries. Returns the
    /// number removed.
    pub fn prune(&mut self, keep: usize) -> Result<usize, DbError> {
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);
        let removed = self.conn.execute(
            "
            DELETE FROM timeline_cache
            WHERE rowid NOT IN (
                SELECT rowid FROM timeline_cache
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?
            )
            ",
            params![keep],
        )?;
        if removed > 0 {
            tracing::debug!(removed, keep, "pruned timeline cache");
        }
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats, DbError> {
        let (entries, payload_bytes, oldest, newest): (i64, i64, Option<String>, Option<String>) =
            self.conn.query_row(
                "
                SELECT COUNT(*), COALESCE(SUM(LENGTH(payload)), 0), MIN(created_at), MAX(created_at)
                FROM timeline_cache
                ",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        Ok(CacheStats {
            entries: usize::try_from(entries).unwrap_or(0),
            payload_bytes: u64::try_from(payload_bytes).unwrap_or(0),
            oldest: oldest.map(|t| parse_timestamp(&t, "oldest")).transpose()?,
            newest: newest.map(|t| parse_timestamp(&t, "newest")).transpose()?,
        })
    }
}

fn parse_timestamp(timestamp: &str, key: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            key: key.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
